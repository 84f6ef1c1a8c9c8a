//! Versioned fallback snapshot.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

/// Substitute documents keyed by peer name.
///
/// Wire format:
/// ```json
/// { "version": "2024-06-01", "services": { "SkillsEngine": { "skills": [] } } }
/// ```
#[derive(Debug, Clone, Default)]
pub struct FallbackSnapshot {
    version: Option<String>,
    /// Lowercased peer name → document.
    services: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    services: HashMap<String, Value>,
}

impl FallbackSnapshot {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let raw: RawSnapshot = serde_json::from_str(text)?;
        Ok(Self::new(raw.version, raw.services))
    }

    pub fn new(version: Option<String>, services: HashMap<String, Value>) -> Self {
        Self {
            version,
            services: services
                .into_iter()
                .map(|(name, doc)| (name.to_lowercase(), doc))
                .collect(),
        }
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Document for `peer`, matched case-insensitively.
    pub fn get(&self, peer: &str) -> Option<&Value> {
        self.services.get(&peer.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_and_lookup() {
        let snapshot = FallbackSnapshot::from_json(
            r#"{"version":"v3","services":{"SkillsEngine":{"skills":[]}}}"#,
        )
        .unwrap();
        assert_eq!(snapshot.version(), Some("v3"));
        assert_eq!(snapshot.get("skillsengine"), Some(&json!({"skills": []})));
        assert!(snapshot.get("CourseBuilder").is_none());
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let snapshot = FallbackSnapshot::from_json("{}").unwrap();
        assert!(snapshot.is_empty());
        assert!(snapshot.version().is_none());
    }
}

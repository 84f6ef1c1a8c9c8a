//! Field whitelist and field-selection parsing.
//!
//! Callers never send queries. They send a list of `resource.field`
//! references, each of which must appear in a static whitelist.

use serde_json::Value;

use crate::exchange::payload::Document;

/// Resource → fields a caller may reference.
const STANDARD: &[(&str, &[&str])] = &[
    (
        "employees",
        &["id", "firstName", "lastName", "email", "jobTitle", "departmentId", "companyId", "managerId", "status"],
    ),
    ("companies", &["id", "name", "industry", "size", "country"]),
    ("departments", &["id", "name", "companyId", "managerId"]),
    ("skills", &["id", "name", "category", "level", "employeeId"]),
    ("courses", &["id", "title", "provider", "durationHours", "employeeId", "status"]),
];

/// Static table of selectable fields.
#[derive(Debug, Clone, Copy)]
pub struct FieldWhitelist {
    entries: &'static [(&'static str, &'static [&'static str])],
}

impl Default for FieldWhitelist {
    fn default() -> Self {
        Self::standard()
    }
}

impl FieldWhitelist {
    pub const fn new(entries: &'static [(&'static str, &'static [&'static str])]) -> Self {
        Self { entries }
    }

    /// The built-in directory whitelist.
    pub const fn standard() -> Self {
        Self::new(STANDARD)
    }

    /// Canonical (lowercase) resource name if whitelisted.
    pub fn resource(&self, name: &str) -> Option<&'static str> {
        let lowered = name.trim().to_lowercase();
        self.entries.iter().find(|(r, _)| *r == lowered).map(|(r, _)| *r)
    }

    /// Whitelisted fields of a resource.
    pub fn fields(&self, resource: &str) -> Option<&'static [&'static str]> {
        let canonical = self.resource(resource)?;
        self.entries.iter().find(|(r, _)| *r == canonical).map(|(_, f)| *f)
    }

    pub fn is_allowed(&self, resource: &str, field: &str) -> bool {
        self.fields(resource).is_some_and(|fields| fields.contains(&field))
    }

    /// Parse and check the field selection carried by a payload.
    pub fn selection(&self, doc: &Document) -> Result<FieldSelection, String> {
        let resource = match doc.get("resource") {
            None | Some(Value::Null) => None,
            Some(Value::String(name)) => Some(
                self.resource(name)
                    .ok_or_else(|| format!("resource '{}' is not permitted", name))?,
            ),
            Some(_) => return Err("'resource' must be a string".into()),
        };

        let raw_fields = match doc.get("fields") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .ok_or("'fields' must be a list of strings")?,
            Some(_) => return Err("'fields' must be a list of strings".into()),
        };

        let mut fields = Vec::new();
        let mut unqualified = Vec::new();
        for raw in raw_fields {
            let qualified = raw.split_once('.').map(|(r, f)| (r.to_string(), f.to_string()));
            match qualified {
                Some((res, field)) => {
                    let canonical = self
                        .resource(&res)
                        .filter(|r| !field.is_empty() && self.is_allowed(r, &field))
                        .ok_or_else(|| format!("field '{}' is not permitted", raw))?;
                    fields.push(FieldRef::new(canonical, &field));
                }
                None => match resource {
                    Some(res) if self.is_allowed(res, &raw) => fields.push(FieldRef::new(res, &raw)),
                    Some(res) => return Err(format!("field '{}.{}' is not permitted", res, raw)),
                    None => unqualified.push(raw),
                },
            }
        }

        let limit = match doc.get("limit") {
            None | Some(Value::Null) => None,
            Some(v) => Some(
                v.as_u64()
                    .map(|n| n as usize)
                    .ok_or("'limit' must be a non-negative integer")?,
            ),
        };

        Ok(FieldSelection {
            resource,
            fields,
            unqualified,
            limit,
        })
    }
}

/// A checked `resource.field` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub resource: &'static str,
    pub field: String,
}

impl FieldRef {
    fn new(resource: &'static str, field: &str) -> Self {
        Self {
            resource,
            field: field.to_string(),
        }
    }
}

/// What a caller asked this service for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelection {
    /// Resource named by the payload, if any.
    pub resource: Option<&'static str>,
    /// Whitelisted references.
    pub fields: Vec<FieldRef>,
    /// Bare names given without any resource; not checked, not selectable.
    pub unqualified: Vec<String>,
    pub limit: Option<usize>,
}

impl FieldSelection {
    /// Resources touched by this selection, in first-mention order.
    pub fn resources(&self) -> Vec<&'static str> {
        let mut out: Vec<&'static str> = Vec::new();
        for r in self.resource.iter().copied().chain(self.fields.iter().map(|f| f.resource)) {
            if !out.contains(&r) {
                out.push(r);
            }
        }
        out
    }

    /// Requested fields of `resource` (empty means "all whitelisted").
    pub fn fields_of(&self, resource: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.resource == resource)
            .map(|f| f.field.as_str())
            .collect()
    }
}

//! Local structured data answered on behalf of this service.
//!
//! # Responsibilities
//! - Answer field selections addressed to this service
//! - Accept record pushes from peers (internal endpoints)
//!
//! # Design Decisions
//! - The persistence layer sits behind `LocalDataSource`
//! - Answers only ever contain whitelisted fields

use std::collections::BTreeMap;

use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;

use crate::exchange::payload::Document;
use crate::exchange::whitelist::{FieldSelection, FieldWhitelist};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocalDataError {
    #[error("record must carry a string or numeric 'id'")]
    MissingId,
}

/// Boundary to this service's own data.
pub trait LocalDataSource: Send + Sync {
    /// Answer a checked selection. `filters` are identifying fields
    /// from the request; a record is skipped if it contradicts one.
    fn select(&self, selection: &FieldSelection, filters: &Document, whitelist: &FieldWhitelist) -> Document;

    /// Insert or replace a record; returns its id.
    fn upsert(&self, resource: &str, record: Document) -> Result<String, LocalDataError>;

    /// Number of records held for `resource`.
    fn count(&self, resource: &str) -> usize;
}

/// In-memory store keyed by resource, then record id.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    records: DashMap<String, BTreeMap<String, Document>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

/// `employees` → `employee`, `companies` → `company`.
fn singular(resource: &str) -> String {
    if let Some(stem) = resource.strip_suffix("ies") {
        format!("{}y", stem)
    } else {
        resource.strip_suffix('s').unwrap_or(resource).to_string()
    }
}

fn matches_filters(resource: &str, record: &Document, filters: &Document) -> bool {
    let own_id_key = format!("{}Id", singular(resource));
    filters.iter().all(|(key, wanted)| {
        let field = if *key == own_id_key { "id" } else { key.as_str() };
        match record.get(field) {
            Some(actual) => actual == wanted,
            None => true,
        }
    })
}

impl LocalDataSource for InMemoryDirectory {
    fn select(&self, selection: &FieldSelection, filters: &Document, whitelist: &FieldWhitelist) -> Document {
        let mut answer = Document::new();
        for resource in selection.resources() {
            let requested = selection.fields_of(resource);
            let fields: Vec<&str> = if requested.is_empty() {
                whitelist.fields(resource).map(|f| f.to_vec()).unwrap_or_default()
            } else {
                requested
            };

            let rows: Vec<Value> = self
                .records
                .get(resource)
                .map(|records| {
                    records
                        .values()
                        .filter(|record| matches_filters(resource, record, filters))
                        .take(selection.limit.unwrap_or(usize::MAX))
                        .map(|record| {
                            let projected: Document = fields
                                .iter()
                                .filter_map(|f| record.get(*f).map(|v| (f.to_string(), v.clone())))
                                .collect();
                            Value::Object(projected)
                        })
                        .collect()
                })
                .unwrap_or_default();

            answer.insert(resource.to_string(), Value::Array(rows));
        }
        answer
    }

    fn upsert(&self, resource: &str, record: Document) -> Result<String, LocalDataError> {
        let id = match record.get("id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(LocalDataError::MissingId),
        };
        self.records
            .entry(resource.to_lowercase())
            .or_default()
            .insert(id.clone(), record);
        Ok(id)
    }

    fn count(&self, resource: &str) -> usize {
        self.records.get(&resource.to_lowercase()).map(|r| r.len()).unwrap_or(0)
    }
}

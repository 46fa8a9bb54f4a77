#![allow(dead_code)]
//! Teacher, venue, and class registries.
//!
//! The ingestion core consumes these as lookup collaborators; it never
//! manages them. Registries are loaded at startup from JSON files in a
//! directory (`teachers.json`, `venues.json`, `classes.json`), backed by
//! `RwLock` for runtime mutation, and snapshotted into an immutable
//! [`DirectoryIndex`] for each pipeline run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeacherRecord {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub capacity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassRecord {
    pub id: String,
    pub subject: String,
    pub department_id: String,
}

#[derive(Debug, Default)]
struct Registries {
    teachers: Vec<TeacherRecord>,
    venues: Vec<VenueRecord>,
    classes: Vec<ClassRecord>,
}

/// In-memory registry store.
#[derive(Debug, Default)]
pub struct RegistryStore {
    inner: RwLock<Registries>,
}

impl RegistryStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load all registry files from the specified directory. Missing
    /// individual files are tolerated (empty registry); a missing
    /// directory is not.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        if !dir.exists() {
            anyhow::bail!("Registry directory does not exist: {:?}", dir);
        }

        let teachers: Vec<TeacherRecord> = load_json_list(&dir.join("teachers.json"))?;
        let venues: Vec<VenueRecord> = load_json_list(&dir.join("venues.json"))?;
        let classes: Vec<ClassRecord> = load_json_list(&dir.join("classes.json"))?;

        info!(
            "Loaded registries from {:?}: {} teachers, {} venues, {} classes",
            dir,
            teachers.len(),
            venues.len(),
            classes.len()
        );

        Ok(Self {
            inner: RwLock::new(Registries {
                teachers,
                venues,
                classes,
            }),
        })
    }

    pub fn teachers(&self) -> Vec<TeacherRecord> {
        self.inner.read().unwrap().teachers.clone()
    }

    pub fn venues(&self) -> Vec<VenueRecord> {
        self.inner.read().unwrap().venues.clone()
    }

    pub fn venue_exists(&self, venue_id: &str) -> bool {
        self.inner
            .read()
            .unwrap()
            .venues
            .iter()
            .any(|v| v.id == venue_id)
    }

    pub fn add_teacher(&self, record: TeacherRecord) {
        self.inner.write().unwrap().teachers.push(record);
    }

    pub fn add_venue(&self, record: VenueRecord) {
        self.inner.write().unwrap().venues.push(record);
    }

    pub fn add_class(&self, record: ClassRecord) {
        self.inner.write().unwrap().classes.push(record);
    }

    /// Immutable lookup snapshot for one pipeline run. Emails and venue
    /// names are matched case-insensitively with whitespace collapsed.
    pub fn index(&self) -> DirectoryIndex {
        let inner = self.inner.read().unwrap();

        let teachers_by_email = inner
            .teachers
            .iter()
            .map(|t| (normalize_key(&t.email), t.id.clone()))
            .collect();
        let venues_by_name = inner
            .venues
            .iter()
            .map(|v| (normalize_key(&v.name), v.id.clone()))
            .collect();
        let classes_by_dept_subject = inner
            .classes
            .iter()
            .map(|c| {
                (
                    (c.department_id.clone(), normalize_key(&c.subject)),
                    c.id.clone(),
                )
            })
            .collect();
        let venue_ids = inner.venues.iter().map(|v| v.id.clone()).collect();

        DirectoryIndex {
            teachers_by_email,
            venues_by_name,
            classes_by_dept_subject,
            venue_ids,
        }
    }
}

/// Point-in-time lookup view consumed by the validator and expander.
#[derive(Debug, Clone, Default)]
pub struct DirectoryIndex {
    teachers_by_email: HashMap<String, String>,
    venues_by_name: HashMap<String, String>,
    classes_by_dept_subject: HashMap<(String, String), String>,
    venue_ids: Vec<String>,
}

impl DirectoryIndex {
    pub fn teacher_for_email(&self, email: &str) -> Option<&str> {
        self.teachers_by_email
            .get(&normalize_key(email))
            .map(String::as_str)
    }

    pub fn venue_for_name(&self, name: &str) -> Option<&str> {
        self.venues_by_name
            .get(&normalize_key(name))
            .map(String::as_str)
    }

    pub fn class_for(&self, department_id: &str, subject: &str) -> Option<&str> {
        self.classes_by_dept_subject
            .get(&(department_id.to_string(), normalize_key(subject)))
            .map(String::as_str)
    }

    pub fn venue_ids(&self) -> &[String] {
        &self.venue_ids
    }
}

/// Lowercase, trim, and collapse runs of whitespace so "Room  A" and
/// "room a" hit the same registry entry.
pub fn normalize_key(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn load_json_list<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        warn!("Registry file not found, treating as empty: {:?}", path);
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read registry file: {:?}", path))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse registry file: {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_store() -> RegistryStore {
        let store = RegistryStore::empty();
        store.add_teacher(TeacherRecord {
            id: "t1".into(),
            name: "Ada Lovelace".into(),
            email: "ada@school.edu".into(),
        });
        store.add_venue(VenueRecord {
            id: "v1".into(),
            name: "Room A".into(),
            capacity: 30,
        });
        store.add_class(ClassRecord {
            id: "c1".into(),
            subject: "Math".into(),
            department_id: "dep-sci".into(),
        });
        store
    }

    #[test]
    fn test_index_lookups_normalize() {
        let index = seeded_store().index();
        assert_eq!(index.teacher_for_email("ADA@School.EDU"), Some("t1"));
        assert_eq!(index.venue_for_name("  room   a "), Some("v1"));
        assert_eq!(index.class_for("dep-sci", "MATH"), Some("c1"));
        assert_eq!(index.class_for("dep-arts", "Math"), None);
        assert_eq!(index.teacher_for_email("nobody@school.edu"), None);
        assert_eq!(index.venue_ids(), &["v1".to_string()]);
    }

    #[test]
    fn test_venue_exists_by_id() {
        let store = seeded_store();
        assert!(store.venue_exists("v1"));
        assert!(!store.venue_exists("room a"));
    }

    #[test]
    fn test_load_from_missing_dir_fails() {
        let result = RegistryStore::load_from_dir(Path::new("/nonexistent/registry-dir"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_dir_with_partial_files() {
        let dir = std::env::temp_dir().join(format!("registry-{}", uuid::Uuid::new_v4().simple()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("venues.json"),
            r#"[{"id": "v9", "name": "Lab 1", "capacity": 12}]"#,
        )
        .unwrap();

        let store = RegistryStore::load_from_dir(&dir).unwrap();
        assert_eq!(store.venues().len(), 1);
        assert!(store.teachers().is_empty());
        assert_eq!(store.index().venue_for_name("lab 1"), Some("v9"));

        std::fs::remove_dir_all(&dir).ok();
    }
}

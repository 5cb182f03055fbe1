//! CRUD resource files: goals, content items, and learning entries.
//!
//! Each resource is one JSON file shaped `{ "<key>": [ records... ] }`.
//! Records are handled as raw `serde_json::Value` objects so partial
//! updates merge only the fields the resource declares updatable.

use super::Store;
use anyhow::Result;
use chrono::Local;
use serde_json::{json, Value};

/// Static description of one CRUD resource file.
pub struct ResourceFile {
    /// File name under the data dir
    pub file: &'static str,
    /// Top-level array key ("goals", "items", "entries")
    pub key: &'static str,
    /// Fields a partial update may overwrite
    updatable: &'static [&'static str],
    /// Keep only the newest N records on insert
    cap: Option<usize>,
}

pub const GOALS: ResourceFile = ResourceFile {
    file: "goals.json",
    key: "goals",
    updatable: &[
        "title",
        "description",
        "milestones",
        "progress",
        "status",
        "deadline",
    ],
    cap: None,
};

pub const CONTENT: ResourceFile = ResourceFile {
    file: "content.json",
    key: "items",
    updatable: &["title", "type", "tags", "notes", "status"],
    cap: None,
};

pub const LEARNING: ResourceFile = ResourceFile {
    file: "learning.json",
    key: "entries",
    updatable: &[],
    cap: Some(100),
};

impl ResourceFile {
    /// The full document, with the array key present even for a fresh file.
    pub fn list(&self, store: &Store) -> Value {
        let items = self.load_items(store);
        json!({ self.key: items })
    }

    fn load_items(&self, store: &Store) -> Vec<Value> {
        store
            .read_json::<Value>(self.file)
            .and_then(|doc| doc.get(self.key).and_then(Value::as_array).cloned())
            .unwrap_or_default()
    }

    fn save_items(&self, store: &Store, items: Vec<Value>) -> Result<()> {
        store.write_json_atomic(self.file, &json!({ self.key: items }))
    }

    /// Append a fully-formed record, enforcing the retention cap.
    pub fn create(&self, store: &Store, record: Value) -> Result<Value> {
        store.with_resource_lock(self.file, |s| {
            let mut items = self.load_items(s);
            items.push(record.clone());
            if let Some(cap) = self.cap {
                if items.len() > cap {
                    let excess = items.len() - cap;
                    items.drain(..excess);
                }
            }
            self.save_items(s, items)?;
            Ok(record)
        })
    }

    /// Merge the updatable fields of `patch` into the record with `id`.
    /// Returns the updated record, or `None` (file untouched) when the id
    /// is unknown.
    pub fn update(&self, store: &Store, id: &str, patch: &Value) -> Result<Option<Value>> {
        store.with_resource_lock(self.file, |s| {
            let mut items = self.load_items(s);

            let Some(item) = items
                .iter_mut()
                .find(|i| i.get("id").and_then(Value::as_str) == Some(id))
            else {
                return Ok(None);
            };

            for field in self.updatable {
                if let Some(value) = patch.get(*field) {
                    item[*field] = value.clone();
                }
            }
            item["updated"] = json!(timestamp());

            let updated = item.clone();
            self.save_items(s, items)?;
            Ok(Some(updated))
        })
    }

    /// Remove the record with `id`. Returns false (file untouched) when the
    /// id is unknown.
    pub fn delete(&self, store: &Store, id: &str) -> Result<bool> {
        store.with_resource_lock(self.file, |s| {
            let mut items = self.load_items(s);
            let before = items.len();
            items.retain(|i| i.get("id").and_then(Value::as_str) != Some(id));

            if items.len() == before {
                return Ok(false);
            }

            self.save_items(s, items)?;
            Ok(true)
        })
    }
}

/// Generate a short record id (first 8 chars of a v4 UUID).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}

/// Record timestamp in the dashboard's display format.
pub fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn store() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_list_empty_resource_has_array_key() {
        let (_dir, store) = store();
        let doc = GOALS.list(&store);
        assert_eq!(doc["goals"], json!([]));
    }

    #[test]
    fn test_create_then_list() {
        let (_dir, store) = store();
        let record = json!({"id": new_id(), "title": "Ship it", "created": timestamp()});
        GOALS.create(&store, record.clone()).unwrap();

        let doc = GOALS.list(&store);
        let goals = doc["goals"].as_array().unwrap();
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0]["title"], "Ship it");
    }

    #[test]
    fn test_update_merges_only_updatable_fields() {
        let (_dir, store) = store();
        GOALS
            .create(&store, json!({"id": "abc12345", "title": "Old", "progress": 0}))
            .unwrap();

        let updated = GOALS
            .update(
                &store,
                "abc12345",
                &json!({"progress": 50, "id": "evil-overwrite", "created": "1999-01-01 00:00"}),
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated["progress"], 50);
        assert_eq!(updated["id"], "abc12345");
        assert_eq!(updated["title"], "Old");
        assert!(updated.get("created").map(|c| c != "1999-01-01 00:00").unwrap_or(true));
    }

    #[test]
    fn test_update_unknown_id_is_none() {
        let (_dir, store) = store();
        let result = GOALS.update(&store, "missing", &json!({"title": "x"})).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_delete_then_list_excludes_id() {
        let (_dir, store) = store();
        CONTENT
            .create(&store, json!({"id": "one", "title": "A"}))
            .unwrap();
        CONTENT
            .create(&store, json!({"id": "two", "title": "B"}))
            .unwrap();

        assert!(CONTENT.delete(&store, "one").unwrap());

        let doc = CONTENT.list(&store);
        let items = doc["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["id"], "two");
    }

    #[test]
    fn test_delete_unknown_id_leaves_file_untouched() {
        let (dir, store) = store();
        LEARNING
            .create(&store, json!({"id": "keep", "title": "A"}))
            .unwrap();
        let before = std::fs::read(dir.path().join("learning.json")).unwrap();

        assert!(!LEARNING.delete(&store, "missing").unwrap());

        let after = std::fs::read(dir.path().join("learning.json")).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_learning_cap_keeps_last_100() {
        let (_dir, store) = store();
        for i in 0..105 {
            LEARNING
                .create(&store, json!({"id": format!("id-{i}"), "title": "entry"}))
                .unwrap();
        }

        let doc = LEARNING.list(&store);
        let entries = doc["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 100);
        assert_eq!(entries[0]["id"], "id-5");
        assert_eq!(entries[99]["id"], "id-104");
    }

    #[test]
    fn test_new_id_is_eight_chars() {
        let id = new_id();
        assert_eq!(id.len(), 8);
        assert_ne!(id, new_id());
    }
}

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use jsonschema::Validator;
use serde::Serialize;
use serde_json::Value;

use crate::error::SchemaError;

/// One loaded schema: the raw document (for `/v1/schemas/{id}`) plus the
/// compiled Draft 2020-12 validator used by the Extraction Engine.
struct CachedSchema {
    document: Value,
    validator: Validator,
}

/// Summary row for `GET /v1/schemas`.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SchemaInfo {
    pub schema_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Loads and caches named JSON Schema documents from `SCHEMAS_DIR`.
/// Schemas are discovered by filename stem (`<stem>.json`), loaded lazily on
/// first reference, and kept in a process-wide cache keyed by stem.
/// Double-load under concurrent first-use is acceptable: the cache is a
/// write-through map, not a single-flight one.
pub struct SchemaRegistry {
    dir: PathBuf,
    cache: DashMap<String, Arc<CachedSchema>>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: DashMap::new(),
        }
    }

    fn path_for(&self, schema_id: &str) -> PathBuf {
        self.dir.join(format!("{schema_id}.json"))
    }

    /// Load (or return the cached) validator and raw document for `schema_id`.
    ///
    /// # Errors
    ///
    /// [`SchemaError::NotFound`] if no file exists at `<dir>/<schema_id>.json`;
    /// [`SchemaError::LoadFailed`] if the file is present but is not valid
    /// JSON, is not a JSON object, or does not itself satisfy the Draft
    /// 2020-12 meta-schema.
    fn load(&self, schema_id: &str) -> Result<Arc<CachedSchema>, SchemaError> {
        if let Some(entry) = self.cache.get(schema_id) {
            return Ok(Arc::clone(&entry));
        }

        let path = self.path_for(schema_id);
        if !path.exists() {
            return Err(SchemaError::NotFound(schema_id.to_owned()));
        }

        let raw = std::fs::read_to_string(&path).map_err(|e| SchemaError::LoadFailed {
                schema_id: schema_id.to_owned(),
                reason: e.to_string(),
        })?;

        let document: Value = serde_json::from_str(&raw).map_err(|e| SchemaError::LoadFailed {
                schema_id: schema_id.to_owned(),
                reason: e.to_string(),
        })?;

        if !document.is_object() {
            return Err(SchemaError::LoadFailed {
                    schema_id: schema_id.to_owned(),
                    reason: "schema JSON must be an object at the top level".to_owned(),
            });
        }

        let validator = jsonschema::options()
            .with_draft(jsonschema::Draft::Draft202012)
            .build(&document)
            .map_err(|e| SchemaError::LoadFailed {
                schema_id: schema_id.to_owned(),
                reason: e.to_string(),
        })?;

        let cached = Arc::new(CachedSchema {
                document,
                validator,
        });
        self.cache.insert(schema_id.to_owned(), Arc::clone(&cached));
        Ok(cached)
    }

    /// Full schema document, for `GET /v1/schemas/{id}`.
    ///
    /// # Errors
    ///
    /// See [`SchemaRegistry::load`].
    pub fn document(&self, schema_id: &str) -> Result<Value, SchemaError> {
        Ok(self.load(schema_id)?.document.clone())
    }

    /// Validate `instance` against `schema_id`, returning the list of
    /// validation error messages (empty iff valid).
    ///
    /// # Errors
    ///
    /// See [`SchemaRegistry::load`].
    pub fn validate(&self, schema_id: &str, instance: &Value) -> Result<Vec<String>, SchemaError> {
        let cached = self.load(schema_id)?;
        let errors = cached
            .validator
            .iter_errors(instance)
            .map(|e| e.to_string())
            .collect();
        Ok(errors)
    }

    /// List all discoverable schemas under `SCHEMAS_DIR`, sorted by stem.
    /// Malformed or non-object files are skipped, matching the reference
    /// discovery behavior: listing tolerates bad files; only direct lookup
    /// (`document`/`validate`) surfaces `schema_load_failed`.
    #[must_use]
    pub fn list(&self) -> Vec<SchemaInfo> {
        let Ok(read_dir) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        let mut entries: Vec<_> = read_dir
            .filter_map(Result::ok)
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
            .collect();
        entries.sort_by_key(std::fs::DirEntry::file_name);

        entries
            .into_iter()
            .filter_map(|entry| {
                let path = entry.path();
                let stem = path.file_stem()?.to_str()?.to_owned();
                let raw = std::fs::read_to_string(&path).ok()?;
                let payload: Value = serde_json::from_str(&raw).ok()?;
                let object = payload.as_object()?;
                Some(SchemaInfo {
                        schema_id: stem,
                        title: object.get("title").and_then(Value::as_str).map(str::to_owned),
                        description: object
                            .get("description")
                            .and_then(Value::as_str)
                            .map(str::to_owned),
                })
        })
            .collect()
    }

    /// Clear the in-memory cache so the next lookup re-reads from disk.
    pub fn reload(&self) {
        self.cache.clear();
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_schema(dir: &Path, stem: &str, body: &str) {
        let mut file = std::fs::File::create(dir.join(format!("{stem}.json"))).unwrap();
        file.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn missing_schema_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = SchemaRegistry::new(tmp.path());
        assert!(matches!(
                registry.document("nope"),
                Err(SchemaError::NotFound(_))
        ));
    }

    #[test]
    fn malformed_json_fails_to_load() {
        let tmp = tempfile::tempdir().unwrap();
        write_schema(tmp.path(), "bad", "{not json");
        let registry = SchemaRegistry::new(tmp.path());
        assert!(matches!(
                registry.document("bad"),
                Err(SchemaError::LoadFailed {.. })
        ));
    }

    #[test]
    fn valid_schema_loads_and_caches() {
        let tmp = tempfile::tempdir().unwrap();
        write_schema(
            tmp.path(),
            "ticket_v1",
            r#"{"type": "object", "properties": {"id": {"type": "string"}}, "required": ["id"]}"#,
        );
        let registry = SchemaRegistry::new(tmp.path());
        let doc = registry.document("ticket_v1").unwrap();
        assert_eq!(doc["type"], "object");

        let errors = registry
            .validate("ticket_v1", &serde_json::json!({"id": "repaired"}))
            .unwrap();
        assert!(errors.is_empty());

        let errors = registry
            .validate("ticket_v1", &serde_json::json!({"nope": 1}))
            .unwrap();
        assert!(!errors.is_empty());
    }

    #[test]
    fn reload_forces_a_fresh_read() {
        let tmp = tempfile::tempdir().unwrap();
        write_schema(tmp.path(), "s", r#"{"type": "object"}"#);
        let registry = SchemaRegistry::new(tmp.path());
        registry.document("s").unwrap();
        write_schema(tmp.path(), "s", r#"{"type": "object", "title": "renamed"}"#);
        registry.reload();
        let doc = registry.document("s").unwrap();
        assert_eq!(doc["title"], "renamed");
    }

    #[test]
    fn list_skips_malformed_files() {
        let tmp = tempfile::tempdir().unwrap();
        write_schema(tmp.path(), "a", r#"{"title": "A"}"#);
        write_schema(tmp.path(), "bad", "{not json");
        let registry = SchemaRegistry::new(tmp.path());
        let list = registry.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].schema_id, "a");
    }
}

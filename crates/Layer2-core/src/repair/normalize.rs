//! Folding the recognised file payload shapes into one [`FileMap`]

use crate::types::FileMap;
use serde_json::{Map, Value};
use tracing::debug;

const PATH_FIELDS: [&str; 4] = ["name", "filename", "path", "fileName"];
const CONTENT_FIELDS: [&str; 2] = ["content", "fileContent"];

/// The shapes a model uses to return files
#[derive(Debug, Clone, Copy)]
pub enum FilesPayload<'a> {
    /// `{"files": {"path": "content"}}`
    Map(&'a Map<String, Value>),
    /// `{"files": [{"name": .., "content": ..}]}`, or the same array at the
    /// top level
    Entries(&'a [Value]),
}

impl<'a> FilesPayload<'a> {
    /// Find the files payload in a parsed response, if any
    pub fn detect(document: &'a Value) -> Option<Self> {
        match document {
            Value::Array(entries) => Some(FilesPayload::Entries(entries)),
            Value::Object(object) => match object.get("files")? {
                Value::Object(map) => Some(FilesPayload::Map(map)),
                Value::Array(entries) => Some(FilesPayload::Entries(entries)),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn into_file_map(self) -> FileMap {
        let mut files = FileMap::new();

        match self {
            FilesPayload::Map(map) => {
                for (path, content) in map {
                    insert(&mut files, path, content);
                }
            }
            FilesPayload::Entries(entries) => {
                for entry in entries {
                    let Some(object) = entry.as_object() else {
                        debug!("Skipping non-object file entry");
                        continue;
                    };
                    let path = first_field(object, &PATH_FIELDS).and_then(Value::as_str);
                    let content = first_field(object, &CONTENT_FIELDS);
                    match (path, content) {
                        (Some(path), Some(content)) => insert(&mut files, path, content),
                        _ => debug!("Skipping file entry without a path or content"),
                    }
                }
            }
        }

        files
    }
}

/// Normalise whatever files payload the document carries
pub fn normalize_files(document: &Value) -> FileMap {
    FilesPayload::detect(document)
        .map(FilesPayload::into_file_map)
        .unwrap_or_default()
}

fn first_field<'v>(object: &'v Map<String, Value>, names: &[&str]) -> Option<&'v Value> {
    names.iter().find_map(|name| object.get(*name))
}

fn insert(files: &mut FileMap, path: &str, content: &Value) {
    let path = path.trim();
    if path.is_empty() {
        return;
    }
    let text = match content {
        Value::String(s) => s.clone(),
        Value::Null => return,
        // e.g. package.json returned as an object instead of a string
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    files.insert(path.to_string(), text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn expected() -> FileMap {
        let mut files = FileMap::new();
        files.insert("src/App.tsx".into(), "export default App".into());
        files.insert("index.html".into(), "<div id=\"root\"></div>".into());
        files
    }

    #[test]
    fn test_all_shapes_normalize_to_same_map() {
        let shapes = [
            json!({"files": {
                "src/App.tsx": "export default App",
                "index.html": "<div id=\"root\"></div>"
            }}),
            json!({"files": [
                {"fileName": "src/App.tsx", "fileContent": "export default App"},
                {"fileName": "index.html", "fileContent": "<div id=\"root\"></div>"}
            ]}),
            json!({"files": [
                {"name": "src/App.tsx", "content": "export default App"},
                {"name": "index.html", "content": "<div id=\"root\"></div>"}
            ]}),
            json!({"files": [
                {"path": "src/App.tsx", "content": "export default App"},
                {"filename": "index.html", "content": "<div id=\"root\"></div>"}
            ]}),
            json!([
                {"path": "src/App.tsx", "content": "export default App"},
                {"path": "index.html", "content": "<div id=\"root\"></div>"}
            ]),
        ];

        for shape in &shapes {
            assert_eq!(normalize_files(shape), expected(), "shape: {}", shape);
        }
    }

    #[test]
    fn test_structured_content_is_pretty_printed() {
        let files = normalize_files(&json!({"files": {"package.json": {"name": "app"}}}));
        assert_eq!(files["package.json"], "{\n  \"name\": \"app\"\n}");
    }

    #[test]
    fn test_incomplete_entries_are_skipped() {
        let files = normalize_files(&json!({"files": [
            {"name": "a.ts"},
            {"content": "orphan"},
            "not an object",
            {"name": "  ", "content": "blank path"},
            {"name": "b.ts", "content": "ok"}
        ]}));
        assert_eq!(files.len(), 1);
        assert_eq!(files["b.ts"], "ok");
    }

    #[test]
    fn test_missing_files_payload() {
        assert!(normalize_files(&json!({"explanation": "nothing"})).is_empty());
        assert!(normalize_files(&json!({"files": "index.html"})).is_empty());
        assert!(normalize_files(&json!("text")).is_empty());
    }
}

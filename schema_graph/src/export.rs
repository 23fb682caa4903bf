//! Schema export
//!
//! Serializes a [`Schema`] into JSON documents handed to a [`Sink`]. A
//! failing write stops the export; documents already written stay.

use serde::Serialize;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::config::ExportMode;
use crate::error::{Error, Result};
use crate::schema::types::Schema;

/// Destination for exported documents
pub trait Sink {
    /// Store `content` as the document `name` inside `folder`
    fn write<T: Serialize + ?Sized>(&self, name: &str, content: &T, folder: &Path) -> Result<()>;
}

/// Writes `<folder>/<name>.json`, creating the folder when needed
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSink;

impl Sink for FileSink {
    fn write<T: Serialize + ?Sized>(&self, name: &str, content: &T, folder: &Path) -> Result<()> {
        let path = document_path(folder, name)?;
        let body = to_pretty_json(content)?;

        fs::create_dir_all(folder)
            .and_then(|_| fs::write(&path, body))
            .map_err(|e| Error::SinkError(format!("writing {}: {}", path.display(), e)))?;

        tracing::debug!(path = %path.display(), "Wrote document");
        Ok(())
    }
}

/// `<folder>/<name>.json`; the name must stay a single file name
fn document_path(folder: &Path, name: &str) -> Result<PathBuf> {
    let file_name = format!("{}.json", name);
    let mut components = Path::new(&file_name).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );

    if !single || name.is_empty() || name.contains(['/', '\\']) {
        return Err(Error::SinkError(format!(
            "document name `{}` is not a plain file name",
            name
        )));
    }

    Ok(folder.join(file_name))
}

/// Render JSON with four-space indentation
pub fn to_pretty_json<T: Serialize + ?Sized>(content: &T) -> Result<String> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    content.serialize(&mut serializer)?;

    String::from_utf8(buffer).map_err(|e| Error::SerializationError(e.to_string()))
}

/// Write one document per table, named after the table.
///
/// Returns the number of documents written.
pub fn export_per_table<S: Sink>(schema: &Schema, sink: &S, folder: &Path) -> Result<usize> {
    for (table_name, table) in &schema.tables {
        sink.write(table_name, table, folder)?;
    }

    tracing::info!(tables = schema.tables.len(), folder = %folder.display(), "Exported schema per table");
    Ok(schema.tables.len())
}

/// Write every table as one document named `<name>.schema`
pub fn export_combined<S: Sink>(
    schema: &Schema,
    sink: &S,
    folder: &Path,
    name: &str,
) -> Result<()> {
    let document = format!("{}.schema", name);
    sink.write(&document, &schema.tables, folder)?;

    tracing::info!(document = %document, folder = %folder.display(), "Exported combined schema");
    Ok(())
}

/// Export in the given layout; returns the number of documents written
pub fn export_schema<S: Sink>(
    schema: &Schema,
    sink: &S,
    folder: &Path,
    mode: ExportMode,
    name: &str,
) -> Result<usize> {
    match mode {
        ExportMode::Combined => export_combined(schema, sink, folder, name).map(|_| 1),
        ExportMode::PerTable => export_per_table(schema, sink, folder),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{Field, KeyKind, Table};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pretty_json_uses_four_spaces() {
        let json = to_pretty_json(&serde_json::json!({"a": [1]})).unwrap();
        assert_eq!(json, "{\n    \"a\": [\n        1\n    ]\n}");
    }

    #[test]
    fn test_file_sink_rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("out");

        for name in ["../escape", "nested/table", "..\\escape", "/abs", ""] {
            let result = FileSink.write(name, &serde_json::json!({}), &folder);
            assert!(matches!(result, Err(Error::SinkError(_))), "{:?} accepted", name);
        }
        assert!(!dir.path().join("escape.json").exists());

        FileSink.write("odd..name", &serde_json::json!({}), &folder).unwrap();
        assert!(folder.join("odd..name.json").exists());
    }

    #[test]
    fn test_file_sink_creates_folder() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("nested/out");

        let mut schema = Schema::new("mysql");
        schema.add_table("contacts", Table::new(vec![Field::new("id", "int").key(KeyKind::Primary)]));

        export_combined(&schema, &FileSink, &folder, "crm").unwrap();

        let written = fs::read_to_string(folder.join("crm.schema.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["contacts"]["fields"][0]["keyKind"], "PRIMARY");
        assert!(value.get("kind").is_none());
    }
}

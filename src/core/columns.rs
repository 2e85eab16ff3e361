// Column selection: exact names pass through, patterns match against a collection.
use std::path::Path;

use regex::Regex;

use crate::core::error::{Error, ErrorKind};
use crate::store::source::SourceHandle;

/// Resolves a column spec against one source's collection.
///
/// Exact mode returns the names as given without touching the source; a
/// missing column surfaces from the read itself. Pattern mode opens the
/// source transiently and selects, in declaration order, every column the
/// anchored patterns match; the first matching pattern claims the column.
/// Every pattern must match at least one column.
pub fn resolve_columns(
    path: &Path,
    collection: &str,
    requested: &[String],
    use_patterns: bool,
) -> Result<Vec<String>, Error> {
    if !use_patterns {
        return Ok(requested.to_vec());
    }

    let mut patterns = Vec::with_capacity(requested.len());
    for pattern in requested {
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|err| {
            Error::new(ErrorKind::Validation)
                .with_message(format!("invalid column pattern '{pattern}'"))
                .with_source(err)
        })?;
        patterns.push(regex);
    }

    let handle = SourceHandle::open(path)?;
    let target = handle.collection(collection)?;

    let mut used = vec![false; patterns.len()];
    let mut selected = Vec::new();
    for name in target.column_names() {
        let matched = patterns.iter().position(|regex| regex.is_match(name));
        if let Some(idx) = matched {
            used[idx] = true;
            selected.push(name.to_string());
        }
    }

    if selected.is_empty() {
        return Err(Error::new(ErrorKind::NoMatch)
            .with_message("column patterns matched no columns in the collection")
            .with_collection(collection)
            .with_path(path));
    }
    let unmatched: Vec<&str> = requested
        .iter()
        .zip(&used)
        .filter(|(_, used)| !**used)
        .map(|(pattern, _)| pattern.as_str())
        .collect();
    if !unmatched.is_empty() {
        return Err(Error::new(ErrorKind::NoMatch)
            .with_message(format!(
                "column patterns matched no columns: {}",
                unmatched.join(", ")
            ))
            .with_collection(collection)
            .with_path(path));
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::resolve_columns;
    use crate::core::error::ErrorKind;
    use crate::store::field::{ColumnData, FieldType};
    use crate::store::writer::{CollectionOptions, SourceWriter};
    use std::path::{Path, PathBuf};

    fn write_source(path: &Path) {
        let mut writer = SourceWriter::create(path).expect("create source");
        let schema = vec![
            ("x".to_string(), FieldType::I32),
            ("x_low".to_string(), FieldType::I32),
            ("y_high".to_string(), FieldType::I32),
            ("other".to_string(), FieldType::I32),
        ];
        let mut collection = writer
            .collection("events", &schema, CollectionOptions::default())
            .expect("collection");
        let batch = ColumnData::I32(vec![1, 2, 3]);
        collection
            .append(&[batch.clone(), batch.clone(), batch.clone(), batch])
            .expect("append");
        collection.finish().expect("finish collection");
        writer.finish().expect("finish source");
    }

    #[test]
    fn exact_mode_passes_names_through_without_io() {
        let resolved = resolve_columns(
            &PathBuf::from("does-not-exist.scol"),
            "events",
            &["x".to_string(), "other".to_string()],
            false,
        )
        .expect("resolve");
        assert_eq!(resolved, vec!["x".to_string(), "other".to_string()]);
    }

    #[test]
    fn patterns_select_in_collection_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("events.scol");
        write_source(&path);

        let resolved = resolve_columns(&path, "events", &["(x|y)_.*".to_string()], true)
            .expect("resolve");
        assert_eq!(resolved, vec!["x_low".to_string(), "y_high".to_string()]);

        let all = resolve_columns(&path, "events", &[".*".to_string()], true).expect("resolve");
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn unmatched_patterns_are_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("events.scol");
        write_source(&path);

        let err = resolve_columns(&path, "events", &["z_.*".to_string()], true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoMatch);

        let err = resolve_columns(
            &path,
            "events",
            &["x".to_string(), "z_.*".to_string()],
            true,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoMatch);
        assert!(err.to_string().contains("z_.*"));
    }

    #[test]
    fn invalid_pattern_is_a_validation_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("events.scol");
        write_source(&path);

        let err = resolve_columns(&path, "events", &["(".to_string()], true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}

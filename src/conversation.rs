//! Conversation names and their upload folders.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::{DocQaError, Result};

/// `YYYYMMDD_xxxxxxxx`: today's UTC date and eight random hex digits.
pub fn generate_conversation_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", Utc::now().format("%Y%m%d"), &suffix[..8])
}

pub fn conversation_folder(root: &Path, name: &str) -> PathBuf {
    root.join(name)
}

/// Copy `source` into `folder`, creating it on demand. Returns the stored path.
pub fn save_upload(folder: &Path, source: &Path) -> Result<PathBuf> {
    let file_name = source
        .file_name()
        .ok_or_else(|| DocQaError::parse(source, "not a file path"))?;
    std::fs::create_dir_all(folder).map_err(|e| DocQaError::io(folder, e))?;
    let target = folder.join(file_name);
    std::fs::copy(source, &target).map_err(|e| DocQaError::io(source, e))?;
    tracing::info!(source = %source.display(), target = %target.display(), "saved upload");
    Ok(target)
}

/// File names in `folder`, sorted. A folder that does not exist yet is empty.
pub fn list_uploaded_files(folder: &Path) -> Result<Vec<String>> {
    let entries = match std::fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(DocQaError::io(folder, e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DocQaError::io(folder, e))?;
        if entry.path().is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_id_shape() {
        let id = generate_conversation_id();
        let (date, suffix) = id.split_once('_').unwrap();
        assert_eq!(date.len(), 8);
        assert!(date.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(date, Utc::now().format("%Y%m%d").to_string());
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(generate_conversation_id(), id);
    }

    #[test]
    fn test_save_and_list_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("b-notes.txt");
        std::fs::write(&source, "hello").unwrap();
        let other = dir.path().join("a-report.md");
        std::fs::write(&other, "# hi").unwrap();

        let folder = conversation_folder(&dir.path().join("uploads"), "20240101_0badf00d");
        assert!(list_uploaded_files(&folder).unwrap().is_empty());

        let stored = save_upload(&folder, &source).unwrap();
        assert_eq!(stored, folder.join("b-notes.txt"));
        assert_eq!(std::fs::read_to_string(&stored).unwrap(), "hello");
        save_upload(&folder, &other).unwrap();

        assert_eq!(
            list_uploaded_files(&folder).unwrap(),
            vec!["a-report.md".to_string(), "b-notes.txt".to_string()]
        );
    }

    #[test]
    fn test_save_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_upload(dir.path(), &dir.path().join("nope.pdf")).unwrap_err();
        assert!(matches!(err, DocQaError::Io { .. }));
    }
}

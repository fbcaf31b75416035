//! Reading documents from disk.
//!
//! Documents are identified by file name. Files found by
//! [`load_directory`] use their path relative to the root as the document id
//! so that equally named files in different subdirectories stay distinct.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::document::Document;
use crate::error::{RagError, Result};

/// Metadata key holding the path a document was read from.
pub const FILE_PATH_KEY: &str = "file_path";

/// Extension used when none is given.
pub const DEFAULT_EXTENSION: &str = "txt";

fn source_error(path: &Path, message: impl Into<String>) -> RagError {
    RagError::DocumentSource { path: path.display().to_string(), message: message.into() }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext)))
}

fn read_document(path: &Path) -> Result<Document> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| source_error(path, "file name is not valid UTF-8"))?;
    let text = fs::read_to_string(path).map_err(|e| source_error(path, e.to_string()))?;
    Ok(Document::new(name, text).with_metadata(FILE_PATH_KEY, path.display().to_string()))
}

/// Recursively load every file under `root` whose extension is in
/// `extensions` (case-insensitive, with or without a leading dot).
///
/// Files are returned sorted by path. An empty `extensions` list means
/// [`DEFAULT_EXTENSION`].
///
/// # Errors
///
/// Returns [`RagError::DocumentSource`] if `root` is not a directory, if no
/// matching file exists, or if a matching file is not valid UTF-8 text.
pub fn load_directory(root: impl AsRef<Path>, extensions: &[&str]) -> Result<Vec<Document>> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(source_error(root, "directory does not exist"));
    }

    let mut extensions: Vec<String> =
        extensions.iter().map(|ext| ext.trim_start_matches('.').to_string()).collect();
    if extensions.is_empty() {
        extensions.push(DEFAULT_EXTENSION.to_string());
    }

    let mut files = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = %err, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| has_extension(entry.path(), &extensions))
        .map(|entry| entry.into_path())
        .collect::<Vec<PathBuf>>();
    files.sort();

    if files.is_empty() {
        return Err(source_error(
            root,
            format!("no files with extension {} found", extensions.join(", ")),
        ));
    }

    files
        .iter()
        .map(|path| {
            let relative = path.strip_prefix(root).unwrap_or(path);
            let id = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            debug!(path = %path.display(), "loaded document");
            read_document(path).map(|doc| doc.with_id(id))
        })
        .collect()
}

/// Load individually named files, such as uploads.
///
/// Paths that do not exist or are not files are skipped with a warning.
///
/// # Errors
///
/// Returns [`RagError::DocumentSource`] if none of the paths is a readable
/// file, or if an existing file is not valid UTF-8 text.
pub fn load_files<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Document>> {
    let mut documents = Vec::with_capacity(paths.len());

    for path in paths {
        let path = path.as_ref();
        if !path.is_file() {
            warn!(path = %path.display(), "skipping missing file");
            continue;
        }
        documents.push(read_document(path)?);
    }

    if documents.is_empty() {
        return Err(RagError::DocumentSource {
            path: paths
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
            message: "no valid files to load".to_string(),
        });
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_matching_files_recursively() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("streaming")).unwrap();
        fs::write(root.join("lakehouse.txt"), "A lakehouse combines...").unwrap();
        fs::write(root.join("streaming/kafka.TXT"), "Kafka partitions...").unwrap();
        fs::write(root.join("notes.md"), "ignored").unwrap();

        let docs = load_directory(root, &[]).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source, "lakehouse.txt");
        assert_eq!(docs[0].id, "lakehouse.txt");
        assert_eq!(docs[1].source, "kafka.TXT");
        assert_eq!(docs[1].id, "streaming/kafka.TXT");
        assert!(docs[1].metadata[FILE_PATH_KEY].ends_with("kafka.TXT"));
    }

    #[test]
    fn extension_filter_accepts_leading_dot() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("a.md"), "markdown").unwrap();
        fs::write(temp.path().join("b.txt"), "text").unwrap();

        let docs = load_directory(temp.path(), &[".md"]).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "markdown");
    }

    #[test]
    fn missing_or_empty_directory_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let missing = load_directory(temp.path().join("nope"), &["txt"]).unwrap_err();
        assert!(matches!(missing, RagError::DocumentSource { .. }));

        let empty = load_directory(temp.path(), &["txt"]).unwrap_err();
        assert!(empty.to_string().contains("no files"));
    }

    #[test]
    fn invalid_utf8_is_reported() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("bad.txt"), [0xff, 0xfe, 0x00]).unwrap();
        let err = load_directory(temp.path(), &["txt"]).unwrap_err();
        assert!(matches!(err, RagError::DocumentSource { .. }));
    }

    #[test]
    fn uploads_skip_missing_paths() {
        let temp = tempfile::tempdir().unwrap();
        let present = temp.path().join("upload.txt");
        fs::write(&present, "uploaded").unwrap();

        let docs = load_files(&[temp.path().join("gone.txt"), present]).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source, "upload.txt");

        let err = load_files(&[temp.path().join("gone.txt")]).unwrap_err();
        assert!(err.to_string().contains("no valid files"));
    }
}

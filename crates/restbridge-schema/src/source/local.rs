//! Local-directory descriptor source: recursively scan for `.desc` files.
//!
//! Each `.desc` file holds one serialized `FileDescriptorSet`. The bytes are
//! concatenated, not decoded: protobuf's wire format merges repeated fields
//! by concatenation, and `FileDescriptorSet` has exactly one field (`file`,
//! repeated), so the raw concatenation of several valid encodings decodes to
//! their union. Staying at the byte level here — rather than decoding into
//! `prost_types::FileDescriptorSet` and re-encoding — means the
//! `google.api.http` extension on `MethodOptions` survives untouched for
//! `restbridge_core::raw_method_options` to read later; a typed decode would
//! drop it immediately, extension or no.

use std::path::{Path, PathBuf};

const DESCRIPTOR_EXTENSION: &str = "desc";

/// Errors scanning or reading descriptor files from a local directory.
#[derive(Debug, thiserror::Error)]
pub enum LocalSourceError {
    /// The configured root path exists but is not a directory (or doesn't
    /// exist at all).
    #[error("descriptor source path '{0}' is not a directory")]
    PathIsNotDir(PathBuf),
    /// The directory was scanned successfully but contained no `.desc`
    /// files.
    #[error("no descriptor files (*.{DESCRIPTOR_EXTENSION}) found under '{0}'")]
    FileDescriptorsNotFound(PathBuf),
    /// Reading a descriptor file failed.
    #[error("failed to read descriptor file '{path}': {source}")]
    ReadFailed {
        /// The file that failed to read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Scans a directory recursively for `.desc` files and concatenates them
/// into one raw `FileDescriptorSet` byte stream.
#[derive(Clone)]
pub struct LocalSource {
    root: PathBuf,
}

impl LocalSource {
    /// Create a source rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { root: dir.into() }
    }

    /// Scan the directory and concatenate every `.desc` file found.
    ///
    /// # Errors
    ///
    /// Returns [`LocalSourceError::PathIsNotDir`] if the root isn't a
    /// directory, [`LocalSourceError::FileDescriptorsNotFound`] if no
    /// `.desc` files turn up, or [`LocalSourceError::ReadFailed`] if one
    /// can't be read.
    pub fn fetch(&self) -> Result<Vec<u8>, LocalSourceError> {
        if !self.root.is_dir() {
            return Err(LocalSourceError::PathIsNotDir(self.root.clone()));
        }

        let mut paths = Vec::new();
        collect_descriptor_paths(&self.root, &mut paths)?;
        if paths.is_empty() {
            return Err(LocalSourceError::FileDescriptorsNotFound(self.root.clone()));
        }
        paths.sort();

        let mut out = Vec::new();
        for path in paths {
            let bytes = std::fs::read(&path).map_err(|source| LocalSourceError::ReadFailed {
                path: path.clone(),
                source,
            })?;
            out.extend_from_slice(&bytes);
        }
        Ok(out)
    }
}

fn collect_descriptor_paths(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), LocalSourceError> {
    let entries = std::fs::read_dir(dir).map_err(|source| LocalSourceError::ReadFailed {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| LocalSourceError::ReadFailed {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_descriptor_paths(&path, out)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some(DESCRIPTOR_EXTENSION) {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message as _;
    use prost_types::{FileDescriptorProto, FileDescriptorSet};

    #[test]
    fn missing_directory_is_rejected() {
        let source = LocalSource::new("/nonexistent/path/for/restbridge/tests");
        assert!(matches!(
            source.fetch(),
            Err(LocalSourceError::PathIsNotDir(_))
        ));
    }

    #[test]
    fn empty_directory_yields_not_found() {
        let dir = std::env::temp_dir().join(format!(
            "restbridge-local-source-test-empty-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let source = LocalSource::new(&dir);
        assert!(matches!(
            source.fetch(),
            Err(LocalSourceError::FileDescriptorsNotFound(_))
        ));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn reads_and_concatenates_desc_files_into_one_valid_set() {
        let dir = std::env::temp_dir().join(format!(
            "restbridge-local-source-test-merge-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(dir.join("nested")).unwrap();

        let set_a = FileDescriptorSet {
            file: vec![FileDescriptorProto {
                name: Some("a.proto".to_string()),
                ..Default::default()
            }],
        };
        let set_b = FileDescriptorSet {
            file: vec![FileDescriptorProto {
                name: Some("b.proto".to_string()),
                ..Default::default()
            }],
        };
        std::fs::write(dir.join("a.desc"), set_a.encode_to_vec()).unwrap();
        std::fs::write(dir.join("nested/b.desc"), set_b.encode_to_vec()).unwrap();

        let source = LocalSource::new(&dir);
        let raw = source.fetch().unwrap();
        let merged = FileDescriptorSet::decode(raw.as_slice()).unwrap();
        let mut names: Vec<&str> = merged.file.iter().map(|f| f.name()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["a.proto", "b.proto"]);

        std::fs::remove_dir_all(&dir).ok();
    }
}

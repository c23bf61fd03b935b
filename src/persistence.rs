//! Persistence layer for saving/loading vector collections.
//!
//! Supports both JSON (human-readable) and bincode (efficient binary) formats.

use crate::error::{RagError, Result};
use crate::store::Collection;
use std::fs;
use std::path::Path;

/// Save format for collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFormat {
    /// JSON format (human-readable, larger).
    Json,
    /// Bincode format (binary, compact).
    Bincode,
}

impl SaveFormat {
    /// Determine format from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => SaveFormat::Json,
            _ => SaveFormat::Bincode,
        }
    }
}

/// Save a collection, choosing the format from the extension.
pub fn save_collection(collection: &Collection, path: &Path) -> Result<()> {
    save_collection_with_format(collection, path, SaveFormat::from_path(path))
}

/// Save a collection with a specific format.
pub fn save_collection_with_format(
    collection: &Collection,
    path: &Path,
    format: SaveFormat,
) -> Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| RagError::io(parent, e))?;
        }
    }

    let data = match format {
        SaveFormat::Json => serde_json::to_vec_pretty(collection)
            .map_err(|e| RagError::Serialization(e.to_string()))?,
        SaveFormat::Bincode => {
            let config = bincode::config::standard();
            bincode::encode_to_vec(collection, config)
                .map_err(|e| RagError::Serialization(e.to_string()))?
        }
    };

    fs::write(path, &data).map_err(|e| RagError::io(path, e))?;

    Ok(())
}

/// Load a collection from a file.
pub fn load_collection(path: &Path) -> Result<Collection> {
    if !path.exists() {
        return Err(RagError::CollectionNotFound(path.to_path_buf()));
    }

    load_collection_with_format(path, SaveFormat::from_path(path))
}

/// Load a collection with a specific format.
pub fn load_collection_with_format(path: &Path, format: SaveFormat) -> Result<Collection> {
    let data = fs::read(path).map_err(|e| RagError::io(path, e))?;

    let collection = match format {
        SaveFormat::Json => serde_json::from_slice(&data)
            .map_err(|e| RagError::Serialization(e.to_string()))?,
        SaveFormat::Bincode => {
            let config = bincode::config::standard();
            let (collection, _): (Collection, usize) = bincode::decode_from_slice(&data, config)
                .map_err(|e| RagError::Serialization(e.to_string()))?;
            collection
        }
    };

    Ok(collection)
}

/// Check if a collection file exists at the given path.
pub fn collection_exists(path: &Path) -> bool {
    path.exists() && path.is_file()
}

/// Get the size of a collection file in bytes.
pub fn collection_size(path: &Path) -> Result<u64> {
    let metadata = fs::metadata(path).map_err(|e| RagError::io(path, e))?;
    Ok(metadata.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SourceKind;
    use crate::store::{ChunkMetadata, ChunkRecord};
    use tempfile::TempDir;

    fn create_test_collection() -> Collection {
        let mut collection = Collection::new("course", "test-embed");
        collection.dimension = Some(3);
        collection.records.push(ChunkRecord::new(
            "Dialectical materialism studies the most general laws.".to_string(),
            ChunkMetadata {
                source: "marxism.pdf".to_string(),
                page: 15,
                kind: SourceKind::Pdf,
                chunk_index: 0,
            },
            vec![0.1, 0.2, 0.3],
        ));
        collection
    }

    #[test]
    fn test_save_and_load_bincode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db").join("course.bin");

        let original = create_test_collection();
        save_collection(&original, &path).unwrap();

        assert!(collection_exists(&path));

        let loaded = load_collection(&path).unwrap();
        assert_eq!(loaded.name, original.name);
        assert_eq!(loaded.dimension, Some(3));
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.records[0].metadata.page, 15);
        assert_eq!(loaded.records[0].embedding, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_save_and_load_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("course.json");

        save_collection(&create_test_collection(), &path).unwrap();

        // Read as text and verify it's valid JSON
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("marxism.pdf"));

        let loaded = load_collection(&path).unwrap();
        assert_eq!(loaded.records[0].id, "marxism.pdf#15#0");
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(SaveFormat::from_path(Path::new("c.json")), SaveFormat::Json);
        assert_eq!(SaveFormat::from_path(Path::new("c.bin")), SaveFormat::Bincode);
        assert_eq!(SaveFormat::from_path(Path::new("c")), SaveFormat::Bincode);
    }

    #[test]
    fn test_load_nonexistent() {
        let result = load_collection(Path::new("/nonexistent/course.bin"));
        assert!(matches!(result, Err(RagError::CollectionNotFound(_))));
    }

    #[test]
    fn test_collection_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("course.bin");
        save_collection(&create_test_collection(), &path).unwrap();
        assert!(collection_size(&path).unwrap() > 0);
    }

    #[test]
    fn test_corrupt_file_is_serialization_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("course.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_collection(&path),
            Err(RagError::Serialization(_))
        ));
    }
}

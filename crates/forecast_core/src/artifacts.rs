//! Startup artifacts: encoding maps, store attributes and the fitted model.
//!
//! Each artifact is a single file whose format follows its extension:
//! `.json` is read with serde_json, `.bin` with bincode.

use crate::encoding::{EncodingMaps, EncodingMapsFile};
use crate::errors::{ArtifactError, Result};
use crate::gbdt::Model;
use crate::stores::StoreTable;
use salescast_types::StoreAttributes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";
pub const DEFAULT_ENCODING_MAPS_FILE: &str = "encoding_maps.json";
pub const DEFAULT_STORE_ATTRIBUTES_FILE: &str = "stores_data.json";
pub const DEFAULT_MODEL_FILE: &str = "model.json";

/// Where the three startup artifacts live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub encoding_maps: PathBuf,
    pub store_attributes: PathBuf,
    pub model: PathBuf,
}

impl ArtifactPaths {
    /// Default file names inside `dir`
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            encoding_maps: dir.join(DEFAULT_ENCODING_MAPS_FILE),
            store_attributes: dir.join(DEFAULT_STORE_ATTRIBUTES_FILE),
            model: dir.join(DEFAULT_MODEL_FILE),
        }
    }
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self::in_dir(DEFAULT_ARTIFACTS_DIR)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Bincode,
}

fn format_of(path: &Path) -> Result<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("bin") => Ok(Format::Bincode),
        _ => Err(ArtifactError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn decode_json<T: DeserializeOwned>(path: &Path, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn decode_bincode<T: DeserializeOwned>(path: &Path, bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|source| ArtifactError::Bincode {
        path: path.to_path_buf(),
        source,
    })
}

/// Read any artifact, picking the decoder from the file extension.
pub fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let format = format_of(path)?;
    let bytes = read_bytes(path)?;
    match format {
        Format::Json => decode_json(path, &bytes),
        Format::Bincode => decode_bincode(path, &bytes),
    }
}

/// Write an artifact in the format implied by its extension.
pub fn write_artifact<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = match format_of(path)? {
        Format::Json => serde_json::to_vec_pretty(value).map_err(|source| ArtifactError::Json {
            path: path.to_path_buf(),
            source,
        })?,
        Format::Bincode => {
            bincode::serialize(value).map_err(|source| ArtifactError::Bincode {
                path: path.to_path_buf(),
                source,
            })?
        }
    };
    fs::write(path, bytes).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load encoding maps. JSON files may use the legacy positional list;
/// bincode files always hold the name-keyed form.
pub fn load_encoding_maps(path: &Path) -> Result<EncodingMaps> {
    let maps = match format_of(path)? {
        Format::Json => {
            let file: EncodingMapsFile = decode_json(path, &read_bytes(path)?)?;
            EncodingMaps::from_file(file)?
        }
        Format::Bincode => {
            let maps: EncodingMaps = decode_bincode(path, &read_bytes(path)?)?;
            maps.validate()?;
            maps
        }
    };
    info!(path = %path.display(), columns = maps.len(), "encoding maps loaded");
    Ok(maps)
}

pub fn load_store_table(path: &Path) -> Result<StoreTable> {
    let rows: Vec<StoreAttributes> = read_artifact(path)?;
    let table = StoreTable::from_rows(rows)?;
    info!(path = %path.display(), stores = table.len(), "store attributes loaded");
    Ok(table)
}

pub fn load_model(path: &Path) -> Result<Model> {
    let model: Model = read_artifact(path)?;
    model.validate()?;
    info!(
        path = %path.display(),
        trees = model.num_trees(),
        features = model.feature_names.len(),
        "model loaded"
    );
    Ok(model)
}

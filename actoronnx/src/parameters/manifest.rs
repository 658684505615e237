// Header layout follows the safetensors container format:
// https://github.com/huggingface/safetensors

use std::{
    collections::HashMap,
    fs::File,
    os::unix::fs::FileExt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::DataType;

pub const WEIGHTS_FILE_NAME: &str = "model.safetensors";
pub const WEIGHTS_INDEX_FILE_NAME: &str = "model.safetensors.index.json";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("No weights found in {0:?} (neither {WEIGHTS_FILE_NAME} nor {WEIGHTS_INDEX_FILE_NAME})")]
    WeightsNotFound(PathBuf),
    #[error("The safetensors header of {0:?} is not valid UTF-8")]
    InvalidHeader(PathBuf),
    #[error("The safetensors header of {0:?} is not valid JSON")]
    InvalidHeaderDeserialization(PathBuf),
    #[error("The safetensors header of {0:?} declares an invalid length")]
    InvalidHeaderLength(PathBuf),
    #[error("Tensor \"{key}\" is stored as {dtype:?}, which this loader does not support")]
    UnsupportedDtype { key: String, dtype: Dtype },
    #[error("The shard index references \"{0}\", which does not exist")]
    MissingShard(String),
    #[error("Failed to parse the shard index")]
    IndexJson(#[from] serde_json::Error),
    #[error("Failed to read weights")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShardHeader {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "__metadata__")]
    pub metadata: Option<HashMap<String, String>>,
    #[serde(flatten)]
    pub tensors: HashMap<String, TensorInfo>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TensorInfo {
    pub dtype: Dtype,
    pub shape: Vec<usize>,
    pub data_offsets: (usize, usize),
}

#[derive(
    Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Ord, PartialOrd,
)]
#[non_exhaustive]
pub enum Dtype {
    BOOL,
    U8,
    I8,
    I16,
    U16,
    F16,
    BF16,
    I32,
    U32,
    F32,
    F64,
    I64,
    U64,
}

impl Dtype {
    pub fn to_data_type(self, key: &str) -> Result<DataType, ManifestError> {
        match self {
            Dtype::F16 => Ok(DataType::F16),
            Dtype::BF16 => Ok(DataType::BF16),
            Dtype::F32 => Ok(DataType::F32),
            Dtype::F64 => Ok(DataType::F64),
            Dtype::I8 => Ok(DataType::I8),
            Dtype::U8 => Ok(DataType::U8),
            Dtype::I16 => Ok(DataType::I16),
            Dtype::U16 => Ok(DataType::U16),
            Dtype::I32 => Ok(DataType::I32),
            Dtype::U32 => Ok(DataType::U32),
            Dtype::I64 => Ok(DataType::I64),
            Dtype::U64 => Ok(DataType::U64),
            dtype => Err(ManifestError::UnsupportedDtype {
                key: key.to_string(),
                dtype,
            }),
        }
    }
}

impl From<DataType> for Dtype {
    fn from(data_type: DataType) -> Self {
        match data_type {
            DataType::F16 => Dtype::F16,
            DataType::BF16 => Dtype::BF16,
            DataType::F32 => Dtype::F32,
            DataType::F64 => Dtype::F64,
            DataType::I8 => Dtype::I8,
            DataType::U8 => Dtype::U8,
            DataType::I16 => Dtype::I16,
            DataType::U16 => Dtype::U16,
            DataType::I32 => Dtype::I32,
            DataType::U32 => Dtype::U32,
            DataType::I64 => Dtype::I64,
            DataType::U64 => Dtype::U64,
        }
    }
}

const MAX_HEADER_SIZE: usize = 100_000_000;

pub fn read_shard_header(
    path: &Path,
    file: &File,
) -> Result<(usize, ShardHeader), ManifestError> {
    let mut length_buffer = [0u8; size_of::<u64>()];
    file.read_exact_at(&mut length_buffer, 0)
        .map_err(|_| ManifestError::InvalidHeaderLength(path.to_path_buf()))?;
    let header_size: usize = u64::from_le_bytes(length_buffer)
        .try_into()
        .map_err(|_| ManifestError::InvalidHeaderLength(path.to_path_buf()))?;
    if header_size > MAX_HEADER_SIZE {
        return Err(ManifestError::InvalidHeaderLength(path.to_path_buf()));
    }

    let mut json_buffer = vec![0u8; header_size];
    file.read_exact_at(&mut json_buffer, size_of::<u64>() as u64)
        .map_err(|_| ManifestError::InvalidHeader(path.to_path_buf()))?;
    let string = core::str::from_utf8(&json_buffer)
        .map_err(|_| ManifestError::InvalidHeader(path.to_path_buf()))?;
    let header: ShardHeader = serde_json::from_str(string)
        .map_err(|_| ManifestError::InvalidHeaderDeserialization(path.to_path_buf()))?;
    Ok((size_of::<u64>() + header_size, header))
}

/// `model.safetensors.index.json` as written by HF `save_pretrained`.
#[derive(Debug, Deserialize)]
struct WeightIndex {
    weight_map: HashMap<String, String>,
}

#[derive(Debug)]
pub struct ManifestEntry {
    pub shard: usize,
    pub shape: Box<[usize]>,
    pub data_type: DataType,
    /// Absolute byte offset within the shard file.
    pub offset: usize,
    pub size: usize,
}

/// Unified tensor index over a checkpoint directory, covering both the
/// single-file and the sharded-index layouts.
#[derive(Debug)]
pub struct CheckpointManifest {
    entries: HashMap<String, ManifestEntry>,
    shards: Vec<File>,
}

impl CheckpointManifest {
    pub fn open(dir: &Path) -> Result<Self, ManifestError> {
        let single = dir.join(WEIGHTS_FILE_NAME);
        if single.is_file() {
            return Self::from_shards(&[single]);
        }
        let index_path = dir.join(WEIGHTS_INDEX_FILE_NAME);
        if !index_path.is_file() {
            return Err(ManifestError::WeightsNotFound(dir.to_path_buf()));
        }
        let index: WeightIndex =
            serde_json::from_str(&std::fs::read_to_string(&index_path)?)?;
        let mut shard_names: Vec<&String> = index.weight_map.values().collect();
        shard_names.sort();
        shard_names.dedup();
        let shard_paths: Vec<PathBuf> =
            shard_names.iter().map(|name| dir.join(name)).collect();
        for (name, path) in shard_names.iter().zip(&shard_paths) {
            if !path.is_file() {
                return Err(ManifestError::MissingShard(name.to_string()));
            }
        }
        Self::from_shards(&shard_paths)
    }

    fn from_shards(paths: &[PathBuf]) -> Result<Self, ManifestError> {
        let mut entries = HashMap::new();
        let mut shards = Vec::with_capacity(paths.len());
        for (shard, path) in paths.iter().enumerate() {
            let file = File::open(path)?;
            let (data_start, header) = read_shard_header(path, &file)?;
            for (key, info) in header.tensors {
                let (begin, end) = info.data_offsets;
                let data_type = info.dtype.to_data_type(&key)?;
                entries.insert(
                    key,
                    ManifestEntry {
                        shard,
                        shape: info.shape.into(),
                        data_type,
                        offset: data_start + begin,
                        size: end - begin,
                    },
                );
            }
            shards.push(file);
        }
        Ok(Self {
            entries,
            shards,
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn entry(&self, key: &str) -> Option<&ManifestEntry> {
        self.entries.get(key)
    }

    pub fn shard_file(&self, shard: usize) -> &File {
        &self.shards[shard]
    }
}

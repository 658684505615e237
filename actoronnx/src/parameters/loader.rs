use std::{os::unix::fs::FileExt, path::Path};

use thiserror::Error;

use super::manifest::{CheckpointManifest, ManifestError};
use crate::{Array, DataType};

#[derive(Debug, Error)]
pub enum ParameterLoaderError {
    #[error("Array with key \"{0}\" not found.")]
    KeyNotFound(String),
    #[error("Couldn't find any arrays with prefix \"{0}\".")]
    SubtreeNotFound(String),
    #[error(
        "Size mismatch: array of shape {shape:?} and data type \
        {data_type:?} expected to be {expected_size} bytes, got {actual_size} bytes."
    )]
    SizeMismatch {
        data_type: DataType,
        shape: Box<[usize]>,
        expected_size: usize,
        actual_size: usize,
    },
    #[error("Array with key \"{key}\" is stored as {data_type:?}, which has no F32 widening.")]
    NotConvertibleToF32 { key: String, data_type: DataType },
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("Failed to read data")]
    ArrayLoadingError(#[from] std::io::Error),
}

pub struct ParameterLoader {
    manifest: CheckpointManifest,
}

impl ParameterLoader {
    pub fn open(dir: &Path) -> Result<Self, ParameterLoaderError> {
        Ok(ParameterLoader {
            manifest: CheckpointManifest::open(dir)?,
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.manifest.keys()
    }

    pub fn get(&self, key: &str) -> Result<Array, ParameterLoaderError> {
        let entry = self
            .manifest
            .entry(key)
            .ok_or_else(|| ParameterLoaderError::KeyNotFound(key.to_string()))?;
        let mut array = Array::zeros(&entry.shape, entry.data_type);
        let expected_size = array.bytes().len();
        if expected_size != entry.size {
            return Err(ParameterLoaderError::SizeMismatch {
                data_type: entry.data_type,
                shape: entry.shape.clone(),
                expected_size,
                actual_size: entry.size,
            });
        }
        self.manifest
            .shard_file(entry.shard)
            .read_exact_at(array.bytes_mut(), entry.offset as u64)?;
        Ok(array)
    }

    pub fn tree(&self) -> ParameterTree<'_> {
        ParameterTree {
            loader: self,
            prefix: None,
        }
    }
}

pub struct ParameterTree<'loader> {
    loader: &'loader ParameterLoader,
    prefix: Option<String>,
}

impl<'loader> ParameterTree<'loader> {
    fn join_prefix(&self, name: &str) -> String {
        self.prefix
            .as_ref()
            .map_or_else(|| name.to_string(), |p| format!("{p}.{name}"))
    }

    pub fn path_prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn subtree(&self, name: &str) -> Result<Self, ParameterLoaderError> {
        let new_prefix = self.join_prefix(name);
        let num_suffixes = self
            .loader
            .keys()
            .filter(|key| key.strip_prefix(&new_prefix).is_some_and(|s| s.starts_with('.')))
            .count();
        if num_suffixes > 0 {
            Ok(Self {
                loader: self.loader,
                prefix: Some(new_prefix),
            })
        } else {
            Err(ParameterLoaderError::SubtreeNotFound(new_prefix))
        }
    }

    pub fn leaf(&self, name: &str) -> Result<Array, ParameterLoaderError> {
        self.loader.get(&self.join_prefix(name))
    }

    /// Load a leaf and widen it to F32. Checkpoints store BF16 as a rule;
    /// the export precision is fixed to F32.
    pub fn leaf_f32(&self, name: &str) -> Result<Array, ParameterLoaderError> {
        let key = self.join_prefix(name);
        let array = self.loader.get(&key)?;
        array
            .to_f32()
            .ok_or(ParameterLoaderError::NotConvertibleToF32 {
                key,
                data_type: array.data_type(),
            })
    }
}

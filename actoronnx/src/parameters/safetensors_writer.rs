use std::{
    collections::HashMap,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use thiserror::Error;

use super::manifest::{Dtype, ShardHeader, TensorInfo};
use crate::DataType;

#[derive(Debug, Error)]
pub enum SafetensorsWriteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid tensor data for \"{name}\": expected {expected} bytes, got {actual} bytes")]
    InvalidTensorData {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("Failed to serialize safetensors header: {0}")]
    HeaderJson(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy)]
pub struct SafetensorView<'a> {
    pub name: &'a str,
    pub dtype: DataType,
    pub shape: &'a [usize],
    pub data: &'a [u8],
}

pub fn write_safetensors(
    path: &Path,
    tensors: &[SafetensorView<'_>],
    metadata: Option<HashMap<String, String>>,
) -> Result<(), SafetensorsWriteError> {
    let mut offset: usize = 0;
    let mut header = ShardHeader {
        metadata,
        tensors: HashMap::new(),
    };

    for t in tensors {
        let elem_bytes = t.dtype.size_in_bytes();
        let numel: usize = t.shape.iter().product();
        let expected_bytes = numel.saturating_mul(elem_bytes);
        let actual_bytes = t.data.len();
        if expected_bytes != actual_bytes {
            return Err(SafetensorsWriteError::InvalidTensorData {
                name: t.name.to_string(),
                expected: expected_bytes,
                actual: actual_bytes,
            });
        }

        let begin = offset;
        let end = offset + actual_bytes;
        offset = end;

        header.tensors.insert(
            t.name.to_string(),
            TensorInfo {
                dtype: Dtype::from(t.dtype),
                shape: t.shape.to_vec(),
                data_offsets: (begin, end),
            },
        );
    }

    let mut header_bytes = serde_json::to_vec(&header)?;

    // Safetensors headers are typically padded to 8 bytes for alignment.
    let padding = (8 - (header_bytes.len() % 8)) % 8;
    header_bytes.extend(std::iter::repeat_n(b' ', padding));

    let header_len: u64 = header_bytes
        .len()
        .try_into()
        .expect("header too large for u64");

    let file = File::create(path)?;
    let mut w = BufWriter::new(file);

    w.write_all(&header_len.to_le_bytes())?;
    w.write_all(&header_bytes)?;
    for t in tensors {
        w.write_all(t.data)?;
    }
    w.flush()?;
    Ok(())
}

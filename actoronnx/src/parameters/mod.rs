mod loader;
pub use loader::{ParameterLoader, ParameterLoaderError, ParameterTree};
mod manifest;
pub use manifest::{
    CheckpointManifest, Dtype, ManifestError, ShardHeader, TensorInfo,
    WEIGHTS_FILE_NAME, WEIGHTS_INDEX_FILE_NAME, read_shard_header,
};
mod safetensors_writer;
pub use safetensors_writer::{
    SafetensorView, SafetensorsWriteError, write_safetensors,
};

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use crate::config::ModelConfig;

use super::ModelError;

pub const DEFAULT_MODEL_ID: &str = "microsoft/GUI-Actor-7B-Qwen2-VL";

pub const CONFIG_FILE_NAME: &str = "config.json";

/// Resolve a model identifier to a checkpoint directory. A literal path
/// wins; otherwise `org/name` identifiers are looked up in the local
/// Hugging Face cache. Nothing is fetched over the network: weight
/// download belongs to the surrounding tooling, and an identifier that
/// resolves to nothing is simply not found.
pub fn resolve_checkpoint_dir(identifier: &str) -> Result<PathBuf, ModelError> {
    let as_path = Path::new(identifier);
    if as_path.join(CONFIG_FILE_NAME).is_file() {
        return Ok(as_path.to_path_buf());
    }
    if let Some(snapshot) = hub_cache_snapshot(&hub_cache_root(), identifier) {
        return Ok(snapshot);
    }
    Err(ModelError::ModelNotFound(identifier.to_string()))
}

fn hub_cache_root() -> PathBuf {
    if let Ok(hf_home) = std::env::var("HF_HOME") {
        return PathBuf::from(hf_home).join("hub");
    }
    let home = std::env::var("HOME").unwrap_or_default();
    PathBuf::from(home).join(".cache").join("huggingface").join("hub")
}

/// `hub/models--{org}--{name}/snapshots/{revision}` as laid out by
/// `huggingface_hub`. Among complete snapshots the lexicographically last
/// revision is picked, which keeps resolution deterministic.
fn hub_cache_snapshot(root: &Path, identifier: &str) -> Option<PathBuf> {
    let (org, name) = identifier.split_once('/')?;
    if org.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    let snapshots_dir =
        root.join(format!("models--{org}--{name}")).join("snapshots");
    let mut snapshots: Vec<PathBuf> = std::fs::read_dir(&snapshots_dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.join(CONFIG_FILE_NAME).is_file())
        .collect();
    snapshots.sort();
    snapshots.pop()
}

pub fn read_model_config(dir: &Path) -> Result<ModelConfig, ModelError> {
    let path = dir.join(CONFIG_FILE_NAME);
    let file = File::open(&path).map_err(|source| ModelError::ConfigRead {
        path: path.clone(),
        source,
    })?;
    let config: ModelConfig = serde_json::from_reader(BufReader::new(file))
        .map_err(|source| ModelError::ConfigParse {
            path,
            source,
        })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_identifier_is_not_found() {
        let result = resolve_checkpoint_dir("definitely/not-a-real-model");
        assert!(matches!(result, Err(ModelError::ModelNotFound(_))));
    }

    #[test]
    fn cache_snapshot_requires_config() {
        let root = tempfile::tempdir().expect("temp dir");
        let snapshots = root
            .path()
            .join("models--acme--tiny")
            .join("snapshots");
        std::fs::create_dir_all(snapshots.join("aaa")).expect("mkdir");
        std::fs::create_dir_all(snapshots.join("bbb")).expect("mkdir");
        assert_eq!(hub_cache_snapshot(root.path(), "acme/tiny"), None);

        std::fs::write(snapshots.join("bbb").join(CONFIG_FILE_NAME), "{}")
            .expect("write config");
        assert_eq!(
            hub_cache_snapshot(root.path(), "acme/tiny"),
            Some(snapshots.join("bbb"))
        );
    }
}

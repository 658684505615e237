use serde::{Deserialize, Serialize};

use super::{ConfigError, VisionConfig};

/// Subset of the checkpoint's `config.json` this pipeline needs. Unknown
/// fields (the language-model hyperparameters) are ignored on parse.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ModelConfig {
    pub model_type: String,
    pub hidden_size: usize,
    pub vision_config: VisionConfig,
}

const SUPPORTED_MODEL_TYPES: &[&str] = &["qwen2_vl", "qwen2_5_vl"];

impl ModelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !SUPPORTED_MODEL_TYPES.contains(&self.model_type.as_str()) {
            return Err(ConfigError::UnsupportedModelType(self.model_type.clone()));
        }
        if self.hidden_size == 0 {
            return Err(ConfigError::ZeroField {
                field: "hidden_size",
            });
        }
        self.vision_config.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> ModelConfig {
        serde_json::from_str(raw).expect("config should parse")
    }

    #[test]
    fn parses_hf_config_and_ignores_llm_fields() {
        let config = parse(
            r#"{
                "model_type": "qwen2_vl",
                "hidden_size": 3584,
                "num_hidden_layers": 28,
                "vocab_size": 152064,
                "vision_config": {
                    "depth": 32,
                    "embed_dim": 1280,
                    "hidden_size": 3584,
                    "num_heads": 16,
                    "in_channels": 3,
                    "patch_size": 14,
                    "spatial_merge_size": 2,
                    "temporal_patch_size": 2
                }
            }"#,
        );
        assert_eq!(config.hidden_size, 3584);
        assert_eq!(config.vision_config.depth, 32);
        assert_eq!(config.vision_config.head_dim(), 80);
        assert_eq!(config.vision_config.mlp_hidden_dim(), 5120);
        config.validate().expect("config should validate");
    }

    #[test]
    fn rejects_unknown_model_type() {
        let config = parse(
            r#"{
                "model_type": "llava",
                "hidden_size": 4096,
                "vision_config": {
                    "depth": 2, "embed_dim": 16, "hidden_size": 32, "num_heads": 2
                }
            }"#,
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnsupportedModelType(_))
        ));
    }
}

use serde::{Deserialize, Serialize};

use super::ConfigError;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct VisionConfig {
    pub depth: usize,
    pub embed_dim: usize,
    /// Output dimension of the patch merger; matches the language model's
    /// hidden size.
    pub hidden_size: usize,
    pub num_heads: usize,
    #[serde(default = "default_in_channels")]
    pub in_channels: usize,
    #[serde(default = "default_patch_size")]
    pub patch_size: usize,
    #[serde(default = "default_spatial_merge_size")]
    pub spatial_merge_size: usize,
    #[serde(default = "default_temporal_patch_size")]
    pub temporal_patch_size: usize,
    #[serde(default = "default_mlp_ratio")]
    pub mlp_ratio: f32,
    #[serde(default = "default_hidden_act")]
    pub hidden_act: String,
}

fn default_in_channels() -> usize {
    3
}

fn default_patch_size() -> usize {
    14
}

fn default_spatial_merge_size() -> usize {
    2
}

fn default_temporal_patch_size() -> usize {
    2
}

fn default_mlp_ratio() -> f32 {
    4.0
}

fn default_hidden_act() -> String {
    "quick_gelu".to_string()
}

impl VisionConfig {
    pub fn head_dim(&self) -> usize {
        self.embed_dim / self.num_heads
    }

    pub fn mlp_hidden_dim(&self) -> usize {
        (self.embed_dim as f32 * self.mlp_ratio) as usize
    }

    /// Patch count folded together by the merger.
    pub fn merge_group(&self) -> usize {
        self.spatial_merge_size * self.spatial_merge_size
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("vision_config.depth", self.depth),
            ("vision_config.embed_dim", self.embed_dim),
            ("vision_config.hidden_size", self.hidden_size),
            ("vision_config.num_heads", self.num_heads),
            ("vision_config.in_channels", self.in_channels),
            ("vision_config.patch_size", self.patch_size),
            ("vision_config.spatial_merge_size", self.spatial_merge_size),
            ("vision_config.temporal_patch_size", self.temporal_patch_size),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroField {
                    field,
                });
            }
        }
        if !self.embed_dim.is_multiple_of(self.num_heads) {
            return Err(ConfigError::IndivisibleHeads {
                embed_dim: self.embed_dim,
                num_heads: self.num_heads,
            });
        }
        // The rotary tables split the head dim in four (row/column halves,
        // each duplicated by rotate-half).
        if !self.head_dim().is_multiple_of(4) {
            return Err(ConfigError::IndivisibleHeadDim {
                head_dim: self.head_dim(),
            });
        }
        Ok(())
    }
}

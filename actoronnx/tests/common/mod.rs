#![allow(dead_code)]

use std::path::Path;

use actoronnx::{
    DataType,
    parameters::{SafetensorView, write_safetensors},
};
use rand::{Rng, SeedableRng, rngs::StdRng};

pub const FIXTURE_SEED: u64 = 2025;

// Tiny qwen2_vl-shaped checkpoint: two vision blocks, 16-dim embeddings,
// 32-dim language hidden size.
pub const HIDDEN_SIZE: usize = 32;
pub const EMBED_DIM: usize = 16;
pub const DEPTH: usize = 2;
pub const MLP_HIDDEN: usize = 32;
pub const GROUP_DIM: usize = 64;

pub fn fixture_config() -> &'static str {
    r#"{
    "model_type": "qwen2_vl",
    "hidden_size": 32,
    "vision_config": {
        "depth": 2,
        "embed_dim": 16,
        "hidden_size": 32,
        "num_heads": 2,
        "in_channels": 3,
        "patch_size": 14,
        "spatial_merge_size": 2,
        "temporal_patch_size": 2,
        "mlp_ratio": 2.0
    }
}"#
}

fn tensor_shapes() -> Vec<(String, Vec<usize>)> {
    let mut shapes: Vec<(String, Vec<usize>)> = vec![
        (
            "visual.patch_embed.proj.weight".to_string(),
            vec![EMBED_DIM, 3, 2, 14, 14],
        ),
        ("visual.merger.ln_q.weight".to_string(), vec![EMBED_DIM]),
        ("visual.merger.ln_q.bias".to_string(), vec![EMBED_DIM]),
        (
            "visual.merger.mlp.0.weight".to_string(),
            vec![GROUP_DIM, GROUP_DIM],
        ),
        ("visual.merger.mlp.0.bias".to_string(), vec![GROUP_DIM]),
        (
            "visual.merger.mlp.2.weight".to_string(),
            vec![HIDDEN_SIZE, GROUP_DIM],
        ),
        ("visual.merger.mlp.2.bias".to_string(), vec![HIDDEN_SIZE]),
    ];
    for index in 0..DEPTH {
        let prefix = format!("visual.blocks.{index}");
        shapes.push((format!("{prefix}.norm1.weight"), vec![EMBED_DIM]));
        shapes.push((format!("{prefix}.norm1.bias"), vec![EMBED_DIM]));
        shapes.push((
            format!("{prefix}.attn.qkv.weight"),
            vec![3 * EMBED_DIM, EMBED_DIM],
        ));
        shapes.push((format!("{prefix}.attn.qkv.bias"), vec![3 * EMBED_DIM]));
        shapes.push((
            format!("{prefix}.attn.proj.weight"),
            vec![EMBED_DIM, EMBED_DIM],
        ));
        shapes.push((format!("{prefix}.attn.proj.bias"), vec![EMBED_DIM]));
        shapes.push((format!("{prefix}.norm2.weight"), vec![EMBED_DIM]));
        shapes.push((format!("{prefix}.norm2.bias"), vec![EMBED_DIM]));
        shapes.push((
            format!("{prefix}.mlp.fc1.weight"),
            vec![MLP_HIDDEN, EMBED_DIM],
        ));
        shapes.push((format!("{prefix}.mlp.fc1.bias"), vec![MLP_HIDDEN]));
        shapes.push((
            format!("{prefix}.mlp.fc2.weight"),
            vec![EMBED_DIM, MLP_HIDDEN],
        ));
        shapes.push((format!("{prefix}.mlp.fc2.bias"), vec![EMBED_DIM]));
    }
    for projection in ["projection_enc", "projection_dec"] {
        for layer in ["0", "2"] {
            shapes.push((
                format!("multi_patch_pointer_head.{projection}.{layer}.weight"),
                vec![HIDDEN_SIZE, HIDDEN_SIZE],
            ));
            shapes.push((
                format!("multi_patch_pointer_head.{projection}.{layer}.bias"),
                vec![HIDDEN_SIZE],
            ));
        }
    }
    shapes
}

/// Write a complete single-file fixture checkpoint into `dir`.
pub fn write_checkpoint(dir: &Path) {
    std::fs::write(dir.join("config.json"), fixture_config())
        .expect("write config");
    let mut rng = StdRng::seed_from_u64(FIXTURE_SEED);
    let tensors: Vec<(String, Vec<usize>, Vec<u8>)> = tensor_shapes()
        .into_iter()
        .map(|(name, shape)| {
            let count: usize = shape.iter().product();
            let data: Vec<u8> = (0..count)
                .flat_map(|_| {
                    rng.random_range(-0.1f32..0.1).to_le_bytes()
                })
                .collect();
            (name, shape, data)
        })
        .collect();
    let views: Vec<SafetensorView<'_>> = tensors
        .iter()
        .map(|(name, shape, data)| SafetensorView {
            name,
            dtype: DataType::F32,
            shape,
            data,
        })
        .collect();
    write_safetensors(&dir.join("model.safetensors"), &views, None)
        .expect("write weights");
}

pub const SHARD_1: &str = "model-00001-of-00002.safetensors";
pub const SHARD_2: &str = "model-00002-of-00002.safetensors";

/// Two-shard checkpoint in the HF index layout, with two small tensors.
pub fn write_sharded_checkpoint(dir: &Path) {
    let alpha: Vec<u8> = [1.0f32, 2.0, 3.0, 4.0]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    write_safetensors(
        &dir.join(SHARD_1),
        &[SafetensorView {
            name: "alpha",
            dtype: DataType::F32,
            shape: &[2, 2],
            data: &alpha,
        }],
        None,
    )
    .expect("write shard 1");

    let beta: Vec<u8> =
        [5.0f32, 6.0, 7.0].iter().flat_map(|v| v.to_le_bytes()).collect();
    write_safetensors(
        &dir.join(SHARD_2),
        &[SafetensorView {
            name: "beta",
            dtype: DataType::F32,
            shape: &[3],
            data: &beta,
        }],
        None,
    )
    .expect("write shard 2");

    let index = format!(
        r#"{{"metadata":{{"total_size":28}},"weight_map":{{"alpha":"{SHARD_1}","beta":"{SHARD_2}"}}}}"#
    );
    std::fs::write(dir.join("model.safetensors.index.json"), index)
        .expect("write index");
}

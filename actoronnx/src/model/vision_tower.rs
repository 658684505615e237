use crate::{
    Array, DataType,
    config::VisionConfig,
    export::{ExportError, ExportSpec, InputSpec, OnnxComponent},
    onnx::GraphBuilder,
    parameters::ParameterTree,
};

use super::{ModelError, leaf_checked};

const LAYER_NORM_EPS: f32 = 1e-6;

const ROPE_THETA: f32 = 10_000.0;

/// Largest grid extent the precomputed rotary tables cover. Position ids
/// are gathered from the tables in-graph, so the artifact handles any grid
/// up to this bound without re-export.
pub const MAX_GRID_SIZE: usize = 1024;

/// Activation named by the checkpoint config, mapped to an opset-17 node
/// sequence at lowering time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Activation {
    QuickGelu,
    Gelu,
    Silu,
}

impl Activation {
    pub(crate) fn parse(
        name: &str,
        component: &str,
    ) -> Result<Self, ExportError> {
        match name {
            "quick_gelu" => Ok(Activation::QuickGelu),
            "gelu" => Ok(Activation::Gelu),
            "silu" => Ok(Activation::Silu),
            other => Err(ExportError::UnsupportedOperator {
                component: component.to_string(),
                operator: other.to_string(),
            }),
        }
    }

    pub(crate) fn lower(self, graph: &mut GraphBuilder, x: &str) -> String {
        match self {
            Activation::QuickGelu => graph.quick_gelu(x),
            Activation::Gelu => graph.gelu_erf(x),
            Activation::Silu => graph.silu(x),
        }
    }
}

struct VisionBlock {
    norm1_weight: Array,
    norm1_bias: Array,
    qkv_weight: Array,
    qkv_bias: Array,
    proj_weight: Array,
    proj_bias: Array,
    norm2_weight: Array,
    norm2_bias: Array,
    fc1_weight: Array,
    fc1_bias: Array,
    fc2_weight: Array,
    fc2_bias: Array,
}

impl VisionBlock {
    fn from_tree(
        tree: &ParameterTree<'_>,
        config: &VisionConfig,
    ) -> Result<Self, ModelError> {
        let embed = config.embed_dim;
        let mlp_hidden = config.mlp_hidden_dim();
        Ok(Self {
            norm1_weight: leaf_checked(tree, "norm1.weight", &[embed])?,
            norm1_bias: leaf_checked(tree, "norm1.bias", &[embed])?,
            qkv_weight: leaf_checked(tree, "attn.qkv.weight", &[3 * embed, embed])?,
            qkv_bias: leaf_checked(tree, "attn.qkv.bias", &[3 * embed])?,
            proj_weight: leaf_checked(tree, "attn.proj.weight", &[embed, embed])?,
            proj_bias: leaf_checked(tree, "attn.proj.bias", &[embed])?,
            norm2_weight: leaf_checked(tree, "norm2.weight", &[embed])?,
            norm2_bias: leaf_checked(tree, "norm2.bias", &[embed])?,
            fc1_weight: leaf_checked(tree, "mlp.fc1.weight", &[mlp_hidden, embed])?,
            fc1_bias: leaf_checked(tree, "mlp.fc1.bias", &[mlp_hidden])?,
            fc2_weight: leaf_checked(tree, "mlp.fc2.weight", &[embed, mlp_hidden])?,
            fc2_bias: leaf_checked(tree, "mlp.fc2.bias", &[embed])?,
        })
    }

    /// Pre-norm attention + MLP. `x` is the (num_patches, embed_dim) token
    /// sequence; returns the residual stream after both sublayers.
    fn lower(
        &self,
        graph: &mut GraphBuilder,
        x: &str,
        cos: &str,
        sin: &str,
        prefix: &str,
        config: &VisionConfig,
        activation: Activation,
    ) -> String {
        let embed = config.embed_dim as i64;
        let heads = config.num_heads as i64;
        let head_dim = config.head_dim() as i64;

        let normed = graph.layer_norm(
            &format!("{prefix}.norm1"),
            x,
            &self.norm1_weight,
            &self.norm1_bias,
            LAYER_NORM_EPS,
        );
        let qkv = graph.linear(
            &format!("{prefix}.attn.qkv"),
            &normed,
            &self.qkv_weight,
            Some(&self.qkv_bias),
        );
        let parts = graph.split(&qkv, -1, &[embed, embed, embed]);
        let split_heads = |graph: &mut GraphBuilder, value: &str| {
            let shaped = graph.reshape(value, &[-1, heads, head_dim]);
            graph.transpose(&shaped, &[1, 0, 2])
        };
        let q = split_heads(graph, &parts[0]);
        let k = split_heads(graph, &parts[1]);
        let v = split_heads(graph, &parts[2]);
        let q = graph.apply_rotary(&q, cos, sin, head_dim);
        let k = graph.apply_rotary(&k, cos, sin, head_dim);

        let k_t = graph.transpose(&k, &[0, 2, 1]);
        let scores = graph.matmul(&q, &k_t);
        let scaled = graph.mul_scalar(&scores, 1.0 / (head_dim as f32).sqrt());
        let probs = graph.softmax(&scaled, -1);
        let context = graph.matmul(&probs, &v);
        let context = graph.transpose(&context, &[1, 0, 2]);
        let context = graph.reshape(&context, &[-1, embed]);
        let projected = graph.linear(
            &format!("{prefix}.attn.proj"),
            &context,
            &self.proj_weight,
            Some(&self.proj_bias),
        );
        let attn_out = graph.add(x, &projected);

        let normed = graph.layer_norm(
            &format!("{prefix}.norm2"),
            &attn_out,
            &self.norm2_weight,
            &self.norm2_bias,
            LAYER_NORM_EPS,
        );
        let fc1 = graph.linear(
            &format!("{prefix}.mlp.fc1"),
            &normed,
            &self.fc1_weight,
            Some(&self.fc1_bias),
        );
        let activated = activation.lower(graph, &fc1);
        let fc2 = graph.linear(
            &format!("{prefix}.mlp.fc2"),
            &activated,
            &self.fc2_weight,
            Some(&self.fc2_bias),
        );
        graph.add(&attn_out, &fc2)
    }
}

/// The Qwen2-VL vision transformer, loaded from the checkpoint's `visual.`
/// subtree: folded patch embedding, `depth` pre-norm blocks, and the
/// spatial patch merger.
pub struct VisionTower {
    config: VisionConfig,
    patch_embed_weight: Array,
    blocks: Vec<VisionBlock>,
    ln_q_weight: Array,
    ln_q_bias: Array,
    mlp0_weight: Array,
    mlp0_bias: Array,
    mlp2_weight: Array,
    mlp2_bias: Array,
}

impl VisionTower {
    pub fn from_tree(
        tree: &ParameterTree<'_>,
        config: &VisionConfig,
    ) -> Result<Self, ModelError> {
        let embed = config.embed_dim;
        let patch_embed_weight = fold_temporal(&leaf_checked(
            tree,
            "patch_embed.proj.weight",
            &[
                embed,
                config.in_channels,
                config.temporal_patch_size,
                config.patch_size,
                config.patch_size,
            ],
        )?);

        let blocks_tree = tree.subtree("blocks")?;
        let mut blocks = Vec::with_capacity(config.depth);
        for index in 0..config.depth {
            let block_tree = blocks_tree.subtree(&index.to_string())?;
            blocks.push(VisionBlock::from_tree(&block_tree, config)?);
        }

        let group_dim = config.merge_group() * embed;
        Ok(Self {
            config: config.clone(),
            patch_embed_weight,
            blocks,
            ln_q_weight: leaf_checked(tree, "merger.ln_q.weight", &[embed])?,
            ln_q_bias: leaf_checked(tree, "merger.ln_q.bias", &[embed])?,
            mlp0_weight: leaf_checked(
                tree,
                "merger.mlp.0.weight",
                &[group_dim, group_dim],
            )?,
            mlp0_bias: leaf_checked(tree, "merger.mlp.0.bias", &[group_dim])?,
            mlp2_weight: leaf_checked(
                tree,
                "merger.mlp.2.weight",
                &[config.hidden_size, group_dim],
            )?,
            mlp2_bias: leaf_checked(
                tree,
                "merger.mlp.2.bias",
                &[config.hidden_size],
            )?,
        })
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    /// Rotary cos/sin for every patch, shaped (1, h*w, head_dim) for
    /// broadcasting over heads. Row and column ids are derived in-graph
    /// from `grid_thw`, then looked up in the precomputed angle tables.
    fn lower_rotary(
        &self,
        graph: &mut GraphBuilder,
        grid: &str,
    ) -> (String, String) {
        let quarter = self.config.head_dim() / 4;
        let (cos_values, sin_values) = rotary_tables(self.config.head_dim());
        graph.initializer_f32(
            "rotary.cos_table",
            &[MAX_GRID_SIZE, quarter],
            &cos_values,
        );
        graph.initializer_f32(
            "rotary.sin_table",
            &[MAX_GRID_SIZE, quarter],
            &sin_values,
        );

        let flat = graph.reshape(grid, &[-1]);
        let h_index = graph.scalar_i64("const", 1);
        let w_index = graph.scalar_i64("const", 2);
        let h = graph.gather(&flat, &h_index, 0);
        let w = graph.gather(&flat, &w_index, 0);
        let zero = graph.scalar_i64("const", 0);
        let one = graph.scalar_i64("const", 1);
        let rows = graph.range(&zero, &h, &one);
        let cols = graph.range(&zero, &w, &one);
        let h_vec = graph.unsqueeze(&h, &[0]);
        let w_vec = graph.unsqueeze(&w, &[0]);
        let grid_shape = graph.concat(&[&h_vec, &w_vec], 0);

        let rows_column = graph.unsqueeze(&rows, &[1]);
        let row_grid = graph.expand(&rows_column, &grid_shape);
        let row_ids = graph.reshape(&row_grid, &[-1]);
        let cols_row = graph.unsqueeze(&cols, &[0]);
        let col_grid = graph.expand(&cols_row, &grid_shape);
        let col_ids = graph.reshape(&col_grid, &[-1]);

        let cos_rows = graph.gather("rotary.cos_table", &row_ids, 0);
        let cos_cols = graph.gather("rotary.cos_table", &col_ids, 0);
        let cos = graph.concat(&[&cos_rows, &cos_cols, &cos_rows, &cos_cols], 1);
        let cos = graph.unsqueeze(&cos, &[0]);
        let sin_rows = graph.gather("rotary.sin_table", &row_ids, 0);
        let sin_cols = graph.gather("rotary.sin_table", &col_ids, 0);
        let sin = graph.concat(&[&sin_rows, &sin_cols, &sin_rows, &sin_cols], 1);
        let sin = graph.unsqueeze(&sin, &[0]);
        (cos, sin)
    }
}

impl OnnxComponent for VisionTower {
    fn name(&self) -> &str {
        "vision_tower"
    }

    fn input_specs(&self) -> Vec<InputSpec> {
        vec![
            InputSpec {
                label: "pixel_values",
                data_type: DataType::F32,
                rank: 4,
            },
            InputSpec {
                label: "grid_thw",
                data_type: DataType::I64,
                rank: 2,
            },
        ]
    }

    fn lower(
        &self,
        graph: &mut GraphBuilder,
        example_inputs: &[Array],
        spec: &ExportSpec,
    ) -> Result<(), ExportError> {
        let config = &self.config;
        let pixels = &example_inputs[0];
        let pixel_shape = pixels.shape();
        if pixel_shape[1] != config.in_channels {
            return Err(ExportError::InvalidDimension {
                component: self.name().to_string(),
                input: "pixel_values".to_string(),
                shape: pixel_shape.to_vec(),
                reason: format!("expected {} channels", config.in_channels),
            });
        }
        let height = pixel_shape[2];
        let width = pixel_shape[3];
        let patch = config.patch_size;
        if !height.is_multiple_of(patch) || !width.is_multiple_of(patch) {
            return Err(ExportError::InvalidDimension {
                component: self.name().to_string(),
                input: "pixel_values".to_string(),
                shape: pixel_shape.to_vec(),
                reason: format!("spatial dims must be multiples of {patch}"),
            });
        }
        let activation = Activation::parse(&config.hidden_act, self.name())?;

        let pixel_name = spec.input_names[0].as_str();
        let grid_name = spec.input_names[1].as_str();
        let embed = config.embed_dim as i64;

        graph.initializer_f32(
            "patch_embed.proj.weight",
            self.patch_embed_weight.shape(),
            self.patch_embed_weight.f32s(),
        );
        let patch_i64 = patch as i64;
        let conv = graph.conv2d(
            pixel_name,
            "patch_embed.proj.weight",
            &[patch_i64, patch_i64],
            &[patch_i64, patch_i64],
        );
        // (b, E, h, w) -> (b*h*w, E); batch folds into the patch axis.
        let flattened = graph.reshape(&conv, &[0, embed, -1]);
        let swapped = graph.transpose(&flattened, &[0, 2, 1]);
        let mut hidden = graph.reshape(&swapped, &[-1, embed]);

        let (cos, sin) = self.lower_rotary(graph, grid_name);
        for (index, block) in self.blocks.iter().enumerate() {
            hidden = block.lower(
                graph,
                &hidden,
                &cos,
                &sin,
                &format!("blocks.{index}"),
                config,
                activation,
            );
        }

        let normed = graph.layer_norm(
            "merger.ln_q",
            &hidden,
            &self.ln_q_weight,
            &self.ln_q_bias,
            LAYER_NORM_EPS,
        );
        let group_dim = (config.merge_group() * config.embed_dim) as i64;
        let grouped = graph.reshape(&normed, &[-1, group_dim]);
        let fc1 = graph.linear(
            "merger.mlp.0",
            &grouped,
            &self.mlp0_weight,
            Some(&self.mlp0_bias),
        );
        let activated = graph.gelu_erf(&fc1);
        let output_name = spec.output_names[0].as_str();
        graph.linear_into(
            "merger.mlp.2",
            &activated,
            &self.mlp2_weight,
            &self.mlp2_bias,
            output_name,
        );

        let merged_patches =
            (height / patch) * (width / patch) / config.merge_group();
        let dims = spec.dims_for(
            output_name,
            &[merged_patches as i64, config.hidden_size as i64],
        );
        graph.output(output_name, DataType::F32, &dims);
        Ok(())
    }
}

/// Collapse the Conv3d patch kernel over its temporal axis. At image
/// inference the temporal frames are identical copies, so convolving the
/// duplicated input with the 3d kernel equals a 2d convolution with the
/// kernel summed over that axis.
fn fold_temporal(weight: &Array) -> Array {
    let shape = weight.shape();
    let (e, c, t, ph, pw) = (shape[0], shape[1], shape[2], shape[3], shape[4]);
    let values = weight.f32s();
    let mut folded = vec![0.0f32; e * c * ph * pw];
    for (index, value) in values.iter().enumerate() {
        let pw_i = index % pw;
        let ph_i = (index / pw) % ph;
        let c_i = (index / (pw * ph * t)) % c;
        let e_i = index / (pw * ph * t * c);
        folded[((e_i * c + c_i) * ph + ph_i) * pw + pw_i] += value;
    }
    Array::from_vec(&[e, c, ph, pw], folded)
}

fn rotary_tables(head_dim: usize) -> (Vec<f32>, Vec<f32>) {
    let quarter = head_dim / 4;
    let half = (head_dim / 2) as f32;
    let mut cos = Vec::with_capacity(MAX_GRID_SIZE * quarter);
    let mut sin = Vec::with_capacity(MAX_GRID_SIZE * quarter);
    for position in 0..MAX_GRID_SIZE {
        for j in 0..quarter {
            let inv_freq = ROPE_THETA.powf(-(2.0 * j as f32) / half);
            let angle = position as f32 * inv_freq;
            cos.push(angle.cos());
            sin.push(angle.sin());
        }
    }
    (cos, sin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temporal_fold_sums_frames() {
        // (1, 1, 2, 1, 1) kernel with frames 0.25 and 0.75.
        let weight = Array::from_vec(&[1, 1, 2, 1, 1], vec![0.25f32, 0.75]);
        let folded = fold_temporal(&weight);
        assert_eq!(folded.shape(), &[1, 1, 1, 1]);
        assert_eq!(folded.f32s(), &[1.0]);
    }

    #[test]
    fn rotary_tables_start_at_identity() {
        let (cos, sin) = rotary_tables(8);
        // Position 0 rotates by nothing.
        assert_eq!(&cos[..2], &[1.0, 1.0]);
        assert_eq!(&sin[..2], &[0.0, 0.0]);
    }

    #[test]
    fn unknown_activation_is_unsupported() {
        let result = Activation::parse("gelu_new", "vision_tower");
        assert!(matches!(
            result,
            Err(ExportError::UnsupportedOperator { .. })
        ));
    }
}

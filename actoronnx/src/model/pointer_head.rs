use crate::{
    Array, DataType,
    export::{ExportError, ExportSpec, InputSpec, OnnxComponent},
    onnx::{GraphBuilder, attr_i, attr_tensor, scalar_tensor_f32},
    parameters::ParameterTree,
};

use super::{ModelError, leaf_checked};

/// The GUI-Actor attention pointer head: two-layer GELU projections over
/// the visual (encoder) and target (decoder) hidden states, then scaled
/// dot-product attention of targets over patches.
pub struct PointerHead {
    hidden_size: usize,
    enc_fc1_weight: Array,
    enc_fc1_bias: Array,
    enc_fc2_weight: Array,
    enc_fc2_bias: Array,
    dec_fc1_weight: Array,
    dec_fc1_bias: Array,
    dec_fc2_weight: Array,
    dec_fc2_bias: Array,
}

impl PointerHead {
    pub fn from_tree(
        tree: &ParameterTree<'_>,
        hidden_size: usize,
    ) -> Result<Self, ModelError> {
        let square = [hidden_size, hidden_size];
        let vector = [hidden_size];
        Ok(Self {
            hidden_size,
            enc_fc1_weight: leaf_checked(tree, "projection_enc.0.weight", &square)?,
            enc_fc1_bias: leaf_checked(tree, "projection_enc.0.bias", &vector)?,
            enc_fc2_weight: leaf_checked(tree, "projection_enc.2.weight", &square)?,
            enc_fc2_bias: leaf_checked(tree, "projection_enc.2.bias", &vector)?,
            dec_fc1_weight: leaf_checked(tree, "projection_dec.0.weight", &square)?,
            dec_fc1_bias: leaf_checked(tree, "projection_dec.0.bias", &vector)?,
            dec_fc2_weight: leaf_checked(tree, "projection_dec.2.weight", &square)?,
            dec_fc2_bias: leaf_checked(tree, "projection_dec.2.bias", &vector)?,
        })
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }
}

impl OnnxComponent for PointerHead {
    fn name(&self) -> &str {
        "pointer_head"
    }

    fn input_specs(&self) -> Vec<InputSpec> {
        vec![
            InputSpec {
                label: "visual_hidden_states",
                data_type: DataType::F32,
                rank: 3,
            },
            InputSpec {
                label: "target_hidden_states",
                data_type: DataType::F32,
                rank: 3,
            },
        ]
    }

    fn lower(
        &self,
        graph: &mut GraphBuilder,
        example_inputs: &[Array],
        spec: &ExportSpec,
    ) -> Result<(), ExportError> {
        for (input_spec, array) in
            self.input_specs().iter().zip(example_inputs)
        {
            let last = array.shape()[array.rank() - 1];
            if last != self.hidden_size {
                return Err(ExportError::InvalidDimension {
                    component: self.name().to_string(),
                    input: input_spec.label.to_string(),
                    shape: array.shape().to_vec(),
                    reason: format!(
                        "hidden dim must equal the model's {}",
                        self.hidden_size
                    ),
                });
            }
        }

        let visual_name = spec.input_names[0].as_str();
        let target_name = spec.input_names[1].as_str();

        let enc = graph.linear(
            "projection_enc.0",
            visual_name,
            &self.enc_fc1_weight,
            Some(&self.enc_fc1_bias),
        );
        let enc = graph.gelu_erf(&enc);
        let keys = graph.linear(
            "projection_enc.2",
            &enc,
            &self.enc_fc2_weight,
            Some(&self.enc_fc2_bias),
        );

        let dec = graph.linear(
            "projection_dec.0",
            target_name,
            &self.dec_fc1_weight,
            Some(&self.dec_fc1_bias),
        );
        let dec = graph.gelu_erf(&dec);
        let queries = graph.linear(
            "projection_dec.2",
            &dec,
            &self.dec_fc2_weight,
            Some(&self.dec_fc2_bias),
        );

        let keys_t = graph.transpose(&keys, &[0, 2, 1]);
        let scores = graph.matmul(&queries, &keys_t);
        let scale = 1.0 / (self.hidden_size as f32).sqrt();
        let scaled = graph.mul_scalar(&scores, scale);

        let attn_name = spec.output_names[0].as_str();
        let loss_name = spec.output_names[1].as_str();
        graph.emit_into(
            "Softmax",
            &[&scaled],
            &[attn_name],
            vec![attr_i("axis", -1)],
        );
        // The training loss needs labels, which the exported signature does
        // not carry; emit a stable zero so the declared output exists.
        graph.emit_into(
            "Constant",
            &[],
            &[loss_name],
            vec![attr_tensor("value", scalar_tensor_f32(0.0))],
        );

        let batch = example_inputs[0].shape()[0] as i64;
        let num_patches = example_inputs[0].shape()[1] as i64;
        let num_targets = example_inputs[1].shape()[1] as i64;
        let dims =
            spec.dims_for(attn_name, &[batch, num_targets, num_patches]);
        graph.output(attn_name, DataType::F32, &dims);
        graph.output(loss_name, DataType::F32, &[]);
        Ok(())
    }
}

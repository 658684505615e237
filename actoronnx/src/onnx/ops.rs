//! Composite operators over [`GraphBuilder`], shared by the component
//! lowerings. Linear weights arrive in checkpoint layout (out, in) and are
//! stored pre-transposed so the graph needs a single MatMul per layer.

use crate::Array;

use super::graph::{GraphBuilder, attr_f, attr_i, attr_ints};

fn transposed_2d(values: &[f32], rows: usize, cols: usize) -> Vec<f32> {
    let mut out = vec![0.0; values.len()];
    for r in 0..rows {
        for c in 0..cols {
            out[c * rows + r] = values[r * cols + c];
        }
    }
    out
}

impl GraphBuilder {
    pub fn matmul(&mut self, a: &str, b: &str) -> String {
        self.emit("MatMul", &[a, b], vec![])
    }

    pub fn add(&mut self, a: &str, b: &str) -> String {
        self.emit("Add", &[a, b], vec![])
    }

    pub fn mul(&mut self, a: &str, b: &str) -> String {
        self.emit("Mul", &[a, b], vec![])
    }

    pub fn mul_scalar(&mut self, x: &str, value: f32) -> String {
        let scalar = self.scalar_f32("const", value);
        self.mul(x, &scalar)
    }

    pub fn neg(&mut self, x: &str) -> String {
        self.emit("Neg", &[x], vec![])
    }

    pub fn sigmoid(&mut self, x: &str) -> String {
        self.emit("Sigmoid", &[x], vec![])
    }

    pub fn erf(&mut self, x: &str) -> String {
        self.emit("Erf", &[x], vec![])
    }

    pub fn softmax(&mut self, x: &str, axis: i64) -> String {
        self.emit("Softmax", &[x], vec![attr_i("axis", axis)])
    }

    pub fn transpose(&mut self, x: &str, perm: &[i64]) -> String {
        self.emit("Transpose", &[x], vec![attr_ints("perm", perm)])
    }

    pub fn reshape(&mut self, x: &str, shape: &[i64]) -> String {
        let shape_name = self.fresh("shape");
        self.initializer_i64(&shape_name, &[shape.len()], shape);
        self.emit("Reshape", &[x, &shape_name], vec![])
    }

    pub fn concat(&mut self, inputs: &[&str], axis: i64) -> String {
        self.emit("Concat", inputs, vec![attr_i("axis", axis)])
    }

    pub fn split(&mut self, x: &str, axis: i64, sizes: &[i64]) -> Vec<String> {
        let sizes_name = self.fresh("split_sizes");
        self.initializer_i64(&sizes_name, &[sizes.len()], sizes);
        let outputs: Vec<String> =
            sizes.iter().map(|_| self.fresh("split")).collect();
        let output_refs: Vec<&str> =
            outputs.iter().map(|s| s.as_str()).collect();
        self.emit_into(
            "Split",
            &[x, &sizes_name],
            &output_refs,
            vec![attr_i("axis", axis)],
        );
        outputs
    }

    pub fn unsqueeze(&mut self, x: &str, axes: &[i64]) -> String {
        let axes_name = self.fresh("axes");
        self.initializer_i64(&axes_name, &[axes.len()], axes);
        self.emit("Unsqueeze", &[x, &axes_name], vec![])
    }

    pub fn gather(&mut self, data: &str, indices: &str, axis: i64) -> String {
        self.emit("Gather", &[data, indices], vec![attr_i("axis", axis)])
    }

    pub fn range(&mut self, start: &str, limit: &str, delta: &str) -> String {
        self.emit("Range", &[start, limit, delta], vec![])
    }

    pub fn expand(&mut self, x: &str, shape: &str) -> String {
        self.emit("Expand", &[x, shape], vec![])
    }

    pub fn conv2d(
        &mut self,
        x: &str,
        weight: &str,
        kernel: &[i64],
        strides: &[i64],
    ) -> String {
        self.emit(
            "Conv",
            &[x, weight],
            vec![attr_ints("kernel_shape", kernel), attr_ints("strides", strides)],
        )
    }

    /// MatMul against a checkpoint-layout (out, in) weight, plus bias.
    pub fn linear(
        &mut self,
        prefix: &str,
        x: &str,
        weight: &Array,
        bias: Option<&Array>,
    ) -> String {
        let out_dim = weight.shape()[0];
        let in_dim = weight.shape()[1];
        let weight_name = format!("{prefix}.weight");
        let values = transposed_2d(weight.f32s(), out_dim, in_dim);
        self.initializer_f32(&weight_name, &[in_dim, out_dim], &values);
        let product = self.matmul(x, &weight_name);
        match bias {
            Some(bias) => {
                let bias_name = format!("{prefix}.bias");
                self.initializer_f32(&bias_name, &[out_dim], bias.f32s());
                self.add(&product, &bias_name)
            },
            None => product,
        }
    }

    /// Like [`GraphBuilder::linear`], but the bias add writes to a caller
    /// supplied value name, for layers that produce a declared graph output.
    pub fn linear_into(
        &mut self,
        prefix: &str,
        x: &str,
        weight: &Array,
        bias: &Array,
        output: &str,
    ) {
        let out_dim = weight.shape()[0];
        let in_dim = weight.shape()[1];
        let weight_name = format!("{prefix}.weight");
        let values = transposed_2d(weight.f32s(), out_dim, in_dim);
        self.initializer_f32(&weight_name, &[in_dim, out_dim], &values);
        let product = self.matmul(x, &weight_name);
        let bias_name = format!("{prefix}.bias");
        self.initializer_f32(&bias_name, &[out_dim], bias.f32s());
        self.emit_into("Add", &[&product, &bias_name], &[output], vec![]);
    }

    pub fn layer_norm(
        &mut self,
        prefix: &str,
        x: &str,
        weight: &Array,
        bias: &Array,
        epsilon: f32,
    ) -> String {
        let weight_name = format!("{prefix}.weight");
        self.initializer_f32(&weight_name, weight.shape(), weight.f32s());
        let bias_name = format!("{prefix}.bias");
        self.initializer_f32(&bias_name, bias.shape(), bias.f32s());
        self.emit(
            "LayerNormalization",
            &[x, &weight_name, &bias_name],
            vec![attr_i("axis", -1), attr_f("epsilon", epsilon)],
        )
    }

    /// x * sigmoid(1.702 * x)
    pub fn quick_gelu(&mut self, x: &str) -> String {
        let scaled = self.mul_scalar(x, 1.702);
        let gate = self.sigmoid(&scaled);
        self.mul(x, &gate)
    }

    /// 0.5 * x * (1 + erf(x / sqrt(2)))
    pub fn gelu_erf(&mut self, x: &str) -> String {
        let scaled = self.mul_scalar(x, std::f32::consts::FRAC_1_SQRT_2);
        let erf = self.erf(&scaled);
        let one = self.scalar_f32("const", 1.0);
        let shifted = self.add(&erf, &one);
        let gated = self.mul(x, &shifted);
        self.mul_scalar(&gated, 0.5)
    }

    /// x * sigmoid(x)
    pub fn silu(&mut self, x: &str) -> String {
        let gate = self.sigmoid(x);
        self.mul(x, &gate)
    }

    /// Swap the two halves of the last axis, negating the second:
    /// (a, b) -> (-b, a).
    pub fn rotate_half(&mut self, x: &str, last_dim: i64) -> String {
        let halves = self.split(x, -1, &[last_dim / 2, last_dim / 2]);
        let negated = self.neg(&halves[1]);
        self.concat(&[&negated, &halves[0]], -1)
    }

    /// x * cos + rotate_half(x) * sin
    pub fn apply_rotary(
        &mut self,
        x: &str,
        cos: &str,
        sin: &str,
        last_dim: i64,
    ) -> String {
        let direct = self.mul(x, cos);
        let rotated = self.rotate_half(x, last_dim);
        let shifted = self.mul(&rotated, sin);
        self.add(&direct, &shifted)
    }
}

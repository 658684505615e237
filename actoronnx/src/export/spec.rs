use std::{collections::HashMap, path::PathBuf};

use crate::onnx::Dim;

/// Tensor name -> axis index -> symbolic dimension name. Axes absent from
/// the map are baked into the artifact as constants taken from the example
/// input shapes.
pub type DynamicAxes = HashMap<String, HashMap<usize, String>>;

/// Everything one export call consumes besides the submodule itself and its
/// example inputs.
#[derive(Debug, Clone)]
pub struct ExportSpec {
    pub input_names: Vec<String>,
    pub output_names: Vec<String>,
    pub dynamic_axes: DynamicAxes,
    pub opset_version: i64,
    pub output_path: PathBuf,
}

impl ExportSpec {
    /// Resolve the declared dims of a tensor: symbolic where the axis map
    /// names the axis, fixed to the concrete extent otherwise.
    pub fn dims_for(&self, name: &str, concrete: &[i64]) -> Vec<Dim> {
        let axes = self.dynamic_axes.get(name);
        concrete
            .iter()
            .enumerate()
            .map(|(index, value)| match axes.and_then(|a| a.get(&index)) {
                Some(symbol) => Dim::Sym(symbol.clone()),
                None => Dim::Fixed(*value),
            })
            .collect()
    }
}

use crate::{Array, DataType, onnx::GraphBuilder};

use super::{ExportError, ExportSpec};

/// Canonical description of one positional input of an exportable
/// submodule. `label` is the submodule's own name for the slot, used in
/// diagnostics; the graph-level tensor name comes from the export spec.
#[derive(Debug, Clone, Copy)]
pub struct InputSpec {
    pub label: &'static str,
    pub data_type: DataType,
    pub rank: usize,
}

/// A submodule that can lower itself into an ONNX graph. The two
/// implementations are fixed at model load time; there is no runtime
/// discovery of exportable attributes.
pub trait OnnxComponent {
    fn name(&self) -> &str;

    fn input_specs(&self) -> Vec<InputSpec>;

    /// Emit the component's nodes, initializers, and output declarations.
    /// Graph inputs are already declared by the exporter; example inputs
    /// have passed rank and dtype validation.
    fn lower(
        &self,
        graph: &mut GraphBuilder,
        example_inputs: &[Array],
        spec: &ExportSpec,
    ) -> Result<(), ExportError>;
}

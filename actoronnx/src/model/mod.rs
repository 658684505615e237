mod checkpoint;
pub use checkpoint::{
    CONFIG_FILE_NAME, DEFAULT_MODEL_ID, read_model_config,
    resolve_checkpoint_dir,
};
mod error;
pub use error::ModelError;
mod gui_actor;
pub use gui_actor::GuiActorModel;
mod pointer_head;
pub use pointer_head::PointerHead;
mod vision_tower;
pub use vision_tower::VisionTower;

use crate::{Array, parameters::ParameterTree};

/// Load a leaf as F32 and verify the checkpoint stores the shape the
/// architecture implies. Everything the lowerings consume goes through
/// this, so a shape surprise surfaces at load time, not inside a graph.
pub(crate) fn leaf_checked(
    tree: &ParameterTree<'_>,
    name: &str,
    expected: &[usize],
) -> Result<Array, ModelError> {
    let array = tree.leaf_f32(name)?;
    if array.shape() != expected {
        let key = match tree.path_prefix() {
            Some(prefix) => format!("{prefix}.{name}"),
            None => name.to_string(),
        };
        return Err(ModelError::IncompatibleWeights {
            key,
            expected: expected.to_vec(),
            actual: array.shape().to_vec(),
        });
    }
    Ok(array)
}

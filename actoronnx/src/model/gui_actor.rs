use std::path::Path;

use crate::{config::ModelConfig, parameters::ParameterLoader};

use super::{
    ModelError, PointerHead, VisionTower, checkpoint::read_model_config,
    checkpoint::resolve_checkpoint_dir,
};

/// A loaded GUI-Actor checkpoint: the parsed configuration plus the two
/// exportable submodules, fully materialized as F32 host arrays. The
/// submodule set is fixed here, at load time; export code never reaches
/// into the checkpoint by name.
pub struct GuiActorModel {
    config: ModelConfig,
    vision_tower: VisionTower,
    pointer_head: PointerHead,
}

impl GuiActorModel {
    pub fn load(identifier: &str) -> Result<Self, ModelError> {
        let dir = resolve_checkpoint_dir(identifier)?;
        Self::load_dir(&dir)
    }

    pub fn load_dir(dir: &Path) -> Result<Self, ModelError> {
        let config = read_model_config(dir)?;
        let loader = ParameterLoader::open(dir)?;
        let tree = loader.tree();
        let vision_tower = VisionTower::from_tree(
            &tree.subtree("visual")?,
            &config.vision_config,
        )?;
        let pointer_head = PointerHead::from_tree(
            &tree.subtree("multi_patch_pointer_head")?,
            config.hidden_size,
        )?;
        Ok(Self {
            config,
            vision_tower,
            pointer_head,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn hidden_size(&self) -> usize {
        self.config.hidden_size
    }

    pub fn vision_tower(&self) -> &VisionTower {
        &self.vision_tower
    }

    pub fn pointer_head(&self) -> &PointerHead {
        &self.pointer_head
    }
}

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use prost::Message;

use crate::{
    Array, Error, GuiActorModel, onnx::GraphBuilder, onnx::proto::ModelProto,
};

use super::{ExportError, ExportSpec, OnnxComponent};

/// Operator-set version both stock exports target.
pub const OPSET_VERSION: i64 = 17;

pub const PRODUCER_NAME: &str = "actoronnx";

pub const VISION_TOWER_FILE_NAME: &str = "vision_tower.onnx";
pub const POINTER_HEAD_FILE_NAME: &str = "pointer_head.onnx";

/// Seed for the example-input fill. Example values never reach the
/// artifact (only their shapes do); a fixed seed keeps runs reproducible.
const EXAMPLE_SEED: u64 = 2025;

/// Lower one submodule and write the artifact. The file appears atomically:
/// the encoded graph goes to a temp sibling first, and on any failure the
/// temp file is removed, leaving the output directory as it was.
pub fn export_component(
    component: &dyn OnnxComponent,
    example_inputs: &[Array],
    spec: &ExportSpec,
) -> Result<(), ExportError> {
    validate_inputs(component, example_inputs, spec)?;

    let mut graph = GraphBuilder::new(component.name());
    for (name, array) in spec.input_names.iter().zip(example_inputs) {
        let concrete: Vec<i64> = array.shape().iter().map(|d| *d as i64).collect();
        let dims = spec.dims_for(name, &concrete);
        graph.input(name, array.data_type(), &dims);
    }
    component.lower(&mut graph, example_inputs, spec)?;

    let model = graph.finish(
        spec.opset_version,
        PRODUCER_NAME,
        env!("CARGO_PKG_VERSION"),
    );
    write_artifact(&spec.output_path, &model)
}

fn validate_inputs(
    component: &dyn OnnxComponent,
    example_inputs: &[Array],
    spec: &ExportSpec,
) -> Result<(), ExportError> {
    let input_specs = component.input_specs();
    if input_specs.len() != example_inputs.len()
        || input_specs.len() != spec.input_names.len()
    {
        return Err(ExportError::InputArity {
            component: component.name().to_string(),
            expected: input_specs.len(),
            actual: example_inputs.len(),
        });
    }
    for (input_spec, array) in input_specs.iter().zip(example_inputs) {
        if array.rank() != input_spec.rank
            || array.data_type() != input_spec.data_type
        {
            return Err(ExportError::ShapeMismatch {
                component: component.name().to_string(),
                input: input_spec.label.to_string(),
                expected: input_spec.data_type,
                expected_rank: input_spec.rank,
                actual: array.data_type(),
                actual_rank: array.rank(),
            });
        }
    }
    Ok(())
}

fn write_artifact(path: &Path, model: &ModelProto) -> Result<(), ExportError> {
    let bytes = model.encode_to_vec();
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);
    let written = std::fs::write(&temp_path, &bytes)
        .and_then(|_| std::fs::rename(&temp_path, path));
    if let Err(source) = written {
        let _ = std::fs::remove_file(&temp_path);
        return Err(source.into());
    }
    Ok(())
}

fn axis(index: usize, symbol: &str) -> (usize, String) {
    (index, symbol.to_string())
}

/// The whole pipeline as one call: resolve and load the checkpoint once,
/// then export both components into `output_dir` (created if absent).
/// Resolution happens before the directory is touched, so an unknown
/// identifier leaves the filesystem unchanged.
pub fn export_gui_actor(
    identifier: &str,
    output_dir: &Path,
) -> Result<[PathBuf; 2], Error> {
    let model = GuiActorModel::load(identifier)?;
    std::fs::create_dir_all(output_dir).map_err(ExportError::from)?;
    let vision_path = export_vision_tower(&model, output_dir)?;
    let pointer_path = export_pointer_head(&model, output_dir)?;
    Ok([vision_path, pointer_path])
}

/// Stage one of the pipeline: the vision encoder, with batch, height, and
/// width free on the pixel input and the patch count free on the output
/// embedding.
pub fn export_vision_tower(
    model: &GuiActorModel,
    output_dir: &Path,
) -> Result<PathBuf, ExportError> {
    let output_path = output_dir.join(VISION_TOWER_FILE_NAME);
    let spec = ExportSpec {
        input_names: vec!["pixel_values".to_string(), "grid_thw".to_string()],
        output_names: vec!["image_embeds".to_string()],
        dynamic_axes: HashMap::from([
            (
                "pixel_values".to_string(),
                HashMap::from([
                    axis(0, "batch"),
                    axis(2, "height"),
                    axis(3, "width"),
                ]),
            ),
            (
                "image_embeds".to_string(),
                HashMap::from([axis(0, "num_patches")]),
            ),
        ]),
        opset_version: OPSET_VERSION,
        output_path: output_path.clone(),
    };
    let example_inputs = [
        Array::sample_uniform(&[1, 3, 224, 224], EXAMPLE_SEED),
        Array::from_vec(&[1, 3], vec![1i64, 14, 14]),
    ];
    export_component(model.vision_tower(), &example_inputs, &spec)?;
    Ok(output_path)
}

/// Stage two: the pointer head, with the patch count free on the visual
/// stream and the target count free on the target stream.
pub fn export_pointer_head(
    model: &GuiActorModel,
    output_dir: &Path,
) -> Result<PathBuf, ExportError> {
    let output_path = output_dir.join(POINTER_HEAD_FILE_NAME);
    let hidden_size = model.hidden_size();
    let spec = ExportSpec {
        input_names: vec![
            "visual_hidden_states".to_string(),
            "target_hidden_states".to_string(),
        ],
        output_names: vec!["attn_weights".to_string(), "loss".to_string()],
        dynamic_axes: HashMap::from([
            (
                "visual_hidden_states".to_string(),
                HashMap::from([axis(1, "num_patches")]),
            ),
            (
                "target_hidden_states".to_string(),
                HashMap::from([axis(1, "num_targets")]),
            ),
        ]),
        opset_version: OPSET_VERSION,
        output_path: output_path.clone(),
    };
    let example_inputs = [
        Array::sample_uniform(&[1, 100, hidden_size], EXAMPLE_SEED),
        Array::sample_uniform(&[1, 1, hidden_size], EXAMPLE_SEED + 1),
    ];
    export_component(model.pointer_head(), &example_inputs, &spec)?;
    Ok(output_path)
}

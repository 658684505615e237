mod common;

use std::{collections::HashSet, path::Path};

use actoronnx::{
    Array, DataType, GuiActorModel,
    export::{
        ExportError, ExportSpec, OPSET_VERSION, POINTER_HEAD_FILE_NAME,
        VISION_TOWER_FILE_NAME, export_component, export_gui_actor,
        export_pointer_head, export_vision_tower,
    },
    model::ModelError,
    onnx::proto::{
        ModelProto, ValueInfoProto, tensor_shape_proto::dimension::Value as DimValue,
        type_proto,
    },
};
use prost::Message;

fn decode(path: &Path) -> ModelProto {
    let bytes = std::fs::read(path).expect("read artifact");
    ModelProto::decode(bytes.as_slice()).expect("decode artifact")
}

fn dims(value_info: &ValueInfoProto) -> Vec<DimValue> {
    let Some(type_proto::Value::TensorType(tensor)) = value_info
        .r#type
        .as_ref()
        .and_then(|t| t.value.as_ref())
    else {
        panic!("{} has no tensor type", value_info.name);
    };
    tensor
        .shape
        .as_ref()
        .expect("shape")
        .dim
        .iter()
        .map(|dim| dim.value.clone().expect("dim value"))
        .collect()
}

fn sym(name: &str) -> DimValue {
    DimValue::DimParam(name.to_string())
}

fn fixed(value: i64) -> DimValue {
    DimValue::DimValue(value)
}

fn load_fixture(dir: &Path) -> GuiActorModel {
    common::write_checkpoint(dir);
    GuiActorModel::load_dir(dir).expect("load fixture model")
}

/// Every node input must be produced before use by a graph input, an
/// initializer, or an earlier node; declared outputs must be produced.
fn assert_well_formed(model: &ModelProto) {
    let graph = model.graph.as_ref().expect("graph");
    let mut defined: HashSet<&str> = HashSet::new();
    for input in &graph.input {
        defined.insert(&input.name);
    }
    for initializer in &graph.initializer {
        defined.insert(&initializer.name);
    }
    for node in &graph.node {
        for input in &node.input {
            assert!(
                defined.contains(input.as_str()),
                "node {} consumes undefined value {input}",
                node.name
            );
        }
        for output in &node.output {
            defined.insert(output);
        }
    }
    for output in &graph.output {
        assert!(
            defined.contains(output.name.as_str()),
            "declared output {} is never produced",
            output.name
        );
    }
}

#[test]
fn vision_tower_artifact_declares_dynamic_axes() {
    let dir = tempfile::tempdir().expect("temp dir");
    let model = load_fixture(dir.path());
    let path = export_vision_tower(&model, dir.path()).expect("export");

    let proto = decode(&path);
    assert_eq!(proto.ir_version, 8);
    assert_eq!(proto.opset_import.len(), 1);
    assert_eq!(proto.opset_import[0].version, OPSET_VERSION);

    let graph = proto.graph.as_ref().expect("graph");
    assert_eq!(graph.input.len(), 2);

    let pixel = &graph.input[0];
    assert_eq!(pixel.name, "pixel_values");
    assert_eq!(
        dims(pixel),
        vec![sym("batch"), fixed(3), sym("height"), sym("width")]
    );

    let grid = &graph.input[1];
    assert_eq!(grid.name, "grid_thw");
    assert_eq!(dims(grid), vec![fixed(1), fixed(3)]);

    assert_eq!(graph.output.len(), 1);
    let embeds = &graph.output[0];
    assert_eq!(embeds.name, "image_embeds");
    assert_eq!(
        dims(embeds),
        vec![sym("num_patches"), fixed(common::HIDDEN_SIZE as i64)]
    );

    assert_well_formed(&proto);
}

#[test]
fn pointer_head_artifact_declares_exactly_two_outputs() {
    let dir = tempfile::tempdir().expect("temp dir");
    let model = load_fixture(dir.path());
    let path = export_pointer_head(&model, dir.path()).expect("export");

    let proto = decode(&path);
    let graph = proto.graph.as_ref().expect("graph");

    let output_names: Vec<&str> =
        graph.output.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(output_names, vec!["attn_weights", "loss"]);
    assert_eq!(dims(&graph.output[1]), Vec::<DimValue>::new());

    let visual = &graph.input[0];
    assert_eq!(visual.name, "visual_hidden_states");
    assert_eq!(
        dims(visual),
        vec![
            fixed(1),
            sym("num_patches"),
            fixed(common::HIDDEN_SIZE as i64)
        ]
    );
    let target = &graph.input[1];
    assert_eq!(target.name, "target_hidden_states");
    assert_eq!(
        dims(target),
        vec![
            fixed(1),
            sym("num_targets"),
            fixed(common::HIDDEN_SIZE as i64)
        ]
    );

    assert_well_formed(&proto);
}

#[test]
fn re_export_is_byte_identical() {
    let dir = tempfile::tempdir().expect("temp dir");
    let model = load_fixture(dir.path());

    let vision_path = export_vision_tower(&model, dir.path()).expect("export");
    let first = std::fs::read(&vision_path).expect("read");
    export_vision_tower(&model, dir.path()).expect("re-export");
    let second = std::fs::read(&vision_path).expect("read");
    assert_eq!(first, second);

    let pointer_path = export_pointer_head(&model, dir.path()).expect("export");
    let first = std::fs::read(&pointer_path).expect("read");
    export_pointer_head(&model, dir.path()).expect("re-export");
    let second = std::fs::read(&pointer_path).expect("read");
    assert_eq!(first, second);
}

#[test]
fn unknown_identifier_fails_before_any_export() {
    let result = GuiActorModel::load("acme/does-not-exist");
    assert!(matches!(result, Err(ModelError::ModelNotFound(_))));
}

#[test]
fn pipeline_exports_both_components() {
    let dir = tempfile::tempdir().expect("temp dir");
    common::write_checkpoint(dir.path());
    let output_dir = dir.path().join("onnx_models");

    let identifier = dir.path().to_string_lossy().to_string();
    let paths =
        export_gui_actor(&identifier, &output_dir).expect("pipeline");
    assert_eq!(paths[0], output_dir.join(VISION_TOWER_FILE_NAME));
    assert_eq!(paths[1], output_dir.join(POINTER_HEAD_FILE_NAME));
    assert!(paths[0].is_file());
    assert!(paths[1].is_file());
}

#[test]
fn pipeline_touches_nothing_for_unknown_identifier() {
    let dir = tempfile::tempdir().expect("temp dir");
    let output_dir = dir.path().join("onnx_models");
    let result = export_gui_actor("acme/does-not-exist", &output_dir);
    assert!(result.is_err());
    assert!(!output_dir.exists());
}

#[test]
fn failed_export_leaves_no_partial_artifact() {
    let dir = tempfile::tempdir().expect("temp dir");
    let model = load_fixture(dir.path());

    let missing = dir.path().join("missing_subdir");
    let result = export_vision_tower(&model, &missing);
    assert!(matches!(result, Err(ExportError::Io(_))));
    assert!(!missing.exists());

    let stray: Vec<_> = std::fs::read_dir(dir.path())
        .expect("read dir")
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_name().to_string_lossy().ends_with(".tmp")
        })
        .collect();
    assert!(stray.is_empty(), "temp files left behind: {stray:?}");
}

#[test]
fn rank_mismatch_is_rejected_before_lowering() {
    let dir = tempfile::tempdir().expect("temp dir");
    let model = load_fixture(dir.path());

    let spec = ExportSpec {
        input_names: vec![
            "visual_hidden_states".to_string(),
            "target_hidden_states".to_string(),
        ],
        output_names: vec!["attn_weights".to_string(), "loss".to_string()],
        dynamic_axes: Default::default(),
        opset_version: OPSET_VERSION,
        output_path: dir.path().join("pointer_head.onnx"),
    };
    // Rank 2 instead of the expected rank 3.
    let example_inputs = [
        Array::sample_uniform(&[100, common::HIDDEN_SIZE], 7),
        Array::sample_uniform(&[1, 1, common::HIDDEN_SIZE], 7),
    ];
    let result =
        export_component(model.pointer_head(), &example_inputs, &spec);
    assert!(matches!(result, Err(ExportError::ShapeMismatch { .. })));
    assert!(!spec.output_path.exists());
}

#[test]
fn hidden_dim_mismatch_is_rejected() {
    let dir = tempfile::tempdir().expect("temp dir");
    let model = load_fixture(dir.path());

    let spec = ExportSpec {
        input_names: vec![
            "visual_hidden_states".to_string(),
            "target_hidden_states".to_string(),
        ],
        output_names: vec!["attn_weights".to_string(), "loss".to_string()],
        dynamic_axes: Default::default(),
        opset_version: OPSET_VERSION,
        output_path: dir.path().join("pointer_head.onnx"),
    };
    let example_inputs = [
        Array::sample_uniform(&[1, 100, common::EMBED_DIM], 7),
        Array::sample_uniform(&[1, 1, common::EMBED_DIM], 7),
    ];
    let result =
        export_component(model.pointer_head(), &example_inputs, &spec);
    assert!(matches!(result, Err(ExportError::InvalidDimension { .. })));
    assert!(!spec.output_path.exists());
}

#[test]
fn grid_input_is_typed_int64() {
    let dir = tempfile::tempdir().expect("temp dir");
    let model = load_fixture(dir.path());
    let path = export_vision_tower(&model, dir.path()).expect("export");
    let proto = decode(&path);
    let graph = proto.graph.as_ref().expect("graph");
    let Some(type_proto::Value::TensorType(tensor)) = graph.input[1]
        .r#type
        .as_ref()
        .and_then(|t| t.value.as_ref())
    else {
        panic!("grid_thw has no tensor type");
    };
    assert_eq!(
        tensor.elem_type,
        actoronnx::onnx::element_type(DataType::I64) as i32
    );
}

mod common;

use actoronnx::parameters::{
    ManifestError, ParameterLoader, ParameterLoaderError,
};

#[test]
fn single_file_checkpoint_loads() {
    let dir = tempfile::tempdir().expect("temp dir");
    common::write_checkpoint(dir.path());

    let loader = ParameterLoader::open(dir.path()).expect("open");
    assert!(loader.keys().count() > 0);

    let weight = loader.get("visual.merger.ln_q.weight").expect("get");
    assert_eq!(weight.shape(), &[common::EMBED_DIM]);

    assert!(matches!(
        loader.get("not.a.key"),
        Err(ParameterLoaderError::KeyNotFound(_))
    ));

    let tree = loader.tree();
    let visual = tree.subtree("visual").expect("subtree");
    let bias = visual.leaf("merger.ln_q.bias").expect("leaf");
    assert_eq!(bias.shape(), &[common::EMBED_DIM]);

    assert!(matches!(
        tree.subtree("nonexistent"),
        Err(ParameterLoaderError::SubtreeNotFound(_))
    ));
}

#[test]
fn loading_is_idempotent() {
    let dir = tempfile::tempdir().expect("temp dir");
    common::write_checkpoint(dir.path());

    let first = ParameterLoader::open(dir.path()).expect("open");
    let second = ParameterLoader::open(dir.path()).expect("open");
    for key in ["visual.blocks.0.attn.qkv.weight", "visual.merger.mlp.2.bias"]
    {
        let a = first.get(key).expect("get");
        let b = second.get(key).expect("get");
        assert_eq!(a.bytes(), b.bytes(), "weights differ for {key}");
        assert_eq!(a.shape(), b.shape());
    }
}

#[test]
fn sharded_checkpoint_loads_through_index() {
    let dir = tempfile::tempdir().expect("temp dir");
    common::write_sharded_checkpoint(dir.path());

    let loader = ParameterLoader::open(dir.path()).expect("open");
    let alpha = loader.get("alpha").expect("alpha");
    assert_eq!(alpha.shape(), &[2, 2]);
    assert_eq!(alpha.f32s(), &[1.0, 2.0, 3.0, 4.0]);
    let beta = loader.get("beta").expect("beta");
    assert_eq!(beta.shape(), &[3]);
    assert_eq!(beta.f32s(), &[5.0, 6.0, 7.0]);
}

#[test]
fn missing_shard_is_reported() {
    let dir = tempfile::tempdir().expect("temp dir");
    common::write_sharded_checkpoint(dir.path());
    std::fs::remove_file(dir.path().join(common::SHARD_2))
        .expect("remove shard");

    let result = ParameterLoader::open(dir.path());
    assert!(matches!(
        result,
        Err(ParameterLoaderError::Manifest(ManifestError::MissingShard(_)))
    ));
}

#[test]
fn empty_directory_has_no_weights() {
    let dir = tempfile::tempdir().expect("temp dir");
    let result = ParameterLoader::open(dir.path());
    assert!(matches!(
        result,
        Err(ParameterLoaderError::Manifest(ManifestError::WeightsNotFound(
            _
        )))
    ));
}

use std::path::Path;

use actoronnx::{GuiActorModel, export_pointer_head, export_vision_tower};
use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

const OUTPUT_DIR: &str = "onnx_models";

fn spinner(message: String) -> ProgressBar {
    let progress_bar = ProgressBar::new_spinner();
    progress_bar.enable_steady_tick(std::time::Duration::from_millis(100));
    progress_bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    progress_bar.set_message(message);
    progress_bar
}

fn fail(progress_bar: ProgressBar, error: impl std::error::Error) -> ! {
    progress_bar.finish_and_clear();
    eprintln!("❌ {error}");
    let mut source = error.source();
    while let Some(inner) = source {
        eprintln!("   caused by: {inner}");
        source = inner.source();
    }
    std::process::exit(1);
}

pub fn handle_export(model_id: String) {
    let done = Style::new().green().bold();

    let progress_bar = spinner(format!("Loading model: {model_id}"));
    let model = match GuiActorModel::load(&model_id) {
        Ok(model) => model,
        Err(error) => fail(progress_bar, error),
    };
    progress_bar.finish_and_clear();
    println!("{} loaded {model_id}", done.apply_to("✓"));

    let output_dir = Path::new(OUTPUT_DIR);
    if let Err(error) = std::fs::create_dir_all(output_dir) {
        eprintln!("❌ failed to create {OUTPUT_DIR}: {error}");
        std::process::exit(1);
    }

    println!("Exporting Vision Tower...");
    let progress_bar = spinner("Lowering vision tower".to_string());
    let vision_path = match export_vision_tower(&model, output_dir) {
        Ok(path) => path,
        Err(error) => fail(progress_bar, error),
    };
    progress_bar.finish_and_clear();
    println!("{} wrote {}", done.apply_to("✓"), vision_path.display());

    println!("Exporting Pointer Head...");
    let progress_bar = spinner("Lowering pointer head".to_string());
    let pointer_path = match export_pointer_head(&model, output_dir) {
        Ok(path) => path,
        Err(error) => fail(progress_bar, error),
    };
    progress_bar.finish_and_clear();
    println!("{} wrote {}", done.apply_to("✓"), pointer_path.display());

    println!(
        "Components exported to {OUTPUT_DIR}. Use optimum-cli to export the \
        Qwen2 LLM backbone separately."
    );
}

use clap::Parser;

mod handlers;
use handlers::handle_export;

#[derive(Parser)]
#[command(name = "actoronnx", about = "Export GUI-Actor components to ONNX")]
struct Cli {
    /// Model identifier: a checkpoint folder or a Hugging Face id
    #[arg(default_value = actoronnx::DEFAULT_MODEL_ID)]
    model: String,
}

fn main() {
    let cli = Cli::parse();
    handle_export(cli.model);
}

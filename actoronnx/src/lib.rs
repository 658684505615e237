pub mod array;
pub use array::Array;

pub mod config;

pub mod data_type;
pub use data_type::{ArrayElement, DataType};

mod error;
pub use error::Error;

pub mod export;
pub use export::{export_pointer_head, export_vision_tower};

pub mod model;
pub use model::{DEFAULT_MODEL_ID, GuiActorModel};

pub mod onnx;

pub mod parameters;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

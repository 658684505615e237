mod component;
pub use component::{InputSpec, OnnxComponent};
mod error;
pub use error::ExportError;
mod exporter;
pub use exporter::{
    OPSET_VERSION, POINTER_HEAD_FILE_NAME, PRODUCER_NAME,
    VISION_TOWER_FILE_NAME, export_component, export_gui_actor,
    export_pointer_head, export_vision_tower,
};
mod spec;
pub use spec::{DynamicAxes, ExportSpec};

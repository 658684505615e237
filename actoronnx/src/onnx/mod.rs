pub mod proto;

mod graph;
pub use graph::{
    Dim, GraphBuilder, IR_VERSION, attr_f, attr_i, attr_ints, attr_tensor,
    element_type, scalar_tensor_f32,
};

mod ops;

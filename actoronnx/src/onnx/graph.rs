use crate::DataType;

use super::proto::{
    AttributeProto, GraphProto, ModelProto, NodeProto, OperatorSetIdProto,
    TensorProto, TensorShapeProto, TypeProto, ValueInfoProto, attribute_proto,
    tensor_proto, tensor_shape_proto, type_proto,
};

/// Exported graphs carry IR version 8, the version paired with opset 17.
pub const IR_VERSION: i64 = 8;

/// One dimension of a declared graph input/output: baked-in constant or a
/// named symbol left free at inference time.
#[derive(Debug, Clone, PartialEq)]
pub enum Dim {
    Fixed(i64),
    Sym(String),
}

pub fn element_type(data_type: DataType) -> tensor_proto::DataType {
    match data_type {
        DataType::F32 => tensor_proto::DataType::Float,
        DataType::F16 => tensor_proto::DataType::Float16,
        DataType::BF16 => tensor_proto::DataType::Bfloat16,
        DataType::F64 => tensor_proto::DataType::Double,
        DataType::I8 => tensor_proto::DataType::Int8,
        DataType::U8 => tensor_proto::DataType::Uint8,
        DataType::I16 => tensor_proto::DataType::Int16,
        DataType::U16 => tensor_proto::DataType::Uint16,
        DataType::I32 => tensor_proto::DataType::Int32,
        DataType::U32 => tensor_proto::DataType::Uint32,
        DataType::I64 => tensor_proto::DataType::Int64,
        DataType::U64 => tensor_proto::DataType::Uint64,
    }
}

fn value_info(name: &str, data_type: DataType, dims: &[Dim]) -> ValueInfoProto {
    let shape = TensorShapeProto {
        dim: dims
            .iter()
            .map(|dim| tensor_shape_proto::Dimension {
                denotation: String::new(),
                value: Some(match dim {
                    Dim::Fixed(value) => {
                        tensor_shape_proto::dimension::Value::DimValue(*value)
                    },
                    Dim::Sym(name) => {
                        tensor_shape_proto::dimension::Value::DimParam(name.clone())
                    },
                }),
            })
            .collect(),
    };
    ValueInfoProto {
        name: name.to_string(),
        r#type: Some(TypeProto {
            denotation: String::new(),
            value: Some(type_proto::Value::TensorType(type_proto::Tensor {
                elem_type: element_type(data_type) as i32,
                shape: Some(shape),
            })),
        }),
        doc_string: String::new(),
    }
}

/// Accumulates nodes, initializers, and typed IO declarations, then seals
/// them into a `ModelProto`. Emission order is the call order, so a given
/// lowering always serializes to identical bytes.
pub struct GraphBuilder {
    name: String,
    nodes: Vec<NodeProto>,
    initializers: Vec<TensorProto>,
    inputs: Vec<ValueInfoProto>,
    outputs: Vec<ValueInfoProto>,
    counter: usize,
}

impl GraphBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            nodes: Vec::new(),
            initializers: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            counter: 0,
        }
    }

    pub fn fresh(&mut self, hint: &str) -> String {
        let name = format!("{hint}_{}", self.counter);
        self.counter += 1;
        name
    }

    pub fn input(&mut self, name: &str, data_type: DataType, dims: &[Dim]) {
        self.inputs.push(value_info(name, data_type, dims));
    }

    pub fn output(&mut self, name: &str, data_type: DataType, dims: &[Dim]) {
        self.outputs.push(value_info(name, data_type, dims));
    }

    pub fn initializer(
        &mut self,
        name: &str,
        data_type: DataType,
        shape: &[usize],
        raw_data: Vec<u8>,
    ) -> String {
        self.initializers.push(TensorProto {
            dims: shape.iter().map(|d| *d as i64).collect(),
            data_type: element_type(data_type) as i32,
            float_data: Vec::new(),
            int32_data: Vec::new(),
            int64_data: Vec::new(),
            name: name.to_string(),
            raw_data,
            doc_string: String::new(),
        });
        name.to_string()
    }

    pub fn initializer_f32(
        &mut self,
        name: &str,
        shape: &[usize],
        values: &[f32],
    ) -> String {
        let raw = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.initializer(name, DataType::F32, shape, raw)
    }

    pub fn initializer_i64(
        &mut self,
        name: &str,
        shape: &[usize],
        values: &[i64],
    ) -> String {
        let raw = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.initializer(name, DataType::I64, shape, raw)
    }

    pub fn scalar_f32(&mut self, hint: &str, value: f32) -> String {
        let name = self.fresh(hint);
        self.initializer_f32(&name, &[], &[value])
    }

    pub fn scalar_i64(&mut self, hint: &str, value: i64) -> String {
        let name = self.fresh(hint);
        self.initializer_i64(&name, &[], &[value])
    }

    /// Single-output node with a generated output name.
    pub fn emit(
        &mut self,
        op_type: &str,
        inputs: &[&str],
        attributes: Vec<AttributeProto>,
    ) -> String {
        let output = self.fresh(&op_type.to_ascii_lowercase());
        self.emit_into(op_type, inputs, &[&output], attributes);
        output
    }

    pub fn emit_into(
        &mut self,
        op_type: &str,
        inputs: &[&str],
        outputs: &[&str],
        attributes: Vec<AttributeProto>,
    ) {
        let name = self.fresh(op_type);
        self.nodes.push(NodeProto {
            input: inputs.iter().map(|s| s.to_string()).collect(),
            output: outputs.iter().map(|s| s.to_string()).collect(),
            name,
            op_type: op_type.to_string(),
            domain: String::new(),
            attribute: attributes,
            doc_string: String::new(),
        });
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn finish(
        self,
        opset_version: i64,
        producer_name: &str,
        producer_version: &str,
    ) -> ModelProto {
        ModelProto {
            ir_version: IR_VERSION,
            opset_import: vec![OperatorSetIdProto {
                domain: String::new(),
                version: opset_version,
            }],
            producer_name: producer_name.to_string(),
            producer_version: producer_version.to_string(),
            domain: String::new(),
            model_version: 0,
            doc_string: String::new(),
            graph: Some(GraphProto {
                node: self.nodes,
                name: self.name,
                initializer: self.initializers,
                doc_string: String::new(),
                input: self.inputs,
                output: self.outputs,
                value_info: Vec::new(),
            }),
            metadata_props: Vec::new(),
        }
    }
}

// Attribute constructors.

pub fn attr_i(name: &str, value: i64) -> AttributeProto {
    AttributeProto {
        name: name.to_string(),
        i: value,
        r#type: attribute_proto::AttributeType::Int as i32,
        ..empty_attr()
    }
}

pub fn attr_f(name: &str, value: f32) -> AttributeProto {
    AttributeProto {
        name: name.to_string(),
        f: value,
        r#type: attribute_proto::AttributeType::Float as i32,
        ..empty_attr()
    }
}

pub fn attr_ints(name: &str, values: &[i64]) -> AttributeProto {
    AttributeProto {
        name: name.to_string(),
        ints: values.to_vec(),
        r#type: attribute_proto::AttributeType::Ints as i32,
        ..empty_attr()
    }
}

pub fn attr_tensor(name: &str, tensor: TensorProto) -> AttributeProto {
    AttributeProto {
        name: name.to_string(),
        t: Some(tensor),
        r#type: attribute_proto::AttributeType::Tensor as i32,
        ..empty_attr()
    }
}

pub fn scalar_tensor_f32(value: f32) -> TensorProto {
    TensorProto {
        data_type: tensor_proto::DataType::Float as i32,
        raw_data: value.to_le_bytes().to_vec(),
        ..Default::default()
    }
}

fn empty_attr() -> AttributeProto {
    AttributeProto {
        name: String::new(),
        f: 0.0,
        i: 0,
        s: Vec::new(),
        t: None,
        floats: Vec::new(),
        ints: Vec::new(),
        strings: Vec::new(),
        r#type: attribute_proto::AttributeType::Undefined as i32,
    }
}

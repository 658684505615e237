use half::{bf16, f16};
use ndarray::{ArrayView, IxDyn};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{ArrayElement, DataType};

/// Owned host tensor. The buffer is backed by `u64` words so that every
/// supported element type can be viewed in place without realignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    buffer: Vec<u64>,
    byte_len: usize,
    shape: Box<[usize]>,
    data_type: DataType,
}

fn words_for(byte_len: usize) -> usize {
    byte_len.div_ceil(size_of::<u64>())
}

impl Array {
    pub fn zeros(shape: &[usize], data_type: DataType) -> Self {
        let byte_len = shape.iter().product::<usize>() * data_type.size_in_bytes();
        Self {
            buffer: vec![0u64; words_for(byte_len)],
            byte_len,
            shape: shape.into(),
            data_type,
        }
    }

    pub fn from_vec<T: ArrayElement>(shape: &[usize], values: Vec<T>) -> Self {
        assert_eq!(
            shape.iter().product::<usize>(),
            values.len(),
            "shape {:?} does not match {} elements",
            shape,
            values.len()
        );
        let mut array = Self::zeros(shape, T::data_type());
        array.bytes_mut().copy_from_slice(bytemuck::cast_slice(&values));
        array
    }

    /// F32 tensor filled from a seeded uniform distribution over [-1, 1).
    /// Used for example export inputs, where only the shape matters but a
    /// fixed seed keeps runs reproducible.
    pub fn sample_uniform(shape: &[usize], seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let values: Vec<f32> = (0..shape.iter().product::<usize>())
            .map(|_| rng.random_range(-1.0..1.0))
            .collect();
        Self::from_vec(shape, values)
    }

    pub fn from_le_bytes(shape: &[usize], data_type: DataType, bytes: &[u8]) -> Self {
        let mut array = Self::zeros(shape, data_type);
        assert_eq!(array.byte_len, bytes.len());
        array.bytes_mut().copy_from_slice(bytes);
        array
    }

    // Getters
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn bytes(&self) -> &[u8] {
        &bytemuck::cast_slice(&self.buffer)[..self.byte_len]
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut(&mut self.buffer)[..self.byte_len]
    }

    pub fn as_slice<T: ArrayElement>(&self) -> Option<&[T]> {
        if T::data_type() != self.data_type {
            return None;
        }
        bytemuck::try_cast_slice(self.bytes()).ok()
    }

    /// Borrow as F32 elements. Panics for any other element type; weight
    /// arrays are widened to F32 at load time, so this is an invariant of
    /// loaded models, not a runtime condition.
    pub fn f32s(&self) -> &[f32] {
        match self.as_slice::<f32>() {
            Some(slice) => slice,
            None => panic!("expected an F32 array, got {:?}", self.data_type),
        }
    }

    pub fn as_view<T: ArrayElement>(&self) -> Option<ArrayView<'_, T, IxDyn>> {
        let slice = self.as_slice::<T>()?;
        ArrayView::from_shape(IxDyn(&self.shape), slice).ok()
    }

    /// Materialize as F32, converting half-precision storage. Returns `None`
    /// for element types with no exact F32 widening.
    pub fn to_f32(&self) -> Option<Array> {
        match self.data_type {
            DataType::F32 => Some(self.clone()),
            DataType::F16 => {
                let halves = self.as_slice::<f16>()?;
                let values: Vec<f32> = halves.iter().map(|v| v.to_f32()).collect();
                Some(Array::from_vec(&self.shape, values))
            },
            DataType::BF16 => {
                let halves = self.as_slice::<bf16>()?;
                let values: Vec<f32> = halves.iter().map(|v| v.to_f32()).collect();
                Some(Array::from_vec(&self.shape, values))
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_vec_round_trips_elements() {
        let array = Array::from_vec(&[2, 3], vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(array.data_type(), DataType::F32);
        assert_eq!(array.num_elements(), 6);
        assert_eq!(array.as_slice::<f32>().unwrap()[4], 5.0);
        let view = array.as_view::<f32>().unwrap();
        assert_eq!(view[[1, 2]], 6.0);
    }

    #[test]
    fn sample_uniform_is_reproducible() {
        let a = Array::sample_uniform(&[4, 4], 2025);
        let b = Array::sample_uniform(&[4, 4], 2025);
        assert_eq!(a.bytes(), b.bytes());
    }

    #[test]
    fn half_precision_widens_to_f32() {
        let halves: Vec<f16> = [0.5f32, -1.25].iter().map(|v| f16::from_f32(*v)).collect();
        let array = Array::from_vec(&[2], halves);
        let widened = array.to_f32().unwrap();
        assert_eq!(widened.as_slice::<f32>().unwrap(), &[0.5, -1.25]);
    }
}

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};

/// Generate the continuous indices of every pixel of an image.
///
/// `shape` is ordered slowest axis first (`[Z, Y, X]`), matching the tensor
/// layout. The returned tensor has shape `[N, D]` with rows in storage order
/// and columns ordered x first, so row `k` holds the index of flat element `k`.
pub fn generate_grid<B: Backend, const D: usize>(shape: [usize; D], device: &B::Device) -> Tensor<B, 2> {
    let total: usize = shape.iter().product();
    let mut grid = Vec::with_capacity(total * D);

    for flat in 0..total {
        let mut rem = flat;
        let mut coords = [0.0f32; D];
        for (axis, coord) in coords.iter_mut().enumerate() {
            let len = shape[D - 1 - axis];
            *coord = (rem % len) as f32;
            rem /= len;
        }
        grid.extend_from_slice(&coords);
    }

    Tensor::<B, 2>::from_data(TensorData::new(grid, [total, D]), device)
}

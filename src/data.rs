use crate::dataset::ColorizationItem;
use burn::{data::dataloader::batcher::Batcher, prelude::*};

/// ITU-R BT.601 luma weights used to derive the grayscale input.
const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

#[derive(Clone, Debug, Default)]
pub struct ColorizationBatcher;

/// One training batch of grayscale inputs and their color targets.
#[derive(Clone, Debug)]
pub struct ColorizationBatch<B: Backend> {
    /// Grayscale inputs, `[batch_size, 1, height, width]`, in `[0, 1]`.
    pub inputs: Tensor<B, 4>,
    /// Color targets, `[batch_size, 3, height, width]`, in `[0, 1]`.
    pub targets: Tensor<B, 4>,
}

impl ColorizationBatcher {
    pub fn new() -> Self {
        Self
    }
}

impl<B: Backend> Batcher<B, ColorizationItem, ColorizationBatch<B>> for ColorizationBatcher {
    fn batch(&self, items: Vec<ColorizationItem>, device: &B::Device) -> ColorizationBatch<B> {
        let targets = items
            .into_iter()
            .map(|item| {
                let shape = Shape::new([item.height, item.width, 3]);
                TensorData::new(item.rgb, shape)
            })
            .map(|data| {
                Tensor::<B, 3>::from_data(data.convert::<B::FloatElem>(), device)
                    .swap_dims(2, 1) // [H, C, W]
                    .swap_dims(1, 0) // [C, H, W]
            })
            .map(|tensor| tensor / 255) // normalize between [0, 1]
            .collect();

        let targets = Tensor::stack(targets, 0);
        let inputs = grayscale(targets.clone());

        ColorizationBatch { inputs, targets }
    }
}

/// Collapses `[batch_size, 3, height, width]` color images into their
/// `[batch_size, 1, height, width]` luma planes.
pub fn grayscale<B: Backend>(images: Tensor<B, 4>) -> Tensor<B, 4> {
    let weights =
        Tensor::<B, 1>::from_floats(LUMA_WEIGHTS, &images.device()).reshape([1, 3, 1, 1]);

    (images * weights).sum_dim(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn item(rgb: Vec<u8>, size: usize) -> ColorizationItem {
        ColorizationItem {
            rgb,
            width: size,
            height: size,
        }
    }

    #[test]
    fn batches_pair_inputs_with_targets() {
        let device = Default::default();
        let items = vec![
            item(vec![0; 16 * 16 * 3], 16),
            item(vec![255; 16 * 16 * 3], 16),
        ];

        let batch: ColorizationBatch<TestBackend> =
            ColorizationBatcher::new().batch(items, &device);

        assert_eq!(batch.inputs.dims(), [2, 1, 16, 16]);
        assert_eq!(batch.targets.dims(), [2, 3, 16, 16]);
    }

    #[test]
    fn targets_are_scaled_to_unit_range() {
        let device = Default::default();
        let batch: ColorizationBatch<TestBackend> =
            ColorizationBatcher::new().batch(vec![item(vec![255; 4 * 4 * 3], 4)], &device);

        let targets = batch.targets.into_data().to_vec::<f32>().unwrap();
        assert!(targets.iter().all(|&value| (value - 1.0).abs() < 1e-6));
    }

    #[test]
    fn monochrome_images_keep_their_luma_plane() {
        let device = Default::default();
        let batch: ColorizationBatch<TestBackend> =
            ColorizationBatcher::new().batch(vec![item(vec![128; 4 * 4 * 3], 4)], &device);

        let inputs = batch.inputs.into_data().to_vec::<f32>().unwrap();
        let expected = 128.0 / 255.0;
        assert!(inputs.iter().all(|&value| (value - expected).abs() < 1e-5));
    }
}

use burn::tensor::{Tensor, backend::Backend};
use image::{Rgb, RgbImage};

/// Pixels of padding inserted around every grid cell.
const PADDING: u32 = 2;

/// Converts a `[channels, height, width]` tensor in `[0, 1]` into an RGB
/// image. Single-channel tensors are replicated over the three channels.
pub fn to_rgb_image<B: Backend>(tensor: Tensor<B, 3>) -> RgbImage {
    let [channels, height, width] = tensor.dims();
    assert!(
        channels == 1 || channels == 3,
        "Image tensors should have 1 or 3 channels, got {channels}"
    );

    let pixels = tensor
        .clamp(0.0, 1.0)
        .mul_scalar(255.0)
        .into_data()
        .to_vec::<f32>()
        .expect("Image tensor data should convert to f32");

    let plane = height * width;
    let mut image = RgbImage::new(width as u32, height as u32);
    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            let rgb = if channels == 1 {
                [pixels[i] as u8; 3]
            } else {
                [
                    pixels[i] as u8,
                    pixels[plane + i] as u8,
                    pixels[2 * plane + i] as u8,
                ]
            };
            image.put_pixel(x as u32, y as u32, Rgb(rgb));
        }
    }

    image
}

/// Tiles a `[batch_size, channels, height, width]` batch into a single
/// row-major grid image with `cells_per_row` cells per row and padding
/// between cells.
pub fn image_grid<B: Backend>(images: Tensor<B, 4>, cells_per_row: usize) -> RgbImage {
    let [count, channels, height, width] = images.dims();
    let cells_per_row = cells_per_row.clamp(1, count.max(1));
    let rows = count.div_ceil(cells_per_row);

    let cell_w = width as u32 + PADDING;
    let cell_h = height as u32 + PADDING;
    let mut grid = RgbImage::new(
        cells_per_row as u32 * cell_w + PADDING,
        rows as u32 * cell_h + PADDING,
    );

    for index in 0..count {
        let cell = images
            .clone()
            .slice([index..index + 1])
            .reshape([channels, height, width]);
        let x = PADDING + (index % cells_per_row) as u32 * cell_w;
        let y = PADDING + (index / cells_per_row) as u32 * cell_h;
        image::imageops::replace(&mut grid, &to_rgb_image(cell), x as i64, y as i64);
    }

    grid
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn grayscale_cells_are_replicated_over_rgb() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 3>::full([1, 2, 2], 0.5, &device);

        let image = to_rgb_image(tensor);
        let pixel = image.get_pixel(0, 0);
        assert_eq!(pixel[0], pixel[1]);
        assert_eq!(pixel[1], pixel[2]);
    }

    #[test]
    fn values_are_clamped_before_conversion() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 3>::full([3, 1, 1], 2.0, &device);

        let image = to_rgb_image(tensor);
        assert_eq!(image.get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn grids_tile_cells_row_major() {
        let device = Default::default();
        let images = Tensor::<TestBackend, 4>::ones([4, 1, 2, 2], &device);

        let grid = image_grid(images, 2);
        // Two rows of two 2x2 cells, 2px padding around each.
        assert_eq!(grid.dimensions(), (10, 10));
    }

    #[test]
    fn partial_last_rows_are_supported() {
        let device = Default::default();
        let images = Tensor::<TestBackend, 4>::ones([3, 3, 2, 2], &device);

        let grid = image_grid(images, 2);
        assert_eq!(grid.dimensions(), (10, 10));
    }
}

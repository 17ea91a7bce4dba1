use burn::data::dataset::Dataset;
use globwalk::DirEntry;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Spatial size every image is resized to before batching.
pub const IMAGE_SIZE: usize = 224;

const SUPPORTED_FILES: [&str; 4] = ["bmp", "jpg", "jpeg", "png"];

/// Loader-level failure while assembling the image folder dataset.
#[derive(Error, Debug)]
pub enum ImageLoaderError {
    /// The dataset root does not exist or is not a directory.
    #[error("Invalid dataset root: `{0}`")]
    InvalidRoot(String),

    /// No supported image file was found under the dataset root.
    #[error("No supported image found under: `{0}`")]
    NoImagesFound(String),

    /// I/O operation error.
    #[error("I/O error: `{0}`")]
    IOError(String),
}

/// A color image decoded from disk and resized to
/// [`IMAGE_SIZE`] x [`IMAGE_SIZE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorizationItem {
    /// Interleaved RGB8 pixels, row-major.
    pub rgb: Vec<u8>,
    /// Image width in pixels.
    pub width: usize,
    /// Image height in pixels.
    pub height: usize,
}

/// A dataset of color images collected recursively from a root folder.
///
/// Only the paths are held in memory; decoding and resizing happen in
/// [`get`](Dataset::get).
#[derive(Debug)]
pub struct ColorizationDataset {
    image_paths: Vec<PathBuf>,
}

impl ColorizationDataset {
    /// Collect every supported image (bmp, jpg, jpeg, png) under `root`,
    /// ordered by path.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, ImageLoaderError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(ImageLoaderError::InvalidRoot(root.display().to_string()));
        }

        // Glob all images with supported extensions, e.g. "**/*.{jpg,png}"
        let walker = globwalk::GlobWalkerBuilder::from_patterns(
            root,
            &[format!("**/*.{{{}}}", SUPPORTED_FILES.join(","))],
        )
        .follow_links(true)
        .sort_by(|p1: &DirEntry, p2: &DirEntry| p1.path().cmp(p2.path()))
        .build()
        .map_err(|err| ImageLoaderError::IOError(format!("{err:?}")))?;

        let image_paths: Vec<_> = walker
            .filter_map(Result::ok)
            .map(DirEntry::into_path)
            .collect();

        if image_paths.is_empty() {
            return Err(ImageLoaderError::NoImagesFound(root.display().to_string()));
        }

        Ok(Self { image_paths })
    }
}

impl Dataset<ColorizationItem> for ColorizationDataset {
    fn get(&self, index: usize) -> Option<ColorizationItem> {
        let path = self.image_paths.get(index)?;
        let image = image::open(path)
            .unwrap_or_else(|err| panic!("Image {} should be decodable: {err}", path.display()))
            .resize_exact(IMAGE_SIZE as u32, IMAGE_SIZE as u32, FilterType::Triangle)
            .into_rgb8();

        Some(ColorizationItem {
            rgb: image.into_raw(),
            width: IMAGE_SIZE,
            height: IMAGE_SIZE,
        })
    }

    fn len(&self) -> usize {
        self.image_paths.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_image(path: &Path, width: u32, height: u32) {
        image::RgbImage::from_pixel(width, height, image::Rgb([10, 20, 30]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn collects_and_resizes_supported_images() {
        let root = tempfile::tempdir().unwrap();
        write_image(&root.path().join("b.png"), 8, 8);
        write_image(&root.path().join("a.jpg"), 64, 32);
        std::fs::write(root.path().join("notes.txt"), "not an image").unwrap();

        let dataset = ColorizationDataset::new(root.path()).unwrap();
        assert_eq!(dataset.len(), 2);

        let item = dataset.get(0).unwrap();
        assert_eq!(item.rgb.len(), IMAGE_SIZE * IMAGE_SIZE * 3);
        assert_eq!([item.width, item.height], [IMAGE_SIZE, IMAGE_SIZE]);
        assert!(dataset.get(2).is_none());
    }

    #[test]
    fn rejects_a_missing_root() {
        let err = ColorizationDataset::new("/definitely/not/here").unwrap_err();
        assert!(matches!(err, ImageLoaderError::InvalidRoot(_)));
    }

    #[test]
    fn rejects_a_root_without_images() {
        let root = tempfile::tempdir().unwrap();
        let err = ColorizationDataset::new(root.path()).unwrap_err();
        assert!(matches!(err, ImageLoaderError::NoImagesFound(_)));
    }
}

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use ndarray::{Array3, ArrayView4, Axis};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error("Failed to open image: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Spatial shape the model was trained on. Always one grayscale channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputShape {
    pub height: u32,
    pub width: u32,
}

impl InputShape {
    pub const CHANNELS: usize = 1;

    pub fn square(size: u32) -> Self {
        Self {
            height: size,
            width: size,
        }
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        (self.height as usize, self.width as usize, Self::CHANNELS)
    }
}

impl Default for InputShape {
    fn default() -> Self {
        Self::square(128)
    }
}

/// Grayscale image as `height x width x 1`, values scaled to `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Array3<f32>,
}

impl ImageTensor {
    #[cfg(test)]
    pub(crate) fn from_array(data: Array3<f32>) -> Self {
        Self { data }
    }

    pub fn zeros(shape: InputShape) -> Self {
        Self {
            data: Array3::zeros(shape.dims()),
        }
    }

    pub fn from_image(image: &DynamicImage, shape: InputShape) -> Self {
        let gray = image
            .resize_exact(shape.width, shape.height, FilterType::Triangle)
            .into_luma8();
        let data = Array3::from_shape_fn(shape.dims(), |(y, x, _)| {
            f32::from(gray.get_pixel(x as u32, y as u32).0[0]) / 255.0
        });
        Self { data }
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn matches(&self, shape: InputShape) -> bool {
        self.data.dim() == shape.dims()
    }

    /// View with a leading batch dimension of 1 (NHWC).
    pub fn batched(&self) -> ArrayView4<'_, f32> {
        self.data.view().insert_axis(Axis(0))
    }

    pub fn as_slice(&self) -> Option<&[f32]> {
        self.data.as_slice()
    }
}

/// Reads the file at `path` and turns it into the model's input tensor.
///
/// The format is sniffed from the content, so a misleading client extension
/// does not matter.
pub fn load_image_tensor(path: &Path, shape: InputShape) -> Result<ImageTensor, PreprocessError> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(ImageTensor::from_image(&image, shape))
}

use image::imageops::{self, FilterType};
use image::RgbImage;

use super::CHANNELS;

/// Resampling filter used for every resize. Changing it changes artifact bytes.
pub const RESAMPLE_FILTER: FilterType = FilterType::CatmullRom;

/// A `height x width x 3` tensor of channel intensities in `[0.0, 1.0]`,
/// stored row-major as (row, column, channel).
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    height: usize,
    width: usize,
    data: Vec<f32>,
}

impl ImageTensor {
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.height, self.width, CHANNELS)
    }

    pub fn values(&self) -> &[f32] {
        &self.data
    }

    pub fn get(&self, row: usize, col: usize, channel: usize) -> Option<f32> {
        if row >= self.height || col >= self.width || channel >= CHANNELS {
            return None;
        }
        self.data.get((row * self.width + col) * CHANNELS + channel).copied()
    }
}

/// Resizes `image` to exactly `target_size` (width, height) with
/// Catmull-Rom bicubic resampling, then scales channels from 0..=255 to 0.0..=1.0.
pub fn normalize_image(image: &RgbImage, target_size: (u32, u32)) -> ImageTensor {
    let (width, height) = target_size;
    let resized = if image.dimensions() == target_size {
        image.clone()
    } else {
        imageops::resize(image, width, height, RESAMPLE_FILTER)
    };

    // RgbImage stores pixels row-major with interleaved channels already
    let data = resized
        .into_raw()
        .into_iter()
        .map(|v| f32::from(v) / 255.0)
        .collect();

    ImageTensor {
        height: height as usize,
        width: width as usize,
        data,
    }
}

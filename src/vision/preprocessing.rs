// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for the leaf detector and classifier

use clap::ValueEnum;
use image::{imageops::FilterType, DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::{Array4, ArrayD, IxDyn, ShapeError};
use serde::{Deserialize, Serialize};

/// Default square input size for the classifier
pub const CLASSIFIER_INPUT_SIZE: u32 = 224;

/// Default square input size for the detector
pub const DETECTOR_INPUT_SIZE: u32 = 640;

/// Letterbox padding value (YOLO convention)
pub const LETTERBOX_FILL: u8 = 114;

/// Tensor layout expected by the classifier graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InputLayout {
    /// `[1, 1, H, W, 3]`: the image as a single-step sequence
    #[default]
    Sequence,
    /// `[1, H, W, 3]`
    Nhwc,
    /// `[1, 3, H, W]`
    Nchw,
}

impl InputLayout {
    /// Tensor shape for a square input of `size` pixels
    pub fn shape(&self, size: u32) -> Vec<usize> {
        let s = size as usize;
        match self {
            InputLayout::Sequence => vec![1, 1, s, s, 3],
            InputLayout::Nhwc => vec![1, s, s, 3],
            InputLayout::Nchw => vec![1, 3, s, s],
        }
    }
}

/// Preprocess an image for classification
///
/// Steps:
/// 1. Resize (no aspect preservation) to `size x size`, bicubic
/// 2. Scale pixels to `[0, 1]`
/// 3. Lay out according to `layout`
pub fn preprocess_for_classification(
    image: &DynamicImage,
    size: u32,
    layout: InputLayout,
) -> Result<ArrayD<f32>, ShapeError> {
    let rgb = image
        .resize_exact(size, size, FilterType::CatmullRom)
        .to_rgb8();
    let s = size as usize;

    let data: Vec<f32> = match layout {
        InputLayout::Sequence | InputLayout::Nhwc => rgb
            .as_raw()
            .iter()
            .map(|&v| v as f32 / 255.0)
            .collect(),
        InputLayout::Nchw => {
            let mut planar = vec![0.0f32; 3 * s * s];
            for (x, y, pixel) in rgb.enumerate_pixels() {
                let offset = y as usize * s + x as usize;
                for c in 0..3 {
                    planar[c * s * s + offset] = pixel[c] as f32 / 255.0;
                }
            }
            planar
        }
    };

    ArrayD::from_shape_vec(IxDyn(&layout.shape(size)), data)
}

/// Preprocess an image for leaf detection
///
/// Letterboxes to `size x size`, scales to `[0, 1]` and returns NCHW `[1, 3, S, S]`
/// along with the mapping needed to bring boxes back to original pixels.
pub fn preprocess_for_detection(image: &DynamicImage, size: u32) -> (Array4<f32>, LetterboxInfo) {
    let info = LetterboxInfo::new(image, size);
    let padded = letterbox(image, size);

    let s = size as usize;
    let mut tensor = Array4::zeros((1, 3, s, s));
    for (x, y, pixel) in padded.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }

    (tensor, info)
}

/// Resize with aspect ratio preservation, centered on a gray square
pub fn letterbox(image: &DynamicImage, target_size: u32) -> RgbImage {
    let fill = Rgb([LETTERBOX_FILL; 3]);
    let (orig_w, orig_h) = image.dimensions();

    if orig_w == 0 || orig_h == 0 {
        return RgbImage::from_pixel(target_size, target_size, fill);
    }

    let info = LetterboxInfo::new(image, target_size);
    let new_w = info.scaled_width.max(1);
    let new_h = info.scaled_height.max(1);

    let resized = image
        .resize_exact(new_w, new_h, FilterType::Triangle)
        .to_rgb8();

    let mut output = RgbImage::from_pixel(target_size, target_size, fill);
    image::imageops::replace(
        &mut output,
        &resized,
        info.offset_x as i64,
        info.offset_y as i64,
    );
    output
}

/// Scale and padding applied by [`letterbox`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxInfo {
    /// Scale factor applied
    pub scale: f32,
    /// X offset from padding
    pub offset_x: u32,
    /// Y offset from padding
    pub offset_y: u32,
    pub scaled_width: u32,
    pub scaled_height: u32,
    /// Original image width
    pub original_width: u32,
    /// Original image height
    pub original_height: u32,
}

impl LetterboxInfo {
    pub fn new(image: &DynamicImage, target_size: u32) -> Self {
        let (orig_w, orig_h) = image.dimensions();

        if orig_w == 0 || orig_h == 0 {
            return Self {
                scale: 1.0,
                offset_x: 0,
                offset_y: 0,
                scaled_width: 0,
                scaled_height: 0,
                original_width: orig_w,
                original_height: orig_h,
            };
        }

        let scale = (target_size as f32 / orig_w as f32).min(target_size as f32 / orig_h as f32);
        let scaled_width = ((orig_w as f32 * scale).round() as u32).clamp(1, target_size);
        let scaled_height = ((orig_h as f32 * scale).round() as u32).clamp(1, target_size);

        Self {
            scale,
            offset_x: (target_size - scaled_width) / 2,
            offset_y: (target_size - scaled_height) / 2,
            scaled_width,
            scaled_height,
            original_width: orig_w,
            original_height: orig_h,
        }
    }

    /// Map a coordinate from letterboxed space back to original image space
    pub fn map_to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let orig_x = (x - self.offset_x as f32) / self.scale;
        let orig_y = (y - self.offset_y as f32) / self.scale;
        (orig_x, orig_y)
    }
}

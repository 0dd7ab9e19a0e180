use crate::error::{Error, Result};
use crate::models::{ColorName, TextureLevel};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, RgbImage};
use ndarray::{Array2, Axis, Slice};

pub const DEFAULT_ANALYSIS_SIZE: u32 = 100;
pub const FALLBACK_COLOR: ColorName = ColorName::Beige;
pub const FALLBACK_TEXTURE: TextureLevel = TextureLevel::Medium;

const SMOOTH_BELOW: f64 = 5.0;
const MEDIUM_BELOW: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSignals {
    pub color: ColorName,
    pub texture: TextureLevel,
}

impl Default for ImageSignals {
    fn default() -> Self {
        Self {
            color: FALLBACK_COLOR,
            texture: FALLBACK_TEXTURE,
        }
    }
}

pub fn analyze_image(img: &DynamicImage, size: u32) -> ImageSignals {
    ImageSignals {
        color: dominant_color(img, size),
        texture: texture_level(img, size),
    }
}

pub fn dominant_color(img: &DynamicImage, size: u32) -> ColorName {
    match mean_rgb(img, size) {
        Ok(mean) => {
            let color = classify_rgb(mean);
            log::debug!(
                "Mean RGB ({:.1}, {:.1}, {:.1}) -> {color}",
                mean[0],
                mean[1],
                mean[2]
            );
            color
        }
        Err(err) => {
            log::warn!("Color analysis failed: {err}; defaulting to {FALLBACK_COLOR}");
            FALLBACK_COLOR
        }
    }
}

pub fn texture_level(img: &DynamicImage, size: u32) -> TextureLevel {
    match mean_gradient_magnitude(img, size) {
        Ok(magnitude) => {
            let level = texture_from_gradient(magnitude);
            log::debug!("Mean gradient magnitude {magnitude:.2} -> {level}");
            level
        }
        Err(err) => {
            log::warn!("Texture analysis failed: {err}; defaulting to {FALLBACK_TEXTURE}");
            FALLBACK_TEXTURE
        }
    }
}

pub fn mean_rgb(img: &DynamicImage, size: u32) -> Result<[f64; 3]> {
    ensure_not_empty(img)?;
    let rgb = downsample_rgb(img.to_rgb8(), size);
    let mut sums = [0f64; 3];
    for pixel in rgb.pixels() {
        sums[0] += pixel[0] as f64;
        sums[1] += pixel[1] as f64;
        sums[2] += pixel[2] as f64;
    }
    let count = rgb.width() as f64 * rgb.height() as f64;
    Ok([sums[0] / count, sums[1] / count, sums[2] / count])
}

/// First matching threshold rule wins; the ranges overlap.
pub fn classify_rgb([r, g, b]: [f64; 3]) -> ColorName {
    if r > 200.0 && g < 100.0 && b < 100.0 {
        ColorName::Red
    } else if r < 100.0 && g > 150.0 && b < 100.0 {
        ColorName::Green
    } else if r > 200.0 && g > 200.0 && b < 100.0 {
        ColorName::Yellow
    } else if r > 150.0 && g > 100.0 && b < 100.0 {
        ColorName::Orange
    } else if r < 100.0 && g < 100.0 && b > 150.0 {
        ColorName::Blue
    } else if r > 200.0 && g > 200.0 && b > 200.0 {
        ColorName::White
    } else if r < 50.0 && g < 50.0 && b < 50.0 {
        ColorName::Black
    } else if r > 100.0 && g > 50.0 && b < 100.0 {
        ColorName::Brown
    } else if r > 150.0
        && g > 100.0
        && b > 100.0
        && (r - g).abs() < 50.0
        && (r - b).abs() < 50.0
    {
        ColorName::Beige
    } else if r < 100.0 && g < 100.0 && b < 100.0 {
        ColorName::Dark
    } else {
        ColorName::Beige
    }
}

pub fn mean_gradient_magnitude(img: &DynamicImage, size: u32) -> Result<f64> {
    ensure_not_empty(img)?;
    let gray = downsample_gray(img.to_luma8(), size);
    let (w, h) = gray.dimensions();
    if w < 2 || h < 2 {
        return Err(Error::Processing(format!(
            "image too small for gradient: {w}x{h}"
        )));
    }
    let values = Array2::from_shape_fn((h as usize, w as usize), |(y, x)| {
        gray.get_pixel(x as u32, y as u32)[0] as f64
    });
    let gy = gradient(&values, Axis(0));
    let gx = gradient(&values, Axis(1));
    let magnitude = (&gx * &gx + &gy * &gy).mapv(f64::sqrt);
    magnitude
        .mean()
        .ok_or_else(|| Error::Processing("empty gradient field".into()))
}

pub fn texture_from_gradient(magnitude: f64) -> TextureLevel {
    if magnitude < SMOOTH_BELOW {
        TextureLevel::Smooth
    } else if magnitude < MEDIUM_BELOW {
        TextureLevel::Medium
    } else {
        TextureLevel::Complex
    }
}

/// Central differences inside, one-sided differences on the two borders.
/// Callers guarantee at least two samples along `axis`.
fn gradient(values: &Array2<f64>, axis: Axis) -> Array2<f64> {
    let n = values.len_of(axis);
    let mut grad = Array2::<f64>::zeros(values.raw_dim());
    if n > 2 {
        let ahead = values.slice_axis(axis, Slice::from(2..n));
        let behind = values.slice_axis(axis, Slice::from(0..n - 2));
        grad.slice_axis_mut(axis, Slice::from(1..n - 1))
            .assign(&((&ahead - &behind) / 2.0));
    }
    let first = &values.index_axis(axis, 1) - &values.index_axis(axis, 0);
    grad.index_axis_mut(axis, 0).assign(&first);
    let last = &values.index_axis(axis, n - 1) - &values.index_axis(axis, n - 2);
    grad.index_axis_mut(axis, n - 1).assign(&last);
    grad
}

fn ensure_not_empty(img: &DynamicImage) -> Result<()> {
    if img.width() == 0 || img.height() == 0 {
        return Err(Error::Processing("image has no pixels".into()));
    }
    Ok(())
}

fn downsample_rgb(img: RgbImage, size: u32) -> RgbImage {
    if img.dimensions() == (size, size) {
        return img;
    }
    image::imageops::resize(&img, size, size, FilterType::Lanczos3)
}

fn downsample_gray(img: GrayImage, size: u32) -> GrayImage {
    if img.dimensions() == (size, size) {
        return img;
    }
    image::imageops::resize(&img, size, size, FilterType::Lanczos3)
}

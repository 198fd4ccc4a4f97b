use image::{DynamicImage, GrayImage, Luma};
use ndarray::{Array4, ArrayView4};
use std::path::Path;

/// Side length of the square input the classifier was trained on.
pub const INPUT_SIZE: u32 = 224;

/// (batch, height, width, channels).
pub const INPUT_SHAPE: [usize; 4] = [1, INPUT_SIZE as usize, INPUT_SIZE as usize, 1];

#[derive(Debug, thiserror::Error)]
pub enum NormalizationError {
    #[error("Image decode error: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Grayscale batch of one, shape `INPUT_SHAPE`, values in [0, 1].
///
/// Only constructed by the functions in this module so every tensor handed
/// to the classifier went through the same transform.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor {
    data: Array4<f32>,
}

impl NormalizedTensor {
    pub fn zeros() -> Self {
        Self {
            data: Array4::zeros(INPUT_SHAPE),
        }
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }
}

/// Decodes any supported raster format from memory and normalizes it.
pub fn normalize_bytes(bytes: &[u8]) -> Result<NormalizedTensor, NormalizationError> {
    let img = image::load_from_memory(bytes)?;
    normalize_image(img)
}

/// Reads the file and normalizes it. The format is sniffed from the content,
/// not the file extension.
pub fn normalize_file(path: &Path) -> Result<NormalizedTensor, NormalizationError> {
    let bytes = std::fs::read(path)?;
    normalize_bytes(&bytes)
}

fn normalize_image(img: DynamicImage) -> Result<NormalizedTensor, NormalizationError> {
    let gray = to_grayscale(img);

    // Aspect ratio is not preserved; the training images were squashed too.
    let resized = resize_linear(&gray, INPUT_SIZE, INPUT_SIZE);

    let pixels: Vec<f32> = resized
        .into_raw()
        .into_iter()
        .map(|p| f32::from(p) / 255.0)
        .collect();

    let data = Array4::from_shape_vec(INPUT_SHAPE, pixels)?;
    Ok(NormalizedTensor { data })
}

fn to_grayscale(img: DynamicImage) -> GrayImage {
    match img {
        DynamicImage::ImageLuma8(gray) => gray,
        other => {
            let rgb = other.to_rgb8();
            GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
                let [r, g, b] = rgb.get_pixel(x, y).0;
                Luma([bt601_luma(r, g, b)])
            })
        }
    }
}

/// Fixed-point precision of the interpolation weights.
const WEIGHT_BITS: u32 = 11;
const WEIGHT_ONE: f32 = (1 << WEIGHT_BITS) as f32;

/// Source indices and fixed-point weights for one output coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Taps {
    lo: usize,
    hi: usize,
    w_lo: i32,
    w_hi: i32,
}

/// Two-tap linear sampling positions along one axis, using pixel-centre
/// alignment: output `d` samples source coordinate `(d + 0.5) * scale - 0.5`.
///
/// Horizontally a position past either edge snaps to the edge pixel with a
/// zero fraction. Vertically only the row indices are clamped and the
/// fraction is kept.
fn linear_taps(src_len: u32, dst_len: u32, zero_fraction_at_edges: bool) -> Vec<Taps> {
    let scale = f64::from(src_len) / f64::from(dst_len);
    let last = i64::from(src_len) - 1;

    (0..dst_len)
        .map(|d| {
            let pos = ((f64::from(d) + 0.5) * scale - 0.5) as f32;
            let mut lo = pos.floor() as i64;
            let mut frac = pos - lo as f32;

            if zero_fraction_at_edges {
                if lo < 0 {
                    lo = 0;
                    frac = 0.0;
                }
                if lo >= last {
                    lo = last;
                    frac = 0.0;
                }
            }

            Taps {
                lo: lo.clamp(0, last) as usize,
                hi: (lo + 1).clamp(0, last) as usize,
                w_lo: ((1.0 - frac) * WEIGHT_ONE).round_ties_even() as i32,
                w_hi: (frac * WEIGHT_ONE).round_ties_even() as i32,
            }
        })
        .collect()
}

/// Bilinear resize with OpenCV `INTER_LINEAR` semantics for 8-bit images:
/// two taps per axis and no antialiasing when shrinking. Weights and rounding
/// follow its fixed-point path, the one `cv2.resize` takes for `uint8` input.
pub fn resize_linear(src: &GrayImage, width: u32, height: u32) -> GrayImage {
    let (src_width, src_height) = src.dimensions();
    if src_width == 0 || src_height == 0 {
        return GrayImage::new(width, height);
    }

    let columns = linear_taps(src_width, width, true);
    let rows = linear_taps(src_height, height, false);

    let stride = src_width as usize;
    let pixels = src.as_raw();
    let horizontal = |row: usize| -> Vec<i32> {
        let line = &pixels[row * stride..(row + 1) * stride];
        columns
            .iter()
            .map(|t| i32::from(line[t.lo]) * t.w_lo + i32::from(line[t.hi]) * t.w_hi)
            .collect()
    };

    let mut out = GrayImage::new(width, height);
    for (dy, t) in rows.iter().enumerate() {
        let upper = horizontal(t.lo);
        let lower = horizontal(t.hi);
        for (dx, (&a, &b)) in upper.iter().zip(&lower).enumerate() {
            out.put_pixel(dx as u32, dy as u32, Luma([blend_rows(a, b, t.w_lo, t.w_hi)]));
        }
    }
    out
}

// Vertical step of the fixed-point path: drop 4 bits, keep the high half of
// each 16-bit product, then round off the last 2 bits.
fn blend_rows(upper: i32, lower: i32, w_upper: i32, w_lower: i32) -> u8 {
    let high = |sum: i32, weight: i32| ((sum >> 4).min(i32::from(i16::MAX)) * weight) >> 16;
    ((high(upper, w_upper) + high(lower, w_lower) + 2) >> 2).clamp(0, 255) as u8
}

// Fixed-point BT.601 weights (0.299, 0.587, 0.114) scaled by 2^14, rounded.
// Same arithmetic as the grayscale decode used to build the training set.
fn bt601_luma(r: u8, g: u8, b: u8) -> u8 {
    const R: u32 = 4899;
    const G: u32 = 9617;
    const B: u32 = 1868;
    let y = (u32::from(r) * R + u32::from(g) * G + u32::from(b) * B + (1 << 13)) >> 14;
    y.min(255) as u8
}

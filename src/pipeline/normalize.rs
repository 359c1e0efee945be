//! Image normalisation: cap the longest edge of a page image.
//!
//! Vision endpoints downscale large inputs anyway and bill or reject by
//! payload size, so pages are brought under `max_dimension` here, with the
//! aspect ratio preserved, before they are encoded.

use crate::error::PdfTextError;
use image::imageops::FilterType;
use image::DynamicImage;
use std::io::Cursor;

/// What the pipeline needs from a raster image.
pub trait PageImage: Sized {
    /// `(width, height)` in pixels.
    fn size_px(&self) -> (u32, u32);

    /// A copy scaled to exactly `width × height` with a high-quality filter.
    fn resize_to(&self, width: u32, height: u32) -> Self;

    /// JPEG bytes at `quality` (1–100).
    fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, image::ImageError>;
}

impl PageImage for DynamicImage {
    fn size_px(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    fn resize_to(&self, width: u32, height: u32) -> Self {
        self.resize_exact(width, height, FilterType::Lanczos3)
    }

    fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, image::ImageError> {
        use image::codecs::jpeg::JpegEncoder;
        use image::{ExtendedColorType, ImageEncoder};

        // JPEG has no alpha channel.
        let rgb = self.to_rgb8();
        let mut buf = Vec::new();
        let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buf), quality);
        encoder.write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)?;
        Ok(buf)
    }
}

/// Target size for an image of `width × height` capped at `max_dimension`,
/// or `None` when it already fits.
pub fn scaled_size(width: u32, height: u32, max_dimension: u32) -> Option<(u32, u32)> {
    let longest = width.max(height);
    let ratio = f64::from(max_dimension) / f64::from(longest);
    if ratio >= 1.0 {
        return None;
    }
    let scale = |dim: u32| ((f64::from(dim) * ratio).round() as u32).max(1);
    Some((scale(width), scale(height)))
}

/// Downscale `image` so neither side exceeds `max_dimension`.
///
/// Images already within bounds come back untouched.
pub fn normalize<I: PageImage>(image: I, max_dimension: u32) -> Result<I, PdfTextError> {
    let (width, height) = image.size_px();
    if width == 0 || height == 0 {
        return Err(PdfTextError::InvalidInput(format!(
            "cannot normalise a {width}x{height} image"
        )));
    }
    if max_dimension == 0 {
        return Err(PdfTextError::InvalidInput(
            "max dimension must be at least 1 px".into(),
        ));
    }

    match scaled_size(width, height, max_dimension) {
        Some((w, h)) => Ok(image.resize_to(w, h)),
        None => Ok(image),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn blank(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([255, 255, 255])))
    }

    #[test]
    fn small_image_is_untouched() {
        for (w, h) in [(100, 200), (2000, 2000), (1999, 1), (1, 2000)] {
            let out = normalize(blank(w, h), 2000).unwrap();
            assert_eq!(out.size_px(), (w, h));
        }
    }

    #[test]
    fn large_image_hits_the_cap() {
        for (w, h) in [(2550, 3300), (3300, 2550), (4000, 3000), (2001, 1500)] {
            let out = normalize(blank(w, h), 2000).unwrap();
            let (nw, nh) = out.size_px();
            let longest = nw.max(nh);
            assert!(
                (1999..=2001).contains(&longest),
                "{w}x{h} → {nw}x{nh}"
            );

            let before = f64::from(w) / f64::from(h);
            let after = f64::from(nw) / f64::from(nh);
            assert!(
                ((after - before) / before).abs() < 0.01,
                "aspect drifted: {before} → {after}"
            );
        }
    }

    #[test]
    fn scaled_size_math() {
        assert_eq!(scaled_size(4000, 3000, 2000), Some((2000, 1500)));
        assert_eq!(scaled_size(1000, 500, 2000), None);
        assert_eq!(scaled_size(10_000, 1, 100), Some((100, 1)));
    }

    #[test]
    fn zero_sized_image_is_invalid() {
        let err = normalize(blank(0, 0), 2000).unwrap_err();
        assert!(matches!(err, PdfTextError::InvalidInput(_)));
    }

    #[test]
    fn zero_cap_is_invalid() {
        let err = normalize(blank(10, 10), 0).unwrap_err();
        assert!(matches!(err, PdfTextError::InvalidInput(_)));
    }
}

//! Thumbnail scaling and encoding.
//!
//! Sample frames are handed to the selection UI as small JPEG images. This
//! module scales a decoded frame so its longest edge fits a bound and encodes
//! it.

use image::{DynamicImage, codecs::jpeg::JpegEncoder, imageops::FilterType};

use crate::error::FrametrimError;

/// MIME type of encoded thumbnails.
pub const THUMBNAIL_MIME_TYPE: &str = "image/jpeg";

/// An encoded still image.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBytes {
    /// Encoded image data.
    pub data: Vec<u8>,
    /// MIME type of `data`.
    pub mime_type: &'static str,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl std::fmt::Debug for ImageBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageBytes")
            .field("mime_type", &self.mime_type)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Scale `image` to fit within `max_dimension` on its longest edge and encode
/// it as JPEG at `quality`.
///
/// Images already within the bound are encoded at their original size.
///
/// # Errors
///
/// Returns [`FrametrimError::ImageError`] if encoding fails.
pub fn encode_thumbnail(
    image: &DynamicImage,
    max_dimension: u32,
    quality: u8,
) -> Result<ImageBytes, FrametrimError> {
    let (width, height) = fit_dimensions(image.width(), image.height(), max_dimension);
    let rgb = if (width, height) == (image.width(), image.height()) {
        image.to_rgb8()
    } else {
        image
            .resize_exact(width, height, FilterType::Triangle)
            .to_rgb8()
    };

    let mut data = Vec::new();
    JpegEncoder::new_with_quality(&mut data, quality.clamp(1, 100))
        .encode_image(&rgb)?;

    Ok(ImageBytes {
        data,
        mime_type: THUMBNAIL_MIME_TYPE,
        width,
        height,
    })
}

/// Compute dimensions that fit within `max_dimension` on the longest edge
/// while preserving aspect ratio. Never upscales.
pub fn fit_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let max_dimension = max_dimension.max(1);
    if width <= max_dimension && height <= max_dimension {
        return (width.max(1), height.max(1));
    }

    if width >= height {
        let ratio = max_dimension as f64 / width as f64;
        let scaled_height = (height as f64 * ratio).round() as u32;
        (max_dimension, scaled_height.max(1))
    } else {
        let ratio = max_dimension as f64 / height as f64;
        let scaled_width = (width as f64 * ratio).round() as u32;
        (scaled_width.max(1), max_dimension)
    }
}

#[cfg(test)]
mod tests {
    use image::RgbImage;

    use super::*;

    #[test]
    fn fit_landscape() {
        assert_eq!(fit_dimensions(1920, 1080, 640), (640, 360));
    }

    #[test]
    fn fit_portrait() {
        assert_eq!(fit_dimensions(1080, 1920, 640), (360, 640));
    }

    #[test]
    fn small_images_are_not_upscaled() {
        assert_eq!(fit_dimensions(100, 50, 320), (100, 50));
    }

    #[test]
    fn encoded_thumbnail_is_jpeg() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 32, image::Rgb([10, 200, 30])));
        let thumb = encode_thumbnail(&image, 16, 80).expect("encode");
        assert_eq!((thumb.width, thumb.height), (16, 8));
        assert_eq!(thumb.mime_type, "image/jpeg");
        assert_eq!(&thumb.data[..2], &[0xFF, 0xD8]);
    }
}

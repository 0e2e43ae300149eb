//! QR decoding
//!
//! [`QrDecoder`] is the single capability both acquisition paths share:
//! given image data, produce zero or one decoded text payload. A missing code
//! is `None`, never an error.

use std::io::Cursor;

use ecotrace_core::{LogLevel, UserFacing};
use image::{DynamicImage, GrayImage, ImageReader, RgbaImage};

/// An uploaded image could not be turned into pixels.
#[derive(Debug, thiserror::Error)]
pub enum ImageLoadError {
    #[error("Unrecognised image format")]
    Unsupported,

    #[error("Failed to decode image: {0}")]
    Corrupt(String),

    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),
}

impl UserFacing for ImageLoadError {
    fn user_message(&self) -> String {
        match self {
            ImageLoadError::Unsupported | ImageLoadError::Corrupt(_) => {
                "Invalid image file".to_string()
            }
            ImageLoadError::Io(_) => "Failed to process image".to_string(),
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            ImageLoadError::Io(_) => LogLevel::Warn,
            _ => LogLevel::Debug,
        }
    }
}

/// Decode a QR payload out of image data.
pub trait QrDecoder: Send + Sync {
    /// First payload found in a greyscale frame.
    fn decode(&self, frame: &GrayImage) -> Option<String>;

    fn decode_image(&self, image: &DynamicImage) -> Option<String> {
        self.decode(&image.to_luma8())
    }

    /// Decode a raw RGBA pixel buffer of `width` x `height`. A buffer shorter
    /// than the dimensions claim holds no code.
    fn decode_rgba(&self, pixels: &[u8], width: u32, height: u32) -> Option<String> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(4)?;
        if width == 0 || height == 0 || pixels.len() < expected {
            return None;
        }
        let rgba = RgbaImage::from_raw(width, height, pixels[..expected].to_vec())?;
        self.decode_image(&DynamicImage::ImageRgba8(rgba))
    }

    /// Decode an encoded image file (PNG, JPEG, WebP, GIF).
    fn decode_image_bytes(&self, data: &[u8]) -> Result<Option<String>, ImageLoadError> {
        let image = load_image(data)?;
        Ok(self.decode_image(&image))
    }
}

/// Load an encoded image, guessing its format from the content.
pub fn load_image(data: &[u8]) -> Result<DynamicImage, ImageLoadError> {
    let reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;
    if reader.format().is_none() {
        return Err(ImageLoadError::Unsupported);
    }
    reader
        .decode()
        .map_err(|e| ImageLoadError::Corrupt(e.to_string()))
}

/// [`QrDecoder`] backed by `rqrr`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RqrrDecoder;

impl QrDecoder for RqrrDecoder {
    fn decode(&self, frame: &GrayImage) -> Option<String> {
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            frame.width() as usize,
            frame.height() as usize,
            |x, y| frame.get_pixel(x as u32, y as u32).0[0],
        );
        for grid in prepared.detect_grids() {
            match grid.decode() {
                Ok((_, content)) => return Some(content),
                Err(e) => tracing::trace!(error = %e, "QR grid found but not decodable"),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{encode_png, render_qr};
    use image::{ImageFormat, Luma, Rgba};

    #[test]
    fn decodes_rendered_code() {
        let frame = render_qr("https://app.example/public/batch/17", 6);
        assert_eq!(
            RqrrDecoder.decode(&frame).as_deref(),
            Some("https://app.example/public/batch/17")
        );
    }

    #[test]
    fn blank_frame_has_no_code() {
        let frame = GrayImage::from_pixel(120, 80, Luma([255]));
        assert_eq!(RqrrDecoder.decode(&frame), None);
    }

    #[test]
    fn decode_rgba_buffer() {
        let frame = render_qr("batch/42", 5);
        let rgba = DynamicImage::ImageLuma8(frame).to_rgba8();
        let (w, h) = rgba.dimensions();
        let pixels = rgba.into_raw();
        assert_eq!(
            RqrrDecoder.decode_rgba(&pixels, w, h).as_deref(),
            Some("batch/42")
        );
        assert_eq!(RqrrDecoder.decode_rgba(&pixels[..10], w, h), None);
        assert_eq!(RqrrDecoder.decode_rgba(&[], 0, 0), None);
    }

    #[test]
    fn decode_png_bytes() {
        let png = encode_png(&DynamicImage::ImageLuma8(render_qr("batch/9", 4)));
        assert_eq!(
            RqrrDecoder.decode_image_bytes(&png).unwrap().as_deref(),
            Some("batch/9")
        );
    }

    #[test]
    fn image_without_code_is_none() {
        let img = RgbaImage::from_pixel(64, 64, Rgba([10, 200, 30, 255]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        assert_eq!(RqrrDecoder.decode_image_bytes(&bytes).unwrap(), None);
    }

    #[test]
    fn unreadable_bytes_are_load_errors() {
        let err = RqrrDecoder.decode_image_bytes(b"not an image").unwrap_err();
        assert!(matches!(err, ImageLoadError::Unsupported));
        assert_eq!(err.user_message(), "Invalid image file");

        let mut truncated = encode_png(&DynamicImage::ImageLuma8(render_qr("batch/1", 4)));
        truncated.truncate(40);
        let err = RqrrDecoder.decode_image_bytes(&truncated).unwrap_err();
        assert!(matches!(err, ImageLoadError::Corrupt(_)));
    }

    #[test]
    fn io_failure_message() {
        let err = ImageLoadError::from(std::io::Error::other("disk gone"));
        assert_eq!(err.user_message(), "Failed to process image");
    }
}

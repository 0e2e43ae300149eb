//! QR rendering for tests.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use qrcode::{Color, QrCode};

const QUIET_ZONE: u32 = 4;

/// Render `payload` as a black-on-white QR code, `scale` pixels per module,
/// with the standard quiet zone.
pub fn render_qr(payload: &str, scale: u32) -> GrayImage {
    let code = QrCode::new(payload.as_bytes()).expect("payload fits in a QR code");
    let modules = code.width() as u32;
    let colors = code.to_colors();
    let scale = scale.max(1);
    let size = (modules + 2 * QUIET_ZONE) * scale;

    GrayImage::from_fn(size, size, |x, y| {
        let mx = (x / scale).checked_sub(QUIET_ZONE);
        let my = (y / scale).checked_sub(QUIET_ZONE);
        match (mx, my) {
            (Some(mx), Some(my)) if mx < modules && my < modules => {
                if colors[(my * modules + mx) as usize] == Color::Dark {
                    Luma([0])
                } else {
                    Luma([255])
                }
            }
            _ => Luma([255]),
        }
    })
}

pub fn encode_png(image: &DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("PNG encoding to memory");
    bytes
}

/// PNG file bytes holding a QR code for `payload`.
pub fn qr_png(payload: &str) -> Vec<u8> {
    encode_png(&DynamicImage::ImageLuma8(render_qr(payload, 6)))
}

/// PNG file bytes of a plain white image.
pub fn blank_png(width: u32, height: u32) -> Vec<u8> {
    encode_png(&DynamicImage::ImageLuma8(GrayImage::from_pixel(
        width,
        height,
        Luma([255]),
    )))
}

//! Image encoding: `DynamicImage` → PNG bytes.
//!
//! Both engines consume the conditioned bitmap as PNG: Tesseract via
//! Leptonica's in-memory reader, the remote service as a base64 payload.
//! PNG is chosen over JPEG because it is lossless — compression artefacts
//! on character edges are exactly what the conditioner just spent five
//! stages removing.

use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a conditioned bitmap as PNG bytes.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("encoded image → {} PNG bytes", buf.len());
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let bytes = encode_png(&img).expect("encode should succeed");
        assert_eq!(&bytes[1..4], b"PNG");
        let decoded = image::load_from_memory(&bytes).expect("valid PNG");
        assert_eq!(decoded.width(), 10);
    }
}

//! Base64 image payloads

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat};

use crate::error::Result;

/// Decode a base64 encoded image (PNG or JPEG)
pub fn decode_base64_image(data: &str) -> Result<DynamicImage> {
    let bytes = STANDARD.decode(data.trim())?;
    let image = image::load_from_memory(&bytes)?;
    Ok(image)
}

/// Encode an image as base64 PNG
pub fn encode_png_base64(image: &DynamicImage) -> Result<String> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(STANDARD.encode(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_png_payload() {
        let mut img = RgbaImage::new(4, 3);
        img.put_pixel(1, 2, Rgba([255, 0, 0, 255]));
        let encoded = encode_png_base64(&DynamicImage::ImageRgba8(img)).unwrap();

        let decoded = decode_base64_image(&encoded).unwrap();
        assert_eq!(decoded.width(), 4);
        assert_eq!(decoded.height(), 3);
        assert_eq!(decoded.to_rgba8().get_pixel(1, 2), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_invalid_base64() {
        let err = decode_base64_image("not*base64!").unwrap_err();
        assert!(matches!(err, Error::InvalidBase64(_)));
    }

    #[test]
    fn test_not_an_image() {
        let err = decode_base64_image(&STANDARD.encode(b"plain text")).unwrap_err();
        assert!(matches!(err, Error::InvalidImage(_)));
    }
}

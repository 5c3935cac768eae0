//! Snapshot encoding: lossy data URLs for sync, lossless PNG for export.

use super::RasterError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, ImageReader, Limits, RgbaImage};
use std::io::Cursor;

const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Encode as a `data:image/jpeg;base64,...` URL. Alpha is dropped.
pub(crate) fn encode_jpeg_data_url(img: &RgbaImage, quality: u8) -> Result<String, RasterError> {
    let rgb = DynamicImage::ImageRgba8(img.clone()).into_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100)).encode_image(&rgb)?;

    let mut url = String::with_capacity(JPEG_DATA_URL_PREFIX.len() + bytes.len() * 4 / 3 + 4);
    url.push_str(JPEG_DATA_URL_PREFIX);
    STANDARD.encode_string(&bytes, &mut url);
    Ok(url)
}

/// Decode a base64 image data URL of any format `image` can sniff.
/// Images larger than `max_width` x `max_height` are rejected before decoding.
pub(crate) fn decode_data_url(url: &str, max_width: u32, max_height: u32) -> Result<RgbaImage, RasterError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| RasterError::InvalidDataUrl("missing data: scheme".to_string()))?;
    let (metadata, payload) = rest
        .split_once(',')
        .ok_or_else(|| RasterError::InvalidDataUrl("missing comma".to_string()))?;
    if !metadata.ends_with(";base64") {
        return Err(RasterError::InvalidDataUrl(format!(
            "unsupported encoding: {metadata}"
        )));
    }

    let bytes = STANDARD.decode(payload.trim())?;
    let mut limits = Limits::default();
    limits.max_image_width = Some(max_width);
    limits.max_image_height = Some(max_height);

    let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    reader.limits(limits);
    Ok(reader.decode()?.to_rgba8())
}

/// Encode as a lossless PNG.
pub(crate) fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, RasterError> {
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, ImageFormat::Png)?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_jpeg_data_url_decodes() {
        let img = RgbaImage::from_pixel(16, 8, Rgba([200, 30, 30, 255]));
        let url = encode_jpeg_data_url(&img, 90).unwrap();
        assert!(url.starts_with(JPEG_DATA_URL_PREFIX));

        let decoded = decode_data_url(&url, 1920, 1080).unwrap();
        assert_eq!(decoded.dimensions(), (16, 8));
        let p = decoded.get_pixel(8, 4);
        assert!(p[0] > 170 && p[1] < 60 && p[2] < 60, "lossy but close: {p:?}");
    }

    #[test]
    fn test_png_is_lossless() {
        let mut img = RgbaImage::from_pixel(5, 5, Rgba([1, 2, 3, 255]));
        img.put_pixel(2, 2, Rgba([250, 0, 7, 255]));
        let bytes = encode_png(&img).unwrap();

        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded, img);
    }

    #[test]
    fn test_rejects_oversized_images() {
        let img = RgbaImage::from_pixel(40, 10, Rgba([0, 0, 0, 255]));
        let url = encode_jpeg_data_url(&img, 50).unwrap();

        assert!(matches!(decode_data_url(&url, 32, 32), Err(RasterError::Image(_))));
        assert!(matches!(decode_data_url(&url, 64, 8), Err(RasterError::Image(_))));
        assert_eq!(decode_data_url(&url, 40, 10).unwrap().dimensions(), (40, 10));
    }

    #[test]
    fn test_rejects_malformed_urls() {
        assert!(matches!(
            decode_data_url("http://example.com/a.png", 64, 64),
            Err(RasterError::InvalidDataUrl(_))
        ));
        assert!(matches!(
            decode_data_url("data:image/png;base64", 64, 64),
            Err(RasterError::InvalidDataUrl(_))
        ));
        assert!(matches!(
            decode_data_url("data:image/png,plain", 64, 64),
            Err(RasterError::InvalidDataUrl(_))
        ));
        assert!(matches!(
            decode_data_url("data:image/png;base64,!!!", 64, 64),
            Err(RasterError::Base64(_))
        ));
        assert!(matches!(
            decode_data_url("data:image/png;base64,AAAA", 64, 64),
            Err(RasterError::Image(_))
        ));
    }
}

//! Cover and portrait images for the catalog
//!
//! The catalog takes images inline as `data:` URIs. Remote images are
//! decoded, flattened onto black (transparent PNG logos would otherwise
//! turn into noise) and re-encoded as JPEG.

use crate::error::ImageError;
use crate::providers::ProviderHttp;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use tracing::debug;

const DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// Provider placeholder art (`default.png`, `default2.png`, generic silhouettes)
pub fn is_placeholder_image(url: &str) -> bool {
    let file = url.rsplit('/').next().unwrap_or(url);
    file.starts_with("default") || file.contains("female.png")
}

/// Composite any alpha channel onto black and drop it
pub fn flatten_on_black(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let scale = |c: u8| ((c as u16 * a as u16 + 127) / 255) as u8;
        out.put_pixel(x, y, Rgb([scale(r), scale(g), scale(b)]));
    }
    out
}

/// Decode any supported format and re-encode as JPEG
pub fn to_jpeg(bytes: &[u8]) -> Result<Vec<u8>, ImageError> {
    let decoded = image::load_from_memory(bytes)?;
    let flat = DynamicImage::ImageRgb8(flatten_on_black(&decoded));
    let mut out = Cursor::new(Vec::new());
    flat.write_to(&mut out, ImageFormat::Jpeg)?;
    Ok(out.into_inner())
}

pub fn data_uri(jpeg: &[u8]) -> String {
    format!("{}{}", DATA_URI_PREFIX, STANDARD.encode(jpeg))
}

#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    http: ProviderHttp,
}

impl ImageNormalizer {
    pub fn new(http: ProviderHttp) -> Self {
        Self { http }
    }

    /// Fetch `url` and return it as a JPEG `data:` URI
    pub async fn fetch_data_uri(&self, url: &str) -> Result<String, ImageError> {
        let bytes = self.http.get_bytes(url).await.map_err(|e| ImageError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let jpeg = to_jpeg(&bytes)?;
        debug!(url = %url, source_bytes = bytes.len(), jpeg_bytes = jpeg.len(), "Normalized image");
        Ok(data_uri(&jpeg))
    }
}

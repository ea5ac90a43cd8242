//! PNG export of composite bitmaps.

use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use tracing::debug;

use crate::bitmap::RgbaBitmap;
use crate::error::{RenderError, RenderResult};

/// Encode an RGBA bitmap as PNG bytes.
pub fn encode_png(bitmap: &RgbaBitmap) -> RenderResult<Vec<u8>> {
    let mut out = Vec::with_capacity(bitmap.byte_len() / 4);
    PngEncoder::new(&mut out)
        .write_image(
            bitmap.pixels(),
            bitmap.width(),
            bitmap.height(),
            ColorType::Rgba8,
        )
        .map_err(|e| RenderError::Encode(e.to_string()))?;
    Ok(out)
}

/// Encode and write to `path`.
pub fn write_png(bitmap: &RgbaBitmap, path: &std::path::Path) -> RenderResult<()> {
    let bytes = encode_png(bitmap)?;
    std::fs::write(path, &bytes)?;
    debug!(path = %path.display(), bytes = bytes.len(), "PNG written");
    Ok(())
}

//! GeoTIFF / Cloud-Optimized GeoTIFF sources.
//!
//! Both sources fetch the whole file and decode it with the `tiff` crate on
//! a blocking thread; wrap them in [`CachingSource`](crate::CachingSource) to
//! reuse decoded granules across builds. Georeferencing comes from the
//! GeoTIFF tags:
//!
//! | Tag   | Name               | Use                                  |
//! |-------|--------------------|--------------------------------------|
//! | 33550 | ModelPixelScale    | pixel size                           |
//! | 33922 | ModelTiepoint      | upper-left origin                    |
//! | 34264 | ModelTransformation| origin + pixel size (alternative)    |
//! | 34735 | GeoKeyDirectory    | geographic vs projected EPSG         |
//! | 42113 | GDAL_NODATA        | nodata sentinel                      |

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use atlas_common::BoundingBox;
use bytes::Bytes;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tracing::{debug, instrument};

use crate::error::{CompositeError, Result};
use crate::source::{DecodedRaster, RasterHandle, RasterSource};
use crate::types::{RasterCrs, RasterInfo};

const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_MODEL_TRANSFORMATION: u16 = 34264;
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
const TAG_GDAL_NODATA: u16 = 42113;

const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_CS_TYPE: u16 = 3072;

/// Decode a single-band GeoTIFF into memory.
pub fn decode_geotiff(bytes: &[u8]) -> Result<DecodedRaster> {
    let mut decoder = Decoder::new(Cursor::new(bytes))?.with_limits(Limits::unlimited());
    let (width, height) = decoder.dimensions()?;

    let native_bounds = read_bounds(&mut decoder, width, height)?;
    let crs = read_crs(&mut decoder);
    let nodata = decoder
        .get_tag_ascii_string(Tag::Unknown(TAG_GDAL_NODATA))
        .ok()
        .and_then(|s| s.trim_matches(|c: char| c == '\0' || c.is_whitespace()).parse::<f64>().ok());

    let data: Vec<f32> = match decoder.read_image()? {
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        _ => {
            return Err(CompositeError::decode_failed(
                "unsupported sample format (8-bit signed or 64-bit integer)",
            ))
        }
    };

    let info = RasterInfo {
        width,
        height,
        native_bounds,
        crs,
        nodata,
    };
    debug!(width, height, ?crs, ?nodata, "Decoded GeoTIFF");
    DecodedRaster::new(info, data)
}

fn read_bounds<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
    width: u32,
    height: u32,
) -> Result<BoundingBox> {
    let (origin_x, origin_y, pixel_w, pixel_h) = if let Ok(m) =
        decoder.get_tag_f64_vec(Tag::Unknown(TAG_MODEL_TRANSFORMATION))
    {
        if m.len() < 8 {
            return Err(CompositeError::invalid_geometry(
                "ModelTransformation needs 16 values",
            ));
        }
        (m[3], m[7], m[0], -m[5])
    } else {
        let scale = decoder
            .get_tag_f64_vec(Tag::Unknown(TAG_MODEL_PIXEL_SCALE))
            .map_err(|_| CompositeError::invalid_geometry("missing ModelPixelScale tag"))?;
        let tie = decoder
            .get_tag_f64_vec(Tag::Unknown(TAG_MODEL_TIEPOINT))
            .map_err(|_| CompositeError::invalid_geometry("missing ModelTiepoint tag"))?;
        if scale.len() < 2 || tie.len() < 6 {
            return Err(CompositeError::invalid_geometry("truncated georeferencing tags"));
        }
        // Tiepoint maps raster (i, j) to model (x, y); shift back to pixel (0, 0)
        let origin_x = tie[3] - tie[0] * scale[0];
        let origin_y = tie[4] + tie[1] * scale[1];
        (origin_x, origin_y, scale[0], scale[1])
    };

    let bounds = BoundingBox::new(
        origin_x,
        origin_y - height as f64 * pixel_h,
        origin_x + width as f64 * pixel_w,
        origin_y,
    );
    if !bounds.is_well_formed() {
        return Err(CompositeError::invalid_geometry(format!(
            "degenerate raster bounds {:?}",
            bounds
        )));
    }
    Ok(bounds)
}

/// Scan the GeoKeyDirectory for the CRS keys.
fn read_crs<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> RasterCrs {
    let Ok(keys) = decoder.get_tag_u16_vec(Tag::Unknown(TAG_GEO_KEY_DIRECTORY)) else {
        return RasterCrs::Unknown;
    };
    if keys.len() < 4 {
        return RasterCrs::Unknown;
    }

    let count = keys[3] as usize;
    let mut geographic = None;
    for entry in keys[4..].chunks_exact(4).take(count) {
        let (key_id, location, value) = (entry[0], entry[1], entry[3]);
        // location 0 means the value is stored inline
        if location != 0 {
            continue;
        }
        match key_id {
            KEY_PROJECTED_CS_TYPE => return RasterCrs::Projected(value as u32),
            KEY_GEOGRAPHIC_TYPE => geographic = Some(value),
            _ => {}
        }
    }

    match geographic {
        Some(4326) => RasterCrs::Geographic,
        _ => RasterCrs::Unknown,
    }
}

async fn decode_blocking(bytes: Bytes) -> Result<Arc<dyn RasterHandle>> {
    let raster = tokio::task::spawn_blocking(move || decode_geotiff(&bytes)).await??;
    Ok(Arc::new(raster))
}

/// Reads GeoTIFFs from the local filesystem. Accepts plain paths and `file://` URLs.
pub struct LocalFileSource {
    root: Option<PathBuf>,
}

impl LocalFileSource {
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Resolve relative paths against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, url: &str) -> PathBuf {
        let path = PathBuf::from(url.strip_prefix("file://").unwrap_or(url));
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path,
        }
    }
}

impl Default for LocalFileSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RasterSource for LocalFileSource {
    #[instrument(skip(self), fields(source = "file"))]
    async fn open(&self, url: &str) -> Result<Arc<dyn RasterHandle>> {
        let path = self.resolve(url);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| CompositeError::open_failed(format!("{}: {}", path.display(), e)))?;
        decode_blocking(Bytes::from(bytes)).await
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// Fetches GeoTIFFs over HTTP, optionally through a CORS proxy.
///
/// With a proxy configured, `https://host/a.tif` is requested as
/// `{proxy}?url=https%3A%2F%2Fhost%2Fa.tif`.
pub struct HttpCogSource {
    client: reqwest::Client,
    proxy_url: Option<String>,
}

impl HttpCogSource {
    pub fn new(proxy_url: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent(concat!("heat-atlas/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, proxy_url })
    }

    /// URL actually requested for a granule.
    pub fn request_url(&self, url: &str) -> Result<reqwest::Url> {
        match &self.proxy_url {
            Some(proxy) => reqwest::Url::parse_with_params(proxy, &[("url", url)])
                .map_err(|e| CompositeError::open_failed(format!("bad proxy url {}: {}", proxy, e))),
            None => reqwest::Url::parse(url)
                .map_err(|e| CompositeError::open_failed(format!("bad url {}: {}", url, e))),
        }
    }
}

#[async_trait]
impl RasterSource for HttpCogSource {
    #[instrument(skip(self), fields(source = "http"))]
    async fn open(&self, url: &str) -> Result<Arc<dyn RasterHandle>> {
        let request_url = self.request_url(url)?;
        let response = self
            .client
            .get(request_url)
            .send()
            .await?
            .error_for_status()?;
        let bytes = response.bytes().await?;
        debug!(bytes = bytes.len(), "Fetched raster");
        decode_blocking(bytes).await
    }

    fn name(&self) -> &str {
        "http"
    }
}

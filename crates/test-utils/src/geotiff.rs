//! Minimal single-band float GeoTIFF writer for decoder tests.

use std::io::Cursor;

use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

/// Georeferencing written alongside the pixels.
#[derive(Debug, Clone)]
pub struct GeoTiffParams {
    /// Upper-left corner x (easting or longitude)
    pub origin_x: f64,
    /// Upper-left corner y (northing or latitude)
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
    /// EPSG code; 4326 writes a geographic key, anything else a projected one
    pub epsg: u16,
    pub nodata: Option<f64>,
}

impl GeoTiffParams {
    /// UTM tile with square pixels, origin at the tile's upper-left corner.
    pub fn utm(extent: (f64, f64, f64, f64), width: u32, epsg: u16) -> Self {
        let pixel = (extent.2 - extent.0) / width as f64;
        Self {
            origin_x: extent.0,
            origin_y: extent.3,
            pixel_width: pixel,
            pixel_height: pixel,
            epsg,
            nodata: None,
        }
    }

    /// Geographic raster covering `bounds` (west, south, east, north).
    pub fn geographic(bounds: (f64, f64, f64, f64), width: u32, height: u32) -> Self {
        Self {
            origin_x: bounds.0,
            origin_y: bounds.3,
            pixel_width: (bounds.2 - bounds.0) / width as f64,
            pixel_height: (bounds.3 - bounds.1) / height as f64,
            epsg: 4326,
            nodata: None,
        }
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }
}

/// Encode a Float32 GeoTIFF into memory.
///
/// Writes ModelPixelScale (33550), ModelTiepoint (33922), GeoKeyDirectory
/// (34735) and, when set, GDAL_NODATA (42113).
pub fn encode_geotiff(
    width: u32,
    height: u32,
    data: &[f32],
    params: &GeoTiffParams,
) -> Result<Vec<u8>, tiff::TiffError> {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut buf)?;
        let mut image = encoder.new_image::<colortype::Gray32Float>(width, height)?;

        let scale = [params.pixel_width, params.pixel_height, 0.0];
        let tiepoint = [0.0, 0.0, 0.0, params.origin_x, params.origin_y, 0.0];
        let geokeys: Vec<u16> = if params.epsg == 4326 {
            // GTModelType=2 (geographic), GeographicType=4326
            vec![1, 1, 0, 2, 1024, 0, 1, 2, 2048, 0, 1, 4326]
        } else {
            // GTModelType=1 (projected), ProjectedCSType=epsg
            vec![1, 1, 0, 2, 1024, 0, 1, 1, 3072, 0, 1, params.epsg]
        };

        image.encoder().write_tag(Tag::Unknown(33550), &scale[..])?;
        image.encoder().write_tag(Tag::Unknown(33922), &tiepoint[..])?;
        image.encoder().write_tag(Tag::Unknown(34735), &geokeys[..])?;
        if let Some(nodata) = params.nodata {
            let text = format!("{}", nodata);
            image.encoder().write_tag(Tag::Unknown(42113), text.as_str())?;
        }

        image.write_data(data)?;
    }
    Ok(buf.into_inner())
}

/// Write a GeoTIFF into a temporary directory, returning the directory guard and path.
pub fn write_temp_geotiff(
    name: &str,
    width: u32,
    height: u32,
    data: &[f32],
    params: &GeoTiffParams,
) -> std::io::Result<(tempfile::TempDir, std::path::PathBuf)> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(name);
    let bytes = encode_geotiff(width, height, data, params)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    std::fs::write(&path, bytes)?;
    Ok((dir, path))
}

//! Configuration loading for the heat atlas CLI.
//!
//! Settings come from a YAML file when one is given, otherwise from the
//! `COMPOSITE_*` environment variables. Command-line flags override both.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use compositor::CompositorConfig;
use dashboard::catrare::DEFAULT_YEARS;
use renderer::style::StyleConfig;
use renderer::ColorScale;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    pub compositor: CompositorConfig,
    /// Directory holding the converted `kostra_d*_t*.tif` grids
    pub kostra_base_url: Option<String>,
    /// PMTiles archive with the flood-risk zones
    pub flood_archive_url: Option<String>,
    /// Prepared CatRaRE GeoJSON
    pub catrare_path: Option<PathBuf>,
    pub catrare_years: u32,
    /// JSON style file with fixed color scales
    pub style_file: Option<PathBuf>,
    /// Style to use from `style_file`; defaults to the quantity name
    pub style: Option<String>,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            compositor: CompositorConfig::default(),
            kostra_base_url: None,
            flood_archive_url: None,
            catrare_path: None,
            catrare_years: DEFAULT_YEARS,
            style_file: None,
            style: None,
        }
    }
}

impl AtlasConfig {
    /// Load from the environment.
    pub fn from_env() -> Self {
        let mut config = Self {
            compositor: CompositorConfig::from_env(),
            ..Default::default()
        };

        if let Ok(val) = std::env::var("KOSTRA_BASE_URL") {
            config.kostra_base_url = Some(val);
        }

        if let Ok(val) = std::env::var("FLOOD_ARCHIVE_URL") {
            config.flood_archive_url = Some(val);
        }

        if let Ok(val) = std::env::var("CATRARE_PATH") {
            config.catrare_path = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("COMPOSITE_STYLE_FILE") {
            config.style_file = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("COMPOSITE_STYLE") {
            config.style = Some(val);
        }

        if let Ok(val) = std::env::var("CATRARE_YEARS") {
            if let Ok(v) = val.parse() {
                config.catrare_years = v;
            }
        }

        config
    }

    /// Parse a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse configuration YAML")
    }

    /// Load from `path` if given, the environment otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let yaml = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {:?}", path))?;
                let config = Self::from_yaml(&yaml)
                    .with_context(|| format!("Invalid config file: {:?}", path))?;
                info!(path = %path.display(), "Loaded configuration file");
                config
            }
            None => Self::from_env(),
        };

        config
            .compositor
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid compositor configuration: {}", e))?;
        Ok(config)
    }

    /// Fixed color scale from the configured style file, if any.
    pub fn fixed_scale(&self) -> Result<Option<ColorScale>> {
        let Some(path) = &self.style_file else {
            return Ok(None);
        };
        let styles = StyleConfig::from_file(path)
            .with_context(|| format!("Failed to load style file: {:?}", path))?;
        let name = self
            .style
            .as_deref()
            .unwrap_or(self.compositor.quantity.as_str());
        let scale = styles
            .scale(name)
            .with_context(|| format!("Style {} not usable", name))?;
        Ok(Some(scale))
    }
}

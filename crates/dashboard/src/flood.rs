//! Flood-risk zones served as vector tiles.

use overlay::{LayerState, VectorTileSource};
use renderer::Color;
use serde::{Deserialize, Serialize};

/// Statutory flood scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FloodScenario {
    /// Frequent floods (HQ10 to HQ20)
    Hq10,
    /// 100-year flood
    Hq100,
    /// Extreme flood
    HqExtrem,
}

impl FloodScenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hq10 => "hq10",
            Self::Hq100 => "hq100",
            Self::HqExtrem => "hqextrem",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "hq10" | "hqhaeufig" | "frequent" => Self::Hq10,
            "hqextrem" | "extreme" => Self::HqExtrem,
            _ => Self::Hq100,
        }
    }

    fn fill_color(&self) -> Color {
        match self {
            Self::Hq10 => Color::new(8, 48, 107, 170),
            Self::Hq100 => Color::new(33, 113, 181, 150),
            Self::HqExtrem => Color::new(107, 174, 214, 130),
        }
    }
}

impl std::fmt::Display for FloodScenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tile source for one scenario from a PMTiles archive.
///
/// The archive carries one source layer per scenario, named after it.
pub fn flood_source(archive_url: &str, scenario: FloodScenario) -> VectorTileSource {
    let url = if archive_url.starts_with("pmtiles://") {
        archive_url.to_string()
    } else {
        format!("pmtiles://{}", archive_url)
    };

    VectorTileSource {
        url,
        source_layer: scenario.as_str().to_string(),
        min_zoom: 6,
        max_zoom: 14,
        fill_color: scenario.fill_color(),
    }
}

pub fn flood_layer(id: impl Into<String>, archive_url: &str, scenario: FloodScenario) -> LayerState {
    LayerState::vector_tiles(id, flood_source(archive_url, scenario)).with_opacity(0.7)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_url_prefixed_once() {
        let source = flood_source("https://tiles.example.org/flood.pmtiles", FloodScenario::Hq100);
        assert_eq!(source.url, "pmtiles://https://tiles.example.org/flood.pmtiles");
        assert_eq!(source.source_layer, "hq100");

        let source = flood_source(&source.url, FloodScenario::HqExtrem);
        assert_eq!(source.url, "pmtiles://https://tiles.example.org/flood.pmtiles");
    }

    #[test]
    fn test_scenario_parse_defaults_to_hq100() {
        assert_eq!(FloodScenario::from_str("HQ10"), FloodScenario::Hq10);
        assert_eq!(FloodScenario::from_str("extreme"), FloodScenario::HqExtrem);
        assert_eq!(FloodScenario::from_str("unknown"), FloodScenario::Hq100);
    }
}

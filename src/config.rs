use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use crate::echogram::{
    ColorScale, EchogramError, MappingMode, ValueRange, DEFAULT_BIN_COUNT, DEFAULT_CHUNK_PINGS,
};
/// Display and aggregation settings for one echogram view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EchogramConfig {
    pub raster_width: usize,
    pub raster_height: usize,
    pub histogram_bins: usize,
    pub colormap: String,
    pub mapping: MappingMode,
    pub value_range: ValueRange,
    /// Overrides the per-channel transducer offset when set (meters).
    pub instrument_offset_m: Option<f32>,
    /// Pings handed to each aggregation worker at a time.
    pub chunk_pings: usize,
}
impl Default for EchogramConfig {
    fn default() -> Self {
        // Matches the 1200x800 figure size of the echogram dashboards.
        Self {
            raster_width: 1200,
            raster_height: 800,
            histogram_bins: DEFAULT_BIN_COUNT,
            colormap: "ek500".into(),
            mapping: MappingMode::Discrete,
            value_range: ValueRange::default(),
            instrument_offset_m: None,
            chunk_pings: DEFAULT_CHUNK_PINGS,
        }
    }
}
impl EchogramConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open config {}", path.display()))?;
        let config: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }
    pub fn validate(&self) -> Result<()> {
        if self.raster_width == 0 || self.raster_height == 0 {
            bail!(
                "raster size must be non-zero, got {}x{}",
                self.raster_width,
                self.raster_height
            );
        }
        if self.histogram_bins == 0 {
            bail!("histogram_bins must be greater than zero");
        }
        if self.chunk_pings == 0 {
            bail!("chunk_pings must be greater than zero");
        }
        if let ValueRange::Fixed { vmin, vmax } = self.value_range {
            if !(vmin <= vmax) {
                bail!("value_range vmin ({vmin}) must not exceed vmax ({vmax})");
            }
        }
        self.color_scale()
            .with_context(|| format!("colormap {:?}", self.colormap))?;
        Ok(())
    }
    pub fn color_scale(&self) -> Result<ColorScale, EchogramError> {
        ColorScale::named(&self.colormap, self.mapping, self.value_range)
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn partial_json_fills_defaults() {
        let config: EchogramConfig = serde_json::from_str(
            r#"{"raster_width": 600, "mapping": "continuous", "colormap": "viridis",
                "value_range": {"kind": "auto"}}"#,
        )
        .unwrap();
        assert_eq!(config.raster_width, 600);
        assert_eq!(config.raster_height, 800);
        assert_eq!(config.histogram_bins, 50);
        assert_eq!(config.mapping, MappingMode::Continuous);
        assert_eq!(config.value_range, ValueRange::Auto);
        assert!(config.validate().is_ok());
    }
    #[test]
    fn fixed_range_round_trips_through_json() {
        let config: EchogramConfig = serde_json::from_str(
            r#"{"value_range": {"kind": "fixed", "vmin": -80.0, "vmax": -30.0},
                "instrument_offset_m": 7.5}"#,
        )
        .unwrap();
        assert_eq!(
            config.value_range,
            ValueRange::Fixed {
                vmin: -80.0,
                vmax: -30.0
            }
        );
        assert_eq!(config.instrument_offset_m, Some(7.5));
    }
    #[test]
    fn invalid_settings_are_rejected() {
        let mut config = EchogramConfig::default();
        assert!(config.validate().is_ok());
        config.histogram_bins = 0;
        assert!(config.validate().is_err());
        let config = EchogramConfig {
            colormap: "jet".into(),
            ..EchogramConfig::default()
        };
        assert!(config.validate().is_err());
        let config = EchogramConfig {
            value_range: ValueRange::Fixed {
                vmin: -20.0,
                vmax: -60.0,
            },
            ..EchogramConfig::default()
        };
        assert!(config.validate().is_err());
    }
    #[test]
    fn missing_config_file_has_context() {
        let err = EchogramConfig::load(Path::new("/nonexistent/echogram.json")).unwrap_err();
        assert!(err.to_string().contains("failed to open config"));
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;
use image::{Rgba, RgbaImage};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use crate::echogram::binning::Raster;
use crate::echogram::EchogramError;
pub type Rgb = [u8; 3];
/// Pixel written for cells without data.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);
/// Ordered anchor colors plus clamp colors for out-of-range values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColorTable {
    pub name: String,
    pub anchors: Vec<Rgb>,
    pub under: Rgb,
    pub over: Rgb,
}
impl ColorTable {
    pub fn new(
        name: impl Into<String>,
        anchors: Vec<Rgb>,
        under: Rgb,
        over: Rgb,
    ) -> Result<Self, EchogramError> {
        let name = name.into();
        if anchors.is_empty() {
            return Err(EchogramError::InvalidColorTable(format!(
                "{name} has no anchor colors"
            )));
        }
        Ok(Self {
            name,
            anchors,
            under,
            over,
        })
    }
    pub fn len(&self) -> usize {
        self.anchors.len()
    }
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingMode {
    /// N equal buckets, one anchor color each.
    #[default]
    Discrete,
    /// Linear interpolation between evenly spaced anchors.
    Continuous,
}
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ValueRange {
    /// Observed min/max of the raster.
    Auto,
    /// Fixed display window in dB.
    Fixed { vmin: f32, vmax: f32 },
}
impl Default for ValueRange {
    fn default() -> Self {
        // Standard Sv display window used by the echogram dashboards.
        ValueRange::Fixed {
            vmin: -75.0,
            vmax: -35.0,
        }
    }
}
fn rgb(hex: u32) -> Rgb {
    [(hex >> 16) as u8, (hex >> 8) as u8, hex as u8]
}
fn builtin_tables() -> Vec<ColorTable> {
    vec![
        ColorTable {
            name: "ek500".into(),
            anchors: vec![
                [159, 159, 159], // light grey
                [95, 95, 95],    // grey
                [0, 0, 255],     // dark blue
                [0, 0, 127],     // blue
                [0, 191, 0],     // green
                [0, 127, 0],     // dark green
                [255, 255, 0],   // yellow
                [255, 127, 0],   // orange
                [255, 0, 191],   // pink
                [255, 0, 0],     // red
                [166, 83, 60],   // light brown
            ],
            under: [255, 255, 255],
            over: [120, 60, 40],
        },
        ColorTable {
            name: "viridis".into(),
            anchors: [
                0x440154, 0x472d7b, 0x3b528b, 0x2c728e, 0x21918c, 0x28ae80, 0x5ec962, 0xaddc30,
                0xfde725,
            ]
            .into_iter()
            .map(rgb)
            .collect(),
            under: rgb(0x440154),
            over: rgb(0xfde725),
        },
        ColorTable {
            name: "greys".into(),
            anchors: vec![[255, 255, 255], [0, 0, 0]],
            under: [255, 255, 255],
            over: [0, 0, 0],
        },
    ]
}
static REGISTRY: Lazy<BTreeMap<String, Arc<ColorTable>>> = Lazy::new(|| {
    builtin_tables()
        .into_iter()
        .map(|t| (t.name.clone(), Arc::new(t)))
        .collect()
});
pub fn lookup(name: &str) -> Result<Arc<ColorTable>, EchogramError> {
    REGISTRY
        .get(name)
        .cloned()
        .ok_or_else(|| EchogramError::UnknownColormap(name.to_string()))
}
pub fn registered() -> Vec<String> {
    REGISTRY.keys().cloned().collect()
}
/// Table, mapping mode and value window applied when colorizing a raster.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorScale {
    pub table: Arc<ColorTable>,
    pub mode: MappingMode,
    pub range: ValueRange,
}
impl ColorScale {
    pub fn new(table: Arc<ColorTable>, mode: MappingMode, range: ValueRange) -> Self {
        Self { table, mode, range }
    }
    pub fn named(name: &str, mode: MappingMode, range: ValueRange) -> Result<Self, EchogramError> {
        Ok(Self::new(lookup(name)?, mode, range))
    }
    /// Resolved (vmin, vmax) for `raster`.
    pub fn limits(&self, raster: &Raster) -> (f32, f32) {
        match self.range {
            ValueRange::Fixed { vmin, vmax } => (vmin, vmax),
            ValueRange::Auto => raster.value_extent().unwrap_or((0.0, 0.0)),
        }
    }
    pub fn color_for(&self, value: f32, vmin: f32, vmax: f32) -> Rgba<u8> {
        if value.is_nan() {
            return TRANSPARENT;
        }
        if value < vmin {
            return opaque(self.table.under);
        }
        if value > vmax {
            return opaque(self.table.over);
        }
        let anchors = &self.table.anchors;
        let n = anchors.len();
        let span = vmax - vmin;
        if n == 0 {
            return TRANSPARENT;
        }
        if span <= 0.0 || n == 1 {
            return opaque(anchors[0]);
        }
        let t = ((value - vmin) / span) as f64;
        match self.mode {
            MappingMode::Discrete => {
                let bucket = ((t * n as f64).floor() as usize).min(n - 1);
                opaque(anchors[bucket])
            }
            MappingMode::Continuous => {
                let pos = t * (n - 1) as f64;
                let i = (pos.floor() as usize).min(n - 2);
                let frac = pos - i as f64;
                let (a, b) = (anchors[i], anchors[i + 1]);
                let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * frac).round() as u8;
                Rgba([mix(a[0], b[0]), mix(a[1], b[1]), mix(a[2], b[2]), 255])
            }
        }
    }
}
fn opaque(c: Rgb) -> Rgba<u8> {
    Rgba([c[0], c[1], c[2], 255])
}
/// Maps every raster cell to a pixel; row 0 of the image is the shallowest row.
pub fn colorize(raster: &Raster, scale: &ColorScale) -> RgbaImage {
    let (vmin, vmax) = scale.limits(raster);
    RgbaImage::from_fn(raster.width() as u32, raster.height() as u32, |x, y| {
        scale.color_for(raster.value(x as usize, y as usize), vmin, vmax)
    })
}

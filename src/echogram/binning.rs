use std::ops::{Range, RangeInclusive};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use log::debug;
use ndarray::Array2;
use rayon::prelude::*;
use crate::echogram::depth::{finite_extent, DepthAxis};
use crate::echogram::source::{SampleGrid, SampleIndex};
use crate::echogram::EchogramError;
pub const DEFAULT_CHUNK_PINGS: usize = 256;
/// Affine map from a data axis onto `bins` equal-width bins.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisMap {
    pub min: f64,
    pub max: f64,
    pub bins: usize,
}
impl AxisMap {
    pub fn new(min: f64, max: f64, bins: usize) -> Self {
        Self { min, max, bins }
    }
    pub fn from_values(values: impl Iterator<Item = f64>, bins: usize) -> Option<Self> {
        let (min, max) = values
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })?;
        Some(Self::new(min, max, bins))
    }
    pub fn span(&self) -> f64 {
        self.max - self.min
    }
    /// Bin holding `value`; the axis maximum belongs to the last bin.
    pub fn bin(&self, value: f64) -> Option<usize> {
        if !value.is_finite() || value < self.min || value > self.max || self.bins == 0 {
            return None;
        }
        if self.span() <= 0.0 {
            return Some(0);
        }
        let pos = ((value - self.min) / self.span() * self.bins as f64).floor() as usize;
        Some(pos.min(self.bins - 1))
    }
    pub fn bin_bounds(&self, bin: usize) -> (f64, f64) {
        let step = self.span() / self.bins as f64;
        (
            self.min + step * bin as f64,
            self.min + step * (bin + 1) as f64,
        )
    }
    /// Bins covering the closed interval between `a` and `b`, clipped to the axis.
    pub fn covering(&self, a: f64, b: f64) -> Option<RangeInclusive<usize>> {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        if hi < self.min || lo > self.max || lo.is_nan() || hi.is_nan() {
            return None;
        }
        let first = self.bin(lo.max(self.min))?;
        let last = self.bin(hi.min(self.max))?;
        Some(first..=last)
    }
}
/// Pixel dimensions plus the two axis maps shared by one aggregation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RasterGeometry {
    pub width: usize,
    pub height: usize,
    pub time: AxisMap,
    /// Row 0 is the shallowest depth.
    pub depth: AxisMap,
}
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellBounds {
    pub time: (f64, f64),
    pub depth: (f64, f64),
}
impl RasterGeometry {
    pub fn for_grid(
        grid: &SampleGrid,
        depth: &DepthAxis,
        width: usize,
        height: usize,
    ) -> Result<Self, EchogramError> {
        // cell indices are stored as u32
        let cells = (width as u64).checked_mul(height as u64);
        if width == 0 || height == 0 || cells.map_or(true, |n| n > u32::MAX as u64) {
            return Err(EchogramError::InvalidGeometry { width, height });
        }
        let time = AxisMap::from_values(grid.time.iter().copied(), width)
            .ok_or(EchogramError::EmptyDataset)?;
        let (lo, hi) = depth.extent().ok_or(EchogramError::EmptyDataset)?;
        Ok(Self {
            width,
            height,
            time,
            depth: AxisMap::new(lo as f64, hi as f64, height),
        })
    }
    pub fn num_cells(&self) -> usize {
        self.width * self.height
    }
    pub fn cell_of(&self, time: f64, depth: f64) -> Option<(usize, usize)> {
        Some((self.time.bin(time)?, self.depth.bin(depth)?))
    }
    pub fn cell_index(&self, col: usize, row: usize) -> usize {
        row * self.width + col
    }
    pub fn cell_bounds(&self, col: usize, row: usize) -> CellBounds {
        CellBounds {
            time: self.time.bin_bounds(col),
            depth: self.depth.bin_bounds(row),
        }
    }
}
/// Lets a newer request abandon an aggregation that is still running.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    wanted: u64,
    latest: Option<Arc<AtomicU64>>,
}
impl CancelToken {
    pub fn never() -> Self {
        Self::default()
    }
    pub fn new(wanted: u64, latest: Arc<AtomicU64>) -> Self {
        Self {
            wanted,
            latest: Some(latest),
        }
    }
    pub fn generation(&self) -> u64 {
        self.wanted
    }
    pub fn is_cancelled(&self) -> bool {
        self.latest
            .as_ref()
            .is_some_and(|latest| latest.load(Ordering::Acquire) != self.wanted)
    }
}
/// Per-cell sums, counts and contributing samples for a subset of pings.
#[derive(Clone, Debug)]
pub struct PartialRaster {
    sums: Vec<f64>,
    counts: Vec<u32>,
    hits: Vec<(u32, SampleIndex)>, // (cell, sample)
}
impl PartialRaster {
    pub fn empty(geometry: &RasterGeometry) -> Self {
        Self {
            sums: vec![0.0; geometry.num_cells()],
            counts: vec![0; geometry.num_cells()],
            hits: Vec::new(),
        }
    }
    pub fn samples(&self) -> usize {
        self.hits.len()
    }
    pub fn add_pings(
        &mut self,
        grid: &SampleGrid,
        depth: &DepthAxis,
        geometry: &RasterGeometry,
        pings: Range<usize>,
    ) {
        for ping in pings {
            let Some(col) = geometry.time.bin(grid.time[ping]) else {
                continue;
            };
            let depths = depth.ping(ping);
            for (range, (&value, &d)) in grid.values.row(ping).iter().zip(depths.iter()).enumerate()
            {
                if !value.is_finite() {
                    continue;
                }
                let Some(row) = geometry.depth.bin(d as f64) else {
                    continue;
                };
                let cell = geometry.cell_index(col, row);
                self.sums[cell] += value as f64;
                self.counts[cell] += 1;
                self.hits.push((cell as u32, SampleIndex::new(ping, range)));
            }
        }
    }
    /// Combines sums and counts; means are only formed in [`PartialRaster::finish`].
    pub fn merge(mut self, other: PartialRaster) -> Self {
        for (a, b) in self.sums.iter_mut().zip(&other.sums) {
            *a += b;
        }
        for (a, b) in self.counts.iter_mut().zip(&other.counts) {
            *a += b;
        }
        self.hits.extend(other.hits);
        self
    }
    pub fn finish(self, geometry: RasterGeometry) -> Raster {
        let cells = geometry.num_cells();
        let mut offsets = vec![0usize; cells + 1];
        for (cell, &count) in self.counts.iter().enumerate() {
            offsets[cell + 1] = offsets[cell] + count as usize;
        }
        let mut cursor = offsets[..cells].to_vec();
        let mut samples = vec![SampleIndex::new(0, 0); self.hits.len()];
        for (cell, index) in self.hits {
            let slot = &mut cursor[cell as usize];
            samples[*slot] = index;
            *slot += 1;
        }
        let width = geometry.width;
        let values = Array2::from_shape_fn((geometry.height, width), |(row, col)| {
            let cell = row * width + col;
            match self.counts[cell] {
                0 => f32::NAN,
                n => (self.sums[cell] / n as f64) as f32,
            }
        });
        Raster {
            geometry,
            values,
            offsets,
            samples,
        }
    }
}
/// Accumulates one contiguous run of pings into a fresh partial raster.
pub fn accumulate(
    grid: &SampleGrid,
    depth: &DepthAxis,
    geometry: &RasterGeometry,
    pings: Range<usize>,
) -> PartialRaster {
    let mut partial = PartialRaster::empty(geometry);
    partial.add_pings(grid, depth, geometry, pings);
    partial
}
/// Hover readout for a single cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellProbe {
    pub col: usize,
    pub row: usize,
    pub bounds: CellBounds,
    pub value: f32,
    pub samples: usize,
}
/// Fixed-resolution mean raster with the samples behind every cell.
#[derive(Clone, Debug)]
pub struct Raster {
    geometry: RasterGeometry,
    values: Array2<f32>, // rows x cols
    offsets: Vec<usize>,
    samples: Vec<SampleIndex>,
}
impl Raster {
    pub fn geometry(&self) -> &RasterGeometry {
        &self.geometry
    }
    pub fn width(&self) -> usize {
        self.geometry.width
    }
    pub fn height(&self) -> usize {
        self.geometry.height
    }
    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }
    pub fn value(&self, col: usize, row: usize) -> f32 {
        self.values[[row, col]]
    }
    pub fn contributions(&self, col: usize, row: usize) -> &[SampleIndex] {
        let cell = self.geometry.cell_index(col, row);
        &self.samples[self.offsets[cell]..self.offsets[cell + 1]]
    }
    pub fn total_samples(&self) -> usize {
        self.samples.len()
    }
    /// Finite (min, max) of the cell means.
    pub fn value_extent(&self) -> Option<(f32, f32)> {
        finite_extent(self.values.iter().copied())
    }
    pub fn probe(&self, time: f64, depth: f64) -> Option<CellProbe> {
        let (col, row) = self.geometry.cell_of(time, depth)?;
        Some(CellProbe {
            col,
            row,
            bounds: self.geometry.cell_bounds(col, row),
            value: self.value(col, row),
            samples: self.contributions(col, row).len(),
        })
    }
}
pub fn aggregate(
    grid: &SampleGrid,
    depth: &DepthAxis,
    pixel_width: usize,
    pixel_height: usize,
) -> Result<Raster, EchogramError> {
    aggregate_with(
        grid,
        depth,
        pixel_width,
        pixel_height,
        DEFAULT_CHUNK_PINGS,
        &CancelToken::never(),
    )
}
/// Bins `grid` onto a `pixel_width` x `pixel_height` raster, splitting the ping axis
/// into chunks of `chunk_pings` handled by the rayon pool.
pub fn aggregate_with(
    grid: &SampleGrid,
    depth: &DepthAxis,
    pixel_width: usize,
    pixel_height: usize,
    chunk_pings: usize,
    cancel: &CancelToken,
) -> Result<Raster, EchogramError> {
    let geometry = RasterGeometry::for_grid(grid, depth, pixel_width, pixel_height)?;
    depth.check_against(grid)?;
    if grid.values.iter().all(|v| !v.is_finite()) {
        return Err(EchogramError::EmptyDataset);
    }
    let started = Instant::now();
    let pings = grid.num_pings();
    let chunk = chunk_pings.max(1);
    let chunks: Vec<Range<usize>> = (0..pings)
        .step_by(chunk)
        .map(|start| start..(start + chunk).min(pings))
        .collect();
    let partial = chunks
        .into_par_iter()
        .try_fold(
            || PartialRaster::empty(&geometry),
            |mut acc, range| {
                if cancel.is_cancelled() {
                    return Err(EchogramError::Superseded);
                }
                acc.add_pings(grid, depth, &geometry, range);
                Ok(acc)
            },
        )
        .try_reduce(|| PartialRaster::empty(&geometry), |a, b| Ok(a.merge(b)))?;
    if partial.samples() == 0 {
        return Err(EchogramError::EmptyDataset);
    }
    let raster = partial.finish(geometry);
    debug!(
        "aggregated {} ({}x{} samples) into {}x{} raster in {:?}",
        grid.channel,
        pings,
        grid.num_range_samples(),
        pixel_width,
        pixel_height,
        started.elapsed()
    );
    Ok(raster)
}

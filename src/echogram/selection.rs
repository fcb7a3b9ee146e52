use serde::{Deserialize, Serialize};
use crate::echogram::binning::Raster;
use crate::echogram::histogram::Histogram;
use crate::echogram::source::{SampleGrid, SampleIndex};
use crate::echogram::EchogramError;
/// What the user brushed on the echogram.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    /// Raster cells as (column, row).
    Cells(Vec<(usize, usize)>),
    /// A single click in data space.
    Point { time: f64, depth: f64 },
    /// Box in data space; corners in any order.
    Rect { time: (f64, f64), depth: (f64, f64) },
}
impl Selection {
    pub fn empty() -> Self {
        Selection::Cells(Vec::new())
    }
    /// Every cell of `raster`.
    pub fn whole(raster: &Raster) -> Self {
        let cells = (0..raster.height())
            .flat_map(|row| (0..raster.width()).map(move |col| (col, row)))
            .collect();
        Selection::Cells(cells)
    }
}
/// Raster cells addressed by `selection`, deduplicated and in bounds.
pub fn covered_cells(raster: &Raster, selection: &Selection) -> Vec<(usize, usize)> {
    let geometry = raster.geometry();
    let mut cells: Vec<(usize, usize)> = match selection {
        Selection::Cells(cells) => cells
            .iter()
            .copied()
            .filter(|&(col, row)| col < geometry.width && row < geometry.height)
            .collect(),
        Selection::Point { time, depth } => geometry.cell_of(*time, *depth).into_iter().collect(),
        Selection::Rect { time, depth } => {
            match (
                geometry.time.covering(time.0, time.1),
                geometry.depth.covering(depth.0, depth.1),
            ) {
                (Some(cols), Some(rows)) => rows
                    .flat_map(|row| cols.clone().map(move |col| (col, row)))
                    .collect(),
                _ => Vec::new(),
            }
        }
    };
    cells.sort_unstable_by_key(|&(col, row)| (row, col));
    cells.dedup();
    cells
}
/// Raw sample indices behind the selected cells.
pub fn resolve(raster: &Raster, selection: &Selection) -> Vec<SampleIndex> {
    covered_cells(raster, selection)
        .into_iter()
        .flat_map(|(col, row)| raster.contributions(col, row).iter().copied())
        .collect()
}
/// Reads the raw (not aggregated) values for `indices`.
pub fn gather_values(grid: &SampleGrid, indices: &[SampleIndex]) -> Vec<f32> {
    indices.iter().map(|&i| grid.value(i)).collect()
}
/// Resolves a selection all the way to its histogram.
pub fn selection_histogram(
    grid: &SampleGrid,
    raster: &Raster,
    selection: &Selection,
    bin_count: usize,
) -> Result<Histogram, EchogramError> {
    let indices = resolve(raster, selection);
    Histogram::from_values(&gather_values(grid, &indices), bin_count)
}

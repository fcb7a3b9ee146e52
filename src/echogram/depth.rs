use log::warn;
use ndarray::{Array2, ArrayView1};
use crate::echogram::source::{DepthProfile, SampleGrid, SampleSource};
use crate::echogram::EchogramError;
/// Corrected depth (meters) for every sample of a grid.
#[derive(Clone, Debug, PartialEq)]
pub enum DepthAxis {
    /// Same depth vector for every ping.
    Shared(Vec<f32>),
    /// One depth row per ping.
    PerPing(Array2<f32>),
}
impl DepthAxis {
    pub fn num_range_samples(&self) -> usize {
        match self {
            DepthAxis::Shared(depths) => depths.len(),
            DepthAxis::PerPing(depths) => depths.ncols(),
        }
    }
    pub fn ping(&self, ping: usize) -> ArrayView1<'_, f32> {
        match self {
            DepthAxis::Shared(depths) => ArrayView1::from(depths.as_slice()),
            DepthAxis::PerPing(depths) => depths.row(ping),
        }
    }
    pub fn depth(&self, ping: usize, range: usize) -> f32 {
        self.ping(ping)[range]
    }
    /// Finite (min, max) over all depth values.
    pub fn extent(&self) -> Option<(f32, f32)> {
        match self {
            DepthAxis::Shared(depths) => finite_extent(depths.iter().copied()),
            DepthAxis::PerPing(depths) => finite_extent(depths.iter().copied()),
        }
    }
    /// Checks that the axis can address every sample of `grid`.
    pub fn check_against(&self, grid: &SampleGrid) -> Result<(), EchogramError> {
        let expected = (grid.num_pings(), grid.num_range_samples());
        let actual = match self {
            DepthAxis::Shared(depths) => (expected.0, depths.len()),
            DepthAxis::PerPing(depths) => depths.dim(),
        };
        if actual != expected {
            return Err(EchogramError::ShapeMismatch {
                what: "depth axis",
                expected,
                actual,
            });
        }
        Ok(())
    }
}
pub(crate) fn finite_extent(values: impl Iterator<Item = f32>) -> Option<(f32, f32)> {
    values
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}
/// Result of depth resolution; `degraded` means raw range indices stand in for depth.
#[derive(Clone, Debug)]
pub struct DepthCorrection {
    pub axis: DepthAxis,
    pub degraded: bool,
}
/// Applies the instrument offset to one ping's range offsets.
pub fn correct(
    range_indices: &[u32],
    offset_profile: &[f32],
    instrument_offset: f32,
) -> Result<Vec<f32>, EchogramError> {
    if offset_profile.len() != range_indices.len() {
        return Err(EchogramError::ProfileLengthMismatch {
            expected: range_indices.len(),
            actual: offset_profile.len(),
        });
    }
    Ok(offset_profile.iter().map(|o| o + instrument_offset).collect())
}
fn check_monotonic(ping: usize, depths: &[f32]) -> Result<(), EchogramError> {
    let mut last = f32::NEG_INFINITY;
    for (sample, &d) in depths.iter().enumerate() {
        if d.is_nan() {
            continue;
        }
        if d < last {
            return Err(EchogramError::InvalidDepthProfile { ping, sample });
        }
        last = d;
    }
    Ok(())
}
fn same_row(a: &[f32], b: &[f32]) -> bool {
    a.iter()
        .zip(b)
        .all(|(x, y)| x == y || (x.is_nan() && y.is_nan()))
}
/// Builds the depth axis for a whole profile.
///
/// `instrument_offset` overrides the profile's own transducer offset when given.
/// Profiles whose pings all share the same offsets collapse to [`DepthAxis::Shared`].
pub fn correct_profile(
    profile: &DepthProfile,
    range_indices: &[u32],
    instrument_offset: Option<f32>,
) -> Result<DepthAxis, EchogramError> {
    let offset = instrument_offset.unwrap_or(profile.transducer_offset);
    let (pings, samples) = profile.offsets.dim();
    let mut corrected = Vec::with_capacity(pings * samples);
    for (ping, row) in profile.offsets.outer_iter().enumerate() {
        let row = row.to_vec();
        let depths = correct(range_indices, &row, offset)?;
        check_monotonic(ping, &depths)?;
        corrected.extend(depths);
    }
    if samples == 0 {
        return Ok(DepthAxis::Shared(Vec::new()));
    }
    let first = corrected.get(..samples).unwrap_or(&[]).to_vec();
    if corrected.chunks(samples).all(|row| same_row(row, &first)) {
        return Ok(DepthAxis::Shared(first));
    }
    let matrix = Array2::from_shape_vec((pings, samples), corrected).map_err(|_| {
        EchogramError::ShapeMismatch {
            what: "depth profile",
            expected: (pings, samples),
            actual: (pings, range_indices.len()),
        }
    })?;
    Ok(DepthAxis::PerPing(matrix))
}
/// Raw range-sample indices used as an approximate depth.
pub fn raw_index_axis(range_indices: &[u32]) -> DepthAxis {
    DepthAxis::Shared(range_indices.iter().map(|&i| i as f32).collect())
}
/// Reads the channel's offset profile and corrects it, falling back to raw indices
/// when the source has no offsets for the channel.
pub fn resolve_depth(
    source: &dyn SampleSource,
    grid: &SampleGrid,
    instrument_offset: Option<f32>,
) -> Result<DepthCorrection, EchogramError> {
    match source.read_offset_profile(&grid.channel) {
        Ok(profile) => {
            let expected = (grid.num_pings(), grid.num_range_samples());
            if profile.offsets.dim() != expected {
                return Err(EchogramError::ShapeMismatch {
                    what: "offset profile",
                    expected,
                    actual: profile.offsets.dim(),
                });
            }
            Ok(DepthCorrection {
                axis: correct_profile(&profile, &grid.range_index, instrument_offset)?,
                degraded: false,
            })
        }
        Err(EchogramError::MissingOffsetData(channel)) => {
            warn!("no range offsets for {channel}; using raw range index as depth");
            Ok(DepthCorrection {
                axis: raw_index_axis(&grid.range_index),
                degraded: true,
            })
        }
        Err(e) => Err(e),
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::echogram::source::ManualSource;
    use ndarray::array;
    fn grid() -> SampleGrid {
        SampleGrid::new("ch", vec![0.0, 1.0], vec![0, 1, 2], Array2::zeros((2, 3))).unwrap()
    }
    #[test]
    fn correct_adds_instrument_offset() {
        let depths = correct(&[0, 1, 2], &[0.0, 0.5, 1.0], 7.0).unwrap();
        assert_eq!(depths, vec![7.0, 7.5, 8.0]);
        assert!(matches!(
            correct(&[0, 1], &[0.0], 0.0),
            Err(EchogramError::ProfileLengthMismatch { expected: 2, actual: 1 })
        ));
    }
    #[test]
    fn uniform_profile_collapses_to_shared_axis() {
        let profile = DepthProfile {
            offsets: array![[0.0, 0.5, f32::NAN], [0.0, 0.5, f32::NAN]],
            transducer_offset: 1.0,
        };
        let axis = correct_profile(&profile, &[0, 1, 2], None).unwrap();
        match axis {
            DepthAxis::Shared(d) => {
                assert_eq!(&d[..2], &[1.0, 1.5]);
                assert!(d[2].is_nan());
            }
            other => panic!("expected shared axis, got {other:?}"),
        }
    }
    #[test]
    fn varying_profile_stays_per_ping_and_override_wins() {
        let profile = DepthProfile {
            offsets: array![[0.0, 0.5, 1.0], [0.0, 0.6, 1.2]],
            transducer_offset: 1.0,
        };
        let axis = correct_profile(&profile, &[0, 1, 2], Some(10.0)).unwrap();
        assert!(matches!(axis, DepthAxis::PerPing(_)));
        assert!((axis.depth(1, 2) - 11.2).abs() < 1e-5);
        let (lo, hi) = axis.extent().unwrap();
        assert_eq!(lo, 10.0);
        assert!((hi - 11.2).abs() < 1e-5);
    }
    #[test]
    fn decreasing_profile_is_rejected() {
        let profile = DepthProfile {
            offsets: array![[0.0, 0.5, 1.0], [0.0, 0.6, 0.2]],
            transducer_offset: 0.0,
        };
        assert!(matches!(
            correct_profile(&profile, &[0, 1, 2], None),
            Err(EchogramError::InvalidDepthProfile { ping: 1, sample: 2 })
        ));
    }
    #[test]
    fn missing_offsets_degrade_to_raw_index() {
        let source = ManualSource::new().with_channel(grid(), None);
        let correction = resolve_depth(&source, &grid(), Some(3.0)).unwrap();
        assert!(correction.degraded);
        assert_eq!(correction.axis, DepthAxis::Shared(vec![0.0, 1.0, 2.0]));
    }
    #[test]
    fn mismatched_profile_shape_is_rejected() {
        let profile = DepthProfile {
            offsets: Array2::zeros((1, 3)),
            transducer_offset: 0.0,
        };
        let source = ManualSource::new().with_channel(grid(), Some(profile));
        assert!(matches!(
            resolve_depth(&source, &grid(), None),
            Err(EchogramError::ShapeMismatch { .. })
        ));
    }
}

use serde::Serialize;
use crate::echogram::EchogramError;
pub const DEFAULT_BIN_COUNT: usize = 50;
/// Equal-width histogram of raw Sv values.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Histogram {
    pub edges: Vec<f64>, // bin_count + 1
    pub counts: Vec<u64>,
}
impl Histogram {
    /// All-zero histogram, the answer to an empty selection.
    pub fn empty(bin_count: usize) -> Self {
        Self {
            edges: vec![0.0; bin_count + 1],
            counts: vec![0; bin_count],
        }
    }
    /// Bins the finite entries of `values`.
    ///
    /// Bins are half-open `[lo, hi)`, so a value on an interior edge is counted in the
    /// bin that edge opens; the maximum value belongs to the closed last bin. A single
    /// distinct value gets a unit-wide range centred on it.
    pub fn from_values(values: &[f32], bin_count: usize) -> Result<Self, EchogramError> {
        if bin_count == 0 {
            return Err(EchogramError::InvalidBinCount);
        }
        let Some((min, max)) = values
            .iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f64, f64)>, &v| {
                let v = v as f64;
                match acc {
                    None => Some((v, v)),
                    Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
                }
            })
        else {
            return Ok(Self::empty(bin_count));
        };
        let (lo, hi) = if max > min {
            (min, max)
        } else {
            (min - 0.5, max + 0.5)
        };
        let n = bin_count as f64;
        let span = hi - lo;
        let edges = (0..=bin_count)
            .map(|k| lo + span * k as f64 / n)
            .collect();
        let mut counts = vec![0u64; bin_count];
        for &v in values.iter().filter(|v| v.is_finite()) {
            let pos = (v as f64 - lo) * n / span;
            let bin = (pos.max(0.0).floor() as usize).min(bin_count - 1);
            counts[bin] += 1;
        }
        Ok(Self { edges, counts })
    }
    pub fn bin_count(&self) -> usize {
        self.counts.len()
    }
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
    /// (lower edge, upper edge, count) per bin.
    pub fn bins(&self) -> impl Iterator<Item = (f64, f64, u64)> + '_ {
        self.edges
            .windows(2)
            .zip(&self.counts)
            .map(|(e, &c)| (e[0], e[1], c))
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn empty_input_gives_zeroed_default_bins() {
        let h = Histogram::from_values(&[], DEFAULT_BIN_COUNT).unwrap();
        assert_eq!(h.bin_count(), 50);
        assert!(h.counts.iter().all(|&c| c == 0));
        assert!(h.is_empty());
        let nan_only = Histogram::from_values(&[f32::NAN, f32::NAN], 8).unwrap();
        assert_eq!(nan_only, Histogram::empty(8));
    }
    #[test]
    fn edge_values_open_their_bin_and_max_closes_the_last() {
        let values: Vec<f32> = (0..=10).map(|v| v as f32).collect();
        let h = Histogram::from_values(&values, 10).unwrap();
        assert_eq!(h.counts, vec![1, 1, 1, 1, 1, 1, 1, 1, 1, 2]);
        let h = Histogram::from_values(&[0.0, 5.0, 10.0], 2).unwrap();
        assert_eq!(h.counts, vec![1, 2]);
        assert_eq!(h.edges.first(), Some(&0.0));
        assert_eq!(h.edges.last(), Some(&10.0));
        assert_eq!(h.total(), 11);
    }
    #[test]
    fn interior_values_use_their_own_bin() {
        let h = Histogram::from_values(&[-80.0, -79.5, -55.0, -40.0], 4).unwrap();
        assert_eq!(h.counts, vec![2, 0, 1, 1]);
        let (lo, hi, count) = h.bins().nth(2).unwrap();
        assert_eq!((lo, hi, count), (-60.0, -50.0, 1));
    }
    #[test]
    fn single_value_is_widened() {
        let h = Histogram::from_values(&[-50.0, -50.0, f32::NAN], 4).unwrap();
        assert_eq!(h.total(), 2);
        assert_eq!(h.edges[0], -50.5);
        assert_eq!(h.edges[4], -49.5);
    }
    #[test]
    fn zero_bins_is_rejected() {
        assert!(matches!(
            Histogram::from_values(&[1.0], 0),
            Err(EchogramError::InvalidBinCount)
        ));
    }
}

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use log::info;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use crate::echogram::EchogramError;
/// Position of one raw sample inside a [`SampleGrid`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SampleIndex {
    pub ping: u32,
    pub range: u32,
}
impl SampleIndex {
    /// Both coordinates must fit in `u32`; [`SampleGrid::new`] guarantees it for grid indices.
    pub fn new(ping: usize, range: usize) -> Self {
        debug_assert!(ping <= u32::MAX as usize && range <= u32::MAX as usize);
        Self {
            ping: ping as u32,
            range: range as u32,
        }
    }
}
/// One channel of Sv samples, pings x range samples.
#[derive(Clone, Debug)]
pub struct SampleGrid {
    pub channel: String,
    /// Ping times in seconds since the Unix epoch.
    pub time: Vec<f64>,
    pub range_index: Vec<u32>,
    pub values: Array2<f32>, // pings x range samples, NaN = no data
}
impl SampleGrid {
    pub fn new(
        channel: impl Into<String>,
        time: Vec<f64>,
        range_index: Vec<u32>,
        values: Array2<f32>,
    ) -> Result<Self, EchogramError> {
        let expected = (time.len(), range_index.len());
        // samples are addressed with u32 coordinates
        let limit = u32::MAX as usize;
        if values.dim() != expected || expected.0 > limit || expected.1 > limit {
            return Err(EchogramError::ShapeMismatch {
                what: "sample grid",
                expected,
                actual: values.dim(),
            });
        }
        Ok(Self {
            channel: channel.into(),
            time,
            range_index,
            values,
        })
    }
    pub fn num_pings(&self) -> usize {
        self.time.len()
    }
    pub fn num_range_samples(&self) -> usize {
        self.range_index.len()
    }
    pub fn value(&self, index: SampleIndex) -> f32 {
        self.values[[index.ping as usize, index.range as usize]]
    }
    pub fn finite_values(&self) -> impl Iterator<Item = f32> + '_ {
        self.values.iter().copied().filter(|v| v.is_finite())
    }
}
/// Raw range offsets (meters) for every ping of a channel.
#[derive(Clone, Debug)]
pub struct DepthProfile {
    pub offsets: Array2<f32>, // pings x range samples
    pub transducer_offset: f32,
}
/// Something that can hand out channel grids and their offset profiles.
pub trait SampleSource: Send {
    fn channels(&self) -> Vec<String>;
    fn read_channel(&self, channel: &str) -> Result<SampleGrid, EchogramError>;
    fn read_offset_profile(&self, channel: &str) -> Result<DepthProfile, EchogramError>;
    fn describe(&self) -> String {
        format!("channels: {:?}", self.channels())
    }
}
/// Opens a [`SampleSource`] for a path; used when the view switches files.
pub trait SourceOpener: Send {
    fn open(&self, path: &Path) -> Result<Box<dyn SampleSource>, EchogramError>;
}
impl<F> SourceOpener for F
where
    F: Fn(&Path) -> Result<Box<dyn SampleSource>, EchogramError> + Send,
{
    fn open(&self, path: &Path) -> Result<Box<dyn SampleSource>, EchogramError> {
        self(path)
    }
}
/// In-memory source useful for tests and deterministic playback.
#[derive(Default)]
pub struct ManualSource {
    channels: Vec<(SampleGrid, Option<DepthProfile>)>,
}
impl ManualSource {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_channel(mut self, grid: SampleGrid, profile: Option<DepthProfile>) -> Self {
        self.channels.push((grid, profile));
        self
    }
    fn find(&self, channel: &str) -> Result<&(SampleGrid, Option<DepthProfile>), EchogramError> {
        self.channels
            .iter()
            .find(|(grid, _)| grid.channel == channel)
            .ok_or_else(|| EchogramError::ChannelNotFound(channel.to_string()))
    }
}
impl SampleSource for ManualSource {
    fn channels(&self) -> Vec<String> {
        self.channels.iter().map(|(g, _)| g.channel.clone()).collect()
    }
    fn read_channel(&self, channel: &str) -> Result<SampleGrid, EchogramError> {
        Ok(self.find(channel)?.0.clone())
    }
    fn read_offset_profile(&self, channel: &str) -> Result<DepthProfile, EchogramError> {
        self.find(channel)?
            .1
            .clone()
            .ok_or_else(|| EchogramError::MissingOffsetData(channel.to_string()))
    }
}
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    channels: Vec<ChannelRecord>,
}
#[derive(Debug, Serialize, Deserialize)]
struct ChannelRecord {
    id: String,
    ping_time: Vec<f64>,
    range_sample: Vec<u32>,
    sv: Vec<Vec<Option<f32>>>, // null = no data
    #[serde(default)]
    echo_range: Option<Vec<Vec<Option<f32>>>>,
    #[serde(default)]
    transducer_offset: f32,
}
impl ChannelRecord {
    fn shape(&self) -> (usize, usize) {
        (self.ping_time.len(), self.range_sample.len())
    }
}
fn rows_to_array(
    rows: &[Vec<Option<f32>>],
    what: &'static str,
    expected: (usize, usize),
) -> Result<Array2<f32>, EchogramError> {
    let actual = (rows.len(), rows.first().map_or(expected.1, |r| r.len()));
    if actual != expected || rows.iter().any(|r| r.len() != expected.1) {
        return Err(EchogramError::ShapeMismatch {
            what,
            expected,
            actual,
        });
    }
    let flat: Vec<f32> = rows
        .iter()
        .flat_map(|r| r.iter().map(|v| v.unwrap_or(f32::NAN)))
        .collect();
    Array2::from_shape_vec(expected, flat).map_err(|_| EchogramError::ShapeMismatch {
        what,
        expected,
        actual,
    })
}
/// JSON-backed store: one record per channel, `null` for missing samples.
#[derive(Debug)]
pub struct JsonSource {
    records: Vec<ChannelRecord>,
}
impl JsonSource {
    pub fn open(path: &Path) -> Result<Self, EchogramError> {
        let file = File::open(path)
            .map_err(|e| EchogramError::SourceUnavailable(format!("{}: {e}", path.display())))?;
        let source = Self::parse(BufReader::new(file))
            .map_err(|e| EchogramError::SourceUnavailable(format!("{}: {e}", path.display())))?;
        info!("opened {}: {}", path.display(), source.describe());
        Ok(source)
    }
    pub fn from_reader(reader: impl Read) -> Result<Self, EchogramError> {
        Self::parse(reader).map_err(|e| EchogramError::SourceUnavailable(e.to_string()))
    }
    fn parse(reader: impl Read) -> Result<Self, serde_json::Error> {
        let store: StoreFile = serde_json::from_reader(reader)?;
        Ok(Self {
            records: store.channels,
        })
    }
    fn find(&self, channel: &str) -> Result<&ChannelRecord, EchogramError> {
        self.records
            .iter()
            .find(|r| r.id == channel)
            .ok_or_else(|| EchogramError::ChannelNotFound(channel.to_string()))
    }
}
impl SampleSource for JsonSource {
    fn channels(&self) -> Vec<String> {
        self.records.iter().map(|r| r.id.clone()).collect()
    }
    fn read_channel(&self, channel: &str) -> Result<SampleGrid, EchogramError> {
        let record = self.find(channel)?;
        let values = rows_to_array(&record.sv, "sv", record.shape())?;
        SampleGrid::new(
            record.id.clone(),
            record.ping_time.clone(),
            record.range_sample.clone(),
            values,
        )
    }
    fn read_offset_profile(&self, channel: &str) -> Result<DepthProfile, EchogramError> {
        let record = self.find(channel)?;
        let rows = record
            .echo_range
            .as_ref()
            .ok_or_else(|| EchogramError::MissingOffsetData(channel.to_string()))?;
        Ok(DepthProfile {
            offsets: rows_to_array(rows, "echo_range", record.shape())?,
            transducer_offset: record.transducer_offset,
        })
    }
    fn describe(&self) -> String {
        let dims: Vec<String> = self
            .records
            .iter()
            .map(|r| {
                let (pings, samples) = r.shape();
                format!("{} (ping_time: {pings}, range_sample: {samples})", r.id)
            })
            .collect();
        format!("channels: [{}]", dims.join(", "))
    }
}
/// Opener for [`JsonSource`] files.
pub struct JsonSourceOpener;
impl SourceOpener for JsonSourceOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn SampleSource>, EchogramError> {
        Ok(Box::new(JsonSource::open(path)?))
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    const STORE: &str = r#"{
        "channels": [
            {
                "id": "GPT 38 kHz",
                "ping_time": [0.0, 1.0],
                "range_sample": [0, 1, 2],
                "sv": [[-50.0, null, -60.0], [-55.0, -65.0, null]],
                "echo_range": [[0.0, 0.5, 1.0], [0.0, 0.5, 1.0]],
                "transducer_offset": 2.0
            },
            {
                "id": "GPT 120 kHz",
                "ping_time": [0.0],
                "range_sample": [0],
                "sv": [[-70.0]]
            }
        ]
    }"#;
    #[test]
    fn json_source_reads_channels_and_nulls() {
        let source = JsonSource::from_reader(STORE.as_bytes()).unwrap();
        assert_eq!(source.channels(), vec!["GPT 38 kHz", "GPT 120 kHz"]);
        let grid = source.read_channel("GPT 38 kHz").unwrap();
        assert_eq!(grid.values.dim(), (2, 3));
        assert!(grid.values[[0, 1]].is_nan());
        assert_eq!(grid.value(SampleIndex::new(1, 1)), -65.0);
        assert_eq!(grid.finite_values().count(), 4);
        let profile = source.read_offset_profile("GPT 38 kHz").unwrap();
        assert_eq!(profile.transducer_offset, 2.0);
        assert_eq!(profile.offsets[[1, 2]], 1.0);
    }
    #[test]
    fn json_source_reports_missing_pieces() {
        let source = JsonSource::from_reader(STORE.as_bytes()).unwrap();
        assert!(matches!(
            source.read_offset_profile("GPT 120 kHz"),
            Err(EchogramError::MissingOffsetData(_))
        ));
        assert!(matches!(
            source.read_channel("GPT 200 kHz"),
            Err(EchogramError::ChannelNotFound(_))
        ));
        assert!(matches!(
            JsonSource::open(Path::new("/nonexistent/store.json")),
            Err(EchogramError::SourceUnavailable(_))
        ));
    }
    #[test]
    fn ragged_rows_are_rejected() {
        let store = r#"{"channels":[{"id":"a","ping_time":[0.0,1.0],"range_sample":[0,1],
            "sv":[[1.0,2.0],[3.0]]}]}"#;
        let source = JsonSource::from_reader(store.as_bytes()).unwrap();
        assert!(matches!(
            source.read_channel("a"),
            Err(EchogramError::ShapeMismatch { .. })
        ));
    }
    #[test]
    fn grid_shape_is_validated() {
        let err = SampleGrid::new("a", vec![0.0], vec![0, 1], Array2::zeros((2, 2)));
        assert!(matches!(err, Err(EchogramError::ShapeMismatch { .. })));
    }
}

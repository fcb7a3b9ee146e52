use std::path::{Path, PathBuf};
use std::sync::Arc;
use image::RgbaImage;
use log::{debug, info, warn};
use serde::Serialize;
use crate::config::EchogramConfig;
use crate::echogram::axis::{depth_ticks, time_ticks, AxisTick};
use crate::echogram::binning::{aggregate_with, CancelToken, CellProbe, Raster};
use crate::echogram::colormap::{colorize, ColorScale};
use crate::echogram::depth::resolve_depth;
use crate::echogram::histogram::Histogram;
use crate::echogram::selection::{selection_histogram, Selection};
use crate::echogram::source::{SampleGrid, SampleSource, SourceOpener};
use crate::echogram::EchogramError;
const TIME_TICKS: usize = 6;
const DEPTH_TICKS: usize = 8;
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    Idle,
    Aggregating,
    Ready,
    HistogramPending,
}
/// Channel picked by name (dropdown) or by position (slider).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelSelector {
    Name(String),
    Index(usize),
}
/// The committed, displayable echogram.
#[derive(Clone, Debug)]
pub struct EchogramView {
    pub source_id: u64,
    pub channel: String,
    pub grid: Arc<SampleGrid>,
    pub raster: Arc<Raster>,
    pub image: RgbaImage,
    pub scale: ColorScale,
    pub limits: (f32, f32),
    pub depth_degraded: bool,
    pub time_ticks: Vec<AxisTick>,
    pub depth_ticks: Vec<AxisTick>,
}
fn checked_scale(config: &EchogramConfig) -> Result<ColorScale, EchogramError> {
    config
        .validate()
        .map_err(|e| EchogramError::InvalidConfig(format!("{e:#}")))?;
    config.color_scale()
}
struct OpenSource {
    id: u64,
    path: Option<PathBuf>,
    source: Box<dyn SampleSource>,
}
/// Coordinates re-aggregation, recolorization and histogram updates for one view.
///
/// Requested source, channel and color scale are tracked apart from the committed
/// view; a failed request restores the previous request and leaves the view as it
/// was. A superseded request keeps the new request so the next refresh honours it,
/// and a later rejected request renders it before reporting the rejection.
pub struct EchogramPipeline {
    config: EchogramConfig,
    opener: Option<Box<dyn SourceOpener>>,
    source: Option<OpenSource>,
    next_source_id: u64,
    channel: Option<String>,
    scale: ColorScale,
    state: PipelineState,
    view: Option<EchogramView>,
    histogram: Option<Histogram>,
    aggregations: u64,
    commits: u64,
    // a superseded request has not been rendered yet
    pending: bool,
}
impl EchogramPipeline {
    pub fn new(
        config: EchogramConfig,
        opener: Box<dyn SourceOpener>,
    ) -> Result<Self, EchogramError> {
        let scale = checked_scale(&config)?;
        Ok(Self {
            config,
            opener: Some(opener),
            source: None,
            next_source_id: 1,
            channel: None,
            scale,
            state: PipelineState::Idle,
            view: None,
            histogram: None,
            aggregations: 0,
            commits: 0,
            pending: false,
        })
    }
    /// Pipeline over an already opened source; nothing is rendered until [`Self::render`].
    pub fn with_source(
        config: EchogramConfig,
        source: Box<dyn SampleSource>,
    ) -> Result<Self, EchogramError> {
        let scale = checked_scale(&config)?;
        let channel = source.channels().into_iter().next();
        Ok(Self {
            config,
            opener: None,
            source: Some(OpenSource {
                id: 1,
                path: None,
                source,
            }),
            next_source_id: 2,
            channel,
            scale,
            state: PipelineState::Idle,
            view: None,
            histogram: None,
            aggregations: 0,
            commits: 0,
            pending: false,
        })
    }
    pub fn config(&self) -> &EchogramConfig {
        &self.config
    }
    pub fn state(&self) -> PipelineState {
        self.state
    }
    pub fn view(&self) -> Option<&EchogramView> {
        self.view.as_ref()
    }
    pub fn histogram(&self) -> Option<&Histogram> {
        self.histogram.as_ref()
    }
    pub fn color_scale(&self) -> &ColorScale {
        &self.scale
    }
    pub fn source_path(&self) -> Option<&Path> {
        self.source.as_ref().and_then(|s| s.path.as_deref())
    }
    /// Number of views committed so far, recolorings included.
    pub fn commits(&self) -> u64 {
        self.commits
    }
    /// Number of full aggregations run so far.
    pub fn aggregations(&self) -> u64 {
        self.aggregations
    }
    pub fn channels(&self) -> Vec<String> {
        self.source
            .as_ref()
            .map(|s| s.source.channels())
            .unwrap_or_default()
    }
    /// Renders the currently requested source, channel and color scale.
    pub fn render(&mut self, cancel: &CancelToken) -> Result<&EchogramView, EchogramError> {
        self.refresh(cancel)?;
        self.view.as_ref().ok_or(EchogramError::NotReady)
    }
    pub fn change_source(
        &mut self,
        path: &Path,
        cancel: &CancelToken,
    ) -> Result<&EchogramView, EchogramError> {
        let result = self.request_source(path, cancel);
        self.finish_request(result, cancel)
    }
    pub fn change_channel(
        &mut self,
        selector: ChannelSelector,
        cancel: &CancelToken,
    ) -> Result<&EchogramView, EchogramError> {
        let result = self.request_channel(selector, cancel);
        self.finish_request(result, cancel)
    }
    pub fn change_colormap(
        &mut self,
        scale: ColorScale,
        cancel: &CancelToken,
    ) -> Result<&EchogramView, EchogramError> {
        let previous = std::mem::replace(&mut self.scale, scale);
        let result = match self.refresh(cancel) {
            Err(e) if !matches!(e, EchogramError::Superseded) => {
                self.scale = previous;
                Err(e)
            }
            other => other,
        };
        self.finish_request(result, cancel)
    }
    /// Hover readout for the committed raster.
    pub fn probe(&self, time: f64, depth: f64) -> Result<Option<CellProbe>, EchogramError> {
        let view = self.view.as_ref().ok_or(EchogramError::NotReady)?;
        Ok(view.raster.probe(time, depth))
    }
    /// Recomputes the histogram from the committed raster; never re-aggregates.
    pub fn change_selection(&mut self, selection: &Selection) -> Result<&Histogram, EchogramError> {
        let view = self.view.as_ref().ok_or(EchogramError::NotReady)?;
        self.state = PipelineState::HistogramPending;
        let result = selection_histogram(
            &view.grid,
            &view.raster,
            selection,
            self.config.histogram_bins,
        );
        self.state = PipelineState::Ready;
        self.histogram = Some(result?);
        self.histogram.as_ref().ok_or(EchogramError::NotReady)
    }
    fn request_source(&mut self, path: &Path, cancel: &CancelToken) -> Result<(), EchogramError> {
        let opener = self.opener.as_ref().ok_or_else(|| {
            EchogramError::SourceUnavailable(format!("{}: no opener configured", path.display()))
        })?;
        let source = opener.open(path)?;
        let channels = source.channels();
        let channel = match &self.channel {
            Some(current) if channels.contains(current) => current.clone(),
            _ => channels
                .first()
                .cloned()
                .ok_or(EchogramError::EmptyDataset)?,
        };
        info!("switching source to {} (channel {channel})", path.display());
        let id = self.next_source_id;
        self.next_source_id += 1;
        let previous_source = self.source.replace(OpenSource {
            id,
            path: Some(path.to_path_buf()),
            source,
        });
        let previous_channel = self.channel.replace(channel);
        match self.refresh(cancel) {
            Err(e) if !matches!(e, EchogramError::Superseded) => {
                self.source = previous_source;
                self.channel = previous_channel;
                Err(e)
            }
            other => other,
        }
    }
    fn request_channel(
        &mut self,
        selector: ChannelSelector,
        cancel: &CancelToken,
    ) -> Result<(), EchogramError> {
        let open = self
            .source
            .as_ref()
            .ok_or_else(|| EchogramError::SourceUnavailable("no source open".into()))?;
        let channels = open.source.channels();
        let channel = match selector {
            ChannelSelector::Name(name) if channels.contains(&name) => name,
            ChannelSelector::Name(name) => return Err(EchogramError::ChannelNotFound(name)),
            ChannelSelector::Index(i) => channels
                .get(i)
                .cloned()
                .ok_or_else(|| EchogramError::ChannelNotFound(format!("#{i}")))?,
        };
        let previous = self.channel.replace(channel);
        match self.refresh(cancel) {
            Err(e) if !matches!(e, EchogramError::Superseded) => {
                self.channel = previous;
                Err(e)
            }
            other => other,
        }
    }
    /// A rejected request still owes the display any earlier request that was
    /// superseded and never rendered; that request is rendered before the error
    /// is returned.
    fn finish_request(
        &mut self,
        result: Result<(), EchogramError>,
        cancel: &CancelToken,
    ) -> Result<&EchogramView, EchogramError> {
        match result {
            Ok(()) => self.view.as_ref().ok_or(EchogramError::NotReady),
            Err(EchogramError::Superseded) => Err(EchogramError::Superseded),
            Err(e) => {
                self.catch_up(cancel);
                Err(e)
            }
        }
    }
    fn catch_up(&mut self, cancel: &CancelToken) {
        if !self.pending || cancel.is_cancelled() {
            return;
        }
        debug!("rendering superseded request");
        match self.refresh(cancel) {
            Ok(()) | Err(EchogramError::Superseded) => {}
            Err(e) => {
                warn!("superseded request could not be rendered: {e}");
                self.pending = false;
            }
        }
    }
    fn settle(&mut self) {
        self.state = if self.view.is_some() {
            PipelineState::Ready
        } else {
            PipelineState::Idle
        };
    }
    fn refresh(&mut self, cancel: &CancelToken) -> Result<(), EchogramError> {
        self.state = PipelineState::Aggregating;
        let result = self.build_view(cancel);
        let outcome = match result {
            Ok(view) if cancel.is_cancelled() => {
                debug!("discarding stale render of {}", view.channel);
                Err(EchogramError::Superseded)
            }
            Ok(view) => {
                self.view = Some(view);
                self.histogram = None;
                self.pending = false;
                self.commits += 1;
                Ok(())
            }
            Err(e) => {
                match &e {
                    EchogramError::Superseded => debug!("render superseded"),
                    e => warn!("render failed, keeping previous echogram: {e}"),
                }
                Err(e)
            }
        };
        if matches!(outcome, Err(EchogramError::Superseded)) {
            self.pending = true;
        }
        self.settle();
        outcome
    }
    fn build_view(&mut self, cancel: &CancelToken) -> Result<EchogramView, EchogramError> {
        if cancel.is_cancelled() {
            return Err(EchogramError::Superseded);
        }
        let open = self
            .source
            .as_ref()
            .ok_or_else(|| EchogramError::SourceUnavailable("no source open".into()))?;
        let channel = self
            .channel
            .clone()
            .ok_or_else(|| EchogramError::ChannelNotFound("<none>".into()))?;
        if let Some(view) = &self.view {
            if view.source_id == open.id && view.channel == channel {
                let mut view = view.clone();
                view.image = colorize(&view.raster, &self.scale);
                view.limits = self.scale.limits(&view.raster);
                view.scale = self.scale.clone();
                return Ok(view);
            }
        }
        let grid = open.source.read_channel(&channel)?;
        let depth = resolve_depth(open.source.as_ref(), &grid, self.config.instrument_offset_m)?;
        let raster = aggregate_with(
            &grid,
            &depth.axis,
            self.config.raster_width,
            self.config.raster_height,
            self.config.chunk_pings,
            cancel,
        )?;
        self.aggregations += 1;
        let geometry = *raster.geometry();
        Ok(EchogramView {
            source_id: open.id,
            channel,
            image: colorize(&raster, &self.scale),
            limits: self.scale.limits(&raster),
            scale: self.scale.clone(),
            depth_degraded: depth.degraded,
            time_ticks: time_ticks(&geometry.time, TIME_TICKS),
            depth_ticks: depth_ticks(&geometry.depth, DEPTH_TICKS),
            grid: Arc::new(grid),
            raster: Arc::new(raster),
        })
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::echogram::colormap::{MappingMode, ValueRange};
    use crate::echogram::source::{DepthProfile, ManualSource};
    use ndarray::Array2;
    use std::sync::atomic::AtomicU64;
    fn config() -> EchogramConfig {
        EchogramConfig {
            raster_width: 4,
            raster_height: 4,
            histogram_bins: 10,
            chunk_pings: 2,
            ..EchogramConfig::default()
        }
    }
    fn grid(channel: &str, value: f32) -> SampleGrid {
        let values = Array2::from_shape_fn((8, 8), |(t, r)| value - (t + r) as f32);
        SampleGrid::new(channel, (0..8).map(|t| t as f64).collect(), (0..8).collect(), values)
            .unwrap()
    }
    fn profile() -> DepthProfile {
        DepthProfile {
            offsets: Array2::from_shape_fn((8, 8), |(_, r)| r as f32 * 0.5),
            transducer_offset: 2.0,
        }
    }
    fn source() -> ManualSource {
        ManualSource::new()
            .with_channel(grid("38 kHz", -40.0), Some(profile()))
            .with_channel(grid("120 kHz", -50.0), None)
            .with_channel(
                SampleGrid::new("empty", vec![0.0], vec![0], Array2::from_elem((1, 1), f32::NAN))
                    .unwrap(),
                None,
            )
    }
    fn pipeline() -> EchogramPipeline {
        EchogramPipeline::with_source(config(), Box::new(source())).unwrap()
    }
    #[test]
    fn first_render_moves_idle_to_ready() {
        let mut p = pipeline();
        assert_eq!(p.state(), PipelineState::Idle);
        let view = p.render(&CancelToken::never()).unwrap();
        assert_eq!(view.channel, "38 kHz");
        assert_eq!(view.image.dimensions(), (4, 4));
        assert!(!view.depth_degraded);
        assert!(!view.time_ticks.is_empty());
        assert_eq!(p.state(), PipelineState::Ready);
        assert_eq!(p.aggregations(), 1);
    }
    #[test]
    fn selection_reuses_raster_without_reaggregating() {
        let mut p = pipeline();
        p.render(&CancelToken::never()).unwrap();
        let before = p.view().unwrap().raster.clone();
        let h = p.change_selection(&Selection::Cells(vec![(0, 0), (1, 1)])).unwrap();
        assert!(h.total() > 0);
        let h = p.change_selection(&Selection::empty()).unwrap();
        assert_eq!(h.total(), 0);
        assert_eq!(h.bin_count(), 10);
        assert!(Arc::ptr_eq(&before, &p.view().unwrap().raster));
        assert_eq!(p.aggregations(), 1);
        assert_eq!(p.state(), PipelineState::Ready);
    }
    #[test]
    fn selection_before_render_is_not_ready() {
        let mut p = pipeline();
        assert!(matches!(
            p.change_selection(&Selection::empty()),
            Err(EchogramError::NotReady)
        ));
    }
    #[test]
    fn channel_switch_reaggregates_and_clears_histogram() {
        let mut p = pipeline();
        p.render(&CancelToken::never()).unwrap();
        p.change_selection(&Selection::empty()).unwrap();
        let view = p
            .change_channel(ChannelSelector::Index(1), &CancelToken::never())
            .unwrap();
        assert_eq!(view.channel, "120 kHz");
        assert!(view.depth_degraded);
        assert!(p.histogram().is_none());
        assert_eq!(p.aggregations(), 2);
    }
    #[test]
    fn failed_channel_switch_keeps_previous_view() {
        let mut p = pipeline();
        p.render(&CancelToken::never()).unwrap();
        assert!(matches!(
            p.change_channel(ChannelSelector::Name("empty".into()), &CancelToken::never()),
            Err(EchogramError::EmptyDataset)
        ));
        assert!(matches!(
            p.change_channel(ChannelSelector::Name("200 kHz".into()), &CancelToken::never()),
            Err(EchogramError::ChannelNotFound(_))
        ));
        assert_eq!(p.view().unwrap().channel, "38 kHz");
        assert_eq!(p.state(), PipelineState::Ready);
        // the restored request still renders the old channel without new work
        let scale = ColorScale::named("viridis", MappingMode::Continuous, ValueRange::Auto).unwrap();
        let view = p.change_colormap(scale, &CancelToken::never()).unwrap();
        assert_eq!(view.channel, "38 kHz");
        assert_eq!(p.aggregations(), 1);
    }
    #[test]
    fn colormap_change_recolors_same_raster() {
        let mut p = pipeline();
        let first = p.render(&CancelToken::never()).unwrap().clone();
        p.change_selection(&Selection::empty()).unwrap();
        let scale = ColorScale::named("greys", MappingMode::Continuous, ValueRange::Auto).unwrap();
        let view = p.change_colormap(scale, &CancelToken::never()).unwrap();
        assert!(Arc::ptr_eq(&first.raster, &view.raster));
        assert_ne!(first.image.as_raw(), view.image.as_raw());
        assert!(p.histogram().is_none());
        assert_eq!(p.aggregations(), 1);
    }
    #[test]
    fn superseded_render_is_discarded_but_request_kept() {
        let mut p = pipeline();
        p.render(&CancelToken::never()).unwrap();
        let latest = Arc::new(AtomicU64::new(5));
        let stale = CancelToken::new(4, latest.clone());
        assert!(matches!(
            p.change_channel(ChannelSelector::Name("120 kHz".into()), &stale),
            Err(EchogramError::Superseded)
        ));
        assert_eq!(p.view().unwrap().channel, "38 kHz");
        let current = CancelToken::new(5, latest);
        let view = p.render(&current).unwrap();
        assert_eq!(view.channel, "120 kHz");
    }
    #[test]
    fn source_switch_needs_an_opener() {
        let mut p = pipeline();
        assert!(matches!(
            p.change_source(Path::new("D20070704.json"), &CancelToken::never()),
            Err(EchogramError::SourceUnavailable(_))
        ));
    }
    #[test]
    fn source_switch_keeps_channel_when_present() {
        let opener = |path: &Path| -> Result<Box<dyn SampleSource>, EchogramError> {
            if path.ends_with("missing.json") {
                return Err(EchogramError::SourceUnavailable(path.display().to_string()));
            }
            Ok(Box::new(source()))
        };
        let mut p = EchogramPipeline::new(config(), Box::new(opener)).unwrap();
        let view = p
            .change_source(Path::new("a.json"), &CancelToken::never())
            .unwrap();
        assert_eq!(view.channel, "38 kHz");
        p.change_channel(ChannelSelector::Name("120 kHz".into()), &CancelToken::never())
            .unwrap();
        let view = p
            .change_source(Path::new("b.json"), &CancelToken::never())
            .unwrap();
        assert_eq!(view.channel, "120 kHz");
        assert_eq!(view.source_id, 2);
        assert!(p
            .change_source(Path::new("missing.json"), &CancelToken::never())
            .is_err());
        assert_eq!(p.source_path(), Some(Path::new("b.json")));
        assert_eq!(p.aggregations(), 3);
    }
    #[test]
    fn rejected_channel_renders_superseded_request() {
        let mut p = pipeline();
        p.render(&CancelToken::never()).unwrap();
        let latest = Arc::new(AtomicU64::new(2));
        let stale = CancelToken::new(1, latest.clone());
        assert!(matches!(
            p.change_channel(ChannelSelector::Name("120 kHz".into()), &stale),
            Err(EchogramError::Superseded)
        ));
        let current = CancelToken::new(2, latest);
        assert!(matches!(
            p.change_channel(ChannelSelector::Name("200 kHz".into()), &current),
            Err(EchogramError::ChannelNotFound(_))
        ));
        assert_eq!(p.view().unwrap().channel, "120 kHz");
        assert_eq!(p.state(), PipelineState::Ready);
        assert_eq!(p.aggregations(), 2);
        assert_eq!(p.commits(), 2);
        // nothing left owed: another rejection does no work
        assert!(p
            .change_channel(ChannelSelector::Index(7), &CancelToken::never())
            .is_err());
        assert_eq!(p.aggregations(), 2);
    }
    #[test]
    fn rejected_channel_renders_superseded_source() {
        let opener = |_: &Path| -> Result<Box<dyn SampleSource>, EchogramError> {
            Ok(Box::new(source()))
        };
        let mut p = EchogramPipeline::new(config(), Box::new(opener)).unwrap();
        p.change_source(Path::new("a.json"), &CancelToken::never())
            .unwrap();
        let latest = Arc::new(AtomicU64::new(2));
        assert!(matches!(
            p.change_source(Path::new("b.json"), &CancelToken::new(1, latest.clone())),
            Err(EchogramError::Superseded)
        ));
        assert_eq!(p.view().unwrap().source_id, 1);
        assert!(p
            .change_channel(ChannelSelector::Index(9), &CancelToken::new(2, latest))
            .is_err());
        assert_eq!(p.view().unwrap().source_id, 2);
        assert_eq!(p.source_path(), Some(Path::new("b.json")));
        // the colormap change now only recolors
        let scale = ColorScale::named("greys", MappingMode::Continuous, ValueRange::Auto).unwrap();
        p.change_colormap(scale, &CancelToken::never()).unwrap();
        assert_eq!(p.aggregations(), 2);
    }
    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let bad = EchogramConfig {
            histogram_bins: 0,
            ..config()
        };
        assert!(matches!(
            EchogramPipeline::with_source(bad, Box::new(source())),
            Err(EchogramError::InvalidConfig(_))
        ));
    }
    #[test]
    fn probe_reads_committed_raster() {
        let mut p = pipeline();
        assert!(matches!(p.probe(0.0, 2.0), Err(EchogramError::NotReady)));
        p.render(&CancelToken::never()).unwrap();
        let probe = p.probe(0.0, 2.0).unwrap().unwrap();
        assert_eq!((probe.col, probe.row), (0, 0));
        assert_eq!(probe.samples, 4);
        assert!(p.probe(100.0, 2.0).unwrap().is_none());
    }
}

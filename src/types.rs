// src/types.rs
use std::path::PathBuf;
use image::RgbaImage;
use crate::echogram::{
    AxisTick, CellProbe, ChannelSelector, ColorScale, EchogramView, Histogram, PipelineState,
    Selection,
};
// Commands sent from the front end to the render worker
#[derive(Clone, Debug)]
pub enum ViewCommand {
    SourceChanged(PathBuf),
    ChannelChanged(ChannelSelector),
    ColormapChanged(ColorScale),
    SelectionChanged(Selection),
    /// Cursor position in data space (seconds, meters).
    Hover { time: f64, depth: f64 },
    Shutdown,
}
impl ViewCommand {
    /// Commands that replace the echogram and so supersede any render in flight.
    pub fn triggers_render(&self) -> bool {
        matches!(
            self,
            ViewCommand::SourceChanged(_)
                | ViewCommand::ChannelChanged(_)
                | ViewCommand::ColormapChanged(_)
        )
    }
}
/// Snapshot of a committed echogram for display.
#[derive(Clone, Debug)]
pub struct RenderedView {
    pub generation: u64,
    pub channel: String,
    pub image: RgbaImage,
    pub limits: (f32, f32),
    pub time_ticks: Vec<AxisTick>,
    pub depth_ticks: Vec<AxisTick>,
    pub depth_degraded: bool,
}
impl RenderedView {
    pub fn from_view(generation: u64, view: &EchogramView) -> Self {
        Self {
            generation,
            channel: view.channel.clone(),
            image: view.image.clone(),
            limits: view.limits,
            time_ticks: view.time_ticks.clone(),
            depth_ticks: view.depth_ticks.clone(),
            depth_degraded: view.depth_degraded,
        }
    }
}
// Messages sent from the render worker back to the front end
#[derive(Clone, Debug)]
pub enum ViewMessage {
    Log(String),
    State(PipelineState),
    Rendered(Box<RenderedView>),
    HistogramReady(Histogram),
    /// Cell under the cursor, `None` outside the raster.
    Hovered(Option<CellProbe>),
    /// The requested channel holds no finite samples; the previous view stays.
    NoData(String),
    Failed(String),
}

// src/echogram/mod.rs
pub mod axis;
pub mod binning;
pub mod colormap;
pub mod depth;
pub mod error;
pub mod histogram;
pub mod pipeline;
pub mod plot;
pub mod selection;
pub mod source;
pub mod synthetic;
pub use axis::{depth_ticks, time_ticks, AxisTick};
pub use binning::{
    accumulate, aggregate, aggregate_with, AxisMap, CancelToken, CellBounds, CellProbe,
    PartialRaster, Raster, RasterGeometry, DEFAULT_CHUNK_PINGS,
};
pub use colormap::{colorize, ColorScale, ColorTable, MappingMode, ValueRange};
pub use depth::{correct, correct_profile, resolve_depth, DepthAxis, DepthCorrection};
pub use error::EchogramError;
pub use histogram::{Histogram, DEFAULT_BIN_COUNT};
pub use pipeline::{ChannelSelector, EchogramPipeline, EchogramView, PipelineState};
pub use plot::{encode_png, render_echogram_png, render_histogram_png, PlotStyle};
pub use selection::{gather_values, resolve, selection_histogram, Selection};
pub use source::{
    DepthProfile, JsonSource, JsonSourceOpener, ManualSource, SampleGrid, SampleIndex,
    SampleSource, SourceOpener,
};
pub use synthetic::{SyntheticConfig, SyntheticSource};

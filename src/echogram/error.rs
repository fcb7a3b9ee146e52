use thiserror::Error;
#[derive(Debug, Error)]
pub enum EchogramError {
    #[error("sample source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("channel not found: {0}")]
    ChannelNotFound(String),
    #[error("no range offset data for channel {0}")]
    MissingOffsetData(String),
    #[error("dataset has no finite samples to aggregate")]
    EmptyDataset,
    #[error("raster dimensions must be non-zero, got {width}x{height}")]
    InvalidGeometry { width: usize, height: usize },
    #[error("offset profile length mismatch: expected {expected}, got {actual}")]
    ProfileLengthMismatch { expected: usize, actual: usize },
    #[error("depth profile decreases along range at ping {ping}, sample {sample}")]
    InvalidDepthProfile { ping: usize, sample: usize },
    #[error("shape mismatch in {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("unknown colormap: {0}")]
    UnknownColormap(String),
    #[error("invalid color table: {0}")]
    InvalidColorTable(String),
    #[error("histogram bin count must be greater than zero")]
    InvalidBinCount,
    #[error("no echogram has been rendered yet")]
    NotReady,
    #[error("request superseded by a newer one")]
    Superseded,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to render plot: {0}")]
    Plot(String),
}
impl EchogramError {
    /// Errors that only reject the current request and leave the view usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EchogramError::ChannelNotFound(_)
                | EchogramError::MissingOffsetData(_)
                | EchogramError::EmptyDataset
                | EchogramError::Superseded
        )
    }
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for EchogramError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        EchogramError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for EchogramError {
    fn from(value: image::ImageError) -> Self {
        EchogramError::Plot(value.to_string())
    }
}

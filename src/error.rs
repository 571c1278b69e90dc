use std::time::Duration;

use thiserror::Error;

use crate::events::Side;
use crate::render::zones::PrintLocation;

/// An upload could not be turned into a normalized design image.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// No bytes were supplied.
    #[error("upload is empty")]
    Empty,

    /// The bytes are not a supported or decodable raster image.
    #[error("unsupported or corrupt image: {0}")]
    Unsupported(#[from] image::ImageError),

    /// Reading the in-memory buffer failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Resampling to the bounded size failed.
    #[error("resize failed: {0}")]
    Resize(String),
}

/// The background-removal engine did not produce a matted image.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("background removal failed: {0}")]
    Failed(String),

    #[error("background removal timed out after {0:?}")]
    TimedOut(Duration),

    /// The worker running the engine panicked or was torn down.
    #[error("background removal worker aborted: {0}")]
    Aborted(String),
}

/// A texture could not be created for a design image.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("image {width}x{height} exceeds texture limit {limit}")]
    TooLarge { width: u32, height: u32, limit: u32 },

    #[error("image has no pixels")]
    EmptyImage,

    #[error("gpu rejected texture: {0}")]
    Gpu(String),
}

/// Library error type for garment preview operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A color selection was not a `#rrggbb` hex string.
    #[error("invalid color: {0}")]
    InvalidColor(String),

    /// The print location cannot be placed on that side of the garment.
    #[error("print location {location} is not available on the {side} side")]
    InvalidPrintLocation { side: Side, location: PrintLocation },

    /// YAML/serde configuration error.
    #[error(transparent)]
    Config(#[from] serde_yaml::Error),
}

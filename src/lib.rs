#![forbid(unsafe_code)]

pub mod batch;
pub mod cancel;
pub mod capture;
pub mod config;
pub mod core;
pub mod encode;
pub mod error;
pub mod frame;
pub mod mask;
pub mod presets;
pub mod request;
pub mod tags;

pub use batch::{BatchOrchestrator, BatchResult, RequestOutcome};
pub use cancel::CancelToken;
pub use capture::{CaptureChannel, FrameCaptureSource, ImageSequenceSource};
pub use config::{ConfigStore, JsonConfigStore, MemoryConfigStore, NoConfig};
pub use core::{FrameIndex, FrameRange, Resolution};
pub use encode::{
    AudioInput, ContainerFormat, EncodeJob, EncodeResult, EncodeSettings, EncodeStatus, Encoder,
    ProcessRunner, QualityTier, SystemProcessRunner,
};
pub use error::{EncodeErrorKind, ShotblastError, ShotblastResult};
pub use frame::FrameBuffer;
pub use mask::{MaskCompositor, MaskLayout, MaskZone};
pub use presets::{PresetResolver, VisibilityFlag, VisibilitySet};
pub use request::{PlayblastRequest, ResolutionSpec, ResolvedSettings};
pub use tags::{TagContext, resolve as resolve_tags};

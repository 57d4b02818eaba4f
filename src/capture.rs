use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use crate::{
    core::{FrameIndex, FrameRange, Resolution},
    error::{ShotblastError, ShotblastResult},
    frame::FrameBuffer,
    presets::VisibilitySet,
    tags::{TagContext, camera_short_name},
};

/// Adapter over the host viewport (or a stand-in for it).
///
/// Implementations are NOT safe to call concurrently: the underlying viewport
/// is one shared, non-reentrant resource. Every capture in the process must go
/// through a single [`CaptureChannel`], which serializes access by type rather
/// than by convention.
///
/// Contract:
/// - `capture` fails with [`ShotblastError::Capture`] for an unknown camera or
///   a frame outside [`FrameCaptureSource::animation_range`].
/// - the returned buffer's dimensions exactly match the requested resolution;
///   sources never rescale silently.
pub trait FrameCaptureSource: Send {
    fn scene_name(&self) -> String;

    fn frame_rate(&self) -> f64;

    /// The scene's defined animation range; frames outside it cannot be captured.
    fn animation_range(&self) -> FrameRange;

    fn focal_length(&self, camera: &str) -> ShotblastResult<f64>;

    fn capture(
        &mut self,
        camera: &str,
        frame: FrameIndex,
        resolution: Resolution,
        visibility: &VisibilitySet,
    ) -> ShotblastResult<FrameBuffer>;
}

/// The single logical capture channel.
///
/// Cloning shares the same underlying source; the interior mutex is what makes
/// concurrent batch workers queue for the viewport instead of racing it.
#[derive(Clone)]
pub struct CaptureChannel {
    source: Arc<Mutex<Box<dyn FrameCaptureSource>>>,
}

impl CaptureChannel {
    pub fn new(source: Box<dyn FrameCaptureSource>) -> Self {
        Self {
            source: Arc::new(Mutex::new(source)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Box<dyn FrameCaptureSource>> {
        // A panicked capture poisons the lock; the source itself holds no
        // half-written state, so recover and keep serving other requests.
        match self.source.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn scene_name(&self) -> String {
        self.lock().scene_name()
    }

    pub fn frame_rate(&self) -> f64 {
        self.lock().frame_rate()
    }

    pub fn animation_range(&self) -> FrameRange {
        self.lock().animation_range()
    }

    /// Capture one frame and snapshot its tag context under a single hold of
    /// the channel, so the context reflects exactly the captured state.
    #[tracing::instrument(level = "debug", skip(self, visibility), fields(frame = frame.0))]
    pub fn capture_with_context(
        &self,
        camera: &str,
        frame: FrameIndex,
        resolution: Resolution,
        visibility: &VisibilitySet,
    ) -> ShotblastResult<(FrameBuffer, TagContext)> {
        let mut source = self.lock();
        let buffer = source.capture(camera, frame, resolution, visibility)?;
        let context = TagContext::at_frame(
            source.scene_name(),
            camera,
            source.focal_length(camera)?,
            source.frame_rate(),
            frame,
        );
        Ok((buffer, context))
    }
}

/// Capture source backed by pre-rendered numbered stills on disk.
///
/// The host application stages viewport captures as an image sequence named
/// `<camera>.<frame:04>.<ext>`; this source replays them through the normal
/// pipeline. Visibility flags are accepted but inert, since the staged frames
/// were rendered with their visibility already baked in.
pub struct ImageSequenceSource {
    frames_dir: PathBuf,
    scene: String,
    fps: f64,
    range: FrameRange,
    extension: String,
    focal_lengths: BTreeMap<String, f64>,
    default_focal_length: f64,
}

impl ImageSequenceSource {
    pub fn new(
        frames_dir: impl Into<PathBuf>,
        scene: impl Into<String>,
        fps: f64,
        range: FrameRange,
    ) -> ShotblastResult<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(ShotblastError::validation(
                "capture frame rate must be finite and > 0",
            ));
        }
        Ok(Self {
            frames_dir: frames_dir.into(),
            scene: scene.into(),
            fps,
            range,
            extension: "png".to_string(),
            focal_lengths: BTreeMap::new(),
            default_focal_length: 35.0,
        })
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_focal_length(mut self, camera: impl Into<String>, focal: f64) -> Self {
        self.focal_lengths.insert(camera.into(), focal);
        self
    }

    fn frame_path(&self, camera: &str, frame: FrameIndex) -> PathBuf {
        self.frames_dir.join(format!(
            "{}.{:04}.{}",
            camera_short_name(camera),
            frame.0,
            self.extension
        ))
    }
}

impl FrameCaptureSource for ImageSequenceSource {
    fn scene_name(&self) -> String {
        self.scene.clone()
    }

    fn frame_rate(&self) -> f64 {
        self.fps
    }

    fn animation_range(&self) -> FrameRange {
        self.range
    }

    fn focal_length(&self, camera: &str) -> ShotblastResult<f64> {
        Ok(self
            .focal_lengths
            .get(camera_short_name(camera))
            .copied()
            .unwrap_or(self.default_focal_length))
    }

    fn capture(
        &mut self,
        camera: &str,
        frame: FrameIndex,
        resolution: Resolution,
        _visibility: &VisibilitySet,
    ) -> ShotblastResult<FrameBuffer> {
        if !self.range.contains(frame) {
            return Err(ShotblastError::capture(
                camera,
                frame.0,
                format!(
                    "frame outside animation range [{}, {}]",
                    self.range.start.0, self.range.end.0
                ),
            ));
        }

        let path = self.frame_path(camera, frame);
        let img = image::open(&path).map_err(|e| {
            ShotblastError::capture(
                camera,
                frame.0,
                format!("no staged frame at '{}': {e}", path.display()),
            )
        })?;
        let rgba = img.to_rgba8();
        if rgba.width() != resolution.width || rgba.height() != resolution.height {
            return Err(ShotblastError::capture(
                camera,
                frame.0,
                format!(
                    "staged frame is {}x{}, requested {resolution}",
                    rgba.width(),
                    rgba.height()
                ),
            ));
        }
        FrameBuffer::from_rgba8(frame, resolution, rgba.into_raw())
    }
}

use std::path::PathBuf;

use crate::{
    core::{FrameRange, Resolution},
    encode::{AudioInput, ContainerFormat, EncodeSettings, Encoder, QualityTier},
    error::{ShotblastError, ShotblastResult},
    mask::MaskLayout,
    presets::{PresetResolver, VisibilitySet},
    tags::{camera_short_name, expand_filename_tags},
};

/// Output resolution, either by preset name or as explicit pixel dimensions.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ResolutionSpec {
    Preset(String),
    Custom { width: u32, height: u32 },
}

impl Default for ResolutionSpec {
    fn default() -> Self {
        ResolutionSpec::Preset("HD 1080".to_string())
    }
}

fn default_filename() -> String {
    "{scene}".to_string()
}

fn default_viewport_preset() -> String {
    "Standard".to_string()
}

fn default_mask_template() -> String {
    "Standard".to_string()
}

fn default_quality() -> QualityTier {
    QualityTier::High
}

fn default_format() -> ContainerFormat {
    ContainerFormat::Mp4
}

fn default_encoder() -> Encoder {
    Encoder::H264
}

fn default_shot_mask() -> bool {
    true
}

/// One playblast to produce: which camera, over which frames, at what
/// resolution, encoded how, and where the file goes.
///
/// Requests are plain data. Preset names are resolved and paths are fixed at
/// submission time by [`PlayblastRequest::resolve`], not at construction, so a
/// request serialized to JSON yesterday still resolves against today's presets.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct PlayblastRequest {
    pub camera: String,

    pub output_dir: PathBuf,

    /// Output filename template (extension excluded). `{scene}` and `{camera}`
    /// expand; all other text is literal.
    #[serde(default = "default_filename")]
    pub filename: String,

    #[serde(default)]
    pub resolution: ResolutionSpec,

    /// Frames to capture; `None` means the source's full animation range.
    #[serde(default)]
    pub frame_range: Option<FrameRange>,

    #[serde(default = "default_format")]
    pub format: ContainerFormat,

    #[serde(default = "default_encoder")]
    pub encoder: Encoder,

    #[serde(default = "default_quality")]
    pub quality: QualityTier,

    #[serde(default = "default_viewport_preset")]
    pub viewport_preset: String,

    #[serde(default = "default_shot_mask")]
    pub shot_mask: bool,

    #[serde(default = "default_mask_template")]
    pub mask_template: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioInput>,

    /// Hint for the host UI to open the result after encoding. Carried through
    /// untouched; the pipeline itself never acts on it.
    #[serde(default)]
    pub show_in_viewer: bool,
}

impl PlayblastRequest {
    pub fn new(camera: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            camera: camera.into(),
            output_dir: output_dir.into(),
            filename: default_filename(),
            resolution: ResolutionSpec::default(),
            frame_range: None,
            format: default_format(),
            encoder: default_encoder(),
            quality: default_quality(),
            viewport_preset: default_viewport_preset(),
            shot_mask: default_shot_mask(),
            mask_template: default_mask_template(),
            audio: None,
            show_in_viewer: false,
        }
    }

    /// Structural checks that need no preset store or capture source.
    pub fn validate(&self) -> ShotblastResult<()> {
        if self.camera.trim().is_empty() {
            return Err(ShotblastError::validation("request camera must be set"));
        }
        if self.filename.trim().is_empty() {
            return Err(ShotblastError::validation(
                "request filename template must not be empty",
            ));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(ShotblastError::validation(
                "request output directory must be set",
            ));
        }
        if !self.format.allows(self.encoder) {
            return Err(ShotblastError::validation(format!(
                "encoder {:?} is not valid for container {:?}",
                self.encoder, self.format
            )));
        }
        if let Some(range) = self.frame_range {
            // Deserialized ranges bypass the constructor, so recheck here.
            FrameRange::new(range.start, range.end)?;
        }
        Ok(())
    }

    /// Resolve presets, fix the frame range and output path, and assemble the
    /// concrete settings the pipeline runs with.
    ///
    /// `batch` switches on batch naming: when the filename template carries no
    /// `{camera}` tag, `_{camera}` is appended so requests for different
    /// cameras cannot silently share one output file.
    pub fn resolve(
        &self,
        resolver: &PresetResolver,
        scene: &str,
        animation_range: FrameRange,
        fps: f64,
        batch: bool,
    ) -> ShotblastResult<ResolvedSettings> {
        self.validate()?;

        let resolution = match &self.resolution {
            ResolutionSpec::Preset(name) => resolver.resolve_resolution(name)?,
            ResolutionSpec::Custom { width, height } => Resolution::new(*width, *height)?,
        };
        let visibility = resolver.resolve_viewport(&self.viewport_preset)?;
        let mask = if self.shot_mask {
            Some(resolver.resolve_mask_template(&self.mask_template)?)
        } else {
            None
        };

        let frame_range = match self.frame_range {
            Some(range) => {
                if !animation_range.contains(range.start) || !animation_range.contains(range.end) {
                    return Err(ShotblastError::validation(format!(
                        "requested frames [{}, {}] exceed animation range [{}, {}]",
                        range.start.0, range.end.0, animation_range.start.0, animation_range.end.0
                    )));
                }
                range
            }
            None => animation_range,
        };

        let output_path = self.output_path(scene, batch);

        Ok(ResolvedSettings {
            camera: self.camera.clone(),
            resolution,
            frame_range,
            visibility,
            mask,
            audio: self.audio.clone(),
            output_path,
            encode: EncodeSettings {
                resolution,
                fps,
                format: self.format,
                encoder: self.encoder,
                quality: self.quality,
                h264_preset: resolver.h264_preset(),
                ffmpeg_path: resolver.ffmpeg_path(),
            },
        })
    }

    fn output_path(&self, scene: &str, batch: bool) -> PathBuf {
        let mut template = self.filename.clone();
        if batch && !template.contains("{camera}") {
            template.push_str("_{camera}");
        }
        let stem = expand_filename_tags(&template, scene, &self.camera);
        let ext = self.format.extension(self.encoder);
        self.output_dir.join(format!("{stem}.{ext}"))
    }

    /// Short display name for logs and results.
    pub fn label(&self) -> &str {
        camera_short_name(&self.camera)
    }
}

/// A request after preset resolution: everything concrete, nothing named.
#[derive(Clone, Debug)]
pub struct ResolvedSettings {
    pub camera: String,
    pub resolution: Resolution,
    pub frame_range: FrameRange,
    pub visibility: VisibilitySet,
    pub mask: Option<MaskLayout>,
    pub audio: Option<AudioInput>,
    pub output_path: PathBuf,
    pub encode: EncodeSettings,
}

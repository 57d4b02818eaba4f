use std::{
    io::Write as _,
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
};

use anyhow::Context as _;

use crate::{
    cancel::CancelToken,
    core::Resolution,
    error::{ShotblastError, ShotblastResult},
    frame::FrameBuffer,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ContainerFormat {
    #[serde(rename = "mp4")]
    Mp4,
    #[serde(rename = "mov")]
    Mov,
    /// Numbered stills instead of a movie container; no encoder process.
    #[serde(rename = "Image")]
    Image,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoder {
    H264,
    ProRes,
    Png,
    Jpg,
    Tif,
}

impl Encoder {
    fn is_image(self) -> bool {
        matches!(self, Encoder::Png | Encoder::Jpg | Encoder::Tif)
    }

    fn image_format(self) -> Option<(image::ImageFormat, &'static str)> {
        match self {
            Encoder::Png => Some((image::ImageFormat::Png, "png")),
            Encoder::Jpg => Some((image::ImageFormat::Jpeg, "jpg")),
            Encoder::Tif => Some((image::ImageFormat::Tiff, "tif")),
            _ => None,
        }
    }
}

impl ContainerFormat {
    /// Which encoders each container accepts.
    pub fn allows(self, encoder: Encoder) -> bool {
        match self {
            ContainerFormat::Mp4 => matches!(encoder, Encoder::H264),
            ContainerFormat::Mov => matches!(encoder, Encoder::H264 | Encoder::ProRes),
            ContainerFormat::Image => encoder.is_image(),
        }
    }

    /// File extension for the resolved output path.
    pub fn extension(self, encoder: Encoder) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::Mov => "mov",
            ContainerFormat::Image => encoder
                .image_format()
                .map(|(_, ext)| ext)
                .unwrap_or("png"),
        }
    }
}

/// Named encoder quality tier, mapped internally to a concrete quality factor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum QualityTier {
    #[serde(rename = "Very High")]
    VeryHigh,
    High,
    Medium,
    Low,
}

impl QualityTier {
    /// H.264 constant-rate-factor per tier.
    pub fn h264_crf(self) -> u32 {
        match self {
            QualityTier::VeryHigh => 18,
            QualityTier::High => 20,
            QualityTier::Medium => 23,
            QualityTier::Low => 26,
        }
    }

    /// ProRes profile index per tier (HQ, 422, LT, Proxy).
    pub fn prores_profile(self) -> u32 {
        match self {
            QualityTier::VeryHigh => 3,
            QualityTier::High => 2,
            QualityTier::Medium => 1,
            QualityTier::Low => 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodeStatus {
    Success,
    Failed,
    Cancelled,
}

/// Outcome of one request's encode stage (and, by extension, of the whole
/// request once the orchestrator wraps validation failures in the same type).
#[derive(Debug)]
pub struct EncodeResult {
    pub status: EncodeStatus,
    pub output_path: PathBuf,
    pub error: Option<ShotblastError>,
}

impl EncodeResult {
    pub fn success(output_path: impl Into<PathBuf>) -> Self {
        Self {
            status: EncodeStatus::Success,
            output_path: output_path.into(),
            error: None,
        }
    }

    pub fn failed(output_path: impl Into<PathBuf>, error: ShotblastError) -> Self {
        Self {
            status: EncodeStatus::Failed,
            output_path: output_path.into(),
            error: Some(error),
        }
    }

    pub fn cancelled(output_path: impl Into<PathBuf>) -> Self {
        Self {
            status: EncodeStatus::Cancelled,
            output_path: output_path.into(),
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == EncodeStatus::Success
    }
}

/// Optional audio track muxed into the output.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AudioInput {
    pub path: PathBuf,
    /// Start offset into the audio file, in seconds.
    #[serde(default)]
    pub offset_secs: f64,
}

/// Everything the encoder invocation needs besides the frames themselves.
#[derive(Clone, Debug)]
pub struct EncodeSettings {
    pub resolution: Resolution,
    pub fps: f64,
    pub format: ContainerFormat,
    pub encoder: Encoder,
    pub quality: QualityTier,
    pub h264_preset: String,
    /// Explicit ffmpeg binary; falls back to `ffmpeg` on PATH.
    pub ffmpeg_path: Option<PathBuf>,
}

impl EncodeSettings {
    pub fn validate(&self) -> ShotblastResult<()> {
        self.resolution.validate()?;
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(ShotblastError::validation("encode fps must be > 0"));
        }
        if !self.format.allows(self.encoder) {
            return Err(ShotblastError::validation(format!(
                "encoder {:?} is not valid for container {:?}",
                self.encoder, self.format
            )));
        }
        Ok(())
    }

    fn ffmpeg_program(&self) -> PathBuf {
        self.ffmpeg_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("ffmpeg"))
    }

    /// Build the full ffmpeg argument list for streaming raw RGBA frames over
    /// stdin into the configured container at `out_path`.
    fn ffmpeg_args(&self, audio: Option<&AudioInput>, out_path: &Path) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgba".into(),
            "-s".into(),
            self.resolution.to_string(),
            "-framerate".into(),
            format_fps_arg(self.fps),
            "-i".into(),
            "pipe:0".into(),
        ];

        if let Some(audio) = audio {
            args.push("-ss".into());
            args.push(format!("{}", audio.offset_secs));
            args.push("-i".into());
            args.push(audio.path.display().to_string());
        }

        match self.encoder {
            Encoder::H264 => {
                args.extend(
                    [
                        "-c:v",
                        "libx264",
                        "-crf",
                        &self.quality.h264_crf().to_string(),
                        "-preset",
                        &self.h264_preset,
                        "-pix_fmt",
                        "yuv420p",
                    ]
                    .map(String::from),
                );
                if self.format == ContainerFormat::Mp4 {
                    args.push("-movflags".into());
                    args.push("+faststart".into());
                }
            }
            Encoder::ProRes => {
                args.extend(
                    [
                        "-c:v",
                        "prores_ks",
                        "-profile:v",
                        &self.quality.prores_profile().to_string(),
                        "-vendor",
                        "apl0",
                        "-pix_fmt",
                        "yuv422p10le",
                    ]
                    .map(String::from),
                );
            }
            _ => {}
        }

        if audio.is_some() {
            args.extend(["-c:a", "aac", "-b:a", "192k", "-shortest"].map(String::from));
        }

        args.push(out_path.display().to_string());
        args
    }
}

fn format_fps_arg(fps: f64) -> String {
    if (fps - fps.round()).abs() < 1e-6 {
        format!("{}", fps.round() as i64)
    } else {
        format!("{fps}")
    }
}

/// Exit state and captured diagnostics of a finished encoder process.
#[derive(Clone, Debug)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// A running encoder process: frames in via stdin, diagnostics out via stderr.
pub trait EncoderProcess: Send {
    fn write_frame(&mut self, rgba: &[u8]) -> std::io::Result<()>;

    /// Close stdin, wait for exit, and collect diagnostics.
    fn finish(self: Box<Self>) -> ShotblastResult<ProcessOutput>;

    /// Terminate and reap immediately, discarding any partial output.
    fn kill(&mut self);
}

/// Narrow seam around subprocess execution so tests can simulate encoder
/// success/failure without spawning anything.
pub trait ProcessRunner: Send + Sync {
    fn spawn(&self, program: &Path, args: &[String]) -> ShotblastResult<Box<dyn EncoderProcess>>;
}

/// Production runner: spawns the real binary with piped stdin/stderr.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    fn spawn(&self, program: &Path, args: &[String]) -> ShotblastResult<Box<dyn EncoderProcess>> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ShotblastError::missing_encoder(format!(
                        "encoder binary '{}' not found on PATH",
                        program.display()
                    ))
                } else {
                    ShotblastError::from(e)
                }
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ShotblastError::encode_failed("failed to open encoder stdin"))?;

        Ok(Box::new(SystemEncoderProcess {
            child,
            stdin: Some(stdin),
        }))
    }
}

struct SystemEncoderProcess {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl EncoderProcess for SystemEncoderProcess {
    fn write_frame(&mut self, rgba: &[u8]) -> std::io::Result<()> {
        match self.stdin.as_mut() {
            Some(stdin) => stdin.write_all(rgba),
            None => Err(std::io::Error::other("encoder stdin already closed")),
        }
    }

    fn finish(mut self: Box<Self>) -> ShotblastResult<ProcessOutput> {
        drop(self.stdin.take());
        let output = self
            .child
            .wait_with_output()
            .with_context(|| "wait for encoder process")?;
        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    fn kill(&mut self) {
        drop(self.stdin.take());
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Probe for a working encoder binary. Used by front-ends to fail early with
/// a clear message instead of mid-batch.
pub fn is_encoder_available(ffmpeg_path: Option<&Path>) -> bool {
    let program = ffmpeg_path.unwrap_or_else(|| Path::new("ffmpeg"));
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Streams one request's composited frames into the external encoder (or, for
/// image output, straight to numbered stills).
///
/// Frames must arrive in increasing frame-index order and are forwarded as
/// they come; the job never buffers the whole sequence. On any failure or
/// cancellation the encoder subprocess is killed and reaped before returning.
pub struct EncodeJob<'a> {
    settings: EncodeSettings,
    runner: &'a dyn ProcessRunner,
    cancel: CancelToken,
}

impl<'a> EncodeJob<'a> {
    pub fn new(settings: EncodeSettings, runner: &'a dyn ProcessRunner, cancel: CancelToken) -> Self {
        Self {
            settings,
            runner,
            cancel,
        }
    }

    #[tracing::instrument(level = "info", skip_all, fields(out = %out_path.display()))]
    pub fn run(
        &self,
        frames: impl Iterator<Item = ShotblastResult<FrameBuffer>>,
        audio: Option<&AudioInput>,
        out_path: &Path,
    ) -> EncodeResult {
        if let Err(e) = self.settings.validate() {
            return EncodeResult::failed(out_path, e);
        }
        if let Err(e) = ensure_parent_dir(out_path) {
            return EncodeResult::failed(out_path, e);
        }

        if self.settings.format == ContainerFormat::Image {
            return self.run_image_sequence(frames, out_path);
        }
        self.run_movie(frames, audio, out_path)
    }

    fn run_movie(
        &self,
        frames: impl Iterator<Item = ShotblastResult<FrameBuffer>>,
        audio: Option<&AudioInput>,
        out_path: &Path,
    ) -> EncodeResult {
        let program = self.settings.ffmpeg_program();
        let args = self.settings.ffmpeg_args(audio, out_path);
        tracing::debug!(program = %program.display(), "spawning encoder");

        let mut process = match self.runner.spawn(&program, &args) {
            Ok(p) => p,
            Err(e) => return EncodeResult::failed(out_path, e),
        };

        let expected_len = self.settings.resolution.pixel_count() * 4;
        let mut frame_count = 0u64;
        for frame in frames {
            if self.cancel.is_cancelled() {
                process.kill();
                return EncodeResult::cancelled(out_path);
            }
            let frame = match frame {
                Ok(f) => f,
                Err(e) => {
                    process.kill();
                    return EncodeResult::failed(out_path, e);
                }
            };
            if frame.resolution() != self.settings.resolution || frame.data.len() != expected_len {
                process.kill();
                return EncodeResult::failed(
                    out_path,
                    ShotblastError::validation(format!(
                        "frame {} is {}, encoder expects {}",
                        frame.index.0,
                        frame.resolution(),
                        self.settings.resolution
                    )),
                );
            }
            if let Err(write_err) = process.write_frame(&frame.data) {
                // A failed pipe write usually means the encoder died; surface
                // its stderr rather than the broken-pipe error.
                let detail = match process.finish() {
                    Ok(output) if !output.stderr.is_empty() => output.stderr,
                    _ => write_err.to_string(),
                };
                return EncodeResult::failed(out_path, ShotblastError::encode_failed(detail));
            }
            frame_count += 1;
        }

        if self.cancel.is_cancelled() {
            process.kill();
            return EncodeResult::cancelled(out_path);
        }

        match process.finish() {
            Ok(output) if output.success() => {
                tracing::info!(frames = frame_count, "encode complete");
                EncodeResult::success(out_path)
            }
            Ok(output) => EncodeResult::failed(
                out_path,
                ShotblastError::encode_failed(format!(
                    "encoder exited with code {:?}: {}",
                    output.exit_code, output.stderr
                )),
            ),
            Err(e) => EncodeResult::failed(out_path, e),
        }
    }

    fn run_image_sequence(
        &self,
        frames: impl Iterator<Item = ShotblastResult<FrameBuffer>>,
        out_path: &Path,
    ) -> EncodeResult {
        let Some((format, ext)) = self.settings.encoder.image_format() else {
            return EncodeResult::failed(
                out_path,
                ShotblastError::validation("image output requires an image encoder"),
            );
        };
        let stem = out_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "frame".to_string());
        let dir = out_path.parent().unwrap_or_else(|| Path::new("."));

        for frame in frames {
            if self.cancel.is_cancelled() {
                return EncodeResult::cancelled(out_path);
            }
            let frame = match frame {
                Ok(f) => f,
                Err(e) => return EncodeResult::failed(out_path, e),
            };
            let still = dir.join(format!("{stem}.{:04}.{ext}", frame.index.0));
            if let Err(e) = image::save_buffer_with_format(
                &still,
                &frame.data,
                frame.width,
                frame.height,
                image::ColorType::Rgba8,
                format,
            ) {
                return EncodeResult::failed(
                    out_path,
                    ShotblastError::encode_failed(format!(
                        "write still '{}': {e}",
                        still.display()
                    )),
                );
            }
        }
        EncodeResult::success(out_path)
    }
}

fn ensure_parent_dir(path: &Path) -> ShotblastResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FrameIndex;
    use std::sync::{Arc, Mutex};

    fn settings(format: ContainerFormat, encoder: Encoder) -> EncodeSettings {
        EncodeSettings {
            resolution: Resolution::new(4, 4).unwrap(),
            fps: 24.0,
            format,
            encoder,
            quality: QualityTier::High,
            h264_preset: "fast".to_string(),
            ffmpeg_path: None,
        }
    }

    #[test]
    fn quality_tiers_map_to_documented_values() {
        assert_eq!(QualityTier::VeryHigh.h264_crf(), 18);
        assert_eq!(QualityTier::High.h264_crf(), 20);
        assert_eq!(QualityTier::Medium.h264_crf(), 23);
        assert_eq!(QualityTier::Low.h264_crf(), 26);
        assert_eq!(QualityTier::VeryHigh.prores_profile(), 3);
        assert_eq!(QualityTier::Low.prores_profile(), 0);
    }

    #[test]
    fn container_encoder_combinations() {
        assert!(ContainerFormat::Mp4.allows(Encoder::H264));
        assert!(!ContainerFormat::Mp4.allows(Encoder::ProRes));
        assert!(ContainerFormat::Mov.allows(Encoder::ProRes));
        assert!(ContainerFormat::Image.allows(Encoder::Png));
        assert!(!ContainerFormat::Image.allows(Encoder::H264));
        assert!(
            settings(ContainerFormat::Mp4, Encoder::ProRes)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn h264_args_carry_crf_preset_and_faststart() {
        let s = settings(ContainerFormat::Mp4, Encoder::H264);
        let args = s.ffmpeg_args(None, Path::new("/tmp/out.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo"));
        assert!(joined.contains("-pix_fmt rgba"));
        assert!(joined.contains("-s 4x4"));
        assert!(joined.contains("-framerate 24"));
        assert!(joined.contains("-c:v libx264 -crf 20 -preset fast -pix_fmt yuv420p"));
        assert!(joined.contains("-movflags +faststart"));
        assert!(joined.ends_with("/tmp/out.mp4"));
    }

    #[test]
    fn prores_args_carry_profile_and_vendor() {
        let mut s = settings(ContainerFormat::Mov, Encoder::ProRes);
        s.quality = QualityTier::VeryHigh;
        let joined = s.ffmpeg_args(None, Path::new("out.mov")).join(" ");
        assert!(joined.contains("-c:v prores_ks -profile:v 3 -vendor apl0"));
        assert!(!joined.contains("faststart"));
    }

    #[test]
    fn audio_input_adds_offset_and_aac() {
        let s = settings(ContainerFormat::Mp4, Encoder::H264);
        let audio = AudioInput {
            path: PathBuf::from("/tmp/mix.wav"),
            offset_secs: 1.5,
        };
        let joined = s.ffmpeg_args(Some(&audio), Path::new("out.mp4")).join(" ");
        assert!(joined.contains("-ss 1.5 -i /tmp/mix.wav"));
        assert!(joined.contains("-c:a aac -b:a 192k -shortest"));
    }

    #[derive(Clone, Default)]
    struct RecordingRunner {
        frames_written: Arc<Mutex<usize>>,
        exit_code: i32,
        stderr: String,
        killed: Arc<Mutex<bool>>,
    }

    struct RecordingProcess {
        frames_written: Arc<Mutex<usize>>,
        exit_code: i32,
        stderr: String,
        killed: Arc<Mutex<bool>>,
    }

    impl ProcessRunner for RecordingRunner {
        fn spawn(
            &self,
            _program: &Path,
            _args: &[String],
        ) -> ShotblastResult<Box<dyn EncoderProcess>> {
            Ok(Box::new(RecordingProcess {
                frames_written: self.frames_written.clone(),
                exit_code: self.exit_code,
                stderr: self.stderr.clone(),
                killed: self.killed.clone(),
            }))
        }
    }

    impl EncoderProcess for RecordingProcess {
        fn write_frame(&mut self, _rgba: &[u8]) -> std::io::Result<()> {
            *self.frames_written.lock().unwrap() += 1;
            Ok(())
        }

        fn finish(self: Box<Self>) -> ShotblastResult<ProcessOutput> {
            Ok(ProcessOutput {
                exit_code: Some(self.exit_code),
                stderr: self.stderr,
            })
        }

        fn kill(&mut self) {
            *self.killed.lock().unwrap() = true;
        }
    }

    fn frames(n: i64) -> impl Iterator<Item = ShotblastResult<FrameBuffer>> {
        (1..=n).map(|i| {
            Ok(FrameBuffer::new_filled(
                FrameIndex(i),
                Resolution::new(4, 4).unwrap(),
                [0, 0, 0, 255],
            ))
        })
    }

    #[test]
    fn streams_all_frames_and_reports_success() {
        let runner = RecordingRunner::default();
        let job = EncodeJob::new(
            settings(ContainerFormat::Mp4, Encoder::H264),
            &runner,
            CancelToken::new(),
        );
        let result = job.run(frames(5), None, Path::new("out.mp4"));
        assert!(result.is_success(), "{:?}", result.error);
        assert_eq!(*runner.frames_written.lock().unwrap(), 5);
    }

    #[test]
    fn nonzero_exit_is_encode_failed_with_stderr() {
        let runner = RecordingRunner {
            exit_code: 1,
            stderr: "broken input".to_string(),
            ..Default::default()
        };
        let job = EncodeJob::new(
            settings(ContainerFormat::Mp4, Encoder::H264),
            &runner,
            CancelToken::new(),
        );
        let result = job.run(frames(1), None, Path::new("out.mp4"));
        assert_eq!(result.status, EncodeStatus::Failed);
        let msg = result.error.unwrap().to_string();
        assert!(msg.contains("encode-failed"));
        assert!(msg.contains("broken input"));
    }

    #[test]
    fn upstream_frame_error_kills_encoder() {
        let runner = RecordingRunner::default();
        let job = EncodeJob::new(
            settings(ContainerFormat::Mp4, Encoder::H264),
            &runner,
            CancelToken::new(),
        );
        let frames = vec![
            Ok(FrameBuffer::new_filled(
                FrameIndex(1),
                Resolution::new(4, 4).unwrap(),
                [0, 0, 0, 255],
            )),
            Err(ShotblastError::capture("camA", 2, "gone")),
        ];
        let result = job.run(frames.into_iter(), None, Path::new("out.mp4"));
        assert_eq!(result.status, EncodeStatus::Failed);
        assert!(*runner.killed.lock().unwrap());
        assert!(matches!(
            result.error,
            Some(ShotblastError::Capture { .. })
        ));
    }

    #[test]
    fn wrong_frame_size_fails_before_writing() {
        let runner = RecordingRunner::default();
        let job = EncodeJob::new(
            settings(ContainerFormat::Mp4, Encoder::H264),
            &runner,
            CancelToken::new(),
        );
        let bad = vec![Ok(FrameBuffer::new_filled(
            FrameIndex(1),
            Resolution::new(8, 8).unwrap(),
            [0, 0, 0, 255],
        ))];
        let result = job.run(bad.into_iter(), None, Path::new("out.mp4"));
        assert_eq!(result.status, EncodeStatus::Failed);
        assert_eq!(*runner.frames_written.lock().unwrap(), 0);
    }

    #[test]
    fn cancellation_kills_encoder_and_reports_cancelled() {
        let runner = RecordingRunner::default();
        let cancel = CancelToken::new();
        let job = EncodeJob::new(
            settings(ContainerFormat::Mp4, Encoder::H264),
            &runner,
            cancel.clone(),
        );
        cancel.cancel();
        let result = job.run(frames(3), None, Path::new("out.mp4"));
        assert_eq!(result.status, EncodeStatus::Cancelled);
        assert!(*runner.killed.lock().unwrap());
        assert_eq!(*runner.frames_written.lock().unwrap(), 0);
    }

    #[test]
    fn image_sequence_writes_numbered_stills() {
        let dir = std::env::temp_dir().join(format!("shotblast_enc_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let runner = RecordingRunner::default();
        let job = EncodeJob::new(
            settings(ContainerFormat::Image, Encoder::Png),
            &runner,
            CancelToken::new(),
        );
        let out = dir.join("review.png");
        let result = job.run(frames(2), None, &out);
        assert!(result.is_success(), "{:?}", result.error);
        assert!(dir.join("review.0001.png").is_file());
        assert!(dir.join("review.0002.png").is_file());
        // No encoder process is ever spawned for image output.
        assert_eq!(*runner.frames_written.lock().unwrap(), 0);
        let _ = std::fs::remove_dir_all(&dir);
    }
}

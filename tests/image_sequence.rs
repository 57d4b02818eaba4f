use std::path::{Path, PathBuf};
use std::sync::Arc;

use shotblast::{
    BatchOrchestrator, CaptureChannel, ContainerFormat, EncodeStatus, Encoder, FrameIndex,
    FrameRange, ImageSequenceSource, MemoryConfigStore, PlayblastRequest, PresetResolver,
    ResolutionSpec, ShotblastError,
};

const WIDTH: u32 = 32;
const HEIGHT: u32 = 18;

fn stage_frames(dir: &Path, camera: &str, frames: &[i64]) {
    std::fs::create_dir_all(dir).unwrap();
    for &frame in frames {
        let shade = (frame * 20 % 256) as u8;
        let data = vec![shade; (WIDTH * HEIGHT * 4) as usize];
        image::save_buffer_with_format(
            dir.join(format!("{camera}.{frame:04}.png")),
            &data,
            WIDTH,
            HEIGHT,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .unwrap();
    }
}

fn temp_root(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("shotblast_seq_{tag}_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn orchestrator(frames_dir: &Path, range: FrameRange) -> BatchOrchestrator {
    let source = ImageSequenceSource::new(frames_dir, "seq010_sh020", 24.0, range).unwrap();
    BatchOrchestrator::new(
        CaptureChannel::new(Box::new(source)),
        PresetResolver::new(Arc::new(MemoryConfigStore::new())),
    )
}

fn still_request(camera: &str, out_dir: &Path) -> PlayblastRequest {
    let mut req = PlayblastRequest::new(camera, out_dir);
    req.resolution = ResolutionSpec::Custom {
        width: WIDTH,
        height: HEIGHT,
    };
    req.format = ContainerFormat::Image;
    req.encoder = Encoder::Png;
    req.shot_mask = false;
    req
}

#[test]
fn staged_frames_become_numbered_stills() {
    let root = temp_root("ok");
    let frames_dir = root.join("staged");
    stage_frames(&frames_dir, "camA", &[1, 2, 3]);

    let range = FrameRange::new(FrameIndex(1), FrameIndex(3)).unwrap();
    let orch = orchestrator(&frames_dir, range);

    let out_dir = root.join("out");
    let result = orch.run_batch(&[still_request("camA", &out_dir)], 1);
    assert!(result.all_succeeded(), "{:?}", result.outcomes[0].result);

    for frame in 1..=3 {
        let still = out_dir.join(format!("seq010_sh020.{frame:04}.png"));
        assert!(still.is_file(), "missing {}", still.display());
        let img = image::open(&still).unwrap();
        assert_eq!((img.width(), img.height()), (WIDTH, HEIGHT));
    }

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn missing_staged_frame_surfaces_as_capture_error() {
    let root = temp_root("gap");
    let frames_dir = root.join("staged");
    // Frame 2 is deliberately absent.
    stage_frames(&frames_dir, "camA", &[1, 3]);

    let range = FrameRange::new(FrameIndex(1), FrameIndex(3)).unwrap();
    let orch = orchestrator(&frames_dir, range);

    let out_dir = root.join("out");
    let result = orch.run_batch(&[still_request("camA", &out_dir)], 1);

    assert_eq!(result.outcomes[0].result.status, EncodeStatus::Failed);
    assert!(matches!(
        result.outcomes[0].result.error,
        Some(ShotblastError::Capture { frame: 2, .. })
    ));
    // Frame 1 was already written before the gap was hit; it stays on disk.
    assert!(out_dir.join("seq010_sh020.0001.png").is_file());

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn dimension_mismatch_fails_the_request() {
    let root = temp_root("dims");
    let frames_dir = root.join("staged");
    stage_frames(&frames_dir, "camA", &[1]);

    let range = FrameRange::new(FrameIndex(1), FrameIndex(1)).unwrap();
    let orch = orchestrator(&frames_dir, range);

    let out_dir = root.join("out");
    let mut req = still_request("camA", &out_dir);
    req.resolution = ResolutionSpec::Custom {
        width: WIDTH * 2,
        height: HEIGHT,
    };
    let result = orch.run_batch(std::slice::from_ref(&req), 1);

    assert_eq!(result.outcomes[0].result.status, EncodeStatus::Failed);
    assert!(matches!(
        result.outcomes[0].result.error,
        Some(ShotblastError::Capture { .. })
    ));

    let _ = std::fs::remove_dir_all(&root);
}

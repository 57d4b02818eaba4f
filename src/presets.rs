use std::{collections::BTreeSet, path::PathBuf, sync::Arc};

use anyhow::Context as _;

use crate::{
    config::ConfigStore,
    core::Resolution,
    error::{ShotblastError, ShotblastResult},
    mask::{MaskLayout, MaskZone},
};

/// Object categories that can be shown or hidden in the capture viewport.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum VisibilityFlag {
    NurbsCurves,
    NurbsSurfaces,
    Polygons,
    Subdivs,
    Planes,
    Lights,
    Cameras,
    ImagePlanes,
    Joints,
    IkHandles,
    Deformers,
    Dynamics,
    Locators,
    Dimensions,
    Pivots,
    Handles,
    Textures,
    Controllers,
    Grid,
    Hud,
}

pub type VisibilitySet = BTreeSet<VisibilityFlag>;

const RESOLUTION_KEY_PREFIX: &str = "shotblast.presets.resolution.";
const VIEWPORT_KEY_PREFIX: &str = "shotblast.presets.viewport.";
const MASK_KEY_PREFIX: &str = "shotblast.presets.mask.";
const FFMPEG_PATH_KEY: &str = "shotblast.ffmpeg_path";
const H264_PRESET_KEY: &str = "shotblast.h264_preset";

pub const DEFAULT_H264_PRESET: &str = "fast";

fn builtin_resolution(name: &str) -> Option<Resolution> {
    let (width, height) = match name {
        "HD 720" => (1280, 720),
        "HD 1080" => (1920, 1080),
        "UHD 4K" => (3840, 2160),
        "Cinematic 2K" => (2048, 1080),
        "Cinematic 4K" => (4096, 2160),
        "Square 1080" => (1080, 1080),
        "Vertical HD" => (720, 1280),
        _ => return None,
    };
    Some(Resolution { width, height })
}

fn builtin_viewport(name: &str) -> Option<VisibilitySet> {
    use VisibilityFlag::*;
    let flags: &[VisibilityFlag] = match name {
        // "Viewport" keeps whatever the capture source currently shows.
        "Viewport" => &[],
        "Geo" => &[NurbsSurfaces, Polygons, Subdivs],
        "Standard" => &[
            NurbsCurves,
            NurbsSurfaces,
            Polygons,
            Subdivs,
            Planes,
            Lights,
            Cameras,
            Joints,
            IkHandles,
            Locators,
        ],
        "Full" => &[
            NurbsCurves,
            NurbsSurfaces,
            Polygons,
            Subdivs,
            Planes,
            Lights,
            Cameras,
            ImagePlanes,
            Joints,
            IkHandles,
            Deformers,
            Dynamics,
            Locators,
            Dimensions,
            Pivots,
            Handles,
            Textures,
            Controllers,
            Grid,
        ],
        _ => return None,
    };
    Some(flags.iter().copied().collect())
}

fn uniform_zone(template: &str, color: [f32; 3], scale: f32, opacity: f32) -> Option<MaskZone> {
    if template.is_empty() {
        return None;
    }
    Some(MaskZone {
        template: template.to_string(),
        color,
        scale,
        opacity,
    })
}

fn builtin_mask_template(name: &str) -> Option<MaskLayout> {
    let (texts, color, scale, opacity) = match name {
        "Standard" => (
            [
                "Scene: {scene}",
                "",
                "FPS: {fps}",
                "Artist: {username}",
                "Date: {date}",
                "Frame: {counter}",
            ],
            [1.0, 1.0, 1.0],
            0.25,
            1.0,
        ),
        "Minimal" => (
            ["{scene}", "", "", "", "", "{counter}"],
            [1.0, 1.0, 1.0],
            0.2,
            0.8,
        ),
        "Detailed" => (
            [
                "Scene: {scene}",
                "Camera: {camera}",
                "Focal: {focal_length}mm",
                "Artist: {username}",
                "Date: {date} {time}",
                "Frame: {counter}",
            ],
            [0.4, 0.8, 1.0],
            0.3,
            0.9,
        ),
        _ => return None,
    };
    let [tl, tc, tr, bl, bc, br] = texts;
    Some(MaskLayout {
        top_left: uniform_zone(tl, color, scale, opacity),
        top_center: uniform_zone(tc, color, scale, opacity),
        top_right: uniform_zone(tr, color, scale, opacity),
        bottom_left: uniform_zone(bl, color, scale, opacity),
        bottom_center: uniform_zone(bc, color, scale, opacity),
        bottom_right: uniform_zone(br, color, scale, opacity),
    })
}

/// Resolves preset names to concrete values.
///
/// Each lookup consults the injected read-only [`ConfigStore`] first (user
/// overrides win on name collisions), then the built-in tables. Lookups are
/// pure: nothing is memoized, so edits to the store are visible immediately.
#[derive(Clone)]
pub struct PresetResolver {
    store: Arc<dyn ConfigStore>,
}

impl PresetResolver {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    pub fn resolve_resolution(&self, name: &str) -> ShotblastResult<Resolution> {
        if let Some(raw) = self.store.get(&format!("{RESOLUTION_KEY_PREFIX}{name}")) {
            let (width, height): (u32, u32) = serde_json::from_str(&raw)
                .with_context(|| format!("parse resolution preset override '{name}'"))?;
            let res = Resolution::new(width, height)?;
            return Ok(res);
        }
        builtin_resolution(name)
            .ok_or_else(|| ShotblastError::preset_not_found("resolution", name))
    }

    pub fn resolve_viewport(&self, name: &str) -> ShotblastResult<VisibilitySet> {
        if let Some(raw) = self.store.get(&format!("{VIEWPORT_KEY_PREFIX}{name}")) {
            let flags: Vec<VisibilityFlag> = serde_json::from_str(&raw)
                .with_context(|| format!("parse viewport preset override '{name}'"))?;
            return Ok(flags.into_iter().collect());
        }
        builtin_viewport(name).ok_or_else(|| ShotblastError::preset_not_found("viewport", name))
    }

    pub fn resolve_mask_template(&self, name: &str) -> ShotblastResult<MaskLayout> {
        if let Some(raw) = self.store.get(&format!("{MASK_KEY_PREFIX}{name}")) {
            let layout: MaskLayout = serde_json::from_str(&raw)
                .with_context(|| format!("parse mask template override '{name}'"))?;
            layout.validate()?;
            return Ok(layout);
        }
        builtin_mask_template(name).ok_or_else(|| ShotblastError::preset_not_found("mask", name))
    }

    /// Explicit ffmpeg location from the preference store, if configured.
    pub fn ffmpeg_path(&self) -> Option<PathBuf> {
        self.store
            .get(FFMPEG_PATH_KEY)
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
    }

    /// H.264 speed preset (`-preset`), defaulting to `fast`.
    pub fn h264_preset(&self) -> String {
        self.store
            .get(H264_PRESET_KEY)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_H264_PRESET.to_string())
    }
}

use std::sync::Arc;

use anyhow::Context as _;

use crate::{
    error::{ShotblastError, ShotblastResult},
    frame::FrameBuffer,
    tags::{self, TagContext},
};

/// RGBA8 brush color used by Parley text layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextBrushRgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// One shot-mask zone: a tag template plus its text styling. `scale` is
/// relative to frame height; `opacity` is the blend weight in `[0, 1]`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MaskZone {
    pub template: String,
    #[serde(default = "default_color")]
    pub color: [f32; 3],
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
}

fn default_color() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn default_scale() -> f32 {
    0.25
}

fn default_opacity() -> f32 {
    1.0
}

impl MaskZone {
    pub fn validate(&self) -> ShotblastResult<()> {
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(ShotblastError::validation(format!(
                "mask zone opacity {} must be within [0, 1]",
                self.opacity
            )));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(ShotblastError::validation(
                "mask zone scale must be finite and > 0",
            ));
        }
        Ok(())
    }

    fn brush(&self) -> TextBrushRgba8 {
        let to_u8 = |c: f32| ((c.clamp(0.0, 1.0) * 255.0).round()) as u8;
        TextBrushRgba8 {
            r: to_u8(self.color[0]),
            g: to_u8(self.color[1]),
            b: to_u8(self.color[2]),
            a: 255,
        }
    }
}

/// Anchor position of a mask zone on the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoneAnchor {
    TopLeft,
    TopCenter,
    TopRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl ZoneAnchor {
    /// Fixed draw order. Zones are independent; the order only matters when a
    /// misconfigured layout overlaps text, which is the configuration's
    /// problem, not the compositor's.
    pub const DRAW_ORDER: [ZoneAnchor; 6] = [
        ZoneAnchor::TopLeft,
        ZoneAnchor::TopCenter,
        ZoneAnchor::TopRight,
        ZoneAnchor::BottomLeft,
        ZoneAnchor::BottomCenter,
        ZoneAnchor::BottomRight,
    ];

    fn is_top(self) -> bool {
        matches!(
            self,
            ZoneAnchor::TopLeft | ZoneAnchor::TopCenter | ZoneAnchor::TopRight
        )
    }

    fn column(self) -> u32 {
        match self {
            ZoneAnchor::TopLeft | ZoneAnchor::BottomLeft => 0,
            ZoneAnchor::TopCenter | ZoneAnchor::BottomCenter => 1,
            ZoneAnchor::TopRight | ZoneAnchor::BottomRight => 2,
        }
    }
}

/// Six independent zone slots. An absent zone draws nothing.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MaskLayout {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_left: Option<MaskZone>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_center: Option<MaskZone>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_right: Option<MaskZone>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom_left: Option<MaskZone>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom_center: Option<MaskZone>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom_right: Option<MaskZone>,
}

impl MaskLayout {
    pub fn zone(&self, anchor: ZoneAnchor) -> Option<&MaskZone> {
        match anchor {
            ZoneAnchor::TopLeft => self.top_left.as_ref(),
            ZoneAnchor::TopCenter => self.top_center.as_ref(),
            ZoneAnchor::TopRight => self.top_right.as_ref(),
            ZoneAnchor::BottomLeft => self.bottom_left.as_ref(),
            ZoneAnchor::BottomCenter => self.bottom_center.as_ref(),
            ZoneAnchor::BottomRight => self.bottom_right.as_ref(),
        }
    }

    pub fn validate(&self) -> ShotblastResult<()> {
        for anchor in ZoneAnchor::DRAW_ORDER {
            if let Some(zone) = self.zone(anchor) {
                zone.validate()?;
            }
        }
        Ok(())
    }
}

/// Stateful helper for building Parley text layouts from raw font bytes.
struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
}

impl TextLayoutEngine {
    fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
        }
    }

    /// Shape and lay out a single line of mask text. Lines are never broken:
    /// overlong text is clipped at draw time, not wrapped.
    fn layout_line(
        &mut self,
        text: &str,
        font_bytes: &[u8],
        size_px: f32,
        brush: TextBrushRgba8,
    ) -> ShotblastResult<parley::Layout<TextBrushRgba8>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(ShotblastError::validation(
                "mask text size_px must be finite and > 0",
            ));
        }

        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.to_vec()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            ShotblastError::validation("no font families registered from font bytes")
        })?;
        let family_name = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| ShotblastError::validation("registered font family has no name"))?
            .to_string();

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(family_name)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(None);
        Ok(layout)
    }
}

/// Burns expanded mask text onto captured frames.
///
/// Text is shaped with Parley and rasterized through `vello_cpu` into a
/// per-zone overlay, then source-over blended (premultiplied) onto the frame
/// with the zone's opacity. A zone whose opacity is 0, or whose template
/// expands to nothing, leaves the frame pixel-identical.
pub struct MaskCompositor {
    font_bytes: Arc<Vec<u8>>,
    font: vello_cpu::peniko::FontData,
    engine: TextLayoutEngine,
}

impl MaskCompositor {
    pub fn new(font_bytes: Vec<u8>) -> ShotblastResult<Self> {
        if font_bytes.is_empty() {
            return Err(ShotblastError::validation("mask font bytes are empty"));
        }
        let font_bytes = Arc::new(font_bytes);
        let font = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(font_bytes.as_ref().clone()),
            0,
        );
        Ok(Self {
            font_bytes,
            font,
            engine: TextLayoutEngine::new(),
        })
    }

    pub fn from_font_file(path: &std::path::Path) -> ShotblastResult<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read mask font '{}'", path.display()))?;
        Self::new(bytes)
    }

    /// Load the first available font from the platform's usual locations.
    pub fn with_system_font() -> ShotblastResult<Self> {
        Self::new(system_font_bytes()?)
    }

    /// Composite into a fresh buffer, leaving `frame` untouched. This is the
    /// default: callers that are done with the raw frame can use
    /// [`MaskCompositor::composite_into`] to avoid the copy.
    pub fn composite(
        &mut self,
        frame: &FrameBuffer,
        layout: &MaskLayout,
        context: &TagContext,
    ) -> ShotblastResult<FrameBuffer> {
        let mut out = frame.clone();
        self.composite_into(&mut out, layout, context)?;
        Ok(out)
    }

    /// Composite in place, consuming the raw pixels.
    #[tracing::instrument(level = "trace", skip_all, fields(frame = frame.index.0))]
    pub fn composite_into(
        &mut self,
        frame: &mut FrameBuffer,
        layout: &MaskLayout,
        context: &TagContext,
    ) -> ShotblastResult<()> {
        layout.validate()?;
        for anchor in ZoneAnchor::DRAW_ORDER {
            if let Some(zone) = layout.zone(anchor) {
                self.draw_zone(frame, anchor, zone, context)?;
            }
        }
        Ok(())
    }

    fn draw_zone(
        &mut self,
        frame: &mut FrameBuffer,
        anchor: ZoneAnchor,
        zone: &MaskZone,
        context: &TagContext,
    ) -> ShotblastResult<()> {
        if zone.opacity <= 0.0 {
            return Ok(());
        }
        let text = tags::resolve(&zone.template, context);
        if text.trim().is_empty() {
            return Ok(());
        }

        // Font size tracks frame height so masks look the same at every
        // resolution: scale 0.25 on a 1080p frame is ~27px.
        let size_px = zone.scale * frame.height as f32 / 10.0;
        let layout = self
            .engine
            .layout_line(&text, &self.font_bytes, size_px, zone.brush())?;

        let zone_w = frame.width / 3;
        let band_h = (layout.height().ceil() as u32).clamp(1, frame.height);
        if zone_w == 0 {
            return Ok(());
        }

        let zone_w_u16: u16 = zone_w
            .min(u32::from(u16::MAX))
            .try_into()
            .map_err(|_| ShotblastError::validation("mask zone width exceeds u16"))?;
        let band_h_u16: u16 = band_h
            .min(u32::from(u16::MAX))
            .try_into()
            .map_err(|_| ShotblastError::validation("mask zone height exceeds u16"))?;

        // Horizontal placement inside the zone's third of the frame. Overlong
        // text runs off the zone pixmap and is clipped, never wrapped.
        let margin = (size_px * 0.5).round() as i64;
        let text_w = layout.full_width() as i64;
        let x_off = match anchor.column() {
            0 => margin,
            1 => ((zone_w as i64 - text_w) / 2).max(0),
            _ => (zone_w as i64 - text_w - margin).max(0),
        };

        let mut pixmap = vello_cpu::Pixmap::new(zone_w_u16, band_h_u16);
        let mut ctx = vello_cpu::RenderContext::new(zone_w_u16, band_h_u16);
        ctx.set_transform(vello_cpu::kurbo::Affine::translate((x_off as f64, 0.0)));

        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                let brush = run.style().brush;
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    brush.r, brush.g, brush.b, brush.a,
                ));
                // positioned_glyphs() carries the run offset and baseline;
                // the raw glyph list is baseline-relative and would land
                // above the pixmap.
                let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                ctx.glyph_run(&self.font)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
        ctx.flush();
        ctx.render_to_pixmap(&mut pixmap);

        let zone_x = anchor.column() * zone_w;
        let zone_y = if anchor.is_top() {
            (margin as u32).min(frame.height.saturating_sub(band_h))
        } else {
            frame
                .height
                .saturating_sub(band_h + margin as u32)
                .min(frame.height.saturating_sub(band_h))
        };

        blend_overlay(
            frame,
            pixmap.data_as_u8_slice(),
            zone_x,
            zone_y,
            zone_w,
            band_h,
            zone.opacity,
        );
        Ok(())
    }
}

/// Raw bytes of the first font found in the platform's usual locations.
pub fn system_font_bytes() -> ShotblastResult<Vec<u8>> {
    for candidate in SYSTEM_FONT_CANDIDATES {
        let path = std::path::Path::new(candidate);
        if path.is_file() {
            return Ok(std::fs::read(path)
                .with_context(|| format!("read mask font '{}'", path.display()))?);
        }
    }
    Err(ShotblastError::validation(
        "no usable system font found for the shot mask; pass an explicit font file",
    ))
}

const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Source-over blend of a premultiplied RGBA8 overlay region onto the frame,
/// scaled by `opacity`. Pixels the overlay leaves transparent are untouched.
fn blend_overlay(
    frame: &mut FrameBuffer,
    overlay: &[u8],
    x0: u32,
    y0: u32,
    ov_w: u32,
    ov_h: u32,
    opacity: f32,
) {
    let op = ((opacity.clamp(0.0, 1.0) * 255.0).round() as i32).clamp(0, 255) as u16;
    if op == 0 {
        return;
    }

    for row in 0..ov_h {
        let fy = y0 + row;
        if fy >= frame.height {
            break;
        }
        for col in 0..ov_w {
            let fx = x0 + col;
            if fx >= frame.width {
                break;
            }
            let si = ((row * ov_w + col) * 4) as usize;
            let sa = mul_div255(u16::from(overlay[si + 3]), op);
            if sa == 0 {
                continue;
            }
            let inv = 255u16 - sa;
            let di = ((fy as usize * frame.width as usize) + fx as usize) * 4;
            for c in 0..3 {
                let sc = mul_div255(u16::from(overlay[si + c]), op);
                let dc = mul_div255(u16::from(frame.data[di + c]), inv);
                frame.data[di + c] = (sc as u8).saturating_add(dc as u8);
            }
            let da = mul_div255(u16::from(frame.data[di + 3]), inv);
            frame.data[di + 3] = (sa as u8).saturating_add(da as u8);
        }
    }
}

fn mul_div255(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FrameIndex, Resolution};

    fn ctx() -> TagContext {
        TagContext {
            scene: "shot_010".to_string(),
            camera: "shotCam".to_string(),
            focal_length: 50.0,
            timestamp: chrono::NaiveDate::from_ymd_opt(2026, 1, 2)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            username: "ada".to_string(),
            frame: FrameIndex(5),
            fps: 24.0,
        }
    }

    fn test_compositor() -> Option<MaskCompositor> {
        match MaskCompositor::with_system_font() {
            Ok(c) => Some(c),
            Err(_) => {
                eprintln!("skipping: no system font available");
                None
            }
        }
    }

    fn frame_1080() -> FrameBuffer {
        FrameBuffer::new_filled(
            FrameIndex(5),
            Resolution::new(640, 360).unwrap(),
            [40, 40, 50, 255],
        )
    }

    fn zone(template: &str, opacity: f32) -> MaskZone {
        MaskZone {
            template: template.to_string(),
            color: [1.0, 1.0, 1.0],
            scale: 0.25,
            opacity,
        }
    }

    #[test]
    fn opacity_zero_zone_is_pixel_identical() {
        let Some(mut comp) = test_compositor() else {
            return;
        };
        let frame = frame_1080();
        let layout = MaskLayout {
            top_left: Some(zone("Scene: {scene}", 0.0)),
            ..Default::default()
        };
        let out = comp.composite(&frame, &layout, &ctx()).unwrap();
        assert_eq!(out, frame);
    }

    #[test]
    fn empty_layout_is_pixel_identical() {
        let Some(mut comp) = test_compositor() else {
            return;
        };
        let frame = frame_1080();
        let out = comp
            .composite(&frame, &MaskLayout::default(), &ctx())
            .unwrap();
        assert_eq!(out, frame);
    }

    #[test]
    fn visible_zone_changes_pixels_and_preserves_input() {
        let Some(mut comp) = test_compositor() else {
            return;
        };
        let frame = frame_1080();
        let before = frame.clone();
        let layout = MaskLayout {
            top_left: Some(zone("Scene: {scene}", 1.0)),
            ..Default::default()
        };
        let out = comp.composite(&frame, &layout, &ctx()).unwrap();
        assert_eq!(frame, before, "composite must not mutate its input");
        assert_ne!(out, frame, "visible text should change pixels");
    }

    #[test]
    fn digit_only_zone_renders_substantial_coverage() {
        // Digit glyphs sit entirely above the baseline, so any regression to
        // baseline-relative glyph coordinates renders them outside the zone
        // pixmap and changes nothing at all.
        let Some(mut comp) = test_compositor() else {
            return;
        };
        let frame = frame_1080();
        let layout = MaskLayout {
            top_left: Some(zone("{counter}", 1.0)),
            ..Default::default()
        };
        let out = comp.composite(&frame, &layout, &ctx()).unwrap();
        let changed = out
            .data
            .iter()
            .zip(frame.data.iter())
            .filter(|(a, b)| a != b)
            .count();
        assert!(
            changed > 100,
            "expected substantial glyph coverage, got {changed} changed bytes"
        );
    }

    #[test]
    fn bottom_zone_draws_only_in_lower_half() {
        let Some(mut comp) = test_compositor() else {
            return;
        };
        let frame = frame_1080();
        let layout = MaskLayout {
            bottom_right: Some(zone("{counter}", 1.0)),
            ..Default::default()
        };
        let out = comp.composite(&frame, &layout, &ctx()).unwrap();
        let half = (frame.height / 2) as usize * frame.width as usize * 4;
        assert_eq!(out.data[..half], frame.data[..half]);
        assert_ne!(out.data[half..], frame.data[half..]);
    }

    #[test]
    fn layout_validation_rejects_bad_opacity() {
        let layout = MaskLayout {
            top_left: Some(zone("x", 1.5)),
            ..Default::default()
        };
        assert!(layout.validate().is_err());
    }

    #[test]
    fn layout_json_round_trips() {
        let layout = MaskLayout {
            top_left: Some(zone("Scene: {scene}", 0.9)),
            bottom_right: Some(zone("Frame: {counter}", 1.0)),
            ..Default::default()
        };
        let s = serde_json::to_string(&layout).unwrap();
        let de: MaskLayout = serde_json::from_str(&s).unwrap();
        assert_eq!(de, layout);
    }

    #[test]
    fn blend_overlay_full_opacity_replaces_opaque_pixels() {
        let mut frame = frame_1080();
        let overlay = vec![255u8, 0, 0, 255];
        blend_overlay(&mut frame, &overlay, 3, 4, 1, 1, 1.0);
        assert_eq!(frame.pixel(3, 4), Some([255, 0, 0, 255]));
        assert_eq!(frame.pixel(4, 4), Some([40, 40, 50, 255]));
    }

    #[test]
    fn blend_overlay_transparent_pixels_are_untouched() {
        let mut frame = frame_1080();
        let before = frame.clone();
        let overlay = vec![0u8; 4 * 4];
        blend_overlay(&mut frame, &overlay, 0, 0, 2, 2, 1.0);
        assert_eq!(frame, before);
    }
}

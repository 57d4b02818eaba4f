use crate::core::FrameIndex;

/// Zero padding applied to `{counter}` expansions.
pub const COUNTER_PADDING: usize = 4;

/// Immutable per-frame snapshot of everything the tag vocabulary can reference.
///
/// Built once per captured frame from capture-time state; expansion never reads
/// live host state, so every zone of one frame sees identical values.
#[derive(Clone, Debug, PartialEq)]
pub struct TagContext {
    pub scene: String,
    pub camera: String,
    pub focal_length: f64,
    pub timestamp: chrono::NaiveDateTime,
    pub username: String,
    pub frame: FrameIndex,
    pub fps: f64,
}

impl TagContext {
    /// Snapshot with the clock read now; capture adapters call this per frame.
    pub fn at_frame(
        scene: impl Into<String>,
        camera: impl Into<String>,
        focal_length: f64,
        fps: f64,
        frame: FrameIndex,
    ) -> Self {
        Self {
            scene: scene.into(),
            camera: camera.into(),
            focal_length,
            timestamp: chrono::Local::now().naive_local(),
            username: current_username(),
            frame,
            fps,
        }
    }
}

fn current_username() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "user".to_string())
}

/// Strip any DAG path / namespace qualifiers from a camera identifier
/// (`"rig:|group|shotCam"` becomes `"shotCam"`).
pub fn camera_short_name(camera: &str) -> &str {
    let leaf = camera.rsplit('|').next().unwrap_or(camera);
    leaf.rsplit(':').next().unwrap_or(leaf)
}

type TagFn = fn(&TagContext) -> String;

/// The complete dynamic tag vocabulary. Exactly these eight names are
/// recognized; anything else inside braces passes through verbatim.
const TAG_TABLE: [(&str, TagFn); 8] = [
    ("scene", |c| c.scene.clone()),
    ("camera", |c| camera_short_name(&c.camera).to_string()),
    ("focal_length", |c| format!("{:.1}", c.focal_length)),
    ("date", |c| c.timestamp.format("%Y-%m-%d").to_string()),
    ("time", |c| c.timestamp.format("%H:%M").to_string()),
    ("username", |c| c.username.clone()),
    ("counter", |c| {
        format!("{:0width$}", c.frame.0, width = COUNTER_PADDING)
    }),
    ("fps", |c| format_fps(c.fps)),
];

fn format_fps(fps: f64) -> String {
    if (fps - fps.round()).abs() < 1e-6 {
        format!("{}", fps.round() as i64)
    } else {
        format!("{fps:.3}")
    }
}

fn lookup_tag(name: &str) -> Option<TagFn> {
    TAG_TABLE
        .iter()
        .find(|(tag, _)| *tag == name)
        .map(|(_, f)| *f)
}

/// Expand every `{name}` token in `template` against `context`.
///
/// Unknown tokens (and unterminated braces) are left verbatim so custom
/// templates degrade gracefully instead of failing the frame. Deterministic:
/// identical (template, context) pairs always produce identical output.
pub fn resolve(template: &str, context: &TagContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];
        match after_open.find('}') {
            Some(close) => {
                let name = &after_open[..close];
                match lookup_tag(name) {
                    Some(f) => out.push_str(&f(context)),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after_open[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Expand the filename-level tags (`{scene}`, `{camera}`) only. Output names
/// are fixed per request, so the per-frame tags are not legal here.
pub fn expand_filename_tags(template: &str, scene: &str, camera: &str) -> String {
    template
        .replace("{scene}", scene)
        .replace("{camera}", camera_short_name(camera))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> TagContext {
        TagContext {
            scene: "shot_010".to_string(),
            camera: "rig:|group|shotCam".to_string(),
            focal_length: 35.0,
            timestamp: chrono::NaiveDate::from_ymd_opt(2026, 3, 14)
                .unwrap()
                .and_hms_opt(9, 26, 53)
                .unwrap(),
            username: "ada".to_string(),
            frame: FrameIndex(101),
            fps: 24.0,
        }
    }

    #[test]
    fn tag_free_template_is_identity() {
        assert_eq!(resolve("plain text, no tags", &ctx()), "plain text, no tags");
        assert_eq!(resolve("", &ctx()), "");
    }

    #[test]
    fn all_eight_tags_expand() {
        let c = ctx();
        assert_eq!(resolve("{scene}", &c), "shot_010");
        assert_eq!(resolve("{camera}", &c), "shotCam");
        assert_eq!(resolve("{focal_length}", &c), "35.0");
        assert_eq!(resolve("{date}", &c), "2026-03-14");
        assert_eq!(resolve("{time}", &c), "09:26");
        assert_eq!(resolve("{username}", &c), "ada");
        assert_eq!(resolve("{counter}", &c), "0101");
        assert_eq!(resolve("{fps}", &c), "24");
    }

    #[test]
    fn unknown_tags_pass_through_verbatim() {
        assert_eq!(resolve("x {nope} y", &ctx()), "x {nope} y");
        assert_eq!(resolve("{scene} {dept}", &ctx()), "shot_010 {dept}");
    }

    #[test]
    fn unterminated_brace_is_left_alone() {
        assert_eq!(resolve("frame {counter", &ctx()), "frame {counter");
    }

    #[test]
    fn repeated_tags_expand_identically() {
        assert_eq!(resolve("{counter}/{counter}", &ctx()), "0101/0101");
    }

    #[test]
    fn resolution_is_deterministic() {
        let c = ctx();
        let a = resolve("{scene} {camera} {fps} {extra}", &c);
        let b = resolve("{scene} {camera} {fps} {extra}", &c);
        assert_eq!(a, b);
    }

    #[test]
    fn fractional_fps_keeps_decimals() {
        let mut c = ctx();
        c.fps = 23.976;
        assert_eq!(resolve("{fps}", &c), "23.976");
    }

    #[test]
    fn filename_tags_expand_scene_and_camera_only() {
        let name = expand_filename_tags("{scene}_{camera}_{counter}", "shot_010", "ns:camA");
        assert_eq!(name, "shot_010_camA_{counter}");
    }

    #[test]
    fn camera_short_name_strips_path_and_namespace() {
        assert_eq!(camera_short_name("persp"), "persp");
        assert_eq!(camera_short_name("|group|ns:cam"), "cam");
    }
}

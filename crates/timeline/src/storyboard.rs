//! Keyframed storyboards: which effect runs, with which parameters and color
//! mode, at every point of a reel.
//!
//! Per field policies:
//!
//! - `params` is continuous and eased with the storyboard's transition easing.
//! - `composite` holds the value of the last keyframe at or before the query.
//! - `color_mode` snaps to the nearest keyframe, earlier keyframe on ties.
//!
//! Each keyframe resolves its own value first (see [`resolve`]): the
//! keyframe's override, then the storyboard default, then the active effect's
//! built-in default.
use std::fmt;
use std::fs;
use std::path::Path;

use effects::PARAM_COUNT;
use serde::{Deserialize, Serialize};

use crate::easing::Easing;
use crate::engine::{self, resolve, Continuous, Hold, Nearest, Timed, Timeline};
use crate::error::{parse_json, Result, TimelineError, INLINE_SOURCE};

pub const STORYBOARD_VERSION: u32 = 1;

/// Output presets; each caps how long a storyboard may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    Gif,
    Mp4,
    Square,
    Vertical,
}

impl VideoFormat {
    pub const ALL: [VideoFormat; 4] = [
        VideoFormat::Gif,
        VideoFormat::Mp4,
        VideoFormat::Square,
        VideoFormat::Vertical,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "gif" => Some(VideoFormat::Gif),
            "mp4" => Some(VideoFormat::Mp4),
            "square" => Some(VideoFormat::Square),
            "vertical" => Some(VideoFormat::Vertical),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            VideoFormat::Gif => "gif",
            VideoFormat::Mp4 => "mp4",
            VideoFormat::Square => "square",
            VideoFormat::Vertical => "vertical",
        }
    }

    /// Frame size in pixels.
    pub fn size(self) -> (u32, u32) {
        match self {
            VideoFormat::Gif => (480, 270),
            VideoFormat::Mp4 => (1280, 720),
            VideoFormat::Square => (1080, 1080),
            VideoFormat::Vertical => (1080, 1920),
        }
    }

    /// Longest allowed storyboard, in seconds.
    pub fn max_duration(self) -> f32 {
        match self {
            VideoFormat::Gif => 15.0,
            VideoFormat::Mp4 => 120.0,
            VideoFormat::Square | VideoFormat::Vertical => 60.0,
        }
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transitions {
    #[serde(default = "default_easing")]
    pub easing: String,
}

impl Default for Transitions {
    fn default() -> Self {
        Self {
            easing: default_easing(),
        }
    }
}

fn default_easing() -> String {
    Easing::Linear.name().to_string()
}

fn default_version() -> u32 {
    STORYBOARD_VERSION
}

fn default_format() -> String {
    VideoFormat::Mp4.name().to_string()
}

fn default_fps() -> u32 {
    30
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryKeyframe {
    #[serde(default)]
    pub id: String,
    /// Seconds from the start of the reel.
    pub time: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite: Option<String>,
    /// Kept as authored so a wrong length can be reported rather than rejected at parse time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_mode: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl StoryKeyframe {
    pub fn at(time: f32) -> Self {
        Self {
            id: String::new(),
            time,
            composite: None,
            params: None,
            color_mode: None,
            note: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_composite(mut self, composite: impl Into<String>) -> Self {
        self.composite = Some(composite.into());
        self
    }

    pub fn with_params(mut self, params: [f32; PARAM_COUNT]) -> Self {
        self.params = Some(params.to_vec());
        self
    }

    pub fn with_color_mode(mut self, color_mode: i32) -> Self {
        self.color_mode = Some(color_mode);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    fn label(&self, index: usize) -> String {
        if self.id.is_empty() {
            format!("keyframe #{index} (t={})", self.time)
        } else {
            format!("keyframe '{}' (t={})", self.id, self.time)
        }
    }
}

impl Timed for StoryKeyframe {
    fn time(&self) -> f32 {
        self.time
    }
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryboardSample {
    pub time: f32,
    pub composite: String,
    pub params: [f32; PARAM_COUNT],
    pub color_mode: i32,
}

/// On-disk layout; [`Storyboard`] converts through it so keyframes are
/// always sorted after loading.
#[derive(Serialize, Deserialize)]
struct StoryboardFile {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    title: String,
    composite: String,
    #[serde(default = "default_format")]
    format: String,
    #[serde(default = "default_fps")]
    fps: u32,
    #[serde(default)]
    transitions: Transitions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_params: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_color_mode: Option<i32>,
    #[serde(default)]
    keyframes: Vec<StoryKeyframe>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoryboardFile", into = "StoryboardFile")]
pub struct Storyboard {
    pub version: u32,
    pub title: String,
    /// Effect shown wherever a keyframe does not pick one.
    pub composite: String,
    pub format: String,
    pub fps: u32,
    pub default_params: Option<Vec<f32>>,
    pub default_color_mode: Option<i32>,
    easing_name: String,
    timeline: Timeline<StoryKeyframe>,
}

impl From<StoryboardFile> for Storyboard {
    fn from(file: StoryboardFile) -> Self {
        let easing = Easing::from_name(&file.transitions.easing).unwrap_or_default();
        Self {
            version: file.version,
            title: file.title,
            composite: file.composite,
            format: file.format,
            fps: file.fps,
            default_params: file.default_params,
            default_color_mode: file.default_color_mode,
            easing_name: file.transitions.easing,
            timeline: Timeline::new(file.keyframes, easing),
        }
    }
}

impl From<Storyboard> for StoryboardFile {
    fn from(board: Storyboard) -> Self {
        Self {
            version: board.version,
            title: board.title,
            composite: board.composite,
            format: board.format,
            fps: board.fps,
            transitions: Transitions {
                easing: board.easing_name,
            },
            default_params: board.default_params,
            default_color_mode: board.default_color_mode,
            keyframes: board.timeline.into_keyframes(),
        }
    }
}

impl Storyboard {
    pub fn new(composite: impl Into<String>) -> Self {
        Self {
            version: STORYBOARD_VERSION,
            title: String::new(),
            composite: composite.into(),
            format: default_format(),
            fps: default_fps(),
            default_params: None,
            default_color_mode: None,
            easing_name: default_easing(),
            timeline: Timeline::default(),
        }
    }

    pub fn with_keyframes(mut self, keyframes: Vec<StoryKeyframe>) -> Self {
        self.timeline = Timeline::new(keyframes, self.timeline.easing());
        self
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.set_easing(easing.name());
        self
    }

    pub fn from_json(source: &str) -> Result<Self> {
        parse_json(source, Path::new(INLINE_SOURCE))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|err| TimelineError::from_read(path, err))?;
        let board: Self = parse_json(&source, path)?;
        tracing::debug!(
            path = %path.display(),
            keyframes = board.keyframes().len(),
            "loaded storyboard"
        );
        Ok(board)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = self
            .to_json()
            .map_err(|err| TimelineError::InvalidConfig(format!("cannot serialise storyboard: {err}")))?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn keyframes(&self) -> &[StoryKeyframe] {
        self.timeline.keyframes()
    }

    pub fn push_keyframe(&mut self, keyframe: StoryKeyframe) {
        self.timeline.insert(keyframe);
    }

    /// Easing name as authored, which may be unsupported.
    pub fn easing_name(&self) -> &str {
        &self.easing_name
    }

    /// Easing used for sampling; unsupported names sample as linear.
    pub fn easing(&self) -> Easing {
        self.timeline.easing()
    }

    pub fn set_easing(&mut self, name: &str) {
        self.easing_name = name.to_string();
        self.timeline
            .set_easing(Easing::from_name(name).unwrap_or_default());
    }

    pub fn video_format(&self) -> Result<VideoFormat> {
        VideoFormat::from_name(&self.format).ok_or_else(|| {
            TimelineError::InvalidConfig(format!("unknown video format '{}'", self.format))
        })
    }

    /// Time of the last keyframe in seconds.
    pub fn duration(&self) -> f32 {
        self.timeline.duration()
    }

    /// Frames covering `[0, duration]` inclusive at `fps`.
    pub fn frame_count(&self) -> u32 {
        engine::frame_count(self.duration(), self.fps)
    }

    pub fn frame_times(&self) -> Vec<f32> {
        engine::frame_times(self.duration(), self.fps)
    }

    pub fn get_params_at_time(&self, time: f32) -> [f32; PARAM_COUNT] {
        self.timeline
            .sample(time, Continuous, |keyframe| self.keyframe_params(keyframe))
            .unwrap_or_else(|| self.resolve_params(None, &self.composite))
    }

    pub fn get_composite_at_time(&self, time: f32) -> &str {
        self.timeline
            .sample(time, Hold, |keyframe| self.keyframe_composite(keyframe))
            .unwrap_or(&self.composite)
    }

    pub fn get_color_mode_at_time(&self, time: f32) -> i32 {
        self.timeline
            .sample(time, Nearest, |keyframe| self.keyframe_color_mode(keyframe))
            .unwrap_or_else(|| {
                resolve(
                    [self.default_color_mode],
                    effect_defaults(&self.composite).1,
                )
            })
    }

    pub fn sample(&self, time: f32) -> StoryboardSample {
        StoryboardSample {
            time,
            composite: self.get_composite_at_time(time).to_string(),
            params: self.get_params_at_time(time),
            color_mode: self.get_color_mode_at_time(time),
        }
    }

    fn keyframe_composite<'a>(&'a self, keyframe: &'a StoryKeyframe) -> &'a str {
        keyframe.composite.as_deref().unwrap_or(&self.composite)
    }

    fn keyframe_params(&self, keyframe: &StoryKeyframe) -> [f32; PARAM_COUNT] {
        let composite = self.keyframe_composite(keyframe);
        let own = param_tier(keyframe.params.as_deref(), || {
            format!("keyframe at t={}", keyframe.time)
        });
        self.resolve_params(own, composite)
    }

    fn keyframe_color_mode(&self, keyframe: &StoryKeyframe) -> i32 {
        let composite = self.keyframe_composite(keyframe);
        resolve(
            [keyframe.color_mode, self.default_color_mode],
            effect_defaults(composite).1,
        )
    }

    fn resolve_params(
        &self,
        own: Option<[f32; PARAM_COUNT]>,
        composite: &str,
    ) -> [f32; PARAM_COUNT] {
        let storyboard_default =
            param_tier(self.default_params.as_deref(), || "default_params".to_string());
        resolve([own, storyboard_default], effect_defaults(composite).0)
    }

    /// Pre-flight check. Returns every problem found; empty means renderable.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.version != STORYBOARD_VERSION {
            issues.push(format!(
                "unsupported storyboard version {} (expected {STORYBOARD_VERSION})",
                self.version
            ));
        }
        if effects::find_effect(&self.composite).is_none() {
            issues.push(format!("unknown composite '{}'", self.composite));
        }
        if self.fps == 0 {
            issues.push("fps must be greater than zero".to_string());
        }
        if Easing::from_name(&self.easing_name).is_none() {
            issues.push(format!(
                "unsupported easing '{}' (expected one of: {})",
                self.easing_name,
                Easing::ALL.map(Easing::name).join(", ")
            ));
        }
        if let Some(params) = &self.default_params {
            if params.len() != PARAM_COUNT {
                issues.push(format!(
                    "default_params has {} entries; expected {PARAM_COUNT}",
                    params.len()
                ));
            }
        }

        for (index, keyframe) in self.keyframes().iter().enumerate() {
            let label = keyframe.label(index);
            if !keyframe.time.is_finite() || keyframe.time < 0.0 {
                issues.push(format!("{label} has a negative or non-finite time"));
            }
            if let Some(composite) = &keyframe.composite {
                if effects::find_effect(composite).is_none() {
                    issues.push(format!("{label} references unknown composite '{composite}'"));
                }
            }
            if let Some(params) = &keyframe.params {
                if params.len() != PARAM_COUNT {
                    issues.push(format!(
                        "{label} has {} params; expected {PARAM_COUNT}",
                        params.len()
                    ));
                }
            }
        }

        match VideoFormat::from_name(&self.format) {
            Some(format) => {
                let duration = self.duration();
                if duration > format.max_duration() {
                    issues.push(format!(
                        "duration {duration}s exceeds the {format} limit of {}s",
                        format.max_duration()
                    ));
                }
            }
            None => issues.push(format!(
                "unknown video format '{}' (expected one of: {})",
                self.format,
                VideoFormat::ALL.map(VideoFormat::name).join(", ")
            )),
        }

        issues
    }
}

/// An effect's own parameter and color-mode defaults; zeros for unknown names.
fn effect_defaults(composite: &str) -> ([f32; PARAM_COUNT], i32) {
    effects::find_effect(composite).map_or(([0.0; PARAM_COUNT], 0), |effect| {
        (effect.default_params, effect.default_color_mode)
    })
}

/// Accepts a param override only when it has exactly four entries.
fn param_tier(
    values: Option<&[f32]>,
    source: impl FnOnce() -> String,
) -> Option<[f32; PARAM_COUNT]> {
    let values = values?;
    match <[f32; PARAM_COUNT]>::try_from(values) {
        Ok(params) => Some(params),
        Err(_) => {
            tracing::warn!(
                source = %source(),
                len = values.len(),
                "ignoring param override without exactly {PARAM_COUNT} entries"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(keyframes: Vec<StoryKeyframe>) -> Storyboard {
        Storyboard::new("plasma").with_keyframes(keyframes)
    }

    #[test]
    fn linear_params_meet_half_way() {
        let board = board(vec![
            StoryKeyframe::at(0.0).with_params([0.0; 4]),
            StoryKeyframe::at(2.0).with_params([1.0; 4]),
        ]);
        assert_eq!(board.get_params_at_time(1.0), [0.5; 4]);
    }

    #[test]
    fn composite_holds_until_the_next_keyframe() {
        let board = board(vec![
            StoryKeyframe::at(0.0).with_composite("tunnel"),
            StoryKeyframe::at(5.0).with_composite("waves"),
        ]);
        assert_eq!(board.get_composite_at_time(4.999), "tunnel");
        assert_eq!(board.get_composite_at_time(5.0), "waves");
        assert_eq!(board.get_composite_at_time(-1.0), "tunnel");
    }

    #[test]
    fn color_mode_snaps_to_nearest_with_earlier_tie() {
        let board = board(vec![
            StoryKeyframe::at(0.0).with_color_mode(0),
            StoryKeyframe::at(10.0).with_color_mode(1),
        ]);
        assert_eq!(board.get_color_mode_at_time(4.9), 0);
        assert_eq!(board.get_color_mode_at_time(5.0), 0);
        assert_eq!(board.get_color_mode_at_time(5.1), 1);
    }

    #[test]
    fn missing_overrides_fall_back_per_keyframe() {
        let tunnel = effects::effect("tunnel").unwrap();
        let mut board = board(vec![
            StoryKeyframe::at(0.0).with_params([0.1, 0.2, 0.3, 0.4]),
            StoryKeyframe::at(4.0).with_composite("tunnel"),
        ]);
        // No storyboard default: the second keyframe uses its own effect's defaults.
        assert_eq!(board.get_params_at_time(4.0), tunnel.default_params);
        assert_eq!(board.get_color_mode_at_time(4.0), tunnel.default_color_mode);

        board.default_params = Some(vec![9.0, 9.0, 9.0, 9.0]);
        board.default_color_mode = Some(7);
        assert_eq!(board.get_params_at_time(4.0), [9.0; 4]);
        assert_eq!(board.get_params_at_time(0.0), [0.1, 0.2, 0.3, 0.4]);
        assert_eq!(board.get_color_mode_at_time(4.0), 7);
    }

    #[test]
    fn malformed_override_falls_through_to_the_next_tier() {
        let mut keyframe = StoryKeyframe::at(0.0);
        keyframe.params = Some(vec![1.0, 2.0]);
        let mut board = board(vec![keyframe]);
        board.default_params = Some(vec![3.0; 4]);
        assert_eq!(board.get_params_at_time(0.0), [3.0; 4]);
    }

    #[test]
    fn empty_storyboard_uses_defaults() {
        let plasma = effects::effect("plasma").unwrap();
        let board = board(Vec::new());
        let sample = board.sample(3.0);
        assert_eq!(sample.composite, "plasma");
        assert_eq!(sample.params, plasma.default_params);
        assert_eq!(sample.color_mode, plasma.default_color_mode);
        assert_eq!(board.frame_count(), 1);
    }

    #[test]
    fn frame_times_cover_the_closed_range() {
        let mut board = board(vec![StoryKeyframe::at(0.0), StoryKeyframe::at(0.7)]);
        board.fps = 30;
        assert_eq!(board.frame_count(), 22);
        let times = board.frame_times();
        assert_eq!(times.first(), Some(&0.0));
        assert!((times[21] - 0.7).abs() < 1e-5);
    }

    #[test]
    fn validate_reports_every_problem() {
        let mut bad_params = StoryKeyframe::at(1.0).with_id("short");
        bad_params.params = Some(vec![1.0, 2.0, 3.0]);
        let mut board = board(vec![
            StoryKeyframe::at(-1.0).with_id("early"),
            bad_params,
            StoryKeyframe::at(20.0).with_composite("kaleidoscope"),
        ]);
        board.format = "gif".to_string();
        board.set_easing("bounce");

        let issues = board.validate();
        assert_eq!(issues.len(), 5, "{issues:#?}");
        assert!(issues.iter().any(|issue| issue.contains("'early'")));
        assert!(issues.iter().any(|issue| issue.contains("'short'") && issue.contains("3 params")));
        assert!(issues.iter().any(|issue| issue.contains("kaleidoscope")));
        assert!(issues.iter().any(|issue| issue.contains("bounce")));
        assert!(issues.iter().any(|issue| issue.contains("gif limit")));
    }

    #[test]
    fn valid_storyboard_has_no_issues() {
        let board = board(vec![
            StoryKeyframe::at(0.0).with_params([1.0, 0.5, 3.0, 0.0]),
            StoryKeyframe::at(6.0).with_composite("waves"),
        ]);
        assert!(board.validate().is_empty(), "{:?}", board.validate());
    }

    #[test]
    fn parses_the_file_layout() {
        let board = Storyboard::from_json(
            r#"{
                "version": 1,
                "title": "demo",
                "composite": "plasma",
                "format": "square",
                "fps": 24,
                "transitions": { "easing": "smooth" },
                "default_params": [1, 1, 1, 1],
                "default_color_mode": 2,
                "keyframes": [
                    { "id": "end", "time": 4, "params": [0, 0, 0, 0] },
                    { "id": "start", "time": 0, "composite": "tunnel", "note": "intro" }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(board.easing(), Easing::Smooth);
        assert_eq!(board.video_format().unwrap(), VideoFormat::Square);
        let ids: Vec<_> = board.keyframes().iter().map(|k| k.id.as_str()).collect();
        assert_eq!(ids, ["start", "end"]);
        assert_eq!(board.get_params_at_time(2.0), [0.5; 4]);
    }

    #[test]
    fn pushed_keyframes_stay_sorted() {
        let mut board = board(vec![
            StoryKeyframe::at(0.0).with_id("a").with_params([0.0; 4]),
            StoryKeyframe::at(4.0).with_id("c").with_params([1.0; 4]),
        ]);
        board.push_keyframe(StoryKeyframe::at(2.0).with_id("b").with_composite("waves"));
        board.push_keyframe(StoryKeyframe::at(4.0).with_id("d"));

        let ids: Vec<_> = board.keyframes().iter().map(|k| k.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c", "d"]);
        assert_eq!(board.get_composite_at_time(2.5), "waves");
        assert_eq!(board.duration(), 4.0);
    }
}

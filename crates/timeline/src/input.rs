//! Scripted virtual-controller playback for deterministic demo capture.
//!
//! Axes interpolate with the script's easing; the pressed-button set holds
//! from the last keyframe at or before the query time. Queries depend only on
//! the time handed to [`ScriptedController::set_time`], never on a clock.
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::easing::Easing;
use crate::engine::{resolve, Continuous, Hold, Timed, Timeline};
use crate::error::{parse_json, Result, TimelineError, INLINE_SOURCE};

pub const BUTTON_COUNT: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    X,
    Y,
    L,
    R,
    Start,
    Select,
}

impl Button {
    /// Slot order of [`ControllerState::buttons`].
    pub const ALL: [Button; BUTTON_COUNT] = [
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::A,
        Button::B,
        Button::X,
        Button::Y,
        Button::L,
        Button::R,
        Button::Start,
        Button::Select,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|button| button.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Button::Up => "up",
            Button::Down => "down",
            Button::Left => "left",
            Button::Right => "right",
            Button::A => "a",
            Button::B => "b",
            Button::X => "x",
            Button::Y => "y",
            Button::L => "l",
            Button::R => "r",
            Button::Start => "start",
            Button::Select => "select",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Pressed flags in [`Button::ALL`] order.
pub type ButtonSet = [bool; BUTTON_COUNT];

#[derive(Debug, Deserialize)]
struct InputKeyframeFile {
    time: f32,
    #[serde(default)]
    x: Option<f32>,
    #[serde(default)]
    y: Option<f32>,
    #[serde(default)]
    buttons: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct InputScriptFile {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    easing: String,
    #[serde(default)]
    default_x: f32,
    #[serde(default)]
    default_y: f32,
    #[serde(default)]
    keyframes: Vec<InputKeyframeFile>,
}

fn default_version() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputKeyframe {
    pub time: f32,
    pub x: Option<f32>,
    pub y: Option<f32>,
    /// `None` releases every button.
    pub buttons: Option<ButtonSet>,
}

impl InputKeyframe {
    pub fn at(time: f32) -> Self {
        Self {
            time,
            x: None,
            y: None,
            buttons: None,
        }
    }

    pub fn with_axes(mut self, x: f32, y: f32) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    pub fn with_buttons(mut self, pressed: &[Button]) -> Self {
        let mut set = [false; BUTTON_COUNT];
        for button in pressed {
            set[button.index()] = true;
        }
        self.buttons = Some(set);
        self
    }
}

impl Timed for InputKeyframe {
    fn time(&self) -> f32 {
        self.time
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputScript {
    pub version: u32,
    pub default_x: f32,
    pub default_y: f32,
    timeline: Timeline<InputKeyframe>,
}

impl InputScript {
    pub fn new(keyframes: Vec<InputKeyframe>, easing: Easing) -> Self {
        Self {
            version: default_version(),
            default_x: 0.0,
            default_y: 0.0,
            timeline: Timeline::new(keyframes, easing),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|err| TimelineError::from_read(path, err))?;
        let script = Self::from_file(parse_json(&source, path)?)?;
        tracing::debug!(
            path = %path.display(),
            keyframes = script.keyframes().len(),
            "loaded input script"
        );
        Ok(script)
    }

    /// Parses the JSON form. Unknown easing or button names are rejected.
    pub fn from_json(source: &str) -> Result<Self> {
        Self::from_file(parse_json(source, Path::new(INLINE_SOURCE))?)
    }

    fn from_file(file: InputScriptFile) -> Result<Self> {
        let easing = if file.easing.is_empty() {
            Easing::default()
        } else {
            Easing::from_name(&file.easing).ok_or_else(|| {
                TimelineError::InvalidConfig(format!("unsupported easing '{}'", file.easing))
            })?
        };

        let mut keyframes = Vec::with_capacity(file.keyframes.len());
        for keyframe in file.keyframes {
            if !keyframe.time.is_finite() || keyframe.time < 0.0 {
                return Err(TimelineError::InvalidConfig(format!(
                    "input keyframe time {} must be finite and non-negative",
                    keyframe.time
                )));
            }
            let buttons = match keyframe.buttons {
                Some(names) => Some(parse_buttons(&names)?),
                None => None,
            };
            keyframes.push(InputKeyframe {
                time: keyframe.time,
                x: keyframe.x,
                y: keyframe.y,
                buttons,
            });
        }

        Ok(Self {
            version: file.version,
            default_x: file.default_x,
            default_y: file.default_y,
            timeline: Timeline::new(keyframes, easing),
        })
    }

    pub fn keyframes(&self) -> &[InputKeyframe] {
        self.timeline.keyframes()
    }

    pub fn easing(&self) -> Easing {
        self.timeline.easing()
    }

    pub fn duration(&self) -> f32 {
        self.timeline.duration()
    }

    pub fn axes_at(&self, time: f32) -> (f32, f32) {
        let defaults = [self.default_x, self.default_y];
        let [x, y] = self
            .timeline
            .sample(time, Continuous, |keyframe| {
                [
                    resolve([keyframe.x], self.default_x),
                    resolve([keyframe.y], self.default_y),
                ]
            })
            .unwrap_or(defaults);
        (x, y)
    }

    pub fn buttons_at(&self, time: f32) -> ButtonSet {
        self.timeline
            .sample(time, Hold, |keyframe| {
                resolve([keyframe.buttons], [false; BUTTON_COUNT])
            })
            .unwrap_or([false; BUTTON_COUNT])
    }

    pub fn state_at(&self, time: f32) -> ControllerState {
        let (x, y) = self.axes_at(time);
        ControllerState {
            time,
            x,
            y,
            buttons: self.buttons_at(time),
        }
    }
}

fn parse_buttons(names: &[String]) -> Result<ButtonSet> {
    let mut set = [false; BUTTON_COUNT];
    for name in names {
        let button = Button::from_name(name)
            .ok_or_else(|| TimelineError::InvalidConfig(format!("unknown button '{name}'")))?;
        set[button.index()] = true;
    }
    Ok(set)
}

/// Resolved controller state at one query time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControllerState {
    pub time: f32,
    pub x: f32,
    pub y: f32,
    pub buttons: ButtonSet,
}

impl ControllerState {
    pub fn is_pressed(&self, button: Button) -> bool {
        self.buttons[button.index()]
    }

    pub fn pressed(&self) -> impl Iterator<Item = Button> + '_ {
        Button::ALL
            .into_iter()
            .filter(|button| self.is_pressed(*button))
    }
}

/// Replays an [`InputScript`] at caller-supplied times.
#[derive(Debug, Clone)]
pub struct ScriptedController {
    script: InputScript,
    current_time: f32,
}

impl ScriptedController {
    pub fn new(script: InputScript) -> Self {
        Self {
            script,
            current_time: 0.0,
        }
    }

    pub fn script(&self) -> &InputScript {
        &self.script
    }

    pub fn current_time(&self) -> f32 {
        self.current_time
    }

    pub fn set_time(&mut self, time: f32) {
        self.current_time = time;
    }

    pub fn state(&self) -> ControllerState {
        self.script.state_at(self.current_time)
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.script.buttons_at(self.current_time)[button.index()]
    }

    pub fn axes(&self) -> (f32, f32) {
        self.script.axes_at(self.current_time)
    }
}

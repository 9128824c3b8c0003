//! Keyframe timelines that drive reel capture.
//!
//! - [`engine`] holds the generic [`Timeline`] and its sampling policies.
//! - [`storyboard`] resolves effect, parameters, and color mode per frame.
//! - [`input`] replays a scripted virtual controller.
//!
//! Sampling is a pure function of the query time, so two runs over the same
//! frame times produce identical values.

pub mod easing;
pub mod engine;
mod error;
pub mod input;
pub mod storyboard;

pub use easing::Easing;
pub use engine::{
    frame_count, frame_times, resolve, Continuous, Hold, Lerp, Nearest, Policy, Timed, Timeline,
};
pub use error::{Result, TimelineError};
pub use input::{
    Button, ButtonSet, ControllerState, InputKeyframe, InputScript, ScriptedController,
    BUTTON_COUNT,
};
pub use storyboard::{
    StoryKeyframe, Storyboard, StoryboardSample, Transitions, VideoFormat, STORYBOARD_VERSION,
};

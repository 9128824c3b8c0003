use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use timeline::{InputScript, ScriptedController};

#[derive(Debug, Serialize)]
struct ReplayLine {
    frame: u32,
    time: f32,
    x: f32,
    y: f32,
    pressed: Vec<&'static str>,
}

/// Writes one JSON object per frame describing the controller at that time.
///
/// Covers `[0, duration]` inclusive; `duration` defaults to the script's last
/// keyframe.
pub fn write_replay(
    script: InputScript,
    fps: u32,
    duration: Option<Duration>,
    out: &mut impl Write,
) -> Result<u32> {
    let duration = duration.map_or_else(|| script.duration(), |limit| limit.as_secs_f32());
    let times = timeline::frame_times(duration, fps);
    let mut controller = ScriptedController::new(script);

    for (frame, time) in times.iter().enumerate() {
        controller.set_time(*time);
        let state = controller.state();
        let line = ReplayLine {
            frame: frame as u32,
            time: *time,
            x: state.x,
            y: state.y,
            pressed: state.pressed().map(|button| button.name()).collect(),
        };
        serde_json::to_writer(&mut *out, &line)?;
        writeln!(out)?;
    }
    out.flush()?;
    tracing::debug!(frames = times.len(), fps, "replayed input script");
    Ok(times.len() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use timeline::{Button, Easing, InputKeyframe};

    fn script() -> InputScript {
        InputScript::new(
            vec![
                InputKeyframe::at(0.0).with_axes(-1.0, 0.0),
                InputKeyframe::at(1.0)
                    .with_axes(1.0, 0.0)
                    .with_buttons(&[Button::A, Button::Start]),
            ],
            Easing::Linear,
        )
    }

    #[test]
    fn emits_one_line_per_frame() {
        let mut out = Vec::new();
        let frames = write_replay(script(), 4, None, &mut out).unwrap();
        assert_eq!(frames, 5);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[2]["time"], 0.5);
        assert_eq!(lines[2]["x"], 0.0);
        assert_eq!(lines[2]["pressed"], serde_json::json!([]));
        assert_eq!(lines[4]["pressed"], serde_json::json!(["a", "start"]));
    }

    #[test]
    fn explicit_duration_extends_past_last_keyframe() {
        let mut out = Vec::new();
        let frames = write_replay(script(), 2, Some(Duration::from_secs(3)), &mut out).unwrap();
        assert_eq!(frames, 7);
        let last: serde_json::Value =
            serde_json::from_str(String::from_utf8(out).unwrap().lines().last().unwrap()).unwrap();
        assert_eq!(last["x"], 1.0);
    }
}

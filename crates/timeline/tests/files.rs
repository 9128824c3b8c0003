use std::fs;

use tempfile::TempDir;
use timeline::{
    Button, Easing, InputScript, ScriptedController, StoryKeyframe, Storyboard, TimelineError,
};

fn sample_board() -> Storyboard {
    let mut board = Storyboard::new("plasma")
        .with_easing(Easing::Smooth)
        .with_keyframes(vec![
            StoryKeyframe::at(3.0)
                .with_id("outro")
                .with_composite("metaballs")
                .with_color_mode(3),
            StoryKeyframe::at(0.0)
                .with_id("intro")
                .with_params([1.0, 0.5, 3.0, 0.0])
                .with_note("slow open"),
        ]);
    board.title = "round trip".to_string();
    board.format = "gif".to_string();
    board.fps = 12;
    board.default_params = Some(vec![0.5, 0.5, 2.0, 0.25]);
    board
}

#[test]
fn storyboard_round_trips_through_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("board.json");
    let board = sample_board();

    board.save(&path).unwrap();
    let loaded = Storyboard::load(&path).unwrap();

    assert_eq!(loaded, board);
    assert_eq!(loaded.keyframes(), board.keyframes());
    assert_eq!(loaded.easing_name(), "smooth");
    assert_eq!(loaded.frame_times(), board.frame_times());
}

#[test]
fn unsupported_easing_survives_a_round_trip_for_reporting() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("board.json");
    let mut board = sample_board();
    board.set_easing("elastic");
    board.save(&path).unwrap();

    let loaded = Storyboard::load(&path).unwrap();
    assert_eq!(loaded.easing_name(), "elastic");
    assert_eq!(loaded.easing(), Easing::Linear);
    assert!(loaded.validate().iter().any(|issue| issue.contains("elastic")));
}

#[test]
fn missing_files_are_resource_errors() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.json");
    assert!(matches!(
        Storyboard::load(&missing),
        Err(TimelineError::ResourceNotFound { .. })
    ));
    assert!(matches!(
        InputScript::load(&missing),
        Err(TimelineError::ResourceNotFound { .. })
    ));
}

#[test]
fn malformed_json_reports_the_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ \"composite\": ").unwrap();
    match Storyboard::load(&path) {
        Err(TimelineError::Parse { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected parse error, got {other:?}"),
    }
    match InputScript::load(&path) {
        Err(TimelineError::Parse { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn inline_documents_share_the_parse_error_shape() {
    let source = "{ \"keyframes\": [";
    for err in [
        Storyboard::from_json(source).unwrap_err(),
        InputScript::from_json(source).unwrap_err(),
    ] {
        match err {
            TimelineError::Parse { path, .. } => assert_eq!(path.to_str(), Some("<inline>")),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}

#[test]
fn input_script_loads_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("script.json");
    fs::write(
        &path,
        r#"{
            "version": 1,
            "easing": "smooth",
            "keyframes": [
                { "time": 0.0, "x": -1.0, "y": 0.0 },
                { "time": 1.0, "x": 1.0, "y": 0.0, "buttons": ["b"] }
            ]
        }"#,
    )
    .unwrap();

    let mut controller = ScriptedController::new(InputScript::load(&path).unwrap());
    controller.set_time(0.5);
    assert_eq!(controller.axes(), (0.0, 0.0));
    assert!(!controller.is_pressed(Button::B));
    controller.set_time(1.0);
    assert!(controller.is_pressed(Button::B));
}

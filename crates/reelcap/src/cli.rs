use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use effects::{FamilyPreset, PassFamily};

#[derive(Parser, Debug)]
#[command(
    name = "reelcap",
    author,
    version,
    about = "Render keyframed shader storyboards into PNG frame sequences"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render every frame of a storyboard into an output directory.
    Render(RenderArgs),
    /// Check a storyboard and report every problem without rendering.
    Validate(ValidateArgs),
    /// List the registered effects and post-process pass presets.
    Effects(EffectsArgs),
    /// Print scripted controller state for each frame as JSON lines.
    Replay(ReplayArgs),
}

#[derive(Args, Debug, Default)]
pub struct RenderArgs {
    /// Storyboard JSON file; may instead come from `--config`.
    #[arg(value_name = "STORYBOARD")]
    pub storyboard: Option<PathBuf>,

    /// TOML export configuration. Flags given on the command line win.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory receiving `frame_00000.png`, `frame_00001.png`, ...
    #[arg(long, short, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Directory containing `effects/` and `passes/` shaders.
    #[arg(long, value_name = "DIR", env = "REELCAP_SHADER_ROOT")]
    pub shader_root: Option<PathBuf>,

    /// Override the format's frame size (e.g. `640x360`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Override the storyboard's frame rate.
    #[arg(long, value_name = "FPS")]
    pub fps: Option<u32>,

    /// Post-process pass as `family:preset` (e.g. `crt:classic`); repeatable, applied in order.
    #[arg(long = "pass", value_name = "FAMILY:PRESET", value_parser = parse_pass)]
    pub passes: Vec<PassSpec>,

    /// Stop after this many frames.
    #[arg(long, value_name = "N")]
    pub max_frames: Option<u32>,

    /// Stop after this much storyboard time (e.g. `2s`, `1500ms`).
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub limit: Option<Duration>,

    /// Prefer a low-power adapter.
    #[arg(long)]
    pub low_power: bool,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[arg(value_name = "STORYBOARD")]
    pub storyboard: PathBuf,
}

#[derive(Args, Debug)]
pub struct EffectsArgs {
    /// Print the catalogue, including preset uniform values, as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Input script JSON file.
    #[arg(value_name = "SCRIPT")]
    pub script: PathBuf,

    #[arg(long, value_name = "FPS", default_value_t = 30)]
    pub fps: u32,

    /// Replay length; defaults to the script's last keyframe.
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,
}

/// One requested post-process pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassSpec {
    pub family: PassFamily,
    pub preset: String,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(spec: &str) -> Result<(u32, u32), String> {
    let (width, height) = spec
        .trim()
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WxH format, e.g. 1280x720".to_string())?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width '{width}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height '{height}'"))?;
    if width == 0 || height == 0 {
        return Err("frame dimensions must be greater than zero".to_string());
    }
    Ok((width, height))
}

pub fn parse_pass(spec: &str) -> Result<PassSpec, String> {
    let (family, preset) = spec
        .split_once(':')
        .ok_or_else(|| format!("expected FAMILY:PRESET, got '{spec}'"))?;
    let family = PassFamily::from_name(family.trim()).map_err(|err| err.to_string())?;
    let preset = preset.trim();
    FamilyPreset::parse(family, preset).map_err(|err| {
        format!(
            "{err} (expected one of: {})",
            family.preset_names().join(", ")
        )
    })?;
    Ok(PassSpec {
        family,
        preset: preset.to_ascii_lowercase(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_accepts_common_separators() {
        assert_eq!(parse_size("1280x720"), Ok((1280, 720)));
        assert_eq!(parse_size(" 64X32 "), Ok((64, 32)));
        assert_eq!(parse_size("8×8"), Ok((8, 8)));
        assert!(parse_size("0x10").is_err());
        assert!(parse_size("wide").is_err());
    }

    #[test]
    fn pass_specs_name_a_family_and_preset() {
        assert_eq!(
            parse_pass("crt:classic"),
            Ok(PassSpec {
                family: PassFamily::Crt,
                preset: "classic".into()
            })
        );
        assert_eq!(
            parse_pass("Phosphor:LONG").map(|spec| spec.preset),
            Ok("long".to_string())
        );
        assert!(parse_pass("crt").is_err());
        assert!(parse_pass("crt:gameboy").is_err());
        assert!(parse_pass("vhs:worn").is_err());
    }

    #[test]
    fn render_flags_parse() {
        let cli = Cli::try_parse_from([
            "reelcap",
            "render",
            "board.json",
            "--pass",
            "crt:subtle",
            "--pass",
            "phosphor:short",
            "--size",
            "320x180",
            "--limit",
            "2s",
        ])
        .unwrap();
        let Command::Render(args) = cli.command else {
            panic!("expected render command");
        };
        assert_eq!(args.storyboard, Some(PathBuf::from("board.json")));
        assert_eq!(args.passes.len(), 2);
        assert_eq!(args.size, Some((320, 180)));
        assert_eq!(args.limit, Some(Duration::from_secs(2)));
    }
}

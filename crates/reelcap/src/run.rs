use std::collections::BTreeMap;
use std::io::Write;

use anyhow::{Context, Result};
use effects::{EffectConfig, FamilyPreset, PassFamily, PresetUniform, EFFECTS};
use serde::Serialize;
use timeline::InputScript;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, EffectsArgs, RenderArgs, ReplayArgs, ValidateArgs};
use crate::config::{ExportConfig, ExportJob};
use crate::{export, replay};

pub fn run(cli: Cli) -> Result<()> {
    initialise_tracing();
    match cli.command {
        Command::Render(args) => render(args),
        Command::Validate(args) => validate(args),
        Command::Effects(args) => list_effects(args),
        Command::Replay(args) => replay_script(args),
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn render(mut args: RenderArgs) -> Result<()> {
    let config = match args.config.take() {
        Some(path) => ExportConfig::load(&path)
            .with_context(|| format!("failed to load export config {}", path.display()))?,
        None => ExportConfig::default(),
    };
    let job = ExportJob::resolve(args, config)?;
    let frames = export::export(&job)?;
    println!("wrote {frames} frame(s) to {}", job.output_dir.display());
    Ok(())
}

fn validate(args: ValidateArgs) -> Result<()> {
    let storyboard = export::load_storyboard(&args.storyboard)?;
    println!(
        "{} is valid: {} keyframe(s), {:.2}s, {} frame(s) at {} fps",
        args.storyboard.display(),
        storyboard.keyframes().len(),
        storyboard.duration(),
        storyboard.frame_count(),
        storyboard.fps
    );
    Ok(())
}

#[derive(Serialize)]
struct Catalogue {
    effects: &'static [EffectConfig],
    passes: Vec<PassEntry>,
}

#[derive(Serialize)]
struct PassEntry {
    family: PassFamily,
    feedback: bool,
    presets: BTreeMap<&'static str, BTreeMap<&'static str, PresetUniform>>,
}

fn catalogue() -> Result<Catalogue> {
    let mut passes = Vec::new();
    for family in PassFamily::ALL {
        let mut presets = BTreeMap::new();
        for name in family.preset_names() {
            let uniforms = FamilyPreset::parse(family, name)?.uniforms();
            presets.insert(*name, uniforms.into_iter().collect());
        }
        passes.push(PassEntry {
            family,
            feedback: family.is_feedback(),
            presets,
        });
    }
    Ok(Catalogue {
        effects: EFFECTS,
        passes,
    })
}

fn list_effects(args: EffectsArgs) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if args.json {
        serde_json::to_writer_pretty(&mut out, &catalogue()?)?;
        writeln!(out)?;
        return Ok(());
    }
    writeln!(out, "effects:")?;
    for effect in EFFECTS {
        writeln!(
            out,
            "  {:<10} params [{}]  color mode {}  ~{}s",
            effect.name,
            effect.param_names.join(", "),
            effect.default_color_mode,
            effect.recommended_duration
        )?;
    }
    writeln!(out, "passes:")?;
    for family in PassFamily::ALL {
        let feedback = if family.is_feedback() { " (feedback)" } else { "" };
        writeln!(
            out,
            "  {:<10} {}{feedback}",
            family.to_string(),
            family.preset_names().join(", ")
        )?;
    }
    Ok(())
}

fn replay_script(args: ReplayArgs) -> Result<()> {
    let script = InputScript::load(&args.script)
        .with_context(|| format!("failed to load input script {}", args.script.display()))?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    replay::write_replay(script, args.fps, args.duration, &mut out)?;
    Ok(())
}

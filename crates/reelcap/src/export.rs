use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use image::RgbaImage;
use renderer::{
    effect_uniforms, ContextMode, EffectRegistry, GpuPowerPreference, PassChain, RegistryConfig,
    SurfaceConfig,
};
use serde::Serialize;
use timeline::{Storyboard, StoryboardSample};

use crate::config::ExportJob;

/// Written beside the frames so an external encoder knows how to assemble them.
pub const SUMMARY_FILE: &str = "reel.json";

#[derive(Debug, Serialize)]
struct ReelSummary<'a> {
    title: &'a str,
    fps: u32,
    frame_count: u32,
    width: u32,
    height: u32,
    frame_pattern: &'static str,
    passes: Vec<String>,
}

/// Loads and validates a storyboard, printing every issue on failure.
pub fn load_storyboard(path: &Path) -> Result<Storyboard> {
    let storyboard = Storyboard::load(path)
        .with_context(|| format!("failed to load storyboard {}", path.display()))?;
    check_storyboard(&storyboard, path)?;
    Ok(storyboard)
}

fn check_storyboard(storyboard: &Storyboard, path: &Path) -> Result<()> {
    let issues = storyboard.validate();
    if issues.is_empty() {
        return Ok(());
    }
    eprintln!("{} has {} problem(s):", path.display(), issues.len());
    for issue in &issues {
        eprintln!("  - {issue}");
    }
    bail!("storyboard {} failed validation", path.display())
}

/// Renders every frame of `job` into its output directory.
pub fn export(job: &ExportJob) -> Result<u32> {
    let mut storyboard = Storyboard::load(&job.storyboard)
        .with_context(|| format!("failed to load storyboard {}", job.storyboard.display()))?;
    if let Some(fps) = job.fps {
        storyboard.fps = fps;
    }
    check_storyboard(&storyboard, &job.storyboard)?;

    let (width, height) = match job.size {
        Some(size) => size,
        None => storyboard.video_format()?.size(),
    };
    let times = frame_schedule(&storyboard, job);

    std::fs::create_dir_all(&job.output_dir)
        .with_context(|| format!("failed to create {}", job.output_dir.display()))?;

    let power = if job.low_power {
        GpuPowerPreference::Low
    } else {
        GpuPowerPreference::High
    };
    let registry = EffectRegistry::new(RegistryConfig {
        shader_root: job.shader_root.clone(),
        default_size: (width, height),
        power,
    })
    .context("failed to initialise the effect registry")?;
    let mut frames = FrameRenderer::new(registry, job, width, height, power)?;
    for composite in composites(&storyboard) {
        frames
            .prepare(composite)
            .with_context(|| format!("failed to compile effect '{composite}'"))?;
    }

    tracing::info!(
        storyboard = %job.storyboard.display(),
        output = %job.output_dir.display(),
        frames = times.len(),
        fps = storyboard.fps,
        width,
        height,
        passes = job.passes.len(),
        "starting export"
    );
    let started = Instant::now();
    let progress_every = (times.len() / 10).max(1);

    for (index, &time) in times.iter().enumerate() {
        let sample = storyboard.sample(time);
        let pixels = frames
            .render(&sample)
            .with_context(|| format!("frame {index} (t={time:.3}s, {}) failed", sample.composite))?;
        let path = frame_path(&job.output_dir, index);
        let image = RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("frame {index} returned the wrong number of pixels"))?;
        image
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;

        if (index + 1) % progress_every == 0 || index + 1 == times.len() {
            tracing::info!(
                frame = index + 1,
                total = times.len(),
                composite = %sample.composite,
                "rendered frame"
            );
        }
    }

    let frame_count = times.len() as u32;
    let summary = ReelSummary {
        title: &storyboard.title,
        fps: storyboard.fps,
        frame_count,
        width,
        height,
        frame_pattern: "frame_%05d.png",
        passes: job
            .passes
            .iter()
            .map(|pass| format!("{}:{}", pass.family, pass.preset))
            .collect(),
    };
    let summary_path = job.output_dir.join(SUMMARY_FILE);
    std::fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)
        .with_context(|| format!("failed to write {}", summary_path.display()))?;

    tracing::info!(
        frames = frame_count,
        elapsed = ?started.elapsed(),
        "export complete"
    );
    Ok(frame_count)
}

/// Frame times after applying the job's time and count limits.
fn frame_schedule(storyboard: &Storyboard, job: &ExportJob) -> Vec<f32> {
    let mut times = storyboard.frame_times();
    if let Some(limit) = job.limit {
        let limit = limit.as_secs_f32();
        times.retain(|time| *time <= limit);
    }
    if let Some(max_frames) = job.max_frames {
        times.truncate(max_frames as usize);
    }
    if times.is_empty() {
        times.push(0.0);
    }
    times
}

/// Every effect the storyboard can show, base composite first.
fn composites(storyboard: &Storyboard) -> Vec<&str> {
    let mut names = vec![storyboard.composite.as_str()];
    for keyframe in storyboard.keyframes() {
        if let Some(name) = keyframe.composite.as_deref() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

pub fn frame_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("frame_{index:05}.png"))
}

/// Draws storyboard samples either straight from the registry or through a
/// post-process chain sharing the registry's device.
enum FrameRenderer {
    Direct(EffectRegistry),
    Chained {
        registry: EffectRegistry,
        chain: PassChain,
    },
}

impl FrameRenderer {
    fn new(
        registry: EffectRegistry,
        job: &ExportJob,
        width: u32,
        height: u32,
        power: GpuPowerPreference,
    ) -> Result<Self> {
        if job.passes.is_empty() {
            return Ok(Self::Direct(registry));
        }

        let config = SurfaceConfig {
            width,
            height,
            mode: ContextMode::Shared(registry.context()?.clone()),
            power,
        };
        let mut chain = PassChain::init(&config, &job.shader_root)?;
        for pass in &job.passes {
            chain
                .add_family_pass(pass.family, &pass.preset)
                .with_context(|| format!("failed to add {}:{} pass", pass.family, pass.preset))?;
        }
        Ok(Self::Chained { registry, chain })
    }

    /// Compiles `composite` up front so shader errors surface before frame 0.
    fn prepare(&mut self, composite: &str) -> Result<()> {
        match self {
            Self::Direct(registry) => Ok(registry.preload(composite)?),
            Self::Chained { registry, chain } => {
                let effect = registry.effect(composite)?;
                chain
                    .surface_mut()
                    .load_shader(registry.shader_path(effect))?;
                Ok(())
            }
        }
    }

    fn render(&mut self, sample: &StoryboardSample) -> Result<Vec<u8>> {
        match self {
            Self::Direct(registry) => Ok(registry.render_frame(
                &sample.composite,
                sample.time,
                Some(sample.params),
                Some(sample.color_mode),
                None,
                None,
            )?),
            Self::Chained { registry, chain } => {
                let effect = registry.effect(&sample.composite)?;
                let program = chain
                    .surface_mut()
                    .load_shader(registry.shader_path(effect))?;
                let uniforms = effect_uniforms(
                    effect,
                    sample.time,
                    Some(sample.params),
                    Some(sample.color_mode),
                );
                Ok(chain.render(program, &uniforms, sample.time)?)
            }
        }
    }
}

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use effects::PassFamily;
use serde::de::{self, Deserializer};
use serde::Deserialize;

use crate::cli::{parse_pass, parse_size, PassSpec, RenderArgs};

const DEFAULT_OUTPUT_DIR: &str = "frames";
const DEFAULT_SHADER_ROOT: &str = "shaders";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse export configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid export configuration: {0}")]
    Invalid(String),
}

/// On-disk export job description.
///
/// ```toml
/// storyboard = "reels/intro.json"
/// output_dir = "out/intro"
/// size = "640x360"
/// limit = "4s"
///
/// [[passes]]
/// family = "crt"
/// preset = "classic"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    pub storyboard: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub shader_root: Option<PathBuf>,
    pub size: Option<String>,
    pub fps: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub limit: Option<Duration>,
    pub max_frames: Option<u32>,
    #[serde(default)]
    pub low_power: bool,
    #[serde(default)]
    pub passes: Vec<PassEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PassEntry {
    pub family: String,
    pub preset: String,
}

impl ExportConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: ExportConfig = toml::from_str(input)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }
}

/// Fully resolved render job: file values with command-line overrides applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportJob {
    pub storyboard: PathBuf,
    pub output_dir: PathBuf,
    pub shader_root: PathBuf,
    pub size: Option<(u32, u32)>,
    pub fps: Option<u32>,
    pub limit: Option<Duration>,
    pub max_frames: Option<u32>,
    pub low_power: bool,
    pub passes: Vec<PassSpec>,
}

impl ExportJob {
    /// Merges `args` over `config`; flags win, and `--pass` replaces the
    /// configured chain rather than extending it.
    pub fn resolve(args: RenderArgs, config: ExportConfig) -> Result<Self, ConfigError> {
        let storyboard = args.storyboard.or(config.storyboard).ok_or_else(|| {
            ConfigError::Invalid("no storyboard given on the command line or in the config".into())
        })?;

        let size = match (args.size, config.size.as_deref()) {
            (Some(size), _) => Some(size),
            (None, Some(spec)) => Some(
                parse_size(spec).map_err(|err| ConfigError::Invalid(format!("size: {err}")))?,
            ),
            (None, None) => None,
        };

        let fps = args.fps.or(config.fps);
        if fps == Some(0) {
            return Err(ConfigError::Invalid("fps must be greater than zero".into()));
        }

        let passes = if args.passes.is_empty() {
            config
                .passes
                .iter()
                .map(|entry| {
                    parse_pass(&format!("{}:{}", entry.family, entry.preset))
                        .map_err(|err| ConfigError::Invalid(format!("passes: {err}")))
                })
                .collect::<Result<Vec<_>, _>>()?
        } else {
            args.passes
        };
        let feedback = passes
            .iter()
            .filter(|pass| pass.family.is_feedback())
            .count();
        if feedback > 1 {
            return Err(ConfigError::Invalid(format!(
                "at most one {} pass may be chained, got {feedback}",
                PassFamily::Phosphor
            )));
        }

        Ok(Self {
            storyboard,
            output_dir: args
                .output
                .or(config.output_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            shader_root: args
                .shader_root
                .or(config.shader_root)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SHADER_ROOT)),
            size,
            fps,
            limit: args.limit.or(config.limit),
            max_frames: args.max_frames.or(config.max_frames),
            low_power: args.low_power || config.low_power,
            passes,
        })
    }
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }
    }

    deserializer.deserialize_any(Visitor)
}

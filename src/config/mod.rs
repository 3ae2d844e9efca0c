//! Configuration management for seqgen
//!
//! Settings are layered with figment, lowest priority first:
//!
//! 1. the embedded `default-config.toml`
//! 2. a TOML file passed with `--config`
//! 3. `SEQGEN_` environment variables, `__` separating nested keys
//!    (`SEQGEN_SCHEDULER__MAX_THREADS=4`)
//! 4. command-line flags
//!
//! Validation happens once, after merging, so an invalid combination is
//! rejected before any worker thread starts.

use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::parallel::ChunkBounds;

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

/// Fully merged configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeqgenConfig {
    pub scheduler: SchedulerConfig,
    pub chunks: ChunksConfig,
    pub output: OutputConfig,
}

/// Worker pool sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Worker threads (0 = available parallelism)
    pub threads: usize,
    pub min_threads: usize,
    pub max_threads: usize,
    /// Longest process chain one run accepts
    pub max_processes: usize,
}

/// Bounds on units per chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunksConfig {
    pub min_units: usize,
    /// Also the per-thread scratch buffer capacity
    pub max_units: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Symbols per output line
    pub line_width: usize,
}

/// Values supplied on the command line; `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub threads: Option<usize>,
    pub line_width: Option<usize>,
}

#[derive(Serialize)]
struct NestedOverrides {
    scheduler: ThreadsOnly,
    output: LineWidthOnly,
}

#[derive(Serialize)]
struct ThreadsOnly {
    #[serde(skip_serializing_if = "Option::is_none")]
    threads: Option<usize>,
}

#[derive(Serialize)]
struct LineWidthOnly {
    #[serde(skip_serializing_if = "Option::is_none")]
    line_width: Option<usize>,
}

impl Default for SeqgenConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig {
                threads: 0,
                min_threads: 1,
                max_threads: 8,
                max_processes: 4,
            },
            chunks: ChunksConfig {
                min_units: 5124,
                max_units: 62464,
            },
            output: OutputConfig { line_width: 60 },
        }
    }
}

impl SeqgenConfig {
    /// Load defaults, environment and an optional config file, then validate.
    pub fn load(custom_config: Option<&Path>) -> Result<Self> {
        Self::load_with_overrides(custom_config, &CliOverrides::default())
    }

    pub fn load_with_overrides(
        custom_config: Option<&Path>,
        overrides: &CliOverrides,
    ) -> Result<Self> {
        tracing::trace!("CONFIG LOAD: Starting");

        let mut figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG));

        if let Some(path) = custom_config {
            if !path.is_file() {
                bail!("config file not found: {}", path.display());
            }
            figment = figment.merge(Toml::file(path));
        }

        figment = figment
            .merge(Env::prefixed("SEQGEN_").split("__"))
            .merge(Serialized::defaults(NestedOverrides::from_cli(overrides)));

        let config: Self = figment
            .extract()
            .context("failed to read seqgen configuration")?;
        tracing::trace!("CONFIG LOAD: Final config = {:?}", config);

        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the scheduler cannot run with.
    pub fn validate(&self) -> Result<()> {
        let scheduler = &self.scheduler;
        if scheduler.min_threads == 0 {
            bail!("scheduler.min_threads must be at least 1");
        }
        if scheduler.min_threads > scheduler.max_threads {
            bail!(
                "scheduler.min_threads ({}) exceeds scheduler.max_threads ({})",
                scheduler.min_threads,
                scheduler.max_threads
            );
        }
        if scheduler.max_processes == 0 {
            bail!("scheduler.max_processes must be at least 1");
        }
        if self.output.line_width == 0 {
            bail!("output.line_width must be at least 1");
        }
        self.chunk_bounds()
            .validate()
            .context("invalid [chunks] section")?;
        Ok(())
    }

    pub fn chunk_bounds(&self) -> ChunkBounds {
        ChunkBounds {
            min: self.chunks.min_units,
            max: self.chunks.max_units,
        }
    }

    /// Thread count for a run: the configured value, or the number of
    /// available cores when unset, clamped into `[min_threads, max_threads]`.
    pub fn resolved_threads(&self) -> usize {
        let requested = match self.scheduler.threads {
            0 => num_cpus::get(),
            n => n,
        };
        requested.clamp(self.scheduler.min_threads, self.scheduler.max_threads)
    }

    /// Render the configuration as TOML, e.g. for `--show-config`.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize configuration")
    }
}

impl NestedOverrides {
    fn from_cli(overrides: &CliOverrides) -> Self {
        Self {
            scheduler: ThreadsOnly {
                threads: overrides.threads,
            },
            output: LineWidthOnly {
                line_width: overrides.line_width,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_embedded_defaults_match_default_impl() {
        let from_file: SeqgenConfig = Figment::new()
            .merge(Toml::string(DEFAULT_CONFIG))
            .extract()
            .unwrap();
        assert_eq!(from_file, SeqgenConfig::default());
        assert!(from_file.validate().is_ok());
    }

    #[test]
    fn test_config_file_and_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "seqgen.toml",
                r#"
                [scheduler]
                threads = 3

                [output]
                line_width = 70
                "#,
            )?;
            jail.set_env("SEQGEN_CHUNKS__MIN_UNITS", "100");

            let config = SeqgenConfig::load(Some(Path::new("seqgen.toml"))).unwrap();
            assert_eq!(config.scheduler.threads, 3);
            assert_eq!(config.output.line_width, 70);
            assert_eq!(config.chunks.min_units, 100);
            assert_eq!(config.chunks.max_units, 62464);
            Ok(())
        });
    }

    #[test]
    fn test_cli_overrides_win() {
        Jail::expect_with(|jail| {
            jail.set_env("SEQGEN_SCHEDULER__THREADS", "2");
            let overrides = CliOverrides {
                threads: Some(5),
                line_width: None,
            };
            let config = SeqgenConfig::load_with_overrides(None, &overrides).unwrap();
            assert_eq!(config.scheduler.threads, 5);
            assert_eq!(config.output.line_width, 60);
            Ok(())
        });
    }

    #[test]
    fn test_missing_custom_config_is_an_error() {
        let err = SeqgenConfig::load(Some(Path::new("definitely/not/here.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn test_inverted_chunk_bounds_rejected() {
        let mut config = SeqgenConfig::default();
        config.chunks.min_units = 10_000;
        config.chunks.max_units = 100;
        let err = config.validate().unwrap_err();
        assert!(format!("{err:#}").contains("inverted"));
    }

    #[test]
    fn test_invalid_thread_limits_rejected() {
        let mut config = SeqgenConfig::default();
        config.scheduler.min_threads = 9;
        assert!(config.validate().is_err());

        config.scheduler.min_threads = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolved_threads_clamped() {
        let mut config = SeqgenConfig::default();
        config.scheduler.threads = 64;
        assert_eq!(config.resolved_threads(), 8);

        config.scheduler.threads = 0;
        let auto = config.resolved_threads();
        assert!((1..=8).contains(&auto));
    }

    #[test]
    fn test_to_toml_round_trips_through_figment() {
        let mut config = SeqgenConfig::default();
        config.scheduler.threads = 6;
        let rendered = config.to_toml().unwrap();
        let parsed: SeqgenConfig = Figment::new()
            .merge(Toml::string(&rendered))
            .extract()
            .unwrap();
        assert_eq!(parsed, config);
    }
}

use crate::config::{merge::Merge, types::*};
use crate::constants::{DATABASE_URL_ENV, KEEP_ON_FAILURE_ENV};
use anyhow::{Result, anyhow};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub struct ConfigBuilder {
    config_input: ConfigInput,
    base_dir: PathBuf,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config_input: ConfigInput::default(),
            base_dir: PathBuf::from("."),
        }
    }

    pub fn with_file(mut self, file_input: ConfigInput) -> Self {
        self.config_input = self.config_input.merge(file_input);
        self
    }

    pub fn with_cli_args(mut self, cli_input: ConfigInput) -> Self {
        self.config_input = self.config_input.merge(cli_input);
        self
    }

    /// Directory that relative script paths are resolved against
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn resolve(self) -> Result<Config> {
        let defaults = Config::default();

        Ok(Config {
            target: self.resolve_target(),
            container: self.resolve_container(&defaults.container)?,
            probes: self.resolve_probes(&defaults.probes)?,
            output: Output {
                format: self
                    .config_input
                    .output
                    .as_ref()
                    .and_then(|o| o.format)
                    .unwrap_or(defaults.output.format),
            },
        })
    }

    fn resolve_target(&self) -> Target {
        self.config_input
            .target
            .as_ref()
            .and_then(|t| t.database_url.as_ref())
            .cloned()
            .or_else(|| std::env::var(DATABASE_URL_ENV).ok())
            .filter(|url| !url.trim().is_empty())
            .map(Target::Url)
            .unwrap_or(Target::Container)
    }

    fn resolve_container(&self, defaults: &ContainerConfig) -> Result<ContainerConfig> {
        let input = self.config_input.container.as_ref();

        let ready_attempts = input
            .and_then(|c| c.ready_attempts)
            .unwrap_or(defaults.ready_attempts);
        if ready_attempts == 0 {
            return Err(anyhow!("container.ready_attempts must be at least 1"));
        }

        let keep_on_failure = input
            .and_then(|c| c.keep_on_failure)
            .map(Ok)
            .or_else(|| {
                std::env::var(KEEP_ON_FAILURE_ENV)
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| parse_bool_env(KEEP_ON_FAILURE_ENV, &v))
            })
            .transpose()?
            .unwrap_or(defaults.keep_on_failure);

        Ok(ContainerConfig {
            version: input.and_then(|c| c.version.clone()),
            image: input
                .and_then(|c| c.image.as_ref())
                .cloned()
                .unwrap_or_else(|| defaults.image.clone()),
            environment: input
                .and_then(|c| c.environment.as_ref())
                .cloned()
                .unwrap_or_else(|| defaults.environment.clone()),
            container_name: input.and_then(|c| c.container_name.clone()),
            auto_cleanup: input
                .and_then(|c| c.auto_cleanup)
                .unwrap_or(defaults.auto_cleanup),
            keep_on_failure,
            reuse: input.and_then(|c| c.reuse).unwrap_or(defaults.reuse),
            ready_attempts,
            ready_interval_ms: input
                .and_then(|c| c.ready_interval_ms)
                .unwrap_or(defaults.ready_interval_ms),
        })
    }

    fn resolve_probes(&self, defaults: &Probes) -> Result<Probes> {
        let input = self.config_input.probes.as_ref();

        let query_timeout_secs = input
            .and_then(|p| p.query_timeout_secs)
            .unwrap_or(defaults.query_timeout_secs);
        if query_timeout_secs == 0 {
            return Err(anyhow!("probes.query_timeout_secs must be at least 1"));
        }

        let setup_scripts = input
            .and_then(|p| p.setup_scripts.as_ref())
            .map(|scripts| scripts.iter().map(|s| self.resolve_path(s)).collect())
            .unwrap_or_else(|| defaults.setup_scripts.clone());

        let custom = match input.and_then(|p| p.custom.as_ref()) {
            Some(custom) => self.resolve_custom_probes(custom)?,
            None => defaults.custom.clone(),
        };

        Ok(Probes {
            include: input
                .and_then(|p| p.include.as_ref())
                .cloned()
                .unwrap_or_else(|| defaults.include.clone()),
            exclude: input
                .and_then(|p| p.exclude.as_ref())
                .cloned()
                .unwrap_or_else(|| defaults.exclude.clone()),
            setup_scripts,
            fail_fast: input
                .and_then(|p| p.fail_fast)
                .unwrap_or(defaults.fail_fast),
            query_timeout_secs,
            custom,
        })
    }

    fn resolve_custom_probes(&self, inputs: &[CustomProbeInput]) -> Result<Vec<CustomProbe>> {
        let mut seen = HashSet::new();
        let mut probes = Vec::with_capacity(inputs.len());

        for input in inputs {
            let name = input.name.trim();
            if name.is_empty() {
                return Err(anyhow!("Custom probe names must not be empty"));
            }
            if !seen.insert(name.to_string()) {
                return Err(anyhow!("Custom probe '{}' is defined more than once", name));
            }
            if input.checks.is_empty() {
                return Err(anyhow!("Custom probe '{}' has no checks", name));
            }

            probes.push(CustomProbe {
                name: name.to_string(),
                description: input.description.clone().unwrap_or_default(),
                init_script: input.init_script.as_deref().map(|s| self.resolve_path(s)),
                checks: input.checks.clone(),
            });
        }

        Ok(probes)
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

/// Parse a boolean environment variable (`1/true/yes/on`, `0/false/no/off`)
pub(crate) fn parse_bool_env(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!(
            "{} must be a boolean (true/false, 1/0, yes/no, on/off), got '{}'",
            name,
            other
        )),
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

use clap::Args;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::probe::Check;

/// Raw configuration input - all fields Optional for merging
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigInput {
    pub target: Option<TargetInput>,
    pub container: Option<ContainerInput>,
    pub probes: Option<ProbesInput>,
    pub output: Option<OutputInput>,
}

/// Resolved configuration with all defaults applied
#[derive(Debug, Clone, Default, Serialize)]
pub struct Config {
    pub target: Target,
    pub container: ContainerConfig,
    pub probes: Probes,
    pub output: Output,
}

// Target configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TargetInput {
    pub database_url: Option<String>,
}

/// Where probe databases come from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Disposable Docker containers
    #[default]
    Container,
    /// Scratch databases on an existing server
    Url(String),
}

// Container configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ContainerInput {
    pub version: Option<String>,
    pub image: Option<String>,
    pub environment: Option<HashMap<String, String>>,
    pub container_name: Option<String>,
    pub auto_cleanup: Option<bool>,
    pub keep_on_failure: Option<bool>,
    pub reuse: Option<bool>,
    pub ready_attempts: Option<u32>,
    pub ready_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContainerConfig {
    pub version: Option<String>,
    pub image: String,
    pub environment: HashMap<String, String>,
    pub container_name: Option<String>,
    pub auto_cleanup: bool,
    pub keep_on_failure: bool,
    /// Share one container across all probes, isolating them by database
    pub reuse: bool,
    pub ready_attempts: u32,
    pub ready_interval_ms: u64,
}

impl ContainerConfig {
    /// Resolve the Docker image from version or use the image directly
    /// Precedence: explicit image > version > default
    pub fn resolved_image(&self) -> String {
        if !self.image.is_empty() && self.image != crate::constants::DEFAULT_IMAGE {
            return self.image.clone();
        }

        if let Some(version) = &self.version {
            return format!("postgres:{}", version);
        }

        self.image.clone()
    }
}

// Probe selection and execution
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProbesInput {
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub setup_scripts: Option<Vec<String>>,
    pub fail_fast: Option<bool>,
    pub query_timeout_secs: Option<u64>,
    pub custom: Option<Vec<CustomProbeInput>>,
}

/// A probe declared in pgprobe.yaml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CustomProbeInput {
    pub name: String,
    pub description: Option<String>,
    pub init_script: Option<String>,
    #[serde(default)]
    pub checks: Vec<Check>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Probes {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub setup_scripts: Vec<PathBuf>,
    pub fail_fast: bool,
    pub query_timeout_secs: u64,
    pub custom: Vec<CustomProbe>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomProbe {
    pub name: String,
    pub description: String,
    pub init_script: Option<PathBuf>,
    pub checks: Vec<Check>,
}

// Output configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputInput {
    pub format: Option<OutputFormat>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Output {
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Human,
    /// JSON for CI and scripting
    Json,
}

// CLI argument groups for command-specific options
#[derive(Debug, Clone, Default, Args)]
pub struct TargetArgs {
    #[arg(long, help = "Run against an existing server instead of Docker")]
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ContainerArgs {
    #[arg(long, help = "PostgreSQL Docker image (e.g. postgres:16-alpine)")]
    pub image: Option<String>,

    #[arg(long = "pg-version", help = "PostgreSQL version, expands to postgres:<version>")]
    pub pg_version: Option<String>,

    #[arg(long, help = "Share one container across all probes")]
    pub reuse_container: bool,

    #[arg(long, help = "Keep containers that fail to start for debugging")]
    pub keep_on_failure: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ProbeFilterArgs {
    #[arg(long = "probe", help = "Run only probes matching these glob patterns")]
    pub probes: Option<Vec<String>>,

    #[arg(long, help = "Skip probes matching these glob patterns")]
    pub exclude: Option<Vec<String>>,
}

// Conversion functions from CLI args to config input
impl From<TargetArgs> for TargetInput {
    fn from(args: TargetArgs) -> Self {
        Self {
            database_url: args.database_url,
        }
    }
}

impl From<ContainerArgs> for ContainerInput {
    fn from(args: ContainerArgs) -> Self {
        Self {
            version: args.pg_version,
            image: args.image,
            reuse: args.reuse_container.then_some(true),
            keep_on_failure: args.keep_on_failure.then_some(true),
            ..Default::default()
        }
    }
}

impl From<ProbeFilterArgs> for ProbesInput {
    fn from(args: ProbeFilterArgs) -> Self {
        Self {
            include: args.probes,
            exclude: args.exclude,
            ..Default::default()
        }
    }
}

use anyhow::Result;
use tracing::info;

use crate::config::{Config, OutputFormat};
use crate::probe::{ProbeRunner, load_probes, select_probes};
use crate::report::{ProgressReporter, format_report};

/// Run the selected probes and print the report
///
/// Returns whether every probe passed; the caller decides the exit code so
/// that containers are cleaned up first.
pub async fn cmd_run(config: &Config) -> Result<bool> {
    let probes = select_probes(load_probes(config)?, config)?;
    info!(
        "Running {} probe(s): {}",
        probes.len(),
        probes
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let human = config.output.format == OutputFormat::Human;
    let progress = ProgressReporter::new(probes.len(), human);

    let mut runner = ProbeRunner::new(config).with_progress(progress);
    let report = runner.run(&probes).await?;

    if human {
        println!();
    }
    println!("{}", format_report(&report, config.output.format)?);

    Ok(report.succeeded())
}

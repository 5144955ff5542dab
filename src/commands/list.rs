use anyhow::Result;
use console::style;
use serde::Serialize;

use crate::config::{Config, OutputFormat, ProbeFilter};
use crate::probe::{Probe, load_probes};

#[derive(Debug, Serialize)]
struct ProbeListing<'a> {
    name: &'a str,
    description: &'a str,
    checks: usize,
    selected: bool,
}

/// List known probes and whether the current filters select them
pub fn cmd_list(config: &Config) -> Result<()> {
    let probes = load_probes(config)?;
    println!("{}", render_list(&probes, config)?);
    Ok(())
}

fn render_list(probes: &[Probe], config: &Config) -> Result<String> {
    let filter = ProbeFilter::new(&config.probes);
    let listings: Vec<ProbeListing> = probes
        .iter()
        .map(|p| ProbeListing {
            name: &p.name,
            description: &p.description,
            checks: p.checks.len(),
            selected: filter.should_run(&p.name),
        })
        .collect();

    if config.output.format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(&listings)?);
    }

    let width = listings.iter().map(|l| l.name.len()).max().unwrap_or(0);
    let lines: Vec<String> = listings
        .iter()
        .map(|l| {
            let marker = if l.selected {
                style("●").green()
            } else {
                style("○").dim()
            };
            format!(
                "{} {:<width$}  {} {}",
                marker,
                l.name,
                l.description,
                style(format!("({} checks)", l.checks)).dim(),
                width = width
            )
        })
        .collect();

    Ok(lines.join("\n"))
}

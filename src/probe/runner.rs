use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::Connection;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::Probe;
use super::check::{apply_statement_timeout, run_check};
use crate::config::{Config, Target};
use crate::constants::SCRATCH_DATABASE_PREFIX;
use crate::db::{InitScript, ScratchDatabase, connect_with_retry, mask_url_password};
use crate::docker::{DockerManager, PostgresContainer, container_name_for};
use crate::report::{CheckOutcome, ProbeReport, ProgressReporter, RunReport};

/// Where each probe's database is provisioned from
enum Server {
    /// A fresh container per probe
    PerProbe(DockerManager),
    /// One container, a scratch database per probe
    Shared(PostgresContainer),
    /// An existing server, a scratch database per probe
    Existing(String),
}

/// The database a single probe runs in
enum Sandbox {
    Container(PostgresContainer),
    Scratch(ScratchDatabase),
}

impl Sandbox {
    fn url(&self) -> String {
        match self {
            Sandbox::Container(container) => container.connection_string(),
            Sandbox::Scratch(db) => db.url(),
        }
    }

    async fn teardown(self) {
        match self {
            Sandbox::Container(container) => {
                let name = container.info().name.clone();
                if let Err(e) = container.shutdown().await {
                    warn!("Failed to remove container {}: {}", name, e);
                }
            }
            Sandbox::Scratch(db) => db.drop_database().await,
        }
    }
}

/// Runs probes, each against its own fresh database
pub struct ProbeRunner<'a> {
    config: &'a Config,
    progress: ProgressReporter,
}

impl<'a> ProbeRunner<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            progress: ProgressReporter::silent(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// What the run is reported against: the image or the masked server URL
    pub fn target_label(&self) -> String {
        match &self.config.target {
            Target::Container => self.config.container.resolved_image(),
            Target::Url(url) => mask_url_password(url),
        }
    }

    /// Run every probe in order and collect the results
    ///
    /// Per-probe failures (provisioning, connection, scripts) are recorded in
    /// the report; only problems that prevent any probe from running are
    /// returned as errors.
    pub async fn run(&mut self, probes: &[Probe]) -> Result<RunReport> {
        let started_at = Utc::now();
        let start = Instant::now();

        let setup_scripts = self
            .config
            .probes
            .setup_scripts
            .iter()
            .map(|path| InitScript::from_file(path))
            .collect::<Result<Vec<_>>>()?;

        let mut reports = Vec::with_capacity(probes.len());

        if !probes.is_empty() {
            let server = self.connect_server().await?;
            let mut stopped = false;

            for probe in probes {
                if stopped {
                    let report = ProbeReport::skipped(&probe.name, &probe.description);
                    self.progress.skip_probe(&report);
                    reports.push(report);
                    continue;
                }

                self.progress.start_probe(&probe.name);
                let report = self.run_one(&server, probe, &setup_scripts).await;
                self.progress.finish_probe(&report);

                if self.config.probes.fail_fast && !report.status.is_success() {
                    info!("Stopping after probe '{}' (fail-fast)", probe.name);
                    stopped = true;
                }
                reports.push(report);
            }

            if let Server::Shared(container) = server
                && let Err(e) = container.shutdown().await
            {
                warn!("Failed to remove shared container: {}", e);
            }
        }

        Ok(RunReport::new(
            self.target_label(),
            started_at,
            start.elapsed().as_millis() as u64,
            reports,
        ))
    }

    async fn connect_server(&self) -> Result<Server> {
        match &self.config.target {
            Target::Url(url) => Ok(Server::Existing(url.clone())),
            Target::Container => {
                let manager = DockerManager::new().await?;
                if !self.config.container.reuse {
                    return Ok(Server::PerProbe(manager));
                }

                self.progress
                    .provisioning(&self.config.container.resolved_image());
                let name = container_name_for(&self.config.container, None);
                let container = manager
                    .start_postgres(&self.config.container, &name)
                    .await
                    .context("Failed to start shared probe container")?;
                Ok(Server::Shared(container))
            }
        }
    }

    async fn provision(&self, server: &Server, probe: &Probe) -> Result<Sandbox> {
        match server {
            Server::PerProbe(manager) => {
                self.progress
                    .provisioning(&self.config.container.resolved_image());
                let name = container_name_for(&self.config.container, Some(&probe.name));
                let container = manager.start_postgres(&self.config.container, &name).await?;
                Ok(Sandbox::Container(container))
            }
            Server::Shared(container) => {
                let db =
                    ScratchDatabase::create(&container.connection_string(), SCRATCH_DATABASE_PREFIX)
                        .await?;
                Ok(Sandbox::Scratch(db))
            }
            Server::Existing(url) => {
                let db = ScratchDatabase::create(url, SCRATCH_DATABASE_PREFIX).await?;
                Ok(Sandbox::Scratch(db))
            }
        }
    }

    async fn run_one(
        &self,
        server: &Server,
        probe: &Probe,
        setup_scripts: &[InitScript],
    ) -> ProbeReport {
        let start = Instant::now();
        let elapsed = || start.elapsed().as_millis() as u64;

        let sandbox = match self.provision(server, probe).await {
            Ok(sandbox) => sandbox,
            Err(e) => {
                debug!("Provisioning for probe '{}' failed: {:#}", probe.name, e);
                return ProbeReport::errored(&probe.name, &probe.description, &e, elapsed());
            }
        };

        let result = self.execute(&sandbox.url(), probe, setup_scripts).await;
        sandbox.teardown().await;

        match result {
            Ok(checks) => ProbeReport::completed(&probe.name, &probe.description, checks, elapsed()),
            Err(e) => ProbeReport::errored(&probe.name, &probe.description, &e, elapsed()),
        }
    }

    async fn execute(
        &self,
        url: &str,
        probe: &Probe,
        setup_scripts: &[InitScript],
    ) -> Result<Vec<CheckOutcome>> {
        let mut conn = connect_with_retry(url).await?;
        let timeout = Duration::from_secs(self.config.probes.query_timeout_secs);

        let result = async {
            for script in setup_scripts {
                script.execute(&mut conn).await?;
            }
            if let Some(init) = &probe.init_script {
                init.execute(&mut conn).await?;
            }
            apply_statement_timeout(&mut conn, timeout)
                .await
                .context("Failed to set statement_timeout")?;

            let mut outcomes = Vec::with_capacity(probe.checks.len());
            for check in &probe.checks {
                let outcome = run_check(&mut conn, check, timeout).await;
                if !outcome.passed {
                    debug!(
                        "Check failed in probe '{}': {}",
                        probe.name,
                        outcome.message.as_deref().unwrap_or_default()
                    );
                }
                outcomes.push(outcome);
            }
            Ok(outcomes)
        }
        .await;

        if let Err(e) = conn.close().await {
            debug!("Error closing connection: {}", e);
        }

        result
    }
}

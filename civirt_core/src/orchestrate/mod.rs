/*
* Rollback coordinator
* Runs one operation over every vm of a batch, each vm on its own.
*/
mod report;
pub use report::{BatchReport, Cleanup, Outcome, Reached, VmReport};

use crate::config::{compile, compile_instance, ConfigSource, InstanceSpec};
use crate::pipeline::Provisioner;
use futures::stream::{self, StreamExt};
use owo_colors::OwoColorize;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;
use strum::Display;

// Error handling
use civirt_error::{CivirtError, LibError};
use log::{info, warn};
use miette::Result;

/// The closed set of batch operations.
#[derive(Debug, Display, Clone, Copy, Eq, PartialEq)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    Create { keep_on_failure: bool },
    Delete,
}

pub struct Orchestrator {
    provisioner: Arc<Provisioner>,
    source: Arc<dyn ConfigSource>,
    /// Vms processed at the same time.
    jobs: usize,
}

impl Orchestrator {
    pub fn new(provisioner: Provisioner, source: Arc<dyn ConfigSource>, jobs: usize) -> Self {
        Self {
            provisioner: Arc::new(provisioner),
            source,
            jobs: jobs.max(1),
        }
    }

    /// Provision every vm of a configuration file.
    pub async fn provision(
        &self,
        config: &Path,
        keep_on_failure: bool,
    ) -> Result<BatchReport, CivirtError> {
        let specs = compile(&self.source.load(config)?)?;
        Ok(self
            .run_batch(specs, Operation::Create { keep_on_failure })
            .await)
    }

    /// Deprovision every vm of a configuration file.
    pub async fn deprovision(&self, config: &Path) -> Result<BatchReport, CivirtError> {
        let specs = compile(&self.source.load(config)?)?;
        Ok(self.run_batch(specs, Operation::Delete).await)
    }

    /// Delete then create, with fresh instance ids.
    pub async fn recreate(
        &self,
        config: &Path,
        keep_on_failure: bool,
    ) -> Result<Vec<BatchReport>, CivirtError> {
        let document = self.source.load(config)?;
        let deleted = self.run_batch(compile(&document)?, Operation::Delete).await;
        let created = self
            .run_batch(compile(&document)?, Operation::Create { keep_on_failure })
            .await;
        Ok(vec![deleted, created])
    }

    /// Provision a single vm built from the `[common]` settings.
    pub async fn provision_instance(
        &self,
        config: &Path,
        fqdn: &str,
        address: Ipv4Addr,
        keep_on_failure: bool,
    ) -> Result<BatchReport, CivirtError> {
        let document = self.source.load(config)?;
        let spec = compile_instance(&document, fqdn, &address.to_string())?;
        Ok(self
            .run_batch(vec![spec], Operation::Create { keep_on_failure })
            .await)
    }

    /// Deprovision a single vm built from the `[common]` settings.
    /// The address plays no part in teardown.
    pub async fn deprovision_instance(
        &self,
        config: &Path,
        fqdn: &str,
        address: Option<Ipv4Addr>,
    ) -> Result<BatchReport, CivirtError> {
        let document = self.source.load(config)?;
        let address = address.unwrap_or(Ipv4Addr::UNSPECIFIED);
        let spec = compile_instance(&document, fqdn, &address.to_string())?;
        Ok(self.run_batch(vec![spec], Operation::Delete).await)
    }

    /*
     * Run the operation on at most `jobs` vms at a time.
     * Reports come back in batch order.
     */
    pub async fn run_batch(&self, specs: Vec<InstanceSpec>, operation: Operation) -> BatchReport {
        info!(
            "{} {} {} vm(s), {} at a time.",
            "[batch]".yellow(),
            operation,
            specs.len(),
            self.jobs
        );
        let vms = stream::iter(specs)
            .map(|spec| {
                let provisioner = self.provisioner.clone();
                async move {
                    let fqdn = spec.fqdn.clone();
                    let res = tokio::task::spawn_blocking(move || {
                        run_one(&provisioner, &spec, operation)
                    })
                    .await;
                    let outcome = match res {
                        Ok(v) => v,
                        Err(e) => {
                            let message = format!("Worker for {fqdn} did not complete");
                            Outcome::Failed {
                                reached: Reached::Unknown,
                                error: LibError::builder()
                                    .msg(&message)
                                    .help(&e.to_string())
                                    .build()
                                    .into(),
                                cleanup: Cleanup::Kept,
                            }
                        }
                    };
                    VmReport { fqdn, outcome }
                }
            })
            .buffered(self.jobs)
            .collect::<Vec<_>>()
            .await;
        BatchReport { operation, vms }
    }
}

/// Run one operation on one vm, rolling back a failed creation when asked.
pub fn run_one(provisioner: &Provisioner, spec: &InstanceSpec, operation: Operation) -> Outcome {
    match operation {
        Operation::Create { keep_on_failure } => match provisioner.provision(spec) {
            Ok(()) => Outcome::Provisioned,
            Err(halted) => {
                let cleanup = if halted.error.is_conflict() {
                    Cleanup::NotNeeded
                } else if keep_on_failure {
                    warn!(
                        "{} {} -- keeping partial state for inspection.",
                        "[rollback]".yellow(),
                        spec.fqdn
                    );
                    Cleanup::Kept
                } else {
                    info!("{} {} -- rolling back.", "[rollback]".yellow(), spec.fqdn);
                    match provisioner.deprovision(spec) {
                        Ok(steps) => Cleanup::RolledBack(steps),
                        Err(e) => Cleanup::RollbackFailed(e),
                    }
                };
                Outcome::Failed {
                    reached: Reached::Provision(halted.reached),
                    error: halted.error,
                    cleanup,
                }
            }
        },
        Operation::Delete => match provisioner.deprovision(spec) {
            Ok(steps) => Outcome::Removed(steps),
            Err(halted) => Outcome::Failed {
                reached: Reached::Deprovision(halted.reached),
                error: halted.error,
                cleanup: Cleanup::NotNeeded,
            },
        },
    }
}

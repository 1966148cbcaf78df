/*
* Per vm pipelines.
* Provisioning is strict, deprovisioning is lenient about absence.
*/
mod create;
mod delete;

use crate::cloud_init::ImageWriter;
use crate::disk::DiskTool;
use crate::hosts::NameRegistry;
use crate::hypervisor::{HypervisorDriver, Removal};
use bon::bon;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use strum::Display;

// Error handling
use civirt_error::CivirtError;

#[derive(Debug, Display, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[strum(serialize_all = "snake_case")]
pub enum ProvisionState {
    Unstarted,
    DiskCreated,
    DomainDefined,
    NetworkDerived,
    PayloadAttached,
    Running,
}

#[derive(Debug, Display, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[strum(serialize_all = "snake_case")]
pub enum DeprovisionState {
    Running,
    DomainStopped,
    DomainUndefined,
    DiskRemoved,
    PayloadRemoved,
    RegistryCleared,
    Removed,
}

/// Completed teardown steps, in order.
pub type Steps = Vec<(DeprovisionState, Removal)>;

/// A pipeline stopped by a failed transition,
/// with the last state it completed.
#[derive(Debug)]
pub struct Halted<S> {
    pub reached: S,
    pub error: CivirtError,
}
impl<S: fmt::Display> fmt::Display for Halted<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "halted after {}: {}", self.reached, self.error)
    }
}

/*
* Runs the pipelines of a single vm against injected collaborators.
* Shared between the workers of a batch.
*/
pub struct Provisioner {
    disk: Arc<dyn DiskTool>,
    hypervisor: Arc<dyn HypervisorDriver>,
    writer: Arc<dyn ImageWriter>,
    registry: Arc<dyn NameRegistry>,
    /// Held while an output directory may be created or removed,
    /// until the vm has put its disk in it.
    directories: Mutex<()>,
}

#[bon]
impl Provisioner {
    #[builder]
    pub fn new(
        disk: Arc<dyn DiskTool>,
        hypervisor: Arc<dyn HypervisorDriver>,
        writer: Arc<dyn ImageWriter>,
        registry: Arc<dyn NameRegistry>,
    ) -> Self {
        Self {
            disk,
            hypervisor,
            writer,
            registry,
            directories: Mutex::new(()),
        }
    }
}

impl Provisioner {
    fn lock_directories(&self) -> MutexGuard<'_, ()> {
        self.directories.lock().unwrap_or_else(|e| e.into_inner())
    }
}

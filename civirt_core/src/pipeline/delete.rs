use super::{DeprovisionState, Halted, Provisioner, Steps};
use crate::config::InstanceSpec;
use crate::hypervisor::Removal;
use owo_colors::OwoColorize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

// Error handling
use civirt_error::CivirtError;
use log::{error, info, warn};
use miette::Result;

impl Provisioner {
    /*
     * Tear down everything a provisioning may have left behind.
     * Safe to repeat: absent resources are reported as NotFound.
     */
    pub fn deprovision(&self, spec: &InstanceSpec) -> Result<Steps, Halted<DeprovisionState>> {
        let mut steps: Steps = vec![];
        match self.try_deprovision(spec, &mut steps) {
            Ok(()) => {
                info!("{} {} -- vm removed.", "[delete]".green(), spec.fqdn);
                Ok(steps)
            }
            Err(e) => {
                let reached = steps
                    .last()
                    .map(|(state, _)| *state)
                    .unwrap_or(DeprovisionState::Running);
                error!(
                    "{} {} -- halted after {}: {}",
                    "[delete]".red(),
                    spec.fqdn,
                    reached,
                    e
                );
                Err(Halted { reached, error: e })
            }
        }
    }

    fn try_deprovision(&self, spec: &InstanceSpec, steps: &mut Steps) -> Result<(), CivirtError> {
        let name = &spec.fqdn;

        let res = self.hypervisor.stop(name)?;
        record(spec, steps, DeprovisionState::DomainStopped, res);

        let res = self.hypervisor.undefine(name)?;
        record(spec, steps, DeprovisionState::DomainUndefined, res);

        let res = remove_file(&spec.disk_path)?;
        record(spec, steps, DeprovisionState::DiskRemoved, res);

        let res = remove_file(&spec.cidata_path)?;
        record(spec, steps, DeprovisionState::PayloadRemoved, res);

        let res = match self.registry.remove_entry(name)? {
            true => Removal::Removed,
            false => Removal::NotFound,
        };
        record(spec, steps, DeprovisionState::RegistryCleared, res);

        let res = {
            let _guard = self.lock_directories();
            remove_empty_dir(&spec.directory)?
        };
        record(spec, steps, DeprovisionState::Removed, res);
        Ok(())
    }
}

fn record(spec: &InstanceSpec, steps: &mut Steps, state: DeprovisionState, res: Removal) {
    info!("{} {} -- {} ({})", "[delete]".green(), spec.fqdn, state, res);
    steps.push((state, res));
}

/// Remove a file, a missing one is not an error.
pub fn remove_file(path: &Path) -> Result<Removal, CivirtError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(Removal::Removed),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Removal::NotFound),
        Err(e) => Err(e.into()),
    }
}

/// Remove a directory only when nothing is left in it.
pub fn remove_empty_dir(path: &Path) -> Result<Removal, CivirtError> {
    let mut entries = match fs::read_dir(path) {
        Ok(v) => v,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Removal::NotFound),
        Err(e) => return Err(e.into()),
    };
    if entries.next().is_some() {
        warn!(
            "{} directory {} is not empty, keeping it.",
            "[delete]".yellow(),
            path.display()
        );
        return Ok(Removal::Kept);
    }
    fs::remove_dir(path)?;
    Ok(Removal::Removed)
}

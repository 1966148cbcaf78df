use super::{Halted, ProvisionState, Provisioner};
use crate::cloud_init::{self, MetaData, NetworkConfig};
use crate::config::InstanceSpec;
use crate::hypervisor::extract_mac;
use owo_colors::OwoColorize;
use std::fs;

// Error handling
use civirt_error::{CivirtError, ProvisionError};
use log::{debug, error, info};
use miette::Result;

impl Provisioner {
    /*
     * Bring a vm from nothing to a running domain.
     * Stops at the first failed step and reports the last completed state,
     * rollback is left to the caller.
     */
    pub fn provision(&self, spec: &InstanceSpec) -> Result<(), Halted<ProvisionState>> {
        let mut reached = ProvisionState::Unstarted;
        match self.try_provision(spec, &mut reached) {
            Ok(()) => {
                info!("{} {} -- vm is up.", "[create]".green(), spec.fqdn);
                Ok(())
            }
            Err(e) => {
                error!(
                    "{} {} -- halted after {}: {}",
                    "[create]".red(),
                    spec.fqdn,
                    reached,
                    e
                );
                Err(Halted { reached, error: e })
            }
        }
    }

    fn try_provision(
        &self,
        spec: &InstanceSpec,
        reached: &mut ProvisionState,
    ) -> Result<(), CivirtError> {
        self.preflight(spec)?;

        self.create_disk(spec)?;
        advance(spec, reached, ProvisionState::DiskCreated);

        let descriptor = self.define_domain(spec)?;
        advance(spec, reached, ProvisionState::DomainDefined);

        let network = self.derive_network(spec, &descriptor)?;
        advance(spec, reached, ProvisionState::NetworkDerived);

        self.attach_payload(spec, &network)?;
        advance(spec, reached, ProvisionState::PayloadAttached);

        self.hypervisor.start(&spec.fqdn)?;
        advance(spec, reached, ProvisionState::Running);
        Ok(())
    }

    /// Checks and side effects made before the first state transition.
    fn preflight(&self, spec: &InstanceSpec) -> Result<(), CivirtError> {
        if self.hypervisor.is_defined(&spec.fqdn)? {
            return Err(ProvisionError::AlreadyDefined {
                name: spec.fqdn.to_owned(),
            }
            .into());
        }
        self.registry.add_entry(&spec.fqdn, spec.address)?;
        Ok(())
    }

    /// The output directory is shared between vms:
    /// it stays locked until the disk sits in it.
    fn create_disk(&self, spec: &InstanceSpec) -> Result<(), CivirtError> {
        let _guard = self.lock_directories();
        fs::create_dir_all(&spec.directory)?;
        if !spec.backing_disk.is_file() {
            return Err(ProvisionError::BackingDiskMissing {
                path: spec.backing_disk.display().to_string(),
            }
            .into());
        }
        self.disk
            .create_disk(&spec.backing_disk, &spec.disk_path, spec.size.as_ref())
    }

    /// Define the domain and hand back the rendered descriptor.
    fn define_domain(&self, spec: &InstanceSpec) -> Result<String, CivirtError> {
        let descriptor = self.hypervisor.render_domain_descriptor(
            &spec.fqdn,
            spec.cpu,
            spec.memory,
            &spec.disk_path,
        )?;
        debug!("{}", descriptor);
        self.hypervisor.define_domain(&descriptor)?;
        Ok(descriptor)
    }

    fn derive_network(
        &self,
        spec: &InstanceSpec,
        descriptor: &str,
    ) -> Result<NetworkConfig, CivirtError> {
        let mac = extract_mac(&spec.fqdn, descriptor)?;
        NetworkConfig::new(&mac, spec.address)
    }

    fn attach_payload(&self, spec: &InstanceSpec, network: &NetworkConfig) -> Result<(), CivirtError> {
        cloud_init::build(
            self.writer.as_ref(),
            &MetaData::from(spec),
            &spec.user_data,
            network,
            &spec.cidata_path,
        )?;
        self.hypervisor
            .attach_removable_image(&spec.fqdn, &spec.cidata_path)
    }
}

fn advance(spec: &InstanceSpec, reached: &mut ProvisionState, next: ProvisionState) {
    *reached = next;
    info!("{} {} -- {}", "[create]".green(), spec.fqdn, next);
}

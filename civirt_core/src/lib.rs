pub mod cli;
pub mod cloud_init;
pub mod config;
pub mod disk;
pub mod exec;
pub mod hosts;
pub mod hypervisor;
pub mod orchestrate;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod testing;

// Reexports
pub use cloud_init::{CloudInitPayload, GenIsoImage, ImageFile, ImageWriter, NetworkConfig};
pub use config::{ConfigSource, FileSource, InstanceSpec};
pub use disk::{DiskTool, QemuImg};
pub use hosts::{HostsFile, NameRegistry};
pub use hypervisor::{HypervisorDriver, Removal, Virsh};
pub use orchestrate::{BatchReport, Operation, Orchestrator, Outcome};
pub use pipeline::{DeprovisionState, Halted, ProvisionState, Provisioner};

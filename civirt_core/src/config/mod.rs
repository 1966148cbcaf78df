pub mod compile;
pub mod load;
mod rand;

// Reexport
pub use compile::{compile, compile_instance};
pub use load::{ConfigSource, FileSource};
pub use self::rand::instance_id;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::net::Ipv4Addr;
use std::path::PathBuf;

pub const HOSTS_FILE: &str = "/etc/hosts";
pub const LIBVIRT_URI: &str = "qemu:///system";
pub const BRIDGE: &str = "virbr0";
pub const OS_VARIANT: &str = "rhel7.0";

pub const DEFAULT_CPU: u64 = 1;
pub const DEFAULT_MEMORY: u64 = 512;

/*
* Disk size handed to the disk tool as is.
* Either a human readable string ("20G") or a plain number of bytes.
*/
#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
#[serde(untagged)]
pub enum DiskSize {
    Bytes(u64),
    Human(String),
}
impl fmt::Display for DiskSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DiskSize::Bytes(v) => write!(f, "{}", v),
            DiskSize::Human(v) => write!(f, "{}", v),
        }
    }
}

/*
* The merged settings of one vm, as read from the configuration document.
* Keys of the former yaml configuration format are accepted as aliases.
*/
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VmSettings {
    pub fqdn: String,
    #[serde(alias = "ipaddr")]
    pub address: Ipv4Addr,
    #[serde(default = "default_cpu")]
    pub cpu: u64,
    /// vram in MiB
    #[serde(alias = "mem", default = "default_memory")]
    pub memory: u64,
    #[serde(alias = "backingdisk")]
    pub backing_disk: PathBuf,
    #[serde(default)]
    pub size: Option<DiskSize>,
    pub directory: PathBuf,
    #[serde(alias = "userdata", default)]
    pub user_data: Value,
}
fn default_cpu() -> u64 {
    DEFAULT_CPU
}
fn default_memory() -> u64 {
    DEFAULT_MEMORY
}

/*
* The fully resolved definition of one vm.
* Built once by the compiler and never mutated afterwards.
*/
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct InstanceSpec {
    pub fqdn: String,
    pub address: Ipv4Addr,
    pub cpu: u64,
    /// vram in MiB
    pub memory: u64,
    pub backing_disk: PathBuf,
    pub size: Option<DiskSize>,
    pub directory: PathBuf,
    pub user_data: Value,
    /// Regenerated on every compilation.
    pub instance_id: String,
    pub disk_path: PathBuf,
    pub cidata_path: PathBuf,
}
impl InstanceSpec {
    /// Hostname without its domain part.
    pub fn short_name(&self) -> &str {
        short_name(&self.fqdn)
    }
}

pub fn short_name(fqdn: &str) -> &str {
    fqdn.split('.').next().unwrap_or(fqdn)
}

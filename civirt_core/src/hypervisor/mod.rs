/*
* Hypervisor driver
* Everything the pipelines need from libvirt, behind a trait.
*/
mod virsh;
pub use virsh::Virsh;

use macaddr::MacAddr6;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::str::FromStr;
use strum::Display;

// Error handling
use civirt_error::{CivirtError, ProvisionError};
use miette::Result;

/// Result of a lenient teardown step.
/// Failures are the `Err` side of the step.
#[derive(Debug, Display, Clone, Copy, Eq, PartialEq)]
#[strum(serialize_all = "snake_case")]
pub enum Removal {
    Removed,
    NotFound,
    /// The resource exists but was deliberately left in place.
    Kept,
}

pub trait HypervisorDriver: Send + Sync {
    /// Produce the domain xml without defining anything.
    fn render_domain_descriptor(
        &self,
        name: &str,
        cpu: u64,
        memory: u64,
        disk: &Path,
    ) -> Result<String, CivirtError>;
    fn define_domain(&self, descriptor: &str) -> Result<(), CivirtError>;
    /// Attach a read-only cdrom image to a defined domain, persistently.
    fn attach_removable_image(&self, name: &str, image: &Path) -> Result<(), CivirtError>;
    fn start(&self, name: &str) -> Result<(), CivirtError>;
    /// Force off a running domain.
    fn stop(&self, name: &str) -> Result<Removal, CivirtError>;
    fn undefine(&self, name: &str) -> Result<Removal, CivirtError>;
    fn is_defined(&self, name: &str) -> Result<bool, CivirtError>;
}

static MAC_ADDRESS: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"<mac\s+address\s*=\s*["']([^"']+)["']"#).ok());

/// First interface mac address of a domain descriptor, lower-cased.
pub fn extract_mac(name: &str, descriptor: &str) -> Result<MacAddr6, CivirtError> {
    let not_found = || -> CivirtError {
        ProvisionError::MacAddressNotFound {
            name: name.to_owned(),
        }
        .into()
    };
    let captured = MAC_ADDRESS
        .as_ref()
        .and_then(|re| re.captures(descriptor))
        .and_then(|caps| caps.get(1))
        .ok_or_else(not_found)?;
    let mac = captured.as_str().to_lowercase();
    MacAddr6::from_str(&mac).map_err(|_| not_found())
}

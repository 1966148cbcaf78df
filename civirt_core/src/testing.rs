/*
* In-memory collaborators for the pipeline and orchestrator tests.
*/
use crate::cloud_init::{ImageFile, ImageWriter};
use crate::config::DiskSize;
use crate::hosts::NameRegistry;
use crate::hypervisor::{HypervisorDriver, Removal};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use civirt_error::{CivirtError, ProvisionError};
use miette::Result;

/// Writes an empty file where the disk would be.
#[derive(Debug, Default)]
pub struct FakeDisk {
    pub fail: bool,
    pub calls: Mutex<Vec<(PathBuf, PathBuf, Option<DiskSize>)>>,
}
impl FakeDisk {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
    pub fn calls(&self) -> Vec<(PathBuf, PathBuf, Option<DiskSize>)> {
        self.calls.lock().unwrap().clone()
    }
}
impl crate::disk::DiskTool for FakeDisk {
    fn create_disk(
        &self,
        backing: &Path,
        output: &Path,
        size: Option<&DiskSize>,
    ) -> Result<(), CivirtError> {
        self.calls.lock().unwrap().push((
            backing.to_owned(),
            output.to_owned(),
            size.cloned(),
        ));
        if self.fail {
            return Err(ProvisionError::DiskTool {
                path: output.display().to_string(),
                output: "disk full".to_owned(),
            }
            .into());
        }
        fs::write(output, b"qcow2")?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct HypervisorState {
    pub calls: Vec<String>,
    pub defined: BTreeSet<String>,
    pub running: BTreeSet<String>,
    pub attached: BTreeMap<String, PathBuf>,
}

/// Tracks defined and running domains in memory.
#[derive(Debug, Default)]
pub struct FakeHypervisor {
    pub fail_define: HashSet<String>,
    pub fail_attach: HashSet<String>,
    pub fail_start: HashSet<String>,
    pub fail_undefine: HashSet<String>,
    /// Render descriptors without an interface.
    pub no_interface: bool,
    pub state: Mutex<HypervisorState>,
}
impl FakeHypervisor {
    pub fn failing_define(name: &str) -> Self {
        Self {
            fail_define: HashSet::from([name.to_owned()]),
            ..Default::default()
        }
    }
    pub fn failing_attach(name: &str) -> Self {
        Self {
            fail_attach: HashSet::from([name.to_owned()]),
            ..Default::default()
        }
    }
    pub fn failing_start(name: &str) -> Self {
        Self {
            fail_start: HashSet::from([name.to_owned()]),
            ..Default::default()
        }
    }
    pub fn with_defined(names: &[&str]) -> Self {
        let fake = Self::default();
        {
            let mut state = fake.state.lock().unwrap();
            for name in names {
                state.defined.insert(name.to_string());
                state.running.insert(name.to_string());
            }
        }
        fake
    }
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }
    pub fn is_running(&self, name: &str) -> bool {
        self.state.lock().unwrap().running.contains(name)
    }
    pub fn defined(&self) -> BTreeSet<String> {
        self.state.lock().unwrap().defined.clone()
    }
    pub fn attached(&self, name: &str) -> Option<PathBuf> {
        self.state.lock().unwrap().attached.get(name).cloned()
    }
    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

fn control_error(action: &str, name: &str) -> CivirtError {
    ProvisionError::HypervisorControl {
        action: action.to_owned(),
        name: name.to_owned(),
        output: "injected failure".to_owned(),
    }
    .into()
}

impl HypervisorDriver for FakeHypervisor {
    fn render_domain_descriptor(
        &self,
        name: &str,
        cpu: u64,
        memory: u64,
        disk: &Path,
    ) -> Result<String, CivirtError> {
        self.record(format!("render {name}"));
        let interface = if self.no_interface {
            String::new()
        } else {
            "<interface type='bridge'><mac address='52:54:00:AB:CD:EF'/></interface>".to_owned()
        };
        Ok(format!(
            "<domain type='kvm'><name>{name}</name><vcpu>{cpu}</vcpu>\
             <memory unit='MiB'>{memory}</memory><devices>\
             <disk><source file='{}'/></disk>{interface}</devices></domain>",
            disk.display()
        ))
    }
    fn define_domain(&self, descriptor: &str) -> Result<(), CivirtError> {
        let name = descriptor
            .split("<name>")
            .nth(1)
            .and_then(|e| e.split("</name>").next())
            .unwrap_or_default()
            .to_owned();
        self.record(format!("define {name}"));
        if self.fail_define.contains(&name) {
            return Err(ProvisionError::HypervisorDefine {
                name,
                output: "injected failure".to_owned(),
            }
            .into());
        }
        self.state.lock().unwrap().defined.insert(name);
        Ok(())
    }
    fn attach_removable_image(&self, name: &str, image: &Path) -> Result<(), CivirtError> {
        self.record(format!("attach {name}"));
        let mut state = self.state.lock().unwrap();
        if self.fail_attach.contains(name) || !state.defined.contains(name) {
            return Err(control_error("attach image to", name));
        }
        state.attached.insert(name.to_owned(), image.to_owned());
        Ok(())
    }
    fn start(&self, name: &str) -> Result<(), CivirtError> {
        self.record(format!("start {name}"));
        if self.fail_start.contains(name) {
            return Err(control_error("start", name));
        }
        self.state.lock().unwrap().running.insert(name.to_owned());
        Ok(())
    }
    fn stop(&self, name: &str) -> Result<Removal, CivirtError> {
        self.record(format!("stop {name}"));
        match self.state.lock().unwrap().running.remove(name) {
            true => Ok(Removal::Removed),
            false => Ok(Removal::NotFound),
        }
    }
    fn undefine(&self, name: &str) -> Result<Removal, CivirtError> {
        self.record(format!("undefine {name}"));
        if self.fail_undefine.contains(name) {
            return Err(control_error("undefine", name));
        }
        let mut state = self.state.lock().unwrap();
        state.attached.remove(name);
        match state.defined.remove(name) {
            true => Ok(Removal::Removed),
            false => Ok(Removal::NotFound),
        }
    }
    fn is_defined(&self, name: &str) -> Result<bool, CivirtError> {
        Ok(self.state.lock().unwrap().defined.contains(name))
    }
}

pub type WrittenImage = (String, PathBuf, Vec<ImageFile>);

/// Records the images and writes a placeholder file at the output.
#[derive(Debug, Default)]
pub struct FakeWriter {
    pub fail: bool,
    pub images: Mutex<Vec<WrittenImage>>,
}
impl FakeWriter {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
    pub fn images(&self) -> Vec<WrittenImage> {
        self.images.lock().unwrap().clone()
    }
}
impl ImageWriter for FakeWriter {
    fn write_image(
        &self,
        files: &[ImageFile],
        volume_label: &str,
        output: &Path,
    ) -> Result<(), CivirtError> {
        if self.fail {
            return Err(ProvisionError::IsoWrite {
                path: output.display().to_string(),
                output: "injected failure".to_owned(),
            }
            .into());
        }
        fs::write(output, b"iso9660")?;
        self.images.lock().unwrap().push((
            volume_label.to_owned(),
            output.to_owned(),
            files.to_vec(),
        ));
        Ok(())
    }
}

/// Name registry kept in memory.
#[derive(Debug, Default)]
pub struct RecordingRegistry {
    pub fail: bool,
    pub entries: Mutex<BTreeMap<String, Ipv4Addr>>,
}
impl RecordingRegistry {
    pub fn entries(&self) -> BTreeMap<String, Ipv4Addr> {
        self.entries.lock().unwrap().clone()
    }
}
impl NameRegistry for RecordingRegistry {
    fn add_entry(&self, fqdn: &str, address: Ipv4Addr) -> Result<bool, CivirtError> {
        if self.fail {
            return Err(ProvisionError::RegistryIo {
                path: "/etc/hosts".to_owned(),
                origin: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            }
            .into());
        }
        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(fqdn) {
            return Ok(false);
        }
        entries.insert(fqdn.to_owned(), address);
        Ok(true)
    }
    fn remove_entry(&self, fqdn: &str) -> Result<bool, CivirtError> {
        Ok(self.entries.lock().unwrap().remove(fqdn).is_some())
    }
}

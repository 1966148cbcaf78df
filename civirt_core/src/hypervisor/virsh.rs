use super::{HypervisorDriver, Removal};
use crate::config::{BRIDGE, LIBVIRT_URI, OS_VARIANT};
use crate::exec::{self, quote, Execution};
use owo_colors::OwoColorize;
use std::env;
use std::fs;
use std::path::Path;
use uuid::Uuid;

// Error handling
use civirt_error::{CivirtError, ProvisionError};
use log::{info, trace};
use miette::Result;

/*
* Libvirt through its command line tools:
* virt-install renders the descriptor, virsh does everything else.
*/
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Virsh {
    pub uri: String,
    pub bridge: String,
    pub os_variant: String,
}
impl Default for Virsh {
    fn default() -> Self {
        Self {
            uri: LIBVIRT_URI.to_owned(),
            bridge: BRIDGE.to_owned(),
            os_variant: OS_VARIANT.to_owned(),
        }
    }
}

impl Virsh {
    fn virsh(&self, args: &str) -> String {
        format!("virsh --connect {} {}", quote(&self.uri), args)
    }
    fn render_command(&self, name: &str, cpu: u64, memory: u64, disk: &Path) -> String {
        format!(
            "virt-install --connect {} --print-xml --import --noautoconsole \
             --os-variant {} --network bridge={},model=virtio \
             --name {} --vcpus {} --ram {} --disk {}",
            quote(&self.uri),
            quote(&self.os_variant),
            quote(&self.bridge),
            quote(name),
            cpu,
            memory,
            quote(&format!("path={},format=qcow2,bus=virtio", disk.display()))
        )
    }
    fn control_error(action: &str, name: &str, execution: &Execution) -> CivirtError {
        ProvisionError::HypervisorControl {
            action: action.to_owned(),
            name: name.to_owned(),
            output: execution.output(),
        }
        .into()
    }
    /// Active domains (running, paused, suspended or shutting down),
    /// or every defined domain with `all`.
    fn list_command(&self, all: bool) -> String {
        match all {
            true => self.virsh("list --name --all"),
            false => self.virsh("list --name"),
        }
    }
    fn list(&self, all: bool) -> Result<Vec<String>, CivirtError> {
        let execution = exec::run("virsh", &self.list_command(all))?;
        if !execution.succeeded {
            return Err(Self::control_error("list", "domains", &execution));
        }
        Ok(parse_names(&execution.stdout))
    }
    fn control(&self, action: &str, name: &str, args: &str) -> Result<(), CivirtError> {
        let execution = exec::run("virsh", &self.virsh(args))?;
        if !execution.succeeded {
            return Err(Self::control_error(action, name, &execution));
        }
        Ok(())
    }
}

fn parse_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(|line| line.to_owned())
        .collect()
}

impl HypervisorDriver for Virsh {
    fn render_domain_descriptor(
        &self,
        name: &str,
        cpu: u64,
        memory: u64,
        disk: &Path,
    ) -> Result<String, CivirtError> {
        let execution = exec::run("virt-install", &self.render_command(name, cpu, memory, disk))?;
        if !execution.succeeded {
            return Err(ProvisionError::HypervisorDefine {
                name: name.to_owned(),
                output: execution.output(),
            }
            .into());
        }
        Ok(execution.stdout)
    }
    fn define_domain(&self, descriptor: &str) -> Result<(), CivirtError> {
        let path = env::temp_dir().join(format!("civirt-domain-{}.xml", Uuid::new_v4()));
        fs::write(&path, descriptor)?;
        let res = exec::run(
            "virsh",
            &self.virsh(&format!("define {}", quote(&path.display().to_string()))),
        );
        if let Err(e) = fs::remove_file(&path) {
            trace!("couldn't remove descriptor {}: {e}", path.display());
        }
        let execution = res?;
        if !execution.succeeded {
            return Err(ProvisionError::HypervisorDefine {
                name: domain_name(descriptor).unwrap_or_default(),
                output: execution.output(),
            }
            .into());
        }
        Ok(())
    }
    fn attach_removable_image(&self, name: &str, image: &Path) -> Result<(), CivirtError> {
        let args = format!(
            "attach-disk --persistent {} {} hdc --type cdrom --mode readonly",
            quote(name),
            quote(&image.display().to_string())
        );
        self.control("attach image to", name, &args)
    }
    fn start(&self, name: &str) -> Result<(), CivirtError> {
        self.control("start", name, &format!("start {}", quote(name)))?;
        info!("{} {} -- domain started.", "[virsh]".yellow(), name);
        Ok(())
    }
    fn stop(&self, name: &str) -> Result<Removal, CivirtError> {
        if !self.list(false)?.iter().any(|e| e == name) {
            return Ok(Removal::NotFound);
        }
        self.control("stop", name, &format!("destroy {}", quote(name)))?;
        Ok(Removal::Removed)
    }
    fn undefine(&self, name: &str) -> Result<Removal, CivirtError> {
        if !self.is_defined(name)? {
            return Ok(Removal::NotFound);
        }
        self.control("undefine", name, &format!("undefine {}", quote(name)))?;
        Ok(Removal::Removed)
    }
    fn is_defined(&self, name: &str) -> Result<bool, CivirtError> {
        Ok(self.list(true)?.iter().any(|e| e == name))
    }
}

/// Name element of a domain descriptor, for error reports.
fn domain_name(descriptor: &str) -> Option<String> {
    let start = descriptor.find("<name>")? + "<name>".len();
    let end = descriptor[start..].find("</name>")? + start;
    Some(descriptor[start..end].trim().to_owned())
}

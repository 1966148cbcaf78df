use crate::config::DiskSize;
use crate::exec::{self, quote};
use owo_colors::OwoColorize;
use std::path::Path;

// Error handling
use civirt_error::{CivirtError, ProvisionError};
use log::info;
use miette::Result;

/// Creates copy-on-write overlay disks.
pub trait DiskTool: Send + Sync {
    /// Create `output` as a qcow2 overlay of `backing`,
    /// grown to `size` when one is given.
    fn create_disk(
        &self,
        backing: &Path,
        output: &Path,
        size: Option<&DiskSize>,
    ) -> Result<(), CivirtError>;
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct QemuImg {
    pub program: String,
}
impl Default for QemuImg {
    fn default() -> Self {
        Self {
            program: "qemu-img".to_owned(),
        }
    }
}

impl QemuImg {
    fn command(&self, backing: &Path, output: &Path, size: Option<&DiskSize>) -> String {
        let mut cmd = format!(
            "{} create -f qcow2 -F qcow2 -b {} {}",
            self.program,
            quote(&backing.display().to_string()),
            quote(&output.display().to_string())
        );
        if let Some(size) = size {
            cmd.push(' ');
            cmd.push_str(&quote(&size.to_string()));
        }
        cmd
    }
}

impl DiskTool for QemuImg {
    fn create_disk(
        &self,
        backing: &Path,
        output: &Path,
        size: Option<&DiskSize>,
    ) -> Result<(), CivirtError> {
        let execution = exec::run("qemu-img", &self.command(backing, output, size))?;
        if !execution.succeeded {
            return Err(ProvisionError::DiskTool {
                path: output.display().to_string(),
                output: execution.output(),
            }
            .into());
        }
        info!(
            "{} created {} backed by {}",
            "[disk]".yellow(),
            output.display(),
            backing.display()
        );
        Ok(())
    }
}

use super::{ImageFile, ImageWriter};
use crate::exec::{self, quote};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

// Error handling
use civirt_error::{CivirtError, ProvisionError};
use log::trace;
use miette::Result;

/*
* Writes the image with genisoimage (or a compatible mkisofs).
* Files are staged under their alias names,
* Joliet and Rock Ridge extensions keep those names readable to the guest.
*/
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct GenIsoImage {
    pub program: String,
}
impl Default for GenIsoImage {
    fn default() -> Self {
        Self {
            program: "genisoimage".to_owned(),
        }
    }
}

impl GenIsoImage {
    fn stage(&self, files: &[ImageFile], stage: &Path) -> Result<(), std::io::Error> {
        fs::create_dir_all(stage)?;
        for file in files {
            let path = stage.join(file.alias_path.trim_start_matches('/'));
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, &file.data)?;
        }
        Ok(())
    }
    fn command(&self, volume_label: &str, output: &Path, stage: &Path) -> String {
        format!(
            "{} -output {} -volid {} -joliet -rock -input-charset utf-8 {}",
            self.program,
            quote(&output.display().to_string()),
            quote(volume_label),
            quote(&stage.display().to_string())
        )
    }
}

impl ImageWriter for GenIsoImage {
    fn write_image(
        &self,
        files: &[ImageFile],
        volume_label: &str,
        output: &Path,
    ) -> Result<(), CivirtError> {
        let iso_error = |output_msg: String| -> CivirtError {
            ProvisionError::IsoWrite {
                path: output.display().to_string(),
                output: output_msg,
            }
            .into()
        };

        let stage: PathBuf = env::temp_dir().join(format!("civirt-cidata-{}", Uuid::new_v4()));
        let res = match self.stage(files, &stage) {
            Ok(()) => exec::run("cidata", &self.command(volume_label, output, &stage)),
            Err(e) => Err(iso_error(e.to_string())),
        };
        if let Err(e) = fs::remove_dir_all(&stage) {
            trace!("couldn't remove staging dir {}: {e}", stage.display());
        }

        let execution = res?;
        if !execution.succeeded {
            return Err(iso_error(execution.output()));
        }
        Ok(())
    }
}

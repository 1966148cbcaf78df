/*
* Cloud-init NoCloud payload
* https://cloudinit.readthedocs.io/en/latest/reference/datasources/nocloud.html
*/
mod iso;
mod network;

pub use iso::GenIsoImage;
pub use network::{Ethernet, MacMatch, Nameservers, NetworkConfig};

use crate::config::InstanceSpec;
use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

// Error Handling
use civirt_error::CivirtError;
use log::{debug, info};
use miette::Result;

/// Label the NoCloud datasource looks for.
pub const VOLUME_LABEL: &str = "cidata";
pub const CLOUD_CONFIG_HEADER: &str = "#cloud-config\n";

/// One file of a filesystem image, under its ISO9660 name and its long alias.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ImageFile {
    pub iso_path: String,
    pub alias_path: String,
    pub data: Vec<u8>,
}

/// Assembles a filesystem image and writes it as a single file.
pub trait ImageWriter: Send + Sync {
    fn write_image(
        &self,
        files: &[ImageFile],
        volume_label: &str,
        output: &Path,
    ) -> Result<(), CivirtError>;
}

#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
pub struct MetaData {
    #[serde(rename = "instance-id")]
    pub instance_id: String,
    #[serde(rename = "local-hostname")]
    pub local_hostname: String,
}
impl From<&InstanceSpec> for MetaData {
    fn from(e: &InstanceSpec) -> Self {
        Self {
            instance_id: e.instance_id.to_owned(),
            local_hostname: e.fqdn.to_owned(),
        }
    }
}

/*
* The three serialized documents of a NoCloud datasource.
*/
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CloudInitPayload {
    pub meta_data: String,
    pub user_data: String,
    pub network_config: String,
}
impl CloudInitPayload {
    pub fn new(
        meta_data: &MetaData,
        user_data: &Value,
        network_config: &NetworkConfig,
    ) -> Result<Self, CivirtError> {
        Ok(Self {
            meta_data: serde_yaml::to_string(meta_data)?,
            user_data: format!("{CLOUD_CONFIG_HEADER}{}", serde_yaml::to_string(user_data)?),
            network_config: serde_yaml::to_string(network_config)?,
        })
    }
    /// Serialized sizes in bytes: (meta-data, user-data, network-config).
    pub fn sizes(&self) -> (usize, usize, usize) {
        (
            self.meta_data.len(),
            self.user_data.len(),
            self.network_config.len(),
        )
    }
    pub fn files(&self) -> Vec<ImageFile> {
        vec![
            ImageFile {
                iso_path: "/USERDATA.;1".to_owned(),
                alias_path: "/user-data".to_owned(),
                data: self.user_data.as_bytes().to_vec(),
            },
            ImageFile {
                iso_path: "/METADATA.;1".to_owned(),
                alias_path: "/meta-data".to_owned(),
                data: self.meta_data.as_bytes().to_vec(),
            },
            ImageFile {
                iso_path: "/NETWORKCONFIG.;1".to_owned(),
                alias_path: "/network-config".to_owned(),
                data: self.network_config.as_bytes().to_vec(),
            },
        ]
    }
    pub fn write(&self, writer: &dyn ImageWriter, output: &Path) -> Result<(), CivirtError> {
        let (meta, user, net) = self.sizes();
        debug!("cidata sizes: meta-data={meta} user-data={user} network-config={net}");
        writer.write_image(&self.files(), VOLUME_LABEL, output)?;
        Ok(())
    }
}

/// Serialize the documents and write them into a `cidata` image at `output`.
pub fn build(
    writer: &dyn ImageWriter,
    meta_data: &MetaData,
    user_data: &Value,
    network_config: &NetworkConfig,
    output: &Path,
) -> Result<CloudInitPayload, CivirtError> {
    let payload = CloudInitPayload::new(meta_data, user_data, network_config)?;
    payload.write(writer, output)?;
    info!(
        "{} {} -- created nocloud image at {}",
        "[cidata]".yellow(),
        meta_data.local_hostname,
        output.display()
    );
    Ok(payload)
}

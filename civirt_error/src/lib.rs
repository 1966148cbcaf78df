use bon::bon;
use miette::{Diagnostic, Report};
pub use pipelight_error::{CastError, PipelightError, TomlError};

use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CivirtError {
    ////////////////////////////////
    // Lib native errors
    #[error(transparent)]
    #[diagnostic(transparent)]
    ConfigError(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    ProvisionError(#[from] ProvisionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    WrapError(#[from] WrapError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    LibError(#[from] LibError),

    ////////////////////////////////
    // Type convertion
    #[error(transparent)]
    #[diagnostic(code(serde::error))]
    SerdeError(#[from] serde_json::Error),

    #[error(transparent)]
    #[diagnostic(code(serde::yaml::error))]
    YamlError(#[from] serde_yaml::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    CastError(#[from] CastError),

    #[error(transparent)]
    #[diagnostic(code(civirt::io::error))]
    IoError(#[from] std::io::Error),

    ////////////////////////////////
    // Process execution
    #[error(transparent)]
    #[diagnostic(transparent)]
    PipelightError(#[from] PipelightError),
}

/**
Errors raised while reading and compiling the configuration file.
Any of them aborts the whole batch before a vm is touched.
*/
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("Couldn't read configuration file {path}")]
    #[diagnostic(
        code(civirt::config::unreadable),
        help("Check the path given with --config and its permissions.")
    )]
    Unreadable {
        path: String,
        #[source]
        origin: std::io::Error,
    },

    #[error("Couldn't parse configuration file {path}")]
    #[diagnostic(code(civirt::config::malformed))]
    Malformed {
        path: String,
        #[diagnostic_source]
        origin: Report,
    },

    #[error("{message}")]
    #[diagnostic(code(civirt::config::invalid))]
    Invalid {
        message: String,
        #[help]
        help: String,
    },
}
impl ConfigError {
    pub fn invalid(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
            help: help.into(),
        }
    }
}

/**
Errors raised by a provisioning step.
Each one halts the pipeline of the vm it belongs to.
*/
#[derive(Debug, Error, Diagnostic)]
pub enum ProvisionError {
    #[error("Backing disk {path} does not exist")]
    #[diagnostic(
        code(civirt::disk::backing_missing),
        help("Point `backing_disk` to an existing qcow2 cloud image.")
    )]
    BackingDiskMissing { path: String },

    #[error("Couldn't create disk {path}")]
    #[diagnostic(code(civirt::disk::tool))]
    DiskTool {
        path: String,
        #[help]
        output: String,
    },

    #[error("Couldn't define domain {name}")]
    #[diagnostic(code(civirt::domain::define))]
    HypervisorDefine {
        name: String,
        #[help]
        output: String,
    },

    #[error("Domain {name} is already defined")]
    #[diagnostic(
        code(civirt::domain::already_defined),
        help("Delete it first, or use the `recreate` command.")
    )]
    AlreadyDefined { name: String },

    #[error("No mac address found in the descriptor of domain {name}")]
    #[diagnostic(
        code(civirt::domain::no_mac),
        help("The domain needs a network interface to receive its network config.")
    )]
    MacAddressNotFound { name: String },

    #[error("Couldn't write cloud-init image {path}")]
    #[diagnostic(code(civirt::cidata::write))]
    IsoWrite {
        path: String,
        #[help]
        output: String,
    },

    #[error("Couldn't update name registry {path}")]
    #[diagnostic(code(civirt::hosts::io))]
    RegistryIo {
        path: String,
        #[source]
        origin: std::io::Error,
    },

    #[error("Couldn't {action} domain {name}")]
    #[diagnostic(code(civirt::domain::control))]
    HypervisorControl {
        action: String,
        name: String,
        #[help]
        output: String,
    },
}

/**
A config error with help higher origin
Can be recursively chained.
*/
#[derive(Debug, Error, Diagnostic)]
#[error("{}", message)]
#[diagnostic(code(civirt::wrap::error))]
pub struct WrapError {
    pub message: String,
    #[diagnostic_source]
    pub origin: Report,
    #[help]
    pub help: String,
}

#[bon]
impl WrapError {
    #[builder]
    pub fn new(msg: &str, help: &str, origin: Report) -> Self {
        Self {
            message: msg.to_owned(),
            help: help.to_owned(),
            origin,
        }
    }
}

/**
A root cause error with no inner origin
*/
#[derive(Debug, Error, Diagnostic)]
#[error("{}", message)]
#[diagnostic(code(civirt::lib::error))]
pub struct LibError {
    pub message: String,
    #[help]
    pub help: String,
}

#[bon]
impl LibError {
    #[builder]
    pub fn new(msg: &str, help: &str) -> Self {
        Self {
            message: msg.to_owned(),
            help: help.to_owned(),
        }
    }
}

impl CivirtError {
    /// Whether the error reports a domain that already existed before the
    /// failed operation started.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            CivirtError::ProvisionError(ProvisionError::AlreadyDefined { .. })
        )
    }
}

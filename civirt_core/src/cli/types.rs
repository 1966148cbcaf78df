use crate::config::{BRIDGE, HOSTS_FILE, LIBVIRT_URI, OS_VARIANT};
use clap::{Args, Parser, Subcommand, ValueHint};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::net::Ipv4Addr;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub commands: Commands,
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    #[command(flatten)]
    pub host: HostArgs,
}

/// Host side resources shared by every vm.
#[derive(Debug, Args, Clone, Eq, PartialEq)]
pub struct HostArgs {
    /// Name registry the vms are added to.
    #[arg(long, global = true, value_name = "FILE", value_hint = ValueHint::FilePath, default_value = HOSTS_FILE)]
    pub hosts_file: PathBuf,
    /// Libvirt connection uri.
    #[arg(long, global = true, value_name = "URI", default_value = LIBVIRT_URI)]
    pub connect: String,
    /// Bridge the vm interface is plugged into.
    #[arg(long, global = true, value_name = "BRIDGE", default_value = BRIDGE)]
    pub bridge: String,
    #[arg(long, global = true, value_name = "OS", default_value = OS_VARIANT)]
    pub os_variant: String,
    /// Vms processed at the same time.
    #[arg(short, long, global = true, value_name = "N", default_value_t = 1)]
    pub jobs: usize,
}

#[derive(Debug, Subcommand, Clone, Eq, PartialEq)]
pub enum Commands {
    /// Provision every vm of a configuration file.
    #[command(arg_required_else_help = true)]
    Create(CreateArgs),
    /// Remove every vm of a configuration file.
    #[command(arg_required_else_help = true)]
    Delete(ConfigArgs),
    /// Remove then provision every vm of a configuration file.
    #[command(arg_required_else_help = true)]
    Recreate(CreateArgs),

    /// Operations on a single vm built from the common settings.
    #[command(subcommand)]
    Instance(InstanceArgs),
}

#[derive(Debug, Subcommand, Clone, Eq, PartialEq)]
pub enum InstanceArgs {
    #[command(arg_required_else_help = true)]
    Create(InstanceCreateArgs),
    #[command(arg_required_else_help = true)]
    Delete(InstanceDeleteArgs),
}

#[derive(Debug, Args, Clone, Eq, PartialEq)]
pub struct ConfigArgs {
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub config: PathBuf,
}

#[derive(Debug, Args, Clone, Eq, PartialEq)]
pub struct CreateArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
    /// Leave the resources of a failed vm in place.
    #[arg(short, long)]
    pub keep: bool,
}

#[derive(Debug, Args, Clone, Eq, PartialEq)]
pub struct InstanceCreateArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
    #[arg(long, value_name = "FQDN")]
    pub fqdn: String,
    #[arg(long, value_name = "ADDRESS")]
    pub ip: Ipv4Addr,
    /// Leave the resources of a failed vm in place.
    #[arg(short, long)]
    pub keep: bool,
}

#[derive(Debug, Args, Clone, Eq, PartialEq)]
pub struct InstanceDeleteArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
    #[arg(long, value_name = "FQDN")]
    pub fqdn: String,
    #[arg(long, value_name = "ADDRESS")]
    pub ip: Option<Ipv4Addr>,
}

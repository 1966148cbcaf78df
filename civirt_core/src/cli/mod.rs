mod types;
pub use types::*;

use crate::cloud_init::GenIsoImage;
use crate::config::FileSource;
use crate::disk::QemuImg;
use crate::hosts::HostsFile;
use crate::hypervisor::Virsh;
use crate::orchestrate::{BatchReport, Orchestrator};
use crate::pipeline::Provisioner;
use clap::Parser;
use std::sync::Arc;

// Logger
use env_logger::Builder;

// Error Handling
use civirt_error::LibError;
use log::error;
use miette::Result;

impl Cli {
    pub async fn run() -> Result<()> {
        let cli = Cli::parse();
        Self::switch(cli).await?;
        Ok(())
    }
    pub async fn switch(cli: Cli) -> Result<()> {
        // Set verbosity
        let verbosity = cli.verbose.log_level_filter();
        std::env::set_var("CIVIRT_LOG", verbosity.to_string().to_lowercase());
        Builder::from_env("CIVIRT_LOG").init();

        let orchestrator = cli.host.orchestrator();

        let reports = match cli.commands {
            Commands::Create(args) => {
                vec![
                    orchestrator
                        .provision(&args.config.config, args.keep)
                        .await?,
                ]
            }
            Commands::Delete(args) => vec![orchestrator.deprovision(&args.config).await?],
            Commands::Recreate(args) => {
                orchestrator
                    .recreate(&args.config.config, args.keep)
                    .await?
            }
            Commands::Instance(args) => match args {
                InstanceArgs::Create(args) => {
                    vec![
                        orchestrator
                            .provision_instance(&args.config.config, &args.fqdn, args.ip, args.keep)
                            .await?,
                    ]
                }
                InstanceArgs::Delete(args) => {
                    vec![
                        orchestrator
                            .deprovision_instance(&args.config.config, &args.fqdn, args.ip)
                            .await?,
                    ]
                }
            },
        };
        Self::conclude(reports)
    }

    /// Print the reports and fail when any vm failed.
    fn conclude(reports: Vec<BatchReport>) -> Result<()> {
        let mut failures = 0;
        for report in reports {
            report.display();
            failures += report.failures();
            for (fqdn, e) in report.into_errors() {
                error!("{}: {:?}", fqdn, miette::Report::new(e));
            }
        }
        if failures > 0 {
            let message = format!("{failures} vm(s) failed");
            let help = "Run again with -v for the output of every step.";
            return Err(LibError::builder().msg(&message).help(help).build().into());
        }
        Ok(())
    }
}

impl HostArgs {
    /// Wire the system collaborators.
    pub fn orchestrator(&self) -> Orchestrator {
        let hypervisor = Virsh {
            uri: self.connect.to_owned(),
            bridge: self.bridge.to_owned(),
            os_variant: self.os_variant.to_owned(),
        };
        let provisioner = Provisioner::builder()
            .disk(Arc::new(QemuImg::default()))
            .hypervisor(Arc::new(hypervisor))
            .writer(Arc::new(GenIsoImage::default()))
            .registry(Arc::new(HostsFile::new(&self.hosts_file)))
            .build();
        Orchestrator::new(provisioner, Arc::new(FileSource), self.jobs)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;
    use std::net::Ipv4Addr;
    use std::path::PathBuf;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_defaults() -> Result<()> {
        let cli = Cli::try_parse_from(["civirt", "create", "-c", "vms.toml"])
            .map_err(|e| miette::miette!("{e}"))?;
        assert_eq!(cli.host.hosts_file, PathBuf::from("/etc/hosts"));
        assert_eq!(cli.host.connect, "qemu:///system");
        assert_eq!(cli.host.bridge, "virbr0");
        assert_eq!(cli.host.os_variant, "rhel7.0");
        assert_eq!(cli.host.jobs, 1);
        assert_eq!(
            cli.commands,
            Commands::Create(CreateArgs {
                config: ConfigArgs {
                    config: PathBuf::from("vms.toml")
                },
                keep: false
            })
        );
        Ok(())
    }

    #[test]
    fn parse_instance() -> Result<()> {
        let cli = Cli::try_parse_from([
            "civirt",
            "--jobs",
            "4",
            "instance",
            "create",
            "-c",
            "vms.toml",
            "--fqdn",
            "web1.test",
            "--ip",
            "192.168.122.10",
            "-k",
        ])
        .map_err(|e| miette::miette!("{e}"))?;
        assert_eq!(cli.host.jobs, 4);
        match cli.commands {
            Commands::Instance(InstanceArgs::Create(args)) => {
                assert_eq!(args.fqdn, "web1.test");
                assert_eq!(args.ip, Ipv4Addr::new(192, 168, 122, 10));
                assert!(args.keep);
            }
            other => panic!("unexpected command {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn rejects_bad_address() {
        let res = Cli::try_parse_from([
            "civirt", "instance", "create", "-c", "vms.toml", "--fqdn", "a.test", "--ip", "nope",
        ]);
        assert!(res.is_err());
    }
}

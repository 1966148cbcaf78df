use super::Operation;
use crate::hypervisor::Removal;
use crate::pipeline::{DeprovisionState, Halted, ProvisionState, Steps};
use owo_colors::OwoColorize;
use std::fmt;
use tabled::{settings::Style, Table, Tabled};

// Error handling
use civirt_error::CivirtError;

/// Last state a failed vm completed.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Reached {
    Provision(ProvisionState),
    Deprovision(DeprovisionState),
    /// The worker died before reporting.
    Unknown,
}
impl fmt::Display for Reached {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Reached::Provision(v) => write!(f, "{}", v),
            Reached::Deprovision(v) => write!(f, "{}", v),
            Reached::Unknown => write!(f, "unknown"),
        }
    }
}

/// What became of the partial state of a failed creation.
#[derive(Debug)]
pub enum Cleanup {
    Kept,
    NotNeeded,
    RolledBack(Steps),
    RollbackFailed(Halted<DeprovisionState>),
}
impl fmt::Display for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Cleanup::Kept => write!(f, "kept"),
            Cleanup::NotNeeded => write!(f, "-"),
            Cleanup::RolledBack(_) => write!(f, "rolled back"),
            Cleanup::RollbackFailed(halted) => {
                write!(f, "rollback failed after {}", halted.reached)
            }
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    Provisioned,
    Removed(Steps),
    Failed {
        reached: Reached,
        error: CivirtError,
        cleanup: Cleanup,
    },
}

#[derive(Debug)]
pub struct VmReport {
    pub fqdn: String,
    pub outcome: Outcome,
}

#[derive(Debug)]
pub struct BatchReport {
    pub operation: Operation,
    pub vms: Vec<VmReport>,
}

#[derive(Debug, Clone, Eq, PartialEq, Tabled)]
struct VmRow {
    name: String,
    #[tabled(rename = "op")]
    operation: String,
    outcome: String,
    reached: String,
    cleanup: String,
    error: String,
}
impl VmRow {
    fn from(operation: &Operation, vm: &VmReport) -> Self {
        let (outcome, reached, cleanup, error) = match &vm.outcome {
            Outcome::Provisioned => (
                "provisioned".green().to_string(),
                ProvisionState::Running.to_string(),
                String::new(),
                String::new(),
            ),
            Outcome::Removed(steps) => (
                "removed".green().to_string(),
                DeprovisionState::Removed.to_string(),
                display_steps(steps),
                String::new(),
            ),
            Outcome::Failed {
                reached,
                error,
                cleanup,
            } => (
                "failed".red().to_string(),
                reached.to_string(),
                cleanup.to_string(),
                error.to_string(),
            ),
        };
        Self {
            name: vm.fqdn.to_owned(),
            operation: operation.to_string(),
            outcome,
            reached,
            cleanup,
            error,
        }
    }
}

/// Steps that found nothing to remove.
fn display_steps(steps: &Steps) -> String {
    let absent: Vec<String> = steps
        .iter()
        .filter(|(_, res)| *res != Removal::Removed)
        .map(|(state, res)| format!("{state}: {res}"))
        .collect();
    absent.join("\n")
}

impl BatchReport {
    pub fn has_failures(&self) -> bool {
        self.failures() > 0
    }
    pub fn failures(&self) -> usize {
        self.vms
            .iter()
            .filter(|e| matches!(e.outcome, Outcome::Failed { .. }))
            .count()
    }
    pub fn table(&self) -> String {
        let rows: Vec<VmRow> = self
            .vms
            .iter()
            .map(|e| VmRow::from(&self.operation, e))
            .collect();
        let mut res = Table::new(rows);
        res.with(Style::rounded());
        res.to_string()
    }
    pub fn display(&self) {
        println!("{}", self.table());
    }
    /// The errors of the failed vms, by name.
    pub fn into_errors(self) -> Vec<(String, CivirtError)> {
        self.vms
            .into_iter()
            .filter_map(|e| match e.outcome {
                Outcome::Failed { error, .. } => Some((e.fqdn, error)),
                _ => None,
            })
            .collect()
    }
}

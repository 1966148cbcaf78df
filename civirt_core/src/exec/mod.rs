use owo_colors::OwoColorize;
use pipelight_exec::{Process, Status};

// Error handling
use civirt_error::CivirtError;
use log::{trace, warn};
use miette::Result;

/// The captured result of an external command.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Execution {
    pub cmd: String,
    pub succeeded: bool,
    pub stdout: String,
    pub stderr: String,
}
impl Execution {
    /// Best diagnostic available: stderr, or stdout when the tool writes its
    /// errors there.
    pub fn output(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_owned()
        } else {
            stderr.to_owned()
        }
    }
}

/// Run a command and capture its outputs.
/// A command that ran but failed is not an error here:
/// callers turn `succeeded == false` into their own error type.
pub fn run(tag: &str, cmd: &str) -> Result<Execution, CivirtError> {
    let mut proc = Process::new();
    let res = proc.stdin(cmd).run()?;

    let execution = Execution {
        cmd: cmd.to_owned(),
        succeeded: !matches!(res.state.status, Some(Status::Failed)),
        stdout: res.io.stdout.clone().unwrap_or_default(),
        stderr: res.io.stderr.clone().unwrap_or_default(),
    };

    let tag = format!("[{tag}]");
    if execution.succeeded {
        trace!("{}: command succeded: {}", tag.green(), cmd);
    } else {
        warn!(
            "{}: command failed: {} -> {}",
            tag.red(),
            cmd,
            execution.output()
        );
    }
    Ok(execution)
}

/// Quote an argument for the shell the command is handed to.
pub fn quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

//! Shell subprocess executor - runs step commands with `<shell> -c`

use crate::agent::{AgentError, AgentExecutor, CommandOutput, ShellCommand};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Executes shell commands as local child processes
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor;

impl ShellExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AgentExecutor for ShellExecutor {
    /// Run `<shell> -c <script>` and capture its output
    ///
    /// # Errors
    /// Returns `AgentError` if:
    /// - The shell cannot be spawned
    /// - The command times out (its whole process group is killed)
    ///
    /// A non-zero exit is not an error; it is reported in `CommandOutput`.
    async fn execute(&self, command: &ShellCommand) -> Result<CommandOutput, AgentError> {
        debug!("Spawning {} -c {:?}", command.shell, command.script);

        let mut process = Command::new(&command.shell);
        process
            .arg("-c")
            .arg(&command.script)
            .envs(&command.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.workdir {
            process.current_dir(dir);
        }
        new_process_group(&mut process);

        let child = process
            .spawn()
            .map_err(|e| AgentError::Spawn(format!("{}: {}", command.shell, e)))?;

        // Held across the wait: a timeout or a dropped future kills every
        // process the script started, not only the shell
        let group = ProcessGroupGuard::new(child.id());

        let output = match timeout(command.timeout, child.wait_with_output()).await {
            Ok(result) => {
                group.disarm();
                result.map_err(|e| AgentError::Spawn(format!("{}: {}", command.shell, e)))?
            }
            Err(_) => {
                warn!("`{}` timed out after {:?}", command.script, command.timeout);
                return Err(AgentError::Timeout(command.timeout.as_secs()));
            }
        };

        let exit_code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            warn!("`{}` exited with code {}: {}", command.script, exit_code, stderr.trim());
        }

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr,
        })
    }
}

/// Kills a step's process group on drop unless disarmed
struct ProcessGroupGuard {
    pgid: Option<u32>,
}

impl ProcessGroupGuard {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    fn disarm(mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_process_group(pgid);
        }
    }
}

#[cfg(unix)]
fn new_process_group(process: &mut Command) {
    process.process_group(0);
}

#[cfg(not(unix))]
fn new_process_group(_process: &mut Command) {}

#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    debug!("Killing process group {}", pgid);
    if let Err(e) = killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
        debug!("Process group {} already gone: {}", pgid, e);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {}

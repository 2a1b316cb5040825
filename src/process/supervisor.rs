use std::io::Read;
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::output::{collect, spawn_reader};
use super::{LaunchError, ProcessControl, ProcessState, TerminateError, TerminationOutcome};
use crate::config;

/// How often to poll while waiting for an exit
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long to wait for the reader threads to hit EOF after an early exit
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Launches the target with piped standard streams and supervises it
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    launch_grace: Duration,
    args: Vec<String>,
}

impl ProcessSupervisor {
    pub fn new(launch_grace: Duration) -> Self {
        Self {
            launch_grace,
            args: Vec::new(),
        }
    }

    /// Extra arguments passed to the target
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn launch_grace(&self) -> Duration {
        self.launch_grace
    }
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new(config::get().timings.launch_grace)
    }
}

impl ProcessControl for ProcessSupervisor {
    type Handle = ManagedProcess;

    fn launch(&mut self, executable: &Path) -> Result<ManagedProcess, LaunchError> {
        if !executable.exists() {
            return Err(LaunchError::NotFound(executable.to_path_buf()));
        }

        let mut child = Command::new(executable)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                path: executable.to_path_buf(),
                source,
            })?;

        let pid = child.id();
        info!(pid, path = %executable.display(), "Launched target process");

        let stdin = child.stdin.take();
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        let mut process = ManagedProcess {
            child,
            pid,
            state: ProcessState::Running,
            stdin,
            stdout,
            stderr,
        };

        debug!(pid, grace_ms = self.launch_grace.as_millis() as u64, "Waiting for target to start");
        thread::sleep(self.launch_grace);

        let state = process.poll();
        if state.has_exited() {
            let (stdout, stderr) = process.take_output(OUTPUT_DRAIN_TIMEOUT);
            warn!(pid, code = ?state.exit_code(), "Target process exited immediately");
            if !stdout.trim().is_empty() {
                warn!(pid, "stdout: {}", stdout.trim());
            }
            if !stderr.trim().is_empty() {
                warn!(pid, "stderr: {}", stderr.trim());
            }
            return Err(LaunchError::ExitedImmediately {
                code: state.exit_code(),
                stdout,
                stderr,
            });
        }

        info!(pid, "Target process is running");
        Ok(process)
    }

    fn terminate(
        &mut self,
        handle: &mut ManagedProcess,
        grace: Duration,
    ) -> Result<TerminationOutcome, TerminateError> {
        handle.terminate(grace)
    }

    fn pid(&self, handle: &ManagedProcess) -> u32 {
        handle.pid()
    }
}

/// A spawned target process.
///
/// Owns the child, its stdin pipe (kept open so the child does not see EOF)
/// and the channels fed by the stdout/stderr reader threads.
#[derive(Debug)]
pub struct ManagedProcess {
    child: Child,
    pid: u32,
    state: ProcessState,
    stdin: Option<ChildStdin>,
    stdout: Receiver<Vec<u8>>,
    stderr: Receiver<Vec<u8>>,
}

impl ManagedProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Last observed state, without polling
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Poll liveness; once exited the state never changes again
    pub fn poll(&mut self) -> ProcessState {
        if self.state.has_exited() {
            return self.state;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.state = ProcessState::from_status(status);
                self.stdin = None;
                debug!(pid = self.pid, state = ?self.state, "Target process exited");
            }
            Ok(None) => {}
            Err(err) => warn!(pid = self.pid, error = %err, "Failed to poll target process"),
        }
        self.state
    }

    /// Everything the process has written so far, waiting up to `max_wait` for EOF
    pub fn take_output(&mut self, max_wait: Duration) -> (String, String) {
        (collect(&self.stdout, max_wait), collect(&self.stderr, max_wait))
    }

    /// Graceful terminate, bounded wait, then kill. No-op once exited.
    pub fn terminate(&mut self, grace: Duration) -> Result<TerminationOutcome, TerminateError> {
        if self.poll().has_exited() {
            debug!(pid = self.pid, "Target already exited; nothing to terminate");
            return Ok(TerminationOutcome::AlreadyExited);
        }

        info!(pid = self.pid, "Terminating target process");
        if let Err(err) = self.request_stop() {
            warn!(pid = self.pid, error = %err, "Graceful terminate failed; killing");
            return self.force_kill();
        }

        if self.wait_timeout(grace)?.has_exited() {
            info!(pid = self.pid, "Target process exited gracefully");
            return Ok(TerminationOutcome::GracefulExit);
        }

        warn!(
            pid = self.pid,
            grace_ms = grace.as_millis() as u64,
            "Target did not exit in time; killing"
        );
        self.force_kill()
    }

    #[cfg(unix)]
    fn request_stop(&mut self) -> Result<(), TerminateError> {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM).map_err(|errno| {
            TerminateError::Signal {
                pid: self.pid,
                message: errno.to_string(),
            }
        })
    }

    /// No graceful signal off unix; `terminate` falls through to a kill
    /// and reports `ForcedKill`.
    #[cfg(not(unix))]
    fn request_stop(&mut self) -> Result<(), TerminateError> {
        Err(TerminateError::Signal {
            pid: self.pid,
            message: "graceful terminate is not supported on this platform".to_string(),
        })
    }

    fn wait_timeout(&mut self, timeout: Duration) -> Result<ProcessState, TerminateError> {
        let start = Instant::now();
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    self.state = ProcessState::from_status(status);
                    self.stdin = None;
                    return Ok(self.state);
                }
                Ok(None) => {}
                Err(source) => {
                    return Err(TerminateError::Wait {
                        pid: self.pid,
                        source,
                    });
                }
            }

            if start.elapsed() >= timeout {
                return Ok(self.state);
            }
            thread::sleep(POLL_INTERVAL.min(timeout.saturating_sub(start.elapsed())));
        }
    }

    fn force_kill(&mut self) -> Result<TerminationOutcome, TerminateError> {
        if let Err(source) = self.child.kill() {
            // lost a race with a natural exit
            if self.poll().has_exited() {
                return Ok(TerminationOutcome::GracefulExit);
            }
            return Err(TerminateError::Kill {
                pid: self.pid,
                source,
            });
        }

        self.child.wait().map_err(|source| TerminateError::Wait {
            pid: self.pid,
            source,
        })?;
        self.state = ProcessState::Killed;
        self.stdin = None;
        info!(pid = self.pid, "Target process killed");
        Ok(TerminationOutcome::ForcedKill)
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        if !self.poll().has_exited() {
            warn!(pid = self.pid, "Dropping a running target process; killing it");
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Reader channel for an optional pipe; an absent pipe yields a closed channel
fn drain<R>(pipe: Option<R>) -> Receiver<Vec<u8>>
where
    R: Read + Send + 'static,
{
    match pipe {
        Some(reader) => spawn_reader(reader),
        None => {
            let (_, rx) = mpsc::channel();
            rx
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_executable_is_not_found() {
        let mut supervisor = ProcessSupervisor::new(Duration::ZERO);
        let err = supervisor
            .launch(Path::new("/no/such/emulator"))
            .unwrap_err();
        assert!(matches!(err, LaunchError::NotFound(_)));
    }

    #[test]
    fn test_args_builder() {
        let supervisor = ProcessSupervisor::new(Duration::from_millis(5)).args(["--fullscreen"]);
        assert_eq!(supervisor.args, vec!["--fullscreen".to_string()]);
        assert_eq!(supervisor.launch_grace(), Duration::from_millis(5));
    }

    #[cfg(not(unix))]
    #[test]
    fn test_terminate_without_signals_reports_forced_kill() {
        // pause blocks on the stdin pipe the supervisor keeps open
        let mut supervisor =
            ProcessSupervisor::new(Duration::from_millis(300)).args(["/C", "pause"]);
        let mut process = supervisor
            .launch(Path::new(r"C:\Windows\System32\cmd.exe"))
            .unwrap();

        let outcome = process.terminate(Duration::from_secs(1)).unwrap();
        assert_eq!(outcome, TerminationOutcome::ForcedKill);
        assert_eq!(process.state(), ProcessState::Killed);
    }
}

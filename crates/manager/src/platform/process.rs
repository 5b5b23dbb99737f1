//! Subprocess execution with captured output and an optional kill timeout

use std::io::{self, Read};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::{ProcessExecutor, ProcessOutput};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs programs directly via [`std::process::Command`]
#[derive(Debug, Clone, Default)]
pub struct SystemProcessExecutor {
    timeout: Option<Duration>,
}

impl SystemProcessExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the child after `timeout`; zero disables the limit
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    fn wait(&self, child: &mut Child) -> io::Result<(Option<std::process::ExitStatus>, bool)> {
        let Some(timeout) = self.timeout else {
            return Ok((Some(child.wait()?), false));
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok((Some(status), false));
            }
            if Instant::now() >= deadline {
                child.kill()?;
                child.wait()?;
                return Ok((None, true));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

impl ProcessExecutor for SystemProcessExecutor {
    fn run(&self, program: &str, args: &[String]) -> io::Result<ProcessOutput> {
        debug!(program = %program, args = ?args, "Spawning process");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let (status, timed_out) = self.wait(&mut child)?;

        let stdout = stdout.join().unwrap_or_default();
        let mut stderr = stderr.join().unwrap_or_default();

        if timed_out {
            warn!(
                program = %program,
                timeout_secs = self.timeout.map(|t| t.as_secs()).unwrap_or_default(),
                "Process timed out and was killed"
            );
            stderr.push_str("process killed after timeout\n");
        }

        Ok(ProcessOutput {
            success: status.is_some_and(|s| s.success()),
            stdout,
            stderr,
            exit_code: status.and_then(|s| s.code()),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_captures_output() {
        let output = SystemProcessExecutor::new()
            .run("sh", &args(&["-c", "echo out; echo err >&2"]))
            .unwrap();

        assert!(output.success);
        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[test]
    fn test_arguments_are_not_shell_interpreted() {
        let output = SystemProcessExecutor::new()
            .run("echo", &args(&["a; touch /nonexistent", "$HOME"]))
            .unwrap();

        assert_eq!(output.stdout, "a; touch /nonexistent $HOME\n");
    }

    #[test]
    fn test_failure_exit_code() {
        let output = SystemProcessExecutor::new()
            .run("sh", &args(&["-c", "exit 3"]))
            .unwrap();

        assert!(!output.success);
        assert_eq!(output.exit_code, Some(3));
    }

    #[test]
    fn test_timeout_kills_child() {
        let output = SystemProcessExecutor::new()
            .with_timeout(Duration::from_millis(200))
            .run("sleep", &args(&["5"]))
            .unwrap();

        assert!(!output.success);
        assert_eq!(output.exit_code, None);
        assert!(output.stderr.contains("timeout"));
    }

    #[test]
    fn test_missing_program() {
        assert!(SystemProcessExecutor::new()
            .run("/nonexistent/acme-client", &[])
            .is_err());
    }
}

//! Adapter around the external ACME command-line client
//!
//! The client is launched once per logical command with discrete
//! arguments. A failed run is classified into [`ClientEvent`]s; an
//! anti-replay nonce error is the only condition retried automatically,
//! bounded by the [`RetryContext`] threaded through each retry.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use certkeep_common::{RetryContext, DEFAULT_MAX_ATTEMPTS};
use tracing::{debug, error, info, warn};

use super::error::ProtocolError;
use super::output::{classify_output, ClientEvent};
use crate::platform::{ProcessExecutor, ProcessOutput};

/// Pause between nonce retries
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// A client subcommand with its flag/value pairs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcmeCommand {
    name: String,
    flags: Vec<(String, String)>,
}

impl AcmeCommand {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: Vec::new(),
        }
    }

    /// Append `flag value`
    pub fn flag(mut self, flag: impl Into<String>, value: impl Into<String>) -> Self {
        self.flags.push((flag.into(), value.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subcommand followed by each flag and its value as separate arguments
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(1 + self.flags.len() * 2);
        args.push(self.name.clone());
        for (flag, value) in &self.flags {
            args.push(flag.clone());
            args.push(value.clone());
        }
        args
    }
}

/// Result of one logical client invocation, after any retries
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    /// Exit status succeeded and no unretried error was reported
    pub success: bool,
    /// Output of the final execution
    pub output: ProcessOutput,
    /// Classified lines of the final execution (empty on success)
    pub events: Vec<ClientEvent>,
    /// Executions performed, including the first
    pub attempts: u32,
    /// The final execution failed on a nonce error with no attempts left
    pub nonce_exhausted: bool,
}

impl ExecOutcome {
    /// First error message reported by the client
    pub fn first_error(&self) -> Option<&str> {
        self.events.iter().find_map(|e| match e {
            ClientEvent::Error { message } => Some(message.as_str()),
            _ => None,
        })
    }

    /// Turn an unsuccessful outcome into the matching [`ProtocolError`]
    pub fn into_result(self) -> Result<Self, ProtocolError> {
        if self.success {
            return Ok(self);
        }
        if self.nonce_exhausted {
            return Err(ProtocolError::NonceExhausted {
                attempts: self.attempts,
            });
        }
        match self.first_error() {
            Some(message) => Err(ProtocolError::Client(message.to_string())),
            None => Err(ProtocolError::Exit {
                code: self.output.exit_code,
            }),
        }
    }
}

/// Launches the ACME client and interprets its output
pub struct AcmeClientAdapter {
    program: String,
    leading_args: Vec<String>,
    executor: Arc<dyn ProcessExecutor>,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl AcmeClientAdapter {
    /// `command_line` is the program followed by any fixed leading arguments,
    /// e.g. `["php", "/usr/local/share/acme-client/bin/acme"]`
    pub fn new(
        command_line: &[String],
        executor: Arc<dyn ProcessExecutor>,
    ) -> Result<Self, ProtocolError> {
        let (program, leading) = command_line
            .split_first()
            .filter(|(program, _)| !program.trim().is_empty())
            .ok_or_else(|| ProtocolError::Launch("ACME client command is empty".to_string()))?;

        Ok(Self {
            program: program.clone(),
            leading_args: leading.to_vec(),
            executor,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        })
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Run `command` and fail unless it succeeded
    pub fn run(&self, command: &AcmeCommand) -> Result<ExecOutcome, ProtocolError> {
        self.exec(command, RetryContext::new(self.max_attempts))?
            .into_result()
    }

    /// Run `command` under `ctx`.
    ///
    /// Only a failure to launch the client is an `Err`; an unsuccessful run is
    /// reported through [`ExecOutcome::success`].
    pub fn exec(
        &self,
        command: &AcmeCommand,
        ctx: RetryContext,
    ) -> Result<ExecOutcome, ProtocolError> {
        let mut args = self.leading_args.clone();
        args.extend(command.to_args());

        debug!(
            command = %command.name(),
            attempt = ctx.attempt(),
            max_attempts = ctx.max_attempts(),
            "Invoking ACME client"
        );

        let output = self
            .executor
            .run(&self.program, &args)
            .map_err(|e| ProtocolError::Launch(format!("{}: {}", self.program, e)))?;

        if output.success {
            info!(command = %command.name(), attempt = ctx.attempt(), "ACME client succeeded");
            return Ok(ExecOutcome {
                success: true,
                output,
                events: Vec::new(),
                attempts: ctx.attempt(),
                nonce_exhausted: false,
            });
        }

        debug!(
            command = %command.name(),
            stdout = %output.stdout,
            stderr = %output.stderr,
            "ACME client output"
        );

        let events = classify_output(&output.stdout, &output.stderr);
        if events.is_empty() {
            warn!(
                command = %command.name(),
                exit_code = ?output.exit_code,
                "ACME client failed without reporting a reason"
            );
            return Ok(ExecOutcome {
                success: output.success,
                output,
                events,
                attempts: ctx.attempt(),
                nonce_exhausted: false,
            });
        }

        let mut success = output.success;
        let mut nonce_exhausted = false;

        for event in &events {
            match event {
                ClientEvent::Info(_) | ClientEvent::Debug(_) => {}
                ClientEvent::Error { message } => {
                    if event.is_nonce_error() {
                        if let Some(next) = ctx.next() {
                            warn!(
                                command = %command.name(),
                                attempt = ctx.attempt(),
                                backoff_ms = self.retry_backoff.as_millis() as u64,
                                "Anti-replay nonce rejected, retrying"
                            );
                            thread::sleep(self.retry_backoff);
                            return self.exec(command, next);
                        }
                        error!(
                            command = %command.name(),
                            attempts = ctx.attempt(),
                            "Anti-replay nonce retries exhausted"
                        );
                        nonce_exhausted = true;
                    }
                    error!(command = %command.name(), message = %message, "ACME client error");
                    success = false;
                }
                ClientEvent::Unknown { level, raw } => {
                    warn!(
                        command = %command.name(),
                        level = %level,
                        raw = %raw,
                        "Unexpected ACME client output"
                    );
                }
            }
        }

        Ok(ExecOutcome {
            success,
            output,
            events,
            attempts: ctx.attempt(),
            nonce_exhausted,
        })
    }
}

impl std::fmt::Debug for AcmeClientAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcmeClientAdapter")
            .field("program", &self.program)
            .field("leading_args", &self.leading_args)
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff", &self.retry_backoff)
            .finish()
    }
}

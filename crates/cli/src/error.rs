// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-friendly error display with context and suggestions.
//!
//! This module provides enhanced error types that include:
//! - What went wrong (message)
//! - Why it might have happened (context)
//! - How to fix it (suggestions)

use std::fmt;

use crate::client::ClientError;

/// Error with context and recovery suggestions for user-friendly display.
#[derive(Debug)]
pub struct KeelError {
    /// What went wrong
    pub message: String,
    /// Why it might have happened
    pub context: Vec<String>,
    /// How to fix it
    pub suggestions: Vec<String>,
    /// Original error if any
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Process exit status
    pub exit_code: i32,
}

impl KeelError {
    /// Create a new error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
            source: None,
            exit_code: 1,
        }
    }

    /// Add context about why this error might have happened.
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    /// Add a suggestion for how to fix this error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Set the source error that caused this error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }
}

impl fmt::Display for KeelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            for ctx in &self.context {
                writeln!(f, "  -> {}", ctx)?;
            }
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            writeln!(f, "suggestions:")?;
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for KeelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Exit status for an admission rejection, distinct from general failure
pub const EXIT_TOO_BUSY: i32 = 75;

/// Common error builders for typical failure scenarios.
impl KeelError {
    /// Error for when a semaphore rejected admission within the wait budget.
    pub fn too_busy(name: &str, detail: &str) -> Self {
        KeelError::new(format!("Semaphore '{}' is too busy", name))
            .with_context(detail.to_string())
            .with_context("Every slot stayed held for the whole wait")
            .with_suggestion(format!("Check current holders: keel semaphore status {}", name))
            .with_suggestion("Retry later or pass a longer --timeout-ms")
            .with_exit_code(EXIT_TOO_BUSY)
    }

    /// Error for when no workflow matches an id or prefix.
    pub fn workflow_not_found(id: &str) -> Self {
        KeelError::new(format!("Workflow '{}' not found", id))
            .with_context("The id may be mistyped or belong to another state directory")
            .with_suggestion("List known workflows: keel workflow list")
    }

    /// Error for when the daemon is needed but not running.
    pub fn daemon_not_running() -> Self {
        KeelError::new("Daemon is not running")
            .with_suggestion("Start it: keel daemon start")
    }

    /// Error for when the daemon could not be started.
    pub fn daemon_start_failed(detail: &str) -> Self {
        KeelError::new("Failed to start daemon")
            .with_context(detail.to_string())
            .with_suggestion("Check the daemon log: keel daemon status")
            .with_suggestion("Run it in the foreground: keeld --config <file>")
    }
}

impl From<ClientError> for KeelError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::TooBusy { name, message } => KeelError::too_busy(&name, &message),
            ClientError::DaemonNotRunning => KeelError::daemon_not_running(),
            ClientError::DaemonStartFailed(detail) => KeelError::daemon_start_failed(&detail),
            other => KeelError::new(other.to_string()).with_source(other),
        }
    }
}

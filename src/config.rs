// ABOUTME: Job configuration model: editable draft and validated, immutable job config
// ABOUTME: Only a validated JobConfig is ever handed to the remote lifecycle client

use crate::error::ValidationError;

pub const DEFAULT_PORT: u32 = 80;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 500;
pub const DEFAULT_THREAD_COUNT: u32 = 10;
pub const DEFAULT_TIMEOUT_SECS: u32 = 4;

pub const MIN_TIMEOUT_SECS: u32 = 1;
pub const MAX_TIMEOUT_SECS: u32 = 10;

/// Form-session input for a job. Mutable, unchecked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDraft {
    pub target: String,
    pub port: u32,
    pub max_connections: u32,
    pub thread_count: u32,
    pub timeout_secs: u32,
}

impl Default for JobDraft {
    fn default() -> Self {
        Self {
            target: String::new(),
            port: DEFAULT_PORT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            thread_count: DEFAULT_THREAD_COUNT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl JobDraft {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    /// Pulls every numeric field into its allowed range. The target is left
    /// alone so a missing target still fails validation.
    pub fn clamped(mut self) -> Self {
        self.port = self.port.clamp(1, u16::MAX as u32);
        self.max_connections = self.max_connections.max(1);
        self.thread_count = self.thread_count.max(1);
        self.timeout_secs = self.timeout_secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);
        self
    }

    pub fn validate(&self) -> Result<JobConfig, ValidationError> {
        validate(self)
    }
}

/// Snapshot of a draft taken at submission time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobConfig {
    target: String,
    port: u16,
    max_connections: u32,
    thread_count: u32,
    timeout_secs: u32,
}

impl JobConfig {
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn max_connections(&self) -> u32 {
        self.max_connections
    }

    pub fn thread_count(&self) -> u32 {
        self.thread_count
    }

    pub fn timeout_secs(&self) -> u32 {
        self.timeout_secs
    }
}

/// Checks a draft and freezes it into a [`JobConfig`].
///
/// Fields are checked in declaration order and the first failure wins.
pub fn validate(draft: &JobDraft) -> Result<JobConfig, ValidationError> {
    let target = draft.target.trim();
    if target.is_empty() {
        return Err(ValidationError::MissingTarget);
    }

    let port = u16::try_from(draft.port)
        .ok()
        .filter(|port| *port != 0)
        .ok_or(ValidationError::PortOutOfRange(draft.port))?;

    if draft.max_connections == 0 {
        return Err(ValidationError::MaxConnectionsNotPositive);
    }
    if draft.thread_count == 0 {
        return Err(ValidationError::ThreadCountNotPositive);
    }
    if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&draft.timeout_secs) {
        return Err(ValidationError::TimeoutOutOfRange(draft.timeout_secs));
    }

    Ok(JobConfig {
        target: target.to_string(),
        port,
        max_connections: draft.max_connections,
        thread_count: draft.thread_count,
        timeout_secs: draft.timeout_secs,
    })
}

// ABOUTME: Library root for the diagnostic job lifecycle synchronization engine
// ABOUTME: Exposes job validation, the worker client, the reconciler, the polling scheduler and the watch console

pub mod config;
pub mod console;
pub mod error;
pub mod reconciler;
pub mod remote;
pub mod scheduler;
pub mod settings;

pub use config::{validate, JobConfig, JobDraft};
pub use error::{RemoteError, RequestError, ValidationError};
pub use reconciler::{JobRecord, JobTable, Phase, Reconciler, RefreshOutcome};
pub use remote::{LifecycleApi, RemoteClient, ServerSnapshot};
pub use scheduler::{PollHandle, PollingScheduler};
pub use settings::Settings;

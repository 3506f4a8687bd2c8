// ABOUTME: Remote lifecycle client module
// ABOUTME: Talks to the diagnostic worker over HTTP; owns no job state

pub mod client;
pub mod models;

pub use client::{LifecycleApi, RemoteClient};
pub use models::ServerSnapshot;

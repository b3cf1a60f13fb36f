//! workspace-gate - workspace selection required action for analytics workspaces
//!
//! Gates authentication on the user picking exactly one workspace binding
//! (`AnalyticsWorkspaceBinding`) and keeps that binding the only active one
//! for the user on every subsequent login.
//!
//! # Modules
//!
//! - [`crd`] - AnalyticsWorkspace and AnalyticsWorkspaceBinding resources
//! - [`client`] - Narrow Kubernetes client (list/get/patch)
//! - [`discovery`] - Finds every binding of a user
//! - [`resolver`] - Pairs bindings with their workspaces
//! - [`enforcer`] - Keeps exactly one binding per user active
//! - [`trigger`] - Per-pass state machine deciding whether to challenge
//! - [`selection`] - Applies a submitted selection
//! - [`action`] - Required-action provider tying the hooks together
//! - [`host`] - Traits the host authentication engine implements
//! - [`error`] - Error types

#![deny(missing_docs)]

pub mod action;
pub mod client;
pub mod config;
pub mod crd;
pub mod discovery;
pub mod enforcer;
pub mod error;
pub mod form;
pub mod host;
pub mod resolver;
pub mod retry;
pub mod selection;
pub mod state;
pub mod telemetry;
pub mod trigger;

#[cfg(test)]
mod testing;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Required-action id added to users and sessions that must pick a workspace
pub const PROVIDER_ID: &str = "workspace";

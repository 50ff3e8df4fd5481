// ABOUTME: Library root for pullwarden - resilient registry access for batch image scans.
// ABOUTME: The thin CLI binary is in main.rs.

pub mod auth;
pub mod batch;
pub mod checkpoint;
pub mod classify;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod output;
pub mod process;
pub mod pull;
pub mod remote;
pub mod token;
pub mod types;
pub mod verify;

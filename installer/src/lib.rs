//! Android NDK installer library.
//!
//! This crate downloads Android NDK release archives, verifies them against
//! the digests in a release table, extracts them, and installs the kit into
//! `<install-root>/<platform>/<version>/`. It backs the `ndk-installer` CLI
//! and can be driven programmatically for testing or custom workflows.
//!
//! # Modules
//!
//! - [`cleanup`] - Deferred removal of staging directories and archives
//! - [`cli`] - Command-line argument definitions
//! - [`command`] - External command execution abstraction
//! - [`dirs`] - Directory resolution abstraction for platform-specific paths
//! - [`error`] - Run-level error types
//! - [`extract`] - Archive format detection and extraction
//! - [`fetch`] - Archive download with local reuse
//! - [`install`] - Moving a located kit root into its destination
//! - [`list`] - Listing of available releases and installed kits
//! - [`locate`] - Kit root discovery inside an extracted tree
//! - [`output`] - User-facing progress and summary lines
//! - [`pipeline`] - Per-pair install pipeline and the run loop
//! - [`platform`] - Platform tags and host detection
//! - [`registry`] - The release table
//! - [`verify`] - Digest-length dispatched integrity checks

pub mod cleanup;
pub mod cli;
pub mod command;
pub mod dirs;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod install;
pub mod list;
pub mod locate;
pub mod output;
pub mod pipeline;
pub mod platform;
pub mod registry;
pub mod verify;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;

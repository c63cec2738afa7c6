//! Test fixtures
//!
//! - [`FakeRclone`]: a shell script standing in for rclone, with a source
//!   and destination tree in a temporary directory
//! - [`LocalFs`]: a [`ferry_core::RemoteFs`] over the local file system

#[cfg(unix)]
mod fake_rclone;
mod local_fs;

#[cfg(unix)]
pub use fake_rclone::FakeRclone;
pub use local_fs::LocalFs;

#![forbid(unsafe_code)]
//! Process, hashing, download, archive, and cleanup helpers for gsb.

pub mod archive;
pub mod cleanup;
pub mod download;
pub mod error;
pub mod fs;
pub mod hash;
pub mod process;

pub use error::UtilError;

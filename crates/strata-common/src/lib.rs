//! Common utilities for Strata.
//!
//! This crate provides foundational types and utilities used across all Strata crates:
//!
//! - [`BinaryReader`] - Bounds-checked little-endian reading from byte slices
//! - [`crc`] - CRC-32 (IEEE, as used by zip) hashing utilities
//! - [`path`] - Logical path normalization shared by archives and the resolver

mod error;
mod reader;

pub mod crc;
pub mod path;

pub use error::{Error, Result};
pub use reader::{BinaryReader, ReadExt};

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

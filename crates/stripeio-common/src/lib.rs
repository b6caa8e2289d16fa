//! StripeIO Common - shared types and utilities
//!
//! This crate provides the pieces every other StripeIO crate leans on:
//! the error taxonomy, engine configuration, streaming content hashing,
//! and bucket/object name handling.

pub mod config;
pub mod error;
pub mod hash;
pub mod names;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use hash::{digest_eq, ContentDigest, ContentHasher};
pub use names::{normalize_object_name, validate_bucket_name, validate_object_name};

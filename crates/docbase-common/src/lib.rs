//! docbase-common - Shared types and utilities
//!
//! This crate provides the value tree, record identifiers, error types, the
//! value codec, and the configuration surface shared by `docbase-core`.

pub mod codec;
pub mod config;
pub mod error;
pub mod id;
pub mod key;
pub mod value;

pub use config::{DatabaseOptions, Properties};
pub use error::{Error, Result};
pub use key::{Key, RecordId};
pub use value::Value;

//! Core types for the transactional list
//!
//! This crate holds the pieces shared by every layer: the error taxonomy and
//! the result alias. The engine itself lives in `txlist-stm`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;

pub use error::{AbortReason, Error, Result};

//! Utility and helper functions needed for:
//! - Fixed point and share arithmetic
//! - Access control
//! - Error handling
//! - Type casting

pub(crate) mod common;
pub mod error;

//! Topic registry building blocks.
//!
//! ## Contents
//! - [`Topic`] listeners registered under one subscription pattern
//! - pattern helpers: validation ([`validate_pattern`], [`validate_name`]),
//!   wildcard [`matches`], and [`compare_specificity`] used to order matched topics

mod pattern;
mod topic;

pub use pattern::{compare_specificity, is_wildcard, matches, normalize, validate_name, validate_pattern};
pub use topic::Topic;

pub(crate) use topic::ListenerEntry;

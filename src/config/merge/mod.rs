//! Config composition: sources layered by precedence, then deserialized.

pub mod merge_policy;
pub mod service;

//! Types shared between the paging model, its controllers and the demo harness.

pub mod domain;
pub mod error;
pub mod protocol;

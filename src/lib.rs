//! Differential fuzzer for contact-matrix range queries.
//!
//! Random 1D and 2D queries are run against an in-process reference
//! ([`reference::PixelStore`]) and an external candidate binary
//! ([`candidate::CandidateExecutor`]) by a pool of workers until a shared
//! deadline. Any difference in the returned pixels counts as a failure; any
//! error stops every worker.

pub mod candidate;
pub mod chromosomes;
pub mod compare;
pub mod config;
pub mod error;
pub mod executor;
pub mod fuzzer_structs;
pub mod orchestrator;
pub mod pixels;
pub mod query;
pub mod reference;
pub mod report;
pub mod worker;

pub use error::{FuzzerError, Result};

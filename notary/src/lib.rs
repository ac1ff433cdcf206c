//! Notary consensus: double-spend prevention for consumed states.
//!
//! A notary is the authority that decides which of two transactions
//! spending the same state wins. The first commit of a state is final.
//!
//! ## Module overview
//!
//! - [`uniqueness`]: the striped-lock uniqueness provider over a durable
//!   consumed-state log.
//! - [`service`]: request validation, time-window checks and signing of
//!   accepted transactions, in validating or non-validating mode.
//! - [`error`]: notary error types.

pub mod error;
pub mod service;
pub mod uniqueness;

pub use error::NotaryError;
pub use service::{NotaryMode, NotaryService};
pub use uniqueness::{CommitOutcome, UniquenessProvider, DEFAULT_STRIPES};

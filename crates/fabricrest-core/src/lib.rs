//! fabricrest-core — foundation traits and types for FabricREST.
//!
//! # Overview
//!
//! FabricREST is a client for graph-based network fabric controllers. The
//! core crate defines:
//!
//! - [`ApiExecutor`] — the central async trait every transport implements
//! - [`ApiRequest`] / [`HttpMethod`] — request wire types
//! - [`ApiError`] — structured error type
//! - [`ObjectId`] — controller object identity, mintable client-side
//! - [`LockRegistry`] — per-key advisory locks for read-modify-write cycles
//! - [`LinearRetry`] — linear backoff policy for eventual-consistency lookups

pub mod error;
pub mod executor;
pub mod id;
pub mod lock;
pub mod retry;

pub use error::ApiError;
pub use executor::{ApiExecutor, ApiRequest, HttpMethod};
pub use id::ObjectId;
pub use lock::{LockGuard, LockRegistry};
pub use retry::{LinearRetry, RetryConfig};

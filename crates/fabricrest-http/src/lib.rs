//! fabricrest-http — `reqwest`-backed [`HttpApiExecutor`] for FabricREST.

pub mod client;

pub use client::{HttpApiExecutor, HttpClientConfig};

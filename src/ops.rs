//! Integration layers for the external programs `prdraft` drives.
//!
//! - [`git`]: Git working-copy queries and mutations (branches, diffs, staging, pushing)
//! - [`http`]: Curl-based HTTP transport used by the hosting providers and the
//!   language-model client
//!
//! Each submodule provides a trait with a real implementation, plus a mock
//! generated for tests.

pub mod git;
pub mod http;

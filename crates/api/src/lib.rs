//! HTTP surface of the DoujinShelf catalog.
//!
//! Exposed as a library so the binary (`main.rs`) and the integration tests
//! build the exact same router.

pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;

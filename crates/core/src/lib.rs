//! Domain logic for the DoujinShelf catalog.
//!
//! This crate has no database dependency. Everything here is either pure
//! (validation, tag parsing, filtering) or talks to the filesystem through the
//! [`cover::CoverStore`] collaborator, so it can be shared by the repository
//! layer, the HTTP server, and tests alike.

pub mod cover;
pub mod entity;
pub mod error;
pub mod extra;
pub mod filter;
pub mod tags;
pub mod types;
pub mod work;

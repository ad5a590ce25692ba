//! Request handlers.
//!
//! Handlers delegate to the repositories in `doujinshelf_db` and map errors
//! via [`crate::error::AppError`].

pub mod entities;
pub mod works;

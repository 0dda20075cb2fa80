//! Core data models for the TechTube catalog.
//!
//! These entities map cleanly to database tables via `sqlx::FromRow` and
//! serialize naturally as JSON via `serde`.

pub mod user;
pub mod video;

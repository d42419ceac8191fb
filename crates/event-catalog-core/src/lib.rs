//! # Event Catalog Core
//!
//! Pure logic for the event catalog build: path classification,
//! front-matter parsing, markdown rendering, cross-reference resolution,
//! data models and the store abstraction.
//!
//! This crate does no filesystem, network or database I/O. The
//! `event-catalog` crate supplies the loader, the SQLite store and the
//! build orchestrator on top of it.

pub mod classify;
pub mod front_matter;
pub mod models;
pub mod render;
pub mod resolve;
pub mod store;

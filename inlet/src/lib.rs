//! Inlet - per-user sync engine with embedded stores and a REST API
//!
//! This crate provides the backend for a cross-device content collector:
//! one actor per user owning an embedded SQLite store, an HTTP surface for
//! the push/pull sync protocol, and an ingestion endpoint fed by the
//! external fetch pipeline.

pub mod actors;
pub mod api;
pub mod app_state;
pub mod config;

pub mod supervisor;

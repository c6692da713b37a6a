//! HTTP admin surface for the metronome scheduler.
//!
//! Exposes entry listing, run history, pause/resume, and manual triggering
//! as thin axum handlers over the scheduler's own operations. The binary in
//! `main.rs` wires a configured scheduler to this router.

pub mod app;
pub mod config;
pub mod http;

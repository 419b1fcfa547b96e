//! # ragsafe
//!
//! CLI and HTTP front ends for the ragsafe deadlock detector.
//!
//! Both surfaces translate user actions into `ragsafe_core::Session` calls.
//! Neither holds any graph state of its own.

pub mod api;
pub mod cli;
pub mod config;

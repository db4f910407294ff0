//! # pvegate Core
//!
//! Shared types, traits, and configuration for the pvegate tool gateway.
//! The hub and the CLI both build on this crate.

pub mod config;
pub mod error;
pub mod guest;
pub mod tool;

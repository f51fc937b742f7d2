//! Command handlers

pub mod config;
pub mod revision;
pub mod status;

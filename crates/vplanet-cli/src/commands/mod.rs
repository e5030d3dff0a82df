//! Command handlers

pub mod config;
pub mod event;
pub mod status;
pub mod watch;

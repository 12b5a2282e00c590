//! Orphan scanner process: configuration and HTTP surface

pub mod api;
pub mod config;

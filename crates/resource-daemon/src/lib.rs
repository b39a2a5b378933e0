//! # Resource Daemon Library
//!
//! The daemon's resource kinds, their controllers and its lifecycle, exposed for integration
//! testing.

pub mod clients;
pub mod controllers;
pub mod lifecycle;
pub mod model;

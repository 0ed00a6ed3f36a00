//! Trellis Kernel Library
//!
//! Plugin endpoint registry, capability checks and HTTP dispatch. The
//! `trellis` binary wires these into a server; integration tests drive the
//! same router through [`app::app`].

pub mod app;
pub mod auth;
pub mod bundled;
pub mod config;
pub mod dispatch;
pub mod docs;
pub mod error;
pub mod metrics;
pub mod plugin;
pub mod registry;
pub mod routes;
pub mod state;
pub mod validation;

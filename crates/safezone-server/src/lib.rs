//! # safezone-server
//!
//! WebSocket and HTTP server library for the safezone geofencing system.
//!
//! This library provides the transports around [`safezone_core`]: the `/ws`
//! endpoint, the REST API, observer fan-out, the care-request relay, and
//! alert delivery backends.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod messaging;
pub mod observers;
pub mod relay;
pub mod state;
pub mod ws;

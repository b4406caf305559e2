//! Reservation admission and conflict-resolution engine.
//!
//! Decides whether a requested reservation may be admitted, serializes
//! concurrent requests for the same resource and date through storage-layer
//! uniqueness rather than application locks, and reconciles cancellation and
//! catalog changes across connected clients via an advisory change feed.

pub mod admission;
pub mod availability;
pub mod cancellation;
pub mod config;
pub mod engine;
pub mod error;
pub mod notification;
pub mod retry;
pub mod types;

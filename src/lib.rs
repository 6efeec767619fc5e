//! Image pipeline server library.
//!
//! Uploads are stored and recorded as `pending`, published to a queue, and
//! turned into resized, thumbnail, and watermarked artifacts by a worker.

pub mod api;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod queue;
pub mod services;
pub mod transform;

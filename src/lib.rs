//! Phono download intake
//!
//! Tracks magnet downloads handed to qBittorrent, reconciles their state on a
//! fixed interval and moves finished audio into the intake directory for
//! compression and catalog import.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;

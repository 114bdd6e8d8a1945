//! Library exports for the console front end, benchmarks and tests.
/// Alert playback and the one-at-a-time alert gate.
pub mod alert;
/// Application directory helpers.
pub mod app_dirs;
/// Labels, example storage and nearest-neighbour classification.
pub mod classifier;
/// Persistent application configuration.
pub mod config;
/// Frame-to-embedding models.
pub mod embedding;
/// Frame sources.
pub mod frame;
/// Logging setup for the application.
pub mod logging;
/// Training and detection session.
pub mod session;

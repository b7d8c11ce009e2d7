//! Spectrometer transmission monitoring: baselines, transmission curves and
//! per-tick feature tracking, with an egui front-end.

pub mod app;
pub mod color;
pub mod config;
pub mod data;
pub mod device;
pub mod pipeline;
pub mod schedule;
pub mod state;
pub mod ui;

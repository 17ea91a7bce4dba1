//! Trains a U-Net that maps grayscale images to color images, and records
//! training progress and visualizations under a per-experiment run directory.

pub mod data;
pub mod dataset;
pub mod logger;
pub mod model;
pub mod show;
pub mod training;

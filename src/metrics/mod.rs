//! Metrics collection and exposition for Prometheus.
//!
//! This module provides centralized metrics recording for the request gateway
//! and the session lifecycle.

mod recorder;

pub use recorder::{Metrics, MetricsRecorder};

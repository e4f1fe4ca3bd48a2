//! The two cooperating worker threads: pre-processing (amplitude
//! conversion, outlier filtering, window emission) and detection (PCA,
//! jitter/wander, calibration hook).

pub mod detect;
pub mod preprocess;

use crate::rebuild::FilteredFrame;
use crate::ring::WindowDescriptor;

/// Messages on the ingestion channel (producer -> pre-processing worker).
pub enum IngestMsg {
	Frame(FilteredFrame),
	Stop,
}

/// Messages on the window channel (pre-processing worker -> detection worker).
pub enum WindowMsg {
	Window(WindowDescriptor),
	Stop,
}

/// Uniform "free locally, count, continue" drop bookkeeping: nothing on the
/// hot path panics, every drop reason is just a counter increment.
#[derive(Default)]
pub struct DropCounters {
	pub classify_fail: std::sync::atomic::AtomicU64,
	pub rebuild_fail: std::sync::atomic::AtomicU64,
	pub ingest_queue_full: std::sync::atomic::AtomicU64,
	pub cols_mismatch: std::sync::atomic::AtomicU64,
	pub window_queue_full: std::sync::atomic::AtomicU64,
	pub pca_divergence: std::sync::atomic::AtomicU64,
}

impl DropCounters {
	pub(crate) fn bump(counter: &std::sync::atomic::AtomicU64) {
		counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
	}
}

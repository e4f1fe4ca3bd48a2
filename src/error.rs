use std::fmt::{self, Display, Formatter};

/// Errors produced by the radar core.
///
/// None of these originate on the hot ingestion path as a panic: every
/// fallible step in classification, rebuilding, and gain compensation
/// returns one of these instead, and the ingestion callback's policy is to
/// drop the offending frame, count it, and continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadarError {
	/// A caller-supplied argument was invalid (null config, zero-length buffer).
	InvalidArgument,
	/// The requested operation is not valid in the context's current lifecycle state.
	InvalidState,
	/// No row in the sub-carrier layout table matched the frame's RX control metadata.
	UnknownLayout,
	/// A matched layout row's declared ranges overflowed the raw frame buffer.
	LayoutMismatch,
	/// The gain baseline has not accumulated enough samples yet (fewer than 50).
	BaselineNotReady,
	/// A requested forced AGC gain value would silence outgoing Wi-Fi traffic.
	UnsafeGain,
	/// `train_stop` was called with no accepted non-static wander samples.
	NoTrainingData,
	/// An operation was attempted before the calibration controller had a PCA window size to allocate against.
	NotInitialised,
	/// Power iteration failed to converge within the iteration budget; the window was skipped.
	PcaDivergence,
	/// Allocation failed. The core does not retry on desktop hosts — this variant
	/// exists for the embedded bounded-retry target an out-of-tree build may add.
	OutOfMemory,
}

impl Display for RadarError {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		match self {
			Self::InvalidArgument => write!(f, "invalid argument"),
			Self::InvalidState => write!(f, "invalid state for this operation"),
			Self::UnknownLayout => write!(f, "no sub-carrier layout matched this frame"),
			Self::LayoutMismatch => write!(f, "matched layout overflowed the raw frame buffer"),
			Self::BaselineNotReady => write!(f, "gain baseline not ready"),
			Self::UnsafeGain => write!(f, "forced rx gain <= 25 would prevent wifi packets from being sent"),
			Self::NoTrainingData => write!(f, "no training data collected"),
			Self::NotInitialised => write!(f, "calibration controller not initialised"),
			Self::PcaDivergence => write!(f, "PCA power iteration did not converge"),
			Self::OutOfMemory => write!(f, "out of memory"),
		}
	}
}

impl std::error::Error for RadarError {}

pub type Result<T> = std::result::Result<T, RadarError>;

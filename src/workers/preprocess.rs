//! Pre-processing worker: the single consumer of the ingestion queue. Turns
//! each [`FilteredFrame`] into a row of sub-carrier amplitudes, applies the
//! soft outlier filter, writes it into the ring buffer, and runs the window
//! emission policy.

use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, SyncSender};
use std::sync::{Arc, Mutex};

use crate::config::LtfType;
use crate::rebuild::FilteredFrame;
use crate::ring::{RingBuffer, WindowTracker};

use super::{DropCounters, IngestMsg, WindowMsg};

/// Converts sign-extended I/Q sample pairs into per-sub-carrier magnitudes,
/// decimating by `step` (keeping every `step`-th sub-carrier). Emits exactly
/// `pairs / step` values (integer floor) — a trailing partial group of fewer
/// than `step` pairs is dropped, not rounded up into an extra column.
fn to_amplitudes(samples: &[i16], step: usize) -> Vec<f32> {
	let step = step.max(1);
	let pairs = samples.len() / 2;
	let cols = pairs / step;
	let mut out = Vec::with_capacity(cols);
	for c in 0..cols {
		let i = c * step;
		let re = samples[i * 2] as f32;
		let im = samples[i * 2 + 1] as f32;
		out.push(re.hypot(im));
	}
	out
}

/// Soft outlier filter: a frame is a soft outlier when more than half its
/// sub-carriers deviate from the 3-frame running average by more than
/// `threshold`. It never drops a frame — an outlier is only ever logged.
/// Three consecutive soft outliers reset the streak and are accepted as the
/// new baseline (the stale running history is cleared so later frames are
/// compared against the post-streak reality instead). `threshold == 0`
/// disables the filter.
struct OutlierFilter {
	history: VecDeque<Vec<f32>>,
	streak: u8,
	frames_seen: u64,
}

impl OutlierFilter {
	fn new() -> Self {
		Self { history: VecDeque::with_capacity(3), streak: 0, frames_seen: 0 }
	}

	/// Observes one frame's amplitudes, updating the streak/history
	/// bookkeeping. The frame is always written to the ring regardless of
	/// what this finds; the filter only ever logs, it never drops.
	fn observe(&mut self, amplitudes: &[f32], threshold: u16) {
		let bypass = threshold == 0 || self.frames_seen < 3;
		self.frames_seen += 1;

		if !bypass {
			let cols = amplitudes.len();
			let mut avg = vec![0f32; cols];
			for row in &self.history {
				for c in 0..cols {
					avg[c] += row[c];
				}
			}
			let n = self.history.len().max(1) as f32;
			for v in avg.iter_mut() {
				*v /= n;
			}

			let mut bad = 0usize;
			for c in 0..cols {
				if (amplitudes[c] - avg[c]).abs() > threshold as f32 {
					bad += 1;
				}
			}
			let is_outlier = bad * 2 > cols;

			if is_outlier {
				self.streak += 1;
				if self.streak >= 3 {
					self.streak = 0;
					// Streak of 3: accept as the new baseline, clearing stale history.
					log::debug!("outlier streak of 3, accepting new baseline");
					self.history.clear();
				} else {
					log::debug!("soft outlier frame, retaining");
				}
			} else {
				self.streak = 0;
			}
		}

		if self.history.len() == 3 {
			self.history.pop_front();
		}
		self.history.push_back(amplitudes.to_vec());
	}
}

#[allow(clippy::too_many_arguments)]
pub fn run(
	rx: Receiver<IngestMsg>,
	window_tx: SyncSender<WindowMsg>,
	ring: Arc<Mutex<RingBuffer>>,
	sub_carrier_step_size: u16,
	outliers_threshold: u16,
	handle_time_ms: u32,
	handle_window: u32,
	ltf_type: LtfType,
	drops: Arc<DropCounters>,
) {
	let mut outlier_filter = OutlierFilter::new();
	let mut window = WindowTracker::new(handle_time_ms, handle_window);
	let mut cols: Option<usize> = None;
	// Counts frames actually written to the ring buffer, gap-free. A frame's
	// own `seq_id` can skip ahead of this (classification/rebuild failures
	// upstream still consume a seq_id) so the ring and the window tracker
	// index by this counter instead.
	let mut ring_seq: u32 = 0;

	loop {
		let msg = match rx.recv() {
			Ok(m) => m,
			Err(_) => break,
		};

		let frame: FilteredFrame = match msg {
			IngestMsg::Stop => break,
			IngestMsg::Frame(f) => f,
		};

		let region = frame.region(ltf_type);
		if region.is_empty() {
			// The configured LTF region wasn't present on this frame's matched
			// layout row (e.g. StbcHtLtf selected on a non-STBC frame).
			DropCounters::bump(&drops.cols_mismatch);
			log::debug!("dropping frame {}: ltf_type {:?} has no data on this layout row", frame.seq_id, ltf_type);
			continue;
		}
		let amplitudes = to_amplitudes(region, sub_carrier_step_size as usize);

		match cols {
			None => {
				cols = Some(amplitudes.len());
				ring.lock().unwrap().ensure_allocated(amplitudes.len());
			}
			Some(c) if c != amplitudes.len() => {
				DropCounters::bump(&drops.cols_mismatch);
				log::debug!("dropping frame {}: cols {} != established {}", frame.seq_id, amplitudes.len(), c);
				continue;
			}
			_ => {}
		}

		outlier_filter.observe(&amplitudes, outliers_threshold);

		{
			let mut rb = ring.lock().unwrap();
			if let Err(e) = rb.write_row(ring_seq, frame.seq_id, frame.timestamp_ms, &amplitudes) {
				log::debug!("ring write failed for frame {}: {}", frame.seq_id, e);
				continue;
			}
		}

		let descriptor = {
			let rb = ring.lock().unwrap();
			window.on_frame(ring_seq, frame.timestamp_ms, &rb)
		};
		ring_seq = ring_seq.wrapping_add(1);

		if let Some(descriptor) = descriptor {
			match window_tx.try_send(WindowMsg::Window(descriptor)) {
				Ok(()) => {}
				Err(std::sync::mpsc::TrySendError::Full(_)) => {
					DropCounters::bump(&drops.window_queue_full);
				}
				Err(std::sync::mpsc::TrySendError::Disconnected(_)) => break,
			}
		}
	}

	let _ = window_tx.try_send(WindowMsg::Stop);
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn outlier_streak_of_three_resets_baseline_without_dropping() {
		let mut f = OutlierFilter::new();
		f.observe(&[0.0, 0.0], 1);
		f.observe(&[0.0, 0.0], 1);
		f.observe(&[0.0, 0.0], 1);
		// Three consecutive wild outliers are all retained; the third resets
		// the streak and clears the stale history so it becomes the new
		// baseline. A fourth frame at the same new level must then read back
		// as non-outlier, proving the history was actually replaced, not
		// just that nothing panicked.
		f.observe(&[100.0, 100.0], 1);
		f.observe(&[100.0, 100.0], 1);
		f.observe(&[100.0, 100.0], 1);
		assert_eq!(f.streak, 0);
		let before = f.history.len();
		f.observe(&[100.0, 100.0], 1);
		assert_eq!(f.streak, 0, "a frame matching the new baseline must not register as an outlier");
		assert_eq!(f.history.len(), before, "history was already at capacity (3)");
	}

	#[test]
	fn zero_threshold_disables_filter() {
		let mut f = OutlierFilter::new();
		for _ in 0..5 {
			f.observe(&[0.0], 0);
		}
		f.observe(&[1000.0], 0);
		assert_eq!(f.streak, 0, "threshold 0 must never accumulate a streak");
	}

	#[test]
	fn amplitude_decimation_floors_a_partial_trailing_group() {
		let samples = [3i16, 4, 0, 0, 6, 8, 0, 0]; // two (3,4)->5 and (6,8)->10 pairs, step 2
		let amps = to_amplitudes(&samples, 2);
		assert_eq!(amps.len(), 2);
		assert!((amps[0] - 5.0).abs() < 1e-5);
	}

	#[test]
	fn amplitude_decimation_drops_a_trailing_partial_group_of_pairs() {
		// 5 I/Q pairs, step 2: floor(5/2) = 2 columns, not 3 — the 5th pair
		// is a partial trailing group and must not round up into an extra column.
		let samples: Vec<i16> = vec![1, 0, 2, 0, 3, 0, 4, 0, 5, 0];
		let amps = to_amplitudes(&samples, 2);
		assert_eq!(amps.len(), 2);
		assert!((amps[0] - 1.0).abs() < 1e-5);
		assert!((amps[1] - 3.0).abs() < 1e-5);
	}
}

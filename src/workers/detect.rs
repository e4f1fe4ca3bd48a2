//! Detection worker: the single consumer of the window queue. Runs PCA over
//! each emitted window, derives jitter and wander from correlation against
//! rolling history and calibration exemplars, and feeds the calibration
//! controller.

use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};

use crate::calibrate::CalibrationController;
use crate::pca::{pca, pearson_corr};
use crate::ring::RingBuffer;
use crate::RadarOutput;

use super::{DropCounters, WindowMsg};

/// Rotating history of the `W - 1` PCA outputs preceding the current one.
/// Jitter correlates the current output against exactly these `W - 1`
/// priors, so the window is one PCA output narrower than `W` — the Wth
/// output is the first with a full set of priors to correlate against.
struct PcaHistory {
	slots: Vec<Vec<f32>>,
	capacity: usize,
	next: usize,
	filled: usize,
}

impl PcaHistory {
	/// `window_size` is `W`; the history itself holds `W - 1` entries.
	fn new(window_size: usize) -> Self {
		let capacity = window_size.saturating_sub(1);
		Self { slots: Vec::with_capacity(capacity), capacity, next: 0, filled: 0 }
	}

	fn push(&mut self, output: Vec<f32>) {
		if self.capacity == 0 {
			return;
		}
		if self.slots.len() < self.capacity {
			self.slots.push(output);
		} else {
			self.slots[self.next] = output;
		}
		self.next = (self.next + 1) % self.capacity;
		self.filled = (self.filled + 1).min(self.capacity);
	}

	fn is_full(&self) -> bool {
		self.capacity > 0 && self.filled >= self.capacity
	}

	fn iter_others(&self) -> impl Iterator<Item = &Vec<f32>> {
		self.slots.iter()
	}
}

#[allow(clippy::too_many_arguments)]
pub fn run(
	rx: Receiver<WindowMsg>,
	ring: Arc<Mutex<RingBuffer>>,
	calibration: Arc<Mutex<CalibrationController>>,
	pca_window_size: u32,
	drops: Arc<DropCounters>,
	mut on_output: impl FnMut(&RadarOutput),
) {
	let mut history = PcaHistory::new(pca_window_size.max(1) as usize);

	loop {
		let descriptor = match rx.recv() {
			Ok(WindowMsg::Window(d)) => d,
			Ok(WindowMsg::Stop) | Err(_) => break,
		};

		let output = {
			let rb = ring.lock().unwrap();
			match rb.window_slices(descriptor.begin, descriptor.end) {
				Ok((a, b)) => {
					let cols = rb.cols().unwrap_or(0);
					if cols == 0 {
						continue;
					}
					let rows_a = a.len() / cols;
					let rows_b = b.len() / cols;
					pca(cols, a, rows_a, b, rows_b)
				}
				Err(_) => continue,
			}
		};

		let current = match output {
			Ok(v) => v,
			Err(e) => {
				DropCounters::bump(&drops.pca_divergence);
				log::debug!("skipping window {}..{}: {}", descriptor.begin, descriptor.end, e);
				continue;
			}
		};

		// Jitter: once the history has W-1 entries (the Wth PCA output),
		// 1 - max(|corr(curr, history)|).
		let jitter_raw = if history.is_full() {
			history
				.iter_others()
				.map(|h| pearson_corr(&current, h).abs())
				.fold(0f32, f32::max)
		} else {
			1.0
		};
		let jitter = 1.0 - jitter_raw;

		// Wander: 1 - max(|corr(exemplar, curr)|) over calibration exemplars,
		// or reported 0 (raw 1.0) when there are none yet.
		let wander_raw = {
			let cal = calibration.lock().unwrap();
			let exemplars = cal.exemplars();
			if exemplars.is_empty() {
				1.0
			} else {
				exemplars.iter().map(|ex| pearson_corr(ex, &current).abs()).fold(0f32, f32::max)
			}
		};
		let mut wander = 1.0 - wander_raw;

		let captured_exemplar = calibration.lock().unwrap().observe(jitter_raw, wander_raw, &current);
		if captured_exemplar {
			// This window's PCA output was just promoted to a calibration
			// exemplar; report it as fully static rather than whatever it
			// happened to correlate against the older exemplar set.
			wander = 0.0;
		}
		history.push(current);

		on_output(&RadarOutput { waveform_jitter: jitter, waveform_wander: wander });
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pca_history_rotates_at_w_minus_one_capacity() {
		// W = 3: the history only ever holds 2 priors, and jitter has
		// enough to correlate against starting on the 3rd push's output.
		let mut h = PcaHistory::new(3);
		assert!(!h.is_full());
		h.push(vec![1.0]);
		assert!(!h.is_full());
		h.push(vec![2.0]);
		assert!(h.is_full());
		h.push(vec![3.0]);
		assert!(h.is_full());
		assert_eq!(h.slots.len(), 2);
	}
}

//! Calibration controller: learns an empty-environment reference and
//! derives detection thresholds from it.
//!
//! Ported from `csi_training_collect_sample`/`esp_radar_train_*`. Operates
//! on the detection worker's *raw* (pre `1 - x`) correlation values — the
//! thresholds this module tracks (`0.998`, `0.99999`) are magnitudes near
//! 1.0, which only makes sense before the jitter/wander transform is
//! applied for the public callback.

use crate::error::{RadarError, Result};

const DIP_EPSILON: f32 = 0.005;
const STATIC_CUTOFF: f32 = 0.998;
const NEAR_ONE: f32 = 0.999_99;
const MAX_EXEMPLARS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
	Inactive,
	Collecting,
	Complete,
}

pub struct CalibrationController {
	state: CalibrationState,
	dip_buf: [f32; 3],
	dip_filled: usize,
	static_corr: f32,
	exemplars: Vec<Vec<f32>>,
	data_num: u32,
	/// The raw wander value reported on the previous observation, or `0.0`
	/// before any observation has happened — matching the original's
	/// `s_waveform_wander_last`, which is reset to (not left absent at) `0.0`
	/// on every training reset so the very first eligible window is already
	/// a candidate exemplar, gated only by `prev_pca` actually holding one.
	prev_wander_raw: f32,
	prev_pca: Option<Vec<f32>>,
	none_corr_sum: f32,
	none_corr_count: u32,
}

impl Default for CalibrationController {
	fn default() -> Self {
		Self {
			state: CalibrationState::Inactive,
			dip_buf: [0.0; 3],
			dip_filled: 0,
			static_corr: 1.0,
			exemplars: Vec::new(),
			data_num: 0,
			prev_wander_raw: 0.0,
			prev_pca: None,
			none_corr_sum: 0.0,
			none_corr_count: 0,
		}
	}
}

impl CalibrationController {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn state(&self) -> CalibrationState {
		self.state
	}

	/// Begins (or restarts) a calibration session. Valid from `Inactive` or
	/// `Complete`. Resets the running statistics (dip buffer, static
	/// correlation, wander accumulator) but, per the training lifecycle,
	/// retains whatever exemplars were already collected from a previous
	/// session — only [`train_remove`](Self::train_remove) clears those.
	pub fn train_start(&mut self) -> Result<()> {
		if self.state == CalibrationState::Collecting {
			return Err(RadarError::InvalidState);
		}
		self.dip_buf = [0.0; 3];
		self.dip_filled = 0;
		self.static_corr = 1.0;
		self.prev_wander_raw = 0.0;
		self.prev_pca = None;
		self.none_corr_sum = 0.0;
		self.none_corr_count = 0;
		self.state = CalibrationState::Collecting;
		log::info!("calibration: collecting");
		Ok(())
	}

	/// Aborts a session and discards everything collected.
	pub fn train_remove(&mut self) {
		*self = Self::default();
		log::info!("calibration: removed");
	}

	/// Returns the stored exemplars, used by the detection worker's wander calculation.
	pub fn exemplars(&self) -> &[Vec<f32>] {
		&self.exemplars
	}

	/// Feeds one window's raw jitter/wander correlation values and PCA output
	/// into the calibration session. A no-op unless currently `Collecting`.
	/// Returns `true` when this call just captured a new exemplar — the
	/// caller should then report this window's wander as 0 (raw 1.0),
	/// overriding whatever the correlation against existing exemplars gave.
	pub fn observe(&mut self, jitter_raw: f32, wander_raw: f32, current_pca: &[f32]) -> bool {
		if self.state != CalibrationState::Collecting {
			return false;
		}

		self.dip_buf[0] = self.dip_buf[1];
		self.dip_buf[1] = self.dip_buf[2];
		self.dip_buf[2] = jitter_raw;
		if self.dip_filled < 3 {
			self.dip_filled += 1;
		}
		if self.dip_filled < 3 {
			// Not enough dip-buffer history yet to evaluate a window at all:
			// the original returns here too, before touching static_corr,
			// exemplar capture, or the prev_wander_raw bookkeeping below.
			return false;
		}

		let (a, b, c) = (self.dip_buf[0], self.dip_buf[1], self.dip_buf[2]);
		let is_dip = (a - b) > DIP_EPSILON && (c - b) > DIP_EPSILON;
		if is_dip {
			// An isolated jitter dip: the original also returns here,
			// freezing static_corr, exemplar capture, accumulation, and
			// prev_wander_raw for this call entirely.
			log::debug!("calibration: jitter dip detected ({} < {}, {} < {}), skipping window", b, a, b, c);
			return false;
		}
		self.static_corr = self.static_corr.min(b);

		let mut captured_exemplar = false;

		// Training-sample collection itself only starts once a previous PCA
		// output exists to offer as a candidate exemplar — mirroring the
		// original's own `s_pca_subcarrier_buff_num >= 2` gate on calling
		// `csi_training_collect_sample` at all. Until then `prev_wander_raw`
		// is left untouched at its reset value, so the first eligible window
		// compares against a guaranteed-fresh `0.0`, not a stale carried-over
		// reading from a call that had nothing to capture.
		if let Some(prev_pca) = self.prev_pca.take() {
			if self.prev_wander_raw < STATIC_CUTOFF {
				// Previous moment was not static: it's an acceptable exemplar,
				// captured from the PCA output *before* it (the moment that led
				// into the non-static one).
				let index = (self.data_num as usize) % MAX_EXEMPLARS;
				if self.exemplars.len() < MAX_EXEMPLARS {
					self.exemplars.push(prev_pca);
				} else {
					self.exemplars[index] = prev_pca;
				}
				self.data_num += 1;
				captured_exemplar = true;
			} else if self.prev_wander_raw < NEAR_ONE {
				self.none_corr_sum += self.prev_wander_raw;
				self.none_corr_count += 1;
			}

			// The value remembered for next call is whatever got reported this
			// round, including the override to 1.0 on exemplar capture — not the
			// pre-override correlation against existing exemplars.
			self.prev_wander_raw = if captured_exemplar { 1.0 } else { wander_raw };
		}
		self.prev_pca = Some(current_pca.to_vec());
		captured_exemplar
	}

	/// Ends the session and returns `(wander_threshold, jitter_threshold)`.
	pub fn train_stop(&mut self) -> Result<(f32, f32)> {
		if self.state == CalibrationState::Inactive {
			return Err(RadarError::NotInitialised);
		}
		if self.none_corr_count == 0 || self.data_num == 0 {
			return Err(RadarError::NoTrainingData);
		}

		let wander_threshold = 1.0 - self.none_corr_sum / self.none_corr_count as f32;
		let jitter_threshold = 1.0 - self.static_corr;
		self.state = CalibrationState::Complete;
		Ok((wander_threshold, jitter_threshold))
	}
}

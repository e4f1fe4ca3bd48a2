//! RX gain normalisation: a rolling median baseline over (AGC, FFT) gain
//! pairs, and the dB-style compensation factor applied to sign-extended
//! samples once that baseline is ready.

use crate::error::{RadarError, Result};

const BUFF_SIZE: usize = 50;

fn clamp_i16(v: i32) -> i16 {
	v.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn clamp_i8(v: i32) -> i8 {
	v.clamp(i8::MIN as i32, i8::MAX as i32) as i8
}

/// Tracks the 50-sample (AGC, FFT) gain history and the derived baseline.
pub struct GainNormaliser {
	agc_buf: [u8; BUFF_SIZE],
	fft_buf: [i8; BUFF_SIZE],
	count: u64,
	baseline_count: usize,
	baseline: Option<(u8, i8)>,
	force: Option<(u8, i8)>,
}

impl Default for GainNormaliser {
	fn default() -> Self {
		Self {
			agc_buf: [0; BUFF_SIZE],
			fft_buf: [0; BUFF_SIZE],
			count: 0,
			baseline_count: 0,
			baseline: None,
			force: None,
		}
	}
}

impl GainNormaliser {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records one (AGC, FFT) observation. Computes the median-by-AGC baseline
	/// exactly once, the instant the 50th sample lands.
	pub fn record(&mut self, agc: u8, fft: i8) {
		let index = (self.count % BUFF_SIZE as u64) as usize;
		self.agc_buf[index] = agc;
		self.fft_buf[index] = fft;
		self.count += 1;

		if self.baseline_count < BUFF_SIZE {
			self.baseline_count += 1;
			if self.baseline_count == BUFF_SIZE {
				self.baseline = Some(self.calculate_baseline());
			}
		}
	}

	fn calculate_baseline(&self) -> (u8, i8) {
		let mut pairs: Vec<(u8, i8)> = self.agc_buf.iter().copied().zip(self.fft_buf.iter().copied()).collect();
		pairs.sort_by_key(|(agc, _)| *agc);
		pairs[BUFF_SIZE / 2]
	}

	/// Resets the accumulated baseline, forcing it to be re-collected from scratch.
	pub fn reset_baseline(&mut self) {
		self.baseline = None;
		self.baseline_count = 0;
	}

	/// Forces a fixed RX gain, bypassing the rolling baseline entirely.
	/// `(0, 0)` releases a previously forced gain.
	pub fn force_gain(&mut self, agc: u8, fft: i8) -> Result<()> {
		if agc == 0 && fft == 0 {
			self.force = None;
			return Ok(());
		}
		if agc <= 25 {
			return Err(RadarError::UnsafeGain);
		}
		self.force = Some((agc, fft));
		Ok(())
	}

	/// Returns the dB-style compensation factor for a given (AGC, FFT) pair,
	/// or `BaselineNotReady` if fewer than 50 samples have been recorded yet.
	pub fn compensation_factor(&self, agc: u8, fft: i8) -> Result<f32> {
		let (agc0, fft0) = self.baseline.ok_or(RadarError::BaselineNotReady)?;
		let exponent = ((agc as f32 - agc0 as f32) + (fft as f32 - fft0 as f32) / 4.0) / -20.0;
		Ok(10f32.powf(exponent))
	}

	/// Scales a buffer of `i16`-normalised samples in place, clamping to
	/// the 8-bit range when `as_i8` is set (the component's true on-wire
	/// width), or the full 16-bit range otherwise.
	pub fn compensate_samples(&self, samples: &mut [i16], as_i8: bool, agc: u8, fft: i8) -> Result<f32> {
		let factor = self.compensation_factor(agc, fft)?;
		for s in samples.iter_mut() {
			let scaled = (*s as f32 * factor).round() as i32;
			*s = if as_i8 { clamp_i8(scaled) as i16 } else { clamp_i16(scaled) };
		}
		Ok(factor)
	}

	pub fn is_forced(&self) -> bool {
		self.force.is_some()
	}

	pub fn baseline(&self) -> Option<(u8, i8)> {
		self.baseline
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn baseline_not_ready_before_warmup() {
		let g = GainNormaliser::new();
		assert_eq!(g.compensation_factor(40, 0), Err(RadarError::BaselineNotReady));
	}

	#[test]
	fn median_baseline_over_agc_30_40_50() {
		let mut g = GainNormaliser::new();
		// 50 samples split across three AGC values; the sorted median (index 25)
		// should land among the samples of the middle value, 40.
		let values = [30u8, 40, 50];
		for i in 0..BUFF_SIZE {
			g.record(values[i % 3], 0);
		}
		let (agc0, _fft0) = g.baseline().unwrap();
		assert!(values.contains(&agc0));
	}

	#[test]
	fn exact_scale_factor_checks() {
		let mut g = GainNormaliser::new();
		for _ in 0..BUFF_SIZE {
			g.record(40, 0);
		}
		assert!((g.compensation_factor(40, 0).unwrap() - 1.0).abs() < 1e-6);
		// agc 20 vs baseline 40: exponent = (20-40)/-20 = 1.0 -> 10^1 = 10.0.
		assert!((g.compensation_factor(20, 0).unwrap() - 10.0).abs() < 1e-5);
		assert!((g.compensation_factor(40, 4).unwrap() - 0.891_f32).abs() < 1e-3);
	}

	#[test]
	fn force_gain_rejects_unsafe_low_agc() {
		let mut g = GainNormaliser::new();
		assert_eq!(g.force_gain(25, 0), Err(RadarError::UnsafeGain));
		assert!(g.force_gain(26, 0).is_ok());
		assert!(g.is_forced());
		assert!(g.force_gain(0, 0).is_ok());
		assert!(!g.is_forced());
	}
}

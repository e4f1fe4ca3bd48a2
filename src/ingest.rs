//! The ingestion callback pipeline: MAC filtering, classification,
//! rebuilding, and optional gain compensation for one raw CSI frame.
//!
//! This module holds the synchronous, allocation-per-frame part of
//! `esp_radar_csi_rx_cb`. The queue hand-off and drop-policy bookkeeping
//! live in [`crate::RadarContext::on_csi_frame`], which is the only caller.

use crate::config::FilterConfig;
use crate::error::Result;
use crate::gain::GainNormaliser;
use crate::layout::{classify, RxControl};
use crate::rebuild::{rebuild, DataType, FilteredFrame};

/// Decides whether a frame passes the MAC filter.
///
/// An all-ones `filter_mac` accepts any source. An all-zeros `filter_mac`
/// switches to "null-data only" mode, accepting a frame only when its
/// payload is exactly 14 bytes (a null-data frame's fixed payload length) —
/// a runtime mode switch here, where the reference firmware used a
/// compile-time Kconfig flag. Otherwise the frame's source must equal
/// `filter_mac`, and if `filter_dmac_flag` is set, its destination must also
/// equal `filter_dmac`.
pub fn mac_filter_accept(filter: &FilterConfig, src_mac: [u8; 6], dst_mac: [u8; 6], payload_len: u16) -> bool {
	if filter.accept_any_source() {
		return dmac_ok(filter, dst_mac);
	}
	if filter.null_data_only() {
		return payload_len == 14 && dmac_ok(filter, dst_mac);
	}
	src_mac == filter.filter_mac && dmac_ok(filter, dst_mac)
}

fn dmac_ok(filter: &FilterConfig, dst_mac: [u8; 6]) -> bool {
	!filter.filter_dmac_flag || dst_mac == filter.filter_dmac
}

/// Runs classify -> rebuild -> optional gain compensation for one frame.
#[allow(clippy::too_many_arguments)]
pub fn run_pipeline(
	raw: &[u8],
	rx_ctrl: &RxControl,
	lltf_bit_mode: bool,
	seq_id: u32,
	timestamp_ms: u32,
	agc_gain: u8,
	fft_gain: i8,
	gain: &GainNormaliser,
	compensate_en: bool,
) -> Result<FilteredFrame> {
	let row = classify(rx_ctrl, raw.len(), lltf_bit_mode)?;
	let mut frame = rebuild(raw, row, lltf_bit_mode, seq_id, timestamp_ms, agc_gain, fft_gain)?;

	if compensate_en {
		// BaselineNotReady is not a hard failure here: compensation is a
		// quality-of-life adjustment, not a correctness requirement, so an
		// unready baseline just means the frame passes through unscaled.
		let as_i8 = frame.data_type == DataType::I8;
		match gain.compensate_samples(&mut frame.samples, as_i8, agc_gain, fft_gain) {
			Ok(_) | Err(crate::error::RadarError::BaselineNotReady) => {}
			Err(e) => return Err(e),
		}
	}

	Ok(frame)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn cfg(mac: [u8; 6]) -> FilterConfig {
		FilterConfig { filter_mac: mac, filter_dmac: [0; 6], filter_dmac_flag: false }
	}

	#[test]
	fn all_ones_accepts_any_source() {
		let f = cfg([0xff; 6]);
		assert!(mac_filter_accept(&f, [1, 2, 3, 4, 5, 6], [0; 6], 100));
	}

	#[test]
	fn all_zeros_accepts_only_null_data_length() {
		let f = cfg([0; 6]);
		assert!(mac_filter_accept(&f, [9; 6], [0; 6], 14));
		assert!(!mac_filter_accept(&f, [9; 6], [0; 6], 15));
	}

	#[test]
	fn specific_source_must_match() {
		let f = cfg([1, 2, 3, 4, 5, 6]);
		assert!(mac_filter_accept(&f, [1, 2, 3, 4, 5, 6], [0; 6], 100));
		assert!(!mac_filter_accept(&f, [1, 2, 3, 4, 5, 7], [0; 6], 100));
	}

	#[test]
	fn dest_mac_filter_when_armed() {
		let mut f = cfg([0xff; 6]);
		f.filter_dmac_flag = true;
		f.filter_dmac = [9; 6];
		assert!(mac_filter_accept(&f, [1; 6], [9; 6], 100));
		assert!(!mac_filter_accept(&f, [1; 6], [8; 6], 100));
	}
}

//! Static sub-carrier layout table and the frame classifier that matches a
//! raw CSI frame against one row of it.
//!
//! The table below is reproduced bit-exact from the ESP32/S2/S3/C3 variant
//! of the reference radar's layout table: secondary-channel none/below/above,
//! crossed with {non-HT, HT} signal mode, {20MHz, 40MHz} bandwidth, and
//! STBC on/off. Byte ranges are half-open `[start, end)` and are listed in
//! row-declaration order, which the rebuilder copies in verbatim — they are
//! not sorted by start offset.

use crate::error::{RadarError, Result};

/// Secondary channel position relative to the primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondaryChannel {
	None,
	Below,
	Above,
}

/// PHY signal mode of the received frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalMode {
	NonHt,
	Ht,
	He,
}

/// Channel bandwidth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bandwidth {
	Mhz20,
	Mhz40,
}

/// The decoded subset of RX control metadata the classifier needs.
///
/// Full SIG-A decoding per modulation class is a platform concern (out of
/// scope here) — the caller hands us the already-decoded fields.
#[derive(Debug, Clone, Copy)]
pub struct RxControl {
	pub secondary_channel: SecondaryChannel,
	pub signal_mode: SignalMode,
	pub bandwidth: Bandwidth,
	pub stbc: bool,
	/// Total CSI buffer length reported by the radio for this frame.
	pub total_bytes: u16,
}

/// One contiguous valid byte range within the raw CSI buffer, half-open `[start, end)`.
pub type ByteRange = (u16, u16);

/// A single row of the sub-carrier layout table.
pub struct SubCarrierLayout {
	pub second: SecondaryChannel,
	pub signal_mode: SignalMode,
	pub bandwidth: Bandwidth,
	pub stbc: bool,
	pub total_bytes: u16,
	pub valid_bytes: u16,
	pub lltf: &'static [ByteRange],
	pub ht_ltf: &'static [ByteRange],
	pub stbc_ht_ltf: &'static [ByteRange],
	pub he_ltf: &'static [ByteRange],
	pub stbc_he_ltf: &'static [ByteRange],
}

const EMPTY: &[ByteRange] = &[];

use SecondaryChannel::*;
use SignalMode::*;
use Bandwidth::*;

pub static SUB_CARRIER_TABLE: &[SubCarrierLayout] = &[
	// --- secondary channel: none ---
	SubCarrierLayout {
		second: None, signal_mode: NonHt, bandwidth: Mhz20, stbc: false,
		total_bytes: 128, valid_bytes: 104,
		lltf: &[(76, 128), (2, 54)], ht_ltf: EMPTY, stbc_ht_ltf: EMPTY, he_ltf: EMPTY, stbc_he_ltf: EMPTY,
	},
	SubCarrierLayout {
		second: None, signal_mode: Ht, bandwidth: Mhz20, stbc: false,
		total_bytes: 256, valid_bytes: 216,
		lltf: &[(76, 128), (2, 54)], ht_ltf: &[(200, 256), (130, 186)], stbc_ht_ltf: EMPTY, he_ltf: EMPTY, stbc_he_ltf: EMPTY,
	},
	SubCarrierLayout {
		second: None, signal_mode: Ht, bandwidth: Mhz20, stbc: true,
		total_bytes: 384, valid_bytes: 328,
		lltf: &[(76, 128), (2, 54)],
		ht_ltf: &[(200, 256), (130, 186)],
		stbc_ht_ltf: &[(258, 314), (328, 384)],
		he_ltf: EMPTY, stbc_he_ltf: EMPTY,
	},
	// --- secondary channel: below ---
	SubCarrierLayout {
		second: Below, signal_mode: NonHt, bandwidth: Mhz20, stbc: false,
		total_bytes: 128, valid_bytes: 104,
		lltf: &[(12, 64), (66, 118)], ht_ltf: EMPTY, stbc_ht_ltf: EMPTY, he_ltf: EMPTY, stbc_he_ltf: EMPTY,
	},
	SubCarrierLayout {
		second: Below, signal_mode: Ht, bandwidth: Mhz20, stbc: false,
		total_bytes: 256, valid_bytes: 216,
		lltf: &[(12, 64), (66, 118)], ht_ltf: &[(132, 188), (190, 246)], stbc_ht_ltf: EMPTY, he_ltf: EMPTY, stbc_he_ltf: EMPTY,
	},
	SubCarrierLayout {
		second: Below, signal_mode: Ht, bandwidth: Mhz20, stbc: true,
		total_bytes: 380, valid_bytes: 328,
		lltf: &[(12, 64), (66, 118)],
		ht_ltf: &[(132, 188), (190, 246)],
		stbc_ht_ltf: &[(256, 312), (314, 370)],
		he_ltf: EMPTY, stbc_he_ltf: EMPTY,
	},
	SubCarrierLayout {
		second: Below, signal_mode: Ht, bandwidth: Mhz40, stbc: false,
		total_bytes: 384, valid_bytes: 328,
		lltf: &[(12, 64), (66, 118)],
		ht_ltf: &[(268, 324), (326, 382), (132, 188), (190, 246)],
		stbc_ht_ltf: EMPTY, he_ltf: EMPTY, stbc_he_ltf: EMPTY,
	},
	SubCarrierLayout {
		second: Below, signal_mode: Ht, bandwidth: Mhz40, stbc: true,
		total_bytes: 612, valid_bytes: 552,
		lltf: &[(12, 64), (66, 118)],
		ht_ltf: &[(254, 310), (312, 368), (132, 188), (190, 246)],
		stbc_ht_ltf: &[(496, 552), (554, 610), (374, 430), (432, 488)],
		he_ltf: EMPTY, stbc_he_ltf: EMPTY,
	},
	// --- secondary channel: above ---
	SubCarrierLayout {
		second: Above, signal_mode: NonHt, bandwidth: Mhz20, stbc: false,
		total_bytes: 128, valid_bytes: 104,
		lltf: &[(12, 64), (66, 118)], ht_ltf: EMPTY, stbc_ht_ltf: EMPTY, he_ltf: EMPTY, stbc_he_ltf: EMPTY,
	},
	SubCarrierLayout {
		second: Above, signal_mode: Ht, bandwidth: Mhz20, stbc: false,
		total_bytes: 256, valid_bytes: 216,
		lltf: &[(12, 64), (66, 118)], ht_ltf: &[(132, 188), (190, 246)], stbc_ht_ltf: EMPTY, he_ltf: EMPTY, stbc_he_ltf: EMPTY,
	},
	SubCarrierLayout {
		second: Above, signal_mode: Ht, bandwidth: Mhz20, stbc: true,
		total_bytes: 380, valid_bytes: 328,
		lltf: &[(12, 64), (66, 118)],
		ht_ltf: &[(132, 188), (190, 246)],
		stbc_ht_ltf: &[(256, 312), (314, 370)],
		he_ltf: EMPTY, stbc_he_ltf: EMPTY,
	},
	SubCarrierLayout {
		second: Above, signal_mode: Ht, bandwidth: Mhz40, stbc: false,
		total_bytes: 384, valid_bytes: 328,
		lltf: &[(12, 64), (66, 118)],
		ht_ltf: &[(268, 324), (326, 382), (132, 188), (190, 246)],
		stbc_ht_ltf: EMPTY, he_ltf: EMPTY, stbc_he_ltf: EMPTY,
	},
	SubCarrierLayout {
		second: Above, signal_mode: Ht, bandwidth: Mhz40, stbc: true,
		total_bytes: 612, valid_bytes: 552,
		lltf: &[(12, 64), (66, 118)],
		ht_ltf: &[(254, 310), (312, 368), (132, 188), (190, 246)],
		stbc_ht_ltf: &[(496, 552), (554, 610), (374, 430), (432, 488)],
		he_ltf: EMPTY, stbc_he_ltf: EMPTY,
	},
];

/// Matches a frame against the layout table.
///
/// `lltf_bit_mode` selects the 12-bit-LLTF-only classifier used on radios
/// that only ever emit the legacy LLTF region: matching is then purely by
/// `total_bytes == raw_len`, against any row (the first one with equal
/// `total_bytes` wins, so the table must not declare two rows of equal
/// `total_bytes` when this mode is in play).
pub fn classify(rx_ctrl: &RxControl, raw_len: usize, lltf_bit_mode: bool) -> Result<&'static SubCarrierLayout> {
	if lltf_bit_mode {
		return SUB_CARRIER_TABLE
			.iter()
			.find(|row| row.total_bytes as usize == raw_len)
			.ok_or(RadarError::UnknownLayout);
	}

	SUB_CARRIER_TABLE
		.iter()
		.find(|row| {
			row.second == rx_ctrl.secondary_channel
				&& row.signal_mode == rx_ctrl.signal_mode
				&& row.bandwidth == rx_ctrl.bandwidth
				&& row.stbc == rx_ctrl.stbc
				&& row.total_bytes == rx_ctrl.total_bytes
		})
		.ok_or(RadarError::UnknownLayout)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ctrl(second: SecondaryChannel, mode: SignalMode, bw: Bandwidth, stbc: bool, total_bytes: u16) -> RxControl {
		RxControl { secondary_channel: second, signal_mode: mode, bandwidth: bw, stbc, total_bytes }
	}

	#[test]
	fn every_table_row_is_reachable() {
		for row in SUB_CARRIER_TABLE {
			let c = ctrl(row.second, row.signal_mode, row.bandwidth, row.stbc, row.total_bytes);
			let matched = classify(&c, row.total_bytes as usize, false).expect("row should match itself");
			assert_eq!(matched.total_bytes, row.total_bytes);
			assert_eq!(matched.valid_bytes, row.valid_bytes);
		}
	}

	#[test]
	fn unmatched_shape_is_unknown_layout() {
		let c = ctrl(SecondaryChannel::None, SignalMode::He, Bandwidth::Mhz20, false, 9999);
		assert_eq!(classify(&c, 9999, false), Err(RadarError::UnknownLayout));
	}

	#[test]
	fn ht20_below_non_stbc_scenario_row() {
		// The literal scenario in the testable-properties section: HT20 non-STBC,
		// secondary below, total_bytes=256/valid_bytes=216/lltf_bytes=104/ht_ltf_bytes=112.
		let c = ctrl(SecondaryChannel::Below, SignalMode::Ht, Bandwidth::Mhz20, false, 256);
		let row = classify(&c, 256, false).unwrap();
		assert_eq!(row.valid_bytes, 216);
		assert_eq!(row.lltf.iter().map(|(a, b)| b - a).sum::<u16>(), 104);
		assert_eq!(row.ht_ltf.iter().map(|(a, b)| b - a).sum::<u16>(), 112);
	}

	#[test]
	fn lltf_bit_mode_matches_by_total_bytes_only() {
		let c = ctrl(SecondaryChannel::None, SignalMode::NonHt, Bandwidth::Mhz20, false, 128);
		let row = classify(&c, 128, true).unwrap();
		assert_eq!(row.total_bytes, 128);
	}
}

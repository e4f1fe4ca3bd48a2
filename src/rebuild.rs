//! Copies the valid tone ranges declared by a matched [`SubCarrierLayout`]
//! row out of a raw CSI buffer into a contiguous filtered buffer.
//!
//! Ranges are copied in row-declaration order (LLTF, then HT-LTF, then
//! STBC-HT-LTF, then HE-LTF, then STBC-HE-LTF), not sorted by start offset
//! — the declaration order is itself the tone ordering the rest of the
//! pipeline expects.
//!
//! Most radios hand over one signed byte per I/Q component (`DataType::I8`);
//! the 12-bit-LLTF-only mode instead packs a signed 12-bit value into each
//! little-endian 16-bit word (`DataType::I16`) and those words must be
//! sign-extended by a left-then-arithmetic-right shift of 4 bits. Either way
//! the rebuilt buffer is normalised to one `i16` per component so the rest of
//! the pipeline never needs to branch on sample width again.

use crate::config::LtfType;
use crate::error::{RadarError, Result};
use crate::layout::{ByteRange, SubCarrierLayout};

/// The on-the-wire width of one I/Q component in the matched raw frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
	/// One signed byte per component (the common case).
	I8,
	/// A signed 12-bit value packed into a little-endian 16-bit word
	/// (12-bit-LLTF-only radios).
	I16,
}

/// A CSI frame after its valid tone ranges have been extracted and
/// normalised to one `i16` per I/Q component.
///
/// Owned, heap-allocated, and moved frame-by-frame through the ingestion
/// queue; the pre-processing worker is the sole owner once it is received.
pub struct FilteredFrame {
	pub seq_id: u32,
	pub timestamp_ms: u32,
	pub data_type: DataType,
	/// Component samples, interleaved real/imag, one pair per sub-carrier,
	/// concatenated in region-declaration order: LLTF, HT-LTF, STBC-HT-LTF,
	/// HE-LTF, STBC-HE-LTF.
	pub samples: Vec<i16>,
	/// Component counts of each region within `samples`, in the same order
	/// they were concatenated — the per-region `valid_*_len` counters of the
	/// data model, used by [`FilteredFrame::region`] to slice out the one
	/// region a configured [`LtfType`] selects.
	pub valid_lltf_len: usize,
	pub valid_ht_ltf_len: usize,
	pub valid_stbc_ht_ltf_len: usize,
	pub valid_he_ltf_len: usize,
	pub valid_stbc_he_ltf_len: usize,
	pub agc_gain: u8,
	pub fft_gain: i8,
}

impl FilteredFrame {
	/// Slices out the component range belonging to one configured LTF
	/// region, mirroring the original's `ltf_type`-keyed offset/length
	/// switch. Empty if that region wasn't present on the matched layout row
	/// (e.g. `StbcHtLtf` selected on a non-STBC frame).
	pub fn region(&self, ltf_type: LtfType) -> &[i16] {
		let (offset, len) = match ltf_type {
			LtfType::Lltf => (0, self.valid_lltf_len),
			LtfType::HtLtf => (self.valid_lltf_len, self.valid_ht_ltf_len),
			LtfType::StbcHtLtf => (self.valid_lltf_len + self.valid_ht_ltf_len, self.valid_stbc_ht_ltf_len),
			LtfType::HeLtf => {
				(self.valid_lltf_len + self.valid_ht_ltf_len + self.valid_stbc_ht_ltf_len, self.valid_he_ltf_len)
			}
			LtfType::StbcHeLtf => (
				self.valid_lltf_len + self.valid_ht_ltf_len + self.valid_stbc_ht_ltf_len + self.valid_he_ltf_len,
				self.valid_stbc_he_ltf_len,
			),
		};
		&self.samples[offset..offset + len]
	}
}

fn copy_ranges(raw: &[u8], ranges: &[ByteRange], data_type: DataType, out: &mut Vec<i16>) -> Result<usize> {
	let before = out.len();
	for &(start, end) in ranges {
		let (start, end) = (start as usize, end as usize);
		if end > raw.len() || start > end {
			return Err(RadarError::LayoutMismatch);
		}
		let region = &raw[start..end];
		match data_type {
			DataType::I8 => {
				out.extend(region.iter().map(|&b| b as i8 as i16));
			}
			DataType::I16 => {
				for chunk in region.chunks_exact(2) {
					let word = u16::from_le_bytes([chunk[0], chunk[1]]);
					let sign_extended = ((word << 4) as i16) >> 4;
					out.push(sign_extended);
				}
			}
		}
	}
	Ok(out.len() - before)
}

/// Rebuilds a filtered frame from a raw CSI buffer and a previously matched
/// layout row. `lltf_bit_mode` selects [`DataType::I16`]; otherwise every
/// component is a plain signed byte.
pub fn rebuild(
	raw: &[u8],
	row: &SubCarrierLayout,
	lltf_bit_mode: bool,
	seq_id: u32,
	timestamp_ms: u32,
	agc_gain: u8,
	fft_gain: i8,
) -> Result<FilteredFrame> {
	let data_type = if lltf_bit_mode { DataType::I16 } else { DataType::I8 };
	let mut samples = Vec::with_capacity(row.valid_bytes as usize);

	let valid_lltf_len = copy_ranges(raw, row.lltf, data_type, &mut samples)?;
	let valid_ht_ltf_len = copy_ranges(raw, row.ht_ltf, data_type, &mut samples)?;
	let valid_stbc_ht_ltf_len = copy_ranges(raw, row.stbc_ht_ltf, data_type, &mut samples)?;
	let valid_he_ltf_len = copy_ranges(raw, row.he_ltf, data_type, &mut samples)?;
	let valid_stbc_he_ltf_len = copy_ranges(raw, row.stbc_he_ltf, data_type, &mut samples)?;

	let expected = match data_type {
		DataType::I8 => row.valid_bytes as usize,
		DataType::I16 => row.valid_bytes as usize / 2,
	};
	if samples.len() != expected {
		return Err(RadarError::LayoutMismatch);
	}

	Ok(FilteredFrame {
		seq_id,
		timestamp_ms,
		data_type,
		samples,
		valid_lltf_len,
		valid_ht_ltf_len,
		valid_stbc_ht_ltf_len,
		valid_he_ltf_len,
		valid_stbc_he_ltf_len,
		agc_gain,
		fft_gain,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn word_bytes(v: u16) -> [u8; 2] {
		v.to_le_bytes()
	}

	#[test]
	fn sign_extends_12_bit_samples() {
		let cases = [(0x000u16, 0i16), (0x7FF, 2047), (0x800, -2048), (0xFFF, -1)];
		for (raw_word, expected) in cases {
			let word = ((word_bytes(raw_word << 4)[1] as u16) << 8) | word_bytes(raw_word << 4)[0] as u16;
			let got = ((word << 4) as i16) >> 4;
			assert_eq!(got, expected, "input {:#x}", raw_word);
		}
	}

	#[test]
	fn rebuild_exactness_on_known_row_8bit() {
		// HT20 non-STBC secondary-below row: total_bytes 256, valid_bytes 216.
		// Default (non-LLTF-bit) mode: one i8 component per byte.
		let row = crate::layout::SUB_CARRIER_TABLE
			.iter()
			.find(|r| r.total_bytes == 256 && r.second == crate::layout::SecondaryChannel::Below && !r.stbc)
			.unwrap();
		let raw = vec![0xABu8; 256];
		let frame = rebuild(&raw, row, false, 1, 1000, 40, 0).unwrap();
		assert_eq!(frame.samples.len(), row.valid_bytes as usize);
		assert_eq!(frame.data_type, DataType::I8);
	}

	#[test]
	fn rebuild_exactness_on_known_row_12bit_lltf() {
		let row = crate::layout::SUB_CARRIER_TABLE
			.iter()
			.find(|r| r.total_bytes == 256 && r.second == crate::layout::SecondaryChannel::Below && !r.stbc)
			.unwrap();
		let raw = vec![0xABu8; 256];
		let frame = rebuild(&raw, row, true, 1, 1000, 40, 0).unwrap();
		assert_eq!(frame.samples.len() * 2, row.valid_bytes as usize);
		assert_eq!(frame.data_type, DataType::I16);
	}

	#[test]
	fn region_selects_ht_ltf_and_leaves_lltf_out() {
		// HT20 non-STBC secondary-below row: lltf_bytes=104 (52 components),
		// ht_ltf_bytes=112 (112 components in 8-bit mode).
		let row = crate::layout::SUB_CARRIER_TABLE
			.iter()
			.find(|r| r.total_bytes == 256 && r.second == crate::layout::SecondaryChannel::Below && !r.stbc)
			.unwrap();
		let raw = vec![0xABu8; 256];
		let frame = rebuild(&raw, row, false, 1, 1000, 40, 0).unwrap();
		assert_eq!(frame.valid_lltf_len, 104);
		assert_eq!(frame.valid_ht_ltf_len, 112);
		assert_eq!(frame.region(crate::config::LtfType::HtLtf).len(), 112);
		assert_eq!(frame.region(crate::config::LtfType::Lltf).len(), 104);
		// This row has no STBC-HT-LTF/HE-LTF regions at all.
		assert!(frame.region(crate::config::LtfType::StbcHtLtf).is_empty());
		assert!(frame.region(crate::config::LtfType::HeLtf).is_empty());
	}

	#[test]
	fn overflowing_range_is_layout_mismatch() {
		let row = &crate::layout::SUB_CARRIER_TABLE[0];
		let raw = vec![0u8; 4]; // far shorter than the row's declared ranges
		assert_eq!(rebuild(&raw, row, false, 1, 0, 0, 0), Err(RadarError::LayoutMismatch));
	}
}

//! Configuration surface: `csi_recv_interval`, sub-carrier decimation,
//! outlier sensitivity, PCA window size, LTF selection, MAC filtering, and
//! the opaque per-modulation acquire flags a real radio driver consumes.

/// Which single LTF region's samples feed the pre-processing/PCA pipeline,
/// mirroring the original's `radar_ltf_type_t`. Selecting a region absent
/// from the matched layout row (e.g. `StbcHtLtf` on a non-STBC frame) yields
/// zero sub-carriers for that frame, same as the reference's "LTF type has no
/// data" warning path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LtfType {
	Lltf,
	#[default]
	HtLtf,
	StbcHtLtf,
	HeLtf,
	StbcHeLtf,
}

/// Opaque per-modulation CSI acquisition flags, passed through to the
/// (out-of-scope) radio collaborator without interpretation.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcquireCsiFlags {
	pub legacy: bool,
	pub ht20: bool,
	pub ht40: bool,
	pub stbc_ht20: bool,
	pub stbc_ht40: bool,
	pub he20: bool,
	pub stbc_he20: bool,
}

/// MAC-address ingestion filter.
#[derive(Debug, Clone, Copy)]
pub struct FilterConfig {
	/// Source MAC filter. All-ones (`[0xff; 6]`) accepts any source.
	pub filter_mac: [u8; 6],
	/// Destination MAC filter, only consulted when `filter_dmac_flag` is set.
	pub filter_dmac: [u8; 6],
	pub filter_dmac_flag: bool,
}

impl Default for FilterConfig {
	fn default() -> Self {
		Self { filter_mac: [0xff; 6], filter_dmac: [0; 6], filter_dmac_flag: false }
	}
}

impl FilterConfig {
	pub fn accept_any_source(&self) -> bool {
		self.filter_mac == [0xff; 6]
	}

	/// All-zeros source filter means "accept only null-data frames" — a
	/// runtime-configurable mode here rather than the compile-time Kconfig
	/// flag the reference firmware uses (no Rust equivalent to Kconfig).
	pub fn null_data_only(&self) -> bool {
		self.filter_mac == [0u8; 6]
	}
}

/// CSI-path configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CsiConfig {
	pub csi_recv_interval_ms: u32,
	pub sub_carrier_step_size: u16,
	pub outliers_threshold: u16,
	pub csi_compensate_en: bool,
}

impl Default for CsiConfig {
	fn default() -> Self {
		Self { csi_recv_interval_ms: 100, sub_carrier_step_size: 4, outliers_threshold: 8, csi_compensate_en: false }
	}
}

/// Detection-path configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionConfig {
	pub pca_window_size: u32,
	pub csi_handle_time_ms: u32,
	pub ltf_type: LtfType,
}

impl Default for DetectionConfig {
	fn default() -> Self {
		Self { pca_window_size: 4, csi_handle_time_ms: 800, ltf_type: LtfType::HtLtf }
	}
}

/// Full radar configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct RadarConfig {
	pub csi: CsiConfig,
	pub detection: DetectionConfig,
	pub filter: FilterConfig,
	pub acquire: AcquireCsiFlags,
}

impl RadarConfig {
	/// The effective handle window, in frame counts: `2 * (handle_time / recv_interval)`,
	/// clamped up so it is never shorter than `recv_interval * pca_window_size` would need.
	pub fn handle_window(&self) -> u32 {
		let mut handle_time = self.detection.csi_handle_time_ms;
		let min_handle_time = self.csi.csi_recv_interval_ms * self.detection.pca_window_size;
		if handle_time < min_handle_time {
			log::warn!(
				"csi_handle_time {}ms too short for pca_window_size {}, clamping to {}ms",
				handle_time, self.detection.pca_window_size, min_handle_time
			);
			handle_time = min_handle_time;
		}
		2 * (handle_time / self.csi.csi_recv_interval_ms.max(1))
	}

	/// Ring buffer capacity: `handle_window + 20` frames of headroom.
	pub fn buff_size(&self) -> u32 {
		self.handle_window() + 20
	}
}

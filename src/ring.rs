//! The lazily-allocated amplitude ring buffer and the half-overlapping
//! window emission policy that decides when a span of it is ready for PCA.
//!
//! Ported from `csi_window_update`/`csi_prepare_amplitude`. The ring buffer
//! is a single contiguous `Vec<f32>` of `buff_size * cols` cells, sized once
//! the first admitted frame's LTF region fixes `cols`; the pre-processing
//! worker is its sole writer, and the detection worker only ever receives
//! `(begin, end, window)` indices into it, never the buffer itself.

use crate::error::{RadarError, Result};

/// A packed descriptor for one emitted window: two wraparound-aware row
/// indices into the ring buffer plus the row count. Packed into a single
/// `u32` the way the reference implementation packs its window-queue
/// entries into one word, so the capacity-1 window queue never needs to
/// move more than 4 bytes per post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowDescriptor {
	pub begin: u32,
	pub end: u32,
	pub window: u32,
}

impl WindowDescriptor {
	pub fn to_packed(self) -> u32 {
		(self.begin & 0xFFF) | ((self.end & 0xFFF) << 12) | ((self.window & 0xFF) << 24)
	}

	pub fn from_packed(v: u32) -> Self {
		Self { begin: v & 0xFFF, end: (v >> 12) & 0xFFF, window: (v >> 24) & 0xFF }
	}
}

/// Amplitude matrix storage: one row per admitted frame, `cols` sub-carriers
/// per row, wrapping around at `buff_size` rows. Also keeps the parallel
/// seq-id and millisecond-timestamp arrays the data model calls for — the
/// window policy looks timestamps up by ring position here rather than
/// caching its own copy, so a half-overlap window's new start position
/// reports the timestamp it was actually recorded with, not "now".
pub struct RingBuffer {
	cols: Option<usize>,
	buff_size: usize,
	data: Vec<f32>,
	seq_ids: Vec<u32>,
	timestamps_ms: Vec<u32>,
}

impl RingBuffer {
	pub fn new(buff_size: usize) -> Self {
		Self {
			cols: None,
			buff_size,
			data: Vec::new(),
			seq_ids: vec![0; buff_size],
			timestamps_ms: vec![0; buff_size],
		}
	}

	pub fn cols(&self) -> Option<usize> {
		self.cols
	}

	/// Fixes `cols` from the first admitted frame's sample count and
	/// allocates the backing storage. Later calls are no-ops as long as
	/// `cols` matches; callers reject frames whose derived `cols` differs
	/// before calling this.
	pub fn ensure_allocated(&mut self, cols: usize) {
		if self.cols.is_none() {
			self.cols = Some(cols);
			self.data = vec![0f32; self.buff_size * cols];
		}
	}

	/// Writes one row of amplitudes at the given ring-internal frame count
	/// (wrapped modulo `buff_size`), alongside the frame's original
	/// ingestion `seq_id` and millisecond timestamp for later lookup.
	pub fn write_row(&mut self, ring_seq: u32, seq_id: u32, timestamp_ms: u32, amplitudes: &[f32]) -> Result<()> {
		let cols = self.cols.ok_or(RadarError::NotInitialised)?;
		if amplitudes.len() != cols {
			return Err(RadarError::LayoutMismatch);
		}
		let row = (ring_seq as usize) % self.buff_size;
		let start = row * cols;
		self.data[start..start + cols].copy_from_slice(amplitudes);
		self.seq_ids[row] = seq_id;
		self.timestamps_ms[row] = timestamp_ms;
		Ok(())
	}

	/// Looks up the millisecond timestamp recorded for the frame written at
	/// ring-internal count `ring_seq`.
	pub fn timestamp_for(&self, ring_seq: u32) -> u32 {
		self.timestamps_ms[(ring_seq as usize) % self.buff_size.max(1)]
	}

	/// Returns the two wraparound-aware slices covering `[begin, end]`
	/// inclusive-begin/inclusive-end row range (`begin` may be greater than
	/// `end` when the span wraps past `buff_size`).
	pub fn window_slices(&self, begin: u32, end: u32) -> Result<(&[f32], &[f32])> {
		let cols = self.cols.ok_or(RadarError::NotInitialised)?;
		let begin = (begin as usize) % self.buff_size;
		let end = (end as usize) % self.buff_size;

		if begin <= end {
			let whole = &self.data[begin * cols..(end + 1) * cols];
			Ok((whole, &[]))
		} else {
			let (tail, head) = (&self.data[begin * cols..self.buff_size * cols], &self.data[0..(end + 1) * cols]);
			Ok((tail, head))
		}
	}

	pub fn buff_size(&self) -> usize {
		self.buff_size
	}
}

/// Half-overlapping window emission policy, with a discontinuity branch
/// that shrinks and resets the window on a backward or oversized timestamp
/// gap rather than letting a dropped burst poison an otherwise valid window.
///
/// Indexes frames by an internal, gap-free count of "frames that reached
/// the ring buffer" rather than the frame's original ingestion `seq_id` —
/// the two diverge whenever a frame is dropped between assignment and
/// preprocessing (a classification or rebuild failure), and the window math
/// below assumes its own counter never skips.
pub struct WindowTracker {
	handle_time_ms: u32,
	handle_window: u32,
	window_start_seq: u32,
	next_seq: u32,
	last_ts: u32,
	started: bool,
}

impl WindowTracker {
	pub fn new(handle_time_ms: u32, handle_window: u32) -> Self {
		Self { handle_time_ms, handle_window, window_start_seq: 0, next_seq: 0, last_ts: 0, started: false }
	}

	/// Feeds one newly-admitted frame's `(ring_seq, timestamp_ms)` and
	/// returns a window descriptor if this frame completed one. `ring_seq`
	/// must be the ring buffer's own write count, not the frame's original
	/// `seq_id`; `ring` is consulted for the true timestamp recorded at
	/// `window_start_seq`, which may point to an older row than "now" once
	/// the half-overlap advance has run.
	pub fn on_frame(&mut self, ring_seq: u32, ts_ms: u32, ring: &RingBuffer) -> Option<WindowDescriptor> {
		if !self.started {
			self.started = true;
			self.window_start_seq = ring_seq;
			self.last_ts = ts_ms;
			self.next_seq = ring_seq + 1;
			return None;
		}

		let gap = ts_ms as i64 - self.last_ts as i64;
		self.last_ts = ts_ms;
		self.next_seq = ring_seq + 1;
		let window = self.next_seq - self.window_start_seq;

		if gap < 0 || gap > (self.handle_time_ms / 2) as i64 {
			// Discontinuity: a dropped burst or clock wrap. If there was
			// already a usable span before the gap, emit it shrunk by the
			// one discontinuous frame; either way the next window starts
			// fresh from here.
			let result = if window > self.handle_window / 3 {
				Some(WindowDescriptor { begin: self.window_start_seq, end: ring_seq.wrapping_sub(1), window: window - 1 })
			} else {
				None
			};
			self.window_start_seq = self.next_seq;
			return result;
		}

		let window_start_ts = ring.timestamp_for(self.window_start_seq);
		let spent_time = ts_ms.saturating_sub(window_start_ts);

		if spent_time >= 2 * self.handle_time_ms || window >= self.handle_window {
			if window < self.handle_window / 3 {
				// Too short to be worth emitting (e.g. right after a shrink); reset and skip.
				self.window_start_seq = self.next_seq;
				return None;
			}

			let begin = self.window_start_seq;
			let end = self.next_seq - 1;

			// Half-overlap advance.
			self.window_start_seq += window / 2;

			return Some(WindowDescriptor { begin, end, window });
		}

		None
	}
}

//! A platform agnostic core for turning Wi-Fi Channel State Information
//! (CSI) frames into two continuous scalar streams — jitter (transient
//! movement sensitivity) and wander (slow environmental change / presence
//! sensitivity) — plus a calibration mode that learns an empty-environment
//! reference and returns detection thresholds.
//!
//! Wi-Fi/MAC/PHY setup, ESP-NOW peer management, storage, transport, and
//! platform register writes for forced RX gain are all out of scope: the
//! core only consumes already-decoded [`RawCsiFrame`] values through
//! [`RadarContext::on_csi_frame`] and delivers results through two
//! user-registered callbacks.

pub mod calibrate;
pub mod config;
pub mod error;
pub mod gain;
pub mod ingest;
pub mod layout;
pub mod pca;
pub mod rebuild;
pub mod ring;
mod workers;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

pub use config::{AcquireCsiFlags, CsiConfig, DetectionConfig, FilterConfig, LtfType, RadarConfig};
pub use error::{RadarError, Result};
pub use layout::{Bandwidth, RxControl, SecondaryChannel, SignalMode};
pub use rebuild::FilteredFrame;

use calibrate::CalibrationController;
use gain::GainNormaliser;
use ring::RingBuffer;
use workers::{DropCounters, IngestMsg, WindowMsg};

/// A raw CSI frame as handed to the core by the radio collaborator, already
/// carrying the platform-decoded [`RxControl`] metadata.
pub struct RawCsiFrame<'a> {
	pub src_mac: [u8; 6],
	pub dst_mac: [u8; 6],
	pub payload_len: u16,
	pub rx_ctrl: RxControl,
	pub raw: &'a [u8],
	/// Microsecond timestamp from the radio; the core derives its
	/// millisecond timestamps from this alone, never from the wall clock.
	pub timestamp_us: u64,
	pub agc_gain: u8,
	pub fft_gain: i8,
	/// True on radios that only ever emit the 12-bit-LLTF-only CSI format,
	/// where classification matches purely on `total_bytes == raw_len`.
	pub lltf_bit_mode: bool,
}

/// One delivered jitter/wander sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadarOutput {
	pub waveform_jitter: f32,
	pub waveform_wander: f32,
}

type CsiCallback = Box<dyn FnMut(&FilteredFrame) + Send>;
type RadarCallback = Box<dyn FnMut(&RadarOutput) + Send>;

struct RunningState {
	ingest_tx: SyncSender<IngestMsg>,
	preprocess_handle: JoinHandle<()>,
	detect_handle: JoinHandle<()>,
}

/// A single radar instance: config, gain baseline, calibration state, and
/// the monotonic sequence counter all live here, with no hidden singletons.
pub struct RadarContext {
	config: Mutex<RadarConfig>,
	gain: Arc<Mutex<GainNormaliser>>,
	calibration: Arc<Mutex<CalibrationController>>,
	seq_counter: AtomicU32,
	csi_cb: Mutex<Option<CsiCallback>>,
	radar_cb: Arc<Mutex<Option<RadarCallback>>>,
	drops: Arc<DropCounters>,
	running: Mutex<Option<RunningState>>,
}

impl RadarContext {
	/// Allocates a new, stopped radar context with the given configuration.
	pub fn init(mut config: RadarConfig) -> Result<Self> {
		if config.detection.pca_window_size < 4 {
			log::warn!(
				"pca_window_size {} < 4, falling back to default",
				config.detection.pca_window_size
			);
			config.detection.pca_window_size = DetectionConfig::default().pca_window_size;
		}
		if config.csi.csi_recv_interval_ms == 0 {
			return Err(RadarError::InvalidArgument);
		}

		Ok(Self {
			config: Mutex::new(config),
			gain: Arc::new(Mutex::new(GainNormaliser::new())),
			calibration: Arc::new(Mutex::new(CalibrationController::new())),
			seq_counter: AtomicU32::new(0),
			csi_cb: Mutex::new(None),
			radar_cb: Arc::new(Mutex::new(None)),
			drops: Arc::new(DropCounters::default()),
			running: Mutex::new(None),
		})
	}

	pub fn get_config(&self) -> RadarConfig {
		*self.config.lock().unwrap()
	}

	/// Stops (if running), applies only the sub-configs whose bytes changed,
	/// then restarts if it had been running.
	pub fn change_config(&self, new_config: &RadarConfig) -> Result<()> {
		let was_running = self.running.lock().unwrap().is_some();
		if was_running {
			self.stop()?;
		}

		let mut current = self.config.lock().unwrap();
		if current.csi != new_config.csi {
			current.csi = new_config.csi;
		}
		if current.detection != new_config.detection {
			current.detection = new_config.detection;
			self.gain.lock().unwrap().reset_baseline();
		}
		current.filter = new_config.filter;
		current.acquire = new_config.acquire;
		drop(current);

		if was_running {
			self.start()?;
		}
		Ok(())
	}

	/// Registers the synchronous raw-CSI callback, invoked once per
	/// admitted frame on the producer's thread.
	pub fn set_csi_callback(&self, cb: impl FnMut(&FilteredFrame) + Send + 'static) {
		*self.csi_cb.lock().unwrap() = Some(Box::new(cb));
	}

	/// Registers the jitter/wander callback, invoked once per emitted window
	/// on the detection worker's thread.
	pub fn set_radar_callback(&self, cb: impl FnMut(&RadarOutput) + Send + 'static) {
		*self.radar_cb.lock().unwrap() = Some(Box::new(cb));
	}

	/// Forces a fixed RX gain, bypassing the rolling baseline.
	pub fn set_force_gain(&self, agc_gain: u8, fft_gain: i8) -> Result<()> {
		self.gain.lock().unwrap().force_gain(agc_gain, fft_gain)
	}

	/// Starts the pre-processing and detection worker threads.
	pub fn start(&self) -> Result<()> {
		let mut running = self.running.lock().unwrap();
		if running.is_some() {
			return Err(RadarError::InvalidState);
		}

		let config = *self.config.lock().unwrap();
		let buff_size = config.buff_size() as usize;
		let handle_window = config.handle_window();

		let (ingest_tx, ingest_rx) = sync_channel::<IngestMsg>(5);
		let (window_tx, window_rx) = sync_channel::<WindowMsg>(1);
		let ring = Arc::new(Mutex::new(RingBuffer::new(buff_size)));

		let preprocess_handle = {
			let ring = ring.clone();
			let drops = self.drops.clone();
			let step = config.csi.sub_carrier_step_size;
			let threshold = config.csi.outliers_threshold;
			let handle_time = config.detection.csi_handle_time_ms;
			let ltf_type = config.detection.ltf_type;
			std::thread::spawn(move || {
				workers::preprocess::run(
					ingest_rx, window_tx, ring, step, threshold, handle_time, handle_window, ltf_type, drops,
				);
			})
		};

		let detect_handle = {
			let ring = ring.clone();
			let calibration = self.calibration.clone();
			let radar_cb = self.radar_cb.clone();
			let drops = self.drops.clone();
			let pca_window_size = config.detection.pca_window_size;
			std::thread::spawn(move || {
				workers::detect::run(window_rx, ring, calibration, pca_window_size, drops, move |output| {
					if let Some(cb) = radar_cb.lock().unwrap().as_mut() {
						cb(output);
					}
				});
			})
		};

		*running = Some(RunningState { ingest_tx, preprocess_handle, detect_handle });
		log::info!("radar started: buff_size={} handle_window={}", buff_size, handle_window);
		Ok(())
	}

	/// Ordered teardown: signal the workers to exit, join them (which drains
	/// and frees any still-queued frames as the channels drop), then free the
	/// ring buffer. Safe to call `start` again afterwards.
	pub fn stop(&self) -> Result<()> {
		let mut running = self.running.lock().unwrap();
		let state = running.take().ok_or(RadarError::InvalidState)?;

		let _ = state.ingest_tx.try_send(IngestMsg::Stop);

		let _ = state.preprocess_handle.join();
		let _ = state.detect_handle.join();

		log::info!("radar stopped");
		Ok(())
	}

	/// The core entry point: classify, rebuild, optionally compensate,
	/// invoke the raw-CSI callback synchronously, then hand the frame to the
	/// pre-processing worker. Never blocks; drops and counts on any failure
	/// or when the ingestion queue is full.
	pub fn on_csi_frame(&self, frame: RawCsiFrame) {
		let config = *self.config.lock().unwrap();

		if !ingest::mac_filter_accept(&config.filter, frame.src_mac, frame.dst_mac, frame.payload_len) {
			return;
		}

		let seq_id = self.seq_counter.fetch_add(1, Ordering::Relaxed);
		let timestamp_ms = (frame.timestamp_us / 1000) as u32;

		let gain = self.gain.lock().unwrap();
		let result = ingest::run_pipeline(
			frame.raw,
			&frame.rx_ctrl,
			frame.lltf_bit_mode,
			seq_id,
			timestamp_ms,
			frame.agc_gain,
			frame.fft_gain,
			&gain,
			config.csi.csi_compensate_en,
		);
		drop(gain);

		let filtered = match result {
			Ok(f) => f,
			Err(RadarError::UnknownLayout) => {
				DropCounters::bump(&self.drops.classify_fail);
				log::debug!("dropping frame {}: no layout match", seq_id);
				return;
			}
			Err(e) => {
				DropCounters::bump(&self.drops.rebuild_fail);
				log::debug!("dropping frame {}: {}", seq_id, e);
				return;
			}
		};

		self.gain.lock().unwrap().record(frame.agc_gain, frame.fft_gain);

		if let Some(cb) = self.csi_cb.lock().unwrap().as_mut() {
			cb(&filtered);
		}

		let running = self.running.lock().unwrap();
		match running.as_ref() {
			Some(state) => match state.ingest_tx.try_send(IngestMsg::Frame(filtered)) {
				Ok(()) => {}
				Err(_) => DropCounters::bump(&self.drops.ingest_queue_full),
			},
			None => {
				// Not running: the frame is dropped here and freed by normal scope exit.
			}
		}
	}

	/// Begins (or restarts) a calibration session.
	pub fn train_start(&self) -> Result<()> {
		self.calibration.lock().unwrap().train_start()
	}

	/// Aborts a calibration session and discards everything collected.
	pub fn train_remove(&self) {
		self.calibration.lock().unwrap().train_remove()
	}

	/// Ends a calibration session, returning `(wander_threshold, jitter_threshold)`.
	pub fn train_stop(&self) -> Result<(f32, f32)> {
		self.calibration.lock().unwrap().train_stop()
	}

	/// Subscribes to emitted jitter/wander samples as an async stream.
	#[cfg(feature = "tokio")]
	pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RadarOutput> {
		// A thin adapter: the synchronous callback re-broadcasts onto the
		// channel, so async consumers never touch the worker threads directly.
		let (tx, rx) = tokio::sync::broadcast::channel(16);
		self.set_radar_callback(move |output| {
			let _ = tx.send(*output);
		});
		rx
	}
}

impl Drop for RadarContext {
	fn drop(&mut self) {
		let _ = self.stop();
	}
}

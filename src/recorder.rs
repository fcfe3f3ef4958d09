//! Per-slot capture lifecycle.
//!
//! `start` hands the slot to a dedicated capture thread that opens the input
//! stream, reports back whether that worked, and then accumulates fixed-size
//! buffers until the slot's active flag is cleared. `stop` clears the flag,
//! joins the thread and persists the take, so a returned `stop` always means
//! a complete WAV on disk.

use crate::audio;
use crate::capture::{Capture, InputDevice};
use crate::config::{CaptureFormat, RecorderConfig, Slot};
use crate::error::{Error, Result};
use crate::mixer::Converter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Lifecycle notifications for whatever drives the recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    Started { slot: Slot, path: PathBuf },
    Stopped { slot: Slot, frames: usize },
    Saved { slot: Slot, path: PathBuf, frames: usize },
}

/// Captured audio for one slot, held until it is written out.
#[derive(Debug, Clone, Default)]
pub struct Take {
    /// Buffers of `buffer_frames * channels` samples, in capture order.
    pub frames: Vec<Vec<i16>>,
}

impl Take {
    pub fn sample_len(&self) -> usize {
        self.frames.iter().map(Vec::len).sum()
    }
}

struct ActiveSession {
    active: Arc<AtomicBool>,
    worker: JoinHandle<Take>,
}

#[derive(Default)]
struct SlotState {
    path: Option<PathBuf>,
    session: Option<ActiveSession>,
    /// Set from the moment `stop` takes the session until the take is saved.
    stopping: bool,
    take: Option<Take>,
}

impl SlotState {
    fn busy(&self) -> bool {
        self.session.is_some() || self.stopping
    }
}

pub struct Recorder {
    config: RecorderConfig,
    device: Arc<dyn InputDevice>,
    slots: [Mutex<SlotState>; 2],
    events: Option<Sender<RecorderEvent>>,
}

impl Recorder {
    /// Creates the output directory if it does not exist yet.
    pub fn new(config: RecorderConfig, device: Arc<dyn InputDevice>) -> Result<Self> {
        std::fs::create_dir_all(&config.output_dir)?;
        tracing::debug!(output_dir = %config.output_dir.display(), "recorder ready");
        Ok(Self {
            config,
            device,
            slots: Default::default(),
            events: None,
        })
    }

    pub fn with_events(mut self, events: Sender<RecorderEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    fn slot(&self, slot: Slot) -> MutexGuard<'_, SlotState> {
        // A poisoned slot only means a panic elsewhere; its state is still usable.
        self.slots[slot.index()]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self, event: RecorderEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// True from `start` until `stop` has joined the worker and saved the take.
    pub fn is_recording(&self, slot: Slot) -> bool {
        self.slot(slot).busy()
    }

    pub fn any_recording(&self) -> bool {
        Slot::ALL.iter().any(|&slot| self.is_recording(slot))
    }

    /// Both slot files exist on disk.
    pub fn takes_ready(&self) -> bool {
        Slot::ALL.iter().all(|&slot| self.config.slot_path(slot).exists())
    }

    pub fn slot_paths(&self) -> Vec<PathBuf> {
        Slot::ALL.iter().map(|&slot| self.config.slot_path(slot)).collect()
    }

    /// Starts capturing into `filename` (relative names land in the output
    /// directory). Returns once the input stream is running.
    pub fn start(&self, slot: Slot, filename: impl AsRef<Path>) -> Result<()> {
        let mut state = self.slot(slot);
        if state.busy() {
            return Err(Error::AlreadyRecording(slot));
        }

        let path = self.config.resolve(filename);
        let active = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();

        let device = Arc::clone(&self.device);
        let format = self.config.format;
        let flag = Arc::clone(&active);
        let worker = thread::Builder::new()
            .name(format!("capture-slot-{slot}"))
            .spawn(move || {
                let (capture, converter) = match open_stream(device.as_ref(), &format) {
                    Ok(opened) => {
                        let _ = ready_tx.send(Ok(()));
                        opened
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return Take::default();
                    }
                };
                let take = capture_loop(capture.as_ref(), converter, &format, &flag);
                if let Err(e) = capture.stop() {
                    tracing::warn!(%slot, error = %e, "failed to stop input stream");
                }
                take
            })?;

        let opened = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(Error::Device("capture thread exited before the stream opened".into())));
        if let Err(e) = opened {
            let _ = worker.join();
            tracing::error!(%slot, error = %e, "could not start recording");
            return Err(e);
        }

        state.path = Some(path.clone());
        state.take = None;
        state.session = Some(ActiveSession { active, worker });
        drop(state);

        tracing::info!(%slot, path = %path.display(), "recording started");
        self.notify(RecorderEvent::Started { slot, path });
        Ok(())
    }

    /// Stops the slot and writes its take. Stopping an idle slot is a no-op
    /// returning `None`.
    pub fn stop(&self, slot: Slot) -> Result<Option<PathBuf>> {
        let session = {
            let mut state = self.slot(slot);
            let Some(session) = state.session.take() else {
                tracing::debug!(%slot, "stop on idle slot ignored");
                return Ok(None);
            };
            // Keeps `start` out until the take below has reached its own path.
            state.stopping = true;
            session
        };

        session.active.store(false, Ordering::SeqCst);
        let result = match session.worker.join() {
            Ok(take) => {
                let frames = take.sample_len() / self.config.format.channels.max(1) as usize;
                tracing::info!(%slot, frames, "recording stopped");
                self.slot(slot).take = Some(take);
                self.notify(RecorderEvent::Stopped { slot, frames });
                self.save(slot)
            }
            Err(_) => Err(Error::WorkerPanicked(slot)),
        };

        self.slot(slot).stopping = false;
        result
    }

    /// Writes the slot's in-memory take and releases it. Nothing to write
    /// (no filename, or already saved) is a no-op. On failure the take is
    /// kept so the save can be retried.
    pub fn save(&self, slot: Slot) -> Result<Option<PathBuf>> {
        let mut state = self.slot(slot);
        let Some(path) = state.path.clone() else {
            return Ok(None);
        };
        let Some(take) = state.take.as_ref() else {
            return Ok(None);
        };

        let frames = audio::write_take(&path, &take.frames, &self.config.format).inspect_err(|e| {
            tracing::error!(%slot, path = %path.display(), error = %e, "failed to save take");
        })?;
        state.take = None;
        drop(state);

        self.notify(RecorderEvent::Saved {
            slot,
            path: path.clone(),
            frames,
        });
        Ok(Some(path))
    }

    /// Stops every active slot, saving what each captured.
    pub fn stop_all(&self) -> Result<Vec<PathBuf>> {
        let mut saved = Vec::new();
        for slot in Slot::ALL {
            if let Some(path) = self.stop(slot)? {
                saved.push(path);
            }
        }
        Ok(saved)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        for slot in Slot::ALL {
            if self.slot(slot).session.is_some() {
                tracing::warn!(%slot, "recorder dropped while recording, saving take");
                if let Err(e) = self.stop(slot) {
                    tracing::error!(%slot, error = %e, "failed to save take on shutdown");
                }
            }
        }
    }
}

/// Opens and starts the stream along with the converter into the take format.
fn open_stream(device: &dyn InputDevice, format: &CaptureFormat) -> Result<(Box<dyn Capture>, Converter)> {
    let capture = device.open(format)?;
    let converter = Converter::new(capture.sample_rate(), capture.channels(), format)?;
    capture.start()?;
    Ok((capture, converter))
}

/// Accumulates whole buffers until `active` is cleared, then drains what
/// the stream already delivered. A trailing partial buffer is dropped.
fn capture_loop(capture: &dyn Capture, mut converter: Converter, format: &CaptureFormat, active: &AtomicBool) -> Take {
    let rx = capture.rx();
    let buffer_samples = format.buffer_samples().max(1);

    let mut take = Take::default();
    let mut pending: Vec<i16> = Vec::with_capacity(buffer_samples * 2);

    let mut accept = |chunk: Vec<f32>, take: &mut Take| match converter.convert(&chunk) {
        Ok(samples) => {
            pending.extend(samples);
            while pending.len() >= buffer_samples {
                take.frames.push(pending.drain(..buffer_samples).collect());
            }
        }
        Err(e) => tracing::warn!(error = %e, "dropping unconvertible chunk"),
    };

    while active.load(Ordering::SeqCst) {
        match rx.recv_timeout(RECV_TIMEOUT) {
            Ok(chunk) => accept(chunk, &mut take),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                tracing::warn!("input stream disconnected, ending capture");
                break;
            }
        }
    }

    // Final drain
    while let Ok(chunk) = rx.try_recv() {
        accept(chunk, &mut take);
    }

    drop(accept);
    if !pending.is_empty() {
        tracing::debug!(samples = pending.len(), "discarding partial buffer");
    }
    take
}

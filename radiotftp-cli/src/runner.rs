//! Cooperative loop around a [`Station`]
//!
//! A reader thread owns the synchronizer and forwards completed frames over
//! a bounded channel. The loop waits for the next of {frame ready, timer
//! due}, feeds the station, and transmits staged bursts only while the
//! receiver is idle, since the channel is half duplex.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use radiotftp_core::{Completion, FrameSync, Progress, Station, StationEvent};
use tracing::{debug, info, warn};

use crate::serial::RadioPort;

/// Frames waiting for the loop before new ones are discarded
const FRAME_QUEUE_DEPTH: usize = 4;

const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Longest the loop sleeps without checking the timer
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Drives a [`Station`] over a serial radio: a reader thread feeds received
/// frames in, the caller's thread transmits and services the timer
pub struct Runner {
    station: Station,
    port: Box<dyn RadioPort>,
    frames: Receiver<Bytes>,
    receiver_idle: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl Runner {
    /// Spawn the reader thread and take ownership of `station`
    pub fn start(station: Station, port: Box<dyn RadioPort>) -> Result<Self> {
        let reader_port = port
            .try_clone_port()
            .context("Failed to open a reader handle on the radio port")?;
        let sync = station.receiver()?;

        let (tx, frames) = mpsc::sync_channel(FRAME_QUEUE_DEPTH);
        let receiver_idle = Arc::new(AtomicBool::new(true));
        let stop = Arc::new(AtomicBool::new(false));

        let reader = {
            let idle = Arc::clone(&receiver_idle);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("radio-rx".into())
                .spawn(move || read_loop(reader_port, sync, tx, idle, stop))
                .context("Failed to spawn the radio reader")?
        };

        Ok(Self {
            station,
            port,
            frames,
            receiver_idle,
            stop,
            reader: Some(reader),
        })
    }

    /// The station being driven
    pub fn station(&self) -> &Station {
        &self.station
    }

    /// Mutable access, for queueing transfers and hellos
    pub fn station_mut(&mut self) -> &mut Station {
        &mut self.station
    }

    /// Transmit the staged burst if the channel is free; true if sent
    pub fn flush(&mut self) -> Result<bool> {
        if !self.station.has_outbound() || !self.receiver_idle.load(Ordering::Acquire) {
            return Ok(false);
        }
        let Some(burst) = self.station.take_outbound() else {
            return Ok(false);
        };

        debug!("Transmitting {} bytes", burst.len());
        self.port
            .transmit(&burst)
            .context("Failed to write to the radio")?;
        Ok(true)
    }

    /// One loop iteration, waiting at most `wait` for a frame
    pub fn step(&mut self, wait: Duration) -> Result<Vec<StationEvent>> {
        let mut events = Vec::new();
        let wait = match self.station.next_deadline() {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()).min(wait),
            None => wait,
        };

        match self.frames.recv_timeout(wait) {
            Ok(frame) => self.on_frame(&frame, &mut events),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => bail!("Radio reader stopped"),
        }
        while let Ok(frame) = self.frames.try_recv() {
            self.on_frame(&frame, &mut events);
        }

        events.extend(self.station.poll_timer(Instant::now()));
        self.flush()?;
        Ok(events)
    }

    fn on_frame(&mut self, frame: &[u8], events: &mut Vec<StationEvent>) {
        match self.station.handle_frame(frame, Instant::now()) {
            Ok(event) => events.extend(event),
            Err(e) => debug!("Frame discarded: {}", e),
        }
    }

    /// Drive the session in flight to its end
    pub fn run_transfer(&mut self, mut on_progress: impl FnMut(Progress)) -> Result<Completion> {
        if self.station.is_idle() {
            bail!("No transfer in progress");
        }

        loop {
            self.flush()?;
            for event in self.step(POLL_INTERVAL)? {
                match event {
                    StationEvent::Transfer(completion) => {
                        self.flush()?;
                        return Ok(completion);
                    }
                    StationEvent::Neighbour(address) => info!("New neighbour {}", address),
                }
            }
            if let Some(progress) = self.station.progress() {
                on_progress(progress);
            }
        }
    }

    /// Receive until `until` passes (forever if `None`), reporting every event
    pub fn listen(
        &mut self,
        until: Option<Instant>,
        mut on_event: impl FnMut(&StationEvent),
    ) -> Result<()> {
        loop {
            if until.is_some_and(|t| Instant::now() >= t) {
                return Ok(());
            }
            for event in self.step(POLL_INTERVAL)? {
                on_event(&event);
            }
        }
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                warn!("Radio reader panicked");
            }
        }
    }
}

fn read_loop(
    mut port: Box<dyn RadioPort>,
    mut sync: FrameSync,
    frames: SyncSender<Bytes>,
    idle: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
) {
    let mut buf = [0u8; 256];

    while !stop.load(Ordering::Acquire) {
        let n = match port.read_timeout(&mut buf, READ_TIMEOUT) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                // bursts arrive back to back, so silence mid-frame means it was cut off
                if !sync.is_idle() {
                    debug!("Receive stalled mid-frame, hunting again");
                    sync.reset();
                    idle.store(true, Ordering::Release);
                }
                continue;
            }
            Err(e) => {
                warn!("Radio read failed: {}", e);
                break;
            }
        };

        for &byte in &buf[..n] {
            let Some(frame) = sync.on_byte_received(byte) else {
                continue;
            };
            match frames.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => warn!("Incoming transmission discarded"),
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
        idle.store(sync.is_idle(), Ordering::Release);
    }

    let stats = sync.stats();
    debug!(
        "Reader stopped: {} sync words, {} frames, {} overflows",
        stats.sync_words, stats.frames, stats.overflows
    );
}

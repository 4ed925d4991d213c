//! Frame relay
//!
//! One relay serves one viewer connection. It owns the session's exclusivity
//! lock, polls the control channel and the mailbox once per cycle, and writes
//! at most one multipart part per cycle into the response body channel.
//!
//! ```text
//!  producer ──append──► mailbox file ──drain_all──► local FIFO ──pop──► read bytes
//!                                                                          │
//!  controller ──write──► .ctrl file ──read_directive──► stop?              ▼
//!                                                               mpsc ──► HTTP body
//! ```

use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::{Error, Result};
use crate::mailbox::{ControlChannel, ControlRead, FrameRef, Mailbox};
use crate::registry::SessionRegistry;
use crate::session::{SessionKey, SessionPhase, SessionState, StopReason};
use crate::stats::RelayStats;

use super::config::RelayConfig;
use super::frame::{read_frame, FrameRead};
use super::framing::encode_part;
use super::lock::{ExclusivityLock, LockStatus};
use super::ticker::Ticker;

/// How a relay ended
#[derive(Debug)]
pub struct RelayOutcome {
    /// Session that was served
    pub key: SessionKey,
    /// Why streaming stopped
    pub reason: StopReason,
    /// Final counters
    pub stats: RelayStats,
}

/// Relay bound to one session key
#[derive(Debug)]
pub struct FrameRelay {
    state: SessionState,
    lock: ExclusivityLock,
    control: ControlChannel,
    config: RelayConfig,
    buffer: VecDeque<FrameRef>,
    stats: RelayStats,
}

impl FrameRelay {
    /// Take the session's exclusivity lock and create its empty mailbox.
    ///
    /// Fails with [`Error::StartupConflict`] if another relay serves the key;
    /// in that case nothing on disk is modified.
    pub async fn start(
        key: SessionKey,
        registry: Arc<SessionRegistry>,
        config: RelayConfig,
    ) -> Result<Self> {
        let mailbox = Mailbox::new(&config.mailbox_dir, &key);
        let control = mailbox.control_channel();
        let stale_after = config.stale_marker_after;

        let lock_key = key.clone();
        let lock = blocking(move || {
            ExclusivityLock::acquire(&registry, &lock_key, mailbox, stale_after)
        })
        .await?;

        tracing::info!(session = %key, mailbox = %lock.mailbox().path().display(), "Streamer initialized");

        Ok(Self {
            state: SessionState::new(key),
            lock,
            control,
            config,
            buffer: VecDeque::new(),
            stats: RelayStats::new(),
        })
    }

    pub fn key(&self) -> &SessionKey {
        &self.state.key
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase
    }

    pub fn mailbox(&self) -> &Mailbox {
        self.lock.mailbox()
    }

    /// Run the relay on its own task, returning the body stream receiver
    pub fn spawn(self, cancel: CancellationToken) -> (mpsc::Receiver<Bytes>, JoinHandle<RelayOutcome>) {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let handle = tokio::spawn(self.run(tx, cancel));
        (rx, handle)
    }

    /// Stream until stopped, then release the lock.
    ///
    /// Ends on a stop directive, when `sink` is closed by the viewer going
    /// away, when `cancel` fires, when the mailbox is removed from outside, or
    /// on a mailbox I/O fault. Dropping `sink` on return ends the HTTP
    /// response.
    pub async fn run(self, sink: mpsc::Sender<Bytes>, cancel: CancellationToken) -> RelayOutcome {
        let span = tracing::info_span!("relay", session = %self.state.key);
        self.stream(sink, cancel).instrument(span).await
    }

    async fn stream(mut self, sink: mpsc::Sender<Bytes>, cancel: CancellationToken) -> RelayOutcome {
        let mut ticker = Ticker::new(self.config.poll_interval, cancel.clone());
        tracing::info!(
            poll_ms = ticker.period().as_millis() as u64,
            "MJPEG streaming started"
        );

        self.state.start_streaming();

        while self.state.is_streaming() {
            if ticker.is_cancelled() {
                self.state.begin_drain(StopReason::Shutdown);
                break;
            }
            self.stats.cycles += 1;

            if let ControlFlow::Break(reason) = self.cycle(&sink, &cancel).await {
                self.state.begin_drain(reason);
                break;
            }

            if !ticker.tick().await {
                self.state.begin_drain(StopReason::Shutdown);
            }
        }

        self.finish()
    }

    /// One poll cycle: control, drain, heartbeat, at most one part
    async fn cycle(
        &mut self,
        sink: &mpsc::Sender<Bytes>,
        cancel: &CancellationToken,
    ) -> ControlFlow<StopReason> {
        if sink.is_closed() {
            tracing::debug!("Connection closed");
            return ControlFlow::Break(StopReason::ClientGone);
        }

        if self.poll_control().await {
            return ControlFlow::Break(StopReason::Directive);
        }

        if let Err(e) = self.refill().await {
            tracing::error!(error = %e, "Failed to drain mailbox");
            return ControlFlow::Break(StopReason::Fault(e.to_string()));
        }

        if let ControlFlow::Break(reason) = self.heartbeat() {
            return ControlFlow::Break(reason);
        }

        let Some(frame) = self.buffer.pop_front() else {
            return ControlFlow::Continue(());
        };

        match read_frame(&frame, &self.config.frame_root).await {
            FrameRead::Ready(jpeg) => {
                let part = encode_part(&jpeg);
                let len = part.len();

                if let ControlFlow::Break(reason) = self.deliver(sink, cancel, part).await {
                    tracing::debug!(frame = %frame, reason = %reason, "Frame not delivered");
                    self.stats.frames_discarded += 1;
                    return ControlFlow::Break(reason);
                }

                self.stats.record_sent(len);
                tracing::trace!(frame = %frame, bytes = len, "Frame sent");
            }
            FrameRead::Skipped(reason) => {
                self.stats.frames_skipped += 1;
                tracing::warn!(frame = %frame, reason = %reason, "Skipping unreadable frame");
            }
        }

        ControlFlow::Continue(())
    }

    /// Refresh the exclusivity lock
    fn heartbeat(&self) -> ControlFlow<StopReason> {
        match self.lock.heartbeat() {
            LockStatus::Held => ControlFlow::Continue(()),
            LockStatus::LeaseLost => {
                ControlFlow::Break(StopReason::Fault("session lease lost".into()))
            }
            LockStatus::MarkerGone => ControlFlow::Break(StopReason::Teardown),
        }
    }

    /// Hand one part to the body channel.
    ///
    /// A viewer that stops reading blocks the send. Meanwhile the lock is
    /// heartbeated and the control channel polled once per interval, so the
    /// lease does not expire and a stop directive still ends the session.
    async fn deliver(
        &mut self,
        sink: &mpsc::Sender<Bytes>,
        cancel: &CancellationToken,
        part: Bytes,
    ) -> ControlFlow<StopReason> {
        let period = self.config.poll_interval;
        let mut keepalive = tokio::time::interval_at(Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let send = sink.send(part);
        tokio::pin!(send);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return ControlFlow::Break(StopReason::Shutdown),
                sent = &mut send => {
                    return match sent {
                        Ok(()) => ControlFlow::Continue(()),
                        Err(_) => ControlFlow::Break(StopReason::ClientGone),
                    };
                }
                _ = keepalive.tick() => {
                    tracing::trace!("Viewer not reading, holding frame");
                    if let ControlFlow::Break(reason) = self.heartbeat() {
                        return ControlFlow::Break(reason);
                    }
                    if self.poll_control().await {
                        return ControlFlow::Break(StopReason::Directive);
                    }
                }
            }
        }
    }

    /// Returns true when the control channel says stop
    async fn poll_control(&mut self) -> bool {
        let control = self.control.clone();
        let read = blocking(move || control.read_directive().map_err(Error::from)).await;

        match read {
            Ok(ControlRead::Absent) => {
                tracing::trace!("Control file does not exist");
                false
            }
            Ok(ControlRead::Directive(doc)) => {
                tracing::trace!(status = ?doc.status, "Read control file");
                if doc.is_stop() {
                    tracing::info!(status = ?doc.status, "Found close directive");
                }
                doc.is_stop()
            }
            Ok(ControlRead::Corrupt(reason)) => {
                self.stats.control_warnings += 1;
                tracing::warn!(reason = %reason, "Control configuration unusable, ignoring this cycle");
                false
            }
            Err(e) => {
                self.stats.control_warnings += 1;
                tracing::warn!(error = %e, "Failed to read control file, ignoring this cycle");
                false
            }
        }
    }

    /// Move everything from the mailbox into the local FIFO
    async fn refill(&mut self) -> Result<()> {
        let mailbox = self.lock.mailbox().clone();
        let frames = blocking(move || mailbox.drain_all().map_err(Error::from)).await?;

        if frames.is_empty() {
            tracing::trace!("Mailbox is empty");
            return Ok(());
        }

        tracing::debug!(count = frames.len(), "Read frames");
        self.stats.refs_drained += frames.len() as u64;
        self.buffer.extend(frames);

        let overflow = self
            .buffer
            .len()
            .saturating_sub(self.config.max_buffered_frames);
        if overflow > 0 {
            self.buffer.drain(..overflow);
            self.stats.frames_discarded += overflow as u64;
            tracing::warn!(dropped = overflow, "Frame buffer full, dropping oldest references");
        }

        Ok(())
    }

    /// Discard what is left, release the lock, report
    fn finish(mut self) -> RelayOutcome {
        let reason = self
            .state
            .stop_reason
            .clone()
            .unwrap_or(StopReason::Shutdown);

        if !self.buffer.is_empty() {
            tracing::debug!(discarded = self.buffer.len(), "Discarding buffered frames");
            self.stats.frames_discarded += self.buffer.len() as u64;
            self.buffer.clear();
        }

        self.state.stop();
        tracing::info!(
            reason = %reason,
            cycles = self.stats.cycles,
            frames_sent = self.stats.frames_sent,
            frames_skipped = self.stats.frames_skipped,
            bytes_sent = self.stats.bytes_sent,
            streaming_secs = self.state.streaming_duration().as_secs(),
            "Stopping"
        );

        let FrameRelay {
            state, lock, stats, ..
        } = self;
        drop(lock);

        RelayOutcome {
            key: state.key,
            reason,
            stats,
        }
    }
}

/// Run filesystem work on the blocking pool
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

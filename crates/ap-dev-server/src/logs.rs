// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Per-run log buffering and fan-out
//!
//! Every published line is appended to the run's buffer before it goes out on
//! the broadcast channel. A listener that falls behind the channel catches up
//! from the buffer, so each listener sees every line once and in order no
//! matter when it attached.

use std::sync::Arc;

use ap_api_contract::LogLine;
use futures::Stream;
use tokio::sync::{Mutex, broadcast, watch};

const LIVE_CHANNEL_CAPACITY: usize = 256;

struct Buffer {
    lines: Vec<LogLine>,
    closed: bool,
}

pub struct LogBroker {
    buffer: Mutex<Buffer>,
    live: broadcast::Sender<(usize, LogLine)>,
    done: watch::Sender<bool>,
}

/// What a new listener starts from
pub struct LogSubscription {
    /// Lines published before the listener attached.
    pub history: Vec<LogLine>,
    /// Subsequent lines, tagged with their position in the buffer.
    pub live: broadcast::Receiver<(usize, LogLine)>,
    /// Flips to `true` once the run has finished.
    pub done: watch::Receiver<bool>,
}

impl LogBroker {
    pub fn new() -> Self {
        let (live, _) = broadcast::channel(LIVE_CHANNEL_CAPACITY);
        let (done, _) = watch::channel(false);
        Self {
            buffer: Mutex::new(Buffer {
                lines: Vec::new(),
                closed: false,
            }),
            live,
            done,
        }
    }

    /// Append a line and forward it to live listeners. Never waits on listeners.
    pub async fn publish(&self, line: LogLine) {
        let mut buffer = self.buffer.lock().await;
        let index = buffer.lines.len();
        buffer.lines.push(line.clone());
        // No receivers is fine: the buffer keeps the line for late listeners.
        let _ = self.live.send((index, line));
    }

    /// Snapshot history and subscribe in one step so no line is missed or repeated.
    pub async fn attach(&self) -> LogSubscription {
        let buffer = self.buffer.lock().await;
        LogSubscription {
            history: buffer.lines.clone(),
            live: self.live.subscribe(),
            done: self.done.subscribe(),
        }
    }

    /// Signal completion. Returns `false` if the broker was already closed.
    pub async fn close(&self) -> bool {
        let mut buffer = self.buffer.lock().await;
        if buffer.closed {
            return false;
        }
        buffer.closed = true;
        self.done.send_replace(true);
        true
    }

    pub async fn is_closed(&self) -> bool {
        self.buffer.lock().await.closed
    }

    pub async fn history(&self) -> Vec<LogLine> {
        self.buffer.lock().await.lines.clone()
    }

    async fn lines_from(&self, cursor: usize) -> Vec<LogLine> {
        let buffer = self.buffer.lock().await;
        buffer.lines.get(cursor..).map(<[LogLine]>::to_vec).unwrap_or_default()
    }

    /// Replay history, follow live lines, and end once the run finishes.
    ///
    /// Dropping the stream detaches the listener.
    pub fn stream(self: Arc<Self>) -> impl Stream<Item = LogLine> + Send + 'static {
        async_stream::stream! {
            let LogSubscription { history, mut live, mut done } = self.attach().await;
            let mut cursor = history.len();
            for line in history {
                yield line;
            }

            loop {
                let finished = *done.borrow_and_update();
                if finished {
                    for line in self.lines_from(cursor).await {
                        yield line;
                    }
                    break;
                }

                let next = tokio::select! {
                    biased;
                    received = live.recv() => Wake::Live(received),
                    changed = done.changed() => Wake::Done(changed.is_ok()),
                };

                match next {
                    Wake::Live(Ok((index, line))) => {
                        if index >= cursor {
                            cursor = index + 1;
                            yield line;
                        }
                    }
                    Wake::Live(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                        tracing::debug!(skipped, "log listener lagged, replaying from buffer");
                        for line in self.lines_from(cursor).await {
                            cursor += 1;
                            yield line;
                        }
                    }
                    Wake::Live(Err(broadcast::error::RecvError::Closed)) | Wake::Done(false) => break,
                    Wake::Done(true) => {}
                }
            }
        }
    }
}

enum Wake {
    Live(Result<(usize, LogLine), broadcast::error::RecvError>),
    /// `false` when the completion sender is gone.
    Done(bool),
}

impl Default for LogBroker {
    fn default() -> Self {
        Self::new()
    }
}

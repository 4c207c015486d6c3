//! Per-transfer throughput tracker
//!
//! A tracker counts bytes as they are written to the destination and, at most
//! once per update interval, redraws a single status line in place. The
//! final summary uses the average speed over the whole transfer.

use std::io::Write;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use humansize::{BINARY, format_size};
use tokio::io::AsyncWrite;
use tokio::time::Instant;

/// Default minimum time between two status lines
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(1);

struct ProgressState {
    done: u64,
    last_emit: Instant,
    last_line_len: usize,
    output: Box<dyn Write + Send>,
}

/// Thread-safe byte counter for one object transfer
pub struct ProgressTracker {
    key: String,
    total: u64,
    verbosity: u8,
    update_interval: Duration,
    start: Instant,
    state: Mutex<ProgressState>,
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("key", &self.key)
            .field("total", &self.total)
            .field("verbosity", &self.verbosity)
            .field("done", &self.done())
            .finish()
    }
}

impl ProgressTracker {
    /// Create a tracker printing to stdout. `total` is 0 when unknown.
    pub fn new(key: impl Into<String>, total: u64, verbosity: u8) -> Self {
        let now = Instant::now();
        Self {
            key: key.into(),
            total,
            verbosity,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            start: now,
            state: Mutex::new(ProgressState {
                done: 0,
                last_emit: now,
                last_line_len: 0,
                output: Box::new(std::io::stdout()),
            }),
        }
    }

    pub fn with_output(self, output: Box<dyn Write + Send>) -> Self {
        self.lock().output = output;
        self
    }

    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    /// Bytes counted so far
    pub fn done(&self) -> u64 {
        self.lock().done
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Count `n` transferred bytes. No-op in quiet mode.
    pub fn add(&self, n: u64) {
        if self.verbosity < 1 {
            return;
        }

        let now = Instant::now();
        let mut state = self.lock();
        state.done += n;

        if now.saturating_duration_since(state.last_emit) < self.update_interval {
            return;
        }
        state.last_emit = now;

        let line = status_line(
            state.done,
            self.total,
            now.saturating_duration_since(self.start),
            &self.key,
        );
        redraw(&mut state, &line);
    }

    /// Print the summary line. Called for dry-run transfers too.
    pub fn finish(&self) {
        if self.verbosity < 1 {
            return;
        }

        let mut state = self.lock();
        let line = summary_line(state.done, self.start.elapsed(), &self.key);
        redraw(&mut state, &line);
        let _ = state.output.flush();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProgressState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn redraw(state: &mut ProgressState, line: &str) {
    // erase the previous line fully, it may be longer than this one
    let _ = write!(
        state.output,
        "\r{:width$}\r{line}",
        "",
        width = state.last_line_len
    );
    let _ = state.output.flush();
    state.last_line_len = line.trim_end_matches('\n').chars().count();
}

/// Format an in-flight status line:
/// `done/total (pct%) | speed/s | ETA eta | key`
pub fn status_line(done: u64, total: u64, elapsed: Duration, key: &str) -> String {
    let mut secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        secs = 1.0;
    }
    let speed = done as f64 / secs;

    let mut line = format_size(done, BINARY);
    if total > 0 {
        let percent = done as f64 / total as f64 * 100.0;
        line.push_str(&format!("/{} ({percent:.0}%)", format_size(total, BINARY)));
    } else {
        line.push_str("/?");
    }

    line.push_str(&format!(" | {}/s", format_size(speed as u64, BINARY)));

    if total > 0 && speed > 0.0 {
        let remaining = total.saturating_sub(done) as f64 / speed;
        line.push_str(&format!(" | ETA {}", format_duration(remaining.round() as u64)));
    }

    line.push_str(" | ");
    line.push_str(key);
    line
}

/// Format the final summary line using the average speed
pub fn summary_line(done: u64, elapsed: Duration, key: &str) -> String {
    let secs = elapsed.as_secs_f64();
    let average = if secs > 0.0 { done as f64 / secs } else { 0.0 };

    format!(
        "{} in {} | {}/s | {key}\n",
        format_size(done, BINARY),
        format_duration(elapsed.as_secs_f64().round() as u64),
        format_size(average as u64, BINARY),
    )
}

/// Compact duration such as `45s`, `2m5s` or `1h0m3s`
pub fn format_duration(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Async writer that feeds every successfully written byte into a tracker
pub struct ProgressWriter<W> {
    inner: W,
    tracker: Arc<ProgressTracker>,
}

impl<W> ProgressWriter<W> {
    pub fn new(inner: W, tracker: Arc<ProgressTracker>) -> Self {
        Self { inner, tracker }
    }

    pub fn tracker(&self) -> &Arc<ProgressTracker> {
        &self.tracker
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for ProgressWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = &poll {
            if *n > 0 {
                this.tracker.add(*n as u64);
            }
        }
        poll
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

//! Token bucket bandwidth limiter
//!
//! One token is one byte. The bucket starts full at the burst capacity and
//! is refilled in small steps that add up to `bytes_per_second`, so the bytes
//! admitted over a window `T` never exceed `rate * T + burst`.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use leaky_bucket::RateLimiter;
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::sync::CancellationToken;

use crate::config::RateLimit;
use crate::error::{Error, Result};

/// Refill steps per second at most
const REFILL_STEPS_PER_SECOND: u64 = 10;

/// Shared token bucket guarding body reads and writes
pub struct RateBudget {
    bytes_per_second: u64,
    capacity: u64,
    limiter: RateLimiter,
}

impl RateBudget {
    /// Create a full bucket
    pub fn new(limit: RateLimit) -> Self {
        let rate = limit.bytes_per_second.max(1);
        let capacity = limit.burst_bytes.max(1);
        let (refill, interval) = refill_schedule(rate, capacity);

        let limiter = RateLimiter::builder()
            .max(capacity as usize)
            .initial(capacity as usize)
            .refill(refill as usize)
            .interval(interval)
            .fair(true)
            .build();

        Self {
            bytes_per_second: rate,
            capacity,
            limiter,
        }
    }

    /// Burst capacity in bytes
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Wait until `n` bytes may pass.
    ///
    /// Requests larger than the burst capacity are admitted in capacity-sized
    /// slices. Returns [`Error::Cancelled`] as soon as `cancel` fires.
    pub async fn acquire(&self, n: u64, cancel: &CancellationToken) -> Result<()> {
        let mut remaining = n;

        while remaining > 0 {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let slice = remaining.min(self.capacity);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = self.limiter.acquire(slice as usize) => {}
            }

            remaining -= slice;
        }

        Ok(())
    }
}

impl fmt::Debug for RateBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateBudget")
            .field("bytes_per_second", &self.bytes_per_second)
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Tokens per step and step length adding up to `rate` bytes per second.
/// A step never exceeds the bucket capacity, and the interval is rounded up
/// so the effective rate stays at or below `rate`.
fn refill_schedule(rate: u64, capacity: u64) -> (u64, Duration) {
    let refill = (rate / REFILL_STEPS_PER_SECOND).clamp(1, capacity);
    let nanos = (u128::from(refill) * 1_000_000_000).div_ceil(u128::from(rate));
    let nanos = u64::try_from(nanos).unwrap_or(u64::MAX).max(1);
    (refill, Duration::from_nanos(nanos))
}

type Grant = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// Reader that draws from a [`RateBudget`] before every read.
///
/// Holds no budget when no limit is configured, in which case reads are
/// forwarded untouched.
pub struct ThrottledReader<R> {
    inner: R,
    budget: Option<Arc<RateBudget>>,
    cancel: CancellationToken,
    pending: Option<(usize, Grant)>,
    granted: usize,
}

impl<R> ThrottledReader<R> {
    pub fn new(inner: R, budget: Option<Arc<RateBudget>>, cancel: CancellationToken) -> Self {
        Self {
            inner,
            budget,
            cancel,
            pending: None,
            granted: 0,
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ThrottledReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        let Some(budget) = &this.budget else {
            return Pin::new(&mut this.inner).poll_read(cx, buf);
        };

        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        if this.granted == 0 {
            let (want, grant) = this.pending.get_or_insert_with(|| {
                let want = buf.remaining().min(budget.capacity() as usize);
                let budget = Arc::clone(budget);
                let cancel = this.cancel.clone();
                let grant: Grant =
                    Box::pin(async move { budget.acquire(want as u64, &cancel).await });
                (want, grant)
            });

            let want = *want;
            let outcome = ready!(grant.as_mut().poll(cx));
            this.pending = None;
            match outcome {
                Ok(()) => this.granted = want,
                Err(e) => return Poll::Ready(Err(io::Error::other(e))),
            }
        }

        let limit = this.granted.min(buf.remaining());
        let dst = buf.initialize_unfilled_to(limit);
        let mut limited = ReadBuf::new(dst);
        ready!(Pin::new(&mut this.inner).poll_read(cx, &mut limited))?;

        let n = limited.filled().len();
        buf.advance(n);
        this.granted = if n == 0 { 0 } else { this.granted - n };

        Poll::Ready(Ok(()))
    }
}

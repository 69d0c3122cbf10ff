//! Rate-limited stream wrapper
//!
//! [`ThrottledStream`] paces reads and writes independently. Each direction
//! has its own [`SpeedLimit`], so the owner of the limit can raise or lower
//! the ceiling while a transfer is running. The wrapper works both with
//! tokio's `AsyncRead`/`AsyncWrite` and with blocking `Read`/`Write`.
//!
//! Delays are applied before the next operation in the same direction, and
//! any delay still owed when a read reaches end of stream is served before
//! that end of stream is reported. Dropping the future that drives an async
//! operation drops the pending delay with it.

use std::future::Future;
use std::io::{self, Read, Write};
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::thread;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::{sleep, Sleep};

use crate::app::throttle::pacer::Pacer;
use crate::app::throttle::speed::{Speed, SpeedLimit};

/// Pacing state for one direction of a stream
#[derive(Debug)]
struct Direction {
    limit: SpeedLimit,
    pacer: Pacer,
    delay: Option<Pin<Box<Sleep>>>,
    /// End of stream observed while a final delay was still owed
    eof_after_delay: bool,
}

impl Direction {
    fn new(limit: SpeedLimit) -> Self {
        Self {
            limit,
            pacer: Pacer::new(),
            delay: None,
            eof_after_delay: false,
        }
    }

    /// Wait out a pending delay, if any
    fn poll_delay(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        if let Some(delay) = self.delay.as_mut() {
            ready!(delay.as_mut().poll(cx));
            self.delay = None;
            self.pacer.resume();
        }
        Poll::Ready(())
    }

    fn schedule(&mut self, delay: Option<Duration>) {
        if let Some(delay) = delay {
            self.delay = Some(Box::pin(sleep(delay)));
        }
    }

    fn record(&mut self, bytes: usize) -> Option<Duration> {
        self.pacer.record(bytes, self.limit.get())
    }

    fn block_for(&mut self, delay: Option<Duration>) {
        if let Some(delay) = delay {
            thread::sleep(delay);
            self.pacer.resume();
        }
    }
}

/// A stream whose reads and writes are paced to configured ceilings
#[derive(Debug)]
pub struct ThrottledStream<S> {
    inner: S,
    read: Direction,
    write: Direction,
}

impl<S> ThrottledStream<S> {
    /// Wrap `inner` with shared read and write limits
    pub fn new(inner: S, read_limit: SpeedLimit, write_limit: SpeedLimit) -> Self {
        Self {
            inner,
            read: Direction::new(read_limit),
            write: Direction::new(write_limit),
        }
    }

    /// Wrap `inner` with a fixed read ceiling and unthrottled writes
    pub fn reader(inner: S, read_speed: Speed) -> Self {
        Self::new(inner, SpeedLimit::new(read_speed), SpeedLimit::unlimited())
    }

    /// Wrap `inner` with a fixed write ceiling and unthrottled reads
    pub fn writer(inner: S, write_speed: Speed) -> Self {
        Self::new(inner, SpeedLimit::unlimited(), SpeedLimit::new(write_speed))
    }

    /// Handle to the read ceiling; updates apply to the next read
    pub fn read_limit(&self) -> SpeedLimit {
        self.read.limit.clone()
    }

    /// Handle to the write ceiling; updates apply to the next write
    pub fn write_limit(&self) -> SpeedLimit {
        self.write.limit.clone()
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for ThrottledStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        ready!(this.read.poll_delay(cx));
        if std::mem::take(&mut this.read.eof_after_delay) {
            return Poll::Ready(Ok(()));
        }

        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        let n = buf.filled().len() - before;

        if n > 0 {
            let delay = this.read.record(n);
            this.read.schedule(delay);
            return Poll::Ready(Ok(()));
        }

        // End of stream: serve whatever delay is still owed first
        let delay = this.read.pacer.drain();
        if delay.is_none() {
            return Poll::Ready(Ok(()));
        }
        this.read.schedule(delay);
        this.read.eof_after_delay = true;
        ready!(this.read.poll_delay(cx));
        this.read.eof_after_delay = false;
        Poll::Ready(Ok(()))
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for ThrottledStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();

        ready!(this.write.poll_delay(cx));
        let n = ready!(Pin::new(&mut this.inner).poll_write(cx, buf))?;

        let delay = this.write.record(n);
        this.write.schedule(delay);
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if this.write.delay.is_none() {
            let delay = this.write.pacer.drain();
            this.write.schedule(delay);
        }
        ready!(this.write.poll_delay(cx));
        Pin::new(&mut this.inner).poll_shutdown(cx)
    }
}

impl<S: Read> Read for ThrottledStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;

        let delay = if n > 0 {
            self.read.record(n)
        } else {
            self.read.pacer.drain()
        };
        self.read.block_for(delay);
        Ok(n)
    }
}

impl<S: Write> Write for ThrottledStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;

        let delay = self.write.record(n);
        self.write.block_for(delay);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

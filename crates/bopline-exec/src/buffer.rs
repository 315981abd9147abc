//! Chunk buffers between operators.
//!
//! A [`BlockingBuffer`] is a producer's handle on a bounded channel: `add`
//! waits while the channel is full, which is what bounds pipeline memory. An
//! [`AsyncSource`] is the single consumer end. A channel closes once every
//! producer handle has been closed or dropped.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use bopline_bop::chunk::chunk_of;
use bopline_bop::{BindingSet, Chunk};
use bopline_core::id::BopId;
use tokio::sync::mpsc;

use crate::error::{ExecError, Result};
use crate::stats::BopStats;

/// A bounded channel of chunks.
pub fn bounded(capacity: usize) -> (BlockingBuffer, AsyncSource) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        BlockingBuffer::from_sender(None, tx),
        AsyncSource::from_receiver(rx),
    )
}

/// Clones share one producer handle; closing any of them closes all. Build a
/// separate handle per producer with [`BlockingBuffer::from_sender`].
#[derive(Debug, Clone)]
pub struct BlockingBuffer {
    target: Option<BopId>,
    tx: Arc<Mutex<Option<mpsc::Sender<Chunk>>>>,
    stats: Option<Arc<BopStats>>,
}

impl BlockingBuffer {
    /// A producer handle feeding `target` (`None` for the query output).
    pub fn from_sender(target: Option<BopId>, tx: mpsc::Sender<Chunk>) -> Self {
        Self {
            target,
            tx: Arc::new(Mutex::new(Some(tx))),
            stats: None,
        }
    }

    /// Count chunks written through this handle as output of `stats`' owner.
    pub fn with_stats(mut self, stats: Arc<BopStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn target(&self) -> Option<BopId> {
        self.target
    }

    fn sender(&self) -> Option<mpsc::Sender<Chunk>> {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Append a chunk, waiting while the buffer is full. Empty chunks are
    /// dropped.
    pub async fn add(&self, chunk: Chunk) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        let tx = self.sender().ok_or(ExecError::SinkClosed)?;
        let units = chunk.len();
        if tx.send(chunk).await.is_err() {
            tracing::warn!(target_bop = ?self.target, "sink consumer went away");
            return Err(ExecError::SinkClosed);
        }
        if let Some(stats) = &self.stats {
            stats.add_chunk_out(units);
        }
        tracing::trace!(target_bop = ?self.target, units, "chunk added");
        Ok(())
    }

    /// Chunks are handed over on `add`; flushing only checks the buffer can
    /// still deliver.
    pub fn flush(&self) -> Result<()> {
        match self.sender() {
            Some(tx) if !tx.is_closed() => Ok(()),
            _ => Err(ExecError::SinkClosed),
        }
    }

    /// Release this producer handle. Idempotent.
    pub fn close(&self) {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    pub fn is_open(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// The consumer end of a buffer, optionally primed with chunks.
#[derive(Debug, Default)]
pub struct AsyncSource {
    pending: VecDeque<Chunk>,
    rx: Option<mpsc::Receiver<Chunk>>,
}

impl AsyncSource {
    pub fn from_receiver(rx: mpsc::Receiver<Chunk>) -> Self {
        Self {
            pending: VecDeque::new(),
            rx: Some(rx),
        }
    }

    /// A finished source yielding exactly `chunks`.
    pub fn from_chunks(chunks: impl IntoIterator<Item = Chunk>) -> Self {
        Self {
            pending: chunks.into_iter().collect(),
            rx: None,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Yield `chunk` before anything arriving on the channel.
    pub fn prime(mut self, chunk: Chunk) -> Self {
        self.pending.push_back(chunk);
        self
    }

    /// The next chunk, waiting for upstream; `None` once every producer has
    /// closed.
    pub async fn next(&mut self) -> Option<Chunk> {
        if let Some(chunk) = self.pending.pop_front() {
            return Some(chunk);
        }
        match self.rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    /// Stop consuming. Producers blocked on a full buffer are released with
    /// `SinkClosed`.
    pub fn close(&mut self) {
        self.pending.clear();
        if let Some(mut rx) = self.rx.take() {
            rx.close();
        }
    }
}

/// Single-writer staging area in front of a shared sink.
///
/// Solutions accumulate locally and reach the sink as one chunk per
/// `capacity` solutions, plus a final partial chunk on `flush`.
#[derive(Debug)]
pub struct UnsyncLocalOutputBuffer<'s> {
    capacity: usize,
    sink: &'s BlockingBuffer,
    pending: Vec<BindingSet>,
}

impl<'s> UnsyncLocalOutputBuffer<'s> {
    pub fn new(capacity: usize, sink: &'s BlockingBuffer) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            sink,
            pending: Vec::with_capacity(capacity),
        }
    }

    pub async fn add(&mut self, bindings: BindingSet) -> Result<()> {
        self.pending.push(bindings);
        if self.pending.len() >= self.capacity {
            self.flush().await?;
        }
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = std::mem::replace(&mut self.pending, Vec::with_capacity(self.capacity));
        self.sink.add(chunk_of(batch)).await
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bopline_core::var::Var;

    fn solutions(n: i64) -> Vec<BindingSet> {
        let x = Var::named("buf_x");
        (0..n).map(|i| BindingSet::new().with(x, i)).collect()
    }

    #[tokio::test]
    async fn test_channel_closes_when_producers_close() {
        let (sink, mut source) = bounded(4);
        let other = sink.clone();
        sink.add(chunk_of(solutions(2))).await.unwrap();
        sink.close();
        assert!(other.add(chunk_of(solutions(1))).await.is_err());
        assert_eq!(source.next().await.unwrap().len(), 2);
        assert!(source.next().await.is_none());
    }

    #[tokio::test]
    async fn test_closed_source_releases_producer() {
        let (sink, mut source) = bounded(1);
        source.close();
        assert!(matches!(
            sink.add(chunk_of(solutions(1))).await,
            Err(ExecError::SinkClosed)
        ));
        assert!(sink.flush().is_err());
    }

    #[tokio::test]
    async fn test_local_buffer_batches_by_capacity() {
        let (sink, mut source) = bounded(8);
        let stats = Arc::new(BopStats::new());
        let sink = sink.with_stats(Arc::clone(&stats));
        {
            let mut out = UnsyncLocalOutputBuffer::new(2, &sink);
            for bs in solutions(5) {
                out.add(bs).await.unwrap();
            }
            assert_eq!(out.len(), 1);
            out.flush().await.unwrap();
            assert!(out.is_empty());
        }
        sink.close();
        let mut sizes = Vec::new();
        while let Some(chunk) = source.next().await {
            sizes.push(chunk.len());
        }
        assert_eq!(sizes, vec![2, 2, 1]);
        let snap = stats.snapshot();
        assert_eq!((snap.chunks_out, snap.units_out), (3, 5));
    }

    #[tokio::test]
    async fn test_primed_source_yields_first() {
        let (sink, source) = bounded(2);
        let mut source = source.prime(chunk_of(solutions(3)));
        sink.add(chunk_of(solutions(1))).await.unwrap();
        drop(sink);
        assert_eq!(source.next().await.unwrap().len(), 3);
        assert_eq!(source.next().await.unwrap().len(), 1);
        assert!(source.next().await.is_none());
    }
}

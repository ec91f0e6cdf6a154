use anyhow::{anyhow, Result};
use crossbeam_channel as channel;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::error;

// One dedicated IO thread per partition file. Senders are bounded for backpressure.
pub struct WriterPool {
    senders: Vec<channel::Sender<WriterMsg>>,
    metrics: Arc<Vec<PartitionCounters>>,
}

enum WriterMsg { Data(Vec<u8>), Close }

pub struct WriterJoiner {
    handles: Vec<(PathBuf, thread::JoinHandle<Result<()>>)>,
}

impl WriterJoiner {
    /// Waits for every IO thread; the first write failure fails the whole spill.
    pub fn join_all(&mut self) -> Result<()> {
        let mut first_err = None;
        for (path, h) in self.handles.drain(..) {
            let outcome = h.join().map_err(|_| anyhow!("writer thread for {} panicked", path.display())).and_then(|r| r);
            if let Err(e) = outcome {
                error!("writer {}: {:#}", path.display(), e);
                first_err.get_or_insert(e);
            }
        }
        match first_err { Some(e) => Err(e), None => Ok(()) }
    }
}

impl WriterPool {
    pub fn new(base_dir: &Path, node_id: usize, num_partitions: usize, flush_bytes: usize, flush_interval: Duration, queue_cap: usize) -> Result<(Self, WriterJoiner)> {
        crate::io::ensure_dir(base_dir)?;
        let mut senders = Vec::with_capacity(num_partitions);
        let mut handles = Vec::with_capacity(num_partitions);
        let metrics: Arc<Vec<PartitionCounters>> = Arc::new((0..num_partitions).map(|_| PartitionCounters::default()).collect());
        for part in 0..num_partitions {
            let (tx, rx) = channel::bounded::<WriterMsg>(queue_cap.max(1));
            let path = spill_path(base_dir, node_id, part);
            let thread_path = path.clone();
            let metrics = Arc::clone(&metrics);
            let handle = thread::spawn(move || -> Result<()> {
                let counters = &metrics[part];
                let mut writer = crate::io::open_writer(&thread_path)?;
                let mut buf: Vec<u8> = Vec::with_capacity(flush_bytes.min(1024 * 1024));
                let mut last_flush = Instant::now();
                loop {
                    let timeout = flush_interval.saturating_sub(last_flush.elapsed());
                    match rx.recv_timeout(timeout) {
                        Ok(WriterMsg::Data(bytes)) => {
                            counters.queue_len.fetch_sub(1, Ordering::Relaxed);
                            buf.extend_from_slice(&bytes);
                        }
                        Ok(WriterMsg::Close) | Err(channel::RecvTimeoutError::Disconnected) => {
                            write_out(&mut writer, &mut buf, counters)?;
                            writer.flush()?;
                            return Ok(());
                        }
                        Err(channel::RecvTimeoutError::Timeout) => {}
                    }
                    let due_to_size = buf.len() >= flush_bytes;
                    let due_to_timer = !due_to_size && last_flush.elapsed() >= flush_interval;
                    if due_to_size || due_to_timer {
                        write_out(&mut writer, &mut buf, counters)?;
                        if due_to_size { counters.flush_by_size.fetch_add(1, Ordering::Relaxed); }
                        if due_to_timer { counters.flush_by_timer.fetch_add(1, Ordering::Relaxed); }
                        writer.flush()?;
                        last_flush = Instant::now();
                    }
                }
            });
            senders.push(tx);
            handles.push((path, handle));
        }
        Ok((Self { senders, metrics }, WriterJoiner { handles }))
    }

    pub fn num_partitions(&self) -> usize { self.senders.len() }

    // Callers hand over a chunk of encoded records; IO threads handle batching and flush policy.
    pub fn write_chunk(&self, partition: usize, bytes: Vec<u8>) -> Result<()> {
        let counters = &self.metrics[partition];
        counters.enq_bytes.fetch_add(bytes.len() as u64, Ordering::Relaxed);
        let q = counters.queue_len.fetch_add(1, Ordering::Relaxed) + 1;
        counters.max_queue_len.fetch_max(q, Ordering::Relaxed);
        self.senders[partition]
            .send(WriterMsg::Data(bytes))
            .map_err(|_| anyhow!("writer for partition {} is gone", partition))
    }

    pub fn close_all(&self) {
        for tx in &self.senders {
            let _ = tx.send(WriterMsg::Close);
        }
    }

    pub fn make_thread_writer(&self, local_batch_bytes: usize) -> ThreadWriter<'_> {
        ThreadWriter::new(self, local_batch_bytes)
    }

    pub fn metrics_snapshot(&self) -> Vec<WriterPartitionMetrics> {
        self.metrics.iter().map(|c| WriterPartitionMetrics {
            max_queue_len: c.max_queue_len.load(Ordering::Relaxed),
            enq_bytes: c.enq_bytes.load(Ordering::Relaxed),
            flush_by_size: c.flush_by_size.load(Ordering::Relaxed),
            flush_by_timer: c.flush_by_timer.load(Ordering::Relaxed),
            bytes_written: c.bytes_written.load(Ordering::Relaxed),
            write_calls: c.write_calls.load(Ordering::Relaxed),
        }).collect()
    }
}

pub fn spill_path(base_dir: &Path, node_id: usize, partition: usize) -> PathBuf {
    base_dir.join(format!("task{}_part{}.bin", node_id, partition))
}

fn write_out(writer: &mut impl Write, buf: &mut Vec<u8>, counters: &PartitionCounters) -> Result<()> {
    if buf.is_empty() { return Ok(()); }
    writer.write_all(buf)?;
    counters.bytes_written.fetch_add(buf.len() as u64, Ordering::Relaxed);
    counters.write_calls.fetch_add(1, Ordering::Relaxed);
    buf.clear();
    Ok(())
}

/// Per map task batching in front of the shared pool.
pub struct ThreadWriter<'a> {
    pool: &'a WriterPool,
    local_buffers: Vec<Vec<u8>>, // per-partition aggregation buffers
    batch_bytes: usize,
    flushes: u64,
    bytes_sent: u64,
}

impl<'a> ThreadWriter<'a> {
    fn new(pool: &'a WriterPool, batch_bytes: usize) -> Self {
        let local_buffers = (0..pool.num_partitions()).map(|_| Vec::new()).collect();
        Self { pool, local_buffers, batch_bytes, flushes: 0, bytes_sent: 0 }
    }

    pub fn emit_record(&mut self, partition: usize, key: &[u8], value: &[u8]) -> Result<()> {
        let buf = &mut self.local_buffers[partition];
        crate::io::write_bin(buf, key, value);
        if buf.len() >= self.batch_bytes {
            self.flush_partition(partition)?;
        }
        Ok(())
    }

    pub fn flush_all(&mut self) -> Result<()> {
        for p in 0..self.local_buffers.len() {
            if !self.local_buffers[p].is_empty() {
                self.flush_partition(p)?;
            }
        }
        Ok(())
    }

    fn flush_partition(&mut self, partition: usize) -> Result<()> {
        let chunk = std::mem::take(&mut self.local_buffers[partition]);
        self.bytes_sent += chunk.len() as u64;
        self.flushes += 1;
        self.pool.write_chunk(partition, chunk)
    }

    /// `(flushes, bytes_sent)`
    pub fn stats(&self) -> (u64, u64) {
        (self.flushes, self.bytes_sent)
    }
}

#[derive(Default)]
struct PartitionCounters {
    queue_len: AtomicUsize,
    max_queue_len: AtomicUsize,
    enq_bytes: AtomicU64,
    flush_by_size: AtomicU64,
    flush_by_timer: AtomicU64,
    bytes_written: AtomicU64,
    write_calls: AtomicU64,
}

#[derive(Clone, Debug)]
pub struct WriterPartitionMetrics {
    pub max_queue_len: usize,
    pub enq_bytes: u64,
    pub flush_by_size: u64,
    pub flush_by_timer: u64,
    pub bytes_written: u64,
    pub write_calls: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_writes_every_chunk_to_its_partition_file() {
        let dir = tempfile::tempdir().unwrap();
        let (pool, mut joiner) = WriterPool::new(dir.path(), 3, 2, 1024, Duration::from_millis(10), 4).unwrap();
        {
            let mut tw = pool.make_thread_writer(16);
            for i in 0..20u32 {
                tw.emit_record((i % 2) as usize, &i.to_le_bytes(), b"v").unwrap();
            }
            tw.flush_all().unwrap();
        }
        pool.close_all();
        joiner.join_all().unwrap();

        for part in 0..2 {
            let bytes = std::fs::read(spill_path(dir.path(), 3, part)).unwrap();
            let mut off = 0;
            let mut n = 0;
            while let Some((_, v, next)) = crate::io::read_bin_line(&bytes, off) {
                assert_eq!(v, b"v");
                n += 1;
                off = next;
            }
            assert_eq!(off, bytes.len());
            assert_eq!(n, 10);
        }
        let written: u64 = pool.metrics_snapshot().iter().map(|m| m.bytes_written).sum();
        assert_eq!(written, 20 * (8 + 4 + 1));
        let enqueued: u64 = pool.metrics_snapshot().iter().map(|m| m.enq_bytes).sum();
        assert_eq!(enqueued, written);
    }
}

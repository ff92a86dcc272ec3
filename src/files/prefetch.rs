//! One-block-ahead read pipeline.
//!
//! A worker thread fills the next block (reading and decompressing) while the
//! caller parses the current one. Two buffers circulate between the threads:
//! filled blocks travel to the caller over a capacity-1 channel, and the
//! caller hands its previous block back over a second channel when it asks
//! for the next. Ownership moves with the buffer, so neither side can touch a
//! block the other is using.
//!
//! When threads are disabled, or spawning fails, every request is served by
//! a direct synchronous `fill`.

use std::io::{self, BufRead, Read};
use std::mem;
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use super::source::ByteSource;

/// Default block size. Larger blocks pay off more with a compressed input;
/// past 256 KiB the gain on `.bz2` files is negligible.
pub const BLOCK_SIZE: usize = 256 * 1024;

struct Block {
    bytes: Box<[u8]>,
    len: usize,
}

impl Block {
    fn with_capacity(size: usize) -> Self {
        Block {
            bytes: vec![0u8; size].into_boxed_slice(),
            len: 0,
        }
    }

    fn empty() -> Self {
        Block {
            bytes: Box::default(),
            len: 0,
        }
    }

    fn data(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

type SpawnFn = fn(Box<dyn FnOnce() + Send>) -> io::Result<JoinHandle<()>>;

fn spawn_worker(task: Box<dyn FnOnce() + Send>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new().name("osm-prefetch".into()).spawn(task)
}

struct Worker {
    filled: Receiver<Block>,
    recycle: Sender<Block>,
    handle: JoinHandle<()>,
}

enum Pipeline {
    /// Nothing requested yet; the worker starts on first use.
    Pending(Box<dyn ByteSource>),
    Threaded(Worker),
    Synchronous(Box<dyn ByteSource>),
    Finished,
}

/// Double-buffered reader over a [`ByteSource`].
///
/// Use [`Prefetcher::request_next`] and [`Prefetcher::block`] block by block,
/// or the [`BufRead`] implementation to plug it into a tokenizer. Dropping
/// the prefetcher stops the worker and waits for it to exit.
pub struct Prefetcher {
    pipeline: Pipeline,
    front: Block,
    pos: usize,
    block_size: usize,
    threaded: bool,
    spawn: SpawnFn,
    eof: bool,
    total: u64,
}

impl Prefetcher {
    pub fn new(source: Box<dyn ByteSource>, block_size: usize, threaded: bool) -> Self {
        Prefetcher {
            pipeline: Pipeline::Pending(source),
            front: Block::empty(),
            pos: 0,
            block_size: block_size.max(1),
            threaded,
            spawn: spawn_worker,
            eof: false,
            total: 0,
        }
    }

    /// Bytes of the current block.
    pub fn block(&self) -> &[u8] {
        self.front.data()
    }

    /// Total bytes delivered so far.
    pub fn total_bytes(&self) -> u64 {
        self.total
    }

    pub fn is_threaded(&self) -> bool {
        matches!(self.pipeline, Pipeline::Threaded(_))
    }

    /// Replace the current block with the next one and return its length.
    /// 0 signals end of stream.
    pub fn request_next(&mut self) -> usize {
        if self.eof {
            self.front.len = 0;
            return 0;
        }
        if let Pipeline::Pending(_) = self.pipeline {
            self.start();
        }

        let len = match &mut self.pipeline {
            Pipeline::Threaded(worker) => {
                let previous = mem::replace(&mut self.front, Block::empty());
                if !previous.bytes.is_empty() {
                    // The worker may already be gone after end of stream.
                    let _ = worker.recycle.send(previous);
                }
                match worker.filled.recv() {
                    Ok(block) => {
                        self.front = block;
                        self.front.len
                    }
                    Err(mpsc::RecvError) => 0,
                }
            }
            Pipeline::Synchronous(source) => {
                if self.front.bytes.is_empty() {
                    self.front = Block::with_capacity(self.block_size);
                }
                self.front.len = source.fill(&mut self.front.bytes);
                self.front.len
            }
            Pipeline::Pending(_) | Pipeline::Finished => 0,
        };

        self.pos = 0;
        self.total += len as u64;
        if len == 0 {
            self.eof = true;
            self.front.len = 0;
        }
        len
    }

    fn start(&mut self) {
        let Pipeline::Pending(source) = mem::replace(&mut self.pipeline, Pipeline::Finished) else {
            return;
        };
        if !self.threaded {
            self.pipeline = Pipeline::Synchronous(source);
            return;
        }

        let (source_tx, source_rx) = mpsc::sync_channel::<Box<dyn ByteSource>>(1);
        let (filled_tx, filled_rx) = mpsc::sync_channel(1);
        let (recycle_tx, recycle_rx) = mpsc::channel();
        let block_size = self.block_size;

        let spawned = (self.spawn)(Box::new(move || {
            if let Ok(source) = source_rx.recv() {
                prefetch_loop(source, block_size, filled_tx, recycle_rx);
            }
        }));

        self.pipeline = match spawned {
            Ok(handle) => match source_tx.send(source) {
                Ok(()) => Pipeline::Threaded(Worker {
                    filled: filled_rx,
                    recycle: recycle_tx,
                    handle,
                }),
                Err(mpsc::SendError(source)) => {
                    warn!("Prefetch thread exited early, reading synchronously");
                    let _ = handle.join();
                    Pipeline::Synchronous(source)
                }
            },
            Err(err) => {
                warn!(err = err.to_string().as_str(); "Could not spawn prefetch thread, reading synchronously");
                Pipeline::Synchronous(source)
            }
        };
    }
}

/// Worker side: always have the next block read before being asked for it.
fn prefetch_loop(
    mut source: Box<dyn ByteSource>,
    block_size: usize,
    filled: SyncSender<Block>,
    recycle: Receiver<Block>,
) {
    let mut spare = vec![Block::with_capacity(block_size), Block::with_capacity(block_size)];
    loop {
        let mut block = match spare.pop() {
            Some(block) => block,
            None => match recycle.recv() {
                Ok(block) => block,
                Err(mpsc::RecvError) => break,
            },
        };
        block.len = source.fill(&mut block.bytes);
        let done = block.len == 0;
        if filled.send(block).is_err() || done {
            break;
        }
    }
    debug!("Prefetch thread exiting");
}

impl Drop for Prefetcher {
    fn drop(&mut self) {
        if let Pipeline::Threaded(worker) = mem::replace(&mut self.pipeline, Pipeline::Finished) {
            let Worker { filled, recycle, handle } = worker;
            // Closing both channels wakes the worker wherever it waits.
            drop(filled);
            drop(recycle);
            if handle.join().is_err() {
                warn!("Prefetch thread panicked");
            }
        }
    }
}

impl Read for Prefetcher {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl BufRead for Prefetcher {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.front.len && !self.eof {
            self.request_next();
        }
        Ok(&self.front.bytes[self.pos..self.front.len])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.front.len);
    }
}

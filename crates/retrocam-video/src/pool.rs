use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FramePoolStats {
    pub allocated: u64,
    pub reused: u64,
    pub outstanding: usize,
    pub exhausted: u64,
}

/// Bounded pool of RGBA8 output buffers, all of one frame size.
///
/// At most `capacity` buffers are out at once; [`FramePool::acquire`]
/// returns `None` beyond that and the caller drops the frame.
#[derive(Debug)]
pub struct FramePool {
    frame_len: usize,
    capacity: usize,
    free: Vec<Vec<u8>>,
    stats: FramePoolStats,
}

impl FramePool {
    pub fn new(frame_len: usize, capacity: usize) -> Self {
        Self {
            frame_len,
            capacity,
            free: Vec::new(),
            stats: FramePoolStats::default(),
        }
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> FramePoolStats {
        self.stats
    }

    pub fn acquire(&mut self) -> Option<Vec<u8>> {
        if self.stats.outstanding >= self.capacity {
            self.stats.exhausted += 1;
            return None;
        }
        self.stats.outstanding += 1;
        if let Some(buf) = self.free.pop() {
            self.stats.reused += 1;
            return Some(buf);
        }
        self.stats.allocated += 1;
        Some(vec![0u8; self.frame_len])
    }

    /// Return a buffer. Buffers of the wrong size are dropped.
    pub fn release(&mut self, buf: Vec<u8>) {
        self.stats.outstanding = self.stats.outstanding.saturating_sub(1);
        if buf.len() == self.frame_len && self.free.len() < self.capacity {
            self.free.push(buf);
        }
    }
}

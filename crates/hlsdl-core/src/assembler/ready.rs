//! Which staged segments have signalled completion.

/// One bit per segment index.
#[derive(Debug, Clone)]
pub struct ReadySet {
    bytes: Vec<u8>,
    len: usize,
}

impl ReadySet {
    pub fn new(segment_count: usize) -> Self {
        ReadySet {
            bytes: vec![0u8; (segment_count + 7) / 8],
            len: segment_count,
        }
    }

    /// Mark `index` ready. Out-of-range indices are ignored; returns false for them.
    pub fn insert(&mut self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        self.bytes[index / 8] |= 1 << (index % 8);
        true
    }

    pub fn contains(&self, index: usize) -> bool {
        self.bytes
            .get(index / 8)
            .map(|&b| (b & (1 << (index % 8))) != 0)
            .unwrap_or(false)
    }

    pub fn count(&self) -> usize {
        self.bytes.iter().map(|b| b.count_ones() as usize).sum()
    }
}

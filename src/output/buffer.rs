//! Output queue
//!
//! Bytes wait here as typed runs until the engine flushes them. Adjacent
//! runs of the same kind are merged.

/// Kind of a queued byte run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    /// Character payload
    Text,
    /// Control sequence
    Control,
}

/// Ordered queue of byte runs awaiting transmission
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    runs: Vec<(RunKind, Vec<u8>)>,
    len: usize,
    capacity: usize,
}

impl OutputBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            runs: Vec::new(),
            len: 0,
            capacity: capacity.max(1),
        }
    }

    pub fn push_text(&mut self, bytes: &[u8]) {
        self.push(RunKind::Text, bytes);
    }

    pub fn push_control(&mut self, bytes: &[u8]) {
        self.push(RunKind::Control, bytes);
    }

    fn push(&mut self, kind: RunKind, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.len += bytes.len();
        match self.runs.last_mut() {
            Some((last_kind, run)) if *last_kind == kind => run.extend_from_slice(bytes),
            _ => self.runs.push((kind, bytes.to_vec())),
        }
    }

    /// Total queued bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if the queue reached its capacity
    pub fn is_full(&self) -> bool {
        self.len >= self.capacity
    }

    pub fn runs(&self) -> impl Iterator<Item = (RunKind, &[u8])> {
        self.runs.iter().map(|(kind, run)| (*kind, run.as_slice()))
    }

    /// Concatenate all runs in order and empty the queue
    pub fn take(&mut self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for (_, run) in self.runs.drain(..) {
            out.extend_from_slice(&run);
        }
        self.len = 0;
        out
    }

    /// Drop everything queued
    pub fn clear(&mut self) {
        self.runs.clear();
        self.len = 0;
    }
}

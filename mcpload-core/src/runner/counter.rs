use std::sync::atomic::{AtomicU64, Ordering};

/// Run-wide request numbering shared by every worker. `next` hands out
/// 1, 2, 3, ... with no duplicates or gaps under any interleaving; the
/// increment-and-read is a single `fetch_add`.
#[derive(Debug, Default)]
pub struct SequenceCounter {
    issued: AtomicU64,
}

impl SequenceCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Total numbers handed out so far.
    #[must_use]
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }
}

//! Predicted-write log.
//!
//! The producer knows, at synthesis time, what value a store it emits should
//! put on the bus. It records `(address, value)` where `address` is the CPU
//! address of the store's last operand byte. When the CPU later writes, the
//! adapter compares the address of the *last read* against the next entry:
//! the 6502 always fetches an instruction's final operand byte immediately
//! before the write it encodes, so the fetch identifies the store.
//!
//! Entries recorded during one producer turn become live when the producer
//! yields, and are consumed strictly in order. Whatever is still live when
//! the stepper resumes the producer is discarded.

/// One predicted write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictedWrite {
    /// CPU address whose read precedes the write.
    pub address: u16,
    /// Value the write should carry.
    pub value: u8,
}

#[derive(Debug, Default, Clone)]
pub struct PredictedWrites {
    entries: Vec<PredictedWrite>,
    /// Entries in the sealed batch; zero while the producer is appending.
    live: usize,
    /// Next live entry to compare.
    cursor: usize,
}

impl PredictedWrites {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Producer side: record a write for the current batch.
    pub fn record(&mut self, address: u16, value: u8) {
        self.entries.push(PredictedWrite { address, value });
    }

    /// Producer side, at a yield: make the recorded entries live.
    pub fn seal(&mut self) {
        self.live = self.entries.len();
        self.cursor = 0;
    }

    /// Stepper side, on a bus write: substitute the next entry's value if it
    /// was predicted for `last_read`.
    pub fn consume(&mut self, last_read: u16) -> Option<u8> {
        if self.cursor >= self.live {
            return None;
        }
        let entry = *self.entries.get(self.cursor)?;
        if entry.address != last_read {
            return None;
        }
        self.cursor += 1;
        Some(entry.value)
    }

    /// Stepper side, before resuming the producer: drop the batch.
    ///
    /// Returns the number of live entries that were never consumed.
    pub fn begin_batch(&mut self) -> usize {
        let discarded = self.pending();
        self.entries.clear();
        self.live = 0;
        self.cursor = 0;
        discarded
    }

    /// Live entries not yet consumed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.live - self.cursor
    }

    /// Entries recorded since the last batch started, sealed or not.
    #[must_use]
    pub fn recorded(&self) -> &[PredictedWrite] {
        &self.entries
    }
}

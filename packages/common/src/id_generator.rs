use chrono::Utc;
use crc32fast::Hasher;

/// Largest per-millisecond sequence number before the generator borrows the next millisecond
const MAX_SEQUENCE: u32 = 0xff_ffff;

/// Derive a stable seed from a document or graph name using CRC32
pub fn get_seed(name: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(name.as_bytes());
    format!("{:08x}", hasher.finalize())
}

/// Generates node identifiers that sort lexicographically in generation order.
///
/// An identifier is `<millis:12 hex><sequence:6 hex>-<seed>`. Both leading fields are
/// fixed-width, so string order equals `(millis, sequence)` order. When the wall clock
/// stalls or steps backwards the generator keeps its last timestamp and bumps the
/// sequence instead, which keeps identifiers strictly increasing.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    seed: String,
    last_millis: u64,
    sequence: u32,
    started: bool,
}

impl IdGenerator {
    pub fn new(name: &str) -> Self {
        Self::from_seed(get_seed(name))
    }

    pub fn from_seed(seed: String) -> Self {
        Self {
            seed,
            last_millis: 0,
            sequence: 0,
            started: false,
        }
    }

    /// Generate the next identifier
    pub fn new_id(&mut self) -> String {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        self.next_at(now)
    }

    fn next_at(&mut self, now_millis: u64) -> String {
        if !self.started || now_millis > self.last_millis {
            self.started = true;
            self.last_millis = now_millis;
            self.sequence = 0;
        } else if self.sequence >= MAX_SEQUENCE {
            self.last_millis += 1;
            self.sequence = 0;
        } else {
            self.sequence += 1;
        }

        format!("{:012x}{:06x}-{}", self.last_millis, self.sequence, self.seed)
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }
}

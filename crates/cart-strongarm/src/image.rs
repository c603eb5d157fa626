//! The synthetic ROM image and the state that travels with it.

use crate::error::BridgeError;
use crate::stuffing::PredictedWrites;

/// Bytes in the synthetic image.
pub const IMAGE_SIZE: usize = 4096;

/// CPU address of image offset 0.
pub const IMAGE_BASE: u16 = 0x1000;

/// Mask from a CPU address to an image offset.
pub const IMAGE_MASK: u16 = 0x0FFF;

/// Image offsets of the 6507 reset vector ($1FFC/$1FFD).
const RESET_VECTOR_OFFSET: usize = 0xFFC;

/// Fixed-size byte buffer standing in for cartridge ROM.
///
/// Bytes are appended at a write cursor that only moves backwards through
/// [`seek`](Self::seek) or [`reset`](Self::reset). Bytes never written since
/// the last reset read as zero.
#[derive(Clone)]
pub struct SyntheticImage {
    bytes: Box<[u8; IMAGE_SIZE]>,
    next: usize,
}

impl Default for SyntheticImage {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SyntheticImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntheticImage").field("next", &self.next).finish_non_exhaustive()
    }
}

impl SyntheticImage {
    /// A cleared image whose reset vector points at [`IMAGE_BASE`].
    #[must_use]
    pub fn new() -> Self {
        let mut image = Self {
            bytes: Box::new([0; IMAGE_SIZE]),
            next: 0,
        };
        image.reset();
        image
    }

    /// Clear every byte, rewind the cursor and re-seed the reset vector.
    pub fn reset(&mut self) {
        self.bytes.fill(0);
        self.next = 0;
        let [lo, hi] = IMAGE_BASE.to_le_bytes();
        self.bytes[RESET_VECTOR_OFFSET] = lo;
        self.bytes[RESET_VECTOR_OFFSET + 1] = hi;
    }

    /// Append a byte at the cursor and return the offset it landed at.
    pub fn append(&mut self, byte: u8) -> Result<u16, BridgeError> {
        if self.next >= IMAGE_SIZE {
            return Err(BridgeError::CapacityExceeded { capacity: IMAGE_SIZE });
        }
        let offset = self.next;
        self.bytes[offset] = byte;
        self.next += 1;
        Ok(offset as u16)
    }

    #[must_use]
    pub fn read(&self, offset: u16) -> u8 {
        self.bytes[usize::from(offset & IMAGE_MASK)]
    }

    /// Overwrite a byte without moving the cursor.
    pub fn set(&mut self, offset: u16, byte: u8) {
        self.bytes[usize::from(offset & IMAGE_MASK)] = byte;
    }

    /// Move the cursor. Subsequent appends overwrite from `offset`.
    pub fn seek(&mut self, offset: u16) {
        self.next = usize::from(offset & IMAGE_MASK);
    }

    /// Offset the next append will write to. Equals [`IMAGE_SIZE`] when full.
    #[must_use]
    pub fn next_index(&self) -> usize {
        self.next
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_slice()
    }

    /// Replace the whole image and cursor (state restore).
    pub(crate) fn restore(&mut self, bytes: &[u8], next: usize) -> Result<(), BridgeError> {
        if bytes.len() != IMAGE_SIZE {
            return Err(BridgeError::InvalidSnapshot(format!(
                "image is {} bytes, expected {IMAGE_SIZE}",
                bytes.len()
            )));
        }
        if next > IMAGE_SIZE {
            return Err(BridgeError::InvalidSnapshot(format!("write index {next} is past the image")));
        }
        self.bytes.copy_from_slice(bytes);
        self.next = next;
        Ok(())
    }
}

/// State handed back and forth between the producer and the stepper.
///
/// Whoever holds the box may touch the image and the log; the other side is
/// parked in the rendezvous.
#[derive(Debug, Default)]
pub struct Workspace {
    pub image: SyntheticImage,
    pub writes: PredictedWrites,
    /// Last value the cartridge put on the data bus for a CPU read.
    pub last_read_value: u8,
}

impl Workspace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

//! Save-state support.

use crate::error::BridgeError;
use crate::image::SyntheticImage;

/// Serializable bridge state: the image, its write cursor and the address
/// the CPU is heading for.
///
/// The producer's own progress is not captured. Loading a snapshot restarts
/// the producer from the beginning, and its first burst is written where
/// the CPU lands at `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BridgeSnapshot {
    pub image: Vec<u8>,
    pub next_index: u16,
    /// Pending handoff address; `None` if the producer was never primed.
    pub target: Option<u16>,
}

impl BridgeSnapshot {
    pub(crate) fn capture(image: &SyntheticImage, target: Option<u16>) -> Self {
        Self {
            image: image.as_bytes().to_vec(),
            next_index: image.next_index() as u16,
            target,
        }
    }

    /// Rebuild an image, rejecting snapshots of the wrong shape.
    pub(crate) fn restore(&self) -> Result<SyntheticImage, BridgeError> {
        let mut image = SyntheticImage::new();
        image.restore(&self.image, usize::from(self.next_index))?;
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::IMAGE_SIZE;

    #[test]
    fn capture_restore_preserves_cursor() {
        let mut image = SyntheticImage::new();
        image.append(0xA9).unwrap();
        image.append(0x10).unwrap();

        let snapshot = BridgeSnapshot::capture(&image, Some(0x1002));
        assert_eq!(snapshot.image.len(), IMAGE_SIZE);
        assert_eq!(snapshot.next_index, 2);
        assert_eq!(snapshot.target, Some(0x1002));

        let restored = snapshot.restore().unwrap();
        assert_eq!(restored.next_index(), 2);
        assert_eq!(restored.as_bytes(), image.as_bytes());
    }

    #[test]
    fn index_past_the_image_is_rejected() {
        let snapshot = BridgeSnapshot {
            image: vec![0; IMAGE_SIZE],
            next_index: 0x1001,
            target: None,
        };
        assert!(matches!(snapshot.restore(), Err(BridgeError::InvalidSnapshot(_))));
    }
}

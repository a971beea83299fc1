use log::trace;

use super::Frame;
use crate::common::FrameId;

/// Clock (second-chance) replacement policy.
///
/// A hand sweeps the frames in order. A frame is chosen once it is unpinned, its
/// reference bit is clear, and it is either clean or dirty eviction is allowed.
/// A set reference bit is cleared and the frame skipped, so a frame pinned since
/// the hand last passed survives one more revolution.
pub struct ClockReplacer {
    /// Index of the next frame to inspect
    hand: usize,
}

impl ClockReplacer {
    pub fn new() -> Self {
        Self { hand: 0 }
    }

    /// Returns the frame the hand will inspect next.
    #[cfg(test)]
    pub fn hand(&self) -> usize {
        self.hand
    }

    /// Picks a victim frame, or None if no frame qualifies within two
    /// revolutions. The first revolution may only clear reference bits.
    ///
    /// Free frames are skipped; they are handed out by the free list.
    pub fn victim<P>(&mut self, frames: &mut [Frame<P>], allow_dirty: bool) -> Option<FrameId> {
        let n = frames.len();
        if n == 0 {
            return None;
        }

        for _ in 0..2 * n {
            let frame = &mut frames[self.hand];
            self.hand = (self.hand + 1) % n;

            if frame.is_free() || frame.is_pinned() {
                continue;
            }
            if frame.recently_used() {
                frame.set_recently_used(false);
                continue;
            }
            if frame.is_dirty() && !allow_dirty {
                continue;
            }

            trace!("clock picked {}", frame.frame_id());
            return Some(frame.frame_id());
        }

        None
    }
}

impl Default for ClockReplacer {
    fn default() -> Self {
        Self::new()
    }
}

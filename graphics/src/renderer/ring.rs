//! Round-robin ring of frame-in-flight slots.

use crate::error::GraphicsError;

/// A fixed ring of slots used one after another.
///
/// The ring starts on its last slot so the first [`advance`](Self::advance)
/// lands on slot 0.
#[derive(Debug)]
pub struct FrameRing<T> {
    slots: Vec<T>,
    current: usize,
}

impl<T> FrameRing<T> {
    pub fn new(slots: Vec<T>) -> Result<Self, GraphicsError> {
        if slots.is_empty() {
            return Err(GraphicsError::InvalidParameter(
                "a frame ring needs at least one slot".to_string(),
            ));
        }
        let current = slots.len() - 1;
        Ok(Self { slots, current })
    }

    /// Move to the next slot and return its index.
    pub fn advance(&mut self) -> usize {
        self.current = (self.current + 1) % self.slots.len();
        self.current
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> &T {
        &self.slots[self.current]
    }

    pub fn current_mut(&mut self) -> &mut T {
        &mut self.slots[self.current]
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn wraps_after_n_rotations(#[values(1, 2, 3, 8)] slots: usize) {
        let mut ring = FrameRing::new((0..slots).collect()).unwrap();
        let first = ring.advance();
        for _ in 0..slots - 1 {
            ring.advance();
        }
        assert_eq!(ring.advance(), first);
    }

    #[test]
    fn first_advance_is_slot_zero() {
        let mut ring = FrameRing::new(vec!['a', 'b']).unwrap();
        assert_eq!(ring.advance(), 0);
        assert_eq!(*ring.current(), 'a');
        assert_eq!(ring.advance(), 1);
        assert_eq!(ring.advance(), 0);
    }

    #[test]
    fn empty_ring_is_rejected() {
        assert!(FrameRing::<u8>::new(Vec::new()).is_err());
    }
}

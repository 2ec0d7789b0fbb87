//! Fixed-capacity entity pool.
//!
//! All slots are allocated up front; spawning claims a free slot and
//! recycling hands it back.  A full pool refuses the spawn instead of
//! growing, so the memory footprint of a race never changes.

/// Anything that can live in an [`EntityPool`].
pub trait Poolable: Default {
    fn is_active(&self) -> bool;
    fn set_active(&mut self, active: bool);
}

#[derive(Debug, Clone)]
pub struct EntityPool<T> {
    slots: Vec<T>,
    /// Indices of inactive slots; popped on spawn, pushed on recycle.
    free:  Vec<usize>,
}

impl<T: Poolable> EntityPool<T> {
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| T::default()).collect();
        // reversed so slot 0 is handed out first
        let free = (0..capacity).rev().collect();
        EntityPool { slots, free }
    }

    pub fn active_count(&self) -> usize { self.slots.len() - self.free.len() }
    pub fn is_full(&self) -> bool { self.free.is_empty() }

    /// Claim a free slot and initialise it with `init`.  Returns the slot
    /// index, or `None` when every slot is in use.
    pub fn spawn(&mut self, init: impl FnOnce(&mut T)) -> Option<usize> {
        let idx = self.free.pop()?;
        let slot = &mut self.slots[idx];
        *slot = T::default();
        init(slot);
        slot.set_active(true);
        Some(idx)
    }

    /// Recycle every active slot for which `pred` returns true; returns how
    /// many were recycled.
    pub fn recycle_where(&mut self, mut pred: impl FnMut(&T) -> bool) -> usize {
        let mut n = 0;
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_active() && pred(slot) {
                slot.set_active(false);
                self.free.push(idx);
                n += 1;
            }
        }
        n
    }

    /// Deactivate everything.
    pub fn clear(&mut self) {
        for slot in &mut self.slots { slot.set_active(false); }
        self.free = (0..self.slots.len()).rev().collect();
    }

    pub fn get(&self, idx: usize) -> Option<&T> {
        self.slots.get(idx).filter(|s| s.is_active())
    }

    pub fn iter_active(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter(|s| s.is_active())
    }

    pub fn iter_active_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().filter(|s| s.is_active())
    }
}

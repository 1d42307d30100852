use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferSlot {
    Primary,
    Secondary,
}

impl BufferSlot {
    pub fn other(self) -> Self {
        match self {
            BufferSlot::Primary => BufferSlot::Secondary,
            BufferSlot::Secondary => BufferSlot::Primary,
        }
    }
}

/// Single-slot handoff from the DMA interrupt to the main loop.
///
/// The interrupt writes the selector and then raises the flag; the main loop
/// clears the flag and then reads the selector. At most one filled buffer is
/// outstanding at a time.
#[derive(Debug, Default)]
pub struct BufferHandoff {
    ready: AtomicBool,
    selector: AtomicU8,
}

impl BufferHandoff {
    pub const fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            selector: AtomicU8::new(0),
        }
    }

    /// Interrupt side. The flag store must stay last.
    pub fn signal(&self, slot: BufferSlot) {
        let code = match slot {
            BufferSlot::Primary => 0,
            BufferSlot::Secondary => 1,
        };
        self.selector.store(code, Ordering::Relaxed);
        self.ready.store(true, Ordering::Release);
    }

    /// Main-loop side: returns the ready buffer once and clears the flag.
    pub fn take(&self) -> Option<BufferSlot> {
        if !self.ready.swap(false, Ordering::Acquire) {
            return None;
        }
        match self.selector.load(Ordering::Relaxed) {
            0 => Some(BufferSlot::Primary),
            _ => Some(BufferSlot::Secondary),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.ready.store(false, Ordering::Release);
    }
}

/// The two fixed DMA sample blocks.
pub struct DoubleBuffer {
    primary: Vec<i16>,
    secondary: Vec<i16>,
}

impl DoubleBuffer {
    pub fn new(block_len: usize) -> Self {
        Self {
            primary: vec![0; block_len],
            secondary: vec![0; block_len],
        }
    }

    pub fn block_len(&self) -> usize {
        self.primary.len()
    }

    pub fn get(&self, slot: BufferSlot) -> &[i16] {
        match slot {
            BufferSlot::Primary => &self.primary,
            BufferSlot::Secondary => &self.secondary,
        }
    }

    pub fn get_mut(&mut self, slot: BufferSlot) -> &mut [i16] {
        match slot {
            BufferSlot::Primary => &mut self.primary,
            BufferSlot::Secondary => &mut self.secondary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_is_empty_until_signalled() {
        let handoff = BufferHandoff::new();
        assert_eq!(handoff.take(), None);

        handoff.signal(BufferSlot::Secondary);
        assert!(handoff.is_ready());
        assert_eq!(handoff.take(), Some(BufferSlot::Secondary));
        assert_eq!(handoff.take(), None);
    }

    #[test]
    fn latest_signal_wins_and_reset_clears() {
        let handoff = BufferHandoff::new();
        handoff.signal(BufferSlot::Secondary);
        handoff.signal(BufferSlot::Primary);
        assert_eq!(handoff.take(), Some(BufferSlot::Primary));

        handoff.signal(BufferSlot::Primary);
        handoff.reset();
        assert!(!handoff.is_ready());
        assert_eq!(handoff.take(), None);
    }

    #[test]
    fn signal_from_another_thread_is_observed() {
        let handoff = std::sync::Arc::new(BufferHandoff::new());
        let producer = std::sync::Arc::clone(&handoff);
        std::thread::spawn(move || producer.signal(BufferSlot::Secondary))
            .join()
            .unwrap();
        assert_eq!(handoff.take(), Some(BufferSlot::Secondary));
    }

    #[test]
    fn double_buffer_slots_are_independent() {
        let mut buffers = DoubleBuffer::new(4);
        buffers.get_mut(BufferSlot::Primary).fill(7);
        assert_eq!(buffers.get(BufferSlot::Primary), &[7, 7, 7, 7]);
        assert_eq!(buffers.get(BufferSlot::Secondary), &[0, 0, 0, 0]);
        assert_eq!(BufferSlot::Primary.other(), BufferSlot::Secondary);
    }
}

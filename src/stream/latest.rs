use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicBool, Ordering},
};

use crate::types::Frame;

/// Single-slot "current frame" cell shared by one stream worker and the render loop.
///
/// Each stream session owns a generation; publishing with an older generation is
/// rejected so a worker that was cancelled cannot bleed frames into the next
/// camera's view.
#[derive(Clone, Debug, Default)]
pub struct LatestFrame {
    slot: Arc<Mutex<Slot>>,
    paused: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    version: u64,
    frame: Option<Arc<Frame>>,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Starts a new stream session: drops the current frame and invalidates older writers.
    pub fn begin_generation(&self) -> u64 {
        let (generation, old) = {
            let mut slot = self.lock();
            slot.generation += 1;
            slot.version += 1;
            (slot.generation, slot.frame.take())
        };
        drop(old);
        generation
    }

    /// Swaps in a freshly decoded frame, releasing the previous one.
    pub fn publish(&self, generation: u64, frame: Frame) -> bool {
        let previous = {
            let mut slot = self.lock();
            if slot.generation != generation {
                return false;
            }
            slot.version += 1;
            slot.frame.replace(Arc::new(frame))
        };
        // Release outside the lock.
        drop(previous);
        true
    }

    pub fn current(&self) -> Option<Arc<Frame>> {
        self.lock().frame.clone()
    }

    /// Bumped on every swap; lets readers skip work when nothing changed.
    pub fn version(&self) -> u64 {
        self.lock().version
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

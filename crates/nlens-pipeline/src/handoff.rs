//! Single-item handoff between adjacent stages.

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::{PipelineError, PipelineResult};

/// A capacity-one slot between a producing and a consuming stage.
///
/// The producer publishes only into a vacant slot and the consumer takes
/// the item out, which leaves the slot vacant again. Taking the item
/// transfers ownership, so a frame or detection set is never shared
/// between two stages.
#[derive(Debug)]
pub struct HandoffSlot<T> {
    name: &'static str,
    tx: mpsc::Sender<T>,
    rx: mpsc::Receiver<T>,
}

impl<T> HandoffSlot<T> {
    pub fn new(name: &'static str) -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self { name, tx, rx }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether an item is waiting for the consumer.
    pub fn is_occupied(&self) -> bool {
        self.tx.capacity() == 0
    }

    pub fn is_vacant(&self) -> bool {
        !self.is_occupied()
    }

    /// Place an item into the slot.
    ///
    /// Fails without touching the slot if it is already occupied.
    pub fn publish(&self, item: T) -> PipelineResult<()> {
        match self.tx.try_send(item) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                Err(PipelineError::SlotOccupied(self.name))
            }
        }
    }

    /// Take the item out of the slot, if any.
    pub fn take(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

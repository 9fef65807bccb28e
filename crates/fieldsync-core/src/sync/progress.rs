//! Observable sync progress for UI layers.

use tokio::sync::watch;

/// Snapshot published to observers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncProgress {
    pub is_syncing: bool,
    pub current: usize,
    pub total: usize,
}

/// Process-wide progress state; cloning shares the same channel.
#[derive(Debug, Clone)]
pub struct SyncProgressBroadcaster {
    sender: watch::Sender<SyncProgress>,
}

impl Default for SyncProgressBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncProgressBroadcaster {
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(SyncProgress::default());
        Self { sender }
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncProgress> {
        self.sender.subscribe()
    }

    pub fn snapshot(&self) -> SyncProgress {
        *self.sender.borrow()
    }

    /// Enter the syncing state with a fresh counter
    pub fn start_sync(&self, total: usize) {
        self.sender.send_replace(SyncProgress {
            is_syncing: true,
            current: 0,
            total,
        });
    }

    /// Publish progress; ignored unless a sync is running
    pub fn update_progress(&self, current: usize) {
        self.sender.send_if_modified(|progress| {
            if !progress.is_syncing || progress.current == current {
                return false;
            }
            progress.current = current;
            true
        });
    }

    /// Reset every field and publish the cleared state
    pub fn end_sync(&self) {
        self.sender.send_replace(SyncProgress::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn updates_while_idle_are_ignored() {
        let broadcaster = SyncProgressBroadcaster::new();
        let mut receiver = broadcaster.subscribe();

        broadcaster.update_progress(5);

        assert_eq!(broadcaster.snapshot(), SyncProgress::default());
        assert!(!receiver.has_changed().unwrap());
    }

    #[test]
    fn start_update_end_cycle() {
        let broadcaster = SyncProgressBroadcaster::new();
        let mut receiver = broadcaster.subscribe();

        broadcaster.start_sync(4);
        assert!(receiver.has_changed().unwrap());
        assert_eq!(
            *receiver.borrow_and_update(),
            SyncProgress {
                is_syncing: true,
                current: 0,
                total: 4,
            }
        );

        broadcaster.update_progress(2);
        assert_eq!(receiver.borrow_and_update().current, 2);

        broadcaster.end_sync();
        assert!(receiver.has_changed().unwrap());
        assert_eq!(*receiver.borrow_and_update(), SyncProgress::default());

        broadcaster.update_progress(3);
        assert!(!receiver.has_changed().unwrap());
    }

    #[test]
    fn clones_share_state() {
        let broadcaster = SyncProgressBroadcaster::new();
        let observer = broadcaster.clone();
        broadcaster.start_sync(1);
        assert!(observer.snapshot().is_syncing);
    }
}

//! Watchable cell: an atomically-swapped single value with fan-out to
//! subscribers on every write. Used for per-user projections (presence,
//! custom status, voice self-mute/deafen) where both "what is the value
//! right now" and "tell me about every future change" matter.
//!
//! Not on the message hot path — the topic bus in [`super::bus`] handles that.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::broadcast;

use super::bus::DEFAULT_CHANNEL_CAPACITY;
use super::error::TopicError;

/// An atomically-replaceable `T` that broadcasts every new value to its
/// subscribers.
pub struct WatchableCell<T> {
    value: ArcSwap<T>,
    tx: broadcast::Sender<Arc<T>>,
}

impl<T: Send + Sync + 'static> WatchableCell<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self {
            value: ArcSwap::from_pointee(initial),
            tx,
        }
    }

    pub fn get(&self) -> Arc<T> {
        self.value.load_full()
    }

    /// Replace the value unconditionally and notify subscribers.
    pub fn set(&self, value: T) {
        let value = Arc::new(value);
        self.value.store(value.clone());
        let _ = self.tx.send(value);
    }

    /// Read-modify-write with CAS retry: `f` may be invoked more than once if
    /// another writer races it.
    pub fn modify(&self, mut f: impl FnMut(&T) -> T) {
        loop {
            let current = self.value.load_full();
            let next = Arc::new(f(&current));
            let prev = self.value.compare_and_swap(&current, next.clone());
            if Arc::ptr_eq(&*prev, &current) {
                let _ = self.tx.send(next);
                return;
            }
        }
    }

    /// Conditional commit: `f` returns `None` to abort without writing or
    /// notifying, `Some(next)` to attempt the swap. Retries on a losing race.
    /// Returns whether a write happened.
    pub fn modify_if(&self, mut f: impl FnMut(&T) -> Option<T>) -> bool {
        loop {
            let current = self.value.load_full();
            let Some(next) = f(&current) else {
                return false;
            };
            let next = Arc::new(next);
            let prev = self.value.compare_and_swap(&current, next.clone());
            if Arc::ptr_eq(&*prev, &current) {
                let _ = self.tx.send(next);
                return true;
            }
        }
    }

    /// Subscribe to future writes. Does not replay the current value — call
    /// [`WatchableCell::get`] first if the caller needs it.
    pub fn subscribe(&self) -> CellSubscription<T> {
        CellSubscription {
            rx: self.tx.subscribe(),
        }
    }
}

pub struct CellSubscription<T> {
    rx: broadcast::Receiver<Arc<T>>,
}

impl<T: Clone> CellSubscription<T> {
    pub async fn recv(&mut self) -> Result<Arc<T>, TopicError> {
        self.rx.recv().await.map_err(TopicError::from)
    }
}

/// Merge several cells' broadcast streams into one, tagging each emitted
/// value with the index of the cell it came from. Mirrors the bus's
/// bulk-subscribe shape for the rarer case of watching several watchable
/// cells at once (e.g. every member of a voice channel's mute state).
pub async fn merge_broadcasts<T>(
    cells: &[&WatchableCell<T>],
) -> tokio::sync::mpsc::Receiver<(usize, Arc<T>)>
where
    T: Send + Sync + 'static,
{
    let (tx, rx) = tokio::sync::mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
    for (idx, cell) in cells.iter().enumerate() {
        let mut sub = cell.subscribe();
        let tx = tx.clone();
        tokio::spawn(async move {
            loop {
                match sub.recv().await {
                    Ok(value) => {
                        if tx.send((idx, value)).await.is_err() {
                            break;
                        }
                    }
                    Err(TopicError::Lagged(_)) => continue,
                    Err(TopicError::ChannelClosed) => break,
                }
            }
        });
    }
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_returns_latest_value() {
        let cell = WatchableCell::new(1);
        assert_eq!(*cell.get(), 1);
        cell.set(2);
        assert_eq!(*cell.get(), 2);
    }

    #[tokio::test]
    async fn subscribers_see_every_write() {
        let cell = WatchableCell::new(0);
        let mut sub = cell.subscribe();
        cell.set(1);
        cell.set(2);
        assert_eq!(*sub.recv().await.unwrap(), 1);
        assert_eq!(*sub.recv().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn modify_is_linearizable_under_concurrent_writers() {
        let cell = Arc::new(WatchableCell::new(0i64));
        let mut handles = Vec::new();
        for _ in 0..50 {
            let cell = cell.clone();
            handles.push(tokio::spawn(async move {
                cell.modify(|v| v + 1);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(*cell.get(), 50);
    }

    #[tokio::test]
    async fn modify_if_can_abort_without_writing() {
        let cell = WatchableCell::new(10);
        let mut sub = cell.subscribe();
        let wrote = cell.modify_if(|v| if *v > 100 { Some(*v + 1) } else { None });
        assert!(!wrote);
        cell.set(11);
        assert_eq!(*sub.recv().await.unwrap(), 11);
    }
}

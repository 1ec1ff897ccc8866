//! `WatchService` — polling-based directory change notification.
//!
//! A single background thread periodically re-snapshots every
//! registered directory and diffs it against the previous snapshot.
//! Keys with new events are pushed onto a ready queue; `close()` wakes
//! any blocked `take()` caller with a poison value rather than leaving
//! it parked forever.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_queue::SegQueue;

use crate::error::{Error, Result};
use crate::file::File;
use crate::file_store::FileStore;
use crate::name::Name;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Create,
    Delete,
    Modify,
}

#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub kind: EventKind,
    pub name: Name,
}

struct Snapshot {
    /// `name -> (file_id, last_modified_time)` at the previous poll.
    entries: HashMap<Name, (u64, i64)>,
}

pub struct WatchKey {
    dir: Arc<File>,
    valid: AtomicBool,
    queued: AtomicBool,
    last_snapshot: Mutex<Snapshot>,
    pending: Mutex<Vec<WatchEvent>>,
}

impl WatchKey {
    fn new(dir: Arc<File>, initial: HashMap<Name, (u64, i64)>) -> Arc<Self> {
        Arc::new(WatchKey {
            dir,
            valid: AtomicBool::new(true),
            queued: AtomicBool::new(false),
            last_snapshot: Mutex::new(Snapshot { entries: initial }),
            pending: Mutex::new(Vec::new()),
        })
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }

    /// Take and clear the events accumulated since the last call.
    pub fn poll_events(&self) -> Vec<WatchEvent> {
        std::mem::take(&mut self.pending.lock().unwrap())
    }

    /// Allow this key to be re-queued once more events arrive, as
    /// `java.nio.file.WatchKey::reset` does.
    pub fn reset(&self) {
        self.queued.store(false, Ordering::SeqCst);
    }
}

pub struct WatchService {
    keys: Mutex<Vec<Arc<WatchKey>>>,
    ready: SegQueue<Option<Arc<WatchKey>>>,
    closed: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

fn snapshot_of(dir: &Arc<File>) -> HashMap<Name, (u64, i64)> {
    match dir.as_directory() {
        Some(table) => table.read().unwrap().snapshot().into_iter().map(|(name, id)| (name, (id, 0i64))).collect(),
        None => HashMap::new(),
    }
}

impl WatchService {
    /// Start a watch service polling every `poll_interval`. The worker
    /// thread holds only a `Weak`-free `Arc` clone and exits once
    /// `close()` marks the service closed and it notices on its next tick.
    pub fn start(store: Arc<FileStore>, poll_interval: Duration) -> Arc<Self> {
        let service = Arc::new(WatchService {
            keys: Mutex::new(Vec::new()),
            ready: SegQueue::new(),
            closed: AtomicBool::new(false),
            worker: Mutex::new(None),
        });

        let worker_service = Arc::clone(&service);
        let handle = std::thread::spawn(move || Self::run(worker_service, store, poll_interval));
        *service.worker.lock().unwrap() = Some(handle);
        service
    }

    fn run(service: Arc<WatchService>, store: Arc<FileStore>, poll_interval: Duration) {
        loop {
            if service.closed.load(Ordering::SeqCst) {
                return;
            }
            service.poll_once(&store);
            std::thread::sleep(poll_interval);
        }
    }

    fn poll_once(&self, store: &Arc<FileStore>) {
        let keys = self.keys.lock().unwrap().clone();
        for key in keys {
            if !key.is_valid() {
                continue;
            }
            if store.get(key.dir.id()).is_none() {
                key.cancel();
                continue;
            }
            self.diff_and_queue(&key, store);
        }
    }

    fn diff_and_queue(&self, key: &Arc<WatchKey>, store: &Arc<FileStore>) {
        let current = match key.dir.as_directory() {
            Some(table) => table
                .read()
                .unwrap()
                .snapshot()
                .into_iter()
                .map(|(name, id)| {
                    let mtime = store.get(id).map(|f| f.last_modified_time()).unwrap_or(0);
                    (name, (id, mtime))
                })
                .collect::<HashMap<_, _>>(),
            None => return,
        };

        let mut previous = key.last_snapshot.lock().unwrap();
        let mut events = Vec::new();
        for (name, (id, mtime)) in &current {
            match previous.entries.get(name) {
                None => events.push(WatchEvent { kind: EventKind::Create, name: name.clone() }),
                Some((prev_id, prev_mtime)) if prev_id == id && prev_mtime != mtime => {
                    events.push(WatchEvent { kind: EventKind::Modify, name: name.clone() })
                }
                _ => {}
            }
        }
        for name in previous.entries.keys() {
            if !current.contains_key(name) {
                events.push(WatchEvent { kind: EventKind::Delete, name: name.clone() });
            }
        }
        previous.entries = current;
        drop(previous);

        if events.is_empty() {
            return;
        }
        tracing::debug!(dir_id = key.dir.id(), count = events.len(), "queued directory change events");
        key.pending.lock().unwrap().extend(events);
        if !key.queued.swap(true, Ordering::SeqCst) {
            self.ready.push(Some(Arc::clone(key)));
        }
    }

    pub fn register(&self, dir: &Arc<File>) -> Result<Arc<WatchKey>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ClosedWatchService);
        }
        if !dir.is_directory() {
            return Err(Error::NotDirectory);
        }
        let key = WatchKey::new(Arc::clone(dir), snapshot_of(dir));
        self.keys.lock().unwrap().push(Arc::clone(&key));
        Ok(key)
    }

    /// Non-blocking: returns immediately with `None` if nothing is ready.
    pub fn poll(&self) -> Option<Arc<WatchKey>> {
        match self.ready.pop() {
            Some(Some(key)) => Some(key),
            _ => None,
        }
    }

    /// Blocks until a key is ready or the service is closed.
    pub fn take(&self) -> Result<Arc<WatchKey>> {
        loop {
            match self.ready.pop() {
                Some(Some(key)) => return Ok(key),
                Some(None) => {
                    // Poison seen: let any other blocked waiter see one too.
                    self.ready.push(None);
                    return Err(Error::ClosedWatchService);
                }
                None => {
                    if self.closed.load(Ordering::SeqCst) {
                        return Err(Error::ClosedWatchService);
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
            }
        }
    }

    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.ready.push(None);
        for key in self.keys.lock().unwrap().iter() {
            key.cancel();
        }
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for WatchService {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CaseSensitivity, Configuration};

    #[test]
    fn register_rejects_non_directory() {
        let store = Arc::new(FileStore::new(&Configuration::unix()));
        let file = store.create_regular_file();
        let service = WatchService::start(Arc::clone(&store), Duration::from_millis(10));
        assert!(service.register(&file).is_err());
        service.close();
    }

    #[test]
    fn new_child_produces_a_create_event() {
        let store = Arc::new(FileStore::new(&Configuration::unix()));
        let root = store.create_root();
        let service = WatchService::start(Arc::clone(&store), Duration::from_millis(5));
        let key = service.register(&root).unwrap();

        let child = store.create_directory(&root);
        let name = Name::new("child", CaseSensitivity::CaseSensitive.into());
        root.as_directory().unwrap().write().unwrap().link(name.clone(), child.id(), &child).unwrap();

        let ready = service.take().unwrap();
        assert!(Arc::ptr_eq(&ready, &key));
        let events = ready.poll_events();
        assert!(events.iter().any(|e| e.kind == EventKind::Create && e.name == name));
        service.close();
    }

    #[test]
    fn close_wakes_a_blocked_take() {
        let store = Arc::new(FileStore::new(&Configuration::unix()));
        let service = WatchService::start(store, Duration::from_millis(10));
        let service_clone = Arc::clone(&service);
        let handle = std::thread::spawn(move || service_clone.take());
        std::thread::sleep(Duration::from_millis(20));
        service.close();
        assert!(matches!(handle.join().unwrap(), Err(Error::ClosedWatchService)));
    }
}

//! Non-blocking metadata lookups.
//!
//! Each lookup runs on its own worker thread; results are collected by
//! polling from the UI loop so nothing here ever blocks a frame.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use thiserror::Error;

mod http;

pub use http::{parse_count, HttpCountFetcher};

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered {0}")]
    Status(u16),

    #[error("unexpected response body: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("blocked: unsupported scheme `{0}`")]
    BlockedScheme(String),

    #[error("invalid endpoint {0}")]
    InvalidUrl(String),

    #[error("lookup worker exited without a result")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, LookupError>;

/// Source of per-video counts. Called from worker threads.
pub trait CountFetcher: Send + Sync + 'static {
    fn fetch_count(&self, id: &str) -> Result<u64>;
}

/// State of one lookup within the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Ready(u64),
    Pending,
    Failed(String),
}

struct PendingLookup {
    id: String,
    receiver: Receiver<Result<u64>>,
    join: Option<JoinHandle<()>>,
}

/// Per-session cache of dislike counts keyed by video id.
pub struct DislikeLookup<F: CountFetcher> {
    fetcher: Arc<F>,
    cache: HashMap<String, Lookup>,
    pending: Vec<PendingLookup>,
}

impl<F: CountFetcher> DislikeLookup<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            cache: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// Current state for `id`, starting a request the first time it is seen.
    pub fn fetch(&mut self, id: &str) -> Lookup {
        if let Some(known) = self.cache.get(id) {
            return known.clone();
        }

        let (tx, rx) = mpsc::channel();
        let fetcher = self.fetcher.clone();
        let worker_id = id.to_string();
        let join = thread::spawn(move || {
            let _ = tx.send(fetcher.fetch_count(&worker_id));
        });

        log::debug!("dislike lookup started for {}", id);
        self.cache.insert(id.to_string(), Lookup::Pending);
        self.pending.push(PendingLookup {
            id: id.to_string(),
            receiver: rx,
            join: Some(join),
        });
        Lookup::Pending
    }

    /// Cached state for `id` without starting a request.
    pub fn get(&self, id: &str) -> Option<&Lookup> {
        self.cache.get(id)
    }

    /// Collect finished lookups into the cache and return them.
    pub fn poll(&mut self) -> Vec<(String, Lookup)> {
        let mut ready = Vec::new();
        let mut still = Vec::new();
        for mut pending in self.pending.drain(..) {
            let result = match pending.receiver.try_recv() {
                Ok(result) => result,
                Err(TryRecvError::Empty) => {
                    still.push(pending);
                    continue;
                }
                Err(TryRecvError::Disconnected) => Err(LookupError::Disconnected),
            };
            if let Some(join) = pending.join.take() {
                let _ = join.join();
            }
            let lookup = match result {
                Ok(count) => Lookup::Ready(count),
                Err(e) => {
                    log::warn!("dislike lookup for {} failed: {}", pending.id, e);
                    Lookup::Failed(e.to_string())
                }
            };
            self.cache.insert(pending.id.clone(), lookup.clone());
            ready.push((pending.id, lookup));
        }
        self.pending = still;
        ready
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Forget everything; in-flight results are discarded.
    pub fn reset_session(&mut self) {
        self.cache.clear();
        self.pending.clear();
    }
}

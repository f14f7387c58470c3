use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::GreenMatesApi;
use crate::error::ApiError;
use crate::models::{CollectionEvent, WorkshopEvent};

/// Where one list of events stands.
///
/// A failure drops whatever was loaded before; the message is all that is
/// kept.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchState<T> {
    Idle,
    Loading,
    Loaded(Vec<T>),
    Failed(String),
}

impl<T> FetchState<T> {
    pub fn items(&self) -> Option<&[T]> {
        match self {
            FetchState::Loaded(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, FetchState::Loading)
    }

    fn settle(result: Result<Vec<T>, ApiError>) -> Self {
        match result {
            Ok(items) => FetchState::Loaded(items),
            Err(e) => FetchState::Failed(e.to_string()),
        }
    }
}

/// A finished fetch on its way back to the task that owns the feed.
///
/// `generation` is the number the fetch was issued under for its list.
#[derive(Debug)]
pub enum FeedUpdate {
    Collections {
        generation: u64,
        result: Result<Vec<CollectionEvent>, ApiError>,
    },
    Workshops {
        generation: u64,
        result: Result<Vec<WorkshopEvent>, ApiError>,
    },
}

/// Fetches issued and still unanswered for one list.
#[derive(Debug, Default)]
struct Tracker {
    issued: u64,
    pending: usize,
}

impl Tracker {
    fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.pending += 1;
        self.issued
    }

    /// Records an answer; true when it belongs to the latest fetch.
    fn answer(&mut self, generation: u64) -> bool {
        self.pending = self.pending.saturating_sub(1);
        generation == self.issued
    }
}

/// The collection events and workshops of one user.
///
/// Fetches run on spawned tasks; their results come back over a channel and
/// are applied by whoever owns the feed, so state only ever changes on that
/// task. Dropping the feed drops the receiver and any late response is
/// thrown away. Triggers are not deduplicated: every refresh is a new call.
/// When fetches of one list overlap, only the answer to the newest one is
/// shown and the list stays `Loading` until it arrives.
pub struct EventFeed<A> {
    api: Arc<A>,
    federated_id: String,
    collections: FetchState<CollectionEvent>,
    workshops: FetchState<WorkshopEvent>,
    collections_fetches: Tracker,
    workshops_fetches: Tracker,
    tx: UnboundedSender<FeedUpdate>,
    rx: UnboundedReceiver<FeedUpdate>,
}

impl<A: GreenMatesApi> EventFeed<A> {
    pub fn new(api: Arc<A>, federated_id: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            api,
            federated_id: federated_id.into(),
            collections: FetchState::Idle,
            workshops: FetchState::Idle,
            collections_fetches: Tracker::default(),
            workshops_fetches: Tracker::default(),
            tx,
            rx,
        }
    }

    pub fn collections(&self) -> &FetchState<CollectionEvent> {
        &self.collections
    }

    pub fn workshops(&self) -> &FetchState<WorkshopEvent> {
        &self.workshops
    }

    pub fn in_flight(&self) -> usize {
        self.collections_fetches.pending + self.workshops_fetches.pending
    }

    pub fn refresh(&mut self) {
        self.refresh_collections();
        self.refresh_workshops();
    }

    /// Starts a fetch of the collections. The handle resolves to whether the
    /// response reached the feed.
    pub fn refresh_collections(&mut self) -> JoinHandle<bool> {
        self.collections = FetchState::Loading;
        let generation = self.collections_fetches.issue();
        let api = Arc::clone(&self.api);
        let federated_id = self.federated_id.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = api.list_collections(&federated_id).await;
            let delivered = tx.send(FeedUpdate::Collections { generation, result }).is_ok();
            if !delivered {
                debug!("Feed for {} is gone, dropping collections response", federated_id);
            }
            delivered
        })
    }

    /// Starts a fetch of the workshops. The handle resolves to whether the
    /// response reached the feed.
    pub fn refresh_workshops(&mut self) -> JoinHandle<bool> {
        self.workshops = FetchState::Loading;
        let generation = self.workshops_fetches.issue();
        let api = Arc::clone(&self.api);
        let federated_id = self.federated_id.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = api.list_workshops(&federated_id).await;
            let delivered = tx.send(FeedUpdate::Workshops { generation, result }).is_ok();
            if !delivered {
                debug!("Feed for {} is gone, dropping workshops response", federated_id);
            }
            delivered
        })
    }

    pub fn apply(&mut self, update: FeedUpdate) {
        match update {
            FeedUpdate::Collections { generation, result } => {
                if !self.collections_fetches.answer(generation) {
                    debug!("Superseded collections response #{} discarded", generation);
                    return;
                }
                if let Err(ref e) = result {
                    warn!("Failed to load collections: {}", e);
                }
                self.collections = FetchState::settle(result);
            }
            FeedUpdate::Workshops { generation, result } => {
                if !self.workshops_fetches.answer(generation) {
                    debug!("Superseded workshops response #{} discarded", generation);
                    return;
                }
                if let Err(ref e) = result {
                    warn!("Failed to load workshops: {}", e);
                }
                self.workshops = FetchState::settle(result);
            }
        }
    }

    /// Wait for the next response and apply it. Returns `false` when nothing
    /// is in flight.
    pub async fn next_update(&mut self) -> bool {
        if self.in_flight() == 0 {
            return false;
        }
        match self.rx.recv().await {
            Some(update) => {
                self.apply(update);
                true
            }
            None => false,
        }
    }

    /// Apply responses until every fetch issued so far has answered.
    pub async fn settle(&mut self) {
        while self.next_update().await {}
    }
}

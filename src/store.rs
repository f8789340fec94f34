//! Fetch orchestration: per-view loading/error lifecycle over an [`ApiClient`].
//!
//! The store owns four views (listing, selected dataset, raw data, processed
//! data). Every operation starts synchronously when invoked (loading flag set,
//! competing view cleared) and returns a future with exactly one suspension
//! point, the network call. Futures always resolve to `()`: failures are only
//! visible through the `error` field of the affected view.
//!
//! Raw and processed data are mutually exclusive. Starting either fetch clears
//! the other view before the request is issued, and writing either result
//! clears the other again, so the two are never populated at the same time.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::client::ApiClient;
use crate::domain::{Dataset, DatasetCode, ProcessedDataResponse, RawDataResponse};
use crate::error::StatlensError;

/// Which response wins when two requests for the same view overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RacePolicy {
    /// Whichever response arrives last overwrites the view, even if it was
    /// issued first.
    #[default]
    LastResolvedWins,
    /// Each view tracks a request token; responses to anything but the most
    /// recently issued request are dropped.
    LastIssuedWins,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Listing,
    Current,
    Raw,
    Processed,
}

impl View {
    fn index(self) -> usize {
        match self {
            View::Listing => 0,
            View::Current => 1,
            View::Raw => 2,
            View::Processed => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Loaded,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchState<T> {
    pub loading: bool,
    pub error: Option<String>,
    pub data: Option<T>,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            loading: false,
            error: None,
            data: None,
        }
    }
}

impl<T> FetchState<T> {
    pub fn phase(&self) -> Phase {
        if self.loading {
            Phase::Loading
        } else if self.error.is_some() {
            Phase::Failed
        } else if self.data.is_some() {
            Phase::Loaded
        } else {
            Phase::Idle
        }
    }

    pub fn is_settled(&self) -> bool {
        !self.loading
    }

    fn begin(&mut self) {
        self.loading = true;
        self.error = None;
    }

    fn reset(&mut self) {
        self.data = None;
        self.error = None;
    }
}

/// Snapshot of everything the store exposes to its readers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState {
    pub listing: FetchState<Vec<Dataset>>,
    pub current: FetchState<Dataset>,
    pub raw: FetchState<RawDataResponse>,
    pub processed: FetchState<ProcessedDataResponse>,
}

impl StoreState {
    pub fn datasets(&self) -> &[Dataset] {
        self.listing.data.as_deref().unwrap_or(&[])
    }

    pub fn dataset_count(&self) -> usize {
        self.datasets().len()
    }

    pub fn has_data(&self) -> bool {
        self.raw.data.is_some() || self.processed.data.is_some()
    }

    pub fn phase(&self, view: View) -> Phase {
        match view {
            View::Listing => self.listing.phase(),
            View::Current => self.current.phase(),
            View::Raw => self.raw.phase(),
            View::Processed => self.processed.phase(),
        }
    }

    pub fn error(&self, view: View) -> Option<&str> {
        match view {
            View::Listing => self.listing.error.as_deref(),
            View::Current => self.current.error.as_deref(),
            View::Raw => self.raw.error.as_deref(),
            View::Processed => self.processed.error.as_deref(),
        }
    }

    fn set_loading(&mut self, view: View, loading: bool) {
        match view {
            View::Listing => self.listing.loading = loading,
            View::Current => self.current.loading = loading,
            View::Raw => self.raw.loading = loading,
            View::Processed => self.processed.loading = loading,
        }
    }
}

#[derive(Debug, Default)]
struct Tickets([AtomicU64; 4]);

impl Tickets {
    fn issue(&self, view: View) -> u64 {
        self.0[view.index()].fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_latest(&self, view: View, ticket: u64) -> bool {
        self.0[view.index()].load(Ordering::SeqCst) == ticket
    }
}

pub struct DatasetStore<C: ApiClient> {
    client: C,
    state: watch::Sender<StoreState>,
    tickets: Tickets,
    policy: RacePolicy,
}

impl<C: ApiClient> DatasetStore<C> {
    pub fn new(client: C) -> Self {
        Self::with_race_policy(client, RacePolicy::default())
    }

    pub fn with_race_policy(client: C, policy: RacePolicy) -> Self {
        let (state, _) = watch::channel(StoreState::default());
        Self {
            client,
            state,
            tickets: Tickets::default(),
            policy,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn race_policy(&self) -> RacePolicy {
        self.policy
    }

    /// Receiver notified after every state change.
    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> StoreState {
        self.state.borrow().clone()
    }

    pub fn dataset_count(&self) -> usize {
        self.state.borrow().dataset_count()
    }

    pub fn has_data(&self) -> bool {
        self.state.borrow().has_data()
    }

    pub fn fetch_dataset_list(&self) -> impl Future<Output = ()> + Send + '_ {
        let ticket = self.begin(View::Listing);
        async move {
            info!("fetching dataset list");
            let result = self.client.list_datasets().await;
            self.settle_listing(ticket, result);
        }
    }

    /// The query is forwarded untouched; blank queries are the API's concern.
    pub fn search_datasets(
        &self,
        query: &str,
        limit: u32,
    ) -> impl Future<Output = ()> + Send + use<'_, C> {
        let ticket = self.begin(View::Listing);
        let query = query.to_string();
        async move {
            info!(%query, limit, "searching datasets");
            let result = self.client.search_datasets(&query, limit).await;
            self.settle_listing(ticket, result);
        }
    }

    pub fn select_dataset(&self, code: &str) -> impl Future<Output = ()> + Send + use<'_, C> {
        let ticket = self.begin(View::Current);
        let code = code.to_string();
        async move {
            info!(%code, "loading dataset descriptor");
            let result = match code.parse::<DatasetCode>() {
                Ok(code) => self.client.dataset_info(&code).await,
                Err(err) => Err(err),
            };
            self.settle(View::Current, ticket, move |state| match result {
                Ok(dataset) => state.current.data = Some(dataset),
                Err(err) => {
                    warn!(%code, error = %err, "dataset descriptor failed");
                    state.current.error = Some(err.to_string());
                    state.current.data = None;
                }
            });
        }
    }

    pub fn fetch_raw_data(&self, code: &str) -> impl Future<Output = ()> + Send + use<'_, C> {
        let ticket = self.begin(View::Raw);
        let code = code.to_string();
        async move {
            info!(%code, "fetching raw data");
            let result = match code.parse::<DatasetCode>() {
                Ok(code) => self.client.raw_data(&code).await,
                Err(err) => Err(err),
            };
            self.settle(View::Raw, ticket, move |state| match result {
                Ok(data) => {
                    debug!(%code, records = data.record_count, "raw data received");
                    state.processed.data = None;
                    state.raw.data = Some(data);
                }
                Err(err) => {
                    warn!(%code, error = %err, "raw data fetch failed");
                    state.raw.error = Some(err.to_string());
                    state.raw.data = None;
                }
            });
        }
    }

    pub fn fetch_processed_data(
        &self,
        code: &str,
    ) -> impl Future<Output = ()> + Send + use<'_, C> {
        let ticket = self.begin(View::Processed);
        let code = code.to_string();
        async move {
            info!(%code, "fetching processed data");
            let result = match code.parse::<DatasetCode>() {
                Ok(code) => self.client.processed_data(&code).await,
                Err(err) => Err(err),
            };
            self.settle(View::Processed, ticket, move |state| match result {
                Ok(data) => {
                    debug!(%code, records = data.record_count, "processed data received");
                    state.raw.data = None;
                    state.processed.data = Some(data);
                }
                Err(err) => {
                    warn!(%code, error = %err, "processed data fetch failed");
                    state.processed.error = Some(err.to_string());
                    state.processed.data = None;
                }
            });
        }
    }

    /// Drops raw, processed and selected-dataset data along with every view's
    /// error. The dataset listing itself is kept.
    ///
    /// With [`RacePolicy::LastResolvedWins`] requests still in flight will
    /// write their result when they land. With [`RacePolicy::LastIssuedWins`]
    /// they are invalidated and their views stop loading.
    pub fn clear_data(&self) {
        self.state.send_modify(|state| {
            state.current.reset();
            state.raw.reset();
            state.processed.reset();
            state.listing.error = None;
            if self.policy == RacePolicy::LastIssuedWins {
                for view in [View::Current, View::Raw, View::Processed] {
                    self.tickets.issue(view);
                    state.set_loading(view, false);
                }
            }
        });
        debug!("cleared dataset views");
    }

    fn begin(&self, view: View) -> u64 {
        let mut ticket = 0;
        self.state.send_modify(|state| {
            ticket = self.tickets.issue(view);
            match view {
                View::Listing => state.listing.begin(),
                View::Current => state.current.begin(),
                View::Raw => {
                    state.processed.reset();
                    state.raw.begin();
                }
                View::Processed => {
                    state.raw.reset();
                    state.processed.begin();
                }
            }
            if self.policy == RacePolicy::LastIssuedWins {
                let competing = match view {
                    View::Raw => Some(View::Processed),
                    View::Processed => Some(View::Raw),
                    _ => None,
                };
                if let Some(competing) = competing {
                    self.tickets.issue(competing);
                    state.set_loading(competing, false);
                }
            }
        });
        ticket
    }

    fn settle_listing(&self, ticket: u64, result: Result<Vec<Dataset>, StatlensError>) {
        self.settle(View::Listing, ticket, |state| match result {
            Ok(datasets) => {
                debug!(count = datasets.len(), "dataset listing received");
                state.listing.data = Some(datasets);
            }
            Err(err) => {
                // A stale listing is still useful for navigation, keep it.
                warn!(error = %err, "dataset listing failed");
                state.listing.error = Some(err.to_string());
            }
        });
    }

    fn settle<F>(&self, view: View, ticket: u64, apply: F)
    where
        F: FnOnce(&mut StoreState),
    {
        self.state.send_if_modified(|state| {
            if self.policy == RacePolicy::LastIssuedWins && !self.tickets.is_latest(view, ticket) {
                debug!(?view, ticket, "discarding response to superseded request");
                return false;
            }
            state.set_loading(view, false);
            apply(state);
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_follows_fields() {
        let mut state = FetchState::<u8>::default();
        assert_eq!(state.phase(), Phase::Idle);
        state.begin();
        assert_eq!(state.phase(), Phase::Loading);
        state.loading = false;
        state.data = Some(1);
        assert_eq!(state.phase(), Phase::Loaded);
        state.error = Some("boom".to_string());
        assert_eq!(state.phase(), Phase::Failed);
    }

    #[test]
    fn tickets_track_latest_per_view() {
        let tickets = Tickets::default();
        let first = tickets.issue(View::Raw);
        let second = tickets.issue(View::Raw);
        assert!(!tickets.is_latest(View::Raw, first));
        assert!(tickets.is_latest(View::Raw, second));
        assert!(tickets.is_latest(View::Processed, 0));
    }
}

use std::sync::Arc;
use std::time::Duration;

use async_io::Timer;
use futures_lite::{future, StreamExt};

use pharmap_geo::{Candidate, Geocoder, ProviderError};

use crate::coordinator::SelectedLocation;

/// Queries shorter than this (after trimming) never reach the provider.
/// A hard gate, not an optimization.
pub const MIN_QUERY_LEN: usize = 3;

/// Delay after the last edit before a search request fires.
pub const DEBOUNCE: Duration = Duration::from_millis(300);

/// Default candidate count requested from the provider.
pub const DEFAULT_LIMIT: usize = 5;

/// The one current forward-search lifecycle.
///
/// Superseded whenever a newer qualifying query fires, the query drops
/// below the gate, or a selection commits; superseding bumps
/// `request_id`, which is what fences out late responses.
struct SearchSession {
    query: String,
    request_id: u64,
}

impl SearchSession {
    fn idle() -> Self {
        Self {
            query: String::new(),
            request_id: 0,
        }
    }
}

/// Output of the search loop, consumed by the coordinator and the host UI.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchUpdate {
    /// The query was emptied or dropped below the minimum length.
    Cleared,
    /// Accepted provider response for the current session.
    Candidates {
        query: String,
        candidates: Vec<Candidate>,
    },
    /// Provider failure for the current session. Suggestions are empty and
    /// the host may offer a retry.
    Failed { query: String },
}

/// Debounces raw query edits and issues forward searches.
///
/// Runs as a single event loop: incoming edits reset the debounce window,
/// only the latest query in a window is ever sent, and responses carrying
/// a superseded request id are dropped without surfacing.
pub struct SearchController {
    geocoder: Arc<dyn Geocoder>,
    debounce: Duration,
    limit: usize,
}

impl SearchController {
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        Self {
            geocoder,
            debounce: DEBOUNCE,
            limit: DEFAULT_LIMIT,
        }
    }

    #[must_use]
    pub const fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Drive the controller until `inputs` closes.
    ///
    /// Each received string is the full current query text. `commits` is
    /// the coordinator's selection feed: a committed selection discards
    /// the current session, so a search still in flight at commit time
    /// never reopens the suggestion list. Closing the input channel shuts
    /// the loop down; any in-flight response is then ignored by
    /// construction.
    pub async fn run(
        self,
        executor: Arc<async_executor::Executor<'static>>,
        inputs: async_channel::Receiver<String>,
        commits: async_broadcast::Receiver<SelectedLocation>,
        updates: async_channel::Sender<SearchUpdate>,
    ) {
        let (response_tx, response_rx) =
            async_channel::bounded::<(u64, Result<Vec<Candidate>, ProviderError>)>(8);

        let mut session = SearchSession::idle();
        let mut next_request_id: u64 = 0;
        // Query waiting out the debounce window, with its timer.
        let mut window: Option<(String, Timer)> = None;
        let mut commits = Some(commits);

        loop {
            enum Branch {
                Input(Option<String>),
                WindowElapsed,
                Committed(Option<SelectedLocation>),
                Response(Option<(u64, Result<Vec<Candidate>, ProviderError>)>),
            }

            let branch = future::or(
                future::or(
                    async { Branch::Input(inputs.recv().await.ok()) },
                    async {
                        match &mut window {
                            Some((_, timer)) => {
                                timer.await;
                                Branch::WindowElapsed
                            }
                            None => future::pending().await,
                        }
                    },
                ),
                future::or(
                    async {
                        match &mut commits {
                            Some(rx) => Branch::Committed(rx.next().await),
                            None => future::pending().await,
                        }
                    },
                    async { Branch::Response(response_rx.recv().await.ok()) },
                ),
            )
            .await;

            match branch {
                Branch::Input(None) => break,
                Branch::Input(Some(raw)) => {
                    let query = raw.trim().to_owned();
                    if query.chars().count() < MIN_QUERY_LEN {
                        // Invalidate any in-flight request and close the window.
                        window = None;
                        next_request_id += 1;
                        session = SearchSession {
                            query,
                            request_id: next_request_id,
                        };
                        if updates.send(SearchUpdate::Cleared).await.is_err() {
                            break;
                        }
                    } else {
                        // Any further edit within the window resets the timer.
                        window = Some((query, Timer::after(self.debounce)));
                    }
                }
                Branch::WindowElapsed => {
                    let Some((query, _)) = window.take() else {
                        continue;
                    };
                    next_request_id += 1;
                    let request_id = next_request_id;
                    session = SearchSession {
                        query: query.clone(),
                        request_id,
                    };
                    tracing::debug!(%query, request_id, "forward search");

                    let geocoder = Arc::clone(&self.geocoder);
                    let limit = self.limit;
                    let tx = response_tx.clone();
                    executor
                        .spawn(async move {
                            let result = geocoder.forward(query, limit).await;
                            let _ = tx.send((request_id, result)).await;
                        })
                        .detach();
                }
                Branch::Committed(None) => commits = None,
                Branch::Committed(Some(selected)) => {
                    // A committed selection supersedes whatever search was
                    // pending or in flight.
                    window = None;
                    next_request_id += 1;
                    session = SearchSession {
                        query: String::new(),
                        request_id: next_request_id,
                    };
                    tracing::trace!(origin = %selected.origin, "search session invalidated by commit");
                }
                Branch::Response(None) => continue,
                Branch::Response(Some((request_id, result))) => {
                    if request_id != session.request_id {
                        tracing::trace!(request_id, "discarding stale response");
                        continue;
                    }
                    let update = match result {
                        Ok(candidates) => SearchUpdate::Candidates {
                            query: session.query.clone(),
                            candidates,
                        },
                        Err(e) => {
                            tracing::warn!(query = %session.query, error = %e, "forward search failed");
                            SearchUpdate::Failed {
                                query: session.query.clone(),
                            }
                        }
                    };
                    if updates.send(update).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::Origin;
    use crate::testutil::FakeGeocoder;
    use pharmap_geo::Coordinate;

    /// Short debounce so tests stay fast; margins are generous relative
    /// to the scripted provider delays.
    const TEST_DEBOUNCE: Duration = Duration::from_millis(40);

    fn candidate(lat: f64, lon: f64, name: &str) -> Candidate {
        Candidate {
            coordinate: Coordinate::new(lat, lon),
            display_name: name.to_owned(),
            source_id: name.to_owned(),
        }
    }

    struct Harness {
        executor: Arc<async_executor::Executor<'static>>,
        inputs: async_channel::Sender<String>,
        commits: async_broadcast::Sender<SelectedLocation>,
        updates: async_channel::Receiver<SearchUpdate>,
        geocoder: Arc<FakeGeocoder>,
    }

    fn harness(geocoder: FakeGeocoder) -> Harness {
        let executor = Arc::new(async_executor::Executor::new());
        let geocoder = Arc::new(geocoder);
        let (input_tx, input_rx) = async_channel::unbounded();
        let (commit_tx, commit_rx) = async_broadcast::broadcast(4);
        let (update_tx, update_rx) = async_channel::unbounded();
        let controller = SearchController::new(Arc::clone(&geocoder) as Arc<dyn Geocoder>)
            .with_debounce(TEST_DEBOUNCE);
        executor
            .spawn(controller.run(Arc::clone(&executor), input_rx, commit_rx, update_tx))
            .detach();
        Harness {
            executor,
            inputs: input_tx,
            commits: commit_tx,
            updates: update_rx,
            geocoder,
        }
    }

    async fn next_update(updates: &async_channel::Receiver<SearchUpdate>) -> Option<SearchUpdate> {
        update_within(updates, Duration::from_secs(2)).await
    }

    /// Returns `None` if no update arrives within `window`.
    async fn update_within(
        updates: &async_channel::Receiver<SearchUpdate>,
        window: Duration,
    ) -> Option<SearchUpdate> {
        future::or(async { updates.recv().await.ok() }, async {
            Timer::after(window).await;
            None
        })
        .await
    }

    #[test]
    fn short_queries_never_hit_the_provider() {
        let h = harness(FakeGeocoder::new());
        future::block_on(h.executor.run(async {
            h.inputs.send("pa".to_owned()).await.unwrap();
            assert_eq!(next_update(&h.updates).await, Some(SearchUpdate::Cleared));
            h.inputs.send("  a  ".to_owned()).await.unwrap();
            assert_eq!(next_update(&h.updates).await, Some(SearchUpdate::Cleared));
        }));
        assert_eq!(h.geocoder.forward_calls(), 0);
    }

    #[test]
    fn rapid_edits_coalesce_into_one_request() {
        let geocoder = FakeGeocoder::new();
        geocoder.script_forward(Duration::ZERO, Ok(vec![candidate(1.0, 1.0, "parace")]));
        let h = harness(geocoder);
        future::block_on(h.executor.run(async {
            h.inputs.send("par".to_owned()).await.unwrap();
            Timer::after(Duration::from_millis(10)).await;
            h.inputs.send("parace".to_owned()).await.unwrap();

            let update = next_update(&h.updates).await.unwrap();
            match update {
                SearchUpdate::Candidates { query, candidates } => {
                    assert_eq!(query, "parace");
                    assert_eq!(candidates.len(), 1);
                }
                other => panic!("unexpected update: {other:?}"),
            }
        }));
        assert_eq!(h.geocoder.forward_calls(), 1);
        assert_eq!(h.geocoder.forward_queries(), vec!["parace".to_owned()]);
    }

    #[test]
    fn stale_response_is_discarded() {
        let geocoder = FakeGeocoder::new();
        // First request answers long after the second.
        geocoder.script_forward(
            Duration::from_millis(300),
            Ok(vec![candidate(1.0, 1.0, "old")]),
        );
        geocoder.script_forward(
            Duration::from_millis(10),
            Ok(vec![candidate(2.0, 2.0, "new")]),
        );
        let h = harness(geocoder);
        future::block_on(h.executor.run(async {
            h.inputs.send("paracetamol".to_owned()).await.unwrap();
            // Let the first request fire, then supersede it.
            Timer::after(TEST_DEBOUNCE + Duration::from_millis(20)).await;
            h.inputs.send("ibuprofen".to_owned()).await.unwrap();

            let update = next_update(&h.updates).await.unwrap();
            match update {
                SearchUpdate::Candidates { query, candidates } => {
                    assert_eq!(query, "ibuprofen");
                    assert_eq!(candidates[0].display_name, "new");
                }
                other => panic!("unexpected update: {other:?}"),
            }

            // The old response eventually arrives and must not surface.
            assert_eq!(
                update_within(&h.updates, Duration::from_millis(400)).await,
                None
            );
        }));
        assert_eq!(h.geocoder.forward_calls(), 2);
    }

    #[test]
    fn clearing_the_query_invalidates_in_flight_requests() {
        let geocoder = FakeGeocoder::new();
        geocoder.script_forward(
            Duration::from_millis(100),
            Ok(vec![candidate(1.0, 1.0, "late")]),
        );
        let h = harness(geocoder);
        future::block_on(h.executor.run(async {
            h.inputs.send("aspirin".to_owned()).await.unwrap();
            Timer::after(TEST_DEBOUNCE + Duration::from_millis(20)).await;
            h.inputs.send(String::new()).await.unwrap();

            assert_eq!(next_update(&h.updates).await, Some(SearchUpdate::Cleared));
            // The in-flight response lands after the clear and is dropped.
            assert_eq!(
                update_within(&h.updates, Duration::from_millis(200)).await,
                None
            );
        }));
        assert_eq!(h.geocoder.forward_calls(), 1);
    }

    #[test]
    fn committed_selection_invalidates_in_flight_request() {
        let geocoder = FakeGeocoder::new();
        geocoder.script_forward(
            Duration::from_millis(100),
            Ok(vec![candidate(1.0, 1.0, "late")]),
        );
        let h = harness(geocoder);
        future::block_on(h.executor.run(async {
            h.inputs.send("aspirin".to_owned()).await.unwrap();
            Timer::after(TEST_DEBOUNCE + Duration::from_millis(20)).await;

            // The user commits a selection while the request is in flight.
            h.commits
                .broadcast(SelectedLocation {
                    coordinate: Coordinate::new(1.0, 1.0),
                    address: "MG Road, Haldwani".to_owned(),
                    origin: Origin::TextSearch,
                })
                .await
                .unwrap();

            // The response lands after the commit and must not surface.
            assert_eq!(
                update_within(&h.updates, Duration::from_millis(300)).await,
                None
            );
        }));
        assert_eq!(h.geocoder.forward_calls(), 1);
    }

    #[test]
    fn provider_failure_surfaces_as_failed_update() {
        let geocoder = FakeGeocoder::new();
        geocoder.script_forward(Duration::ZERO, Err(ProviderError::Timeout));
        let h = harness(geocoder);
        future::block_on(h.executor.run(async {
            h.inputs.send("aspirin".to_owned()).await.unwrap();
            assert_eq!(
                next_update(&h.updates).await,
                Some(SearchUpdate::Failed {
                    query: "aspirin".to_owned()
                })
            );
        }));
    }
}

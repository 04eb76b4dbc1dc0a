use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_io::Timer;

use pharmap_geo::{Candidate, Coordinate, Geocoder, ProviderError, ADDRESS_UNAVAILABLE};

/// Scripted in-memory geocoder.
///
/// Each call pops the next scripted `(delay, result)` entry; an exhausted
/// script answers immediately with an empty/sentinel success.
pub struct FakeGeocoder {
    forward_calls: AtomicUsize,
    reverse_calls: AtomicUsize,
    forward_queries: Mutex<Vec<String>>,
    forward_script: Mutex<VecDeque<(Duration, Result<Vec<Candidate>, ProviderError>)>>,
    reverse_script: Mutex<VecDeque<(Duration, Result<String, ProviderError>)>>,
}

impl FakeGeocoder {
    pub fn new() -> Self {
        Self {
            forward_calls: AtomicUsize::new(0),
            reverse_calls: AtomicUsize::new(0),
            forward_queries: Mutex::new(Vec::new()),
            forward_script: Mutex::new(VecDeque::new()),
            reverse_script: Mutex::new(VecDeque::new()),
        }
    }

    pub fn script_forward(&self, delay: Duration, result: Result<Vec<Candidate>, ProviderError>) {
        self.forward_script
            .lock()
            .unwrap()
            .push_back((delay, result));
    }

    pub fn script_reverse(&self, delay: Duration, result: Result<String, ProviderError>) {
        self.reverse_script
            .lock()
            .unwrap()
            .push_back((delay, result));
    }

    pub fn forward_calls(&self) -> usize {
        self.forward_calls.load(Ordering::SeqCst)
    }

    pub fn reverse_calls(&self) -> usize {
        self.reverse_calls.load(Ordering::SeqCst)
    }

    pub fn forward_queries(&self) -> Vec<String> {
        self.forward_queries.lock().unwrap().clone()
    }
}

impl Geocoder for FakeGeocoder {
    fn forward(
        &self,
        query: String,
        _limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Candidate>, ProviderError>> + Send + '_>> {
        self.forward_calls.fetch_add(1, Ordering::SeqCst);
        self.forward_queries.lock().unwrap().push(query);
        let (delay, result) = self
            .forward_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or((Duration::ZERO, Ok(Vec::new())));
        Box::pin(async move {
            if !delay.is_zero() {
                Timer::after(delay).await;
            }
            result
        })
    }

    fn reverse(
        &self,
        _coordinate: Coordinate,
    ) -> Pin<Box<dyn Future<Output = Result<String, ProviderError>> + Send + '_>> {
        self.reverse_calls.fetch_add(1, Ordering::SeqCst);
        let (delay, result) = self
            .reverse_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or((Duration::ZERO, Ok(ADDRESS_UNAVAILABLE.to_owned())));
        Box::pin(async move {
            if !delay.is_zero() {
                Timer::after(delay).await;
            }
            result
        })
    }
}

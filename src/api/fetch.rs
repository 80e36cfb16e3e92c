//! Purpose: Read side of the data layer: endpoint-bound fetch state with stale-result guarding.
//! Exports: `Fetcher`, `FetchTicket`, `FetchLoop`, `Completion`, `unwrap_paged`.
//! Role: Owns `{data, loading, error}` for one endpoint; the loop runs requests off-thread.
//! Invariants: A result is committed only if its ticket belongs to the current cycle.
//! Invariants: Starting a cycle resets data to `T::default()`; failures leave it reset.
//! Invariants: Requests are never aborted; superseded results are dropped on arrival.
use crate::api::transport::{ApiRequest, ApiResult, Transport};
use crate::core::error::{Error, ErrorKind};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

const DEFAULT_LOAD_ERROR: &str = "failed to load data";

/// Identifies one fetch cycle of one `Fetcher`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FetchTicket {
    generation: u64,
    endpoint: String,
}

impl FetchTicket {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn request(&self) -> ApiRequest {
        ApiRequest::get(self.endpoint.clone())
    }
}

#[derive(Debug)]
pub struct Fetcher<T> {
    endpoint: Option<String>,
    generation: u64,
    data: T,
    loading: bool,
    error: Option<String>,
}

impl<T: Default + DeserializeOwned> Default for Fetcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default + DeserializeOwned> Fetcher<T> {
    pub fn new() -> Self {
        Self {
            endpoint: None,
            generation: 0,
            data: T::default(),
            loading: false,
            error: None,
        }
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Bind to `endpoint`; starts a cycle only when the value differs from the current one.
    pub fn set_endpoint(&mut self, endpoint: &str) -> Option<FetchTicket> {
        if self.endpoint.as_deref() == Some(endpoint) {
            return None;
        }
        self.endpoint = Some(endpoint.to_string());
        Some(self.begin())
    }

    /// Start a new cycle for the current endpoint even though it did not change.
    pub fn refresh(&mut self) -> Option<FetchTicket> {
        self.endpoint.as_ref()?;
        Some(self.begin())
    }

    fn begin(&mut self) -> FetchTicket {
        self.generation += 1;
        self.data = T::default();
        self.loading = true;
        self.error = None;
        let endpoint = self.endpoint.clone().unwrap_or_default();
        tracing::debug!(endpoint = %endpoint, generation = self.generation, "fetch started");
        FetchTicket {
            generation: self.generation,
            endpoint,
        }
    }

    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.generation == self.generation && self.endpoint.as_deref() == Some(&ticket.endpoint)
    }

    /// Apply a finished request. Returns `false` when the ticket was superseded.
    pub fn complete(&mut self, ticket: &FetchTicket, result: ApiResult<Value>) -> bool {
        if !self.is_current(ticket) {
            tracing::debug!(
                endpoint = %ticket.endpoint,
                generation = ticket.generation,
                current = self.generation,
                "discarding stale fetch result"
            );
            return false;
        }
        self.loading = false;
        match result.and_then(|value| decode(unwrap_paged(value))) {
            Ok(data) => {
                self.data = data;
                self.error = None;
            }
            Err(err) => {
                tracing::warn!(endpoint = %ticket.endpoint, error = %err, "fetch failed");
                self.error = Some(error_text(&err));
            }
        }
        true
    }

    /// Bind, send and commit in one step on the calling thread.
    pub fn fetch_blocking(&mut self, transport: &dyn Transport, endpoint: &str) -> bool {
        let ticket = match self.set_endpoint(endpoint) {
            Some(ticket) => ticket,
            None => match self.refresh() {
                Some(ticket) => ticket,
                None => return false,
            },
        };
        let result = transport.send(&ticket.request());
        self.complete(&ticket, result)
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> ApiResult<T> {
    serde_json::from_value(value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("unexpected response shape")
            .with_source(err)
    })
}

/// Unwrap a paged collection (`{"content": [...], ...}`) to its item list.
pub fn unwrap_paged(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.get("content").is_some_and(Value::is_array) => {
            map.remove("content").unwrap_or(Value::Null)
        }
        other => other,
    }
}

pub(crate) fn error_text(err: &Error) -> String {
    err.message()
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_LOAD_ERROR.to_string())
}

/// A finished request routed back to the loop thread.
pub struct Completion<K> {
    pub key: K,
    pub ticket: FetchTicket,
    pub result: ApiResult<Value>,
}

/// Runs fetch requests on worker threads and hands completions back to one owner thread.
pub struct FetchLoop<K> {
    transport: Arc<dyn Transport>,
    sender: mpsc::Sender<Completion<K>>,
    receiver: mpsc::Receiver<Completion<K>>,
    in_flight: usize,
}

impl<K: Send + 'static> FetchLoop<K> {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            transport,
            sender,
            receiver,
            in_flight: 0,
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn dispatch(&mut self, key: K, ticket: FetchTicket) {
        let transport = Arc::clone(&self.transport);
        let sender = self.sender.clone();
        self.in_flight += 1;
        thread::spawn(move || {
            let result = transport.send(&ticket.request());
            let _ = sender.send(Completion {
                key,
                ticket,
                result,
            });
        });
    }

    /// Next completion if one already arrived.
    pub fn poll(&mut self) -> Option<Completion<K>> {
        let completion = self.receiver.try_recv().ok()?;
        self.in_flight -= 1;
        Some(completion)
    }

    /// Block until a request finishes; `None` when nothing is in flight.
    pub fn wait(&mut self) -> Option<Completion<K>> {
        if self.in_flight == 0 {
            return None;
        }
        let completion = self.receiver.recv().ok()?;
        self.in_flight -= 1;
        Some(completion)
    }
}

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::Notify;

use super::adapter::{
    RestBytes, RestError, RestErrorKind, RestFuture, RestRequest, RestResponse, RestResult,
    RestTransport, RestTransportState,
};

#[derive(Clone, Debug, Default)]
pub enum MockBehavior {
    #[default]
    Pass,
    Delay(Duration),
    Reject {
        status: u16,
        reason: String,
    },
    ConnectError {
        reason: String,
        retryable: bool,
    },
    TimeoutError {
        reason: String,
    },
    /// The receiver reads the request but closes the connection without answering.
    Drop,
}

impl MockBehavior {
    pub fn pass() -> Self {
        Self::Pass
    }

    pub fn delay(ms: u64) -> Self {
        Self::Delay(Duration::from_millis(ms))
    }

    pub fn reject(status: u16, reason: impl Into<String>) -> Self {
        Self::Reject {
            status,
            reason: reason.into(),
        }
    }

    pub fn connect_error(reason: impl Into<String>, retryable: bool) -> Self {
        Self::ConnectError {
            reason: reason.into(),
            retryable,
        }
    }

    pub fn timeout_error(reason: impl Into<String>) -> Self {
        Self::TimeoutError {
            reason: reason.into(),
        }
    }

    pub fn drop_response() -> Self {
        Self::Drop
    }
}

/// Behaviors consumed one per request, in order. Once empty every request passes.
#[derive(Clone, Debug, Default)]
pub struct MockBehaviorPlan {
    request: VecDeque<MockBehavior>,
}

impl MockBehaviorPlan {
    pub fn push(&mut self, behavior: MockBehavior) -> &mut Self {
        self.request.push_back(behavior);
        self
    }

    fn pop(&mut self) -> MockBehavior {
        self.request.pop_front().unwrap_or_default()
    }
}

#[derive(Clone, Debug)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, RestBytes)>,
    pub body: RestBytes,
}

impl MockResponse {
    pub fn new(status: u16, body: impl Into<RestBytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<RestBytes>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, body.into())
    }

    pub fn json<T: Serialize>(status: u16, payload: &T) -> RestResult<Self> {
        let body = sonic_rs::to_vec(payload).map_err(RestError::from)?;
        Ok(Self::new(status, body))
    }
}

#[derive(Clone, Debug)]
pub struct MockRestStateSnapshot {
    pub state: RestTransportState,
    pub request_count: usize,
    pub last_url: Option<String>,
    pub last_status: Option<u16>,
    pub behavior_remaining: usize,
    pub response_queue_len: usize,
    pub outbound_count: usize,
    pub inbound_count: usize,
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct MockRestAdapterState {
    state: RestTransportState,
    request_count: usize,
    last_url: Option<String>,
    last_status: Option<u16>,
    behavior_plan: MockBehaviorPlan,
    default_response_queue: VecDeque<MockResponse>,
    url_response_queues: HashMap<String, VecDeque<MockResponse>>,
    outbound_log: Vec<RestRequest>,
    inbound_log: Vec<RestResponse>,
    last_error: Option<String>,
}

impl MockRestAdapterState {
    fn snapshot(&self) -> MockRestStateSnapshot {
        MockRestStateSnapshot {
            state: self.state,
            request_count: self.request_count,
            last_url: self.last_url.clone(),
            last_status: self.last_status,
            behavior_remaining: self.behavior_plan.request.len(),
            response_queue_len: self.default_response_queue.len()
                + self.url_response_queues.values().map(VecDeque::len).sum::<usize>(),
            outbound_count: self.outbound_log.len(),
            inbound_count: self.inbound_log.len(),
            last_error: self.last_error.clone(),
        }
    }

    fn next_response(&mut self, url: &str) -> Option<MockResponse> {
        if let Some(queue) = self.url_response_queues.get_mut(url) {
            if let Some(response) = queue.pop_front() {
                return Some(response);
            }
        }
        self.default_response_queue.pop_front()
    }
}

impl Default for MockRestAdapterState {
    fn default() -> Self {
        Self {
            state: RestTransportState::Idle,
            request_count: 0,
            last_url: None,
            last_status: None,
            behavior_plan: MockBehaviorPlan::default(),
            default_response_queue: VecDeque::new(),
            url_response_queues: HashMap::new(),
            outbound_log: Vec::new(),
            inbound_log: Vec::new(),
            last_error: None,
        }
    }
}

/// In-memory transport that records every request and answers from a script.
#[derive(Clone, Debug, Default)]
pub struct MockRestAdapter {
    state: Arc<Mutex<MockRestAdapterState>>,
    outbound_signal: Arc<Notify>,
}

impl MockRestAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior_plan(behavior_plan: MockBehaviorPlan) -> Self {
        let state = MockRestAdapterState {
            behavior_plan,
            ..MockRestAdapterState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            outbound_signal: Arc::new(Notify::new()),
        }
    }

    pub fn snapshot(&self) -> MockRestStateSnapshot {
        self.state
            .lock()
            .expect("mock-restapi mutex poisoned while taking snapshot")
            .snapshot()
    }

    pub fn queue_response(&self, response: MockResponse) {
        self.state
            .lock()
            .expect("mock-restapi mutex poisoned while queueing response")
            .default_response_queue
            .push_back(response);
    }

    pub fn queue_response_for(&self, url: impl Into<String>, response: MockResponse) {
        self.state
            .lock()
            .expect("mock-restapi mutex poisoned while queueing response by url")
            .url_response_queues
            .entry(url.into())
            .or_default()
            .push_back(response);
    }

    pub fn outbound(&self) -> Vec<RestRequest> {
        self.state
            .lock()
            .expect("mock-restapi mutex poisoned while reading outbound log")
            .outbound_log
            .clone()
    }

    pub fn outbound_count(&self) -> usize {
        self.state
            .lock()
            .expect("mock-restapi mutex poisoned while reading outbound count")
            .outbound_log
            .len()
    }

    pub fn inbound_count(&self) -> usize {
        self.state
            .lock()
            .expect("mock-restapi mutex poisoned while reading inbound count")
            .inbound_log
            .len()
    }

    pub fn clear_logs(&self) {
        let mut state = self
            .state
            .lock()
            .expect("mock-restapi mutex poisoned while clearing logs");
        state.outbound_log.clear();
        state.inbound_log.clear();
    }

    /// Waits until `count` requests have been recorded or `timeout` elapses.
    /// Fire-and-forget sends give no completion signal, so tests wait here.
    pub async fn wait_for_outbound(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let recorded = self.outbound_signal.notified();
            if self.outbound_count() >= count {
                return true;
            }
            if tokio::time::timeout_at(deadline, recorded).await.is_err() {
                return self.outbound_count() >= count;
            }
        }
    }

    fn begin(&self, request: &RestRequest) -> MockBehavior {
        let mut state = self
            .state
            .lock()
            .expect("mock-restapi mutex poisoned while recording outbound request");
        state.outbound_log.push(request.clone());
        state.request_count += 1;
        state.last_url = Some(request.url.clone());
        state.state = RestTransportState::Busy;
        state.last_error = None;
        let behavior = state.behavior_plan.pop();
        drop(state);
        self.outbound_signal.notify_waiters();
        behavior
    }

    fn fail(
        &self,
        kind: RestErrorKind,
        status: Option<u16>,
        message: impl Into<String>,
        retryable: bool,
    ) -> RestError {
        let message = message.into();
        let mut state = self
            .state
            .lock()
            .expect("mock-restapi mutex poisoned while recording error");
        state.state = RestTransportState::Error;
        state.last_error = Some(message.clone());
        state.last_status = status;
        RestError::new(kind, status, message, retryable)
    }

    fn respond(&self, url: &str, started: Instant) -> RestResponse {
        let mut state = self
            .state
            .lock()
            .expect("mock-restapi mutex poisoned while recording inbound response");
        let response = match state.next_response(url) {
            Some(queued) => RestResponse {
                status: queued.status,
                headers: queued.headers,
                body: queued.body,
                elapsed: started.elapsed(),
            },
            None => RestResponse {
                status: 200,
                headers: Vec::new(),
                body: Bytes::new(),
                elapsed: started.elapsed(),
            },
        };
        state.inbound_log.push(response.clone());
        state.last_status = Some(response.status);
        state.state = RestTransportState::Idle;
        response
    }
}

impl RestTransport for MockRestAdapter {
    fn execute(&self, request: RestRequest) -> RestFuture<RestResult<RestResponse>> {
        let adapter = self.clone();
        Box::pin(async move {
            let started = Instant::now();
            let behavior = adapter.begin(&request);

            match behavior {
                MockBehavior::Pass => {}
                MockBehavior::Delay(duration) => tokio::time::sleep(duration).await,
                MockBehavior::Reject { status, reason } => {
                    return Err(adapter.fail(RestErrorKind::Rejected, Some(status), reason, true));
                }
                MockBehavior::ConnectError { reason, retryable } => {
                    return Err(adapter.fail(RestErrorKind::Connect, None, reason, retryable));
                }
                MockBehavior::TimeoutError { reason } => {
                    return Err(adapter.fail(RestErrorKind::Timeout, None, reason, true));
                }
                MockBehavior::Drop => {
                    return Err(adapter.fail(
                        RestErrorKind::Receive,
                        None,
                        "mock transport closed connection before responding",
                        false,
                    ));
                }
            }

            Ok(adapter.respond(&request.url, started))
        })
    }
}

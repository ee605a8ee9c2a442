//! A transport that plays back a script instead of touching the network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use restcall_client::transport::{
    CancellationToken, CancellationWatcher, Header, Transport, TransportCall, TransportFault,
    TransportRequest, TransportResponse,
};
use restcall_client::{FaultKind, Method, StatusCode};

/// How long a [`Step::Hang`] call waits for an abort before timing out.
pub const HANG_LIMIT: Duration = Duration::from_secs(10);

/// What one attempt does.
#[derive(Debug, Clone)]
pub enum Step {
    /// Answer with a non-error status.
    Respond {
        status: u16,
        body: String,
        content_type: Option<String>,
    },
    /// Answer with an error status, surfaced as a fault carrying the response.
    Fail { status: u16, body: String },
    /// Fail before any response arrives.
    Disconnect,
    /// Fail as if the timeout elapsed.
    Timeout,
    /// Answer 200 with the request body and content type.
    Echo,
    /// Block until aborted.
    Hang,
}

impl Step {
    /// 200 with a body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self::Respond {
            status: 200,
            body: body.into(),
            content_type: None,
        }
    }

    /// 200 with a body and content type.
    pub fn ok_with_type(body: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self::Respond {
            status: 200,
            body: body.into(),
            content_type: Some(content_type.into()),
        }
    }

    /// Any non-error status with an empty body.
    pub fn status(status: u16) -> Self {
        Self::Respond {
            status,
            body: String::new(),
            content_type: None,
        }
    }

    /// Error status with an empty body.
    pub fn fail(status: u16) -> Self {
        Self::Fail {
            status,
            body: String::new(),
        }
    }
}

/// One dispatched call as the transport saw it.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub url: String,
    pub method: Method,
    pub content_type: Option<String>,
    pub timeout: Duration,
    pub headers: Vec<Header>,
    pub body: Vec<u8>,
    pub dispatched_at: Instant,
}

impl RecordedCall {
    /// Body as UTF-8 text.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Value sent for header `name`, `Some(None)` for a bare header.
    pub fn header(&self, name: &str) -> Option<Option<&str>> {
        self.headers
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.value.as_deref())
    }
}

/// Plays back [`Step`]s in order, repeating the last one forever.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    last: Mutex<Step>,
    opened: AtomicUsize,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ScriptedTransport {
    /// Transport playing `steps`. An empty script always answers `200`.
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into_iter().collect()),
            last: Mutex::new(Step::ok("")),
            opened: AtomicUsize::new(0),
            calls: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Transport that does the same thing on every attempt.
    pub fn always(step: Step) -> Arc<Self> {
        Self::new([step])
    }

    /// Number of calls opened.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of calls dispatched.
    pub fn attempts(&self) -> usize {
        self.calls.lock().len()
    }

    /// Snapshot of every dispatched call.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    fn next_step(&self) -> Step {
        let mut last = self.last.lock();
        if let Some(step) = self.script.lock().pop_front() {
            *last = step;
        }
        last.clone()
    }
}

impl Transport for ScriptedTransport {
    fn open(&self, request: TransportRequest) -> Result<Box<dyn TransportCall>, TransportFault> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let (token, watcher) = CancellationToken::new();
        Ok(Box::new(ScriptedCall {
            step: self.next_step(),
            request,
            body: Vec::new(),
            token,
            watcher,
            sink: Arc::clone(&self.calls),
        }))
    }
}

struct ScriptedCall {
    step: Step,
    request: TransportRequest,
    body: Vec<u8>,
    token: CancellationToken,
    watcher: CancellationWatcher,
    sink: Arc<Mutex<Vec<RecordedCall>>>,
}

impl TransportCall for ScriptedCall {
    fn write_body(&mut self, body: &[u8]) -> Result<(), TransportFault> {
        self.body.extend_from_slice(body);
        Ok(())
    }

    fn cancellation(&self) -> CancellationToken {
        self.token.clone()
    }

    fn dispatch(self: Box<Self>) -> Result<TransportResponse, TransportFault> {
        let ScriptedCall {
            step,
            request,
            body,
            watcher,
            sink,
            ..
        } = *self;

        sink.lock().push(RecordedCall {
            url: request.url.clone(),
            method: request.method,
            content_type: request.content_type.clone(),
            timeout: request.timeout,
            headers: request.headers.clone(),
            body: body.clone(),
            dispatched_at: Instant::now(),
        });

        if watcher.is_cancelled() {
            return Err(TransportFault::aborted());
        }

        match step {
            Step::Respond {
                status,
                body,
                content_type,
            } => {
                let mut response = TransportResponse::new(status_code(status)).with_body(body);
                if let Some(content_type) = content_type {
                    response = response.with_content_type(content_type);
                }
                Ok(response)
            }
            Step::Fail { status, body } => Err(TransportFault::status(
                TransportResponse::new(status_code(status)).with_body(body),
            )),
            Step::Disconnect => Err(TransportFault::new(
                FaultKind::Connect,
                "Unable to connect to the remote server",
            )),
            Step::Timeout => Err(TransportFault::new(FaultKind::Timeout, "The operation has timed out")),
            Step::Echo => {
                let mut response = TransportResponse::new(StatusCode::OK).with_body(body);
                if let Some(content_type) = request.content_type {
                    response = response.with_content_type(content_type);
                }
                Ok(response)
            }
            Step::Hang => {
                let deadline = Instant::now() + HANG_LIMIT;
                while Instant::now() < deadline {
                    if watcher.is_cancelled() {
                        return Err(TransportFault::aborted());
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
                Err(TransportFault::new(FaultKind::Timeout, "The operation has timed out"))
            }
        }
    }
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).expect("scripted status must be a valid HTTP status")
}

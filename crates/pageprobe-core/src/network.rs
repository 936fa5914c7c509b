//! Network capture for promise-based (`fetch`) and event-based (XHR)
//! requests.
//!
//! Request descriptions arrive as loosely-shaped host values; they are
//! modelled here as [`RequestInput`], [`HeaderShape`] and [`BodyShape`] and
//! normalized defensively (unknown shapes become empty maps or zero sizes).
//!
//! Fetch calls are captured by [`NetworkMonitor::begin_fetch`] before the call
//! is issued and settled by [`PendingRequest::settle`] when it completes. The
//! entry is recorded as soon as the response arrives; its body size is filled
//! in later by the returned [`BodySizing`], off the caller's path.
//! XHR calls are tracked per call in an [`XhrTracker`] keyed by
//! [`XhrHandle`], so overlapping calls never share metadata. Calls that are
//! opened but never sent are capped at [`XHR_OPEN_CAPACITY`]; sent calls are
//! removed by their completion event.

use crate::buffer::{BoundedLog, Subscription};
use crate::clock::Clock;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use url::Url;

/// Default number of retained network entries.
pub const NETWORK_CAPACITY: usize = 200;

/// Most opened-but-unsent XHR calls kept; the oldest is dropped beyond this.
pub const XHR_OPEN_CAPACITY: usize = 64;

/// Status text recorded when the wrapped call itself fails.
pub const NETWORK_ERROR_TEXT: &str = "Network Error";

/// Header name/value map, keys lower-cased.
pub type HeaderMap = BTreeMap<String, String>;

/// Which mechanism issued a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    /// Promise-based `fetch`
    Fetch,
    /// Legacy `XMLHttpRequest`
    Xhr,
}

/// One completed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkEntry {
    /// Id, unique within the network log
    pub id: u64,
    /// Issuing mechanism
    pub kind: RequestKind,
    /// Upper-cased HTTP method
    pub method: String,
    /// Request URL
    pub url: String,
    /// HTTP status; 0 when the request failed at the network level
    pub status: u16,
    /// HTTP status text
    pub status_text: String,
    /// Elapsed milliseconds
    pub duration: f64,
    /// Estimated request body size
    pub request_size: u64,
    /// Estimated response body size
    pub response_size: u64,
    /// Request headers
    pub request_headers: HeaderMap,
    /// Response headers
    pub response_headers: HeaderMap,
    /// Monotonic start time
    pub start_time: f64,
    /// Epoch milliseconds at completion
    pub timestamp: f64,
}

impl NetworkEntry {
    /// Network failure or HTTP error status.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.status == 0 || self.status >= 400
    }
}

// =============================================================================
// Request description
// =============================================================================

/// The first argument of a fetch call.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestInput {
    /// Plain string URL
    Url(String),
    /// URL object (its `href`)
    UrlObject(String),
    /// Request-like object
    Request {
        /// Request URL
        url: String,
        /// Request method
        method: Option<String>,
        /// Request headers
        headers: HeaderShape,
    },
}

impl RequestInput {
    /// The raw URL of the input.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Url(url) | Self::UrlObject(url) | Self::Request { url, .. } => url,
        }
    }
}

/// Resolve a possibly relative URL against the page URL.
///
/// Absolute URLs are returned verbatim; input that cannot be resolved is
/// returned unchanged.
#[must_use]
pub fn resolve_url(raw: &str, base: Option<&str>) -> String {
    if Url::parse(raw).is_ok() {
        return raw.to_string();
    }
    base.and_then(|b| Url::parse(b).ok())
        .and_then(|b| b.join(raw).ok())
        .map_or_else(|| raw.to_string(), String::from)
}

/// The shapes a header set can take.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HeaderShape {
    /// No headers given
    #[default]
    None,
    /// A `Headers` object, as its entries
    Headers(Vec<(String, String)>),
    /// An array of pairs; malformed pairs are skipped
    Pairs(Vec<Vec<String>>),
    /// A plain object; non-string values are `None`
    Map(Vec<(String, Option<String>)>),
    /// Something else
    Unknown,
}

/// Normalize any header shape into a lower-cased map.
#[must_use]
pub fn normalize_headers(shape: &HeaderShape) -> HeaderMap {
    let mut map = HeaderMap::new();
    match shape {
        HeaderShape::None | HeaderShape::Unknown => {}
        HeaderShape::Headers(entries) => {
            for (name, value) in entries {
                map.insert(name.to_ascii_lowercase(), value.clone());
            }
        }
        HeaderShape::Pairs(pairs) => {
            for pair in pairs {
                if let [name, value] = pair.as_slice() {
                    map.insert(name.to_ascii_lowercase(), value.clone());
                }
            }
        }
        HeaderShape::Map(entries) => {
            for (name, value) in entries {
                if let Some(value) = value {
                    map.insert(name.to_ascii_lowercase(), value.clone());
                }
            }
        }
    }
    map
}

/// One part of a multipart form body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPart {
    /// String field
    Text {
        /// Field name
        name: String,
        /// Field value
        value: String,
    },
    /// File or blob field
    Blob {
        /// Field name
        name: String,
        /// Byte size
        size: u64,
    },
}

/// The shapes a request body can take.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BodyShape {
    /// No body
    #[default]
    None,
    /// String body
    Text(String),
    /// Blob or file
    Blob {
        /// Byte size
        size: u64,
    },
    /// `ArrayBuffer` or typed-array view
    Buffer {
        /// Byte length
        byte_length: u64,
    },
    /// Multipart form
    FormData(Vec<FormPart>),
    /// `URLSearchParams`, as its serialized string
    UrlSearchParams(String),
    /// Streams and anything else
    Unknown,
}

/// Length of a string as the host counts it (UTF-16 code units).
fn host_len(s: &str) -> u64 {
    s.encode_utf16().count() as u64
}

/// Estimate a request body size; unknown shapes count as 0.
#[must_use]
pub fn estimate_body_size(body: &BodyShape) -> u64 {
    match body {
        BodyShape::None | BodyShape::Unknown => 0,
        BodyShape::Text(s) | BodyShape::UrlSearchParams(s) => host_len(s),
        BodyShape::Blob { size } => *size,
        BodyShape::Buffer { byte_length } => *byte_length,
        BodyShape::FormData(parts) => parts
            .iter()
            .map(|part| match part {
                FormPart::Text { value, .. } => host_len(value),
                FormPart::Blob { size, .. } => *size,
            })
            .sum(),
    }
}

/// Description of one fetch call.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    /// First argument
    pub input: RequestInput,
    /// `init.method`
    pub method: Option<String>,
    /// `init.headers`
    pub headers: HeaderShape,
    /// `init.body`
    pub body: BodyShape,
}

impl FetchRequest {
    /// A bare request to `url`.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            input: RequestInput::Url(url.into()),
            method: None,
            headers: HeaderShape::None,
            body: BodyShape::None,
        }
    }

    /// Set the init method.
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Set the init headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderShape) -> Self {
        self.headers = headers;
        self
    }

    /// Set the init body.
    #[must_use]
    pub fn with_body(mut self, body: BodyShape) -> Self {
        self.body = body;
        self
    }

    /// Effective method: init, then the request object, then `GET`.
    #[must_use]
    pub fn method(&self) -> String {
        let from_input = match &self.input {
            RequestInput::Request { method, .. } => method.as_deref(),
            _ => None,
        };
        self.method
            .as_deref()
            .or(from_input)
            .filter(|m| !m.is_empty())
            .unwrap_or("GET")
            .to_ascii_uppercase()
    }

    /// Effective headers: the request object's, overridden by init headers.
    #[must_use]
    pub fn header_map(&self) -> HeaderMap {
        let mut map = match &self.input {
            RequestInput::Request { headers, .. } => normalize_headers(headers),
            _ => HeaderMap::new(),
        };
        map.extend(normalize_headers(&self.headers));
        map
    }
}

// =============================================================================
// Fetch
// =============================================================================

/// What the interceptor needs to read from a completed fetch response.
pub trait ObservedResponse {
    /// HTTP status.
    fn status(&self) -> u16;

    /// HTTP status text.
    fn status_text(&self) -> String;

    /// Response headers.
    fn headers(&self) -> HeaderMap;

    /// Body size read without consuming the caller's body; `None` when
    /// unreadable. The future must not borrow the response, since it may
    /// outlive the caller's use of it.
    fn body_size(&self) -> impl Future<Output = Option<u64>> + 'static;
}

/// Deferred body-size read for an entry that is already recorded.
///
/// Until [`run`](Self::run) completes the entry reports a response size of 0.
/// Streaming bodies may never finish, in which case it stays 0.
#[must_use = "the entry keeps a zero response size unless the sizing runs"]
pub struct BodySizing {
    log: BoundedLog<NetworkEntry>,
    id: u64,
    size: Pin<Box<dyn Future<Output = Option<u64>>>>,
}

impl BodySizing {
    /// Id of the entry this sizing updates.
    #[must_use]
    pub const fn entry_id(&self) -> u64 {
        self.id
    }

    /// Await the size and write it into the entry.
    ///
    /// Returns `false` when the body was unreadable or the entry has already
    /// been evicted or cleared.
    pub async fn run(self) -> bool {
        let Some(size) = self.size.await else {
            return false;
        };
        let id = self.id;
        let updated = self.log.update(|entry| entry.id == id, |entry| entry.response_size = size);
        tracing::trace!(id, size, updated, "response size measured");
        updated
    }
}

impl fmt::Debug for BodySizing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodySizing").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Captured metadata of an in-flight request.
#[must_use = "a pending request records nothing until settled"]
pub struct PendingRequest {
    log: BoundedLog<NetworkEntry>,
    clock: Rc<dyn Clock>,
    kind: RequestKind,
    method: String,
    url: String,
    request_headers: HeaderMap,
    request_size: u64,
    start_time: f64,
}

impl PendingRequest {
    /// Record the outcome and hand it back unchanged.
    ///
    /// Status, headers and duration are taken now. A successful response also
    /// yields a [`BodySizing`] that the caller drives separately.
    pub fn settle<R, E>(self, result: Result<R, E>) -> (Result<R, E>, Option<BodySizing>)
    where
        R: ObservedResponse,
    {
        match result {
            Ok(response) => {
                let log = self.log.clone();
                let id = self.finish(response.status(), response.status_text(), 0, response.headers());
                let sizing = BodySizing {
                    log,
                    id,
                    size: Box::pin(response.body_size()),
                };
                (Ok(response), Some(sizing))
            }
            Err(err) => {
                self.fail();
                (Err(err), None)
            }
        }
    }

    /// Record a network-level failure.
    pub fn fail(self) {
        self.finish(0, NETWORK_ERROR_TEXT.to_string(), 0, HeaderMap::new());
    }

    fn finish(self, status: u16, status_text: String, response_size: u64, response_headers: HeaderMap) -> u64 {
        let duration = (self.clock.now() - self.start_time).max(0.0).round();
        let entry = NetworkEntry {
            id: self.log.next_id(),
            kind: self.kind,
            method: self.method,
            url: self.url,
            status,
            status_text,
            duration,
            request_size: self.request_size,
            response_size,
            request_headers: self.request_headers,
            response_headers,
            start_time: self.start_time,
            timestamp: self.clock.epoch_millis(),
        };
        let id = entry.id;
        tracing::trace!(id, status, url = %entry.url, "network entry captured");
        self.log.push(entry);
        id
    }
}

impl fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("start_time", &self.start_time)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// XHR
// =============================================================================

/// Call-scoped key of one XHR object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct XhrHandle(u64);

impl XhrHandle {
    /// Rebuild a handle from its raw value.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw value, for storing on the host object.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// Response body representations an XHR can expose.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ResponseBody {
    /// Nothing readable
    #[default]
    Empty,
    /// Text response
    Text(String),
    /// Binary response
    ArrayBuffer {
        /// Byte length
        byte_length: u64,
    },
    /// Blob response
    Blob {
        /// Byte size
        size: u64,
    },
    /// Parsed JSON response
    Json(serde_json::Value),
    /// XML/HTML document
    Document,
    /// Anything else
    Unknown,
}

/// Estimate a response size from whatever representation is available.
#[must_use]
pub fn estimate_response_size(body: &ResponseBody) -> u64 {
    match body {
        ResponseBody::Empty | ResponseBody::Document | ResponseBody::Unknown => 0,
        ResponseBody::Text(s) => host_len(s),
        ResponseBody::ArrayBuffer { byte_length } => *byte_length,
        ResponseBody::Blob { size } => *size,
        ResponseBody::Json(value) => host_len(&value.to_string()),
    }
}

/// Parse raw `name: value` header lines.
///
/// Names are lower-cased, values trimmed, lines without a colon skipped and
/// repeated names joined with `", "`.
#[must_use]
pub fn parse_raw_headers(raw: &str) -> HeaderMap {
    let mut map = HeaderMap::new();
    for line in raw.split(['\r', '\n']) {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        if name.is_empty() {
            continue;
        }
        let value = value.trim();
        map.entry(name)
            .and_modify(|existing: &mut String| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    map
}

/// Everything known when an XHR completes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XhrCompletion {
    /// HTTP status; 0 on network failure or abort
    pub status: u16,
    /// HTTP status text
    pub status_text: String,
    /// `getAllResponseHeaders()` text
    pub raw_headers: String,
    /// Response representation
    pub response: ResponseBody,
}

#[derive(Debug, Default)]
struct XhrCall {
    method: String,
    url: String,
    headers: HeaderMap,
}

#[derive(Debug)]
struct SentCall {
    call: XhrCall,
    request_size: u64,
    start_time: f64,
}

/// Per-call XHR metadata tables.
pub struct XhrTracker {
    log: BoundedLog<NetworkEntry>,
    clock: Rc<dyn Clock>,
    base_url: Rc<RefCell<Option<String>>>,
    // Handles are allocated in increasing order, so the first key is the oldest.
    opened: RefCell<BTreeMap<XhrHandle, XhrCall>>,
    sent: RefCell<HashMap<XhrHandle, SentCall>>,
    next_handle: Cell<u64>,
}

impl XhrTracker {
    /// Allocate a handle for a new XHR object.
    pub fn allocate(&self) -> XhrHandle {
        let raw = self.next_handle.get();
        self.next_handle.set(raw + 1);
        XhrHandle(raw)
    }

    /// `open(method, url)`; resets metadata of a re-opened call, sent or not.
    pub fn open(&self, handle: XhrHandle, method: &str, url: &str) {
        let method = if method.is_empty() { "GET" } else { method };
        let url = resolve_url(url, self.base_url.borrow().as_deref());
        self.sent.borrow_mut().remove(&handle);

        let mut opened = self.opened.borrow_mut();
        opened.insert(
            handle,
            XhrCall {
                method: method.to_ascii_uppercase(),
                url,
                ..XhrCall::default()
            },
        );
        while opened.len() > XHR_OPEN_CAPACITY {
            if let Some((dropped, _)) = opened.pop_first() {
                tracing::debug!(handle = dropped.as_u64(), "unsent XHR call dropped");
            }
        }
    }

    /// `setRequestHeader(name, value)`; ignored unless the call is opened
    /// and not yet sent.
    pub fn set_header(&self, handle: XhrHandle, name: &str, value: &str) {
        if let Some(call) = self.opened.borrow_mut().get_mut(&handle) {
            call.headers
                .entry(name.to_ascii_lowercase())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }
    }

    /// `send(body)`; starts the clock and moves the call in flight.
    ///
    /// Returns `false` when the handle has no opened call.
    pub fn send(&self, handle: XhrHandle, body: &BodyShape) -> bool {
        let Some(call) = self.opened.borrow_mut().remove(&handle) else {
            return false;
        };
        let sent = SentCall {
            call,
            request_size: estimate_body_size(body),
            start_time: self.clock.now(),
        };
        self.sent.borrow_mut().insert(handle, sent);
        true
    }

    /// Completion event: removes the call's metadata and records one entry.
    /// Handles with no sent call are ignored.
    pub fn complete(&self, handle: XhrHandle, completion: XhrCompletion) -> Option<u64> {
        let SentCall {
            call,
            request_size,
            start_time,
        } = self.sent.borrow_mut().remove(&handle)?;
        let now = self.clock.now();
        let id = self.log.next_id();
        let entry = NetworkEntry {
            id,
            kind: RequestKind::Xhr,
            method: call.method,
            url: call.url,
            status: completion.status,
            status_text: if completion.status == 0 && completion.status_text.is_empty() {
                NETWORK_ERROR_TEXT.to_string()
            } else {
                completion.status_text
            },
            duration: (now - start_time).max(0.0).round(),
            request_size,
            response_size: estimate_response_size(&completion.response),
            request_headers: call.headers,
            response_headers: parse_raw_headers(&completion.raw_headers),
            start_time,
            timestamp: self.clock.epoch_millis(),
        };
        tracing::trace!(id, status = entry.status, url = %entry.url, "xhr entry captured");
        self.log.push(entry);
        Some(id)
    }

    /// Number of sent calls not yet completed.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.sent.borrow().len()
    }

    /// Number of opened calls not yet sent.
    #[must_use]
    pub fn unsent(&self) -> usize {
        self.opened.borrow().len()
    }
}

impl fmt::Debug for XhrTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XhrTracker")
            .field("unsent", &self.unsent())
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Monitor
// =============================================================================

struct NetworkInner {
    log: BoundedLog<NetworkEntry>,
    clock: Rc<dyn Clock>,
    base_url: Rc<RefCell<Option<String>>>,
    xhr: XhrTracker,
}

/// Network capture state shared by the fetch and XHR interceptors.
#[derive(Clone)]
pub struct NetworkMonitor {
    inner: Rc<NetworkInner>,
}

impl NetworkMonitor {
    /// Create a monitor retaining `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize, clock: Rc<dyn Clock>) -> Self {
        let log = BoundedLog::new(capacity);
        let base_url = Rc::new(RefCell::new(None));
        let xhr = XhrTracker {
            log: log.clone(),
            clock: Rc::clone(&clock),
            base_url: Rc::clone(&base_url),
            opened: RefCell::new(BTreeMap::new()),
            sent: RefCell::new(HashMap::new()),
            next_handle: Cell::new(1),
        };
        Self {
            inner: Rc::new(NetworkInner {
                log,
                clock,
                base_url,
                xhr,
            }),
        }
    }

    /// Set the page URL relative request URLs are resolved against.
    pub fn set_base_url(&self, base: Option<String>) {
        *self.inner.base_url.borrow_mut() = base;
    }

    /// Capture request metadata and the start time of a fetch call.
    pub fn begin_fetch(&self, request: &FetchRequest) -> PendingRequest {
        PendingRequest {
            log: self.inner.log.clone(),
            clock: Rc::clone(&self.inner.clock),
            kind: RequestKind::Fetch,
            method: request.method(),
            url: resolve_url(request.input.url(), self.inner.base_url.borrow().as_deref()),
            request_headers: request.header_map(),
            request_size: estimate_body_size(&request.body),
            start_time: self.inner.clock.now(),
        }
    }

    /// Decorate a fetch call: capture, issue, record, return unchanged.
    ///
    /// Completes as soon as the call does; the body size is left to the
    /// returned [`BodySizing`].
    pub async fn observe_fetch<R, E, F, Fut>(
        &self,
        request: &FetchRequest,
        issue: F,
    ) -> (Result<R, E>, Option<BodySizing>)
    where
        R: ObservedResponse,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let pending = self.begin_fetch(request);
        let result = issue().await;
        pending.settle(result)
    }

    /// The XHR call table.
    #[must_use]
    pub fn xhr(&self) -> &XhrTracker {
        &self.inner.xhr
    }

    /// Ordered copy of captured entries.
    #[must_use]
    pub fn entries(&self) -> Vec<NetworkEntry> {
        self.inner.log.entries()
    }

    /// Remove all entries and notify subscribers.
    pub fn clear(&self) {
        self.inner.log.clear();
    }

    /// Register a change callback.
    pub fn subscribe<F: Fn() + 'static>(&self, callback: F) -> Subscription {
        self.inner.log.subscribe(callback)
    }

    /// The underlying log.
    #[must_use]
    pub fn log(&self) -> &BoundedLog<NetworkEntry> {
        &self.inner.log
    }
}

impl fmt::Debug for NetworkMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkMonitor")
            .field("log", &self.inner.log)
            .field("xhr", &self.inner.xhr)
            .finish()
    }
}

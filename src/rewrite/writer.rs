//! Response sinks and the intercepting writer.
//!
//! # Responsibilities
//! - Define the capability a handler writes a response through
//! - Decorate a host sink so the rewrite pass runs at header commit
//! - Provide a buffered sink for hosts that assemble a full response
//!
//! # Design Decisions
//! - One trait, one decorator: header access and body writes are forwarded
//!   untouched, only `commit` is augmented
//! - The decorator rewrites at most once; later commits go straight to the
//!   host sink, which decides what a second commit means
//! - Body writes before an explicit commit are the host's business

use std::io;

use axum::{
    body::Body,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use bytes::{Bytes, BytesMut};

use crate::rewrite::observer::RewriteObserver;
use crate::rewrite::rule::RuleSet;

/// Where a handler writes its response.
pub trait ResponseSink {
    /// Headers that will be sent on commit.
    fn headers(&self) -> &HeaderMap;

    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Finalize the status line and headers.
    fn commit(&mut self, status: StatusCode);

    /// Append body bytes.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Whether the head has been sent.
    fn is_committed(&self) -> bool;
}

/// Lifecycle of an [`InterceptedResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Headers may still change; the rewrite pass has not run.
    Open,
    /// The rewrite pass ran and the host sink was asked to commit.
    Committed,
}

/// Wraps a host sink for one request and rewrites headers on commit.
pub struct InterceptedResponse<'a, S: ResponseSink + ?Sized> {
    sink: &'a mut S,
    rules: &'a RuleSet,
    observer: &'a dyn RewriteObserver,
    state: WriterState,
}

impl<'a, S: ResponseSink + ?Sized> InterceptedResponse<'a, S> {
    pub fn new(sink: &'a mut S, rules: &'a RuleSet, observer: &'a dyn RewriteObserver) -> Self {
        Self {
            sink,
            rules,
            observer,
            state: WriterState::Open,
        }
    }

    pub fn state(&self) -> WriterState {
        self.state
    }
}

impl<S: ResponseSink + ?Sized> ResponseSink for InterceptedResponse<'_, S> {
    fn headers(&self) -> &HeaderMap {
        self.sink.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.sink.headers_mut()
    }

    fn commit(&mut self, status: StatusCode) {
        if self.state == WriterState::Open {
            self.rules.rewrite(self.sink.headers_mut(), self.observer);
            self.state = WriterState::Committed;
        }
        self.sink.commit(status);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sink.write(buf)
    }

    fn is_committed(&self) -> bool {
        self.sink.is_committed()
    }
}

/// A sink that keeps the whole response in memory.
///
/// The head is snapshotted at commit; header changes made afterwards are not
/// part of the response. Writing body bytes first commits a `200 OK`.
#[derive(Debug, Default)]
pub struct BufferedResponse {
    headers: HeaderMap,
    head: Option<(StatusCode, HeaderMap)>,
    body: BytesMut,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status sent at commit, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.head.as_ref().map(|(status, _)| *status)
    }

    /// Headers as they were at commit, if any.
    pub fn sent_headers(&self) -> Option<&HeaderMap> {
        self.head.as_ref().map(|(_, headers)| headers)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Convert into an axum response. A never-committed response is `200 OK`
    /// with whatever headers were set.
    pub fn into_response(self) -> Response {
        let (status, headers) = self.head.unwrap_or((StatusCode::OK, self.headers));
        let mut response = Response::new(Body::from(Bytes::from(self.body)));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

impl ResponseSink for BufferedResponse {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn commit(&mut self, status: StatusCode) {
        if let Some((sent, _)) = &self.head {
            tracing::debug!(sent = %sent, ignored = %status, "Superfluous commit");
            return;
        }
        self.head = Some((status, self.headers.clone()));
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.head.is_none() {
            self.commit(StatusCode::OK);
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn is_committed(&self) -> bool {
        self.head.is_some()
    }
}

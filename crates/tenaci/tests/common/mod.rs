//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use tenaci::{Body, BoxError, Context, Logger, Request, Response, Transport};
use tokio::time::Instant;

/// One scripted answer from the mock transport.
#[derive(Debug, Clone)]
pub struct Reply {
    status:      u16,
    headers:     Vec<(&'static str, &'static str)>,
    body:        &'static str,
    failure:     Option<&'static str>,
    broken_body: bool,
    delay:       Duration,
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: "",
            failure: None,
            broken_body: false,
            delay: Duration::ZERO,
        }
    }

    pub fn ok(body: &'static str) -> Self { Self::status(200).body(body) }

    /// The transport fails without producing a response.
    pub fn fail(message: &'static str) -> Self {
        Self {
            failure: Some(message),
            ..Self::status(0)
        }
    }

    pub fn header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }

    pub fn body(mut self, body: &'static str) -> Self {
        self.body = body;
        self
    }

    /// Stream `body` and then a read error.
    pub fn broken_body(mut self) -> Self {
        self.broken_body = true;
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        for (name, value) in self.headers {
            headers.append(HeaderName::from_static(name), HeaderValue::from_static(value));
        }

        let chunk = Bytes::from_static(self.body.as_bytes());
        let body = if self.broken_body {
            let chunks: Vec<Result<Bytes, BoxError>> = vec![Ok(chunk), Err("connection reset".into())];
            Body::from_stream(stream::iter(chunks))
        } else {
            Body::from_stream(stream::iter([Ok::<_, BoxError>(chunk)]))
        };

        Response::new(StatusCode::from_u16(self.status).unwrap(), body).with_headers(headers)
    }
}

#[derive(Debug)]
pub struct TransportFailure(&'static str);

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.0) }
}

impl std::error::Error for TransportFailure {}

/// Mock transport that answers from a script, then repeats a fallback reply.
pub struct ScriptedTransport {
    replies:  Mutex<VecDeque<Reply>>,
    fallback: Reply,
    sent:     Mutex<Vec<(Instant, Request)>>,
    calls:    AtomicU32,
}

impl ScriptedTransport {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies:  Mutex::new(replies.into_iter().collect()),
            fallback: Reply::ok("fallback"),
            sent:     Mutex::new(Vec::new()),
            calls:    AtomicU32::new(0),
        }
    }

    pub fn repeating(reply: Reply) -> Self {
        Self {
            fallback: reply,
            ..Self::new([])
        }
    }

    pub fn calls(&self) -> u32 { self.calls.load(Ordering::SeqCst) }

    /// When each attempt started.
    pub fn sent_at(&self) -> Vec<Instant> { self.sent.lock().unwrap().iter().map(|(at, _)| *at).collect() }

    pub fn last_request(&self) -> Option<Request> { self.sent.lock().unwrap().last().map(|(_, r)| r.clone()) }
}

impl Transport for ScriptedTransport {
    type Error = TransportFailure;

    async fn send(&self, request: Request) -> Result<Response, TransportFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push((Instant::now(), request));

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        match reply.failure {
            Some(message) => Err(TransportFailure(message)),
            None => Ok(reply.into_response()),
        }
    }
}

/// Logger that keeps every message with its level and the call's deadline.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    lines: Mutex<Vec<(&'static str, String, Option<Instant>)>>,
}

impl RecordingLogger {
    pub fn lines(&self) -> Vec<(&'static str, String)> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .map(|(level, msg, _)| (*level, msg.clone()))
            .collect()
    }

    /// Deadline of the context each message was logged under.
    pub fn deadlines(&self) -> Vec<Option<Instant>> {
        self.lines.lock().unwrap().iter().map(|(_, _, deadline)| *deadline).collect()
    }

    pub fn contains(&self, level: &str, fragment: &str) -> bool {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .any(|(l, msg, _)| *l == level && msg.contains(fragment))
    }

    fn push(&self, level: &'static str, ctx: &Context, args: fmt::Arguments<'_>) {
        self.lines
            .lock()
            .unwrap()
            .push((level, args.to_string(), ctx.deadline()));
    }
}

impl Logger for RecordingLogger {
    fn info(&self, ctx: &Context, args: fmt::Arguments<'_>) { self.push("info", ctx, args) }

    fn debug(&self, ctx: &Context, args: fmt::Arguments<'_>) { self.push("debug", ctx, args) }

    fn error(&self, ctx: &Context, args: fmt::Arguments<'_>) { self.push("error", ctx, args) }
}

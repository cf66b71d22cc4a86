//! Per-connection request pipeline.
//!
//! `ReadRequestLine → ParseHeaders → ReadBody → Authenticate → Resolve → Dispatch → Flush`, then
//! loop while the connection is keep-alive.
//!
//! | Failure | Outcome |
//! |---|---|
//! | peer closed / read timeout before a request | close silently |
//! | framing error (414, 431, 400, 505, 413) | error page, close |
//! | other protocol error (400, 404, 501) | error page, keep going |
//! | fatal error (handler, transform, unknown action, socket) | log, close without a response |
//!
//! An event-stream reply takes the connection over until a write to the subscriber fails.

use super::request::{read_body, read_head, RequestHead, RequestLimits};
use super::response::{write_event_stream_head, Response};
use crate::config::ServerConfig;
use crate::dispatcher::{decode_json, dispatch, DispatchRequest, Reply};
use crate::error::WebError;
use crate::ids::ConnectionId;
use crate::object::StatefulObject;
use crate::path::{normalize_path, parse_query, split_target};
use crate::router::RouteTable;
use crate::security::Authenticator;
use http::{Method, StatusCode};
use std::io::{BufReader, Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Everything a connection shares with its siblings; read-only after startup.
pub(crate) struct Service {
    pub routes: RouteTable,
    pub authenticator: Option<Arc<dyn Authenticator>>,
    pub config: ServerConfig,
    pub limits: RequestLimits,
}

impl Service {
    pub fn new(
        routes: RouteTable,
        authenticator: Option<Arc<dyn Authenticator>>,
        config: ServerConfig,
    ) -> Self {
        let limits = RequestLimits::from(&config);
        Self {
            routes,
            authenticator,
            config,
            limits,
        }
    }
}

enum Next {
    KeepAlive,
    Close,
}

pub(crate) struct Connection<S> {
    reader: BufReader<S>,
    service: Arc<Service>,
    id: ConnectionId,
    peer: Option<SocketAddr>,
}

impl<S: Read + Write> Connection<S> {
    pub fn new(stream: S, service: Arc<Service>, peer: Option<SocketAddr>) -> Self {
        Self {
            reader: BufReader::new(stream),
            service,
            id: ConnectionId::new(),
            peer,
        }
    }

    /// Serve requests until the connection closes.
    pub fn run(mut self) {
        debug!(conn = %self.id, peer = ?self.peer, "Connection opened");
        let mut requests = 0u64;
        loop {
            match self.serve_one() {
                Next::KeepAlive => requests += 1,
                Next::Close => break,
            }
        }
        debug!(conn = %self.id, peer = ?self.peer, requests, "Connection closed");
    }

    fn serve_one(&mut self) -> Next {
        let head = match read_head(&mut self.reader, &self.service.limits) {
            Ok(Some(head)) => head,
            Ok(None) => return Next::Close,
            Err(WebError::Io(e)) => {
                debug!(conn = %self.id, peer = ?self.peer, error = %e, "Connection read ended");
                return Next::Close;
            }
            Err(err) => {
                // Nothing after a framing error can be trusted as a request boundary.
                if let Some(status) = err.status() {
                    warn!(conn = %self.id, peer = ?self.peer, status = status.as_u16(), error = %err, "Rejected request");
                    self.write(&Response::error_page(status), false);
                }
                return Next::Close;
            }
        };

        let start = Instant::now();
        let keep_alive = head.keep_alive();
        match self.handle(&head) {
            Ok(Reply::Response(response)) => {
                self.log_completed(&head, response.status(), start);
                if self.write(&response, keep_alive) && keep_alive {
                    Next::KeepAlive
                } else {
                    Next::Close
                }
            }
            Ok(Reply::Events(object)) => {
                self.stream_events(&head, &object);
                Next::Close
            }
            Err(err) => match err.status() {
                Some(status) => {
                    let keep = keep_alive && !err.closes_connection();
                    self.log_completed(&head, status, start);
                    debug!(conn = %self.id, peer = ?self.peer, error = %err, "Request rejected");
                    if self.write(&Response::error_page(status), keep) && keep {
                        Next::KeepAlive
                    } else {
                        Next::Close
                    }
                }
                None => {
                    error!(
                        conn = %self.id,
                        peer = ?self.peer,
                        method = %head.method,
                        target = %head.target,
                        duration_us = start.elapsed().as_micros(),
                        error = %err,
                        "Request failed, closing connection"
                    );
                    Next::Close
                }
            },
        }
    }

    fn handle(&mut self, head: &RequestHead) -> Result<Reply, WebError> {
        let body = match head.content_length()? {
            Some(length) => read_body(&mut self.reader, length, &self.service.limits)?,
            None => Vec::new(),
        };

        let account = self
            .service
            .authenticator
            .as_ref()
            .and_then(|auth| auth.authenticate(head.authorization()));

        let (raw_path, query) = split_target(&head.target);
        let path = normalize_path(raw_path)?;
        let resolved = self.service.routes.resolve(&path, &head.method)?;

        // POST bodies are decoded up front, whatever the target.
        let json = if head.method == Method::POST {
            Some(decode_json(&body)?)
        } else {
            None
        };
        let query = parse_query(query);
        let request = DispatchRequest {
            method: &head.method,
            path: &path,
            query: &query,
            body: &body,
            json: json.as_ref(),
            account: account.as_ref(),
        };
        dispatch(&request, resolved)
    }

    fn stream_events(&mut self, head: &RequestHead, object: &StatefulObject) {
        let stream = self.reader.get_mut();
        if let Err(e) = write_event_stream_head(stream) {
            debug!(conn = %self.id, peer = ?self.peer, error = %e, "Event stream head not delivered");
            return;
        }
        info!(
            conn = %self.id,
            peer = ?self.peer,
            target = %head.target,
            object = %object.name(),
            "Event subscriber connected"
        );
        let end = object.subscribe(stream, self.service.config.event_keepalive());
        info!(
            conn = %self.id,
            peer = ?self.peer,
            object = %object.name(),
            events_sent = end.events_sent,
            reason = %end.cause,
            "Event subscriber disconnected"
        );
    }

    /// Write a response; `false` if the peer is gone.
    fn write(&mut self, response: &Response, keep_alive: bool) -> bool {
        match response.write_to(self.reader.get_mut(), keep_alive) {
            Ok(()) => true,
            Err(e) => {
                debug!(conn = %self.id, peer = ?self.peer, error = %e, "Response not delivered");
                false
            }
        }
    }

    fn log_completed(&self, head: &RequestHead, status: StatusCode, start: Instant) {
        let duration_us = start.elapsed().as_micros();
        if status.as_u16() < 400 {
            info!(
                conn = %self.id,
                peer = ?self.peer,
                method = %head.method,
                target = %head.target,
                status = status.as_u16(),
                duration_us,
                "Request completed"
            );
        } else {
            warn!(
                conn = %self.id,
                peer = ?self.peer,
                method = %head.method,
                target = %head.target,
                status = status.as_u16(),
                duration_us,
                "Request completed"
            );
        }
    }
}

//! JSON endpoints.
//!
//! An [`Endpoint`] binds one HTTP method to a callback receiving the route's positional captures.
//! The number of captures is fixed at construction (`arity`) and checked against the route's
//! pattern when the route is built, so a mismatch is a configuration error rather than a
//! request-time surprise.
//!
//! | Constructor | Method | Success response |
//! |---|---|---|
//! | [`Endpoint::get`] | GET | `200` + JSON of the returned value |
//! | [`Endpoint::post`] | POST | returned status + JSON of the returned value |
//! | [`Endpoint::put`] | PUT | returned status (default `201`), empty body |

use crate::security::Account;
use http::{Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;

/// Everything an endpoint callback gets to see about its request.
#[derive(Debug, Clone, Copy)]
pub struct Call<'a> {
    /// Positional regex captures, in group order.
    pub captures: &'a [String],
    /// Decoded query string pairs, in request order.
    pub query: &'a [(String, String)],
    /// Decoded JSON body; `None` for bodiless methods or an empty PUT body.
    pub body: Option<&'a Value>,
    pub account: Option<&'a Account>,
}

impl<'a> Call<'a> {
    #[must_use]
    pub fn capture(&self, index: usize) -> Option<&'a str> {
        self.captures.get(index).map(String::as_str)
    }

    /// First query value for `name`.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&'a str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

pub type GetFn = dyn Fn(&Call<'_>) -> anyhow::Result<Value> + Send + Sync;
pub type PostFn = dyn Fn(&Call<'_>) -> anyhow::Result<(StatusCode, Value)> + Send + Sync;
pub type PutFn = dyn Fn(&Call<'_>) -> anyhow::Result<Option<StatusCode>> + Send + Sync;

#[derive(Clone)]
pub enum EndpointHandler {
    Get(Arc<GetFn>),
    Post(Arc<PostFn>),
    Put(Arc<PutFn>),
}

/// A method-bound JSON callback with a fixed capture arity.
#[derive(Clone)]
pub struct Endpoint {
    handler: EndpointHandler,
    arity: usize,
}

impl Endpoint {
    /// GET endpoint answering `200` with the returned value as JSON.
    ///
    /// ```rust
    /// use webobj::content::Endpoint;
    /// use serde_json::json;
    ///
    /// let square = Endpoint::get(1, |call| {
    ///     let n: i64 = call.capture(0).unwrap_or("0").parse()?;
    ///     Ok(json!(n * n))
    /// });
    /// assert_eq!(square.arity(), 1);
    /// ```
    pub fn get<F>(arity: usize, f: F) -> Self
    where
        F: Fn(&Call<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            handler: EndpointHandler::Get(Arc::new(f)),
            arity,
        }
    }

    /// POST endpoint; the callback picks the status.
    pub fn post<F>(arity: usize, f: F) -> Self
    where
        F: Fn(&Call<'_>) -> anyhow::Result<(StatusCode, Value)> + Send + Sync + 'static,
    {
        Self {
            handler: EndpointHandler::Post(Arc::new(f)),
            arity,
        }
    }

    /// PUT endpoint; `Ok(None)` answers `201 Created`.
    pub fn put<F>(arity: usize, f: F) -> Self
    where
        F: Fn(&Call<'_>) -> anyhow::Result<Option<StatusCode>> + Send + Sync + 'static,
    {
        Self {
            handler: EndpointHandler::Put(Arc::new(f)),
            arity,
        }
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// The single method this endpoint answers.
    #[must_use]
    pub fn method(&self) -> Method {
        match self.handler {
            EndpointHandler::Get(_) => Method::GET,
            EndpointHandler::Post(_) => Method::POST,
            EndpointHandler::Put(_) => Method::PUT,
        }
    }

    #[must_use]
    pub fn handler(&self) -> &EndpointHandler {
        &self.handler
    }
}

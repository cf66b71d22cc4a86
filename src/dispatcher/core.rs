use crate::content::{Call, ContentVariant, Endpoint, EndpointHandler};
use crate::error::WebError;
use crate::object::{ActionCall, ActionOutcome, ActionRequest, HookCall, StatefulObject};
use crate::router::Resolved;
use crate::security::Account;
use crate::server::Response;
use http::header::{HeaderValue, LOCATION};
use http::{Method, StatusCode};
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::debug;

/// What the dispatcher needs to know about one request.
#[derive(Debug, Clone, Copy)]
pub struct DispatchRequest<'a> {
    pub method: &'a Method,
    /// Normalized path.
    pub path: &'a str,
    pub query: &'a [(String, String)],
    pub body: &'a [u8],
    /// Body already decoded by the pipeline, if it did so.
    pub json: Option<&'a Value>,
    pub account: Option<&'a Account>,
}

/// Outcome of dispatch.
#[derive(Debug)]
pub enum Reply {
    /// A complete response.
    Response(Response),
    /// Hand the connection over to this object's event stream.
    Events(Arc<StatefulObject>),
}

/// Decode a request body as JSON.
///
/// # Errors
///
/// [`WebError::MalformedBody`] for anything that is not one JSON document.
pub fn decode_json(body: &[u8]) -> Result<Value, WebError> {
    serde_json::from_slice(body).map_err(|e| WebError::MalformedBody(e.to_string()))
}

/// Produce the reply for a resolved request.
///
/// # Errors
///
/// Protocol errors (`UnsupportedMethod`, `MalformedBody`) for client mistakes; fatal errors
/// (`Handler`, `TransformFailed`, `ActionNotFound`, `CaptureArity`, `Io`) for failures inside
/// the content itself, panics included.
pub fn dispatch(req: &DispatchRequest<'_>, resolved: Resolved) -> Result<Reply, WebError> {
    debug!(
        method = %req.method,
        path = %req.path,
        content = resolved.content.kind(),
        "Dispatching"
    );
    panic::catch_unwind(AssertUnwindSafe(|| dispatch_inner(req, resolved))).unwrap_or_else(
        |payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            Err(WebError::Handler(anyhow::anyhow!(
                "handler panicked: {message}"
            )))
        },
    )
}

fn dispatch_inner(req: &DispatchRequest<'_>, resolved: Resolved) -> Result<Reply, WebError> {
    let Resolved { content, captures } = resolved;
    let response = match content {
        ContentVariant::StaticBytes { data, content_type } => {
            get_only(req)?;
            Response::bytes(data.to_vec(), content_type.as_deref())
        }
        ContentVariant::StaticFile(file) => {
            get_only(req)?;
            Response::bytes(file.read()?, file.content_type())
        }
        ContentVariant::Transform(transform) => {
            get_only(req)?;
            let body = transform
                .run()
                .map_err(|error| WebError::TransformFailed {
                    id: transform.id().to_string(),
                    source_path: transform.source().display().to_string(),
                    error,
                })?;
            Response::bytes(body, transform.content_type())
        }
        ContentVariant::Computed {
            producer,
            content_type,
        } => {
            get_only(req)?;
            Response::bytes(producer().map_err(WebError::Handler)?, content_type.as_deref())
        }
        ContentVariant::Endpoint(endpoint) => call_endpoint(req, &endpoint, &captures)?,
        ContentVariant::Object(object) => object_request(req, &object)?,
        ContentVariant::Events(object) => {
            get_only(req)?;
            return Ok(Reply::Events(object));
        }
        // Nested resolvers only produce content; they have nothing to serve themselves.
        ContentVariant::Directory(_) | ContentVariant::Mount(_) => {
            return Err(WebError::unsupported(req.method))
        }
    };
    Ok(Reply::Response(response))
}

fn get_only(req: &DispatchRequest<'_>) -> Result<(), WebError> {
    if *req.method == Method::GET {
        Ok(())
    } else {
        Err(WebError::unsupported(req.method))
    }
}

/// The pipeline's pre-decoded body, or a fresh decode.
fn json_body(req: &DispatchRequest<'_>) -> Result<Value, WebError> {
    match req.json {
        Some(v) => Ok(v.clone()),
        None => decode_json(req.body),
    }
}

fn call_endpoint(
    req: &DispatchRequest<'_>,
    endpoint: &Endpoint,
    captures: &[String],
) -> Result<Response, WebError> {
    if *req.method != endpoint.method() {
        return Err(WebError::unsupported(req.method));
    }
    if captures.len() != endpoint.arity() {
        return Err(WebError::CaptureArity {
            expected: endpoint.arity(),
            actual: captures.len(),
        });
    }
    let body = match endpoint.handler() {
        EndpointHandler::Get(_) => None,
        EndpointHandler::Post(_) => Some(json_body(req)?),
        EndpointHandler::Put(_) if req.body.is_empty() => None,
        EndpointHandler::Put(_) => Some(json_body(req)?),
    };
    let call = Call {
        captures,
        query: req.query,
        body: body.as_ref(),
        account: req.account,
    };
    let response = match endpoint.handler() {
        EndpointHandler::Get(f) => Response::json(StatusCode::OK, &f(&call).map_err(WebError::Handler)?),
        EndpointHandler::Post(f) => {
            let (status, value) = f(&call).map_err(WebError::Handler)?;
            Response::json(status, &value)
        }
        EndpointHandler::Put(f) => {
            let status = f(&call).map_err(WebError::Handler)?;
            Response::new(status.unwrap_or(StatusCode::CREATED))
        }
    };
    Ok(response)
}

fn object_request(req: &DispatchRequest<'_>, object: &StatefulObject) -> Result<Response, WebError> {
    let hook = HookCall {
        body: req.body,
        account: req.account,
    };
    match *req.method {
        Method::GET => Ok(Response::json(
            StatusCode::OK,
            &Value::Object(object.snapshot()),
        )),
        Method::POST => {
            let request: ActionRequest = serde_json::from_value(json_body(req)?)
                .map_err(|e| WebError::MalformedBody(e.to_string()))?;
            let call = ActionCall {
                args: &request.args,
                account: req.account,
            };
            match object.invoke(&request.action, &call)? {
                ActionOutcome::Value(value) => Ok(Response::json(StatusCode::OK, &value)),
                ActionOutcome::Created(id) => {
                    let location = location(req.path, &id);
                    let value = HeaderValue::from_str(&location).map_err(|e| {
                        WebError::Handler(anyhow::anyhow!("invalid Location {location:?}: {e}"))
                    })?;
                    Ok(Response::new(StatusCode::CREATED).with_header(LOCATION, value))
                }
            }
        }
        Method::PUT => {
            object.put(&hook)?;
            Ok(Response::new(StatusCode::OK))
        }
        Method::DELETE => {
            object.delete(&hook)?;
            Ok(Response::new(StatusCode::OK))
        }
        _ => Err(WebError::unsupported(req.method)),
    }
}

/// `path/id`, percent-encoded segment by segment.
fn location(path: &str, id: &str) -> String {
    let mut out = String::with_capacity(path.len() + id.len() + 1);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(&urlencoding::encode(segment));
    }
    out.push('/');
    out.push_str(&urlencoding::encode(id));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ExternalTransform;
    use serde_json::json;
    use std::path::Path;

    fn req<'a>(method: &'a Method, path: &'a str, body: &'a [u8]) -> DispatchRequest<'a> {
        DispatchRequest {
            method,
            path,
            query: &[],
            body,
            json: None,
            account: None,
        }
    }

    fn resolved(content: impl Into<ContentVariant>, captures: &[&str]) -> Resolved {
        Resolved {
            content: content.into(),
            captures: captures.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    fn response(reply: Reply) -> Response {
        match reply {
            Reply::Response(r) => r,
            Reply::Events(_) => panic!("expected a response"),
        }
    }

    #[test]
    fn test_static_bytes_get_and_other_methods() {
        let r = response(
            dispatch(
                &req(&Method::GET, "/", b""),
                resolved(ContentVariant::bytes("<html>Hello, Flub</html>"), &[]),
            )
            .unwrap(),
        );
        assert_eq!(r.status(), StatusCode::OK);
        assert_eq!(r.body(), b"<html>Hello, Flub</html>");
        assert!(r.headers().get(http::header::CONTENT_TYPE).is_none());

        let err = dispatch(
            &req(&Method::DELETE, "/", b""),
            resolved(ContentVariant::bytes("x"), &[]),
        )
        .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::NOT_IMPLEMENTED));
    }

    #[test]
    fn test_get_endpoint_wraps_value_as_json() {
        let ep = Endpoint::get(1, |c| Ok(json!({ "id": c.capture(0) })));
        let r = response(
            dispatch(&req(&Method::GET, "/items/42/json_get", b""), resolved(ep, &["42"])).unwrap(),
        );
        assert_eq!(r.status(), StatusCode::OK);
        assert_eq!(r.body(), br#"{"id":"42"}"#);
    }

    #[test]
    fn test_capture_arity_mismatch_is_fatal() {
        let ep = Endpoint::get(1, |_| Ok(json!(null)));
        let err = dispatch(&req(&Method::GET, "/x", b""), resolved(ep, &[])).unwrap_err();
        assert!(matches!(err, WebError::CaptureArity { expected: 1, actual: 0 }));
        assert!(err.closes_connection());
    }

    #[test]
    fn test_post_and_put_endpoints() {
        let post = Endpoint::post(0, |c| {
            Ok((StatusCode::ACCEPTED, json!({ "echo": c.body.cloned() })))
        });
        let r = response(
            dispatch(&req(&Method::POST, "/p", br#"{"a":1}"#), resolved(post.clone(), &[])).unwrap(),
        );
        assert_eq!(r.status(), StatusCode::ACCEPTED);
        assert_eq!(r.body(), br#"{"echo":{"a":1}}"#);

        let err = dispatch(&req(&Method::POST, "/p", b"{"), resolved(post, &[])).unwrap_err();
        assert!(matches!(err, WebError::MalformedBody(_)));

        let put = Endpoint::put(0, |c| Ok(c.body.map(|_| StatusCode::OK)));
        let r = response(dispatch(&req(&Method::PUT, "/p", b""), resolved(put.clone(), &[])).unwrap());
        assert_eq!(r.status(), StatusCode::CREATED);
        assert!(r.body().is_empty());
        let r = response(dispatch(&req(&Method::PUT, "/p", b"[]"), resolved(put, &[])).unwrap());
        assert_eq!(r.status(), StatusCode::OK);
    }

    fn flub() -> Arc<StatefulObject> {
        StatefulObject::builder("flub")
            .broadcast_field("count", json!(0))
            .action("increment", |_obj, _call| Ok(ActionOutcome::created("42")))
            .action("fail", |_obj, _call| anyhow::bail!("nope"))
            .build()
    }

    #[test]
    fn test_created_action_sets_location() {
        let body = br#"{"action":"increment","args":{}}"#;
        let r = response(dispatch(&req(&Method::POST, "/flub", body), resolved(flub(), &[])).unwrap());
        assert_eq!(r.status(), StatusCode::CREATED);
        assert_eq!(r.headers()[LOCATION], "/flub/42");
        assert!(r.body().is_empty());
    }

    #[test]
    fn test_action_protocol_errors() {
        let missing = br#"{"args":{}}"#;
        assert!(matches!(
            dispatch(&req(&Method::POST, "/flub", missing), resolved(flub(), &[])),
            Err(WebError::MalformedBody(_))
        ));
        let unknown = br#"{"action":"explode"}"#;
        assert!(matches!(
            dispatch(&req(&Method::POST, "/flub", unknown), resolved(flub(), &[])),
            Err(WebError::ActionNotFound { .. })
        ));
        let failing = br#"{"action":"fail"}"#;
        assert!(matches!(
            dispatch(&req(&Method::POST, "/flub", failing), resolved(flub(), &[])),
            Err(WebError::Handler(_))
        ));
    }

    #[test]
    fn test_object_get_and_events() {
        let r = response(dispatch(&req(&Method::GET, "/flub", b""), resolved(flub(), &[])).unwrap());
        assert_eq!(r.body(), br#"{"count":0}"#);

        let events = Resolved {
            content: ContentVariant::Events(flub()),
            captures: Vec::new(),
        };
        assert!(matches!(
            dispatch(&req(&Method::GET, "/flub+events", b""), events).unwrap(),
            Reply::Events(_)
        ));
    }

    #[test]
    fn test_transform_failure_is_fatal() {
        let t = ExternalTransform::new("/srv/app.jsx", "babel", |_: &Path| -> anyhow::Result<Vec<u8>> {
            anyhow::bail!("syntax error")
        });
        let err = dispatch(&req(&Method::GET, "/app.js", b""), resolved(t, &[])).unwrap_err();
        assert!(matches!(err, WebError::TransformFailed { ref id, .. } if id == "babel"));
        assert!(err.status().is_none());
    }

    #[test]
    fn test_panicking_callback_becomes_handler_error() {
        let c = ContentVariant::computed(None, || panic!("kaboom"));
        let err = dispatch(&req(&Method::GET, "/c", b""), resolved(c, &[])).unwrap_err();
        assert!(err.to_string().contains("kaboom"));
    }

    #[test]
    fn test_location_encodes_segments() {
        assert_eq!(location("/flub", "42"), "/flub/42");
        assert_eq!(location("/a b", "x/y"), "/a%20b/x%2Fy");
        assert_eq!(location("/", "1"), "/1");
    }
}

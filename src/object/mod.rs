//! # Stateful Objects
//!
//! A [`StatefulObject`] is a named bag of JSON fields plus a table of named actions, mounted under
//! a route prefix. Mounted at `P` it answers:
//!
//! | Request | Effect |
//! |---|---|
//! | `GET P` | `200` with every field as one JSON object |
//! | `POST P` `{"action": name, "args": {..}}` | run the action; `200` + JSON result, or `201` + `Location` |
//! | `PUT P` / `DELETE P` | the object's `on_put` / `on_delete` hook, `501` without one |
//! | `GET P+events` | a live `text/event-stream` of the broadcast fields |
//!
//! ## Fields
//!
//! The field set is fixed when the object is built. *Broadcast* fields live in the object's
//! [`EventChannel`] and every write to them notifies subscribers; plain fields sit behind an
//! ordinary lock and never notify. Unknown names are a [`FieldError`], never a silent insert.
//!
//! [`StatefulObject::update`] and [`StatefulObject::mutate`] run the read-modify-write inside the
//! channel lock, so concurrent increments are never lost and subscribers only ever see whole
//! updates.
//!
//! ## Example
//!
//! ```rust
//! use webobj::object::{ActionOutcome, StatefulObject};
//! use serde_json::json;
//!
//! let counter = StatefulObject::builder("counter")
//!     .broadcast_field("count", json!(0))
//!     .action("add", |obj, call| {
//!         let by: i64 = call.arg("by")?;
//!         let now = obj.update("count", |v| json!(v.as_i64().unwrap_or(0) + by))?;
//!         Ok(ActionOutcome::Value(now))
//!     })
//!     .build();
//!
//! assert_eq!(counter.get("count").unwrap(), json!(0));
//! ```


use crate::error::{FieldError, WebError};
use crate::security::Account;
use crate::sse::{EventChannel, SubscriptionEnd};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Action callback: receives the object and the call.
pub type ActionFn =
    dyn Fn(&StatefulObject, &ActionCall<'_>) -> anyhow::Result<ActionOutcome> + Send + Sync;

/// PUT/DELETE hook.
pub type HookFn = dyn Fn(&StatefulObject, &HookCall<'_>) -> anyhow::Result<()> + Send + Sync;

/// Result of a successful action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// Answered `200` with the value as JSON.
    Value(Value),
    /// Answered `201` with `Location: <path>/<id>` and no body.
    Created(String),
}

impl ActionOutcome {
    pub fn created(id: impl fmt::Display) -> Self {
        ActionOutcome::Created(id.to_string())
    }
}

impl From<Value> for ActionOutcome {
    fn from(value: Value) -> Self {
        ActionOutcome::Value(value)
    }
}

/// Body of a POST to an object.
#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub action: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

/// Arguments and caller identity for one action invocation.
#[derive(Debug, Clone, Copy)]
pub struct ActionCall<'a> {
    pub args: &'a Map<String, Value>,
    pub account: Option<&'a Account>,
}

impl ActionCall<'_> {
    /// Required keyword argument.
    ///
    /// # Errors
    ///
    /// Fails if the argument is missing or does not deserialize into `T`.
    pub fn arg<T: DeserializeOwned>(&self, name: &str) -> anyhow::Result<T> {
        self.opt_arg(name)?
            .ok_or_else(|| anyhow::anyhow!("missing argument `{name}`"))
    }

    /// Optional keyword argument; absent and `null` both give `None`.
    ///
    /// # Errors
    ///
    /// Fails if the argument is present but does not deserialize into `T`.
    pub fn opt_arg<T: DeserializeOwned>(&self, name: &str) -> anyhow::Result<Option<T>> {
        match self.args.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => serde_json::from_value(v.clone())
                .map(Some)
                .map_err(|e| anyhow::anyhow!("argument `{name}`: {e}")),
        }
    }
}

/// Raw body and caller identity for a PUT or DELETE hook.
#[derive(Debug, Clone, Copy)]
pub struct HookCall<'a> {
    pub body: &'a [u8],
    pub account: Option<&'a Account>,
}

/// Writable view of the broadcast fields inside [`StatefulObject::mutate`].
pub struct FieldSet<'a> {
    object: &'a str,
    fields: &'a mut Map<String, Value>,
}

impl FieldSet<'_> {
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Overwrite an existing broadcast field.
    ///
    /// # Errors
    ///
    /// [`FieldError::UnknownField`] if `field` is not a broadcast field of this object.
    pub fn set(&mut self, field: &str, value: Value) -> Result<(), FieldError> {
        match self.fields.get_mut(field) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(unknown(self.object, field)),
        }
    }
}

fn unknown(object: &str, field: &str) -> FieldError {
    FieldError::UnknownField {
        object: object.to_string(),
        field: field.to_string(),
    }
}

/// A mounted stateful resource.
pub struct StatefulObject {
    name: String,
    channel: EventChannel,
    plain: RwLock<Map<String, Value>>,
    actions: HashMap<String, Arc<ActionFn>>,
    on_put: Option<Arc<HookFn>>,
    on_delete: Option<Arc<HookFn>>,
}

impl StatefulObject {
    pub fn builder(name: impl Into<String>) -> ObjectBuilder {
        ObjectBuilder {
            name: name.into(),
            broadcast: Map::new(),
            plain: Map::new(),
            actions: HashMap::new(),
            on_put: None,
            on_delete: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_broadcast(&self, field: &str) -> bool {
        self.channel.read(|f| f.contains_key(field))
    }

    /// Current value of a field.
    ///
    /// # Errors
    ///
    /// [`FieldError::UnknownField`] for names the object was not built with.
    pub fn get(&self, field: &str) -> Result<Value, FieldError> {
        if let Some(v) = self.channel.read(|f| f.get(field).cloned()) {
            return Ok(v);
        }
        self.plain
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(field)
            .cloned()
            .ok_or_else(|| unknown(&self.name, field))
    }

    /// Overwrite a field; broadcast fields notify subscribers.
    ///
    /// # Errors
    ///
    /// [`FieldError::UnknownField`] for names the object was not built with.
    pub fn set(&self, field: &str, value: Value) -> Result<(), FieldError> {
        self.update(field, move |_| value).map(drop)
    }

    /// Atomically replace a field with `f(current)` and return the new value.
    ///
    /// # Errors
    ///
    /// [`FieldError::UnknownField`] for names the object was not built with.
    pub fn update(&self, field: &str, f: impl FnOnce(&Value) -> Value) -> Result<Value, FieldError> {
        if self.is_broadcast(field) {
            return self.mutate(|fields| {
                let next = f(fields.get(field).unwrap_or(&Value::Null));
                fields.set(field, next.clone())?;
                Ok(next)
            });
        }
        let mut plain = self.plain.write().unwrap_or_else(PoisonError::into_inner);
        let slot = plain
            .get_mut(field)
            .ok_or_else(|| unknown(&self.name, field))?;
        *slot = f(slot);
        Ok(slot.clone())
    }

    /// Run several broadcast-field writes as one update: subscribers wake once and never see a
    /// partial result. A batch that fails leaves every field as it was and wakes nobody.
    ///
    /// # Errors
    ///
    /// Whatever `f` returns, typically [`FieldError::UnknownField`].
    pub fn mutate<R>(
        &self,
        f: impl FnOnce(&mut FieldSet<'_>) -> Result<R, FieldError>,
    ) -> Result<R, FieldError> {
        self.channel.try_mutate(|fields| {
            let mut set = FieldSet {
                object: &self.name,
                fields,
            };
            f(&mut set)
        })
    }

    /// Every field, broadcast and plain.
    #[must_use]
    pub fn snapshot(&self) -> Map<String, Value> {
        let mut all = self.channel.snapshot();
        let plain = self.plain.read().unwrap_or_else(PoisonError::into_inner);
        for (k, v) in plain.iter() {
            all.insert(k.clone(), v.clone());
        }
        all
    }

    /// Only the broadcast fields, as streamed to subscribers.
    #[must_use]
    pub fn broadcast_snapshot(&self) -> Map<String, Value> {
        self.channel.snapshot()
    }

    #[must_use]
    pub fn action_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run the named action.
    ///
    /// # Errors
    ///
    /// - [`WebError::ActionNotFound`] for an unregistered name
    /// - [`WebError::Handler`] if the action itself fails
    pub fn invoke(&self, action: &str, call: &ActionCall<'_>) -> Result<ActionOutcome, WebError> {
        let f = self
            .actions
            .get(action)
            .ok_or_else(|| WebError::ActionNotFound {
                object: self.name.clone(),
                action: action.to_string(),
            })?;
        f(self, call).map_err(WebError::Handler)
    }

    /// Run the PUT hook.
    ///
    /// # Errors
    ///
    /// [`WebError::UnsupportedMethod`] without a hook, [`WebError::Handler`] if it fails.
    pub fn put(&self, call: &HookCall<'_>) -> Result<(), WebError> {
        let hook = self
            .on_put
            .as_ref()
            .ok_or_else(|| WebError::unsupported(&http::Method::PUT))?;
        hook(self, call).map_err(WebError::Handler)
    }

    /// Run the DELETE hook.
    ///
    /// # Errors
    ///
    /// [`WebError::UnsupportedMethod`] without a hook, [`WebError::Handler`] if it fails.
    pub fn delete(&self, call: &HookCall<'_>) -> Result<(), WebError> {
        let hook = self
            .on_delete
            .as_ref()
            .ok_or_else(|| WebError::unsupported(&http::Method::DELETE))?;
        hook(self, call).map_err(WebError::Handler)
    }

    /// Stream broadcast fields to `out` until a write fails. See [`EventChannel::subscribe`].
    pub fn subscribe<W: Write>(&self, out: &mut W, keepalive: Option<Duration>) -> SubscriptionEnd {
        self.channel.subscribe(out, keepalive)
    }
}

impl fmt::Debug for StatefulObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatefulObject")
            .field("name", &self.name)
            .field("actions", &self.action_names())
            .finish_non_exhaustive()
    }
}

/// Builder for [`StatefulObject`]; the field set is fixed by [`ObjectBuilder::build`].
pub struct ObjectBuilder {
    name: String,
    broadcast: Map<String, Value>,
    plain: Map<String, Value>,
    actions: HashMap<String, Arc<ActionFn>>,
    on_put: Option<Arc<HookFn>>,
    on_delete: Option<Arc<HookFn>>,
}

impl ObjectBuilder {
    /// Field whose writes are streamed to subscribers.
    #[must_use]
    pub fn broadcast_field(mut self, name: impl Into<String>, initial: Value) -> Self {
        let name = name.into();
        self.plain.remove(&name);
        self.broadcast.insert(name, initial);
        self
    }

    /// Field that is readable over GET but never streamed.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, initial: Value) -> Self {
        let name = name.into();
        self.broadcast.remove(&name);
        self.plain.insert(name, initial);
        self
    }

    #[must_use]
    pub fn action<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&StatefulObject, &ActionCall<'_>) -> anyhow::Result<ActionOutcome>
            + Send
            + Sync
            + 'static,
    {
        self.actions.insert(name.into(), Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_put<F>(mut self, f: F) -> Self
    where
        F: Fn(&StatefulObject, &HookCall<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_put = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_delete<F>(mut self, f: F) -> Self
    where
        F: Fn(&StatefulObject, &HookCall<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_delete = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn build(self) -> Arc<StatefulObject> {
        Arc::new(StatefulObject {
            name: self.name,
            channel: EventChannel::new(self.broadcast),
            plain: RwLock::new(self.plain),
            actions: self.actions,
            on_put: self.on_put,
            on_delete: self.on_delete,
        })
    }
}

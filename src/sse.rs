//! # Server-Sent Events (SSE) Module
//!
//! Every [`StatefulObject`](crate::object::StatefulObject) owns one [`EventChannel`]: the guarded
//! set of its broadcast fields plus a condition variable that wakes subscribers when the set
//! changes.
//!
//! ## Consistency
//!
//! Mutation and snapshotting share one lock, so a subscriber never observes a half-applied
//! update. A mutation takes the lock, applies its writes, bumps the channel's generation counter,
//! notifies every waiter and releases. A subscriber serializes the fields under the lock and
//! releases it before writing, so a slow peer never stalls mutators. It then re-takes the lock and
//! waits on the condition variable until the generation moves past the one it sent.
//!
//! Several mutations landing while a subscriber is writing or asleep coalesce into a single frame
//! carrying the latest state. Subscribers see every *state they wake up to*, not every
//! intermediate write.
//!
//! ## Wire Format
//!
//! ```text
//! data: {"count":3}
//!
//! :
//!
//! ```
//!
//! Each state is one `data:` line holding the JSON object of broadcast fields, followed by a
//! blank line. An idle stream gets a `:` comment frame every keepalive interval; a failed write of
//! either kind ends the subscription.
//!
//! ## Runtime
//!
//! The lock and condition variable are `may::sync` primitives, so a parked subscriber yields its
//! coroutine instead of pinning a worker thread.

use may::sync::{Condvar, Mutex, MutexGuard};
use serde_json::{Map, Value};
use std::io::{self, Write};
use std::time::Duration;

/// Keepalive comment frame.
pub const KEEPALIVE_FRAME: &[u8] = b":\n\n";

/// Format one `data:` frame.
#[must_use]
pub fn format_event(payload: &str) -> String {
    let mut out = String::with_capacity(payload.len() + 8);
    out.push_str("data: ");
    out.push_str(payload);
    out.push_str("\n\n");
    out
}

struct ChannelState {
    fields: Map<String, Value>,
    generation: u64,
}

/// How a subscription ended.
#[derive(Debug)]
pub struct SubscriptionEnd {
    /// `data:` frames delivered before the failure.
    pub events_sent: u64,
    /// The write error that ended it.
    pub cause: io::Error,
}

/// Guarded broadcast fields plus change notification.
pub struct EventChannel {
    state: Mutex<ChannelState>,
    changed: Condvar,
}

impl EventChannel {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            state: Mutex::new(ChannelState {
                fields,
                generation: 0,
            }),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Read the fields under the lock.
    pub fn read<R>(&self, f: impl FnOnce(&Map<String, Value>) -> R) -> R {
        f(&self.lock().fields)
    }

    #[must_use]
    pub fn snapshot(&self) -> Map<String, Value> {
        self.read(Map::clone)
    }

    /// Apply `f` under the lock, then wake every subscriber.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut Map<String, Value>) -> R) -> R {
        let mut state = self.lock();
        let out = f(&mut state.fields);
        state.generation = state.generation.wrapping_add(1);
        self.changed.notify_all();
        drop(state);
        out
    }

    /// Apply a fallible batch under the lock.
    ///
    /// On `Ok` subscribers are woken as with [`mutate`](Self::mutate). On `Err` the fields are
    /// restored to their state before the batch and nobody is woken.
    pub fn try_mutate<T, E>(
        &self,
        f: impl FnOnce(&mut Map<String, Value>) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut state = self.lock();
        let before = state.fields.clone();
        match f(&mut state.fields) {
            Ok(out) => {
                state.generation = state.generation.wrapping_add(1);
                self.changed.notify_all();
                Ok(out)
            }
            Err(e) => {
                state.fields = before;
                Err(e)
            }
        }
    }

    /// Number of mutations applied so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Stream the fields to `out` until a write fails.
    ///
    /// Sends the current state immediately, then one frame per observed change. With `keepalive`
    /// set, an idle interval produces a [`KEEPALIVE_FRAME`]; without it the subscriber parks
    /// until the next change. Only a write failure ends the loop, so a peer that vanished is
    /// noticed on the next change or keepalive.
    pub fn subscribe<W: Write>(&self, out: &mut W, keepalive: Option<Duration>) -> SubscriptionEnd {
        let mut events_sent = 0;
        let mut state = self.lock();
        loop {
            let seen = state.generation;
            let frame = format_event(&Value::Object(state.fields.clone()).to_string());
            drop(state);
            if let Err(cause) = write_frame(out, frame.as_bytes()) {
                return SubscriptionEnd { events_sent, cause };
            }
            events_sent += 1;

            state = self.lock();
            while state.generation == seen {
                match keepalive {
                    Some(interval) => {
                        let guard = match self.changed.wait_timeout(state, interval) {
                            Ok((guard, _)) => guard,
                            Err(poisoned) => poisoned.into_inner().0,
                        };
                        if guard.generation != seen {
                            state = guard;
                            break;
                        }
                        drop(guard);
                        if let Err(cause) = write_frame(out, KEEPALIVE_FRAME) {
                            return SubscriptionEnd { events_sent, cause };
                        }
                        state = self.lock();
                    }
                    None => {
                        state = self
                            .changed
                            .wait(state)
                            .unwrap_or_else(|poisoned| poisoned.into_inner());
                    }
                }
            }
        }
    }
}

fn write_frame<W: Write>(out: &mut W, frame: &[u8]) -> io::Result<()> {
    out.write_all(frame)?;
    out.flush()
}

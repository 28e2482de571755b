//! Named, multi-listener event channels.
//!
//! A single generic, string-keyed fan-out bus standing in for one bus
//! per event: each declared name gets its own list of subscribers, and
//! [`crate::client::Client`] can add new event names without adding new
//! plumbing.
//!
//! Every event name an [`Observable`] will ever answer to is declared up
//! front, at construction. Subscribing or dispatching to any other name
//! fails with [`ObservableError::UnknownEvent`] rather than silently
//! creating a new channel.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use crate::errors::ObservableError;

/// The argument payload carried by one dispatch.
///
/// Kept as a small closed enum (rather than a generic `T`) so a single
/// [`Observable`] instance can back several differently-shaped events
/// (`after_run` takes nothing, `on_complete` takes a `Response`, ...)
/// the way the Client needs it to, while still giving callbacks a
/// concretely-typed view after a cheap match.
#[derive(Clone)]
pub enum EventArgs {
    None,
    Request(Arc<crate::request::Request>),
    Response(Arc<crate::response::Response>),
    NewCookies(Vec<crate::cookies::Cookie>, Arc<crate::response::Response>),
}

type Callback = Box<dyn Fn(&EventArgs) + Send + Sync>;

struct Channel {
    subscribers: Vec<Callback>,
}

/// A declared set of named event channels with exception-isolated
/// dispatch.
pub struct Observable {
    channels: Mutex<HashMap<&'static str, Channel>>,
}

impl Observable {
    /// Declares the channels this instance will ever answer to. Any
    /// name not in `names` is rejected by `subscribe`/`dispatch` with
    /// [`ObservableError::UnknownEvent`].
    pub fn new(names: &[&'static str]) -> Self {
        let mut channels = HashMap::new();
        for name in names {
            channels.insert(*name, Channel { subscribers: Vec::new() });
        }
        Self { channels: Mutex::new(channels) }
    }

    /// Registers `callback` on `event`. Returns `Ok(())` so call sites
    /// can chain: `observable.subscribe("on_complete", cb)?;`.
    pub fn subscribe(
        &self,
        event: &str,
        callback: impl Fn(&EventArgs) + Send + Sync + 'static,
    ) -> Result<(), ObservableError> {
        let mut channels = self.channels.lock().expect("observable mutex poisoned");
        let channel = channels
            .get_mut(event)
            .ok_or_else(|| ObservableError::UnknownEvent(event.to_string()))?;
        channel.subscribers.push(Box::new(callback));
        Ok(())
    }

    /// Invokes every subscriber of `event`, in subscription order.
    ///
    /// A subscriber that panics does not stop the remaining subscribers
    /// from running, and does not propagate out of `dispatch` — the
    /// panic is caught and logged instead, so one misbehaving observer
    /// never aborts an in-flight burst.
    pub fn dispatch(&self, event: &str, args: &EventArgs) -> Result<(), ObservableError> {
        // Held for the whole dispatch: a subscriber that tries to
        // subscribe to the same event from inside its own callback
        // would deadlock rather than corrupt the channel list. Callers
        // are not expected to do this.
        let channels = self.channels.lock().expect("observable mutex poisoned");
        let channel = channels
            .get(event)
            .ok_or_else(|| ObservableError::UnknownEvent(event.to_string()))?;

        for (idx, callback) in channel.subscribers.iter().enumerate() {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| callback(args)));
            if let Err(panic) = result {
                let message = panic_message(&panic);
                log::warn!("observer callback #{idx} panicked: {message}");
            }
        }
        Ok(())
    }

    /// Removes every subscriber from every declared channel.
    pub fn clear_observers(&self) {
        let mut channels = self.channels.lock().expect("observable mutex poisoned");
        for channel in channels.values_mut() {
            channel.subscribers.clear();
        }
    }

    /// Number of subscribers on `event`, or `None` if undeclared.
    pub fn subscriber_count(&self, event: &str) -> Option<usize> {
        self.channels
            .lock()
            .expect("observable mutex poisoned")
            .get(event)
            .map(|c| c.subscribers.len())
    }

    /// Subscriber-list length per channel, for [`crate::client::Client::sandbox`].
    ///
    /// Subscriber lists are append-only (`Box<dyn Fn>` isn't `Clone`, so
    /// there is no cheap way to snapshot the callbacks themselves) —
    /// pairing this with [`Observable::restore_lengths`] truncates away
    /// anything appended after the snapshot, which is exactly what a
    /// sandboxed block is allowed to do to an `Observable`.
    pub fn snapshot_lengths(&self) -> HashMap<&'static str, usize> {
        let channels = self.channels.lock().expect("observable mutex poisoned");
        channels.iter().map(|(name, c)| (*name, c.subscribers.len())).collect()
    }

    /// Truncates every channel back to the length recorded in `lengths`.
    pub fn restore_lengths(&self, lengths: &HashMap<&'static str, usize>) {
        let mut channels = self.channels.lock().expect("observable mutex poisoned");
        for (name, channel) in channels.iter_mut() {
            if let Some(&len) = lengths.get(name) {
                channel.subscribers.truncate(len);
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn unknown_event_rejected() {
        let obs = Observable::new(&["after_run"]);
        let err = obs.subscribe("not_declared", |_| {}).unwrap_err();
        assert_eq!(err, ObservableError::UnknownEvent("not_declared".to_string()));

        let err = obs.dispatch("not_declared", &EventArgs::None).unwrap_err();
        assert_eq!(err, ObservableError::UnknownEvent("not_declared".to_string()));
    }

    #[test]
    fn dispatch_calls_subscribers_in_order() {
        let obs = Observable::new(&["after_run"]);
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = order.clone();
            obs.subscribe("after_run", move |_| order.lock().unwrap().push(i))
                .unwrap();
        }

        obs.dispatch("after_run", &EventArgs::None).unwrap();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn failing_subscriber_does_not_stop_the_rest() {
        let obs = Observable::new(&["on_complete"]);
        let ran = Arc::new(AtomicUsize::new(0));

        obs.subscribe("on_complete", |_| panic!("boom")).unwrap();
        {
            let ran = ran.clone();
            obs.subscribe("on_complete", move |_| {
                ran.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        obs.dispatch("on_complete", &EventArgs::None).unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_observers_removes_all_channels() {
        let obs = Observable::new(&["after_run"]);
        obs.subscribe("after_run", |_| {}).unwrap();
        assert_eq!(obs.subscriber_count("after_run"), Some(1));
        obs.clear_observers();
        assert_eq!(obs.subscriber_count("after_run"), Some(0));
    }
}

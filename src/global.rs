//! Process-wide convenience accessor for a default [`Client`].
//!
//! The design explicitly steers away from hard-coupling every call
//! site to global mutable state: a `Client` is ordinarily constructed
//! explicitly via [`Client::new`] and passed around as an `Arc`. This
//! module exists only for callers happy with one process-wide default
//! instance, and any top-level delegation goes through the explicit
//! handle it returns rather than touching hidden state directly.

use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;

use crate::client::Client;
use crate::config::ClientConfig;
use crate::errors::ClientError;

lazy_static! {
    static ref GLOBAL: Mutex<Option<Arc<Client>>> = Mutex::new(None);
}

/// Returns the process-wide default `Client`, lazily constructing one
/// with [`ClientConfig::default`] the first time it is requested if
/// [`set_global`] was never called.
pub fn global() -> Result<Arc<Client>, ClientError> {
    let mut slot = GLOBAL.lock().expect("global client mutex poisoned");
    if let Some(client) = slot.as_ref() {
        return Ok(client.clone());
    }
    let client = Client::new(ClientConfig::default())?;
    *slot = Some(client.clone());
    Ok(client)
}

/// Installs `client` as the process-wide default, replacing whatever
/// was there before.
pub fn set_global(client: Arc<Client>) {
    *GLOBAL.lock().expect("global client mutex poisoned") = Some(client);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_returns_the_same_instance_across_calls() {
        let a = global().unwrap();
        let b = global().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn set_global_replaces_the_default_instance() {
        let custom = Client::new(ClientConfig::builder().user_agent("custom/1").build().unwrap()).unwrap();
        set_global(custom.clone());
        let fetched = global().unwrap();
        assert!(Arc::ptr_eq(&custom, &fetched));
    }
}

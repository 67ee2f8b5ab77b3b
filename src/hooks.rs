//! Named-channel hook bus
//!
//! An explicit, owned replacement for a process-global hook/event registry:
//! construct one per application context and pass it where it is needed.
//! Channels are string-keyed (`"schema:<name>:<bucket>"`). Hook handlers run
//! in series and short-circuit on the first failure; event listeners are
//! synchronous fire-and-forget, used for the create bucket.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;

/// Where a handler lands in its channel's order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    First,
    Last,
}

/// A fallible hook handler; `Err` aborts the rest of the channel run
pub type Handler = Arc<dyn Fn(&mut Value) -> Result<()> + Send + Sync>;

/// A synchronous event listener
pub type Listener = Arc<dyn Fn(&mut Value) + Send + Sync>;

/// Ordered handler and listener registry keyed by channel name.
#[derive(Default)]
pub struct HookBus {
    hooks: HashMap<String, Vec<Handler>>,
    listeners: HashMap<String, Vec<Listener>>,
}

impl HookBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook handler on a channel, at the front or the back.
    pub fn add(
        &mut self,
        channel: &str,
        priority: Priority,
        handler: impl Fn(&mut Value) -> Result<()> + Send + Sync + 'static,
    ) {
        let handlers = self.hooks.entry(channel.to_string()).or_default();
        match priority {
            Priority::First => handlers.insert(0, Arc::new(handler)),
            Priority::Last => handlers.push(Arc::new(handler)),
        }
    }

    /// Run a channel's handlers in series. The first failure aborts the
    /// remaining handlers and propagates verbatim. An unknown channel is a
    /// successful no-op.
    pub fn run_series(&self, channel: &str, record: &mut Value) -> Result<()> {
        if let Some(handlers) = self.hooks.get(channel) {
            for handler in handlers {
                handler(record)?;
            }
        }
        Ok(())
    }

    /// Register a synchronous event listener on a channel.
    pub fn on(&mut self, channel: &str, listener: impl Fn(&mut Value) + Send + Sync + 'static) {
        self.listeners
            .entry(channel.to_string())
            .or_default()
            .push(Arc::new(listener));
    }

    /// Fire a channel's listeners in registration order.
    pub fn emit(&self, channel: &str, record: &mut Value) {
        if let Some(listeners) = self.listeners.get(channel) {
            for listener in listeners {
                listener(record);
            }
        }
    }

    /// Number of hook handlers registered on a channel
    pub fn handler_count(&self, channel: &str) -> usize {
        self.hooks.get(channel).map(Vec::len).unwrap_or(0)
    }

    /// Number of event listeners registered on a channel
    pub fn listener_count(&self, channel: &str) -> usize {
        self.listeners.get(channel).map(Vec::len).unwrap_or(0)
    }
}

impl std::fmt::Debug for HookBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookBus")
            .field("hook_channels", &self.hooks.len())
            .field("event_channels", &self.listeners.len())
            .finish()
    }
}

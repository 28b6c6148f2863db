//! Event channel abstraction.
//!
//! This module defines the [`EventChannel`] trait for a duplex, named-event
//! connection to the processing service, the [`HandlerTable`] shared by
//! implementations to route incoming events, and [`LoopbackChannel`], an
//! in-memory implementation for tests and headless runs.
//!
//! # Subscription rules
//!
//! A connection holds at most one handler per event name. Subscribing
//! again to a name that already has a handler returns the existing
//! [`SubscriptionId`] and drops the new handler, so re-subscription can
//! never duplicate deliveries downstream.

use std::cell::RefCell;
use std::rc::Rc;

use futures::channel::mpsc;
use serde_json::Value;

use crate::error::ChannelError;
use crate::types::JobId;

/// Identifies one connection opened by an [`EventChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(u64);

impl ConnectionHandle {
    /// Wrap a raw connection number. Implementations issue these.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Identifies one handler registration on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Callback invoked with the payload of an incoming event.
pub type Handler = Box<dyn FnMut(Value)>;

/// A duplex connection to the service that carries named events.
///
/// Implementations must dispatch the reserved
/// [`event::DISCONNECT`](crate::wire::event::DISCONNECT) event when the
/// transport drops on its own, and must not dispatch anything after
/// [`disconnect`](Self::disconnect) was called for a handle.
pub trait EventChannel {
    /// Open a new connection.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Transport`] if the transport cannot be
    /// created.
    fn connect(&mut self) -> Result<ConnectionHandle, ChannelError>;

    /// Register `handler` for `event` on the connection.
    ///
    /// Idempotent per event name; see the module docs.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::NotConnected`] for a closed or unknown handle.
    fn subscribe(
        &mut self,
        handle: ConnectionHandle,
        event: &str,
        handler: Handler,
    ) -> Result<SubscriptionId, ChannelError>;

    /// Send a named event with a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::NotConnected`] for a closed or unknown
    /// handle, or [`ChannelError::Encode`] / [`ChannelError::Transport`]
    /// if the event cannot be sent.
    fn emit(
        &mut self,
        handle: ConnectionHandle,
        event: &str,
        payload: Value,
    ) -> Result<(), ChannelError>;

    /// Close the connection and drop its handlers. Unknown handles are
    /// ignored.
    fn disconnect(&mut self, handle: ConnectionHandle);
}

/// Per-connection routing table from event name to handler.
#[derive(Default)]
pub struct HandlerTable {
    entries: Vec<(String, SubscriptionId, Handler)>,
    next_id: u64,
}

impl HandlerTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event` unless the event already has one.
    pub fn subscribe(&mut self, event: &str, handler: Handler) -> SubscriptionId {
        if let Some((_, id, _)) = self.entries.iter().find(|(name, _, _)| name == event) {
            tracing::debug!(event, "handler already registered; keeping the first");
            return *id;
        }
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((event.to_owned(), id, handler));
        id
    }

    /// Route an event to its handler. Returns `false` if nobody listens.
    pub fn dispatch(&mut self, event: &str, payload: Value) -> bool {
        match self.entries.iter_mut().find(|(name, _, _)| name == event) {
            Some((_, _, handler)) => {
                handler(payload);
                true
            }
            None => false,
        }
    }

    /// Whether `event` has a handler.
    #[must_use]
    pub fn contains(&self, event: &str) -> bool {
        self.entries.iter().any(|(name, _, _)| name == event)
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every handler.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// What arrived on the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A `nueva_data` payload, parsed by the aggregator.
    NewData(Value),
    /// The service signalled the end of the pipeline.
    Stop,
    /// The service reported an error.
    ServerError(String),
    /// The transport dropped.
    Disconnected,
}

/// A stream event tagged with the job its connection was bound to.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub job: JobId,
    pub event: StreamEvent,
}

/// Receiving end of the delivery queue, drained by the view.
pub type DeliveryReceiver = mpsc::UnboundedReceiver<Delivery>;

#[derive(Default)]
struct LoopbackState {
    next_handle: u64,
    open: Vec<(ConnectionHandle, HandlerTable)>,
    emitted: Vec<(ConnectionHandle, String, Value)>,
    connects: usize,
    disconnects: usize,
    peak_open: usize,
}

/// In-memory [`EventChannel`].
///
/// Clones share the same state, so a test can keep one clone to play
/// the server while the other is owned by a
/// [`ViewController`](crate::ViewController).
#[derive(Clone, Default)]
pub struct LoopbackChannel {
    state: Rc<RefCell<LoopbackState>>,
}

impl LoopbackChannel {
    /// Create a channel with no connections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a server event to every open connection. Returns the
    /// number of handlers that ran.
    pub fn server_emit(&self, event: &str, payload: &Value) -> usize {
        let mut state = self.state.borrow_mut();
        let mut ran = 0;
        for (_, table) in &mut state.open {
            if table.dispatch(event, payload.clone()) {
                ran += 1;
            }
        }
        ran
    }

    /// Simulate the transport dropping every open connection.
    pub fn drop_connections(&self) {
        let dropped = std::mem::take(&mut self.state.borrow_mut().open);
        for (_, mut table) in dropped {
            table.dispatch(crate::wire::event::DISCONNECT, Value::Null);
        }
    }

    /// Events emitted by the client, oldest first.
    #[must_use]
    pub fn emitted(&self) -> Vec<(String, Value)> {
        self.state
            .borrow()
            .emitted
            .iter()
            .map(|(_, name, payload)| (name.clone(), payload.clone()))
            .collect()
    }

    /// Number of currently open connections.
    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.state.borrow().open.len()
    }

    /// Highest number of simultaneously open connections seen.
    #[must_use]
    pub fn peak_open_connections(&self) -> usize {
        self.state.borrow().peak_open
    }

    /// Total number of `connect` calls.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.state.borrow().connects
    }

    /// Total number of `disconnect` calls, including for dead handles.
    #[must_use]
    pub fn disconnect_count(&self) -> usize {
        self.state.borrow().disconnects
    }

    /// Handlers registered for `event` across open connections.
    #[must_use]
    pub fn handler_count(&self, event: &str) -> usize {
        self.state
            .borrow()
            .open
            .iter()
            .filter(|(_, table)| table.contains(event))
            .count()
    }
}

impl EventChannel for LoopbackChannel {
    fn connect(&mut self) -> Result<ConnectionHandle, ChannelError> {
        let mut state = self.state.borrow_mut();
        let handle = ConnectionHandle(state.next_handle);
        state.next_handle += 1;
        state.connects += 1;
        state.open.push((handle, HandlerTable::new()));
        state.peak_open = state.peak_open.max(state.open.len());
        Ok(handle)
    }

    fn subscribe(
        &mut self,
        handle: ConnectionHandle,
        event: &str,
        handler: Handler,
    ) -> Result<SubscriptionId, ChannelError> {
        let mut state = self.state.borrow_mut();
        let (_, table) = state
            .open
            .iter_mut()
            .find(|(h, _)| *h == handle)
            .ok_or(ChannelError::NotConnected)?;
        Ok(table.subscribe(event, handler))
    }

    fn emit(
        &mut self,
        handle: ConnectionHandle,
        event: &str,
        payload: Value,
    ) -> Result<(), ChannelError> {
        let mut state = self.state.borrow_mut();
        if !state.open.iter().any(|(h, _)| *h == handle) {
            return Err(ChannelError::NotConnected);
        }
        state.emitted.push((handle, event.to_owned(), payload));
        Ok(())
    }

    fn disconnect(&mut self, handle: ConnectionHandle) {
        let mut state = self.state.borrow_mut();
        state.disconnects += 1;
        state.open.retain(|(h, _)| *h != handle);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use serde_json::json;

    use super::*;

    fn counting_handler(counter: &Rc<Cell<usize>>) -> Handler {
        let counter = Rc::clone(counter);
        Box::new(move |_| counter.set(counter.get() + 1))
    }

    #[test]
    fn duplicate_subscription_keeps_one_handler() {
        let hits = Rc::new(Cell::new(0));
        let mut table = HandlerTable::new();
        let first = table.subscribe("nueva_data", counting_handler(&hits));
        let second = table.subscribe("nueva_data", counting_handler(&hits));
        assert_eq!(first, second);
        assert_eq!(table.len(), 1);

        assert!(table.dispatch("nueva_data", json!({})));
        assert_eq!(hits.get(), 1, "event must be delivered exactly once");
    }

    #[test]
    fn dispatch_to_unknown_event_is_ignored() {
        let mut table = HandlerTable::new();
        assert!(!table.dispatch("nueva_data", Value::Null));
    }

    #[test]
    fn clear_drops_handlers() {
        let hits = Rc::new(Cell::new(0));
        let mut table = HandlerTable::new();
        table.subscribe("a", counting_handler(&hits));
        table.clear();
        assert!(table.is_empty());
        assert!(!table.dispatch("a", Value::Null));
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn loopback_routes_server_events() {
        let hits = Rc::new(Cell::new(0));
        let mut channel = LoopbackChannel::new();
        let handle = channel.connect().unwrap();
        channel
            .subscribe(handle, "nueva_data", counting_handler(&hits))
            .unwrap();

        assert_eq!(channel.server_emit("nueva_data", &json!({"frame": 0})), 1);
        assert_eq!(channel.server_emit("other", &Value::Null), 0);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn loopback_disconnect_stops_delivery() {
        let hits = Rc::new(Cell::new(0));
        let mut channel = LoopbackChannel::new();
        let handle = channel.connect().unwrap();
        channel
            .subscribe(handle, "nueva_data", counting_handler(&hits))
            .unwrap();
        channel.disconnect(handle);

        channel.server_emit("nueva_data", &Value::Null);
        assert_eq!(hits.get(), 0);
        assert_eq!(channel.open_connections(), 0);
        assert_eq!(
            channel.emit(handle, "x", Value::Null),
            Err(ChannelError::NotConnected)
        );
        assert!(matches!(
            channel.subscribe(handle, "x", Box::new(|_| {})),
            Err(ChannelError::NotConnected)
        ));
    }

    #[test]
    fn loopback_drop_dispatches_disconnect() {
        let hits = Rc::new(Cell::new(0));
        let mut channel = LoopbackChannel::new();
        let handle = channel.connect().unwrap();
        channel
            .subscribe(
                handle,
                crate::wire::event::DISCONNECT,
                counting_handler(&hits),
            )
            .unwrap();

        channel.drop_connections();
        assert_eq!(hits.get(), 1);
        assert_eq!(channel.open_connections(), 0);
    }

    #[test]
    fn loopback_records_emits() {
        let mut channel = LoopbackChannel::new();
        let handle = channel.connect().unwrap();
        channel
            .emit(handle, "procesar_y_graficar", json!({"file_path": "f"}))
            .unwrap();
        assert_eq!(
            channel.emitted(),
            vec![("procesar_y_graficar".to_owned(), json!({"file_path": "f"}))]
        );
    }
}

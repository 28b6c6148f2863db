//! Socket.IO client over a browser `WebSocket`.
//!
//! [`SocketChannel`] implements [`EventChannel`] by speaking Engine.IO v4
//! text frames directly on the WebSocket transport (no polling, no
//! upgrade). Frame parsing lives in the sans-IO
//! [`socketio`](morphoscope_session::socketio) module; this file only
//! wires it to `web_sys::WebSocket` callbacks.
//!
//! Each [`connect`](EventChannel::connect) opens its own `WebSocket`.
//! Events emitted before the namespace handshake completes are queued
//! and flushed, in order, when the server confirms the connection.

use std::cell::RefCell;
use std::rc::Rc;

use morphoscope_session::socketio::{self, Packet};
use morphoscope_session::wire::event;
use morphoscope_session::{
    ChannelError, ConnectionHandle, EventChannel, Handler, HandlerTable, SubscriptionId,
};
use serde_json::Value;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CloseEvent, Event, MessageEvent, WebSocket};

use crate::error::BrowserError;

#[derive(Default)]
struct SocketState {
    handlers: HandlerTable,
    namespace_open: bool,
    pending: Vec<String>,
    closed: bool,
}

impl SocketState {
    /// Mark the connection gone and tell the subscriber, once.
    fn close(&mut self, reason: &str) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.namespace_open = false;
        self.pending.clear();
        tracing::warn!(reason, "socket closed");
        self.handlers.dispatch(event::DISCONNECT, Value::Null);
    }
}

struct Connection {
    handle: ConnectionHandle,
    socket: WebSocket,
    state: Rc<RefCell<SocketState>>,
    // Kept alive for as long as the socket may call them.
    _onmessage: Closure<dyn FnMut(MessageEvent)>,
    _onclose: Closure<dyn FnMut(CloseEvent)>,
    _onerror: Closure<dyn FnMut(Event)>,
}

impl Connection {
    fn open(handle: ConnectionHandle, url: &str) -> Result<Self, BrowserError> {
        let socket = WebSocket::new(url)?;
        let state = Rc::new(RefCell::new(SocketState::default()));

        let onmessage = {
            let state = Rc::clone(&state);
            let socket = socket.clone();
            Closure::<dyn FnMut(MessageEvent)>::new(move |msg: MessageEvent| {
                if let Some(frame) = msg.data().as_string() {
                    on_frame(&socket, &state, &frame);
                }
            })
        };
        let onclose = {
            let state = Rc::clone(&state);
            Closure::<dyn FnMut(CloseEvent)>::new(move |close: CloseEvent| {
                let reason = format!("code {}", close.code());
                state.borrow_mut().close(&reason);
            })
        };
        let onerror = {
            let state = Rc::clone(&state);
            Closure::<dyn FnMut(Event)>::new(move |_: Event| {
                state.borrow_mut().close("transport error");
            })
        };

        socket.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
        socket.set_onclose(Some(onclose.as_ref().unchecked_ref()));
        socket.set_onerror(Some(onerror.as_ref().unchecked_ref()));

        Ok(Self {
            handle,
            socket,
            state,
            _onmessage: onmessage,
            _onclose: onclose,
            _onerror: onerror,
        })
    }

    fn send(&self, frame: String) -> Result<(), ChannelError> {
        let mut state = self.state.borrow_mut();
        if state.closed {
            return Err(ChannelError::NotConnected);
        }
        if state.namespace_open {
            self.socket
                .send_with_str(&frame)
                .map_err(|e| ChannelError::from(BrowserError::from(e)))
        } else {
            state.pending.push(frame);
            Ok(())
        }
    }

    /// Leave the namespace and close without notifying the subscriber.
    fn shut(&self) {
        {
            let mut state = self.state.borrow_mut();
            state.closed = true;
            state.handlers.clear();
            state.pending.clear();
        }
        self.socket.set_onmessage(None);
        self.socket.set_onclose(None);
        self.socket.set_onerror(None);
        if self.socket.ready_state() == WebSocket::OPEN {
            let _ = self
                .socket
                .send_with_str(socketio::DISCONNECT_DEFAULT_NAMESPACE);
        }
        if let Err(e) = self.socket.close() {
            tracing::debug!(error = %BrowserError::from(e), "socket close failed");
        }
    }
}

/// Apply one incoming text frame.
fn on_frame(socket: &WebSocket, state: &RefCell<SocketState>, frame: &str) {
    let packet = match socketio::decode(frame) {
        Ok(packet) => packet,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring undecodable frame");
            return;
        }
    };

    let mut state = state.borrow_mut();
    if state.closed {
        return;
    }
    match packet {
        Packet::Open(handshake) => {
            tracing::debug!(sid = %handshake.sid, ping_interval = handshake.ping_interval, "engine open");
            send_or_log(socket, socketio::CONNECT_DEFAULT_NAMESPACE);
        }
        Packet::Ping => send_or_log(socket, socketio::PONG),
        Packet::Connect { namespace } => {
            tracing::info!(%namespace, "socket connected");
            state.namespace_open = true;
            for frame in std::mem::take(&mut state.pending) {
                send_or_log(socket, &frame);
            }
        }
        Packet::Event { name, payload, .. } => {
            if !state.handlers.dispatch(&name, payload) {
                tracing::debug!(event = %name, "no handler for event");
            }
        }
        Packet::Close | Packet::Disconnect { .. } => state.close("server closed"),
        Packet::ConnectError { message, .. } => state.close(&message),
        Packet::Pong | Packet::Noop | Packet::Unsupported(_) => {}
    }
}

fn send_or_log(socket: &WebSocket, frame: &str) {
    if let Err(e) = socket.send_with_str(frame) {
        tracing::warn!(error = %BrowserError::from(e), "socket send failed");
    }
}

/// [`EventChannel`] backed by browser WebSockets.
pub struct SocketChannel {
    url: String,
    next_handle: u64,
    connections: Vec<Connection>,
}

impl SocketChannel {
    /// Create a channel for a Socket.IO WebSocket transport URL, e.g.
    /// `ws://localhost:5000/socket.io/?EIO=4&transport=websocket`.
    ///
    /// Nothing is opened until [`connect`](EventChannel::connect).
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            next_handle: 0,
            connections: Vec::new(),
        }
    }

    fn find(&self, handle: ConnectionHandle) -> Result<&Connection, ChannelError> {
        self.connections
            .iter()
            .find(|c| c.handle == handle)
            .ok_or(ChannelError::NotConnected)
    }
}

impl EventChannel for SocketChannel {
    fn connect(&mut self) -> Result<ConnectionHandle, ChannelError> {
        let handle = ConnectionHandle::new(self.next_handle);
        self.next_handle += 1;
        let connection = Connection::open(handle, &self.url)?;
        tracing::debug!(?handle, url = %self.url, "opening socket");
        self.connections.push(connection);
        Ok(handle)
    }

    fn subscribe(
        &mut self,
        handle: ConnectionHandle,
        event: &str,
        handler: Handler,
    ) -> Result<SubscriptionId, ChannelError> {
        let connection = self.find(handle)?;
        let mut state = connection.state.borrow_mut();
        if state.closed {
            return Err(ChannelError::NotConnected);
        }
        Ok(state.handlers.subscribe(event, handler))
    }

    fn emit(
        &mut self,
        handle: ConnectionHandle,
        event: &str,
        payload: Value,
    ) -> Result<(), ChannelError> {
        let frame = socketio::encode_event(event, &payload)
            .map_err(|e| ChannelError::Encode(e.to_string()))?;
        self.find(handle)?.send(frame)
    }

    fn disconnect(&mut self, handle: ConnectionHandle) {
        if let Some(index) = self.connections.iter().position(|c| c.handle == handle) {
            let connection = self.connections.swap_remove(index);
            connection.shut();
            tracing::debug!(?handle, "socket released");
        }
    }
}

impl Drop for SocketChannel {
    fn drop(&mut self) {
        for connection in self.connections.drain(..) {
            connection.shut();
        }
    }
}

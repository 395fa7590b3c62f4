// illustrator-relay/src/connection/mod.rs
//
// Copyright (c) 2025 Arcella Team
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE>
// or the MIT license <LICENSE-MIT>, at your option.
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Connection lifecycle towards the proxy.
//!
//! [`ConnectionManager`] owns the single socket. It:
//! - connects on request and announces itself with a `register` event,
//! - feeds every inbound `command_packet` through the [`Dispatcher`] and
//!   emits the envelope as `command_packet_response`,
//! - publishes [`ConnectionState`] changes for the panel,
//! - never reconnects on its own.
//!
//! Responses are fire-and-forget: when the socket is gone by the time a
//! handler finishes, the response is logged and dropped.

use std::sync::Arc;

use futures_util::{SinkExt, Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::commands::Dispatcher;
use crate::error::{RelayError, Result as RelayResult};
use crate::protocol::{
    CommandPacket, RegisterPayload, ResponseEnvelope, ResponsePacket, EVENT_COMMAND_PACKET,
    EVENT_COMMAND_PACKET_RESPONSE, EVENT_REGISTER, EVENT_REGISTRATION_RESPONSE,
};

pub mod socketio;

use socketio::{EnginePacket, SocketPacket};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
        })
    }
}

struct SocketHandle {
    generation: u64,
    outbound: mpsc::UnboundedSender<Message>,
    reader: JoinHandle<()>,
}

#[derive(Default)]
struct SocketSlot {
    handle: Option<SocketHandle>,
    generation: u64,
}

struct Shared {
    endpoint: String,
    application: String,
    dispatcher: Dispatcher,
    state: watch::Sender<ConnectionState>,
    // Socket handle and state transitions are only changed under this lock.
    slot: Mutex<SocketSlot>,
}

/// Owns the socket connection to the proxy.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    pub fn new(endpoint: &str, application: &str, dispatcher: Dispatcher) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                endpoint: endpoint.to_string(),
                application: application.to_string(),
                dispatcher,
                state,
                slot: Mutex::new(SocketSlot::default()),
            }),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.shared.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    fn set_state(&self, state: ConnectionState) {
        self.shared.state.send_replace(state);
    }

    /// Opens the socket. Returns once the websocket is up; the state turns
    /// `Connected` when the server acknowledges the namespace connect.
    ///
    /// A no-op while a socket already exists.
    pub async fn connect(&self) -> RelayResult<()> {
        let generation = {
            let mut slot = self.shared.slot.lock().await;
            if slot.handle.is_some() || self.state() == ConnectionState::Connecting {
                tracing::debug!("Connect requested while a socket is active, ignoring");
                return Ok(());
            }
            slot.generation += 1;
            self.set_state(ConnectionState::Connecting);
            slot.generation
        };

        let url = match socketio::websocket_url(&self.shared.endpoint) {
            Ok(url) => url,
            Err(e) => {
                self.abort_connecting(generation).await;
                return Err(e);
            }
        };

        tracing::info!("Connecting to {}", self.shared.endpoint);
        let stream = match connect_async(url.as_str()).await {
            Ok((stream, _response)) => stream,
            Err(e) => {
                tracing::error!("Connection error: {}", e);
                self.abort_connecting(generation).await;
                return Err(e.into());
            }
        };

        let mut slot = self.shared.slot.lock().await;
        if slot.generation != generation || self.state() != ConnectionState::Connecting {
            // disconnect() ran while the websocket was opening.
            tracing::debug!("Connection attempt cancelled");
            drop(slot);
            let mut stream = stream;
            let _ = stream.close(None).await;
            return Ok(());
        }

        let (write, read) = stream.split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel::<Message>();

        tokio::spawn(write_loop(write, outbound_rx));
        let reader = tokio::spawn(read_loop(self.clone(), read, outbound.clone(), generation));

        slot.handle = Some(SocketHandle {
            generation,
            outbound,
            reader,
        });
        Ok(())
    }

    async fn abort_connecting(&self, generation: u64) {
        let slot = self.shared.slot.lock().await;
        if slot.generation == generation && slot.handle.is_none() {
            self.set_state(ConnectionState::Disconnected);
        }
    }

    /// Closes the socket if one is open. Always ends `Disconnected`.
    pub async fn disconnect(&self) {
        let mut slot = self.shared.slot.lock().await;
        // Invalidates an attempt still in connect_async.
        slot.generation += 1;

        if let Some(handle) = slot.handle.take() {
            let _ = handle.outbound.send(text_frame(socketio::DISCONNECT));
            let _ = handle.outbound.send(Message::Close(None));
            handle.reader.abort();
            tracing::info!("Disconnected from server");
        }
        self.set_state(ConnectionState::Disconnected);
    }

    /// Connects when disconnected, disconnects otherwise.
    pub async fn toggle(&self) -> RelayResult<()> {
        match self.state() {
            ConnectionState::Disconnected => self.connect().await,
            ConnectionState::Connecting | ConnectionState::Connected => {
                self.disconnect().await;
                Ok(())
            }
        }
    }

    /// Emits `event` with a single argument. Fails with `NotConnected` when
    /// no connected socket exists; never waits on the network.
    pub async fn emit<T: Serialize>(&self, event: &str, data: &T) -> RelayResult<()> {
        let outbound = {
            let slot = self.shared.slot.lock().await;
            match (&slot.handle, self.state()) {
                (Some(handle), ConnectionState::Connected) => handle.outbound.clone(),
                _ => return Err(RelayError::NotConnected),
            }
        };
        let data = serde_json::to_value(data)?;
        send_event(&outbound, event, &data)
    }

    /// Sends a response envelope. Dropped with an error log when not connected.
    pub async fn send_response(&self, packet: ResponseEnvelope) {
        let sender_id = packet.sender_id.clone();
        match self.emit(EVENT_COMMAND_PACKET_RESPONSE, &ResponsePacket { packet }).await {
            Ok(()) => tracing::debug!("Sent response to {}", sender_id),
            Err(RelayError::NotConnected) => {
                tracing::error!("Socket is not connected. Cannot send response to {}", sender_id)
            }
            Err(e) => tracing::error!("Failed to send response to {}: {}", sender_id, e),
        }
    }

    async fn on_connected(&self, sid: Option<String>, outbound: &mpsc::UnboundedSender<Message>, generation: u64) {
        {
            let slot = self.shared.slot.lock().await;
            if slot.generation != generation {
                return;
            }
            self.set_state(ConnectionState::Connected);
        }
        tracing::info!("Connected to server with ID: {}", sid.as_deref().unwrap_or("<unknown>"));

        let register = RegisterPayload {
            application: self.shared.application.clone(),
        };
        let sent = serde_json::to_value(&register)
            .map_err(RelayError::from)
            .and_then(|data| send_event(outbound, EVENT_REGISTER, &data));
        if let Err(e) = sent {
            tracing::error!("Failed to register: {}", e);
        }
    }

    fn on_event(&self, name: &str, data: Value) {
        match name {
            EVENT_COMMAND_PACKET => {
                let packet: CommandPacket = match serde_json::from_value(data) {
                    Ok(packet) => packet,
                    Err(e) => {
                        tracing::error!("Malformed command packet: {}", e);
                        return;
                    }
                };
                tracing::info!(
                    "Received command packet: {} from {}",
                    packet.command.action,
                    packet.sender_id
                );

                let manager = self.clone();
                tokio::spawn(async move {
                    let response = manager.shared.dispatcher.handle_packet(&packet).await;
                    manager.send_response(response).await;
                });
            }
            EVENT_REGISTRATION_RESPONSE => {
                tracing::info!("Received response: {}", data);
            }
            other => {
                tracing::debug!("Ignoring event {}", other);
            }
        }
    }

    /// Called by the reader when its socket ends for any reason.
    async fn on_closed(&self, generation: u64) {
        let mut slot = self.shared.slot.lock().await;
        let current = slot
            .handle
            .as_ref()
            .map_or(false, |handle| handle.generation == generation);
        if current {
            slot.handle = None;
            self.set_state(ConnectionState::Disconnected);
            tracing::info!("Disconnected from server");
        }
    }
}

fn send_event(outbound: &mpsc::UnboundedSender<Message>, event: &str, data: &Value) -> RelayResult<()> {
    let frame = socketio::encode_event(event, data)?;
    outbound
        .send(text_frame(frame))
        .map_err(|_| RelayError::NotConnected)
}

fn text_frame(text: impl Into<String>) -> Message {
    Message::Text(text.into().into())
}

async fn write_loop<W>(mut write: W, mut outbound: mpsc::UnboundedReceiver<Message>)
where
    W: futures_util::Sink<Message> + Unpin,
    W::Error: std::fmt::Display,
{
    while let Some(msg) = outbound.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if let Err(e) = write.send(msg).await {
            tracing::error!("Error sending message: {}", e);
            break;
        }
        if closing {
            break;
        }
    }
}

async fn read_loop<R>(
    manager: ConnectionManager,
    mut read: R,
    outbound: mpsc::UnboundedSender<Message>,
    generation: u64,
) where
    R: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(msg) = read.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::error!("Error receiving message: {}", e);
                break;
            }
        };

        let packet = match socketio::parse_engine(text.as_str()) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!("Dropping frame: {}", e);
                continue;
            }
        };

        match packet {
            EnginePacket::Open(handshake) => {
                tracing::debug!("Engine.IO handshake: {}", handshake);
                let _ = outbound.send(text_frame(socketio::CONNECT));
            }
            EnginePacket::Ping => {
                let _ = outbound.send(text_frame(socketio::PONG));
            }
            EnginePacket::Close => break,
            EnginePacket::Message(payload) => match socketio::parse_socket(&payload) {
                Ok(SocketPacket::Connect(sid)) => manager.on_connected(sid, &outbound, generation).await,
                Ok(SocketPacket::ConnectError(data)) => {
                    tracing::error!("Connection error: {}", data);
                    break;
                }
                Ok(SocketPacket::Disconnect) => break,
                Ok(SocketPacket::Event { name, data, .. }) => manager.on_event(&name, data),
                Ok(SocketPacket::Ack) => {}
                Ok(SocketPacket::Unsupported(raw)) => {
                    tracing::debug!("Unsupported Socket.IO packet: {}", raw);
                }
                Err(e) => tracing::warn!("Dropping packet: {}", e),
            },
            EnginePacket::Pong | EnginePacket::Upgrade | EnginePacket::Noop => {}
        }
    }

    let _ = outbound.send(Message::Close(None));
    manager.on_closed(generation).await;
}

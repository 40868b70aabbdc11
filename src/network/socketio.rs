//! Socket.IO client - Engine.IO v4 over the WebSocket transport
//!
//! Only the pieces a testing client needs: the open handshake, namespace
//! connect, ping/pong, events in and out, and disconnect. Binary attachments
//! are skipped over rather than reassembled.

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use url::Url;

use crate::constants::SOCKET_IO_EVENT;
use crate::error::{Error, Result};
use crate::models::Message;
use crate::network::registry::SessionContext;

pub const ROOT_NAMESPACE: &str = "/";

/// Engine.IO transport packet
#[derive(Clone, Debug, PartialEq)]
pub enum EnginePacket {
    Open(Value),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(text: &str) -> Option<EnginePacket> {
        let mut chars = text.chars();
        let kind = chars.next()?;
        let payload = chars.as_str();
        Some(match kind {
            '0' => EnginePacket::Open(serde_json::from_str(payload).ok()?),
            '1' => EnginePacket::Close,
            '2' => EnginePacket::Ping(payload.to_string()),
            '3' => EnginePacket::Pong(payload.to_string()),
            '4' => EnginePacket::Message(payload.to_string()),
            '5' => EnginePacket::Upgrade,
            '6' => EnginePacket::Noop,
            _ => return None,
        })
    }

    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(data) => format!("0{}", data),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{}", data),
            EnginePacket::Pong(data) => format!("3{}", data),
            EnginePacket::Message(data) => format!("4{}", data),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketKind {
    Connect,
    Disconnect,
    Event,
    Ack,
    ConnectError,
    BinaryEvent,
    BinaryAck,
}

impl PacketKind {
    fn from_char(c: char) -> Option<PacketKind> {
        Some(match c {
            '0' => PacketKind::Connect,
            '1' => PacketKind::Disconnect,
            '2' => PacketKind::Event,
            '3' => PacketKind::Ack,
            '4' => PacketKind::ConnectError,
            '5' => PacketKind::BinaryEvent,
            '6' => PacketKind::BinaryAck,
            _ => return None,
        })
    }

    fn as_char(self) -> char {
        match self {
            PacketKind::Connect => '0',
            PacketKind::Disconnect => '1',
            PacketKind::Event => '2',
            PacketKind::Ack => '3',
            PacketKind::ConnectError => '4',
            PacketKind::BinaryEvent => '5',
            PacketKind::BinaryAck => '6',
        }
    }
}

/// Socket.IO packet, carried inside an Engine.IO message:
/// `<kind>[<attachments>-][<namespace>,][<ack id>][<json>]`
#[derive(Clone, Debug, PartialEq)]
pub struct Packet {
    pub kind: PacketKind,
    pub namespace: String,
    pub ack_id: Option<u64>,
    pub data: Option<Value>,
}

impl Packet {
    pub fn connect(namespace: &str) -> Packet {
        Packet {
            kind: PacketKind::Connect,
            namespace: namespace.to_string(),
            ack_id: None,
            data: None,
        }
    }

    pub fn disconnect(namespace: &str) -> Packet {
        Packet {
            kind: PacketKind::Disconnect,
            ..Packet::connect(namespace)
        }
    }

    pub fn event(namespace: &str, event: &str, args: Vec<Value>) -> Packet {
        let mut data = vec![Value::String(event.to_string())];
        data.extend(args);
        Packet {
            kind: PacketKind::Event,
            data: Some(Value::Array(data)),
            ..Packet::connect(namespace)
        }
    }

    pub fn decode(text: &str) -> Option<Packet> {
        let mut chars = text.chars();
        let kind = PacketKind::from_char(chars.next()?)?;
        let mut rest = chars.as_str();

        if matches!(kind, PacketKind::BinaryEvent | PacketKind::BinaryAck) {
            if let Some(idx) = rest.find('-') {
                rest = &rest[idx + 1..];
            }
        }

        let namespace = if rest.starts_with('/') {
            match rest.find(',') {
                Some(idx) => {
                    let ns = &rest[..idx];
                    rest = &rest[idx + 1..];
                    ns.to_string()
                }
                None => {
                    let ns = rest.to_string();
                    rest = "";
                    ns
                }
            }
        } else {
            ROOT_NAMESPACE.to_string()
        };

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let ack_id = if digits > 0 {
            rest[..digits].parse().ok()
        } else {
            None
        };
        rest = &rest[digits..];

        let data = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str(rest).ok()?)
        };

        Some(Packet {
            kind,
            namespace,
            ack_id,
            data,
        })
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push(self.kind.as_char());
        if self.namespace != ROOT_NAMESPACE {
            out.push_str(&self.namespace);
            out.push(',');
        }
        if let Some(id) = self.ack_id {
            out.push_str(&id.to_string());
        }
        if let Some(data) = &self.data {
            out.push_str(&data.to_string());
        }
        out
    }

    /// `<event>: <json args>` for an event packet
    pub fn describe_event(&self) -> Option<String> {
        let items = self.data.as_ref()?.as_array()?;
        let (name, args) = items.split_first()?;
        let name = match name {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Some(format!("{}: {}", name, Value::Array(args.to_vec())))
    }

    /// Server message carried by a connect error
    pub fn error_message(&self) -> String {
        match &self.data {
            Some(Value::Object(map)) => match map.get("message") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => Value::Object(map.clone()).to_string(),
            },
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "Connection refused".to_string(),
        }
    }
}

/// Engine.IO endpoint for a target URL, plus the namespace named by its path.
///
/// `http://host:3000/chat?token=x` connects to
/// `ws://host:3000/socket.io/?token=x&EIO=4&transport=websocket` on `/chat`.
pub fn endpoint(target: &str) -> Result<(String, String)> {
    let mut url = Url::parse(target)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(Error::socket_io(format!("unsupported scheme '{}'", other))),
    };
    url.set_scheme(scheme)
        .map_err(|_| Error::socket_io(format!("cannot use scheme '{}'", scheme)))?;

    let namespace = match url.path().trim_end_matches('/') {
        "" => ROOT_NAMESPACE.to_string(),
        path => path.to_string(),
    };
    url.set_path("/socket.io/");

    let query: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "EIO" && k != "transport")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(query)
        .append_pair("EIO", "4")
        .append_pair("transport", "websocket");
    url.set_fragment(None);

    Ok((url.to_string(), namespace))
}

/// Run one Socket.IO session. Outgoing messages queue until the namespace
/// connect is acknowledged.
pub async fn run_socketio(
    ctx: SessionContext,
    url: String,
    mut outgoing_rx: mpsc::UnboundedReceiver<String>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    let (endpoint, namespace) = match endpoint(&url) {
        Ok(target) => target,
        Err(e) => {
            ctx.emit(Message::error(format!("Connection error: {}", e)));
            ctx.end();
            return;
        }
    };

    let connect = tokio::select! {
        biased;

        _ = &mut cancel_rx => {
            ctx.emit(Message::info("Disconnected"));
            ctx.end();
            return;
        }
        result = connect_async(endpoint.as_str()) => result,
    };

    let ws_stream = match connect {
        Ok((stream, _response)) => stream,
        Err(e) => {
            tracing::warn!(request_id = %ctx.request_id(), endpoint = %endpoint, error = %e, "Socket.IO connect failed");
            ctx.emit(Message::error(format!("Connection error: {}", e)));
            ctx.end();
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();
    let mut connected = false;

    loop {
        tokio::select! {
            biased;

            _ = &mut cancel_rx => {
                if connected {
                    let packet = Packet::disconnect(&namespace);
                    let _ = write.send(WsMessage::Text(EnginePacket::Message(packet.encode()).encode())).await;
                }
                let _ = write.close().await;
                ctx.emit(Message::info("Disconnected"));
                break;
            }

            Some(text) = outgoing_rx.recv(), if connected => {
                let packet = Packet::event(&namespace, SOCKET_IO_EVENT, vec![Value::String(text)]);
                if let Err(e) = write.send(WsMessage::Text(EnginePacket::Message(packet.encode()).encode())).await {
                    ctx.emit(Message::error(format!("Send failed: {}", e)));
                    break;
                }
            }

            msg = read.next() => {
                let text = match msg {
                    Some(Ok(WsMessage::Text(text))) => text,
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = write.send(WsMessage::Pong(data)).await;
                        continue;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        ctx.emit(Message::info("Disconnected (transport close)"));
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        ctx.emit(Message::error(format!("Connection error: {}", e)));
                        break;
                    }
                };

                match EnginePacket::decode(&text) {
                    Some(EnginePacket::Open(handshake)) => {
                        tracing::debug!(request_id = %ctx.request_id(), %handshake, "Engine.IO open");
                        let packet = Packet::connect(&namespace);
                        if let Err(e) = write.send(WsMessage::Text(EnginePacket::Message(packet.encode()).encode())).await {
                            ctx.emit(Message::error(format!("Connection error: {}", e)));
                            break;
                        }
                    }
                    Some(EnginePacket::Ping(data)) => {
                        if let Err(e) = write.send(WsMessage::Text(EnginePacket::Pong(data).encode())).await {
                            ctx.emit(Message::error(format!("Connection error: {}", e)));
                            break;
                        }
                    }
                    Some(EnginePacket::Close) => {
                        ctx.emit(Message::info("Disconnected (transport close)"));
                        break;
                    }
                    Some(EnginePacket::Message(payload)) => {
                        let Some(packet) = Packet::decode(&payload) else {
                            tracing::debug!(request_id = %ctx.request_id(), payload = %payload, "Unparseable Socket.IO packet");
                            continue;
                        };
                        if packet.namespace != namespace {
                            continue;
                        }
                        match packet.kind {
                            PacketKind::Connect => {
                                connected = true;
                                ctx.opened();
                                let sid = packet
                                    .data
                                    .as_ref()
                                    .and_then(|d| d.get("sid"))
                                    .and_then(Value::as_str)
                                    .unwrap_or_default()
                                    .to_string();
                                tracing::info!(request_id = %ctx.request_id(), sid = %sid, "Socket.IO connected");
                                ctx.emit(Message::success(format!("Connected to {} (id: {})", url, sid)));
                            }
                            PacketKind::ConnectError => {
                                ctx.emit(Message::error(format!("Connection error: {}", packet.error_message())));
                                break;
                            }
                            PacketKind::Event | PacketKind::BinaryEvent => {
                                if let Some(text) = packet.describe_event() {
                                    ctx.emit(Message::received(text));
                                }
                            }
                            PacketKind::Disconnect => {
                                ctx.emit(Message::info("Disconnected (io server disconnect)"));
                                break;
                            }
                            PacketKind::Ack | PacketKind::BinaryAck => {}
                        }
                    }
                    Some(EnginePacket::Pong(_)) | Some(EnginePacket::Upgrade) | Some(EnginePacket::Noop) => {}
                    None => {
                        tracing::debug!(request_id = %ctx.request_id(), frame = %text, "Unknown Engine.IO frame");
                    }
                }
            }
        }
    }

    tracing::info!(request_id = %ctx.request_id(), "Socket.IO session ended");
    ctx.end();
}

//! WebSocket client - raw text sessions

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

use crate::models::Message;
use crate::network::registry::SessionContext;

/// Connect to a WebSocket server and relay messages until either side closes
pub async fn run_websocket(
    ctx: SessionContext,
    url: String,
    mut outgoing_rx: mpsc::UnboundedReceiver<String>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    ctx.emit(Message::info(format!("Connecting to {}...", url)));

    let connect = tokio::select! {
        biased;

        _ = &mut cancel_rx => {
            ctx.emit(Message::info("Disconnected"));
            ctx.end();
            return;
        }
        result = connect_async(url.as_str()) => result,
    };

    let ws_stream = match connect {
        Ok((stream, _response)) => stream,
        Err(e) => {
            tracing::warn!(request_id = %ctx.request_id(), url = %url, error = %e, "WebSocket connect failed");
            ctx.emit(Message::error(format!("Connection failed: {}", e)));
            ctx.end();
            return;
        }
    };

    tracing::info!(request_id = %ctx.request_id(), url = %url, "WebSocket connected");
    ctx.opened();
    ctx.emit(Message::success(format!("Connected to {}", url)));

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;

            _ = &mut cancel_rx => {
                let _ = write.close().await;
                ctx.emit(Message::info("Disconnected"));
                break;
            }

            Some(text) = outgoing_rx.recv() => {
                if let Err(e) = write.send(WsMessage::Text(text)).await {
                    ctx.emit(Message::error(format!("Send failed: {}", e)));
                    break;
                }
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        ctx.emit(Message::received(text));
                    }
                    Some(Ok(WsMessage::Binary(data))) => {
                        let hex = data.iter()
                            .map(|b| format!("{:02x}", b))
                            .collect::<Vec<_>>()
                            .join(" ");
                        ctx.emit(Message::received(format!("[Binary: {} bytes]\n{}", data.len(), hex)));
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = write.send(WsMessage::Pong(data)).await;
                    }
                    Some(Ok(WsMessage::Pong(_))) | Some(Ok(WsMessage::Frame(_))) => {}
                    Some(Ok(WsMessage::Close(frame))) => {
                        let text = match frame {
                            Some(f) if !f.reason.is_empty() => format!("Disconnected ({}: {})", f.code, f.reason),
                            Some(f) => format!("Disconnected ({})", f.code),
                            None => "Disconnected".to_string(),
                        };
                        ctx.emit(Message::info(text));
                        break;
                    }
                    Some(Err(e)) => {
                        ctx.emit(Message::error(format!("Receive error: {}", e)));
                        break;
                    }
                    None => {
                        ctx.emit(Message::info("Disconnected"));
                        break;
                    }
                }
            }
        }
    }

    tracing::info!(request_id = %ctx.request_id(), "WebSocket session ended");
    ctx.end();
}

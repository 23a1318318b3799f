use crate::hub::EventHub;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};

pub struct GatewayServer {
    hub: EventHub,
}

impl GatewayServer {
    pub fn new(hub: EventHub) -> Self {
        Self { hub }
    }

    pub async fn run(&self, addr: SocketAddr) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(addr).await?;
        log::info!("Observer gateway listening on {}", addr);

        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    log::info!("New observer connection from {}", peer_addr);
                    let hub = self.hub.clone();

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, hub).await {
                            log::error!("Connection error from {}: {}", peer_addr, e);
                        }
                    });
                }
                Err(e) => {
                    log::error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    hub: EventHub,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (subscriber_id, mut event_rx) = match hub.subscribe().await {
        Some(subscription) => subscription,
        None => return Err("event hub is not running".into()),
    };

    // Channel for control frames produced by the receive loop
    let (tx, mut rx) = mpsc::channel::<Message>(100);

    // Task to forward messages to the WebSocket
    let send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                // Pong replies
                Some(msg) = rx.recv() => {
                    if ws_sender.send(msg).await.is_err() {
                        break;
                    }
                }
                // Forward events
                Some(event) = event_rx.recv() => {
                    if let Ok(json) = serde_json::to_string(&event) {
                        if ws_sender.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                }
                else => break,
            }
        }
    });

    // Process incoming messages. Observers have no commands to send,
    // so text frames are dropped on the floor.
    while let Some(msg_result) = ws_receiver.next().await {
        match msg_result {
            Ok(Message::Text(_)) => {}
            Ok(Message::Ping(data)) => {
                let _ = tx.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => {
                break;
            }
            Err(e) => {
                log::error!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    // Cleanup
    hub.unsubscribe(&subscriber_id).await;
    send_task.abort();

    Ok(())
}

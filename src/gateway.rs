//! Dashboard socket.
//!
//! A dashboard client connects over WebSocket and sends its session secret
//! as the first text frame. Once authenticated the session is marked
//! active, which exempts it from the sweep, until the last socket bound to
//! that secret closes.

use crate::services::SessionManager;
use crate::telemetry::spans;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{Instrument, debug, error, info, warn};

/// How long a client has to present its secret.
const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SocketGateway {
    listener: TcpListener,
    sessions: Arc<SessionManager>,
}

impl SocketGateway {
    pub async fn bind(addr: SocketAddr, sessions: Arc<SessionManager>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "Dashboard socket listening");
        Ok(Self { listener, sessions })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let sessions = Arc::clone(&self.sessions);
                    let span = spans::socket(&addr.to_string());
                    tokio::spawn(
                        async move {
                            if let Err(e) = handle_connection(stream, sessions).await {
                                debug!(error = %e, "Socket closed with error");
                            }
                        }
                        .instrument(span),
                    );
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept socket connection");
                }
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, sessions: Arc<SessionManager>) -> Result<(), WsError> {
    let mut ws = accept_async(stream).await?;

    let secret = match tokio::time::timeout(AUTH_TIMEOUT, ws.next()).await {
        Ok(Some(Ok(Message::Text(secret)))) => secret.trim().to_string(),
        Ok(None) => return Ok(()),
        Ok(Some(Err(e))) => return Err(e),
        Ok(Some(Ok(_))) => {
            debug!("Socket client sent a non-text first frame");
            return ws.close(None).await;
        }
        Err(_) => {
            debug!("Socket client never authenticated");
            return ws.close(None).await;
        }
    };

    let session = match sessions.authenticate(&secret) {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "Socket authentication rejected");
            ws.send(Message::Text(json!({ "text": e.code().as_str() }).to_string()))
                .await?;
            return ws.close(None).await;
        }
    };

    if let Err(e) = sessions.attach(&secret) {
        error!(error = %e, "Failed to mark session active");
        return ws.close(None).await;
    }
    info!(user = %session.user_name, "Dashboard connected");

    let result = async {
        ws.send(Message::Text(
            json!({ "status": "ok", "userId": session.user_id, "userName": session.user_name })
                .to_string(),
        ))
        .await?;

        // pings are answered by tungstenite itself
        while let Some(frame) = ws.next().await {
            if let Message::Close(_) = frame? {
                break;
            }
        }
        Ok::<(), WsError>(())
    }
    .await;

    if let Err(e) = sessions.detach(&secret) {
        error!(error = %e, "Failed to mark session inactive");
    }
    info!(user = %session.user_name, "Dashboard disconnected");
    result
}

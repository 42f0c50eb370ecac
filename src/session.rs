// src/session.rs

use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use tracing::instrument;

use crate::{
    error::AppError, models::user::Identity, protocol::JsonLineCodec, router, state::AppState,
};

/// Per-connection state. Owned by exactly one session task and dropped with it.
#[derive(Debug)]
pub struct Session {
    peer: SocketAddr,
    identity: Option<Identity>,
}

impl Session {
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            peer,
            identity: None,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Clone of the bound identity, for handlers that act on behalf of the user.
    pub fn actor(&self) -> Result<Identity, AppError> {
        self.identity.clone().ok_or(AppError::Unauthenticated)
    }

    pub fn login(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }

    pub fn logout(&mut self) -> Option<Identity> {
        self.identity.take()
    }
}

/// Drives one client connection until EOF, a read error, or the idle limit.
///
/// Requests are handled strictly in arrival order and each produces exactly one response
/// line before the next request is read.
#[instrument(skip_all, fields(peer = %peer))]
pub async fn run_session<S>(stream: S, peer: SocketAddr, state: AppState)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(stream, JsonLineCodec::new(state.config.max_frame_bytes));
    let mut session = Session::new(peer);
    tracing::info!("Client connected");

    loop {
        let next = match state.config.idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, framed.next()).await {
                Ok(next) => next,
                Err(_) => {
                    tracing::warn!("Closing session after {}s without a request", limit.as_secs());
                    break;
                }
            },
            None => framed.next().await,
        };

        let request = match next {
            Some(Ok(request)) => request,
            Some(Err(e)) => {
                tracing::warn!("Socket read error: {}", e);
                break;
            }
            None => break,
        };

        let response = router::dispatch(&state, &mut session, request).await;
        if let Err(e) = framed.send(response).await {
            tracing::warn!("Failed to write response: {}", e);
            break;
        }
    }

    match session.logout() {
        Some(identity) => tracing::info!(
            "Client disconnected (user: {}, role: {})",
            identity.username,
            identity.role
        ),
        None => tracing::info!("Client disconnected"),
    }
}

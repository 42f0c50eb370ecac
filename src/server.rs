// src/server.rs

use std::{collections::HashSet, io, net::SocketAddr, time::Duration};

use tokio::{
    net::TcpListener,
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
};
use tokio_rustls::TlsAcceptor;

use crate::{session, state::AppState};

/// Lifecycle notifications sent from session tasks to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Connected(SocketAddr),
    Disconnected(SocketAddr),
}

/// Accepts TLS clients forever, one task per connection.
///
/// Only the listener's own setup can fail; per-connection errors (accept, handshake,
/// socket) are logged and never stop the loop.
pub async fn serve(listener: TcpListener, acceptor: TlsAcceptor, state: AppState) -> io::Result<()> {
    let (events, registry) = mpsc::unbounded_channel();
    tokio::spawn(track_sessions(registry));

    tracing::info!("Listening on {}", listener.local_addr()?);

    loop {
        let (tcp, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!("Failed to accept connection: {}", e);
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };

        tokio::spawn(handle_connection(
            tcp,
            peer,
            acceptor.clone(),
            state.clone(),
            events.clone(),
        ));
    }
}

async fn handle_connection(
    tcp: tokio::net::TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
    state: AppState,
    events: UnboundedSender<SessionEvent>,
) {
    let stream =
        match tokio::time::timeout(state.config.handshake_timeout, acceptor.accept(tcp)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                tracing::warn!("TLS handshake with {} failed: {}", peer, e);
                return;
            }
            Err(_) => {
                tracing::warn!("TLS handshake with {} timed out", peer);
                return;
            }
        };

    // The registry only goes away when the runtime shuts down.
    let _ = events.send(SessionEvent::Connected(peer));
    session::run_session(stream, peer, state).await;
    let _ = events.send(SessionEvent::Disconnected(peer));
}

async fn track_sessions(mut events: UnboundedReceiver<SessionEvent>) {
    let mut active = HashSet::new();
    while let Some(event) = events.recv().await {
        apply_event(&mut active, event);
    }
}

fn apply_event(active: &mut HashSet<SocketAddr>, event: SessionEvent) {
    match event {
        SessionEvent::Connected(peer) => {
            active.insert(peer);
            tracing::info!("Session opened for {} ({} active)", peer, active.len());
        }
        SessionEvent::Disconnected(peer) => {
            active.remove(&peer);
            tracing::info!("Session closed for {} ({} active)", peer, active.len());
        }
    }
}

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use courier_proto::WireFormat;
use tokio::net::TcpListener;
use tracing::{error, warn};

use crate::connection;
use crate::state::{ServerState, SharedState};

/// The listener plus the state every connection task shares. One wire format
/// per server; clients pick the matching one out of band.
pub struct ChatServer {
    listener: TcpListener,
    state: SharedState,
    format: WireFormat,
}

impl ChatServer {
    pub async fn bind(addr: &str, format: WireFormat, state: ServerState) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;
        Ok(Self {
            listener,
            state: Arc::new(Mutex::new(state)),
            format,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle kept by the shutdown path so it can snapshot the state after
    /// the accept loop stops.
    pub fn shared_state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    /// Accept connections until `shutdown` resolves. Stopping the accept
    /// loop does not tear down live connections; their tasks hold their own
    /// state handles and drain on their own.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let Self {
            listener,
            state,
            format,
        } = self;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accept = listener.accept() => match accept {
                    Ok((stream, addr)) => {
                        let _ = stream.set_nodelay(true);
                        let state = Arc::clone(&state);
                        tokio::spawn(connection::handle_connection(stream, addr, state, format));
                    }
                    Err(e) => error!("accept failed: {}", e),
                },
            }
        }
        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to install ctrl-c handler: {}", e);
            }
        })
        .await
    }
}

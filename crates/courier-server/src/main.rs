use anyhow::Context;
use courier_proto::WireFormat;
use courier_server::{ChatServer, ServerState};
use courier_store::{JsonFileStore, SnapshotStore};
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier=debug".into()),
        )
        .init();

    // Config
    let host = std::env::var("COURIER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("COURIER_PORT")
        .unwrap_or_else(|_| "8888".into())
        .parse()?;
    let format = match std::env::var("COURIER_WIRE_FORMAT") {
        Ok(name) => {
            WireFormat::parse(&name).with_context(|| format!("unknown wire format '{}'", name))?
        }
        Err(_) => WireFormat::Binary,
    };
    let snapshot_path =
        std::env::var("COURIER_SNAPSHOT_PATH").unwrap_or_else(|_| "courier-snapshot.json".into());

    // Restore accounts and mailboxes from the last snapshot, if any
    let store = JsonFileStore::new(&snapshot_path);
    let state = match store.load()? {
        Some(snapshot) => ServerState::from_snapshot(snapshot)?,
        None => ServerState::new(),
    };

    let server = ChatServer::bind(&format!("{}:{}", host, port), format, state).await?;
    info!(
        "Courier server listening on {} ({} frames)",
        server.local_addr()?,
        format
    );
    let shared = server.shared_state();

    server.run_until_ctrl_c().await?;

    info!("Shutting down, saving snapshot");
    let snapshot = shared.lock().expect("state lock poisoned").snapshot();
    store.save(&snapshot)?;
    Ok(())
}

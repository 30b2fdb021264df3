//! Per-connection plumbing.
//!
//! Each accepted socket gets a reader loop and a spawned writer task joined
//! by the session outbox. The reader accumulates bytes, decodes as many
//! frames as the buffer holds and dispatches each one under the state lock;
//! the writer drains the outbox so a slow peer never blocks dispatch.
//!
//! A protocol error closes the connection; there is no way to resync a
//! corrupt byte stream, and the peer can simply reconnect.

use std::net::SocketAddr;

use anyhow::bail;
use bytes::{Buf, BytesMut};
use courier_proto::{FrameCodec, WireFormat, MAX_FRAME_LEN};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dispatch;
use crate::state::SharedState;

pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: SharedState,
    format: WireFormat,
) {
    let conn_id = Uuid::new_v4();
    let codec = format.codec();
    let (mut reader, mut writer) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    state
        .lock()
        .expect("state lock poisoned")
        .register_session(conn_id, tx);
    info!("{} ({}) connected", addr, conn_id);

    let write_handle = tokio::spawn(async move {
        while let Some(response) = rx.recv().await {
            let frame = codec.encode_response(&response);
            if writer.write_all(&frame).await.is_err() {
                break;
            }
        }
    });

    if let Err(e) = read_loop(&mut reader, conn_id, &state, codec).await {
        warn!("{} ({}): {}", addr, conn_id, e);
    }

    // Dropping the session drops the outbox sender, so the writer sees the
    // channel close only after every queued reply has been flushed.
    state
        .lock()
        .expect("state lock poisoned")
        .drop_session(conn_id);
    let _ = write_handle.await;
    info!("{} ({}) disconnected", addr, conn_id);
}

async fn read_loop(
    reader: &mut OwnedReadHalf,
    conn_id: Uuid,
    state: &SharedState,
    codec: &'static dyn FrameCodec,
) -> anyhow::Result<()> {
    let mut buf = BytesMut::with_capacity(4096);
    loop {
        if reader.read_buf(&mut buf).await? == 0 {
            return Ok(());
        }
        while let Some((request, consumed)) = codec.decode_request(&buf)? {
            buf.advance(consumed);
            let mut guard = state.lock().expect("state lock poisoned");
            dispatch::dispatch(&mut guard, conn_id, request);
        }
        // The codecs cap declared lengths, but a peer can still stream an
        // endless frame body. Cut it off at the same limit.
        if buf.len() > MAX_FRAME_LEN {
            bail!("frame exceeds {} bytes without completing", MAX_FRAME_LEN);
        }
    }
}

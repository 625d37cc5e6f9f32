//! Output pumps: one task per process channel.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace};

use crate::event::{ProcessEvent, RawChunk, StreamKind};
use crate::framing::LineFramer;
use crate::supervisor::SupervisorInner;

const READ_BUF_SIZE: usize = 4096;

/// Pump one channel until it ends.
///
/// Every read is published on the raw bus as-is, then framed into lines
/// for the merged event bus. Empty lines frame but do not publish. A read
/// error ends the channel exactly like EOF; either way the trailing
/// fragment is flushed and the channel-closed transition runs.
pub(crate) async fn pump_channel<R>(
    mut reader: R,
    name: String,
    command: String,
    stream: StreamKind,
    inner: Arc<SupervisorInner>,
) where
    R: AsyncRead + Unpin,
{
    let mut framer = LineFramer::new();
    let mut buf = [0u8; READ_BUF_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let chunk = &buf[..n];
                let _ = inner.raw_tx.send(RawChunk {
                    name: name.clone(),
                    stream,
                    bytes: chunk.to_vec(),
                });
                for line in framer.push(chunk) {
                    if line.is_empty() {
                        continue;
                    }
                    let _ = inner
                        .events_tx
                        .send(ProcessEvent::new(&name, &command, line, stream));
                }
            }
            Err(e) => {
                debug!(name = %name, stream = %stream, error = %e, "channel read error, treating as end");
                break;
            }
        }
    }

    if let Some(line) = framer.finish() {
        let _ = inner
            .events_tx
            .send(ProcessEvent::new(&name, &command, line, stream));
    }

    trace!(name = %name, stream = %stream, "channel ended");
    inner.channel_closed(&name, stream).await;
}

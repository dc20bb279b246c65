//! Newline delimited text feeds over TCP or any other async reader
use flume::{Receiver, Sender};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    net::TcpStream,
};
use tracing::{error, info};

use super::SourceError;
use crate::types::Event;

/// Connect to a text feed at `host:port` and forward every line as an [Event].
///
/// Must be called from within a Tokio runtime. At most `capacity` events are buffered, after
/// that reading from the socket pauses until the engine catches up.
pub async fn connect(host: &str, port: u16, capacity: usize) -> Result<Receiver<Event>, SourceError> {
    let stream = TcpStream::connect((host, port))
        .await
        .map_err(|source| SourceError::Connect {
            addr: format!("{host}:{port}"),
            source,
        })?;
    info!("Connected to event feed at {host}:{port}");
    Ok(spawn_reader(stream, capacity))
}

/// Spawn a task forwarding lines of `reader` into a bounded channel.
/// The channel disconnects when the reader reaches EOF or fails.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_reader<R>(reader: R, capacity: usize) -> Receiver<Event>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = flume::bounded(capacity.max(1));
    tokio::spawn(forward_lines(BufReader::new(reader), tx));
    rx
}

async fn forward_lines<R>(mut reader: BufReader<R>, tx: Sender<Event>)
where
    R: AsyncRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => {
                info!("Event feed reached end of stream");
                break;
            }
            Ok(_) => {
                if line.last() == Some(&b'\n') {
                    line.pop();
                }
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                if tx.send_async(Event::new(line.as_slice())).await.is_err() {
                    // nobody is consuming anymore
                    break;
                }
            }
            Err(e) => {
                error!("Error reading event feed: {e}");
                break;
            }
        }
    }
}

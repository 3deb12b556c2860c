use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

use crate::client::ClientRegistry;
use crate::error::ProtocolError;
use crate::protocol::responses::{ACTION_ABORTED, BAD_REQUEST};
use crate::protocol::{CommandResult, CommandStatus, Response, handle_request, parse_request};
use crate::storage::FsEngine;

/// Outcome of reading one request line.
#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    Eof,
    Line,
    /// More than the limit arrived. `terminated` is set when the newline
    /// was already read, so there is nothing left of the line to discard.
    TooLong { terminated: bool },
}

/// Handles a client session using Tokio async runtime.
///
/// - Uses BufReader to read request lines from the client, never buffering
///   more than `max_request_length` bytes of one line.
/// - Runs each request on the blocking pool via `handle_request`.
/// - Removes the client from `clients` when the session ends.
pub async fn handle_client(
    stream: TcpStream,
    client_addr: SocketAddr,
    clients: Arc<Mutex<ClientRegistry>>,
    engine: Arc<FsEngine>,
    max_request_length: usize,
) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = Vec::new();

    loop {
        let (result, leftover) = match read_request(&mut reader, &mut line, max_request_length).await {
            Ok(LineRead::Eof) => {
                // Client closed the connection
                info!("Connection closed by client {}", client_addr);
                break;
            }
            Ok(LineRead::Line) => {
                let result = match std::str::from_utf8(&line) {
                    Ok(text) => match parse_request(text) {
                        Ok(request) => {
                            debug!("Received from {}: {:?}", client_addr, request);
                            dispatch(Arc::clone(&engine), request).await
                        }
                        Err(e) => reject(e, client_addr),
                    },
                    Err(e) => reject(ProtocolError::Malformed(e.to_string()), client_addr),
                };
                (result, false)
            }
            Ok(LineRead::TooLong { terminated }) => (
                reject(ProtocolError::TooLong(max_request_length), client_addr),
                !terminated,
            ),
            Err(e) => {
                error!("Failed to read from {}: {}", client_addr, e);
                break;
            }
        };

        if let Some(session) = clients.lock().await.get_mut(&client_addr) {
            session.record(!matches!(result.status, CommandStatus::Failure(_)));
        }

        if let Err(e) = send(&mut write_half, &result.response).await {
            error!("Failed to write to {}: {}", client_addr, e);
            break;
        }

        if result.status == CommandStatus::CloseConnection {
            info!("Client {} requested to quit", client_addr);
            break;
        }

        if leftover {
            if let Err(e) = discard_line(&mut reader).await {
                error!("Failed to read from {}: {}", client_addr, e);
                break;
            }
        }
    }

    if let Some(session) = clients.lock().await.remove(&client_addr) {
        info!(
            "Client {} disconnected after {} request(s), {} failed, connected {:?}",
            client_addr,
            session.requests(),
            session.failures(),
            session.connected_for()
        );
    }
}

/// Reads one line into `line`, stopping after `limit + 1` bytes.
async fn read_request<R>(reader: &mut R, line: &mut Vec<u8>, limit: usize) -> std::io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    line.clear();
    let read = (&mut *reader)
        .take(limit as u64 + 1)
        .read_until(b'\n', line)
        .await?;

    if read == 0 {
        Ok(LineRead::Eof)
    } else if line.len() > limit {
        Ok(LineRead::TooLong {
            terminated: line.ends_with(b"\n"),
        })
    } else {
        Ok(LineRead::Line)
    }
}

/// Drops input up to and including the next newline, or until EOF.
async fn discard_line<R>(reader: &mut R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let (consumed, done) = {
            let available = reader.fill_buf().await?;
            match available.iter().position(|&b| b == b'\n') {
                Some(i) => (i + 1, true),
                None => (available.len(), available.is_empty()),
            }
        };
        reader.consume(consumed);
        if done {
            return Ok(());
        }
    }
}

async fn dispatch(engine: Arc<FsEngine>, request: crate::protocol::Request) -> CommandResult {
    match tokio::task::spawn_blocking(move || handle_request(&engine, request)).await {
        Ok(result) => result,
        Err(e) => {
            error!("Request worker failed: {}", e);
            CommandResult {
                status: CommandStatus::Failure(e.to_string()),
                response: Response::error(ACTION_ABORTED, "Requested action aborted"),
            }
        }
    }
}

fn reject(err: ProtocolError, client_addr: SocketAddr) -> CommandResult {
    warn!("Rejected request from {}: {}", client_addr, err);
    CommandResult {
        status: CommandStatus::Failure(err.to_string()),
        response: Response::error(BAD_REQUEST, err.to_string()),
    }
}

pub(crate) async fn send(writer: &mut OwnedWriteHalf, response: &Response) -> std::io::Result<()> {
    writer.write_all(response.to_line().as_bytes()).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_request_lines() {
        let mut reader = BufReader::new(&b"{\"op\":\"root\"}\nlast"[..]);
        let mut line = Vec::new();

        assert_eq!(read_request(&mut reader, &mut line, 64).await.unwrap(), LineRead::Line);
        assert_eq!(line, b"{\"op\":\"root\"}\n");
        assert_eq!(read_request(&mut reader, &mut line, 64).await.unwrap(), LineRead::Line);
        assert_eq!(line, b"last");
        assert_eq!(read_request(&mut reader, &mut line, 64).await.unwrap(), LineRead::Eof);
    }

    #[tokio::test]
    async fn test_oversized_line_is_capped_then_discarded() {
        let mut input = vec![b'x'; 10_000];
        input.extend_from_slice(b"\nnext\n");
        let mut reader = BufReader::with_capacity(16, &input[..]);
        let mut line = Vec::new();

        assert_eq!(
            read_request(&mut reader, &mut line, 8).await.unwrap(),
            LineRead::TooLong { terminated: false }
        );
        assert_eq!(line.len(), 9);

        discard_line(&mut reader).await.unwrap();
        assert_eq!(read_request(&mut reader, &mut line, 8).await.unwrap(), LineRead::Line);
        assert_eq!(line, b"next\n");
    }

    #[tokio::test]
    async fn test_line_at_limit_boundary() {
        let mut reader = BufReader::new(&b"1234567\n12345678\n"[..]);
        let mut line = Vec::new();

        assert_eq!(read_request(&mut reader, &mut line, 8).await.unwrap(), LineRead::Line);
        assert_eq!(
            read_request(&mut reader, &mut line, 8).await.unwrap(),
            LineRead::TooLong { terminated: true }
        );
        assert_eq!(read_request(&mut reader, &mut line, 8).await.unwrap(), LineRead::Eof);
    }

    #[tokio::test]
    async fn test_discard_stops_at_eof() {
        let mut reader = BufReader::with_capacity(4, &b"no newline here"[..]);
        discard_line(&mut reader).await.unwrap();
        let mut line = Vec::new();
        assert_eq!(read_request(&mut reader, &mut line, 8).await.unwrap(), LineRead::Eof);
    }
}

use std::io::ErrorKind;

use anyhow::{Context, Result};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{error, trace};

use crate::{command::Command, owner::StoreHandle};

/// Longest accepted request line, newline included.
pub const MAX_LINE_BYTES: u64 = 64 * 1024;

/// Client input that ends the connection without being answered.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("request line exceeds {MAX_LINE_BYTES} bytes")]
    LineTooLong,
    #[error("request line is not valid UTF-8")]
    NotUtf8,
}

/// Serves one client until it quits, disconnects, or an I/O error occurs.
///
/// Each line is parsed, submitted to the store task, and answered with a
/// single reply line before the next line is read, so a client's own
/// requests are applied in the order it sent them.
pub async fn handle_connection<R, W>(
    reader: &mut R,
    writer: &mut W,
    store: &StoreHandle,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();

    loop {
        line.clear();
        let bytes = match (&mut *reader).take(MAX_LINE_BYTES).read_line(&mut line).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::InvalidData => {
                return Err(ConnectionError::NotUtf8.into());
            }
            Err(err) => return Err(err).context("failed to read request line"),
        };
        if bytes as u64 == MAX_LINE_BYTES && !line.ends_with('\n') {
            return Err(ConnectionError::LineTooLong.into());
        }
        if bytes == 0 {
            trace!("peer closed the connection");
            return Ok(());
        }

        let command = Command::parse(&line);
        trace!(?command, "parsed request");
        if command == Command::Quit {
            return Ok(());
        }

        let reply = store.submit(command).await.inspect_err(|err| {
            error!(error = %err, "store task unreachable");
        })?;

        write_reply(writer, reply.as_deref().unwrap_or_default()).await?;
    }
}

async fn write_reply<W>(writer: &mut W, reply: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    // Single write so the reply and its delimiter leave together.
    let mut encoded = Vec::with_capacity(reply.len() + 1);
    encoded.extend_from_slice(reply.as_bytes());
    encoded.push(b'\n');
    writer
        .write_all(&encoded)
        .await
        .context("failed to write reply")?;
    writer.flush().await.context("failed to flush reply")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owner;
    use tokio::io::{AsyncReadExt, BufReader};

    async fn run_session(input: &str) -> String {
        let (store, task) = owner::spawn();
        let mut reader = BufReader::new(input.as_bytes());
        let mut output = Vec::new();

        handle_connection(&mut reader, &mut output, &store)
            .await
            .expect("session should succeed");

        drop(store);
        task.await.expect("store task should not panic");
        String::from_utf8(output).expect("replies are utf-8")
    }

    #[tokio::test]
    async fn answers_every_line_in_order() {
        let output = run_session("SET a b\nGET a\nDEL a\nGET a\nDEL a\n").await;
        assert_eq!(output, "OK\nb\n1\n\n0\n");
    }

    #[tokio::test]
    async fn quit_stops_without_reply() {
        let output = run_session("SET a b\nQUIT\nGET a\n").await;
        assert_eq!(output, "OK\n");
    }

    #[tokio::test]
    async fn final_line_without_newline_is_answered() {
        let output = run_session("INCR c\nINCR c").await;
        assert_eq!(output, "1\n2\n");
    }

    #[tokio::test]
    async fn malformed_and_unknown_requests_keep_connection_open() {
        let output = run_session("GET\nSET a\nPING\nSET a 1\nINCR a\n").await;
        assert_eq!(output, "\n\nN/A\nOK\n2\n");
    }

    async fn run_failing_session(input: Vec<u8>) -> (ConnectionError, String) {
        let (store, _task) = owner::spawn();
        let mut reader = BufReader::new(input.as_slice());
        let mut output = Vec::new();

        let err = handle_connection(&mut reader, &mut output, &store)
            .await
            .expect_err("session should fail");
        let err = err
            .downcast::<ConnectionError>()
            .expect("typed connection error");
        (err, String::from_utf8(output).expect("replies are utf-8"))
    }

    #[tokio::test]
    async fn oversized_lines_end_the_connection() {
        let mut input = b"SET a 1\n".to_vec();
        input.extend(std::iter::repeat_n(b'x', MAX_LINE_BYTES as usize + 10));
        input.extend_from_slice(b"\nGET a\n");

        let (err, output) = run_failing_session(input).await;
        assert_eq!(err, ConnectionError::LineTooLong);
        assert_eq!(output, "OK\n");
    }

    #[tokio::test]
    async fn lines_up_to_the_limit_are_accepted() {
        let value = "v".repeat(MAX_LINE_BYTES as usize - "SET k \n".len());
        let output = run_session(&format!("SET k {value}\nGET k\n")).await;
        assert_eq!(output, format!("OK\n{value}\n"));
    }

    #[tokio::test]
    async fn invalid_utf8_ends_the_connection() {
        let mut input = b"INCR n\n".to_vec();
        input.extend_from_slice(&[b'G', 0xff, b'\n']);
        input.extend_from_slice(b"INCR n\n");

        let (err, output) = run_failing_session(input).await;
        assert_eq!(err, ConnectionError::NotUtf8);
        assert_eq!(output, "1\n");
    }

    #[tokio::test]
    async fn works_over_a_duplex_stream() {
        let (store, _task) = owner::spawn();
        let (client, server) = tokio::io::duplex(1024);
        let (server_read, mut server_write) = tokio::io::split(server);

        let session = tokio::spawn(async move {
            let mut reader = BufReader::new(server_read);
            handle_connection(&mut reader, &mut server_write, &store).await
        });

        let (mut client_read, mut client_write) = tokio::io::split(client);
        client_write.write_all(b"INCR hits\r\nSTOP\r\n").await.unwrap();

        let mut received = String::new();
        client_read.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "1\n");

        session.await.unwrap().unwrap();
    }
}

use std::io::BufRead;

use anyhow::{Context, Result};
use tokio::{
    io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpStream, tcp::OwnedWriteHalf},
    select,
    sync::mpsc,
};
use tracing::{info, warn};

use crate::{cli::ClientArgs, command::Command};

const LINE_CHANNEL_CAPACITY: usize = 64;

type LineReceiver = mpsc::Receiver<io::Result<String>>;

/// Sends stdin lines to the server and prints every reply line.
///
/// Both inputs are read by their own tasks and arrive here as whole lines
/// over channels, so a `select!` never abandons a half-read line.
pub async fn run(args: ClientArgs) -> Result<()> {
    let stream = TcpStream::connect(args.server)
        .await
        .with_context(|| format!("failed to connect to {}", args.server))?;
    info!("connected to {}", args.server);

    let (reader, mut writer) = stream.into_split();
    let mut replies = spawn_line_reader(BufReader::new(reader));
    let mut requests = spawn_stdin_reader();

    run_client_loop(&mut replies, &mut requests, &mut writer).await?;
    shutdown_connection(&mut writer).await;

    Ok(())
}

/// Reads newline-terminated lines from `reader` on a separate task.
///
/// Lines are delivered without their line ending. The channel closes after
/// end-of-stream or after the first read error, which is forwarded.
pub fn spawn_line_reader<R>(mut reader: R) -> LineReceiver
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
    tokio::spawn(async move {
        let mut line = String::new();
        loop {
            line.clear();
            let outcome = match reader.read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) => Ok(line.trim_end_matches(['\r', '\n']).to_string()),
                Err(err) => Err(err),
            };
            let failed = outcome.is_err();
            if tx.send(outcome).await.is_err() || failed {
                break;
            }
        }
    });
    rx
}

/// Reads stdin lines on a dedicated OS thread, outside the runtime.
fn spawn_stdin_reader() -> LineReceiver {
    let (tx, rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let failed = line.is_err();
            if tx.blocking_send(line).is_err() || failed {
                break;
            }
        }
    });
    rx
}

async fn run_client_loop(
    replies: &mut LineReceiver,
    requests: &mut LineReceiver,
    writer: &mut OwnedWriteHalf,
) -> Result<()> {
    loop {
        select! {
            reply = replies.recv() => {
                if !handle_server_reply(reply).await? {
                    break;
                }
            }
            request = requests.recv() => {
                if !handle_stdin_input(request, writer).await? {
                    break;
                }
            }
            ctrl_c = tokio::signal::ctrl_c() => {
                handle_ctrl_c(ctrl_c);
                break;
            }
        }
    }
    Ok(())
}

async fn handle_server_reply(reply: Option<io::Result<String>>) -> Result<bool> {
    match reply {
        Some(reply) => {
            write_stdout(&reply.context("failed to read reply")?).await?;
            Ok(true)
        }
        None => {
            write_stderr("*** server closed the connection").await?;
            Ok(false)
        }
    }
}

/// Forwards one stdin line. Returns `false` once the session should end.
async fn handle_stdin_input(
    request: Option<io::Result<String>>,
    writer: &mut OwnedWriteHalf,
) -> Result<bool> {
    let Some(line) = request else {
        return Ok(false);
    };
    let line = line.context("failed to read stdin")?;

    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;

    // The server hangs up on QUIT/STOP without replying.
    Ok(Command::parse(&line) != Command::Quit)
}

fn handle_ctrl_c(result: io::Result<()>) {
    if let Err(error) = result {
        warn!(?error, "ctrl-c handler failed");
    }
}

async fn shutdown_connection(writer: &mut OwnedWriteHalf) {
    if let Err(error) = writer.shutdown().await {
        warn!(?error, "failed to shutdown client writer cleanly");
    }
}

async fn write_stdout(line: &str) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}

async fn write_stderr(line: &str) -> io::Result<()> {
    let mut stderr = tokio::io::stderr();
    stderr.write_all(line.as_bytes()).await?;
    stderr.write_all(b"\n").await?;
    stderr.flush().await
}

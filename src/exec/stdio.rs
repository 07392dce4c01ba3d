// ABOUTME: Copy pipelines between local streams and a session's standard streams.
// ABOUTME: One worker per direction, with the process's own stdin shared through a single reader thread.

use crate::diagnostics::{Diagnostics, Warning};
use crate::ssh::SessionIo;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::io::{self, Read};
use std::sync::Once;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Caller-supplied input stream.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
/// Caller-supplied output stream.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

const PIPELINE_DEPTH: usize = 32;
const READ_CHUNK: usize = 8 * 1024;

/// Stream overrides for one command. `None` means the process's own stream.
#[derive(Default)]
pub(crate) struct Streams {
    pub stdin: Option<BoxedReader>,
    pub stdout: Option<BoxedWriter>,
    pub stderr: Option<BoxedWriter>,
}

/// Running copy workers for one command.
pub(crate) struct Pipelines {
    input: Option<InputPipeline>,
    output: Option<JoinHandle<io::Result<u64>>>,
    error: Option<JoinHandle<io::Result<u64>>>,
}

enum InputPipeline {
    Caller(JoinHandle<()>),
    ProcessStdin(StdinAttachment),
}

/// Start the copy workers and return the session side of each pipeline.
pub(crate) fn wire(streams: Streams) -> (SessionIo, Pipelines) {
    let (input_tx, input_rx) = mpsc::channel(PIPELINE_DEPTH);
    let (output_tx, output_rx) = mpsc::channel(PIPELINE_DEPTH);
    let (error_tx, error_rx) = mpsc::channel(PIPELINE_DEPTH);

    let input = match streams.stdin {
        Some(reader) => InputPipeline::Caller(tokio::spawn(pump_input(reader, input_tx))),
        None => InputPipeline::ProcessStdin(StdinAttachment::attach(input_tx)),
    };

    let stdout = streams
        .stdout
        .unwrap_or_else(|| Box::new(tokio::io::stdout()));
    let stderr = streams
        .stderr
        .unwrap_or_else(|| Box::new(tokio::io::stderr()));

    let io = SessionIo {
        input: input_rx,
        output: output_tx,
        error: error_tx,
    };
    let pipelines = Pipelines {
        input: Some(input),
        output: Some(tokio::spawn(drain(output_rx, stdout))),
        error: Some(tokio::spawn(drain(error_rx, stderr))),
    };
    (io, pipelines)
}

impl Pipelines {
    /// Stop feeding input and wait for output and error to drain.
    ///
    /// Call once the session has returned from execution, so that the
    /// session's senders are gone and the drains can see end-of-stream.
    pub(crate) async fn finish(mut self, diag: &mut Diagnostics) {
        self.stop_input();

        let drains = [("stdout", self.output.take()), ("stderr", self.error.take())];
        for (name, handle) in drains {
            let Some(handle) = handle else { continue };
            match handle.await {
                Ok(Ok(bytes)) => tracing::debug!("Drained {} bytes of {}", bytes, name),
                Ok(Err(e)) => diag.warn(Warning::stream_copy(format!(
                    "failed to copy remote {name}: {e}"
                ))),
                Err(e) => diag.warn(Warning::stream_copy(format!(
                    "{name} pipeline ended abnormally: {e}"
                ))),
            }
        }
    }

    fn stop_input(&mut self) {
        match self.input.take() {
            Some(InputPipeline::Caller(handle)) => handle.abort(),
            Some(InputPipeline::ProcessStdin(attachment)) => drop(attachment),
            None => {}
        }
    }
}

impl Drop for Pipelines {
    fn drop(&mut self) {
        self.stop_input();
    }
}

/// Copy a caller's input stream into the session until it ends.
///
/// Dropping the sender on return is what tells the session to send EOF.
async fn pump_input(mut reader: BoxedReader, tx: mpsc::Sender<Bytes>) {
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    loop {
        buf.reserve(READ_CHUNK);
        match reader.read_buf(&mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if tx.send(buf.split().freeze()).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!("Input stream read error: {}", e);
                break;
            }
        }
    }
}

/// Copy session output into a local stream, closing it when the session is done.
async fn drain(mut rx: mpsc::Receiver<Bytes>, mut writer: BoxedWriter) -> io::Result<u64> {
    let mut copied = 0u64;
    while let Some(chunk) = rx.recv().await {
        writer.write_all(&chunk).await?;
        writer.flush().await?;
        copied += chunk.len() as u64;
    }
    writer.shutdown().await?;
    Ok(copied)
}

/// Session currently fed by the process's standard input, tagged with its attachment id.
static STDIN_TARGET: Mutex<Option<(u64, mpsc::Sender<Bytes>)>> = parking_lot::const_mutex(None);
/// Set once the process's standard input has reached end-of-file. Guarded by `STDIN_TARGET`.
static STDIN_EOF: AtomicBool = AtomicBool::new(false);
static NEXT_ATTACHMENT: AtomicU64 = AtomicU64::new(0);
static STDIN_READER: Once = Once::new();

/// Connects the process's standard input to one session for its lifetime.
///
/// A blocking read on stdin cannot be cancelled, so a single reader thread
/// lives for the whole process and hands chunks to whichever session is
/// attached. Bytes read while no session is attached are dropped.
struct StdinAttachment {
    id: u64,
}

impl StdinAttachment {
    fn attach(tx: mpsc::Sender<Bytes>) -> Self {
        let id = NEXT_ATTACHMENT.fetch_add(1, Ordering::SeqCst);
        {
            let mut target = STDIN_TARGET.lock();
            // After end-of-file, dropping the sender closes the session's input straight away.
            if !STDIN_EOF.load(Ordering::SeqCst) {
                *target = Some((id, tx));
            }
        }
        STDIN_READER.call_once(spawn_stdin_reader);
        Self { id }
    }
}

impl Drop for StdinAttachment {
    fn drop(&mut self) {
        let mut target = STDIN_TARGET.lock();
        if matches!(*target, Some((id, _)) if id == self.id) {
            target.take();
        }
    }
}

fn spawn_stdin_reader() {
    let spawned = std::thread::Builder::new()
        .name("rexec-stdin".to_string())
        .spawn(|| {
            let mut stdin = io::stdin();
            let mut buf = vec![0u8; READ_CHUNK];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        let target = STDIN_TARGET.lock().as_ref().map(|(_, tx)| tx.clone());
                        let delivered = match target {
                            Some(tx) => tx.blocking_send(Bytes::copy_from_slice(&buf[..n])).is_ok(),
                            None => false,
                        };
                        if !delivered {
                            tracing::trace!("No session attached to stdin, dropping {} bytes", n);
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        tracing::debug!("Standard input read error: {}", e);
                        break;
                    }
                }
            }
            let mut target = STDIN_TARGET.lock();
            STDIN_EOF.store(true, Ordering::SeqCst);
            target.take();
        });

    if let Err(e) = spawned {
        tracing::warn!("Failed to start standard input reader: {}", e);
    }
}

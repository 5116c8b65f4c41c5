//! Kubernetes pod attach functionality
//!
//! Attaches the local terminal to a session container using the kube crate's
//! websocket support.

use std::io::{IsTerminal, Read};

use futures::SinkExt;
use k8s_openapi::api::core::v1::Pod;
use kube::{
    api::{Api, AttachParams, TerminalSize as KubeTerminalSize},
    Client,
};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use super::client::{AttachOptions, KubeClientError};

/// Terminal size for attach
#[derive(Debug, Clone, Copy)]
pub struct TerminalSize {
    pub cols: u16,
    pub rows: u16,
}

impl From<TerminalSize> for KubeTerminalSize {
    fn from(size: TerminalSize) -> Self {
        KubeTerminalSize {
            width: size.cols,
            height: size.rows,
        }
    }
}

impl TerminalSize {
    /// Current size of the local terminal, if there is one
    pub fn current() -> Option<Self> {
        crossterm::terminal::size()
            .ok()
            .map(|(cols, rows)| Self { cols, rows })
    }
}

/// Puts the local terminal into raw mode for as long as it is alive
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Option<Self> {
        if !std::io::stdin().is_terminal() {
            return None;
        }
        match crossterm::terminal::enable_raw_mode() {
            Ok(()) => Some(Self),
            Err(e) => {
                tracing::warn!("Failed to enable raw mode: {}", e);
                None
            }
        }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::terminal::disable_raw_mode();
    }
}

/// Read `reader` on a dedicated thread and forward chunks until EOF.
///
/// A blocking read cannot be cancelled, so it must not live on the runtime's
/// blocking pool where it would hold up shutdown.
fn spawn_stdin_reader<R>(mut reader: R) -> std::io::Result<mpsc::Receiver<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Vec<u8>>(256);
    std::thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.blocking_send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        tracing::debug!("stdin read failed: {}", e);
                        break;
                    }
                }
            }
        })?;
    Ok(rx)
}

/// Attach stdin/stdout to the primary process of a pod and pump bytes until
/// the remote side closes.
pub async fn attach_interactive(
    client: &Client,
    namespace: &str,
    pod_name: &str,
    options: &AttachOptions,
) -> Result<(), KubeClientError> {
    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);

    let mut params = AttachParams::default()
        .stdin(options.stdin)
        .stdout(true)
        .stderr(!options.tty)
        .tty(options.tty);
    if let Some(ref container) = options.container {
        params = params.container(container);
    }

    let mut attached = tokio::time::timeout(options.timeout, pods.attach(pod_name, &params))
        .await
        .map_err(|_| KubeClientError::AttachTimeout(options.timeout))??;

    if !options.quiet {
        eprintln!("If you don't see a command prompt, try pressing enter.");
    }

    let _raw = if options.tty { RawModeGuard::enable() } else { None };

    if options.tty {
        if let (Some(mut resize), Some(size)) = (attached.terminal_size(), TerminalSize::current()) {
            let _ = resize.send(size.into()).await;
        }
    }

    let mut remote_stdout = attached
        .stdout()
        .ok_or_else(|| KubeClientError::AttachError("stdout not available".into()))?;
    let remote_stdin = if options.stdin { attached.stdin() } else { None };

    let output = async {
        let mut stdout = tokio::io::stdout();
        tokio::io::copy(&mut remote_stdout, &mut stdout).await
    };
    tokio::pin!(output);

    match remote_stdin {
        Some(mut remote_stdin) => {
            let mut chunks = spawn_stdin_reader(std::io::stdin())?;
            let input = async {
                while let Some(chunk) = chunks.recv().await {
                    remote_stdin.write_all(&chunk).await?;
                }
                remote_stdin.flush().await
            };
            tokio::select! {
                result = &mut output => { result?; }
                result = input => {
                    // Local EOF; the remote process decides when the session ends
                    if let Err(e) = result {
                        tracing::debug!("stdin copy ended: {}", e);
                    }
                    output.await?;
                }
            }
        }
        None => {
            output.await?;
        }
    }

    tracing::info!("Attach stream for {}/{} ended", namespace, pod_name);
    attached
        .join()
        .await
        .map_err(|e| KubeClientError::AttachError(e.to_string()))?;
    Ok(())
}

//! In-process SSH server for exercising [`SshSession`](crate::SshSession)
//! without a real job.
//!
//! Every exec request runs through the local `sh` with `HOME` pointed at a
//! scratch directory. Stdin is buffered until the client sends EOF. The exit
//! status is sent before the command output, the same order some servers use.

use crate::{SshError, SshTarget};
use log::debug;
use russh::keys::{Algorithm, PrivateKey, PublicKey};
use russh::server::{self, Auth, Msg, Session};
use russh::{Channel, ChannelId, CryptoVec};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::runtime::Runtime;

pub const TEST_USER: &str = "rescale";

struct Shared {
    home: PathBuf,
    connections: AtomicUsize,
    disconnects: AtomicUsize,
    commands: Mutex<Vec<String>>,
    omit_exit_status: AtomicBool,
}

pub struct TestServer {
    runtime: Runtime,
    port: u16,
    shared: Arc<Shared>,
}

impl TestServer {
    /// Starts listening on an ephemeral loopback port.
    pub fn start(home: &Path) -> Result<Self, SshError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;

        let host_key = PrivateKey::random(&mut rand::thread_rng(), Algorithm::Ed25519)
            .map_err(|e| SshError::ConfigurationError(e.to_string()))?;
        let config = Arc::new(server::Config {
            keys: vec![host_key],
            auth_rejection_time: Duration::from_millis(10),
            auth_rejection_time_initial: Some(Duration::ZERO),
            inactivity_timeout: Some(Duration::from_secs(30)),
            ..Default::default()
        });

        let listener = runtime.block_on(TcpListener::bind(("127.0.0.1", 0)))?;
        let port = listener.local_addr()?.port();

        let shared = Arc::new(Shared {
            home: home.to_path_buf(),
            connections: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            commands: Mutex::new(Vec::new()),
            omit_exit_status: AtomicBool::new(false),
        });
        runtime.spawn(accept_loop(listener, config, Arc::clone(&shared)));

        Ok(Self {
            runtime,
            port,
            shared,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn target(&self) -> SshTarget {
        SshTarget {
            host: "127.0.0.1".to_string(),
            user: TEST_USER.to_string(),
            port: self.port,
        }
    }

    /// Number of accepted TCP connections so far.
    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// Number of SSH sessions that have ended.
    pub fn disconnects(&self) -> usize {
        self.shared.disconnects.load(Ordering::SeqCst)
    }

    /// Commands received so far, in arrival order.
    pub fn commands(&self) -> Vec<String> {
        self.shared
            .commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Makes later commands finish without reporting an exit status.
    pub fn omit_exit_status(&self) {
        self.shared.omit_exit_status.store(true, Ordering::SeqCst);
    }

    /// Polls until `count` sessions have ended or `timeout` elapses.
    pub fn wait_for_disconnects(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.disconnects() < count {
            if Instant::now() >= deadline {
                return false;
            }
            self.runtime
                .block_on(async { tokio::time::sleep(Duration::from_millis(20)).await });
        }
        true
    }
}

async fn accept_loop(listener: TcpListener, config: Arc<server::Config>, shared: Arc<Shared>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                debug!("Test server accept failed: {}", e);
                return;
            }
        };
        shared.connections.fetch_add(1, Ordering::SeqCst);
        debug!("Test server connection from {}", peer);

        let handler = Connection {
            shared: Arc::clone(&shared),
            channels: HashMap::new(),
        };
        let config = Arc::clone(&config);
        tokio::spawn(async move {
            match server::run_stream(config, stream, handler).await {
                Ok(session) => {
                    if let Err(e) = session.await {
                        debug!("Test server session ended with error: {}", e);
                    }
                }
                Err(e) => debug!("Test server handshake failed: {}", e),
            }
        });
    }
}

#[derive(Default)]
struct PendingExec {
    command: Option<String>,
    stdin: Vec<u8>,
}

struct Connection {
    shared: Arc<Shared>,
    channels: HashMap<ChannelId, PendingExec>,
}

impl server::Handler for Connection {
    type Error = russh::Error;

    async fn auth_publickey(
        &mut self,
        user: &str,
        public_key: &PublicKey,
    ) -> Result<Auth, Self::Error> {
        debug!("Test server accepting {} key for {}", public_key.algorithm(), user);
        Ok(Auth::Accept)
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        self.channels.insert(channel.id(), PendingExec::default());
        Ok(true)
    }

    async fn exec_request(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let command = String::from_utf8_lossy(data).into_owned();
        self.shared
            .commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command.clone());

        self.channels.entry(channel).or_default().command = Some(command);
        session.channel_success(channel)?;
        Ok(())
    }

    async fn data(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.channels
            .entry(channel)
            .or_default()
            .stdin
            .extend_from_slice(data);
        Ok(())
    }

    async fn channel_eof(
        &mut self,
        channel: ChannelId,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let Some(PendingExec {
            command: Some(command),
            stdin,
        }) = self.channels.remove(&channel)
        else {
            return Ok(());
        };

        let handle = session.handle();
        let home = self.shared.home.clone();
        let omit_exit_status = self.shared.omit_exit_status.load(Ordering::SeqCst);

        tokio::spawn(async move {
            let (status, stdout, stderr) = run_local(&home, &command, &stdin).await;

            if !omit_exit_status {
                let _ = handle.exit_status_request(channel, status).await;
            }
            if !stdout.is_empty() {
                let _ = handle.data(channel, CryptoVec::from_slice(&stdout)).await;
            }
            if !stderr.is_empty() {
                let _ = handle
                    .extended_data(channel, 1, CryptoVec::from_slice(&stderr))
                    .await;
            }
            let _ = handle.eof(channel).await;
            let _ = handle.close(channel).await;
        });
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shared.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

async fn run_local(home: &Path, command: &str, stdin: &[u8]) -> (u32, Vec<u8>, Vec<u8>) {
    let child = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .env("HOME", home)
        .current_dir(home)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();
    let mut child = match child {
        Ok(child) => child,
        Err(e) => return (127, Vec::new(), e.to_string().into_bytes()),
    };

    if let Some(mut input) = child.stdin.take() {
        if let Err(e) = input.write_all(stdin).await {
            debug!("Test server could not feed stdin: {}", e);
        }
    }

    match child.wait_with_output().await {
        Ok(output) => (
            output.status.code().unwrap_or(255) as u32,
            output.stdout,
            output.stderr,
        ),
        Err(e) => (255, Vec::new(), e.to_string().into_bytes()),
    }
}

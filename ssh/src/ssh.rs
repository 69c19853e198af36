use crate::remote::{append_command, line_payload, upload_command};
use crate::SshError;
use log::{debug, info};
use russh::client::{self, Handle};
use russh::keys::{load_secret_key, HashAlg, PrivateKeyWithHashAlg, PublicKey};
use russh::{ChannelMsg, Disconnect};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Identity files tried when no key is given on the command line.
const DEFAULT_IDENTITIES: [&str; 3] = ["~/.ssh/id_ed25519", "~/.ssh/id_ecdsa", "~/.ssh/id_rsa"];

/// Login target for a job's head node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub user: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: u32,
}

struct Client;

impl client::Handler for Client {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!(
            "Accepting server key {}",
            server_public_key.fingerprint(HashAlg::Sha256)
        );
        Ok(true)
    }
}

/// Returns the operator key files to authenticate with.
///
/// An explicit key must exist. Without one, the conventional identities in
/// `~/.ssh` that are present are returned in preference order.
pub fn resolve_identities(explicit: Option<&Path>) -> Result<Vec<PathBuf>, SshError> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(SshError::ConfigurationError(format!(
                "SSH private key {} not found",
                path.display()
            )));
        }
        return Ok(vec![path.to_path_buf()]);
    }

    let found: Vec<PathBuf> = DEFAULT_IDENTITIES
        .iter()
        .map(|path| PathBuf::from(shellexpand::tilde(path).into_owned()))
        .filter(|path| path.is_file())
        .collect();

    if found.is_empty() {
        return Err(SshError::ConfigurationError(
            "No SSH private key given and none found in ~/.ssh".to_string(),
        ));
    }
    Ok(found)
}

/// Blocking SSH session to one job.
///
/// The session owns a current-thread runtime and drives every request to
/// completion before returning, so callers stay fully synchronous.
pub struct SshSession {
    target: SshTarget,
    runtime: Runtime,
    handle: Handle<Client>,
}

impl SshSession {
    pub fn connect(target: &SshTarget, identities: &[PathBuf]) -> Result<Self, SshError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        info!(
            "Connecting to {}@{}:{}",
            target.user, target.host, target.port
        );
        let handle = runtime.block_on(open(target, identities))?;

        Ok(Self {
            target: target.clone(),
            runtime,
            handle,
        })
    }

    pub fn target(&self) -> &SshTarget {
        &self.target
    }

    /// Runs a trivial command to prove the login works.
    pub fn verify(&self) -> Result<(), SshError> {
        info!("Testing SSH connection to {}", self.target.host);
        let output = self.exec("echo \"SSH connection successful\"", b"")?;
        info!("{}", output.stdout.trim());
        Ok(())
    }

    /// Runs `command` with `stdin` and fails on a non-zero exit status.
    pub fn exec(&self, command: &str, stdin: &[u8]) -> Result<CommandOutput, SshError> {
        let output = self.runtime.block_on(run(&self.handle, command, stdin))?;
        if output.exit_status != 0 {
            return Err(SshError::CommandFailed {
                host: self.target.host.clone(),
                exit_status: output.exit_status,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }

    /// Writes `content` to `remote_path`, replacing any previous file.
    pub fn upload(&self, remote_path: &str, content: &[u8], mode: u32) -> Result<(), SshError> {
        debug!(
            "Writing {} bytes to {} on {} (mode {:o})",
            content.len(),
            remote_path,
            self.target.host,
            mode
        );
        self.exec(&upload_command(remote_path, mode), content)?;
        Ok(())
    }

    /// Appends one line to `remote_path`, leaving the existing content intact.
    pub fn append_line(&self, remote_path: &str, line: &str) -> Result<(), SshError> {
        debug!("Appending a line to {} on {}", remote_path, self.target.host);
        self.exec(&append_command(remote_path), line_payload(line).as_bytes())?;
        Ok(())
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        let result = self.runtime.block_on(self.handle.disconnect(
            Disconnect::ByApplication,
            "",
            "English",
        ));
        if let Err(e) = result {
            debug!("Error closing SSH session to {}: {}", self.target.host, e);
        }
    }
}

async fn open(target: &SshTarget, identities: &[PathBuf]) -> Result<Handle<Client>, SshError> {
    let config = Arc::new(client::Config::default());
    let address = (target.host.as_str(), target.port);

    let mut handle = tokio::time::timeout(CONNECT_TIMEOUT, client::connect(config, address, Client))
        .await
        .map_err(|_| {
            SshError::ConnectionError(format!(
                "Timed out connecting to {}:{}",
                target.host, target.port
            ))
        })?
        .map_err(|e| {
            SshError::ConnectionError(format!("{}:{}: {}", target.host, target.port, e))
        })?;

    for path in identities {
        let key = load_secret_key(path, None).map_err(|e| {
            SshError::AuthenticationError(format!("Failed to load {}: {}", path.display(), e))
        })?;
        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .map_err(|e| SshError::ConnectionError(e.to_string()))?
            .flatten();

        let auth_res = handle
            .authenticate_publickey(
                &target.user,
                PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
            )
            .await
            .map_err(|e| SshError::AuthenticationError(e.to_string()))?;

        if auth_res.success() {
            debug!("Authenticated to {} with {}", target.host, path.display());
            return Ok(handle);
        }
        debug!("Key {} rejected by {}", path.display(), target.host);
    }

    Err(SshError::AuthenticationError(format!(
        "No key accepted for {}@{}",
        target.user, target.host
    )))
}

async fn run(
    handle: &Handle<Client>,
    command: &str,
    stdin: &[u8],
) -> Result<CommandOutput, SshError> {
    let mut channel = handle
        .channel_open_session()
        .await
        .map_err(|e| SshError::ConnectionError(e.to_string()))?;

    channel
        .exec(true, command)
        .await
        .map_err(|e| SshError::ConnectionError(e.to_string()))?;
    if !stdin.is_empty() {
        channel
            .data(stdin)
            .await
            .map_err(|e| SshError::ConnectionError(e.to_string()))?;
    }
    channel
        .eof()
        .await
        .map_err(|e| SshError::ConnectionError(e.to_string()))?;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut exit_status = None;

    // The exit status may arrive before the last data packet.
    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
            ChannelMsg::ExtendedData { ref data, ext } if ext == 1 => {
                stderr.extend_from_slice(data)
            }
            ChannelMsg::ExitStatus { exit_status: status } => exit_status = Some(status),
            _ => {}
        }
    }

    let exit_status = exit_status.ok_or_else(|| {
        SshError::ConnectionError("Remote command ended without an exit status".to_string())
    })?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_status,
    })
}

use log::info;
use platform::{JobApi, JobConnectionInfo, EXECUTABLE_MODE, PRIVATE_KEY_MODE};
use ssh::keygen::{self, KeyGenerationError, Keypair};

use crate::error::TunnelError;
use crate::forward::LocalForward;
use crate::script::render_tunnel_script;

pub const DEFAULT_KEY_PATH: &str = "~/tunnel_maker_private_key.pem";
pub const DEFAULT_SCRIPT_PATH: &str = "~/create_ssh_tunnel.sh";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelRequest {
    /// Job the tunnel is opened from.
    pub job1: String,
    /// Job the tunnel leads to.
    pub job2: String,
    pub forward: LocalForward,
    /// Private key location on job1, also used as the script's identity file.
    pub key_path: String,
    pub script_path: String,
}

impl TunnelRequest {
    pub fn new(job1: impl Into<String>, job2: impl Into<String>, forward: LocalForward) -> Self {
        Self {
            job1: job1.into(),
            job2: job2.into(),
            forward,
            key_path: DEFAULT_KEY_PATH.to_string(),
            script_path: DEFAULT_SCRIPT_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelReport {
    pub job2: JobConnectionInfo,
    pub key_path: String,
    pub script_path: String,
    pub fingerprint: String,
}

/// Distributes a fresh keypair and writes the tunnel script to job1.
pub fn create_tunnel(jobs: &dyn JobApi, request: &TunnelRequest) -> Result<TunnelReport, TunnelError> {
    create_tunnel_with(jobs, request, keygen::generate)
}

/// Runs the setup steps in order, stopping at the first failure.
///
/// Steps that already succeeded are not undone.
pub fn create_tunnel_with<G>(
    jobs: &dyn JobApi,
    request: &TunnelRequest,
    generate: G,
) -> Result<TunnelReport, TunnelError>
where
    G: FnOnce() -> Result<Keypair, KeyGenerationError>,
{
    let keypair = generate()?;

    let job2 = jobs.connection_info(&request.job2)?;

    info!("Uploading private key to JobID {}", request.job1);
    jobs.upload_file(
        &request.job1,
        &request.key_path,
        keypair.private_key.as_bytes(),
        PRIVATE_KEY_MODE,
    )?;

    info!(
        "Appending public key to ~/.ssh/authorized_keys on {}",
        job2.host
    );
    jobs.append_authorized_key(&request.job2, &keypair.public_key)?;

    let script = render_tunnel_script(&job2, &request.forward, &request.key_path);
    info!(
        "Creating script {} on JobID {}",
        request.script_path, request.job1
    );
    jobs.upload_file(
        &request.job1,
        &request.script_path,
        script.as_bytes(),
        EXECUTABLE_MODE,
    )?;

    Ok(TunnelReport {
        job2,
        key_path: request.key_path.clone(),
        script_path: request.script_path.clone(),
        fingerprint: keypair.fingerprint,
    })
}

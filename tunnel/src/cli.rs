use anyhow::Result;
use clap::Args;
use common::config::{
    expand_path, resolve_credentials, CredentialRequest, DEFAULT_API_BASE_URL,
    DEFAULT_API_CONFIG_FILE, DEFAULT_API_PROFILE,
};
use log::info;
use platform::{RescaleClient, RescaleJobs};
use std::path::PathBuf;

use crate::error::TunnelError;
use crate::forward::LocalForward;
use crate::orchestrator::{create_tunnel, TunnelReport, TunnelRequest};

/// Create an SSH tunnel from one Rescale job to another.
#[derive(Args, Debug)]
pub struct CreateTunnel {
    /// Rescale JobID of a job or workstation from which the SSH tunnel should be created, e.g. 'StGaQb'.
    #[clap(long = "job1", value_name = "JobID")]
    pub job1: String,

    /// Rescale JobID of a job or workstation to which the SSH tunnel should be created, e.g. 'uaHMJc'.
    #[clap(long = "job2", value_name = "JobID")]
    pub job2: String,

    /// Local port forwarding configuration for the SSH tunnel.
    #[clap(
        long = "local_port_forwarding",
        value_name = "port:host:hostport",
        default_value = "47827:localhost:47827"
    )]
    pub local_port_forwarding: LocalForward,

    /// The SSH private key file used on Rescale. The corresponding public key must be configured
    /// in Rescale's User Profile settings (User Profile -> Job Settings).
    #[clap(long = "rescale_ssh_private_key", value_name = "FILE")]
    pub rescale_ssh_private_key: Option<String>,

    /// Path to the API profiles configuration file, shared with the Rescale CLI
    /// [default: ~/.config/rescale/apiconfig]
    #[clap(long = "api_config_file", value_name = "FILE")]
    pub api_config_file: Option<String>,

    /// Name of the API profile to read from the API profiles configuration file.
    #[clap(long = "api_profile", value_name = "PROFILE_NAME", default_value = DEFAULT_API_PROFILE)]
    pub api_profile: String,

    /// Base URL for API access, used when the API key comes from RESCALE_API_KEY.
    #[clap(long = "api_base_url", value_name = "URL", default_value = DEFAULT_API_BASE_URL)]
    pub api_base_url: String,
}

impl CreateTunnel {
    fn config_file(&self) -> Result<PathBuf, TunnelError> {
        let path = self
            .api_config_file
            .as_deref()
            .unwrap_or(DEFAULT_API_CONFIG_FILE);
        Ok(expand_path(path)?)
    }

    fn identity_file(&self) -> Result<Option<PathBuf>, TunnelError> {
        match &self.rescale_ssh_private_key {
            Some(path) => Ok(Some(expand_path(path)?)),
            None => Ok(None),
        }
    }

    /// Resolves credentials and the operator key, then sets up the tunnel.
    pub fn execute(self) -> Result<TunnelReport, TunnelError> {
        let credentials = resolve_credentials(&CredentialRequest {
            api_base_url: self.api_base_url.clone(),
            config_file: self.config_file()?,
            profile: self.api_profile.clone(),
        })?;
        let identities = ssh::resolve_identities(self.identity_file()?.as_deref())?;

        let jobs = RescaleJobs::new(RescaleClient::new(credentials)?, identities);
        let request = TunnelRequest::new(self.job1, self.job2, self.local_port_forwarding);

        create_tunnel(&jobs, &request)
    }

    pub fn run(self) -> Result<()> {
        let job1 = self.job1.clone();
        let report = self.execute()?;

        info!("Temporary key fingerprint: {}", report.fingerprint);
        println!("SSH tunnel script created on JobID {}.", job1);
        println!(
            "Run {} on that job to open the tunnel to {}@{}:{}.",
            report.script_path, report.job2.user, report.job2.host, report.job2.ssh_port
        );
        Ok(())
    }
}

use log::info;
use ssh::{SshSession, SshTarget};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use crate::client::RescaleClient;
use crate::error::ApiError;
use crate::models::JobConnectionInfo;

pub const AUTHORIZED_KEYS_PATH: &str = "~/.ssh/authorized_keys";

/// Owner read only, as required for SSH identity files.
pub const PRIVATE_KEY_MODE: u32 = 0o400;

/// Owner read, write and execute.
pub const EXECUTABLE_MODE: u32 = 0o700;

/// Operations the tunnel setup needs from the job platform.
pub trait JobApi {
    fn connection_info(&self, job_id: &str) -> Result<JobConnectionInfo, ApiError>;

    /// Writes `content` to `remote_path` on the job, replacing any existing file.
    fn upload_file(
        &self,
        job_id: &str,
        remote_path: &str,
        content: &[u8],
        mode: u32,
    ) -> Result<(), ApiError>;

    /// Adds one line to the job's `~/.ssh/authorized_keys`.
    fn append_authorized_key(&self, job_id: &str, public_key_line: &str) -> Result<(), ApiError>;
}

/// A job's login details together with its open SSH session.
struct JobLink {
    info: JobConnectionInfo,
    session: SshSession,
}

/// [`JobApi`] backed by the REST API for discovery and SSH for file access.
///
/// Looking up a job also logs in to it and runs a test command, so a job
/// that cannot be reached fails before anything is written anywhere. The
/// session is kept for the rest of the run and the REST lookup happens
/// once per job.
pub struct RescaleJobs {
    client: RescaleClient,
    identities: Vec<PathBuf>,
    links: RefCell<HashMap<String, Rc<JobLink>>>,
}

impl RescaleJobs {
    pub fn new(client: RescaleClient, identities: Vec<PathBuf>) -> Self {
        Self {
            client,
            identities,
            links: RefCell::new(HashMap::new()),
        }
    }

    fn link(&self, job_id: &str) -> Result<Rc<JobLink>, ApiError> {
        if let Some(link) = self.links.borrow().get(job_id) {
            return Ok(Rc::clone(link));
        }

        let info = self.client.connection_info(job_id)?;
        let remote = |source| ApiError::Remote {
            job_id: job_id.to_string(),
            source,
        };

        let session =
            SshSession::connect(&SshTarget::from(&info), &self.identities).map_err(remote)?;
        session.verify().map_err(remote)?;

        let link = Rc::new(JobLink { info, session });
        self.links
            .borrow_mut()
            .insert(job_id.to_string(), Rc::clone(&link));
        Ok(link)
    }
}

impl JobApi for RescaleJobs {
    fn connection_info(&self, job_id: &str) -> Result<JobConnectionInfo, ApiError> {
        Ok(self.link(job_id)?.info.clone())
    }

    fn upload_file(
        &self,
        job_id: &str,
        remote_path: &str,
        content: &[u8],
        mode: u32,
    ) -> Result<(), ApiError> {
        let link = self.link(job_id)?;
        link.session
            .upload(remote_path, content, mode)
            .map_err(|source| ApiError::Remote {
                job_id: job_id.to_string(),
                source,
            })?;
        info!("Uploaded {} to {}", remote_path, link.info.host);
        Ok(())
    }

    fn append_authorized_key(&self, job_id: &str, public_key_line: &str) -> Result<(), ApiError> {
        self.link(job_id)?
            .session
            .append_line(AUTHORIZED_KEYS_PATH, public_key_line)
            .map_err(|source| ApiError::Remote {
                job_id: job_id.to_string(),
                source,
            })
    }
}

use crate::error::ApiError;
use serde::Deserialize;

/// Role the platform assigns to the head node of a multi-node cluster.
pub const HEAD_NODE_ROLE: &str = "MPI_MASTER";

/// Envelope of paginated list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    #[serde(default)]
    pub public_ip: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub ssh_port: Option<u16>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Where to log in to a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobConnectionInfo {
    pub host: String,
    pub user: String,
    pub ssh_port: u16,
}

impl Instance {
    pub fn is_head_node(&self) -> bool {
        self.role.as_deref() == Some(HEAD_NODE_ROLE)
    }

    pub fn connection_info(&self, job_id: &str) -> Result<JobConnectionInfo, ApiError> {
        let missing = |field| ApiError::IncompleteInstance {
            job_id: job_id.to_string(),
            field,
        };

        Ok(JobConnectionInfo {
            host: self.public_ip.clone().ok_or_else(|| missing("publicIp"))?,
            user: self.username.clone().ok_or_else(|| missing("username"))?,
            ssh_port: self.ssh_port.ok_or_else(|| missing("sshPort"))?,
        })
    }
}

impl From<&JobConnectionInfo> for ssh::SshTarget {
    fn from(info: &JobConnectionInfo) -> Self {
        ssh::SshTarget {
            host: info.host.clone(),
            user: info.user.clone(),
            port: info.ssh_port,
        }
    }
}

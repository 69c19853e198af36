use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Unexpected status code {status} from {url}: {body}")]
    UnexpectedStatusCode {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Malformed response from {url}: {message}")]
    MalformedResponse { url: String, message: String },

    #[error("No instances found for JobID {0:?}. Is the cluster running?")]
    NoInstances(String),

    #[error("No head node found among the instances of JobID {0:?}")]
    NoHeadNode(String),

    #[error("Instance of JobID {job_id:?} has no {field}")]
    IncompleteInstance { job_id: String, field: &'static str },

    #[error("Remote file operation on JobID {job_id:?} failed: {source}")]
    Remote {
        job_id: String,
        #[source]
        source: ssh::SshError,
    },
}

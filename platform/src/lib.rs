//! Access to Rescale jobs: REST discovery of a job's head node and file
//! operations on it.

pub mod client;
pub mod error;
pub mod jobs;
pub mod models;

pub use client::RescaleClient;
pub use error::ApiError;
pub use jobs::{JobApi, RescaleJobs, AUTHORIZED_KEYS_PATH, EXECUTABLE_MODE, PRIVATE_KEY_MODE};
pub use models::{Instance, JobConnectionInfo};

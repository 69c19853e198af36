use common::Credentials;
use log::{debug, error, info};
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::ApiError;
use crate::models::{Instance, JobConnectionInfo, Page};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking client for the Rescale REST API.
pub struct RescaleClient {
    http: Client,
    base_url: String,
    authorization: String,
}

impl RescaleClient {
    pub fn new(credentials: Credentials) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http,
            base_url: credentials.api_base_url.trim_end_matches('/').to_string(),
            authorization: format!("Token {}", credentials.api_key),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        debug!("GET {}", url);
        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, &self.authorization)
            .send()?;

        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            error!("{}", body);
            return Err(ApiError::UnexpectedStatusCode {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| ApiError::MalformedResponse {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// Collects the results of every page, following `next` links.
    pub fn get_all_result_pages<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>, ApiError> {
        let mut results = Vec::new();
        let mut next = Some(url.to_string());

        while let Some(url) = next {
            let page: Page<T> = self.get_json(&url)?;
            results.extend(page.results);
            next = page.next;
        }

        Ok(results)
    }

    pub fn instances(&self, job_id: &str) -> Result<Vec<Instance>, ApiError> {
        self.get_all_result_pages(&format!(
            "{}/api/v2/jobs/{}/instances/",
            self.base_url, job_id
        ))
    }

    /// The single instance of a job, or the `MPI_MASTER` of a cluster.
    pub fn head_node(&self, job_id: &str) -> Result<Instance, ApiError> {
        let mut instances = self.instances(job_id)?;

        match instances.len() {
            0 => Err(ApiError::NoInstances(job_id.to_string())),
            1 => Ok(instances.remove(0)),
            _ => instances
                .into_iter()
                .find(Instance::is_head_node)
                .ok_or_else(|| ApiError::NoHeadNode(job_id.to_string())),
        }
    }

    pub fn connection_info(&self, job_id: &str) -> Result<JobConnectionInfo, ApiError> {
        let info = self.head_node(job_id)?.connection_info(job_id)?;
        info!(
            "JobID {} is reachable at {}@{}:{}",
            job_id, info.user, info.host, info.ssh_port
        );
        Ok(info)
    }
}

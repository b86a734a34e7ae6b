//! Job lifecycle: BIOS config job submission, status polling and the
//! three-tier queue clear.

use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::redfish::types::REDFISH_ROOT;
use crate::redfish::{Fetch, HostSession, RedfishError, Reply, Result};

const JOB_ID_PATTERN: &str = r"[JR]ID_.+?\d+";
const SCHEDULED: &str = "Task successfully scheduled.";
const CLEAR_ALL: &str = "JID_CLEARALL";

fn dell_job_service() -> String {
    format!("{}/Dell/Managers/iDRAC.Embedded.1/DellJobService/", REDFISH_ROOT)
}

/// Job ids found anywhere in a raw job collection body.
pub fn parse_job_ids(body: &str) -> Result<Vec<String>> {
    let pattern = Regex::new(JOB_ID_PATTERN)
        .map_err(|e| RedfishError::MalformedResponse(format!("job id pattern: {}", e)))?;

    Ok(pattern
        .find_iter(body)
        .map(|m| {
            m.as_str()
                .trim_matches('}')
                .trim_matches('"')
                .trim_matches('\'')
                .to_string()
        })
        .collect())
}

/// Last path segment of a `Location` header.
pub fn job_id_from_location(location: &str) -> Option<String> {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

impl HostSession {
    /// Submit a job applying the pending settings at `target_uri`.
    /// Returns the job id when the controller reports one.
    pub async fn create_job(&self, target_uri: &str) -> Result<Option<String>> {
        let url = self.manager_path("/Jobs");
        let payload = json!({ "TargetSettingsURI": target_uri });
        let reply = self.client.post(&url, &payload).await?;

        if matches!(reply.status, 200 | 204) {
            info!("POST command passed to create target config job.");
            let job_id = reply.location.as_deref().and_then(job_id_from_location);
            if let Some(id) = &job_id {
                debug!("Created job {}", id);
            }
            Ok(job_id)
        } else {
            error!(
                "POST command failed to create BIOS config job, status code is {}.",
                reply.status
            );
            Err(reply.rejection())
        }
    }

    pub async fn create_bios_config_job(&self) -> Result<Option<String>> {
        let target = self.paths.bios_settings.clone();
        self.create_job(&target).await
    }

    /// Poll a job until the controller reports it scheduled. Timeouts spend
    /// one attempt of the budget.
    pub async fn poll_job_status(&self, job_id: &str) -> Result<()> {
        debug!("Getting job status.");
        let url = self.manager_path(&format!("/Jobs/{}", job_id));

        for _ in 0..self.retries {
            let reply = match self.client.refresh(&url).await {
                Fetch::Success(reply) => reply,
                Fetch::Absent => continue,
                Fetch::Fatal(e) => return Err(e),
            };

            if !reply.is_ok() {
                error!(
                    "Command failed to check job status {}, return code is {}.",
                    job_id, reply.status
                );
                return Err(reply.rejection());
            }

            let data = reply.json()?;
            let message = data
                .get("Message")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    RedfishError::MalformedResponse(format!("job {} has no Message", job_id))
                })?;

            if message == SCHEDULED {
                info!("Job id {} successfully scheduled.", job_id);
                return Ok(());
            }

            warn!("JobStatus not scheduled, current status is: {}.", message);
            tokio::time::sleep(self.long_poll).await;
        }

        error!("Not able to successfully schedule the job.");
        Err(RedfishError::RetryBudgetExhausted {
            operation: format!("job {}", job_id),
            attempts: self.retries,
        })
    }

    /// Ids of every queued job. Always read fresh.
    pub async fn job_queue(&self) -> Result<Vec<String>> {
        debug!("Getting job queue.");
        let reply = self
            .client
            .refresh(&self.manager_path("/Jobs"))
            .await
            .required(&self.host)?;
        parse_job_ids(&reply.body)
    }

    pub async fn list_jobs(&self) -> Result<Vec<String>> {
        let jobs = self.job_queue().await?;
        if jobs.is_empty() {
            info!("No active jobs found.");
        } else {
            info!("Found active jobs:");
            for job in &jobs {
                info!("{}", job);
            }
        }
        Ok(jobs)
    }

    /// Clear the job queue. Tries the Dell job service first, then a forced
    /// bulk delete, then deleting each queued job by id.
    pub async fn clear_job_queue(&self, force: bool) -> Result<()> {
        let queue = self.job_queue().await?;
        if queue.is_empty() && !force {
            warn!(
                "Job queue already cleared for iDRAC {}, DELETE command will not execute.",
                self.host
            );
            return Ok(());
        }

        if self.supports_dell_job_service().await? {
            return self.delete_job_queue_dell(force).await;
        }

        let url = self.manager_path(&format!("/Jobs/{}_FORCE", CLEAR_ALL));
        match self.client.delete(&url).await {
            Ok(reply) if reply.status == 400 => self.clear_job_list(&queue).await,
            Ok(reply) if matches!(reply.status, 200 | 204) => {
                info!("Job queue for iDRAC {} successfully cleared.", self.host);
                Ok(())
            }
            Ok(reply) => {
                error!("Job queue not cleared, there was something wrong with your request.");
                Err(reply.rejection())
            }
            Err(RedfishError::CommunicationFailure(e)) => {
                warn!("There was something wrong clearing the job queue.");
                debug!("{}", e);
                info!("Attempting to clear job list instead.");
                self.clear_job_list(&queue).await
            }
            Err(e) => Err(e),
        }
    }

    async fn supports_dell_job_service(&self) -> Result<bool> {
        let reply = self.client.get(&dell_job_service()).await?;
        if !reply.is_ok() {
            warn!("iDRAC version installed does not support DellJobService");
            return Ok(false);
        }
        Ok(true)
    }

    async fn delete_job_queue_dell(&self, force: bool) -> Result<()> {
        let url = format!(
            "{}Actions/DellJobService.DeleteJobQueue",
            dell_job_service()
        );
        let job_id = if force {
            format!("{}_FORCE", CLEAR_ALL)
        } else {
            CLEAR_ALL.to_string()
        };

        let reply = self.client.post(&url, &json!({ "JobID": job_id })).await?;
        if reply.is_ok() {
            info!("Job queue for iDRAC {} successfully cleared.", self.host);
            return Ok(());
        }

        if let Ok(data) = reply.json() {
            if let Some(info) = data.get("error").and_then(|e| e.get("@Message.ExtendedInfo")) {
                debug!("{}", info);
            }
        }
        error!("Job queue not cleared, there was something wrong with your request.");
        Err(reply.rejection())
    }

    async fn clear_job_list(&self, queue: &[String]) -> Result<()> {
        warn!("Clearing job queue for job IDs: {:?}.", queue);

        let mut failed: Option<Reply> = None;
        for job in queue {
            let url = self.manager_path(&format!("/Jobs/{}", job.trim_matches('\'')));
            let reply = self.client.delete(&url).await?;
            if !reply.is_ok() {
                failed = Some(reply);
            }
        }

        match failed {
            None => {
                info!("Job queue for iDRAC {} successfully cleared.", self.host);
                Ok(())
            }
            Some(reply) => {
                error!("Job queue not cleared, there was something wrong with your request.");
                Err(RedfishError::RequestRejected {
                    status: reply.status,
                    message: "job queue not cleared".to_string(),
                    resolution: None,
                })
            }
        }
    }
}

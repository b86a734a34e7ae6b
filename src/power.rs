//! Power state controller: reads, on/off transitions, reboot state machine
//! and polling, plus controller and BIOS resets.

use std::io::Write;
use std::str::FromStr;

use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::redfish::types::{FORCE_OFF, FORCE_RESTART, GRACEFUL_RESTART, POWER_ON};
use crate::redfish::{Fetch, HostSession, PowerState, RedfishError, Result};

const BAR_WIDTH: usize = 20;

/// Target of an explicit on/off request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerTarget {
    On,
    Off,
}

impl PowerTarget {
    fn reset_type(self) -> &'static str {
        match self {
            PowerTarget::On => POWER_ON,
            PowerTarget::Off => FORCE_OFF,
        }
    }
}

impl FromStr for PowerTarget {
    type Err = RedfishError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "on" => Ok(PowerTarget::On),
            "off" => Ok(PowerTarget::Off),
            _ => {
                error!("Power state not valid. 'on' or 'off' only accepted.");
                Err(RedfishError::UnsupportedOperation(format!(
                    "power state {}",
                    s
                )))
            }
        }
    }
}

/// `preferred` when the controller advertises it, otherwise the last
/// advertised type whose name contains "restart".
pub fn pick_reset_type(preferred: &str, advertised: &[String]) -> String {
    if advertised.iter().any(|t| t == preferred) {
        return preferred.to_string();
    }
    advertised
        .iter()
        .filter(|t| t.to_lowercase().contains("restart"))
        .last()
        .cloned()
        .unwrap_or_else(|| preferred.to_string())
}

pub fn progress_percent(attempt: u32, budget: u32) -> u8 {
    if budget == 0 {
        return 100;
    }
    ((attempt.min(budget) as f64 / budget as f64) * 100.0).round() as u8
}

/// `- POLLING: [------>    ] 35% - Host state: Off`
pub fn render_progress(percent: u8, state: &PowerState) -> String {
    let filled = (percent as usize * BAR_WIDTH + 50) / 100;
    let arrow = format!("{}>", "-".repeat(filled.saturating_sub(1)));
    let spaces = " ".repeat(BAR_WIDTH.saturating_sub(arrow.len()));
    let state = match state {
        PowerState::On => "On  ".to_string(),
        other => other.to_string(),
    };
    format!("- POLLING: [{}{}] {}% - Host state: {}", arrow, spaces, percent, state)
}

impl HostSession {
    /// Current power state. No answer or a non-200 reply reads as `Down`.
    pub async fn power_state(&self) -> Result<PowerState> {
        let reply = match self.client.refresh(&self.paths.system).await {
            Fetch::Success(reply) if reply.is_ok() => reply,
            Fetch::Success(_) => {
                debug!("Couldn't get power state. Retrying.");
                return Ok(PowerState::Down);
            }
            Fetch::Absent => return Ok(PowerState::Down),
            Fetch::Fatal(e) => return Err(e),
        };

        let state = power_state_field(&reply.json()?)?;
        debug!("Current server power state is: {}.", state);
        Ok(state)
    }

    /// Force the host on or off. Returns the state seen before the change.
    pub async fn set_power_state(&self, target: &str) -> Result<PowerState> {
        let target: PowerTarget = target.parse()?;

        let reply = match self.client.refresh(&self.paths.system).await {
            Fetch::Success(reply) => reply,
            Fetch::Absent if target == PowerTarget::Off => {
                warn!("Power state appears to be already set to 'off'.");
                return Ok(PowerState::Down);
            }
            Fetch::Absent => return Err(RedfishError::CommunicationFailure(self.host.clone())),
            Fetch::Fatal(e) => return Err(e),
        };

        if !reply.is_ok() {
            debug!("Couldn't get power state.");
            return Err(RedfishError::CommunicationFailure(format!(
                "{} returned {} for the system resource",
                self.host, reply.status
            )));
        }

        let current = power_state_field(&reply.json()?)?;
        debug!("Current server power state is: {}.", current);

        self.send_reset(target.reset_type()).await?;
        Ok(current)
    }

    /// Reset types the system (or manager) advertises.
    pub async fn reset_types(&self, manager: bool) -> Result<Vec<String>> {
        let (path, action) = if manager {
            (&self.paths.manager, "#Manager.Reset")
        } else {
            (&self.paths.system, "#ComputerSystem.Reset")
        };

        debug!("Getting allowable reset types.");
        let data = self.client.get(path).await?.json()?;
        let Some(actions) = data.get("Actions") else {
            warn!("Actions resource not found");
            return Ok(Vec::new());
        };

        let Some(reset) = actions.get(action) else {
            return Ok(Vec::new());
        };

        let types: Vec<String> = reset
            .get("ResetType@Redfish.AllowableValues")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if types.is_empty() {
            warn!("Could not get allowable reset types");
        }
        Ok(types)
    }

    pub async fn send_reset(&self, reset_type: &str) -> Result<()> {
        let url = self.system_path("/Actions/ComputerSystem.Reset");
        let reply = self
            .client
            .post(&url, &json!({ "ResetType": reset_type }))
            .await?;

        match reply.status {
            200 | 204 => {
                info!(
                    "Command passed to {} server, code return is {}.",
                    reset_type, reply.status
                );
                tokio::time::sleep(self.long_poll).await;
                Ok(())
            }
            409 => {
                warn!(
                    "Command failed to {} server, host appears to be already in that state.",
                    reset_type
                );
                Ok(())
            }
            status => {
                error!(
                    "Command failed to {} server, status code is: {}.",
                    reset_type, status
                );
                Err(reply.rejection())
            }
        }
    }

    /// Power cycle the host.
    ///
    /// A running host gets a graceful restart (escalated to `ForceOff` when
    /// `Off` is never observed) or a straight `ForceOff`; once the host
    /// answers again it is powered `On`. A host that is off is powered on.
    pub async fn reboot(&self, graceful: bool) -> Result<()> {
        let advertised = self.reset_types(false).await?;
        let restart = pick_reset_type(GRACEFUL_RESTART, &advertised);

        debug!("Rebooting server: {}.", self.host);
        match self.power_state().await? {
            PowerState::On => {
                if graceful {
                    self.send_reset(&restart).await?;
                    if !self.poll_host_state(&PowerState::Off, true).await? {
                        warn!("Unable to graceful shutdown the server, will perform forced shutdown now.");
                        self.send_reset(FORCE_OFF).await?;
                    }
                } else {
                    self.send_reset(FORCE_OFF).await?;
                }

                if self.poll_host_state(&PowerState::Down, false).await? {
                    self.send_reset(POWER_ON).await?;
                }
            }
            PowerState::Off => self.send_reset(POWER_ON).await?,
            other => warn!("Host is in state {}, no reboot action taken.", other),
        }
        Ok(())
    }

    /// Poll the power state until it equals (or, with `equals == false`,
    /// differs from) `state`. Sleeps the short interval after every read.
    pub async fn poll_host_state(&self, state: &PowerState, equals: bool) -> Result<bool> {
        let wanted = state.to_string();
        if equals {
            info!("Polling for host state: {}", wanted);
        } else {
            info!("Polling for host state: Not {}", wanted);
        }

        let mut reached = false;
        for attempt in 0..self.retries {
            let current = self.power_state().await?;
            reached = current.to_string().eq_ignore_ascii_case(&wanted) == equals;
            tokio::time::sleep(self.short_poll).await;

            if reached {
                self.report_progress(100, &current);
                break;
            }
            self.report_progress(progress_percent(attempt, self.retries), &current);
        }
        Ok(reached)
    }

    fn report_progress(&self, percent: u8, state: &PowerState) {
        let line = render_progress(percent, state);
        if !self.progress_bar {
            debug!("{}", line);
            return;
        }

        let end = if percent == 100 { "\n" } else { "" };
        let mut stdout = std::io::stdout();
        let _ = write!(stdout, "\r{}{}", line, end);
        let _ = stdout.flush();
    }

    /// Restart the management controller itself.
    pub async fn reset_controller(&self) -> Result<()> {
        debug!("Running reset iDRAC.");
        let advertised = self.reset_types(true).await?;
        let reset_type = pick_reset_type(FORCE_RESTART, &advertised);

        let url = self.manager_path("/Actions/Manager.Reset/");
        let payload = json!({ "ResetType": reset_type });
        debug!("url: {}", url);
        debug!("payload: {}", payload);

        let reply = self.client.post(&url, &payload).await?;
        if reply.status != 204 {
            error!(
                "Status code {} returned, error is: \n{}.",
                reply.status, reply.body
            );
            return Err(reply.rejection());
        }

        info!("Status code {} returned for POST command to reset iDRAC.", reply.status);
        info!("iDRAC will now reset and be back online within a few minutes.");
        Ok(())
    }

    /// Reset BIOS settings to factory defaults.
    pub async fn reset_bios(&self) -> Result<()> {
        debug!("Running BIOS reset.");
        let url = self.system_path("/Bios/Actions/Bios.ResetBios/");
        let reply = self.client.post(&url, &json!({})).await?;

        if !matches!(reply.status, 200 | 204) {
            error!(
                "Status code {} returned, error is: \n{}.",
                reply.status, reply.body
            );
            return Err(reply.rejection());
        }

        info!("Status code {} returned for POST command to reset BIOS.", reply.status);
        info!("BIOS will now reset and be back online within a few minutes.");
        Ok(())
    }
}

fn power_state_field(data: &Value) -> Result<PowerState> {
    match data.get("PowerState").and_then(Value::as_str) {
        Some(state) if !state.is_empty() => Ok(PowerState::parse(state)),
        _ => {
            debug!("Power state not found. Try to racreset.");
            Err(RedfishError::MalformedResponse(
                "system resource has no PowerState".to_string(),
            ))
        }
    }
}

//! Boot order reconciliation against a template.

use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::resolver::resolve_template;
use super::templates::TemplateSet;
use crate::redfish::{BootDevice, BootSequence, Fetch, HostSession, RedfishError, Result};

/// Reorder `live` so the template's devices come first, in template order.
/// Template names the controller doesn't know are skipped with a warning;
/// devices outside the template keep their index. Returns the new list and
/// whether any index moved.
pub fn reconcile(live: &[BootDevice], template: &[String]) -> (Vec<BootDevice>, bool) {
    let (valid, missing): (Vec<&String>, Vec<&String>) = template
        .iter()
        .partition(|name| live.iter().any(|d| d.name == **name));

    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|s| s.as_str()).collect();
        warn!(
            "Some interfaces are not valid boot devices. Ignoring: {}",
            names.join(", ")
        );
    }

    let mut ordered = live.to_vec();
    let mut changed = false;
    for (i, name) in valid.into_iter().enumerate() {
        let index = i as u32;
        if let Some(device) = ordered.iter_mut().find(|d| d.name == *name) {
            if device.index != index {
                device.index = index;
                changed = true;
            }
        }
    }

    (ordered, changed)
}

/// True when the first `template.len()` live devices sit exactly where the
/// template puts them.
pub fn matches_template(live: &[BootDevice], template: &[String]) -> bool {
    let mut head: Vec<&BootDevice> = live.iter().take(template.len()).collect();
    head.sort_by_key(|d| d.index);
    head.iter()
        .all(|d| template.get(d.index as usize) == Some(&d.name))
}

fn log_boot_order(devices: &[BootDevice]) {
    let mut sorted: Vec<&BootDevice> = devices.iter().collect();
    sorted.sort_by_key(|d| d.index);

    info!("Current boot order:");
    for device in sorted {
        if device.enabled {
            info!("{}: {}", device.index + 1, device.name);
        } else {
            info!("{}: {} (DISABLED)", device.index + 1, device.name);
        }
    }
}

impl HostSession {
    /// Which BIOS attribute holds the boot order, from the BIOS boot mode.
    pub async fn boot_sequence(&self) -> Result<BootSequence> {
        debug!("Getting bios boot mode.");
        let data = self.client.get(&self.system_path("/Bios")).await?.json()?;

        match data
            .get("Attributes")
            .and_then(|a| a.get("BootMode"))
            .and_then(Value::as_str)
        {
            Some(mode) => Ok(BootSequence::from_boot_mode(mode)),
            None => {
                warn!("Could not retrieve Bios Attributes. Assuming Bios.");
                Ok(BootSequence::Legacy)
            }
        }
    }

    /// Live boot devices, fetched once per session.
    pub async fn boot_devices(&self) -> Result<Vec<BootDevice>> {
        if let Some(devices) = self.cached_boot_devices().await {
            return Ok(devices);
        }

        let sequence = self.boot_sequence().await?;
        let reply = self.client.get(&self.system_path("/BootSources")).await?;
        if reply.status == 404 {
            debug!("{}", reply.body);
            error!("Boot order modification is not supported by this host.");
            return Err(RedfishError::UnsupportedOperation(
                "boot order modification".to_string(),
            ));
        }

        let data = reply.json()?;
        let Some(raw) = data.get("Attributes").and_then(|a| a.get(sequence.key())) else {
            debug!("{}", data);
            error!("Boot order modification is not supported by this host.");
            return Err(RedfishError::UnsupportedOperation(format!(
                "no {} attribute on BootSources",
                sequence.key()
            )));
        };

        let devices: Vec<BootDevice> = serde_json::from_value(raw.clone()).map_err(|e| {
            RedfishError::MalformedResponse(format!("{}: {}", sequence.key(), e))
        })?;
        self.store_boot_devices(devices.clone()).await;
        Ok(devices)
    }

    /// PATCH the boot order, retrying until the controller accepts it.
    pub async fn apply_boot_order(&self, devices: &[BootDevice]) -> Result<()> {
        let sequence = self.boot_sequence().await?;
        let url = self.system_path("/BootSources/Settings");
        let payload = json!({ "Attributes": { sequence.key(): devices } });

        let mut last = None;
        for _ in 0..self.retries {
            match self.client.patch_tolerant(&url, &payload).await {
                Fetch::Success(reply) if reply.is_ok() => {
                    info!("PATCH command passed to update boot order.");
                    self.store_boot_devices(devices.to_vec()).await;
                    return Ok(());
                }
                Fetch::Success(reply) => {
                    debug!("{}", reply.body);
                    last = Some(reply);
                }
                Fetch::Absent => continue,
                Fetch::Fatal(e) => return Err(e),
            }
        }

        error!("There was something wrong with your request.");
        match last {
            Some(reply) => Err(reply.rejection()),
            None => Err(RedfishError::CommunicationFailure(self.host.clone())),
        }
    }

    /// Host type whose template the live boot order already follows.
    pub async fn infer_host_type(&self, templates: &TemplateSet) -> Result<Option<String>> {
        let devices = self.boot_devices().await?;

        for host_type in templates.host_types() {
            let template = match resolve_template(&self.host, &host_type, templates) {
                Ok(template) => template,
                Err(RedfishError::TemplateNotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            if matches_template(&devices, template) {
                return Ok(Some(host_type));
            }
        }
        Ok(None)
    }

    /// Report the host type the boot order matches, or the order itself.
    pub async fn check_boot(&self, templates: Option<&TemplateSet>) -> Result<()> {
        if let Some(templates) = templates {
            if let Some(host_type) = self.infer_host_type(templates).await? {
                warn!("Current boot order is set to: {}.", host_type);
                return Ok(());
            }
            warn!("Current boot order does not match any of the given.");
        }

        log_boot_order(&self.boot_devices().await?);
        Ok(())
    }

    /// Reconcile against the template for `host_type` and PATCH when needed.
    pub async fn change_boot_order(&self, host_type: &str, templates: &TemplateSet) -> Result<bool> {
        let template = resolve_template(&self.host, host_type, templates)?;
        let live = self.boot_devices().await?;

        let (ordered, changed) = reconcile(&live, template);
        if changed {
            self.apply_boot_order(&ordered).await?;
        } else {
            warn!("No changes were made since the boot order already matches the requested.");
        }
        Ok(changed)
    }

    /// Full boot order change: clear the queue, reorder, optionally set PXE
    /// for next boot, schedule the BIOS job and power cycle.
    pub async fn change_boot(&self, host_type: &str, templates: &TemplateSet, pxe: bool) -> Result<()> {
        if !templates.has_type(host_type) {
            error!(
                "Expected values for -t argument are: {:?}",
                templates.host_types()
            );
            return Err(RedfishError::TemplateNotFound(format!(
                "unknown host type {}",
                host_type
            )));
        }

        let current = self.infer_host_type(templates).await?;
        if current.is_some_and(|t| t.eq_ignore_ascii_case(host_type)) {
            warn!("No changes were made since the boot order already matches the requested.");
            return Ok(());
        }

        self.clear_job_queue(false).await?;
        self.change_boot_order(host_type, templates).await?;

        if pxe {
            self.set_next_boot_pxe().await?;
        }

        if let Some(job_id) = self.create_bios_config_job().await? {
            self.poll_job_status(&job_id).await?;
        }

        self.reboot(false).await
    }
}

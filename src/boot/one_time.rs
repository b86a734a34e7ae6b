//! One-time boot overrides: next boot from a named device, a template's
//! first device, a NIC by MAC address, or PXE.

use serde_json::{json, Value};
use tracing::{debug, error, info};

use super::resolver::resolve_template;
use super::templates::TemplateSet;
use crate::redfish::types::{member_links, PowerState};
use crate::redfish::{HostSession, RedfishError, Result};

impl HostSession {
    /// Case-insensitive lookup among the live boot devices.
    pub async fn check_device(&self, device: &str) -> Result<bool> {
        debug!("Checking device {}.", device);
        let devices = self.boot_devices().await?;
        let found = devices.iter().any(|d| d.name.eq_ignore_ascii_case(device));
        if !found {
            error!(
                "Device {} does not match any of the available boot devices for host {}",
                device, self.host
            );
        }
        Ok(found)
    }

    /// Set the BIOS one-time boot device as a pending value.
    ///
    /// 503 replies are retried as-is. A 400 usually means a stuck job, so the
    /// queue is cleared; the first time around the controller is also reset
    /// and the host polled back to `On` before retrying.
    pub async fn send_one_time_boot(&self, device: &str) -> Result<()> {
        let payload = json!({
            "Attributes": {
                "OneTimeBootMode": "OneTimeBootSeq",
                "OneTimeBootSeqDev": device,
            }
        });

        let mut controller_reset = false;
        for _ in 0..self.retries {
            let reply = self.client.patch(&self.paths.bios_settings, &payload).await?;
            match reply.status {
                200 => {
                    info!("Command passed to set BIOS attribute pending values.");
                    return Ok(());
                }
                503 => {
                    error!("Command failed, error code is: {}.", reply.status);
                    info!("Retrying to send one time boot.");
                }
                400 => {
                    error!("Command failed, error code is: {}.", reply.status);
                    self.clear_job_queue(false).await?;
                    if !controller_reset {
                        self.reset_controller().await?;
                        tokio::time::sleep(self.long_poll).await;
                        controller_reset = true;
                        self.poll_host_state(&PowerState::On, true).await?;
                    }
                }
                _ => {
                    error!("Command failed, error code is: {}.", reply.status);
                    return Err(reply.rejection());
                }
            }
        }

        Err(RedfishError::RetryBudgetExhausted {
            operation: format!("one-time boot to {}", device),
            attempts: self.retries,
        })
    }

    pub async fn boot_to(&self, device: &str) -> Result<()> {
        if !self.check_device(device).await? {
            return Err(RedfishError::UnsupportedOperation(format!(
                "unknown boot device {}",
                device
            )));
        }

        self.clear_job_queue(false).await?;
        self.send_one_time_boot(device).await?;
        self.create_bios_config_job().await?;
        Ok(())
    }

    /// One-time boot to the first device of the host type's template.
    pub async fn boot_to_type(&self, host_type: &str, templates: &TemplateSet) -> Result<()> {
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

        let template = resolve_template(&self.host, host_type, templates)?;
        let device = template
            .first()
            .cloned()
            .ok_or_else(|| RedfishError::TemplateNotFound(host_type.to_string()))?;
        self.boot_to(&device).await
    }

    /// One-time boot to the NIC whose MAC address matches.
    pub async fn boot_to_mac(&self, mac_address: &str) -> Result<()> {
        let mut device = None;
        for endpoint in self.interface_endpoints().await? {
            let interface = self.interface(&endpoint).await?;
            let mac = interface
                .get("MACAddress")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if mac.eq_ignore_ascii_case(mac_address) {
                device = interface
                    .get("Id")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                break;
            }
        }

        match device {
            Some(device) => self.boot_to(&device).await,
            None => {
                error!("MAC Address does not match any of the existing");
                Err(RedfishError::UnsupportedOperation(format!(
                    "no interface with MAC {}",
                    mac_address
                )))
            }
        }
    }

    pub async fn set_next_boot_pxe(&self) -> Result<()> {
        let payload = json!({
            "Boot": {
                "BootSourceOverrideTarget": "Pxe",
                "BootSourceOverrideEnabled": "Once",
            }
        });
        let reply = self.client.patch(&self.paths.system, &payload).await?;

        tokio::time::sleep(self.short_poll).await;

        if reply.is_ok() {
            info!("PATCH command passed to set next boot onetime boot device to: \"Pxe\".");
            Ok(())
        } else {
            error!("Command failed, error code is {}.", reply.status);
            Err(reply.rejection())
        }
    }

    async fn interface_endpoints(&self) -> Result<Vec<String>> {
        let reply = self
            .client
            .get(&self.system_path("/EthernetInterfaces"))
            .await?;
        if reply.status == 404 {
            debug!("{}", reply.body);
            error!("EthernetInterfaces entry point not supported by this host.");
            return Err(RedfishError::UnsupportedOperation(
                "EthernetInterfaces".to_string(),
            ));
        }

        let endpoints = member_links(&reply.json()?);
        if endpoints.is_empty() {
            error!("EthernetInterfaces's Members array is either empty or missing");
            return Err(RedfishError::UnsupportedOperation(
                "EthernetInterfaces".to_string(),
            ));
        }
        Ok(endpoints)
    }

    async fn interface(&self, endpoint: &str) -> Result<Value> {
        let reply = self.client.get(endpoint).await?;
        if reply.status == 404 {
            debug!("{}", reply.body);
            error!("EthernetInterface entry point not supported by this host.");
            return Err(RedfishError::UnsupportedOperation(endpoint.to_string()));
        }
        reply.json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redfish::testing::{self, MockController, MANAGER, SYSTEM};
    use crate::redfish::transport::Method;
    use crate::redfish::BootDevice;
    use std::sync::Arc;

    fn script_devices(mock: &MockController) {
        let devices = vec![
            BootDevice::new("HardDisk.List.1-1", 0, true),
            BootDevice::new("NIC.Integrated.1-1-1", 1, true),
        ];
        mock.on_get(&format!("{SYSTEM}/Bios"), 200, json!({"Attributes": {"BootMode": "Bios"}}));
        mock.on_get(
            &format!("{SYSTEM}/BootSources"),
            200,
            json!({"Attributes": {"BootSeq": devices}}),
        );
        mock.on_get(&format!("{MANAGER}/Jobs"), 200, json!({"Members": []}));
        mock.on(Method::Post, &format!("{MANAGER}/Jobs"), 200, json!({}));
    }

    fn bios_settings() -> String {
        format!("{SYSTEM}/Bios/Settings")
    }

    #[tokio::test]
    async fn test_check_device_ignores_case() {
        let mock = Arc::new(MockController::dell());
        script_devices(&mock);
        let session = testing::session(&mock).await;
        assert!(session.check_device("nic.integrated.1-1-1").await.unwrap());
        assert!(!session.check_device("NIC.Slot.9-1-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_boot_to_unknown_device() {
        let mock = Arc::new(MockController::dell());
        script_devices(&mock);
        let session = testing::session(&mock).await;
        assert!(matches!(
            session.boot_to("NIC.Slot.9-1-1").await,
            Err(RedfishError::UnsupportedOperation(_))
        ));
        assert_eq!(mock.count(Method::Patch, &bios_settings()), 0);
    }

    #[tokio::test]
    async fn test_boot_to_sets_pending_value_and_job() {
        let mock = Arc::new(MockController::dell());
        script_devices(&mock);
        mock.on(Method::Patch, &bios_settings(), 503, json!({}));
        mock.on(Method::Patch, &bios_settings(), 200, json!({}));
        let session = testing::session(&mock).await;

        session.boot_to("NIC.Integrated.1-1-1").await.unwrap();
        let bodies = mock.bodies(Method::Patch, &bios_settings());
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[1]["Attributes"]["OneTimeBootSeqDev"], "NIC.Integrated.1-1-1");
        assert_eq!(mock.count(Method::Post, &format!("{MANAGER}/Jobs")), 1);
    }

    #[tokio::test]
    async fn test_controller_reset_only_on_first_rejection() {
        let mock = Arc::new(MockController::dell());
        script_devices(&mock);
        mock.on(Method::Patch, &bios_settings(), 400, json!({}));
        mock.on(Method::Patch, &bios_settings(), 400, json!({}));
        mock.on(Method::Patch, &bios_settings(), 200, json!({}));
        mock.on_get(
            MANAGER,
            200,
            json!({"Actions": {"#Manager.Reset": {"ResetType@Redfish.AllowableValues": ["GracefulRestart"]}}}),
        );
        mock.on(Method::Post, &format!("{MANAGER}/Actions/Manager.Reset/"), 204, json!({}));
        testing::script_power(&mock, &["On"]);
        let session = testing::session(&mock).await;

        session.send_one_time_boot("HardDisk.List.1-1").await.unwrap();
        let resets = mock.bodies(Method::Post, &format!("{MANAGER}/Actions/Manager.Reset/"));
        assert_eq!(resets, vec![json!({"ResetType": "GracefulRestart"})]);
        assert_eq!(mock.count(Method::Patch, &bios_settings()), 3);
    }

    #[tokio::test]
    async fn test_one_time_boot_other_status_fails() {
        let mock = Arc::new(MockController::dell());
        mock.on(Method::Patch, &bios_settings(), 500, json!({}));
        let session = testing::session(&mock).await;
        assert!(matches!(
            session.send_one_time_boot("HardDisk.List.1-1").await,
            Err(RedfishError::RequestRejected { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_boot_to_type_uses_first_template_device() {
        let mock = Arc::new(MockController::dell());
        script_devices(&mock);
        mock.on(Method::Patch, &bios_settings(), 200, json!({}));
        let session = testing::session(&mock).await;
        let templates = TemplateSet::from_pairs([(
            "director_640_interfaces",
            "NIC.Integrated.1-1-1,HardDisk.List.1-1",
        )]);

        session.boot_to_type("director", &templates).await.unwrap();
        assert_eq!(
            mock.bodies(Method::Patch, &bios_settings())[0]["Attributes"]["OneTimeBootSeqDev"],
            "NIC.Integrated.1-1-1"
        );
        assert!(matches!(
            session.boot_to_type("foreman", &templates).await,
            Err(RedfishError::TemplateNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_boot_to_mac() {
        let mock = Arc::new(MockController::dell());
        script_devices(&mock);
        mock.on(Method::Patch, &bios_settings(), 200, json!({}));
        let nic = format!("{SYSTEM}/EthernetInterfaces/NIC.Integrated.1-1-1");
        mock.on_get(
            &format!("{SYSTEM}/EthernetInterfaces"),
            200,
            json!({"Members": [{"@odata.id": nic}]}),
        );
        mock.on_get(
            &nic,
            200,
            json!({"Id": "NIC.Integrated.1-1-1", "MACAddress": "B0:7B:25:DE:AD:01"}),
        );
        let session = testing::session(&mock).await;

        session.boot_to_mac("b0:7b:25:de:ad:01").await.unwrap();
        assert!(matches!(
            session.boot_to_mac("00:00:00:00:00:00").await,
            Err(RedfishError::UnsupportedOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_set_next_boot_pxe() {
        let mock = Arc::new(MockController::dell());
        mock.on(Method::Patch, SYSTEM, 200, json!({}));
        let session = testing::session(&mock).await;
        session.set_next_boot_pxe().await.unwrap();
        assert_eq!(
            mock.bodies(Method::Patch, SYSTEM)[0]["Boot"]["BootSourceOverrideEnabled"],
            "Once"
        );

        mock.clear(Method::Patch, SYSTEM);
        mock.on(Method::Patch, SYSTEM, 400, json!({}));
        assert!(session.set_next_boot_pxe().await.is_err());
    }
}

//! Virtual media: report mounted images and unmount them on controllers
//! exposing the Supermicro ISO config action.

use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::redfish::types::member_links;
use crate::redfish::{HostSession, RedfishError, Result};

/// One virtual media slot as reported by the manager.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSlot {
    pub id: Option<String>,
    pub name: Option<String>,
    pub image_name: Option<String>,
    pub inserted: Option<bool>,
}

impl MediaSlot {
    fn from_value(data: &Value) -> Self {
        let text = |field: &str| data.get(field).and_then(Value::as_str).map(str::to_string);
        Self {
            id: text("Id"),
            name: text("Name"),
            image_name: text("ImageName"),
            inserted: data.get("Inserted").and_then(Value::as_bool),
        }
    }
}

fn show(value: &Option<impl ToString>) -> String {
    value
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "None".to_string())
}

impl HostSession {
    /// The manager's virtual media collection, or `None` when it has none.
    async fn virtual_media_collection(&self) -> Result<Option<Value>> {
        let manager = self.client.get(&self.paths.manager).await?.json()?;
        let Some(link) = manager
            .get("VirtualMedia")
            .and_then(|vm| vm.get("@odata.id"))
            .and_then(Value::as_str)
        else {
            return Ok(None);
        };

        Ok(Some(self.client.get(link).await?.json()?))
    }

    pub async fn check_virtual_media(&self) -> Result<Vec<MediaSlot>> {
        let Some(collection) = self.virtual_media_collection().await? else {
            error!("No VirtualMedia endpoint found");
            return Err(RedfishError::UnsupportedOperation(
                "VirtualMedia".to_string(),
            ));
        };

        let members = member_links(&collection);
        if members.is_empty() {
            warn!("No active VirtualMedia found");
            return Ok(Vec::new());
        }

        let mut slots = Vec::with_capacity(members.len());
        for member in members {
            let slot = MediaSlot::from_value(&self.client.get(&member).await?.json()?);
            info!(
                "ID: {} - Name: {} - ImageName: {} - Inserted: {}",
                show(&slot.id),
                show(&slot.name),
                show(&slot.image_name),
                show(&slot.inserted)
            );
            slots.push(slot);
        }
        Ok(slots)
    }

    /// Unmount every image. Returns false when the controller has no
    /// unmount action.
    pub async fn unmount_virtual_media(&self) -> Result<bool> {
        let config = self.virtual_media_collection().await?.and_then(|vm| {
            vm.pointer("/Oem/Supermicro/VirtualMediaConfig/@odata.id")
                .and_then(Value::as_str)
                .map(str::to_string)
        });

        let Some(config) = config else {
            warn!("OOB management does not support Virtual Media unmount");
            return Ok(false);
        };

        let url = format!("{}/Actions/IsoConfig.UnMount", config);
        let reply = self.client.post(&url, &json!({})).await?;
        if !reply.is_ok() {
            error!("There was something wrong unmounting the VirtualMedia");
            return Err(RedfishError::RequestRejected {
                status: reply.status,
                message: "virtual media unmount failed".to_string(),
                resolution: None,
            });
        }

        info!("Successfully unmounted all VirtualMedia");
        Ok(true)
    }
}

//! Redfish data types: response envelope, boot devices, power states, resource paths.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::error::{RedfishError, Result};

pub const REDFISH_ROOT: &str = "/redfish/v1";

/// Reset types referenced by name. Everything else comes from the
/// controller's advertised `ResetType@Redfish.AllowableValues`.
pub const GRACEFUL_RESTART: &str = "GracefulRestart";
pub const FORCE_RESTART: &str = "ForceRestart";
pub const FORCE_OFF: &str = "ForceOff";
pub const POWER_ON: &str = "On";

/// Response envelope produced by the request layer for every call.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
    /// `Location` header, set by controllers when a job is created
    pub location: Option<String>,
}

impl Reply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            location: None,
        }
    }

    #[cfg(test)]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Decode the body as JSON. Decoding happens on demand; most callers
    /// only look at the status code.
    pub fn json(&self) -> Result<Value> {
        serde_json::from_str(self.body.trim()).map_err(|e| {
            RedfishError::MalformedResponse(format!(
                "non-JSON body with status {}: {}",
                self.status, e
            ))
        })
    }

    /// Turn an unexpected reply into an error, surfacing the controller's
    /// structured error message when it sent one.
    pub fn rejection(&self) -> RedfishError {
        let data = match self.json() {
            Ok(data) => data,
            Err(e) => return e,
        };

        let payload = ErrorPayload::from_value(&data);
        if let Some(message) = &payload.message {
            warn!("{}", message);
        }
        if let Some(resolution) = &payload.resolution {
            info!("{}", resolution);
        }

        RedfishError::RequestRejected {
            status: self.status,
            message: payload
                .message
                .unwrap_or_else(|| "no error details returned".to_string()),
            resolution: payload.resolution,
        }
    }
}

/// The `error.@Message.ExtendedInfo[0]` block of a Redfish error body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorPayload {
    pub message: Option<String>,
    pub resolution: Option<String>,
}

impl ErrorPayload {
    pub fn from_value(data: &Value) -> Self {
        let info = data
            .get("error")
            .and_then(|e| e.get("@Message.ExtendedInfo"))
            .and_then(|i| i.get(0));

        let field = |name: &str| {
            info.and_then(|i| i.get(name))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };

        Self {
            message: field("Message"),
            resolution: field("Resolution"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.message.is_none() && self.resolution.is_none()
    }
}

/// `@odata.id` links of a collection's `Members` array.
pub fn member_links(data: &Value) -> Vec<String> {
    data.get("Members")
        .and_then(|m| m.as_array())
        .map(|members| {
            members
                .iter()
                .filter_map(|m| m.get("@odata.id").and_then(|v| v.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// One entry of the BIOS boot sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BootDevice {
    pub name: String,
    pub index: u32,
    pub enabled: bool,
    /// Vendor fields (`Id`, ...) sent back untouched when patching
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl BootDevice {
    #[cfg(test)]
    pub fn new(name: impl Into<String>, index: u32, enabled: bool) -> Self {
        Self {
            name: name.into(),
            index,
            enabled,
            extra: serde_json::Map::new(),
        }
    }
}

/// Which BIOS attribute holds the boot sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootSequence {
    Uefi,
    Legacy,
}

impl BootSequence {
    pub fn from_boot_mode(mode: &str) -> Self {
        if mode == "Uefi" {
            BootSequence::Uefi
        } else {
            BootSequence::Legacy
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            BootSequence::Uefi => "UefiBootSeq",
            BootSequence::Legacy => "BootSeq",
        }
    }
}

/// Host power state as reported by the system resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
    /// No answer from the controller, or a non-200 reply
    Down,
    /// Transitional or vendor specific (`PoweringOn`, `Reset`, ...)
    Other(String),
}

impl PowerState {
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "on" => PowerState::On,
            "off" => PowerState::Off,
            "down" => PowerState::Down,
            _ => PowerState::Other(value.to_string()),
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::On => write!(f, "On"),
            PowerState::Off => write!(f, "Off"),
            PowerState::Down => write!(f, "Down"),
            PowerState::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Resource paths resolved once per session by the locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePaths {
    pub system: String,
    pub manager: String,
    pub bios_settings: String,
}

impl ResourcePaths {
    pub fn new(system: impl Into<String>, manager: impl Into<String>) -> Self {
        let system = system.into();
        let bios_settings = format!("{}/Bios/Settings", system);
        Self {
            system,
            manager: manager.into(),
            bios_settings,
        }
    }
}

//! Resource discovery: service root -> System and Manager resource paths.

use serde_json::Value;
use tracing::{debug, error, info};

use super::client::RedfishClient;
use super::error::{RedfishError, Result};
use super::types::{member_links, ErrorPayload, ResourcePaths, REDFISH_ROOT};

/// Resolve the System, Manager and BIOS settings paths for a controller.
pub async fn locate(client: &RedfishClient) -> Result<ResourcePaths> {
    let root = client.get(REDFISH_ROOT).await?;
    if root.status == 401 {
        error!("Failed to authenticate. Verify your credentials.");
        return Err(RedfishError::AuthenticationFailure(client.host().to_string()));
    }

    let root = root.json()?;
    let system = first_member(client, &root, "Systems").await?;
    let manager = first_member(client, &root, "Managers").await?;

    Ok(ResourcePaths::new(system, manager))
}

async fn first_member(client: &RedfishClient, root: &Value, collection: &str) -> Result<String> {
    let link = root
        .get(collection)
        .and_then(|c| c.get("@odata.id"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            error!("{} resource not found", collection);
            unsupported(root, format!("{} resource not found", collection))
        })?;

    let reply = client.get(link).await?;
    if reply.status == 401 {
        error!("Authorization Error: verify credentials.");
        return Err(RedfishError::AuthenticationFailure(client.host().to_string()));
    }

    let data = reply.json()?;
    if let Some(member) = member_links(&data).into_iter().next() {
        debug!("{} service: {}", collection, member);
        return Ok(member);
    }

    error!("{} Members array is either empty or missing", collection);
    Err(unsupported(
        &data,
        format!("{} collection has no members", collection),
    ))
}

/// Log the controller's error payload, if any, and fold its message into
/// the returned error.
fn unsupported(data: &Value, what: String) -> RedfishError {
    let payload = ErrorPayload::from_value(data);
    if payload.is_empty() {
        return RedfishError::UnsupportedOperation(what);
    }

    if let Some(message) = &payload.message {
        error!("{}", message);
    }
    if let Some(resolution) = &payload.resolution {
        info!("{}", resolution);
    }
    match payload.message {
        Some(message) => RedfishError::UnsupportedOperation(format!("{}: {}", what, message)),
        None => RedfishError::UnsupportedOperation(what),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redfish::testing::{MockController, MANAGER, SYSTEM};
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::Semaphore;

    fn client(mock: MockController) -> RedfishClient {
        RedfishClient::new("bmc.test", Arc::new(mock), Arc::new(Semaphore::new(50)), 64)
    }

    #[tokio::test]
    async fn test_locate_resolves_first_members() {
        let paths = locate(&client(MockController::dell())).await.unwrap();
        assert_eq!(paths.system, SYSTEM);
        assert_eq!(paths.manager, MANAGER);
        assert_eq!(paths.bios_settings, format!("{}/Bios/Settings", SYSTEM));
    }

    #[tokio::test]
    async fn test_locate_unauthorized() {
        let mock = MockController::new();
        mock.on_get("/redfish/v1", 401, json!({}));
        assert!(matches!(
            locate(&client(mock)).await,
            Err(RedfishError::AuthenticationFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_locate_empty_systems_collection() {
        let mock = MockController::dell();
        mock.clear(crate::redfish::transport::Method::Get, "/redfish/v1/Systems");
        mock.on_get(
            "/redfish/v1/Systems",
            200,
            json!({"error": {"@Message.ExtendedInfo": [{
                "Message": "Unable to complete the operation because the resource is busy.",
                "Resolution": "Wait a few minutes and retry."
            }]}}),
        );
        match locate(&client(mock)).await {
            Err(RedfishError::UnsupportedOperation(msg)) => {
                assert!(msg.contains("resource is busy"), "{msg}")
            }
            other => panic!("unexpected result: {:?}", other.map(|p| p.system)),
        }
    }

    #[tokio::test]
    async fn test_locate_root_error_payload() {
        let mock = MockController::new();
        mock.on_get(
            "/redfish/v1",
            200,
            json!({"error": {"@Message.ExtendedInfo": [{
                "Message": "The service is temporarily unavailable.",
                "Resolution": "Retry the operation."
            }]}}),
        );
        match locate(&client(mock)).await {
            Err(RedfishError::UnsupportedOperation(msg)) => {
                assert_eq!(
                    msg,
                    "Systems resource not found: The service is temporarily unavailable."
                )
            }
            other => panic!("unexpected result: {:?}", other.map(|p| p.system)),
        }
    }

    #[tokio::test]
    async fn test_locate_missing_managers() {
        let mock = MockController::dell();
        mock.clear(crate::redfish::transport::Method::Get, "/redfish/v1");
        mock.on_get(
            "/redfish/v1",
            200,
            json!({"Systems": {"@odata.id": "/redfish/v1/Systems"}}),
        );
        assert!(matches!(
            locate(&client(mock)).await,
            Err(RedfishError::UnsupportedOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_locate_unreachable() {
        let mock = MockController::new();
        mock.on_transient(crate::redfish::transport::Method::Get, "/redfish/v1");
        assert!(matches!(
            locate(&client(mock)).await,
            Err(RedfishError::CommunicationFailure(_))
        ));
    }
}

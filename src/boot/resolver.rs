//! Hierarchical template lookup from the host-name convention
//! `<...>-<rack>-<uloc>-<blade>-<model>.<domain>`.

use regex::Regex;
use tracing::{debug, error};

use super::templates::TemplateSet;
use crate::redfish::{RedfishError, Result};

const BLADE_PATTERN: &str = r"^b0[0-9]";

/// Location fields taken from the last four `-` fields of the short name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostName {
    pub rack: String,
    pub uloc: String,
    pub blade: String,
    pub model: String,
}

impl HostName {
    pub fn parse(host: &str) -> Result<Self> {
        let short = host.split('.').next().unwrap_or(host);
        let fields: Vec<&str> = short.split('-').collect();
        if fields.len() < 4 {
            error!("Host name {} does not follow the rack-uloc-blade-model convention", host);
            return Err(RedfishError::TemplateNotFound(format!(
                "{} has fewer than four name fields",
                host
            )));
        }

        let n = fields.len();
        Ok(Self {
            rack: fields[n - 4].to_string(),
            uloc: fields[n - 3].to_string(),
            blade: fields[n - 2].to_string(),
            model: fields[n - 1].to_string(),
        })
    }

    pub fn is_blade(&self) -> Result<bool> {
        let pattern = Regex::new(BLADE_PATTERN)
            .map_err(|e| RedfishError::MalformedResponse(format!("blade pattern: {}", e)))?;
        Ok(pattern.is_match(&self.blade))
    }
}

/// Template keys to try, most specific first.
pub fn candidate_keys(host_type: &str, name: &HostName) -> Result<Vec<String>> {
    let HostName {
        rack, uloc, blade, model,
    } = name;

    let mut keys = Vec::with_capacity(4);
    if name.is_blade()? {
        keys.push(format!("{host_type}_{rack}_{uloc}_{model}_{blade}"));
    }
    keys.push(format!("{host_type}_{rack}_{uloc}_{model}"));
    keys.push(format!("{host_type}_{rack}_{model}"));
    keys.push(format!("{host_type}_{model}"));

    Ok(keys
        .into_iter()
        .map(|key| format!("{key}_interfaces"))
        .collect())
}

/// First template present for `host` and `host_type`.
pub fn resolve_template<'a>(
    host: &str,
    host_type: &str,
    templates: &'a TemplateSet,
) -> Result<&'a [String]> {
    let name = HostName::parse(host)?;
    let keys = candidate_keys(host_type, &name)?;

    for key in &keys {
        if let Some(devices) = templates.get(key) {
            debug!("Using boot template {} for {}", key, host);
            return Ok(devices);
        }
    }

    let last = keys.last().cloned().unwrap_or_default();
    error!(
        "Couldn't find a valid key defined on the interfaces yaml: {}",
        last
    );
    Err(RedfishError::TemplateNotFound(last))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_name() {
        let name = HostName::parse("mgmt-rack1-u2-b03-640.example.com").unwrap();
        assert_eq!(name.rack, "rack1");
        assert_eq!(name.uloc, "u2");
        assert_eq!(name.blade, "b03");
        assert_eq!(name.model, "640");
        assert!(name.is_blade().unwrap());

        assert!(matches!(
            HostName::parse("u2-640.example.com"),
            Err(RedfishError::TemplateNotFound(_))
        ));
    }

    #[test]
    fn test_candidate_keys_order() {
        let name = HostName::parse("rack1-u2-b03-640").unwrap();
        assert_eq!(
            candidate_keys("director", &name).unwrap(),
            vec![
                "director_rack1_u2_640_b03_interfaces",
                "director_rack1_u2_640_interfaces",
                "director_rack1_640_interfaces",
                "director_640_interfaces",
            ]
        );

        let name = HostName::parse("mgmt-f22-h01-000-r620").unwrap();
        assert_eq!(candidate_keys("foreman", &name).unwrap().len(), 3);
    }

    #[test]
    fn test_resolve_falls_back_to_least_specific() {
        let templates = TemplateSet::from_pairs([
            ("director_640_interfaces", "NIC.Slot.2-1-1,HardDisk.List.1-1"),
            ("director_rack1_u4_640_interfaces", "HardDisk.List.1-1"),
        ]);
        let devices = resolve_template("rack1-u2-b03-640.example.com", "director", &templates)
            .unwrap();
        assert_eq!(devices, ["NIC.Slot.2-1-1", "HardDisk.List.1-1"]);
    }

    #[test]
    fn test_resolve_prefers_most_specific() {
        let templates = TemplateSet::from_pairs([
            ("director_640_interfaces", "NIC.Slot.2-1-1"),
            ("director_rack1_u2_640_b03_interfaces", "NIC.Integrated.1-1-1"),
        ]);
        let devices = resolve_template("rack1-u2-b03-640", "director", &templates).unwrap();
        assert_eq!(devices, ["NIC.Integrated.1-1-1"]);
    }

    #[test]
    fn test_resolve_names_last_key_tried() {
        let templates = TemplateSet::from_pairs([("foreman_640_interfaces", "NIC.Slot.2-1-1")]);
        match resolve_template("rack1-u2-b03-640", "director", &templates) {
            Err(RedfishError::TemplateNotFound(key)) => {
                assert_eq!(key, "director_640_interfaces")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}

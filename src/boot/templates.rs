//! Boot device templates.
//! Reads the YAML mapping of `<type>_..._interfaces` keys to ordered device
//! names. Values are comma-separated strings; plain YAML lists are accepted too.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDevices {
    Csv(String),
    List(Vec<String>),
}

impl RawDevices {
    fn into_names(self) -> Vec<String> {
        let names = match self {
            RawDevices::Csv(csv) => csv.split(',').map(str::to_string).collect(),
            RawDevices::List(list) => list,
        };
        names
            .into_iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect()
    }
}

/// Template key to ordered device names. Read-only once loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateSet {
    entries: BTreeMap<String, Vec<String>>,
}

impl TemplateSet {
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let entries = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), RawDevices::Csv(v.as_ref().to_string()).into_names()))
            .collect();
        Self { entries }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let raw: BTreeMap<String, RawDevices> =
            serde_yaml::from_str(content).context("Failed to parse interfaces YAML")?;
        let entries = raw
            .into_iter()
            .map(|(key, devices)| (key, devices.into_names()))
            .collect();
        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries
            .get(key)
            .filter(|devices| !devices.is_empty())
            .map(Vec::as_slice)
    }

    /// Distinct first `_` fields of every key, sorted.
    pub fn host_types(&self) -> Vec<String> {
        self.entries
            .keys()
            .filter_map(|key| key.split('_').next())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn has_type(&self, host_type: &str) -> bool {
        let wanted = host_type.to_lowercase();
        self.host_types().iter().any(|t| *t == wanted)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Load a template file from disk.
pub fn load_templates(path: &Path) -> Result<TemplateSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("No such file or directory: {:?}", path))?;
    let templates = TemplateSet::parse(&content)
        .with_context(|| format!("Couldn't read file: {:?}", path))?;

    if templates.is_empty() {
        warn!("No boot templates found in {:?}", path);
    }
    info!(
        "Loaded {} boot templates for host types: {}",
        templates.len(),
        templates.host_types().join(", ")
    );
    Ok(templates)
}

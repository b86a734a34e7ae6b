//! Host list file: one host per line.

use std::path::Path;

use anyhow::{Context, Result};

pub fn load_host_list(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("There was something wrong reading from {:?}", path))?;
    Ok(parse_host_list(&content))
}

pub fn parse_host_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_blank_lines() {
        let hosts = parse_host_list("mgmt-r1-u2-640.example.com\n\n  mgmt-r1-u4-640.example.com  \n");
        assert_eq!(
            hosts,
            vec!["mgmt-r1-u2-640.example.com", "mgmt-r1-u4-640.example.com"]
        );
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_host_list(&dir.path().join("hosts.txt")).is_err());
    }
}

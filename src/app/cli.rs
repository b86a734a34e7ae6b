//! Command-line argument definitions (clap) and action selection.

use std::path::PathBuf;

use clap::Parser;

use crate::orchestrator::Action;

#[derive(Parser, Debug)]
#[command(name = "pankha-redfish")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Tool for managing server hardware via the Redfish API.", long_about = None)]
pub struct Args {
    // === Target ===
    /// Controller host address
    #[arg(short = 'H', help_heading = "Target")]
    pub host: Option<String>,

    /// Path to a plain text file with a list of hosts
    #[arg(long = "host-list", help_heading = "Target")]
    pub host_list: Option<PathBuf>,

    /// Controller username
    #[arg(short = 'u', help_heading = "Target")]
    pub username: String,

    /// Controller password
    #[arg(short = 'p', help_heading = "Target")]
    pub password: String,

    // === Boot ===
    /// Path to the interfaces yaml
    #[arg(short = 'i', help_heading = "Boot")]
    pub interfaces: Option<PathBuf>,

    /// Type of host as defined on the interfaces yaml
    #[arg(short = 't', help_heading = "Boot")]
    pub host_type: Option<String>,

    /// Set next boot to one-shot boot PXE
    #[arg(long, help_heading = "Boot")]
    pub pxe: bool,

    /// Set next boot to one-shot boot to a specific device
    #[arg(long = "boot-to", help_heading = "Boot")]
    pub boot_to: Option<String>,

    /// Set next boot to one-shot boot to a specific type as defined on the interfaces yaml
    #[arg(long = "boot-to-type", help_heading = "Boot")]
    pub boot_to_type: Option<String>,

    /// Set next boot to one-shot boot to a specific MAC address on the target
    #[arg(long = "boot-to-mac", help_heading = "Boot")]
    pub boot_to_mac: Option<String>,

    /// Check the host boot order
    #[arg(long = "check-boot", help_heading = "Boot")]
    pub check_boot: bool,

    // === Power ===
    /// Only reboot the host
    #[arg(long = "reboot-only", help_heading = "Power")]
    pub reboot_only: bool,

    /// Send ForceOff to the host, then power it back on
    #[arg(long = "power-cycle", help_heading = "Power")]
    pub power_cycle: bool,

    /// Get power state
    #[arg(long = "power-state", help_heading = "Power")]
    pub power_state: bool,

    /// Power on host
    #[arg(long = "power-on", help_heading = "Power")]
    pub power_on: bool,

    /// Power off host
    #[arg(long = "power-off", help_heading = "Power")]
    pub power_off: bool,

    /// Reset the management controller
    #[arg(long, help_heading = "Power")]
    pub racreset: bool,

    /// Reset BIOS to default factory settings
    #[arg(long = "factory-reset", help_heading = "Power")]
    pub factory_reset: bool,

    // === Jobs ===
    /// Clear any scheduled jobs from the queue
    #[arg(long = "clear-jobs", help_heading = "Jobs")]
    pub clear_jobs: bool,

    /// Force clearing of the job queue
    #[arg(short = 'f', long, help_heading = "Jobs")]
    pub force: bool,

    /// List any scheduled jobs in queue
    #[arg(long = "ls-jobs", help_heading = "Jobs")]
    pub ls_jobs: bool,

    // === Virtual media ===
    /// Check for mounted iso images
    #[arg(long = "check-virtual-media", help_heading = "Virtual Media")]
    pub check_virtual_media: bool,

    /// Unmount any mounted iso images
    #[arg(long = "unmount-virtual-media", help_heading = "Virtual Media")]
    pub unmount_virtual_media: bool,

    // === Output & Config ===
    /// Also write log lines to this file
    #[arg(short = 'l', long, help_heading = "Output & Config")]
    pub log: Option<PathBuf>,

    /// Verbose output
    #[arg(short = 'v', long, help_heading = "Output & Config")]
    pub verbose: bool,

    /// Number of retries for executing actions
    #[arg(short = 'r', long, help_heading = "Output & Config")]
    pub retries: Option<u32>,

    /// JSON run configuration file
    #[arg(long, help_heading = "Output & Config")]
    pub config: Option<PathBuf>,
}

impl Args {
    /// The action to run. When several flags are given the first one in
    /// this order wins.
    pub fn action(&self) -> Option<Action> {
        let action = if let Some(device) = &self.boot_to {
            Action::BootTo(device.clone())
        } else if let Some(host_type) = &self.boot_to_type {
            Action::BootToType(host_type.clone())
        } else if let Some(mac) = &self.boot_to_mac {
            Action::BootToMac(mac.clone())
        } else if self.check_boot {
            Action::CheckBoot
        } else if self.clear_jobs {
            Action::ClearJobs { force: self.force }
        } else if self.ls_jobs {
            Action::ListJobs
        } else if let Some(host_type) = &self.host_type {
            Action::ChangeBoot {
                host_type: host_type.clone(),
                pxe: self.pxe,
            }
        } else if self.racreset {
            Action::ResetController
        } else if self.factory_reset {
            Action::ResetBios
        } else if self.power_state {
            Action::PowerState
        } else if self.power_on {
            Action::PowerOn
        } else if self.power_off {
            Action::PowerOff
        } else if self.power_cycle {
            Action::PowerCycle
        } else if self.reboot_only {
            Action::Reboot
        } else if self.check_virtual_media {
            Action::CheckVirtualMedia
        } else if self.unmount_virtual_media {
            Action::UnmountVirtualMedia
        } else if self.pxe {
            Action::NextBootPxe
        } else {
            return None;
        };
        Some(action)
    }

    /// `--pxe` without `-t` sets PXE for next boot after another action.
    pub fn pxe_after(&self, action: &Action) -> bool {
        self.pxe && self.host_type.is_none() && *action != Action::NextBootPxe
    }

    pub fn filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

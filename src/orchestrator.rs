//! Host orchestrator: runs one action against every host concurrently,
//! isolating failures so one bad controller never stops its siblings.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::boot::TemplateSet;
use crate::redfish::{HostSession, RedfishError, Result, RunContext};

/// What to do on each host. Mirrors the CLI action flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    BootTo(String),
    BootToType(String),
    BootToMac(String),
    CheckBoot,
    ClearJobs { force: bool },
    ListJobs,
    ChangeBoot { host_type: String, pxe: bool },
    ResetController,
    ResetBios,
    PowerState,
    PowerOn,
    PowerOff,
    PowerCycle,
    Reboot,
    CheckVirtualMedia,
    UnmountVirtualMedia,
    /// Only set the next boot to PXE
    NextBootPxe,
}

impl Action {
    fn needs_templates(&self) -> bool {
        matches!(self, Action::BootToType(_) | Action::ChangeBoot { .. })
    }
}

/// An action plus what it needs beyond the session.
#[derive(Debug, Clone)]
pub struct Plan {
    pub action: Action,
    pub templates: Option<Arc<TemplateSet>>,
    /// Set next boot to PXE once the action is done
    pub pxe_after: bool,
}

impl Plan {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            templates: None,
            pxe_after: false,
        }
    }

    pub fn with_templates(mut self, templates: Option<Arc<TemplateSet>>) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_pxe_after(mut self, pxe_after: bool) -> Self {
        self.pxe_after = pxe_after;
        self
    }

    fn templates(&self) -> Result<&TemplateSet> {
        self.templates.as_deref().ok_or_else(|| {
            error!("You must provide a path to the interfaces yaml via `-i` optional argument.");
            RedfishError::TemplateNotFound("no interfaces file given".to_string())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostOutcome {
    pub host: String,
    pub success: bool,
}

/// Run the planned action on an open session.
pub async fn execute(session: &HostSession, plan: &Plan) -> Result<()> {
    if plan.action.needs_templates() {
        plan.templates()?;
    }

    match &plan.action {
        Action::BootTo(device) => session.boot_to(device).await?,
        Action::BootToType(host_type) => session.boot_to_type(host_type, plan.templates()?).await?,
        Action::BootToMac(mac) => session.boot_to_mac(mac).await?,
        Action::CheckBoot => session.check_boot(plan.templates.as_deref()).await?,
        Action::ClearJobs { force } => session.clear_job_queue(*force).await?,
        Action::ListJobs => {
            session.list_jobs().await?;
        }
        Action::ChangeBoot { host_type, pxe } => {
            session.change_boot(host_type, plan.templates()?, *pxe).await?
        }
        Action::ResetController => session.reset_controller().await?,
        Action::ResetBios => session.reset_bios().await?,
        Action::PowerState => {
            let state = session.power_state().await?;
            info!("Power state for {}: {}", session.host, state);
        }
        Action::PowerOn => {
            session.set_power_state("on").await?;
        }
        Action::PowerOff => {
            session.set_power_state("off").await?;
        }
        Action::PowerCycle => session.reboot(false).await?,
        Action::Reboot => session.reboot(true).await?,
        Action::CheckVirtualMedia => {
            session.check_virtual_media().await?;
        }
        Action::UnmountVirtualMedia => {
            session.unmount_virtual_media().await?;
        }
        Action::NextBootPxe => {}
    }

    if plan.pxe_after || plan.action == Action::NextBootPxe {
        session.set_next_boot_pxe().await?;
    }
    Ok(())
}

/// Open a session for `host` and run the plan, turning any failure into a
/// failed outcome. A cancelled run stops the host at its next request.
pub async fn run_host(
    ctx: &RunContext,
    host: &str,
    plan: &Plan,
    progress_bar: bool,
) -> HostOutcome {
    let short = host.split('.').next().unwrap_or(host).to_string();
    let span = info_span!("host", host = %short);

    let success = async {
        if ctx.is_cancelled() {
            warn!("Run interrupted before {} was started", host);
            return false;
        }

        let result = match ctx.open_session(host).await {
            Ok(mut session) => {
                session.progress_bar = progress_bar;
                execute(&session, plan).await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => true,
            Err(RedfishError::Interrupted(_)) => {
                warn!("Run interrupted, stopped work on {}", host);
                false
            }
            Err(e) => {
                debug!("{:?}", e);
                error!("{}", e);
                error!("There was something wrong executing actions on {}", host);
                false
            }
        }
    }
    .instrument(span)
    .await;

    HostOutcome {
        host: host.to_string(),
        success,
    }
}

/// Run the plan on every host. Outcomes come back in input order.
pub async fn run_all(ctx: &RunContext, hosts: &[String], plan: &Plan) -> Vec<HostOutcome> {
    if let [host] = hosts {
        return vec![run_host(ctx, host, plan, true).await];
    }

    info!("Executing actions on {} hosts", hosts.len());
    let runs = hosts.iter().map(|host| run_host(ctx, host, plan, false));
    join_all(runs).await
}

pub fn print_summary(outcomes: &[HostOutcome]) {
    info!("{}", "*".repeat(48));
    info!("RESULTS:");
    for outcome in outcomes {
        if outcome.success {
            info!("{}: SUCCESSFUL", outcome.host);
        } else {
            info!("{}: FAILED", outcome.host);
        }
    }
}

pub fn all_succeeded(outcomes: &[HostOutcome]) -> bool {
    outcomes.iter().all(|o| o.success)
}

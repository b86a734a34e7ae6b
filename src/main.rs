//! pankha-redfish entry point: CLI parsing, logging, config and the host run.

mod app;
mod boot;
mod config;
mod jobs;
mod media;
mod orchestrator;
mod power;
mod redfish;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use clap::Parser;
use tracing::{debug, error, info, warn};

use app::cli::Args;
use app::logging::init_tracing;
use boot::load_templates;
use config::hosts::load_host_list;
use config::persistence::load_config;
use orchestrator::{all_succeeded, print_summary, run_all, Plan};
use redfish::{Credentials, HttpConnector, RunContext};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = init_tracing(args.filter(), args.log.as_deref()) {
        eprintln!("ERROR: {:#}", e);
        std::process::exit(1);
    }

    match run(args).await {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether every host succeeded.
async fn run(args: Args) -> Result<bool> {
    let mut config = load_config(args.config.as_deref()).await?;
    if let Some(retries) = args.retries {
        config.retries = retries;
    }
    config.validate()?;
    debug!("Run configuration: {:?}", config);

    let hosts = match (&args.host_list, &args.host) {
        (Some(path), _) => load_host_list(path)?,
        (None, Some(host)) => vec![host.clone()],
        (None, None) => {
            bail!("You must specify at least either a host (-H) or a host list (--host-list).")
        }
    };
    if hosts.is_empty() {
        bail!("No hosts to run against");
    }

    let action = args
        .action()
        .ok_or_else(|| anyhow!("No action specified. See --help for the available actions."))?;
    let templates = match &args.interfaces {
        Some(path) => Some(Arc::new(load_templates(path)?)),
        None => None,
    };
    let plan = Plan::new(action.clone())
        .with_templates(templates)
        .with_pxe_after(args.pxe_after(&action));

    let credentials = Credentials::new(args.username.clone(), args.password.clone());
    let connector = HttpConnector::new(credentials, config.request_timeout());
    let ctx = RunContext::new(config, Arc::new(connector));

    // First Ctrl-C: no new requests go out, calls in flight finish.
    // Second Ctrl-C: exit immediately.
    let flag = ctx.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Terminated, waiting for requests in flight (Ctrl-C again to exit now)");
            flag.store(true, Ordering::SeqCst);
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            error!("Terminated");
            std::process::exit(1);
        }
    });

    info!(
        "pankha-redfish v{} running {:?} on {} host(s)",
        env!("CARGO_PKG_VERSION"),
        plan.action,
        hosts.len()
    );
    let outcomes = run_all(&ctx, &hosts, &plan).await;

    if args.host_list.is_some() {
        print_summary(&outcomes);
    }
    Ok(all_succeeded(&outcomes))
}

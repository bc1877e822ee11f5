//! `nudge run`: host the scheduler in the foreground.
//!
//! Lines on stdin are fed in as group messages; `/scan` forces a scan.
//! Ctrl-C or end of input shuts the scheduler down.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use nudge_config::{apply_all_defaults, load_config};
use nudge_scheduler::{CampaignReport, OutreachScheduler};

use crate::console::{parse_line, ConsoleGateway};
use crate::terminal_output::{note_info, note_warn};

pub async fn run(config_path: &Path) -> Result<()> {
    let config = load_config(config_path).await?;

    let log_config = apply_all_defaults(config.clone()).logging.unwrap_or_default();
    logging::init_logger(
        log_config.dir.as_deref().map(Path::new),
        log_config.level.as_deref().unwrap_or("info"),
    );

    let gateway = Arc::new(ConsoleGateway::new());
    let scheduler = OutreachScheduler::from_config(config, gateway.clone())?;
    scheduler.start().await;

    let mut reports = scheduler.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match reports.recv().await {
                Ok(report) => note_info(&describe(&report)),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Campaign reports dropped"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                handle_line(&scheduler, &gateway, &line).await;
            }
        }
    }

    scheduler.stop().await;
    printer.abort();
    Ok(())
}

async fn handle_line(scheduler: &OutreachScheduler, gateway: &ConsoleGateway, line: &str) {
    if line.trim() == "/scan" {
        let report = scheduler.scan_now().await;
        note_info(&format!(
            "scan: {} evaluated, {} started, {} running, {} cooling down, {} failed{}",
            report.evaluated,
            report.started,
            report.deduplicated,
            report.cooling_down,
            report.failed,
            if report.outside_active_hours { " (outside active hours)" } else { "" },
        ));
        return;
    }

    match parse_line(line) {
        Some(message) => {
            gateway.observe(&message).await;
            scheduler.on_group_message(&message).await;
        }
        None if line.trim().is_empty() => {}
        None => note_warn("expected `<group> <user> <text>`"),
    }
}

fn describe(report: &CampaignReport) -> String {
    format!(
        "campaign for {} ended: {} after {} reminder(s)",
        report.key, report.outcome, report.attempts
    )
}

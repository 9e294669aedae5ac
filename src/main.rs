//! # OpsManager Sentinel — headless dashboard shell
//!
//! Drives the live panels of the ops dashboard without a UI and prints what
//! the render layer would show.
//!
//! Usage:
//!   opsmanager run                          # Wall-clock run until Ctrl+C
//!   opsmanager run --duration 60 --time-scale 10
//!   opsmanager simulate --until 120 --audit-at 30 --json
//!   opsmanager init-config                  # Write ~/.opsmanager/config.toml

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use opsmanager_core::SentinelConfig;
use opsmanager_scheduler::{Dashboard, DashboardSnapshot, EventStatus, RuntimeOptions, spawn_dashboard};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "opsmanager",
    version,
    about = "🛰️ OpsManager Sentinel — synthetic live telemetry for the ops dashboard"
)]
struct Cli {
    /// Config file (defaults to ~/.opsmanager/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Fixed RNG seed, overrides the config
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run against the wall clock, printing every change
    Run {
        /// Stop after this many wall-clock seconds
        #[arg(long)]
        duration: Option<u64>,

        /// Virtual seconds per wall-clock second (at most 1000)
        #[arg(long)]
        time_scale: Option<f64>,

        /// Emit snapshots as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Fast-forward the virtual clock and print the final state
    Simulate {
        /// Virtual seconds to simulate
        #[arg(long, default_value = "60")]
        until: u64,

        /// Trigger a global audit at this virtual second (repeatable)
        #[arg(long = "audit-at")]
        audit_at: Vec<u64>,

        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

fn load_config(cli: &Cli) -> Result<SentinelConfig> {
    let mut config = match &cli.config {
        Some(path) => SentinelConfig::load_from(&expand_path(path))?,
        None => SentinelConfig::load()?,
    };
    if cli.seed.is_some() {
        config.runtime.seed = cli.seed;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "opsmanager=debug,opsmanager_scheduler=debug,opsmanager_core=debug"
    } else {
        "opsmanager=info,opsmanager_scheduler=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Command::InitConfig { force } => {
            let path = cli
                .config
                .as_deref()
                .map(expand_path)
                .unwrap_or_else(SentinelConfig::default_path);
            if path.exists() && !force {
                println!("⚠️  {} already exists (use --force to overwrite)", path.display());
                return Ok(());
            }
            SentinelConfig::default()
                .save_to(&path)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("✅ Wrote default config to {}", path.display());
        }
        Command::Simulate {
            until,
            audit_at,
            json,
        } => {
            let config = load_config(&cli)?;
            let snapshot = simulate(&config, *until, audit_at)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print!("{}", render(&snapshot));
            }
        }
        Command::Run {
            duration,
            time_scale,
            json,
        } => {
            let mut config = load_config(&cli)?;
            if let Some(scale) = time_scale {
                config.runtime.time_scale = *scale;
            }
            config.validate()?;
            run(&config, duration.map(Duration::from_secs), *json).await?;
        }
    }

    Ok(())
}

/// Deterministic fast-forward with audits injected at given instants.
fn simulate(config: &SentinelConfig, until: u64, audit_at: &[u64]) -> Result<DashboardSnapshot> {
    let mut dashboard = Dashboard::new(config)?;
    let mut triggers: Vec<u64> = audit_at.iter().copied().filter(|t| *t <= until).collect();
    triggers.sort_unstable();

    for at in triggers {
        dashboard.advance_to(Duration::from_secs(at));
        if !dashboard.trigger_audit() {
            tracing::info!("🔍 Audit at {at}s skipped: already running");
        }
    }
    dashboard.advance_to(Duration::from_secs(until));

    let snapshot = dashboard.snapshot();
    dashboard.close();
    Ok(snapshot)
}

async fn run(config: &SentinelConfig, duration: Option<Duration>, json: bool) -> Result<()> {
    let dashboard = Dashboard::new(config)?;
    let handle = spawn_dashboard(dashboard, RuntimeOptions::from(&config.runtime));
    let mut updates = handle.subscribe();

    let deadline = async {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                if json {
                    println!("{}", serde_json::to_string(&snapshot)?);
                } else {
                    print!("{}", render(&snapshot));
                }
            }
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("🛑 Ctrl+C received");
                break;
            }
        }
    }

    let last = handle.shutdown().await?;
    tracing::info!(
        "📊 Session {} ended: {} events on screen, {} audits completed",
        last.session,
        last.events.len(),
        last.audits_completed
    );
    Ok(())
}

/// Plain-text stand-in for the Stream Monitor and toast area.
fn render(snapshot: &DashboardSnapshot) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "── t={:.1}s │ audit: {} ({} done) │ {} notifications ({} alerts)\n",
        snapshot.elapsed_secs,
        snapshot.audit,
        snapshot.audits_completed,
        snapshot.notifications.len(),
        snapshot.alert_count()
    ));
    for n in &snapshot.notifications {
        let icon = match n.kind {
            opsmanager_scheduler::NotificationKind::Alert => "🚨",
            opsmanager_scheduler::NotificationKind::Info => "💡",
        };
        out.push_str(&format!("   {icon} {}\n", n.text));
    }
    for e in &snapshot.events {
        let status = match e.status {
            EventStatus::Healthy => "✅",
            EventStatus::Warning => "⚠️",
        };
        out.push_str(&format!(
            "   {} {:<10} {:<24} {} {:>4}\n",
            e.timestamp,
            e.actor,
            e.action,
            status,
            e.latency_label()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> SentinelConfig {
        let mut config = SentinelConfig::default();
        config.runtime.seed = Some(5);
        config
    }

    #[test]
    fn test_simulate_fills_feed() {
        let snap = simulate(&seeded(), 36, &[]).unwrap();
        assert_eq!(snap.events.len(), 8);
        assert_eq!(snap.events[0].id.0, 9);
    }

    #[test]
    fn test_simulate_audit_timing() {
        let busy = simulate(&seeded(), 11, &[10, 10]).unwrap();
        assert_eq!(busy.audit, opsmanager_scheduler::AuditPhase::Busy);
        assert_eq!(busy.audits_completed, 0);

        let done = simulate(&seeded(), 12, &[10, 11]).unwrap();
        assert_eq!(done.audit, opsmanager_scheduler::AuditPhase::Idle);
        assert_eq!(done.audits_completed, 1);
    }

    #[test]
    fn test_render_lists_events() {
        let snap = simulate(&seeded(), 8, &[]).unwrap();
        let text = render(&snap);
        assert!(text.contains("t=8.0s"));
        assert_eq!(text.lines().count(), 1 + snap.notifications.len() + 2);
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["opsmanager", "--seed", "3", "simulate", "--until", "20", "--audit-at", "5"]).unwrap();
        assert_eq!(cli.seed, Some(3));
        match cli.command {
            Command::Simulate { until, audit_at, json } => {
                assert_eq!(until, 20);
                assert_eq!(audit_at, vec![5]);
                assert!(!json);
            }
            _ => panic!("expected simulate"),
        }
    }
}

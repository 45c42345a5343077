//! Billchain - shared-bill ledger reconciliation
//!
//! Runs one reconciliation pass over the configured bill roster against a
//! read-only SQLite block store and prints the derived figures, either as a
//! plain-text report or as JSON.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use billchain_backend::models::Config;
use billchain_backend::report::{BillReport, Reconciler, Report};
use billchain_backend::roster::Roster;
use billchain_backend::store::SqliteBlockStore;
use billchain_backend::{chain, integrity};

#[derive(Parser, Debug)]
#[command(name = "billchain", about = "Reconcile shared bills from a ledger-chain store")]
struct Cli {
    /// Path to the SQLite block database (falls back to DATABASE_PATH).
    #[arg(long)]
    db: Option<String>,

    /// Path to the bill roster TOML (falls back to ROSTER_PATH).
    #[arg(long)]
    roster: Option<String>,

    /// Reconcile only the bill with this label.
    #[arg(long)]
    bill: Option<String>,

    /// Emit the report as JSON instead of plain text.
    #[arg(long)]
    json: bool,

    /// Verify hash linkage of every configured chain before reconciling.
    #[arg(long)]
    verify_integrity: bool,
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let db_path = cli.db.unwrap_or(config.database_path);
    let roster_path = cli.roster.unwrap_or(config.roster_path);

    let store = SqliteBlockStore::open(&db_path)?;
    let roster = Roster::load(&roster_path)?;
    info!(
        "loaded roster with {} bills from {}",
        roster.bills.len(),
        roster_path
    );

    if cli.verify_integrity {
        verify_roster_chains(&store, &roster);
    }

    let reconciler = Reconciler::new(&store, &roster);
    let report = reconciler.run_filtered(cli.bill.as_deref(), Utc::now());

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else {
        print_report(&report);
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "billchain_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Check hash linkage of every position named in the roster. Breaks are
/// reported and the run continues; linkage is advisory for reconciliation.
fn verify_roster_chains(store: &SqliteBlockStore, roster: &Roster) {
    let positions = roster.bills.iter().flat_map(|bill| {
        std::iter::once(&bill.value_position).chain(bill.payment_positions.iter())
    });

    for position in positions {
        let chain = match chain::assemble(store, position) {
            Ok(chain) => chain,
            Err(err) => {
                warn!("integrity: cannot assemble {}: {}", position, err);
                continue;
            }
        };
        match integrity::verify_chain(&chain) {
            integrity::LinkCheck::Intact => {
                info!("integrity: {} intact ({} blocks)", position, chain.len());
            }
            integrity::LinkCheck::Broken {
                sequence_index,
                expected,
                recorded,
            } => {
                warn!(
                    "integrity: {} broken at block {} (recorded {}, expected {})",
                    position, sequence_index, recorded, expected
                );
            }
        }
    }
}

fn print_report(report: &Report) {
    for bill in &report.bills {
        print_bill(bill);
    }

    let overview = &report.overview;
    if overview.rows.is_empty() {
        return;
    }

    println!("=== Overview ===");
    for row in &overview.rows {
        println!(
            "  {:<24} {:<10} last {:>10.2}  monthly {:>10.2}  share {:>10.2}",
            row.label,
            row.frequency.as_str(),
            row.last_value,
            row.monthly_equivalent,
            row.per_responsible_share
        );
    }
    for group in &overview.groups {
        println!(
            "  [{}] {} bill(s), last total {:.2}, monthly total {:.2}",
            group.frequency.as_str(),
            group.bill_count,
            group.total_last_value,
            group.total_monthly_equivalent
        );
    }
    println!(
        "  Total monthly {:.2}, per-share {:.2}",
        overview.total_monthly_equivalent, overview.total_monthly_share
    );
}

fn print_bill(bill: &BillReport) {
    println!("=== {} ({}) ===", bill.label, bill.frequency.as_str());
    match (bill.last_value, bill.monthly_equivalent, bill.per_responsible_share) {
        (Some(last), Some(monthly), Some(share)) => {
            println!(
                "  last {:.2}, monthly {:.2}, share {:.2} across {} responsible",
                last,
                monthly,
                share,
                bill.responsible.len()
            );
        }
        _ => println!("  no cost recorded yet"),
    }

    for row in &bill.values {
        println!("  value {}  {:>10.2}  ({:+.2})", row.date, row.amount, row.delta);
    }

    for payee in &bill.payees {
        println!("  -- {} [{}]", payee.payee, payee.status.as_str());
        for payment in &payee.payments {
            let value = payment
                .value_at_payment
                .map(|v| format!("{:.2}", v))
                .unwrap_or_else(|| "-".to_string());
            let share = payment
                .share
                .map(|v| format!("{:.2}", v))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "     {} {:<12} {}  value {}{}  share {}",
                if payment.paid { "paid" } else { "    " },
                payment.payload,
                payment.paid_date,
                value,
                if payment.value_carried { "~" } else { "" },
                share
            );
        }
        let months: Vec<String> = payee
            .month_flags
            .iter()
            .map(|m| {
                format!(
                    "{}-{:02}:{}",
                    m.year,
                    m.month,
                    if m.paid { "y" } else { "n" }
                )
            })
            .collect();
        println!("     months: {}", months.join(" "));
    }
}

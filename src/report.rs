//! The reconciliation pass: assembles every configured bill, derives its
//! figures, and produces presentation-facing report structures.
//!
//! Errors are scoped per bill: a bill that cannot reconcile is logged and
//! dropped from the report, the rest of the run continues. Only a store
//! open failure aborts a run, and that happens before this module is
//! reached.

use crate::bill::BillAggregate;
use crate::error::LedgerError;
use crate::metrics::{self, MonthFlag};
use crate::models::{Frequency, PaymentStatus};
use crate::pairing::{self, PairedValue};
use crate::roster::Roster;
use crate::store::BlockStore;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// Months covered by the recent-payment window.
pub const MONTH_WINDOW: usize = 6;

/// One value revision as presented: date, cost, change from the previous.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueRow {
    pub date: String,
    pub amount: f64,
    pub delta: f64,
}

/// One payment as presented, with its attributed bill value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRow {
    pub paid: bool,
    pub payload: String,
    pub paid_date: String,
    /// Bill cost attributed to this payment, if a value could be paired.
    pub value_at_payment: Option<f64>,
    /// True when the attribution was carried from a neighbouring pairing
    /// rather than found strictly before the payment.
    pub value_carried: bool,
    /// This payee's share of the attributed cost.
    pub share: Option<f64>,
    /// Date the attributed value revision was recorded.
    pub issue_date: Option<String>,
}

/// One responsible party's section of a bill report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayeeReport {
    pub payee: String,
    pub status: PaymentStatus,
    pub payments: Vec<PaymentRow>,
    /// Calendar-month coverage, most recent month first.
    pub month_flags: Vec<MonthFlag>,
}

/// Fully reconciled figures for one bill.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillReport {
    pub label: String,
    pub frequency: Frequency,
    /// Most recent recorded cost; absent while only the origin exists.
    pub last_value: Option<f64>,
    pub monthly_equivalent: Option<f64>,
    pub per_responsible_share: Option<f64>,
    pub responsible: Vec<String>,
    pub values: Vec<ValueRow>,
    pub payees: Vec<PayeeReport>,
}

/// One bill's line in the cross-bill overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewRow {
    pub label: String,
    pub frequency: Frequency,
    pub last_value: f64,
    pub monthly_equivalent: f64,
    pub per_responsible_share: f64,
}

/// Per-frequency subtotal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyGroup {
    pub frequency: Frequency,
    pub bill_count: usize,
    pub total_last_value: f64,
    pub total_monthly_equivalent: f64,
}

/// Cross-bill totals, rows sorted by last value descending.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct Overview {
    pub rows: Vec<OverviewRow>,
    pub groups: Vec<FrequencyGroup>,
    pub total_monthly_equivalent: f64,
    pub total_monthly_share: f64,
}

/// One payee's coverage of one bill over the month window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayeeGridRow {
    pub payee: String,
    pub bill: String,
    pub months: Vec<MonthFlag>,
}

/// Output of a full reconciliation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub bills: Vec<BillReport>,
    pub overview: Overview,
    pub payment_grid: Vec<PayeeGridRow>,
}

/// Drives one reconciliation pass over the configured roster.
pub struct Reconciler<'a> {
    store: &'a dyn BlockStore,
    roster: &'a Roster,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a dyn BlockStore, roster: &'a Roster) -> Self {
        Self { store, roster }
    }

    /// Reconcile every configured bill.
    pub fn run(&self, now: DateTime<Utc>) -> Report {
        self.run_filtered(None, now)
    }

    /// Reconcile one labelled bill, or all when `label` is `None`.
    ///
    /// A bill that fails to reconcile is dropped with a warning; an unknown
    /// label simply yields an empty report.
    pub fn run_filtered(&self, label: Option<&str>, now: DateTime<Utc>) -> Report {
        let directory = self.roster.payee_directory();
        let mut bills = Vec::new();

        for spec in &self.roster.bills {
            if let Some(wanted) = label {
                if spec.label != wanted {
                    continue;
                }
            }
            match self.reconcile_bill(spec, &directory, now) {
                Ok(report) => bills.push(report),
                Err(err) => {
                    warn!("skipping bill {:?}: {:#}", spec.label, err);
                }
            }
        }

        info!("reconciled {} of {} bills", bills.len(), self.roster.bills.len());

        let overview = build_overview(&bills);
        let payment_grid = build_payment_grid(&bills);

        Report {
            bills,
            overview,
            payment_grid,
        }
    }

    fn reconcile_bill(
        &self,
        spec: &crate::roster::BillSpec,
        directory: &crate::roster::PayeeDirectory,
        now: DateTime<Utc>,
    ) -> Result<BillReport> {
        let bill = BillAggregate::build(self.store, spec, directory)?;

        let values = value_rows(&bill)?;
        let last_value = bill.last_value()?;

        let (monthly, share) = match last_value {
            Some(amount) => {
                let monthly = metrics::monthly_equivalent(amount, bill.frequency);
                let share = metrics::per_responsible_share(
                    monthly,
                    bill.responsible_count(),
                    &bill.label,
                )?;
                (Some(monthly), Some(share))
            }
            None => (None, None),
        };

        let mut payees = Vec::with_capacity(bill.payment_chains.len());
        for payment_chain in &bill.payment_chains {
            payees.push(payee_report(&bill, payment_chain, now)?);
        }

        Ok(BillReport {
            label: bill.label.clone(),
            frequency: bill.frequency,
            last_value,
            monthly_equivalent: monthly,
            per_responsible_share: share,
            responsible: bill
                .responsible_names()
                .into_iter()
                .map(String::from)
                .collect(),
            values,
            payees,
        })
    }
}

fn value_rows(bill: &BillAggregate) -> Result<Vec<ValueRow>, LedgerError> {
    let deltas = metrics::value_deltas(&bill.value_chain)?;
    let rows = bill
        .value_chain
        .value_blocks()
        .zip(deltas)
        .map(|(block, delta)| {
            Ok(ValueRow {
                date: block.date_string(),
                amount: block.amount()?,
                delta,
            })
        })
        .collect::<Result<Vec<_>, LedgerError>>()?;
    Ok(rows)
}

fn payee_report(
    bill: &BillAggregate,
    payment_chain: &crate::bill::PaymentChain,
    now: DateTime<Utc>,
) -> Result<PayeeReport, LedgerError> {
    let payments: Vec<_> = payment_chain
        .chain
        .blocks
        .iter()
        .filter(|b| !b.is_origin())
        .cloned()
        .collect();

    let pairings = pairing::pair_payments(&bill.value_chain, &payments);
    let responsible = bill.responsible_count().max(1) as f64;

    let mut rows = Vec::with_capacity(pairings.len());
    for pairing in &pairings {
        let (value_at_payment, issue_date) = match pairing.value.block() {
            Some(block) => (Some(block.amount()?), Some(block.date_string())),
            None => (None, None),
        };
        rows.push(PaymentRow {
            paid: pairing.payment.is_paid_marker(),
            payload: pairing.payment.payload.clone(),
            paid_date: pairing.payment.date_string(),
            value_at_payment,
            value_carried: matches!(pairing.value, PairedValue::Carried(_)),
            share: value_at_payment.map(|v| v / responsible),
            issue_date,
        });
    }

    Ok(PayeeReport {
        payee: payment_chain.payee.clone(),
        status: metrics::payment_status(&bill.value_chain, &payment_chain.chain),
        payments: rows,
        month_flags: metrics::recent_payment_flags(&payments, now, MONTH_WINDOW),
    })
}

fn build_overview(bills: &[BillReport]) -> Overview {
    let mut rows: Vec<OverviewRow> = bills
        .iter()
        .filter_map(|b| {
            Some(OverviewRow {
                label: b.label.clone(),
                frequency: b.frequency,
                last_value: b.last_value?,
                monthly_equivalent: b.monthly_equivalent?,
                per_responsible_share: b.per_responsible_share?,
            })
        })
        .collect();

    rows.sort_by(|a, b| {
        b.last_value
            .partial_cmp(&a.last_value)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut groups = Vec::new();
    for frequency in Frequency::all() {
        let members: Vec<&OverviewRow> =
            rows.iter().filter(|r| r.frequency == frequency).collect();
        if members.is_empty() {
            continue;
        }
        groups.push(FrequencyGroup {
            frequency,
            bill_count: members.len(),
            total_last_value: members.iter().map(|r| r.last_value).sum(),
            total_monthly_equivalent: members.iter().map(|r| r.monthly_equivalent).sum(),
        });
    }

    Overview {
        total_monthly_equivalent: rows.iter().map(|r| r.monthly_equivalent).sum(),
        total_monthly_share: rows.iter().map(|r| r.per_responsible_share).sum(),
        rows,
        groups,
    }
}

fn build_payment_grid(bills: &[BillReport]) -> Vec<PayeeGridRow> {
    let mut grid: Vec<PayeeGridRow> = bills
        .iter()
        .flat_map(|bill| {
            bill.payees.iter().map(|payee| PayeeGridRow {
                payee: payee.payee.clone(),
                bill: bill.label.clone(),
                months: payee.month_flags.clone(),
            })
        })
        .collect();
    grid.sort_by(|a, b| (&a.payee, &a.bill).cmp(&(&b.payee, &b.bill)));
    grid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Block, BlockKind};
    use crate::store::SqliteBlockStore;
    use chrono::TimeZone;

    fn block(position: &str, seq: i64, timestamp_ms: i64, payload: &str) -> Block {
        Block {
            sequence_index: seq,
            position_id: position.to_string(),
            owner_id: "owner".to_string(),
            kind: if seq == 0 {
                BlockKind::Genesis
            } else {
                BlockKind::Mint
            },
            payload: payload.to_string(),
            link_hash: "0".to_string(),
            mint_count: 1,
            nonce: 0,
            timestamp_ms,
            object_id: "object".to_string(),
        }
    }

    fn ts(year: i32, month: u32, day: u32) -> i64 {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0)
            .unwrap()
            .timestamp_millis()
    }

    fn roster() -> Roster {
        Roster::parse(
            r#"
[[bills]]
label = "Hydro"
frequency = "Biweekly"
value_position = "-a8,-c2"
payment_positions = ["-a8,-c4", "-a8,-c5"]

[[bills]]
label = "Internet"
value_position = "-a7,-c2"
payment_positions = ["-a7,-c4"]

[payees]
"North Household" = ["-a8,-c4", "-a7,-c4"]
"South Household" = ["-a8,-c5"]
"#,
        )
        .unwrap()
    }

    fn seeded_store() -> SqliteBlockStore {
        let store = SqliteBlockStore::open_in_memory().expect("Failed to create store");
        let blocks = [
            // Hydro value chain: 100.00 biweekly.
            block("-a8,-c2", 0, ts(2026, 1, 1), "Genesis"),
            block("-a8,-c2", 1, ts(2026, 1, 2), "100.00"),
            // Hydro payments: north paid after the revision, south never.
            block("-a8,-c4", 0, ts(2026, 1, 1), "Genesis"),
            block("-a8,-c4", 1, ts(2026, 2, 5), "ok"),
            block("-a8,-c5", 0, ts(2026, 1, 1), "Genesis"),
            // Internet value chain: 60.00 monthly, revised to 65.00.
            block("-a7,-c2", 0, ts(2026, 1, 1), "Genesis"),
            block("-a7,-c2", 1, ts(2026, 1, 2), "60.00"),
            block("-a7,-c2", 2, ts(2026, 3, 1), "65.00"),
            block("-a7,-c4", 0, ts(2026, 1, 1), "Genesis"),
            block("-a7,-c4", 1, ts(2026, 2, 10), "ok"),
        ];
        for b in &blocks {
            store.insert_block(b).unwrap();
        }
        store
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_full_pass_derives_bill_figures() {
        let store = seeded_store();
        let roster = roster();
        let report = Reconciler::new(&store, &roster).run(now());

        assert_eq!(report.bills.len(), 2);

        let hydro = &report.bills[0];
        assert_eq!(hydro.label, "Hydro");
        assert_eq!(hydro.last_value, Some(100.0));
        // Biweekly: twice a month.
        assert_eq!(hydro.monthly_equivalent, Some(200.0));
        assert_eq!(hydro.per_responsible_share, Some(100.0));
        assert_eq!(hydro.responsible.len(), 2);

        let north = &hydro.payees[0];
        assert_eq!(north.payee, "North Household");
        assert_eq!(north.status, PaymentStatus::Received);
        assert_eq!(north.payments.len(), 1);
        assert_eq!(north.payments[0].value_at_payment, Some(100.0));
        assert_eq!(north.payments[0].share, Some(50.0));
        assert!(!north.payments[0].value_carried);

        let south = &hydro.payees[1];
        assert_eq!(south.status, PaymentStatus::Due);
        assert!(south.payments.is_empty());
    }

    #[test]
    fn test_value_rows_carry_deltas() {
        let store = seeded_store();
        let roster = roster();
        let report = Reconciler::new(&store, &roster).run(now());

        let internet = &report.bills[1];
        assert_eq!(internet.values.len(), 2);
        assert_eq!(internet.values[0].amount, 60.0);
        assert_eq!(internet.values[0].delta, 0.0);
        assert_eq!(internet.values[1].amount, 65.0);
        assert_eq!(internet.values[1].delta, 5.0);
        // Revised after the only payment: owed again.
        assert_eq!(internet.payees[0].status, PaymentStatus::Due);
    }

    #[test]
    fn test_overview_sorted_and_totalled() {
        let store = seeded_store();
        let roster = roster();
        let report = Reconciler::new(&store, &roster).run(now());

        let overview = &report.overview;
        // Hydro's 100.00 outranks Internet's 65.00.
        assert_eq!(overview.rows[0].label, "Hydro");
        assert_eq!(overview.rows[1].label, "Internet");
        assert_eq!(overview.total_monthly_equivalent, 265.0);
        assert_eq!(overview.total_monthly_share, 165.0);

        assert_eq!(overview.groups.len(), 2);
        let monthly = overview
            .groups
            .iter()
            .find(|g| g.frequency == Frequency::Monthly)
            .unwrap();
        assert_eq!(monthly.bill_count, 1);
        assert_eq!(monthly.total_last_value, 65.0);
    }

    #[test]
    fn test_payment_grid_covers_every_payee_bill_pair() {
        let store = seeded_store();
        let roster = roster();
        let report = Reconciler::new(&store, &roster).run(now());

        let keys: Vec<(&str, &str)> = report
            .payment_grid
            .iter()
            .map(|r| (r.payee.as_str(), r.bill.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("North Household", "Hydro"),
                ("North Household", "Internet"),
                ("South Household", "Hydro"),
            ]
        );
        for row in &report.payment_grid {
            assert_eq!(row.months.len(), MONTH_WINDOW);
        }
        // North paid Hydro in February 2026; "now" is mid-March.
        let north_hydro = &report.payment_grid[0];
        assert!(!north_hydro.months[0].paid);
        assert!(north_hydro.months[1].paid);
    }

    #[test]
    fn test_bill_with_empty_value_chain_is_skipped_not_fatal() {
        let store = seeded_store();
        let mut roster = roster();
        roster.bills[0].value_position = "-a0,-c0".to_string();

        let report = Reconciler::new(&store, &roster).run(now());
        assert_eq!(report.bills.len(), 1);
        assert_eq!(report.bills[0].label, "Internet");
    }

    #[test]
    fn test_single_bill_filter() {
        let store = seeded_store();
        let roster = roster();
        let report = Reconciler::new(&store, &roster).run_filtered(Some("Internet"), now());

        assert_eq!(report.bills.len(), 1);
        assert_eq!(report.bills[0].label, "Internet");
        assert_eq!(report.overview.rows.len(), 1);

        let empty = Reconciler::new(&store, &roster).run_filtered(Some("Nope"), now());
        assert!(empty.bills.is_empty());
    }

    #[test]
    fn test_origin_only_bill_reports_without_figures() {
        let store = SqliteBlockStore::open_in_memory().unwrap();
        for b in [
            block("-a8,-c2", 0, ts(2026, 1, 1), "Genesis"),
            block("-a8,-c4", 0, ts(2026, 1, 1), "Genesis"),
            block("-a8,-c5", 0, ts(2026, 1, 1), "Genesis"),
            block("-a7,-c2", 0, ts(2026, 1, 1), "Genesis"),
            block("-a7,-c4", 0, ts(2026, 1, 1), "Genesis"),
        ] {
            store.insert_block(&b).unwrap();
        }

        let roster = roster();
        let report = Reconciler::new(&store, &roster).run(now());

        let hydro = &report.bills[0];
        assert_eq!(hydro.last_value, None);
        assert_eq!(hydro.monthly_equivalent, None);
        assert!(hydro.values.is_empty());
        // No completed payment exists, so the payee is still Due.
        assert_eq!(hydro.payees[0].status, PaymentStatus::Due);
        // No figures, so no overview rows either.
        assert!(report.overview.rows.is_empty());
    }

    #[test]
    fn test_share_splits_across_configured_positions_even_when_unseeded() {
        let store = SqliteBlockStore::open_in_memory().unwrap();
        for b in [
            block("-a6,-c2", 0, ts(2026, 1, 1), "Genesis"),
            block("-a6,-c2", 1, ts(2026, 1, 2), "100.00"),
            // Only one of the two configured payment positions has blocks.
            block("-a6,-c4", 0, ts(2026, 1, 1), "Genesis"),
            block("-a6,-c4", 1, ts(2026, 2, 5), "ok"),
        ] {
            store.insert_block(&b).unwrap();
        }

        let roster = Roster::parse(
            r#"
[[bills]]
label = "Insurance"
value_position = "-a6,-c2"
payment_positions = ["-a6,-c4", "-a6,-c5"]

[payees]
"North Household" = ["-a6,-c4"]
"South Household" = ["-a6,-c5"]
"#,
        )
        .unwrap();

        let report = Reconciler::new(&store, &roster).run(now());
        let insurance = &report.bills[0];

        // Both configured payees stay in the split; only the section for the
        // unseeded position is missing.
        assert_eq!(
            insurance.responsible,
            vec!["North Household", "South Household"]
        );
        assert_eq!(insurance.per_responsible_share, Some(50.0));
        assert_eq!(insurance.payees.len(), 1);
        assert_eq!(insurance.payees[0].payments[0].share, Some(50.0));
    }
}

//! Derived financial metrics over assembled chains.
//!
//! All functions are pure over already-assembled chains; nothing here
//! touches storage. Metric errors stay typed ([`LedgerError`]) so the
//! reconciliation pass can scope them to one bill.

use crate::chain::Chain;
use crate::error::LedgerError;
use crate::models::{Block, Frequency, PaymentStatus};
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;

/// Change in cost between consecutive value revisions.
///
/// The first revision has no predecessor and reports a delta of zero, so
/// the result is always the same length as the revision list.
pub fn value_deltas(value_chain: &Chain) -> Result<Vec<f64>, LedgerError> {
    let mut deltas = Vec::new();
    let mut previous: Option<f64> = None;

    for block in value_chain.value_blocks() {
        let amount = block.amount()?;
        deltas.push(match previous {
            Some(prev) => amount - prev,
            None => 0.0,
        });
        previous = Some(amount);
    }

    Ok(deltas)
}

/// Normalize a per-period cost to a per-month cost.
pub fn monthly_equivalent(per_period: f64, frequency: Frequency) -> f64 {
    per_period / frequency.months_per_period()
}

/// Split a monthly cost evenly across the responsible parties.
pub fn per_responsible_share(
    monthly: f64,
    responsible_count: usize,
    label: &str,
) -> Result<f64, LedgerError> {
    if responsible_count == 0 {
        return Err(LedgerError::DivisionByZero {
            label: label.to_string(),
        });
    }
    Ok(monthly / responsible_count as f64)
}

/// Whether a payee's chain has settled the current cost.
///
/// A payee with no completed payment at all is always `Due`. Otherwise the
/// bill is `Received` when the latest completed payment postdates the latest
/// value revision. A revision at the exact payment instant supersedes the
/// payment, so equal timestamps read as `Due`. A completed payment against a
/// bill with no revisions yet counts as `Received`.
pub fn payment_status(value_chain: &Chain, payment_chain: &Chain) -> PaymentStatus {
    let Some(paid) = payment_chain.last_paid_block() else {
        return PaymentStatus::Due;
    };
    match value_chain.last_value_block() {
        Some(last_value) if paid.timestamp_ms <= last_value.timestamp_ms => PaymentStatus::Due,
        _ => PaymentStatus::Received,
    }
}

/// Payment coverage for one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthFlag {
    pub year: i32,
    /// 1-based calendar month.
    pub month: u32,
    pub paid: bool,
}

/// Per-calendar-month payment coverage for the `months` most recent months,
/// most recent first, anchored at `now`.
///
/// Months are resolved year-aware: the window ending in February 2026 walks
/// back through January 2026 into December 2025 rather than wrapping within
/// one year.
pub fn recent_payment_flags(
    payments: &[Block],
    now: DateTime<Utc>,
    months: usize,
) -> Vec<MonthFlag> {
    let paid_months: Vec<(i32, u32)> = payments
        .iter()
        .filter(|b| b.is_paid_marker())
        .filter_map(|b| b.datetime())
        .map(|dt| (dt.year(), dt.month()))
        .collect();

    let mut flags = Vec::with_capacity(months);
    let mut year = now.year();
    let mut month = now.month() as i32;

    for _ in 0..months {
        if month < 1 {
            month += 12;
            year -= 1;
        }
        let m = month as u32;
        flags.push(MonthFlag {
            year,
            month: m,
            paid: paid_months.contains(&(year, m)),
        });
        month -= 1;
    }

    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BlockKind;
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

    fn chain(position: &str, blocks: Vec<Block>) -> Chain {
        Chain {
            position_id: position.to_string(),
            blocks,
        }
    }

    #[test]
    fn test_value_deltas_first_is_zero() {
        let values = chain(
            "-a1,-c2",
            vec![
                block("-a1,-c2", 0, 0, "Genesis"),
                block("-a1,-c2", 1, 1000, "100.00"),
                block("-a1,-c2", 2, 2000, "150.00"),
                block("-a1,-c2", 3, 3000, "120.00"),
            ],
        );

        let deltas = value_deltas(&values).unwrap();
        assert_eq!(deltas, vec![0.0, 50.0, -30.0]);
    }

    #[test]
    fn test_value_deltas_empty_for_origin_only_chain() {
        let values = chain("-a1,-c2", vec![block("-a1,-c2", 0, 0, "Genesis")]);
        assert!(value_deltas(&values).unwrap().is_empty());
    }

    #[test]
    fn test_value_deltas_surface_bad_payloads() {
        let values = chain(
            "-a1,-c2",
            vec![
                block("-a1,-c2", 0, 0, "Genesis"),
                block("-a1,-c2", 1, 1000, "not a number"),
            ],
        );
        assert!(matches!(
            value_deltas(&values),
            Err(LedgerError::NonNumericPayload { .. })
        ));
    }

    #[test]
    fn test_monthly_equivalent_and_share() {
        // A 100.00 biweekly bill costs 200.00 a month; two responsible
        // parties owe 100.00 each.
        let monthly = monthly_equivalent(100.0, Frequency::Biweekly);
        assert_eq!(monthly, 200.0);
        assert_eq!(per_responsible_share(monthly, 2, "Hydro").unwrap(), 100.0);

        assert_eq!(monthly_equivalent(80.0, Frequency::Bimonthly), 40.0);
        assert_eq!(monthly_equivalent(25.0, Frequency::Weekly), 100.0);
    }

    #[test]
    fn test_monthly_equivalent_is_linear_in_the_value() {
        for frequency in Frequency::all() {
            for value in [12.5, 60.0, 104.57] {
                assert_eq!(
                    monthly_equivalent(value * 2.0, frequency),
                    monthly_equivalent(value, frequency) * 2.0
                );
            }
        }
    }

    #[test]
    fn test_share_with_no_responsible_parties_fails() {
        assert!(matches!(
            per_responsible_share(100.0, 0, "Hydro"),
            Err(LedgerError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_payment_status_tracks_latest_revision() {
        let values = chain(
            "-a1,-c2",
            vec![
                block("-a1,-c2", 0, 0, "Genesis"),
                block("-a1,-c2", 1, 100, "50.00"),
            ],
        );

        // Paid after the revision: settled.
        let paid_after = chain(
            "-a1,-c4",
            vec![
                block("-a1,-c4", 0, 0, "Genesis"),
                block("-a1,-c4", 1, 200, "ok"),
            ],
        );
        assert_eq!(payment_status(&values, &paid_after), PaymentStatus::Received);

        // Paid before the revision: the new amount is still owed.
        let paid_before = chain(
            "-a1,-c4",
            vec![
                block("-a1,-c4", 0, 0, "Genesis"),
                block("-a1,-c4", 1, 50, "ok"),
            ],
        );
        assert_eq!(payment_status(&values, &paid_before), PaymentStatus::Due);

        // Paid at the exact revision instant: the revision supersedes.
        let paid_at = chain(
            "-a1,-c4",
            vec![
                block("-a1,-c4", 0, 0, "Genesis"),
                block("-a1,-c4", 1, 100, "ok"),
            ],
        );
        assert_eq!(payment_status(&values, &paid_at), PaymentStatus::Due);

        // Never paid.
        let never = chain("-a1,-c4", vec![block("-a1,-c4", 0, 0, "Genesis")]);
        assert_eq!(payment_status(&values, &never), PaymentStatus::Due);
    }

    #[test]
    fn test_payment_status_without_any_ok_block_is_due() {
        // No completed payment means Due, even before any revision exists.
        let values = chain("-a1,-c2", vec![block("-a1,-c2", 0, 0, "Genesis")]);
        let payments = chain(
            "-a1,-c4",
            vec![
                block("-a1,-c4", 0, 0, "Genesis"),
                block("-a1,-c4", 1, 100, "missed"),
            ],
        );
        assert_eq!(payment_status(&values, &payments), PaymentStatus::Due);
    }

    #[test]
    fn test_payment_status_ok_with_no_revisions_is_received() {
        let values = chain("-a1,-c2", vec![block("-a1,-c2", 0, 0, "Genesis")]);
        let payments = chain(
            "-a1,-c4",
            vec![
                block("-a1,-c4", 0, 0, "Genesis"),
                block("-a1,-c4", 1, 100, "ok"),
            ],
        );
        assert_eq!(payment_status(&values, &payments), PaymentStatus::Received);
    }

    fn ts(year: i32, month: u32, day: u32) -> i64 {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0)
            .unwrap()
            .timestamp_millis()
    }

    #[test]
    fn test_recent_payment_flags_cross_year_boundary() {
        let payments = vec![
            block("-a1,-c4", 1, ts(2025, 12, 5), "ok"),
            block("-a1,-c4", 2, ts(2026, 2, 3), "ok"),
            block("-a1,-c4", 3, ts(2026, 1, 15), "missed"),
        ];

        let now = Utc.with_ymd_and_hms(2026, 2, 10, 0, 0, 0).unwrap();
        let flags = recent_payment_flags(&payments, now, 4);

        assert_eq!(
            flags,
            vec![
                MonthFlag { year: 2026, month: 2, paid: true },
                MonthFlag { year: 2026, month: 1, paid: false },
                MonthFlag { year: 2025, month: 12, paid: true },
                MonthFlag { year: 2025, month: 11, paid: false },
            ]
        );
    }

    #[test]
    fn test_recent_payment_flags_ignore_non_paid_markers() {
        let payments = vec![block("-a1,-c4", 1, ts(2026, 8, 1), "pending")];
        let now = Utc.with_ymd_and_hms(2026, 8, 28, 0, 0, 0).unwrap();
        let flags = recent_payment_flags(&payments, now, 1);
        assert_eq!(flags[0].paid, false);
    }
}

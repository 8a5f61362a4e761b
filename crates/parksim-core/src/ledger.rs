//! Ticket issuance and revenue bookkeeping.
//!
//! Ticket numbers start at 1 and grow by exactly one per issuance. Revenue is
//! accrued at entry at a flat rate and never refunded, so both the total and
//! every per-zone amount are monotonically non-decreasing.

use serde::{Deserialize, Serialize};

use crate::fixed::{Fixed64, Millis};
use crate::id::{GateId, SpotId, TicketNumber, ZoneId};
use crate::validation::InvariantViolation;

// ---------------------------------------------------------------------------
// Ticket
// ---------------------------------------------------------------------------

/// An issued ticket. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ticket {
    pub number: TicketNumber,
    pub entry_time: Millis,
    pub entry_gate: GateId,
    pub spot: SpotId,
}

impl Ticket {
    /// Build the receipt a collaborator renders (or encodes as a QR code).
    pub fn receipt(&self, gate_label: &str, zone_name: &str) -> TicketReceipt {
        TicketReceipt {
            ticket: self.number.0,
            entry: self.entry_time,
            gate: gate_label.to_string(),
            spot: self.spot.0,
            zone: zone_name.to_string(),
        }
    }
}

/// Human-facing ticket payload with names resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketReceipt {
    pub ticket: u64,
    pub entry: Millis,
    pub gate: String,
    pub spot: u32,
    pub zone: String,
}

impl TicketReceipt {
    /// Compact JSON payload.
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Revenue
// ---------------------------------------------------------------------------

/// Revenue totals. `total` always equals the sum of `per_zone`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueLedger {
    pub total: Fixed64,
    /// Indexed by `ZoneId`.
    pub per_zone: Vec<Fixed64>,
}

impl RevenueLedger {
    pub fn new(zone_count: usize) -> Self {
        Self {
            total: Fixed64::ZERO,
            per_zone: vec![Fixed64::ZERO; zone_count],
        }
    }

    pub fn zone(&self, zone: ZoneId) -> Option<Fixed64> {
        self.per_zone.get(zone.index()).copied()
    }

    /// Sum of the per-zone amounts, `None` on overflow.
    pub fn zone_sum(&self) -> Option<Fixed64> {
        self.per_zone
            .iter()
            .try_fold(Fixed64::ZERO, |acc, &v| acc.checked_add(v))
    }
}

// ---------------------------------------------------------------------------
// TicketLedger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketLedger {
    next_number: u64,
    rate: Fixed64,
    revenue: RevenueLedger,
}

impl TicketLedger {
    pub fn new(rate: Fixed64, zone_count: usize) -> Self {
        Self {
            next_number: 1,
            rate,
            revenue: RevenueLedger::new(zone_count),
        }
    }

    /// Issue the next ticket.
    pub fn issue(&mut self, entry_gate: GateId, spot: SpotId, now: Millis) -> Ticket {
        let number = TicketNumber(self.next_number);
        self.next_number += 1;
        Ticket {
            number,
            entry_time: now,
            entry_gate,
            spot,
        }
    }

    /// Accrue one vehicle's fee to `zone` and to the total.
    pub fn record(&mut self, zone: ZoneId) -> Result<(), InvariantViolation> {
        let zone_amount = self
            .revenue
            .per_zone
            .get_mut(zone.index())
            .ok_or(InvariantViolation::UnknownRevenueZone(zone))?;
        let new_zone = zone_amount
            .checked_add(self.rate)
            .ok_or(InvariantViolation::RevenueOverflow)?;
        let new_total = self
            .revenue
            .total
            .checked_add(self.rate)
            .ok_or(InvariantViolation::RevenueOverflow)?;
        *zone_amount = new_zone;
        self.revenue.total = new_total;
        Ok(())
    }

    /// Snapshot of the revenue totals.
    pub fn totals(&self) -> RevenueLedger {
        self.revenue.clone()
    }

    pub fn revenue(&self) -> &RevenueLedger {
        &self.revenue
    }

    pub fn rate(&self) -> Fixed64 {
        self.rate
    }

    /// Number of tickets issued so far.
    pub fn issued_count(&self) -> u64 {
        self.next_number - 1
    }

    /// The number the next ticket will carry.
    pub fn next_number(&self) -> TicketNumber {
        TicketNumber(self.next_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::f64_to_fixed64;

    #[test]
    fn numbers_start_at_one_and_increment() {
        let mut ledger = TicketLedger::new(f64_to_fixed64(1.4), 5);
        let numbers: Vec<u64> = (0..5)
            .map(|i| ledger.issue(GateId(0), SpotId(i + 1), 100).number.0)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        assert_eq!(ledger.issued_count(), 5);
        assert_eq!(ledger.next_number(), TicketNumber(6));
    }

    #[test]
    fn record_accrues_zone_and_total() {
        let mut ledger = TicketLedger::new(f64_to_fixed64(1.4), 5);
        ledger.record(ZoneId(1)).unwrap();
        ledger.record(ZoneId(1)).unwrap();
        ledger.record(ZoneId(4)).unwrap();

        let totals = ledger.totals();
        let rate = ledger.rate();
        assert_eq!(totals.zone(ZoneId(1)), Some(rate + rate));
        assert_eq!(totals.zone(ZoneId(4)), Some(rate));
        assert_eq!(totals.zone(ZoneId(0)), Some(Fixed64::ZERO));
        assert_eq!(totals.total, rate + rate + rate);
        assert_eq!(totals.zone_sum(), Some(totals.total));
    }

    #[test]
    fn record_unknown_zone_fails() {
        let mut ledger = TicketLedger::new(f64_to_fixed64(1.4), 2);
        assert_eq!(
            ledger.record(ZoneId(2)),
            Err(InvariantViolation::UnknownRevenueZone(ZoneId(2)))
        );
        assert_eq!(ledger.totals().total, Fixed64::ZERO);
    }

    #[test]
    fn record_overflow_is_reported() {
        let mut ledger = TicketLedger::new(Fixed64::MAX, 1);
        ledger.record(ZoneId(0)).unwrap();
        assert_eq!(ledger.record(ZoneId(0)), Err(InvariantViolation::RevenueOverflow));
        assert_eq!(ledger.totals().total, Fixed64::MAX);
    }

    #[test]
    fn receipt_payload_names_gate_and_zone() {
        let mut ledger = TicketLedger::new(f64_to_fixed64(1.4), 5);
        let ticket = ledger.issue(GateId(1), SpotId(17), 4000);
        let payload = ticket.receipt("E2", "B").to_payload().unwrap();
        assert_eq!(
            payload,
            r#"{"ticket":1,"entry":4000,"gate":"E2","spot":17,"zone":"B"}"#
        );
    }
}

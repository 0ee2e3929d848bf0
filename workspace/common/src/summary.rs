//! Aggregated figures reported by the dashboard and the attendance endpoints.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Money totals over a set of penalties or contributions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct MoneyTotals {
    pub record_count: u64,
    pub total_amount: Decimal,
    pub total_discount: Decimal,
    pub total_paid: Decimal,
    pub total_waived: Decimal,
    /// Sum of the open balances
    pub outstanding: Decimal,
    pub overdue_count: u64,
}

impl MoneyTotals {
    /// Adds one record's figures.
    pub fn add(
        &mut self,
        amount: Decimal,
        discount: Decimal,
        paid: Decimal,
        waived: Decimal,
        balance: Decimal,
        is_overdue: bool,
    ) {
        self.record_count += 1;
        self.total_amount += amount;
        self.total_discount += discount;
        self.total_paid += paid;
        self.total_waived += waived;
        self.outstanding += balance;
        if is_overdue {
            self.overdue_count += 1;
        }
    }
}

/// Per-parent view of what is owed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ParentBalanceSummary {
    pub parent_id: i32,
    pub penalties: MoneyTotals,
    pub contributions: MoneyTotals,
    pub total_outstanding: Decimal,
    pub approved_students: u64,
    pub meetings_attended: u64,
    pub meetings_missed: u64,
}

/// Association-wide figures for administrators.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct DashboardSummary {
    pub total_parents: u64,
    pub active_parents: u64,
    pub total_students: u64,
    pub pending_links: u64,
    pub upcoming_meetings: u64,
    pub active_projects: u64,
    pub penalties: MoneyTotals,
    pub contributions: MoneyTotals,
    pub project_budget_total: Decimal,
    pub project_expenses_total: Decimal,
}

/// Attendance counts for one meeting.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct AttendanceSummary {
    pub meeting_id: i32,
    pub total: u64,
    pub present: u64,
    pub absent: u64,
    pub excused: u64,
    pub late: u64,
    pub via_qr: u64,
}

/// Outcome of finalizing a meeting.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct PenaltyRunSummary {
    pub meeting_id: i32,
    /// Parents without a check-in that were recorded absent
    pub absent_marked: u64,
    pub penalties_created: u64,
    pub total_penalty_amount: Decimal,
}

/// Outcome of the overdue scan.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct OverdueScanSummary {
    pub as_of: NaiveDate,
    pub penalties_marked: u64,
    pub contributions_marked: u64,
}

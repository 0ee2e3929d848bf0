//! Transport-layer types shared between the service layer and the HTTP handlers.

mod summary;

pub use summary::{
    AttendanceSummary, DashboardSummary, MoneyTotals, OverdueScanSummary, ParentBalanceSummary,
    PenaltyRunSummary,
};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Generic API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success flag
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
            success: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_money_totals_accumulate() {
        let mut totals = MoneyTotals::default();
        totals.add(
            Decimal::new(500, 0),
            Decimal::ZERO,
            Decimal::new(200, 0),
            Decimal::ZERO,
            Decimal::new(300, 0),
            true,
        );
        totals.add(
            Decimal::new(100, 0),
            Decimal::new(10, 0),
            Decimal::ZERO,
            Decimal::new(90, 0),
            Decimal::ZERO,
            false,
        );

        assert_eq!(totals.record_count, 2);
        assert_eq!(totals.total_amount, Decimal::new(600, 0));
        assert_eq!(totals.total_paid, Decimal::new(200, 0));
        assert_eq!(totals.total_waived, Decimal::new(90, 0));
        assert_eq!(totals.outstanding, Decimal::new(300, 0));
        assert_eq!(totals.overdue_count, 1);
    }

    #[test]
    fn test_api_response_serializes_decimals_as_strings() {
        let response = ApiResponse::ok(
            PenaltyRunSummary {
                meeting_id: 7,
                absent_marked: 2,
                penalties_created: 3,
                total_penalty_amount: Decimal::new(12000, 2),
            },
            "Penalties applied",
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["total_penalty_amount"], "120.00");
        assert_eq!(json["data"]["penalties_created"], 3);
    }
}

//! Balance and payment-status state machine shared by penalties and contributions.
//!
//! The machine works on plain values so the rules can be checked without a
//! database; the `penalty` and `contribution` modules load a record, run a
//! transition here and persist the result inside a transaction.
//!
//! ```text
//! UNPAID ──pay──▶ PARTIAL ──pay──▶ PAID
//!   │  ╲            │  ╲
//!   │   overdue     │   (stays PARTIAL, flagged overdue)
//!   │      ▼        │
//!   │   OVERDUE ──pay──▶ PARTIAL / PAID
//!   └──────┴────────┴──waive──▶ WAIVED
//! ```

use chrono::NaiveDate;
use model::entities::payment::{PaymentMethod, PaymentStatus};
use rust_decimal::Decimal;

use crate::error::{ComputeError, Result};

/// Money fields of a penalty or contribution.
///
/// While not waived, `balance == amount - discount_amount - amount_paid`.
/// A waiver moves the remaining balance into `waived_amount`.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceState {
    pub amount: Decimal,
    pub discount_amount: Decimal,
    pub amount_paid: Decimal,
    pub waived_amount: Decimal,
    pub balance: Decimal,
    pub status: PaymentStatus,
    pub is_overdue: bool,
    pub days_overdue: i32,
}

/// A payment to be appended to a record's history.
#[derive(Debug, Clone)]
pub struct PaymentInput {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub recorded_by: Option<i32>,
}

fn validate_amounts(amount: Decimal, discount_amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(ComputeError::InvalidInput(
            "Amount must be greater than zero".to_string(),
        ));
    }
    if discount_amount < Decimal::ZERO {
        return Err(ComputeError::InvalidInput(
            "Discount cannot be negative".to_string(),
        ));
    }
    if discount_amount > amount {
        return Err(ComputeError::InvalidInput(format!(
            "Discount {} cannot exceed the amount {}",
            discount_amount, amount
        )));
    }
    Ok(())
}

fn status_for(balance: Decimal, amount_paid: Decimal) -> PaymentStatus {
    if balance.is_zero() {
        PaymentStatus::Paid
    } else if amount_paid > Decimal::ZERO {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Unpaid
    }
}

impl BalanceState {
    /// State of a freshly created record.
    pub fn new(amount: Decimal, discount_amount: Decimal) -> Result<Self> {
        validate_amounts(amount, discount_amount)?;
        let balance = amount - discount_amount;
        Ok(Self {
            amount,
            discount_amount,
            amount_paid: Decimal::ZERO,
            waived_amount: Decimal::ZERO,
            balance,
            status: status_for(balance, Decimal::ZERO),
            is_overdue: false,
            days_overdue: 0,
        })
    }

    pub fn is_paid(&self) -> bool {
        self.status == PaymentStatus::Paid
    }

    pub fn is_waived(&self) -> bool {
        self.status == PaymentStatus::Waived
    }

    fn ensure_open(&self) -> Result<()> {
        match self.status {
            PaymentStatus::Paid => Err(ComputeError::Rule(
                "Record is already fully paid".to_string(),
            )),
            PaymentStatus::Waived => Err(ComputeError::Rule(
                "Record has been waived".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Applies a payment. The amount must be positive and not exceed the balance.
    pub fn record_payment(&self, amount: Decimal) -> Result<Self> {
        self.ensure_open()?;
        if amount <= Decimal::ZERO {
            return Err(ComputeError::InvalidInput(
                "Payment amount must be greater than zero".to_string(),
            ));
        }
        if amount > self.balance {
            return Err(ComputeError::Rule(format!(
                "Payment amount {} exceeds the remaining balance {}",
                amount, self.balance
            )));
        }

        let amount_paid = self.amount_paid + amount;
        let balance = self.balance - amount;
        Ok(Self {
            amount_paid,
            balance,
            status: if balance.is_zero() {
                PaymentStatus::Paid
            } else {
                PaymentStatus::Partial
            },
            is_overdue: false,
            days_overdue: 0,
            ..self.clone()
        })
    }

    /// Cancels the remaining balance. Terminal.
    pub fn waive(&self) -> Result<Self> {
        match self.status {
            PaymentStatus::Paid => Err(ComputeError::Rule(
                "Cannot waive a record that is already paid".to_string(),
            )),
            PaymentStatus::Waived => Err(ComputeError::Rule(
                "Record is already waived".to_string(),
            )),
            _ => Ok(Self {
                waived_amount: self.balance,
                balance: Decimal::ZERO,
                status: PaymentStatus::Waived,
                is_overdue: false,
                days_overdue: 0,
                ..self.clone()
            }),
        }
    }

    /// Flags the record overdue when `due_date` has passed and money is still owed.
    ///
    /// Returns `None` when the record is not (or no longer) eligible. Only an
    /// UNPAID record changes status; a PARTIAL one keeps its status and gets the flag.
    pub fn mark_overdue(&self, due_date: Option<NaiveDate>, today: NaiveDate) -> Option<Self> {
        let due_date = due_date?;
        if due_date >= today || self.balance <= Decimal::ZERO {
            return None;
        }
        let status = match self.status {
            PaymentStatus::Unpaid | PaymentStatus::Overdue => PaymentStatus::Overdue,
            PaymentStatus::Partial => PaymentStatus::Partial,
            PaymentStatus::Paid | PaymentStatus::Waived => return None,
        };
        let days_overdue = (today - due_date).num_days() as i32;
        Some(Self {
            status,
            is_overdue: true,
            days_overdue,
            ..self.clone()
        })
    }

    /// Replaces amount and/or discount. Only allowed before any payment is recorded.
    pub fn adjust(
        &self,
        amount: Decimal,
        discount_amount: Decimal,
        has_payment_history: bool,
    ) -> Result<Self> {
        self.ensure_open()?;
        if has_payment_history || self.amount_paid > Decimal::ZERO {
            return Err(ComputeError::Rule(
                "Amount and discount are locked once a payment has been recorded".to_string(),
            ));
        }
        validate_amounts(amount, discount_amount)?;
        let balance = amount - discount_amount;
        let status = match self.status {
            PaymentStatus::Overdue if !balance.is_zero() => PaymentStatus::Overdue,
            _ => status_for(balance, Decimal::ZERO),
        };
        Ok(Self {
            amount,
            discount_amount,
            balance,
            status,
            ..self.clone()
        })
    }

    /// Guards edits of the non-monetary fields (reason, due date, ...).
    pub fn ensure_editable(&self) -> Result<()> {
        match self.status {
            PaymentStatus::Paid | PaymentStatus::Waived => Err(ComputeError::Rule(
                "Paid or waived records can no longer be edited".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Guards deletion: records with payment history must be waived instead.
    pub fn ensure_deletable(&self, has_payment_history: bool) -> Result<()> {
        if has_payment_history || self.amount_paid > Decimal::ZERO {
            return Err(ComputeError::Rule(
                "Cannot delete a record with payment history; waive it instead".to_string(),
            ));
        }
        if self.is_waived() {
            return Err(ComputeError::Rule(
                "Waived records cannot be deleted".to_string(),
            ));
        }
        Ok(())
    }
}

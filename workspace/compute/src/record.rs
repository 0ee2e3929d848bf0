//! Persistence of balance transitions, shared by penalties and contributions.
//!
//! Both tables carry the same money columns, so the write path of a payment,
//! a waiver, a re-pricing or the overdue scan is written once against
//! [`BalanceRecord`].

use chrono::{NaiveDate, NaiveDateTime};
use model::entities::{contribution, penalty};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ConnectionTrait, EntityTrait, IntoActiveModel, Set,
};

use crate::balance::BalanceState;
use crate::error::Result;

/// A stored penalty or contribution.
pub trait BalanceRecord: Sized + Send + Sync + 'static {
    type Entity: EntityTrait<Model = Self>;
    type Active: ActiveModelTrait<Entity = Self::Entity> + ActiveModelBehavior + Send + 'static;

    fn state(&self) -> BalanceState;
    fn due_date(&self) -> Option<NaiveDate>;

    /// Copies every money column of `state` onto the row.
    fn apply_state(active: &mut Self::Active, state: &BalanceState);
    fn set_paid_at(active: &mut Self::Active, at: NaiveDateTime);
    fn set_waiver(active: &mut Self::Active, reason: Option<String>, at: NaiveDateTime);
    fn set_updated_at(active: &mut Self::Active, at: NaiveDateTime);
}

macro_rules! balance_record {
    ($entity:ident) => {
        impl From<&$entity::Model> for BalanceState {
            fn from(model: &$entity::Model) -> Self {
                Self {
                    amount: model.amount,
                    discount_amount: model.discount_amount,
                    amount_paid: model.amount_paid,
                    waived_amount: model.waived_amount,
                    balance: model.balance,
                    status: model.payment_status,
                    is_overdue: model.is_overdue,
                    days_overdue: model.days_overdue,
                }
            }
        }

        impl BalanceRecord for $entity::Model {
            type Entity = $entity::Entity;
            type Active = $entity::ActiveModel;

            fn state(&self) -> BalanceState {
                BalanceState::from(self)
            }

            fn due_date(&self) -> Option<NaiveDate> {
                self.due_date
            }

            fn apply_state(active: &mut Self::Active, state: &BalanceState) {
                active.amount = Set(state.amount);
                active.discount_amount = Set(state.discount_amount);
                active.amount_paid = Set(state.amount_paid);
                active.waived_amount = Set(state.waived_amount);
                active.balance = Set(state.balance);
                active.payment_status = Set(state.status);
                active.is_paid = Set(state.is_paid());
                active.is_waived = Set(state.is_waived());
                active.is_overdue = Set(state.is_overdue);
                active.days_overdue = Set(state.days_overdue);
            }

            fn set_paid_at(active: &mut Self::Active, at: NaiveDateTime) {
                active.paid_at = Set(Some(at));
            }

            fn set_waiver(active: &mut Self::Active, reason: Option<String>, at: NaiveDateTime) {
                active.waived_reason = Set(reason);
                active.waived_at = Set(Some(at));
            }

            fn set_updated_at(active: &mut Self::Active, at: NaiveDateTime) {
                active.updated_at = Set(at);
            }
        }
    };
}

balance_record!(penalty);
balance_record!(contribution);

/// Stamps `paid_at` when the transition settles the record.
pub(crate) fn apply_transition<R: BalanceRecord>(
    active: &mut R::Active,
    next: &BalanceState,
    now: NaiveDateTime,
) {
    R::apply_state(active, next);
    if next.is_paid() {
        R::set_paid_at(active, now);
    }
}

/// Re-prices a record that has no payments yet. `None` keeps the current value.
pub(crate) fn reprice<R: BalanceRecord>(
    active: &mut R::Active,
    current: &BalanceState,
    amount: Option<Decimal>,
    discount_amount: Option<Decimal>,
    has_payments: bool,
    now: NaiveDateTime,
) -> Result<()> {
    let adjusted = current.adjust(
        amount.unwrap_or(current.amount),
        discount_amount.unwrap_or(current.discount_amount),
        has_payments,
    )?;
    apply_transition::<R>(active, &adjusted, now);
    Ok(())
}

/// Writes the state after a payment.
pub(crate) async fn save_payment<R, C>(
    db: &C,
    record: R,
    next: &BalanceState,
    now: NaiveDateTime,
) -> Result<R>
where
    R: BalanceRecord + IntoActiveModel<R::Active>,
    C: ConnectionTrait,
{
    let mut active = record.into_active_model();
    apply_transition::<R>(&mut active, next, now);
    R::set_updated_at(&mut active, now);
    Ok(active.update(db).await?)
}

/// Writes the state after a waiver.
pub(crate) async fn save_waiver<R, C>(
    db: &C,
    record: R,
    next: &BalanceState,
    reason: Option<String>,
    now: NaiveDateTime,
) -> Result<R>
where
    R: BalanceRecord + IntoActiveModel<R::Active>,
    C: ConnectionTrait,
{
    let mut active = record.into_active_model();
    R::apply_state(&mut active, next);
    R::set_waiver(&mut active, reason, now);
    R::set_updated_at(&mut active, now);
    Ok(active.update(db).await?)
}

/// Flags the candidates whose due date has passed. Returns how many rows changed.
pub(crate) async fn flag_overdue<R, C>(
    db: &C,
    candidates: Vec<R>,
    today: NaiveDate,
    now: NaiveDateTime,
) -> Result<u64>
where
    R: BalanceRecord + IntoActiveModel<R::Active>,
    C: ConnectionTrait,
{
    let mut touched = 0;
    for existing in candidates {
        let current = existing.state();
        let Some(next) = current.mark_overdue(existing.due_date(), today) else {
            continue;
        };
        if next == current {
            continue;
        }
        let mut active = existing.into_active_model();
        R::apply_state(&mut active, &next);
        R::set_updated_at(&mut active, now);
        active.update(db).await?;
        touched += 1;
    }
    Ok(touched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{d, now};
    use sea_orm::ActiveValue;

    #[test]
    fn test_transition_stamps_paid_at_only_when_settled() {
        let open = BalanceState::new(d(100), Decimal::ZERO).unwrap();

        let mut partial = <penalty::ActiveModel as Default>::default();
        apply_transition::<penalty::Model>(&mut partial, &open.record_payment(d(40)).unwrap(), now());
        assert_eq!(partial.balance, ActiveValue::Set(d(60)));
        assert_eq!(partial.is_paid, ActiveValue::Set(false));
        assert_eq!(partial.paid_at, ActiveValue::NotSet);

        let mut settled = <contribution::ActiveModel as Default>::default();
        apply_transition::<contribution::Model>(
            &mut settled,
            &open.record_payment(d(100)).unwrap(),
            now(),
        );
        assert_eq!(settled.balance, ActiveValue::Set(Decimal::ZERO));
        assert_eq!(settled.is_paid, ActiveValue::Set(true));
        assert_eq!(settled.paid_at, ActiveValue::Set(Some(now())));
    }

    #[test]
    fn test_reprice_keeps_the_untouched_side() {
        let current = BalanceState::new(d(100), d(20)).unwrap();

        let mut active = <contribution::ActiveModel as Default>::default();
        reprice::<contribution::Model>(&mut active, &current, Some(d(150)), None, false, now())
            .unwrap();
        assert_eq!(active.amount, ActiveValue::Set(d(150)));
        assert_eq!(active.discount_amount, ActiveValue::Set(d(20)));
        assert_eq!(active.balance, ActiveValue::Set(d(130)));

        let mut locked = <penalty::ActiveModel as Default>::default();
        let err = reprice::<penalty::Model>(&mut locked, &current, None, Some(d(0)), true, now())
            .unwrap_err();
        assert!(matches!(err, crate::error::ComputeError::Rule(_)));
        assert_eq!(locked.balance, ActiveValue::NotSet);
    }
}

//! Meeting attendance: QR tokens, check-ins, manual edits and the penalty run
//! that closes a meeting.

use chrono::{Duration, NaiveDateTime};
use common::{AttendanceSummary, PenaltyRunSummary};
use model::entities::attendance::{self, AttendanceStatus};
use model::entities::meeting::{self, MeetingStatus};
use model::entities::{settings, user};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait, TryIntoModel,
};
use tracing::{debug, info, instrument, warn};

use crate::error::{ComputeError, Result};
use crate::penalty::{create_penalty, NewPenalty};

/// How long after the meeting start a QR scan is still accepted.
pub const ATTENDANCE_WINDOW_HOURS: i64 = 24;

pub const MSG_INVALID_QR: &str = "Invalid QR code";
pub const MSG_QR_EXPIRED: &str = "QR code has expired";
pub const MSG_NOT_STARTED: &str = "Meeting has not started yet";
pub const MSG_WINDOW_CLOSED: &str = "Attendance window for this meeting has closed";
pub const MSG_ALREADY_RECORDED: &str = "Attendance already recorded for this meeting";
pub const MSG_CANCELLED: &str = "Meeting has been cancelled";
pub const MSG_FINALIZED: &str = "Attendance for this meeting has already been finalized";

/// Lateness of a check-in relative to the meeting start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lateness {
    pub is_late: bool,
    pub late_minutes: i32,
}

/// A check-in is late once it happens more than `threshold_minutes` after the start.
pub fn lateness(meeting_date: NaiveDateTime, at: NaiveDateTime, threshold_minutes: i32) -> Lateness {
    let minutes = (at - meeting_date).num_minutes();
    if minutes > i64::from(threshold_minutes) {
        Lateness {
            is_late: true,
            late_minutes: i32::try_from(minutes).unwrap_or(i32::MAX),
        }
    } else {
        Lateness {
            is_late: false,
            late_minutes: 0,
        }
    }
}

/// Fine owed for an attendance outcome, if any.
pub fn assess_penalty(
    status: AttendanceStatus,
    is_late: bool,
    settings: &settings::Model,
) -> Option<Decimal> {
    let amount = match status {
        AttendanceStatus::Absent => settings.absent_penalty_amount,
        AttendanceStatus::Present if is_late => settings.late_penalty_amount,
        AttendanceStatus::Present | AttendanceStatus::Excused => return None,
    };
    (amount > Decimal::ZERO).then_some(amount)
}

/// Checks a scanned token against the meeting. Pure; the caller loads the meeting.
pub fn validate_qr_scan(meeting: &meeting::Model, qr_code: &str, now: NaiveDateTime) -> Result<()> {
    match meeting.status {
        MeetingStatus::Cancelled => return Err(ComputeError::Rule(MSG_CANCELLED.to_string())),
        MeetingStatus::Completed => return Err(ComputeError::Rule(MSG_FINALIZED.to_string())),
        MeetingStatus::Scheduled | MeetingStatus::Ongoing => {}
    }
    if meeting.qr_code.as_deref() != Some(qr_code) {
        return Err(ComputeError::Rule(MSG_INVALID_QR.to_string()));
    }
    match meeting.qr_code_expires_at {
        Some(expires_at) if expires_at >= now => {}
        _ => return Err(ComputeError::Rule(MSG_QR_EXPIRED.to_string())),
    }
    if meeting.meeting_date > now {
        return Err(ComputeError::Rule(MSG_NOT_STARTED.to_string()));
    }
    if now - meeting.meeting_date > Duration::hours(ATTENDANCE_WINDOW_HOURS) {
        return Err(ComputeError::Rule(MSG_WINDOW_CLOSED.to_string()));
    }
    Ok(())
}

fn apply_assessment(
    active: &mut attendance::ActiveModel,
    status: AttendanceStatus,
    late: Lateness,
    settings: &settings::Model,
) {
    let fine = assess_penalty(status, late.is_late, settings);
    active.status = Set(status);
    active.is_late = Set(late.is_late);
    active.late_minutes = Set(late.late_minutes);
    active.has_penalty = Set(fine.is_some());
    active.penalty_amount = Set(fine.unwrap_or(Decimal::ZERO));
}

/// A concurrent first scan by the same parent loses on the (meeting, parent) index.
fn already_recorded_on_conflict(err: DbErr) -> ComputeError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            ComputeError::Rule(MSG_ALREADY_RECORDED.to_string())
        }
        _ => ComputeError::Database(err),
    }
}

fn blank_attendance(meeting_id: i32, parent_id: i32, now: NaiveDateTime) -> attendance::ActiveModel {
    attendance::ActiveModel {
        meeting_id: Set(meeting_id),
        parent_id: Set(parent_id),
        penalty_applied: Set(false),
        scanned_via_qr: Set(false),
        qr_scanned_at: Set(None),
        checked_in_at: Set(None),
        remarks: Set(None),
        recorded_by: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
}

async fn find_meeting<C: ConnectionTrait>(db: &C, id: i32) -> Result<meeting::Model> {
    meeting::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ComputeError::not_found("Meeting", id))
}

async fn find_row<C: ConnectionTrait>(
    db: &C,
    meeting_id: i32,
    parent_id: i32,
) -> Result<Option<attendance::Model>> {
    Ok(attendance::Entity::find()
        .filter(attendance::Column::MeetingId.eq(meeting_id))
        .filter(attendance::Column::ParentId.eq(parent_id))
        .one(db)
        .await?)
}

async fn ensure_parent<C: ConnectionTrait>(db: &C, parent_id: i32) -> Result<user::Model> {
    let parent = user::Entity::find_by_id(parent_id)
        .one(db)
        .await?
        .ok_or_else(|| ComputeError::not_found("Parent", parent_id))?;
    if parent.role != user::UserRole::Parent {
        return Err(ComputeError::InvalidInput(format!(
            "User {} is not a parent",
            parent_id
        )));
    }
    Ok(parent)
}

/// Replaces the meeting's QR token. The caller supplies the random token.
#[instrument(skip(db, token))]
pub async fn issue_qr_code(
    db: &DatabaseConnection,
    meeting_id: i32,
    token: String,
    expiry_minutes: i32,
    now: NaiveDateTime,
) -> Result<meeting::Model> {
    if expiry_minutes <= 0 {
        return Err(ComputeError::InvalidInput(
            "QR expiry must be a positive number of minutes".to_string(),
        ));
    }
    let meeting = find_meeting(db, meeting_id).await?;
    match meeting.status {
        MeetingStatus::Cancelled => return Err(ComputeError::Rule(MSG_CANCELLED.to_string())),
        MeetingStatus::Completed => return Err(ComputeError::Rule(MSG_FINALIZED.to_string())),
        MeetingStatus::Scheduled | MeetingStatus::Ongoing => {}
    }

    let expires_at = now + Duration::minutes(i64::from(expiry_minutes));
    let mut active: meeting::ActiveModel = meeting.into();
    active.qr_code = Set(Some(token));
    active.qr_code_expires_at = Set(Some(expires_at));
    active.updated_at = Set(now);
    let model = active.update(db).await?;

    info!("Issued QR code for meeting {} valid until {}", meeting_id, expires_at);
    Ok(model)
}

/// Records a parent's QR check-in.
///
/// Creates the attendance row, or turns an existing absent/excused row into
/// PRESENT. A row that is already PRESENT is rejected.
#[instrument(skip(db, qr_code, settings))]
pub async fn check_in_with_qr(
    db: &DatabaseConnection,
    meeting_id: i32,
    qr_code: &str,
    parent_id: i32,
    settings: &settings::Model,
    now: NaiveDateTime,
) -> Result<attendance::Model> {
    let txn = db.begin().await?;

    let meeting = find_meeting(&txn, meeting_id).await?;
    if let Err(err) = validate_qr_scan(&meeting, qr_code, now) {
        warn!("Rejected QR scan by parent {} for meeting {}: {}", parent_id, meeting_id, err);
        return Err(err);
    }
    ensure_parent(&txn, parent_id).await?;

    let late = lateness(meeting.meeting_date, now, settings.late_threshold_minutes);
    let mut active = match find_row(&txn, meeting_id, parent_id).await? {
        Some(existing) if existing.status == AttendanceStatus::Present => {
            return Err(ComputeError::Rule(MSG_ALREADY_RECORDED.to_string()));
        }
        Some(existing) if existing.penalty_applied => {
            return Err(ComputeError::Rule(MSG_FINALIZED.to_string()));
        }
        Some(existing) => existing.into(),
        None => blank_attendance(meeting_id, parent_id, now),
    };
    apply_assessment(&mut active, AttendanceStatus::Present, late, settings);
    active.scanned_via_qr = Set(true);
    active.qr_scanned_at = Set(Some(now));
    active.checked_in_at = Set(Some(now));
    active.updated_at = Set(now);
    let row = active
        .save(&txn)
        .await
        .map_err(already_recorded_on_conflict)?
        .try_into_model()?;

    if meeting.status == MeetingStatus::Scheduled {
        let mut started: meeting::ActiveModel = meeting.into();
        started.status = Set(MeetingStatus::Ongoing);
        started.updated_at = Set(now);
        started.update(&txn).await?;
    }

    txn.commit().await?;

    info!(
        "Parent {} checked in to meeting {} via QR (late: {}, {} min)",
        parent_id, meeting_id, row.is_late, row.late_minutes
    );
    Ok(row)
}

/// Manual attendance entry by an administrator.
#[derive(Debug, Clone)]
pub struct AttendanceEntry {
    pub meeting_id: i32,
    pub parent_id: i32,
    pub status: AttendanceStatus,
    /// Check-in time for PRESENT entries; lateness is derived from it. Defaults to `now`.
    pub checked_in_at: Option<NaiveDateTime>,
    pub remarks: Option<String>,
    pub recorded_by: Option<i32>,
}

/// Creates or replaces the attendance row of a parent for a meeting.
#[instrument(skip(db, entry, settings), fields(meeting_id = entry.meeting_id, parent_id = entry.parent_id))]
pub async fn record_attendance(
    db: &DatabaseConnection,
    entry: AttendanceEntry,
    settings: &settings::Model,
    now: NaiveDateTime,
) -> Result<attendance::Model> {
    let txn = db.begin().await?;

    let meeting = find_meeting(&txn, entry.meeting_id).await?;
    if meeting.status == MeetingStatus::Cancelled {
        return Err(ComputeError::Rule(MSG_CANCELLED.to_string()));
    }
    ensure_parent(&txn, entry.parent_id).await?;

    let mut active = match find_row(&txn, entry.meeting_id, entry.parent_id).await? {
        Some(existing) if existing.penalty_applied => {
            return Err(ComputeError::Rule(MSG_FINALIZED.to_string()));
        }
        Some(existing) => existing.into(),
        None => blank_attendance(entry.meeting_id, entry.parent_id, now),
    };

    let (late, checked_in_at) = match entry.status {
        AttendanceStatus::Present => {
            let at = entry.checked_in_at.unwrap_or(now);
            (
                lateness(meeting.meeting_date, at, settings.late_threshold_minutes),
                Some(at),
            )
        }
        AttendanceStatus::Absent | AttendanceStatus::Excused => (
            Lateness {
                is_late: false,
                late_minutes: 0,
            },
            None,
        ),
    };
    apply_assessment(&mut active, entry.status, late, settings);
    active.checked_in_at = Set(checked_in_at);
    active.remarks = Set(entry.remarks);
    active.recorded_by = Set(entry.recorded_by);
    active.updated_at = Set(now);
    let row = active.save(&txn).await?.try_into_model()?;

    txn.commit().await?;

    debug!(
        "Recorded {:?} for parent {} at meeting {}",
        row.status, row.parent_id, row.meeting_id
    );
    Ok(row)
}

pub async fn list_attendance(
    db: &DatabaseConnection,
    meeting_id: Option<i32>,
    parent_id: Option<i32>,
) -> Result<Vec<attendance::Model>> {
    let mut query = attendance::Entity::find();
    if let Some(meeting_id) = meeting_id {
        query = query.filter(attendance::Column::MeetingId.eq(meeting_id));
    }
    if let Some(parent_id) = parent_id {
        query = query.filter(attendance::Column::ParentId.eq(parent_id));
    }
    Ok(query
        .order_by_asc(attendance::Column::MeetingId)
        .order_by_asc(attendance::Column::ParentId)
        .all(db)
        .await?)
}

pub async fn meeting_attendance_summary(
    db: &DatabaseConnection,
    meeting_id: i32,
) -> Result<AttendanceSummary> {
    find_meeting(db, meeting_id).await?;
    let rows = list_attendance(db, Some(meeting_id), None).await?;

    let mut summary = AttendanceSummary {
        meeting_id,
        ..Default::default()
    };
    for row in &rows {
        summary.total += 1;
        match row.status {
            AttendanceStatus::Present => summary.present += 1,
            AttendanceStatus::Absent => summary.absent += 1,
            AttendanceStatus::Excused => summary.excused += 1,
        }
        if row.is_late {
            summary.late += 1;
        }
        if row.scanned_via_qr {
            summary.via_qr += 1;
        }
    }
    Ok(summary)
}

/// Closes a meeting: records absences, turns pending fines into penalties and
/// marks the meeting COMPLETED. Safe to run more than once.
#[instrument(skip(db, settings))]
pub async fn apply_meeting_penalties(
    db: &DatabaseConnection,
    meeting_id: i32,
    settings: &settings::Model,
    now: NaiveDateTime,
) -> Result<PenaltyRunSummary> {
    let txn = db.begin().await?;

    let meeting = find_meeting(&txn, meeting_id).await?;
    if meeting.status == MeetingStatus::Cancelled {
        return Err(ComputeError::Rule(MSG_CANCELLED.to_string()));
    }

    let parents = user::Entity::find()
        .filter(user::Column::Role.eq(user::UserRole::Parent))
        .filter(user::Column::IsActive.eq(true))
        .all(&txn)
        .await?;
    let mut rows = attendance::Entity::find()
        .filter(attendance::Column::MeetingId.eq(meeting_id))
        .all(&txn)
        .await?;

    let mut absent_marked = 0;
    for parent in &parents {
        if rows.iter().any(|row| row.parent_id == parent.id) {
            continue;
        }
        let mut active = blank_attendance(meeting_id, parent.id, now);
        let no_lateness = Lateness {
            is_late: false,
            late_minutes: 0,
        };
        apply_assessment(&mut active, AttendanceStatus::Absent, no_lateness, settings);
        active.remarks = Set(Some("No check-in recorded".to_string()));
        rows.push(active.insert(&txn).await?);
        absent_marked += 1;
    }

    let due_date = now.date() + Duration::days(i64::from(settings.penalty_due_days.max(0)));
    let mut penalties_created = 0;
    let mut total_penalty_amount = Decimal::ZERO;
    for row in rows {
        if !row.has_penalty || row.penalty_applied || row.penalty_amount <= Decimal::ZERO {
            continue;
        }
        let reason = match row.status {
            AttendanceStatus::Absent => format!("Absent from meeting: {}", meeting.title),
            _ => format!(
                "Late by {} minutes to meeting: {}",
                row.late_minutes, meeting.title
            ),
        };
        let penalty = create_penalty(
            &txn,
            NewPenalty {
                parent_id: row.parent_id,
                meeting_id: Some(meeting_id),
                attendance_id: Some(row.id),
                reason,
                amount: row.penalty_amount,
                discount_amount: Decimal::ZERO,
                due_date: Some(due_date),
            },
            now,
        )
        .await?;
        total_penalty_amount += penalty.amount;
        penalties_created += 1;

        let mut applied: attendance::ActiveModel = row.into();
        applied.penalty_applied = Set(true);
        applied.updated_at = Set(now);
        applied.update(&txn).await?;
    }

    // The token dies with the meeting
    if meeting.status != MeetingStatus::Completed || meeting.qr_code.is_some() {
        let mut completed: meeting::ActiveModel = meeting.into();
        completed.status = Set(MeetingStatus::Completed);
        completed.qr_code = Set(None);
        completed.qr_code_expires_at = Set(None);
        completed.updated_at = Set(now);
        completed.update(&txn).await?;
    }

    txn.commit().await?;

    info!(
        "Finalized meeting {}: {} absences recorded, {} penalties totalling {}",
        meeting_id, absent_marked, penalties_created, total_penalty_amount
    );
    Ok(PenaltyRunSummary {
        meeting_id,
        absent_marked,
        penalties_created,
        total_penalty_amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, load_settings, new_meeting, new_parent, new_user, now, setup_db};
    use model::entities::payment::PaymentStatus;
    use model::entities::penalty;

    const TOKEN: &str = "4f1c2a9e-token";

    async fn meeting_with_qr(
        db: &DatabaseConnection,
        start: NaiveDateTime,
    ) -> Result<meeting::Model> {
        let meeting = new_meeting(db, start).await?;
        issue_qr_code(db, meeting.id, TOKEN.to_string(), 60, start).await
    }

    #[test]
    fn test_lateness_threshold() {
        let start = at(2025, 6, 14, 9, 0);
        assert_eq!(
            lateness(start, at(2025, 6, 14, 9, 15), 15),
            Lateness { is_late: false, late_minutes: 0 }
        );
        assert_eq!(
            lateness(start, at(2025, 6, 14, 9, 16), 15),
            Lateness { is_late: true, late_minutes: 16 }
        );
        assert!(!lateness(start, at(2025, 6, 14, 8, 50), 15).is_late);
    }

    #[tokio::test]
    async fn test_first_scan_creates_one_present_row() -> Result<()> {
        let db = setup_db().await?;
        let settings = load_settings(&db).await?;
        let parent = new_parent(&db, "parent@example.com").await?;
        let meeting = meeting_with_qr(&db, at(2025, 6, 14, 9, 0)).await?;

        let row = check_in_with_qr(
            &db,
            meeting.id,
            TOKEN,
            parent.id,
            &settings,
            at(2025, 6, 14, 9, 5),
        )
        .await?;
        assert_eq!(row.status, AttendanceStatus::Present);
        assert!(row.scanned_via_qr);
        assert!(!row.is_late);
        assert!(!row.has_penalty);

        let rows = list_attendance(&db, Some(meeting.id), None).await?;
        assert_eq!(rows.len(), 1);

        let meeting = find_meeting(&db, meeting.id).await?;
        assert_eq!(meeting.status, MeetingStatus::Ongoing);

        let err = check_in_with_qr(
            &db,
            meeting.id,
            TOKEN,
            parent.id,
            &settings,
            at(2025, 6, 14, 9, 6),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), MSG_ALREADY_RECORDED);
        assert_eq!(list_attendance(&db, Some(meeting.id), None).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_scan_rejections() -> Result<()> {
        let db = setup_db().await?;
        let settings = load_settings(&db).await?;
        let parent = new_parent(&db, "parent@example.com").await?;
        let start = at(2025, 6, 14, 9, 0);
        let meeting = meeting_with_qr(&db, start).await?;

        let scan = |code: &'static str, when: NaiveDateTime| {
            let db = db.clone();
            let settings = settings.clone();
            let meeting_id = meeting.id;
            let parent_id = parent.id;
            async move {
                check_in_with_qr(&db, meeting_id, code, parent_id, &settings, when)
                    .await
                    .unwrap_err()
                    .to_string()
            }
        };

        assert_eq!(scan("wrong", at(2025, 6, 14, 9, 5)).await, MSG_INVALID_QR);
        assert_eq!(scan(TOKEN, at(2025, 6, 14, 10, 1)).await, MSG_QR_EXPIRED);

        // a token issued before the start cannot be used early
        let early = new_meeting(&db, at(2025, 6, 20, 9, 0)).await?;
        issue_qr_code(&db, early.id, TOKEN.to_string(), 60, now()).await?;
        let err = check_in_with_qr(&db, early.id, TOKEN, parent.id, &settings, now())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), MSG_NOT_STARTED);

        // a long-lived token still stops working 24 hours after the start
        let old = new_meeting(&db, at(2025, 6, 10, 9, 0)).await?;
        issue_qr_code(&db, old.id, TOKEN.to_string(), 60 * 24 * 7, at(2025, 6, 10, 9, 0)).await?;
        let err = check_in_with_qr(&db, old.id, TOKEN, parent.id, &settings, at(2025, 6, 11, 9, 1))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), MSG_WINDOW_CLOSED);

        assert!(list_attendance(&db, None, Some(parent.id)).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_late_scan_assesses_late_fine() -> Result<()> {
        let db = setup_db().await?;
        let settings = load_settings(&db).await?;
        let parent = new_parent(&db, "parent@example.com").await?;
        let meeting = meeting_with_qr(&db, at(2025, 6, 14, 9, 0)).await?;

        let row = check_in_with_qr(
            &db,
            meeting.id,
            TOKEN,
            parent.id,
            &settings,
            at(2025, 6, 14, 9, 40),
        )
        .await?;
        assert!(row.is_late);
        assert_eq!(row.late_minutes, 40);
        assert!(row.has_penalty);
        assert_eq!(row.penalty_amount, settings.late_penalty_amount);
        assert!(!row.penalty_applied);

        Ok(())
    }

    #[tokio::test]
    async fn test_finalize_meeting_is_idempotent() -> Result<()> {
        let db = setup_db().await?;
        let settings = load_settings(&db).await?;
        new_user(&db, "admin@example.com", user::UserRole::Admin).await?;
        let on_time = new_parent(&db, "ontime@example.com").await?;
        let late = new_parent(&db, "late@example.com").await?;
        let excused = new_parent(&db, "excused@example.com").await?;
        let missing = new_parent(&db, "missing@example.com").await?;
        let start = at(2025, 6, 14, 9, 0);
        let meeting = meeting_with_qr(&db, start).await?;

        check_in_with_qr(&db, meeting.id, TOKEN, on_time.id, &settings, at(2025, 6, 14, 9, 1)).await?;
        check_in_with_qr(&db, meeting.id, TOKEN, late.id, &settings, at(2025, 6, 14, 9, 30)).await?;
        record_attendance(
            &db,
            AttendanceEntry {
                meeting_id: meeting.id,
                parent_id: excused.id,
                status: AttendanceStatus::Excused,
                checked_in_at: None,
                remarks: Some("Sick child".to_string()),
                recorded_by: None,
            },
            &settings,
            start,
        )
        .await?;

        let finish = at(2025, 6, 14, 12, 0);
        let summary = apply_meeting_penalties(&db, meeting.id, &settings, finish).await?;
        assert_eq!(summary.absent_marked, 1);
        assert_eq!(summary.penalties_created, 2);
        assert_eq!(
            summary.total_penalty_amount,
            settings.absent_penalty_amount + settings.late_penalty_amount
        );

        let penalties = penalty::Entity::find().all(&db).await?;
        assert_eq!(penalties.len(), 2);
        let absent_fine = penalties
            .iter()
            .find(|p| p.parent_id == missing.id)
            .expect("missing parent should be fined");
        assert_eq!(absent_fine.payment_status, PaymentStatus::Unpaid);
        assert_eq!(
            absent_fine.due_date,
            Some(finish.date() + Duration::days(i64::from(settings.penalty_due_days)))
        );

        let meeting_after = find_meeting(&db, meeting.id).await?;
        assert_eq!(meeting_after.status, MeetingStatus::Completed);

        let counts = meeting_attendance_summary(&db, meeting.id).await?;
        assert_eq!(counts.total, 4);
        assert_eq!(counts.present, 2);
        assert_eq!(counts.absent, 1);
        assert_eq!(counts.excused, 1);
        assert_eq!(counts.late, 1);
        assert_eq!(counts.via_qr, 2);

        let again = apply_meeting_penalties(&db, meeting.id, &settings, finish).await?;
        assert_eq!(again.absent_marked, 0);
        assert_eq!(again.penalties_created, 0);
        assert_eq!(penalty::Entity::find().all(&db).await?.len(), 2);

        // rows with an applied penalty are frozen
        let err = record_attendance(
            &db,
            AttendanceEntry {
                meeting_id: meeting.id,
                parent_id: missing.id,
                status: AttendanceStatus::Excused,
                checked_in_at: None,
                remarks: None,
                recorded_by: None,
            },
            &settings,
            finish,
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), MSG_FINALIZED);

        Ok(())
    }

    #[tokio::test]
    async fn test_scan_after_finalize_is_rejected() -> Result<()> {
        let db = setup_db().await?;
        let settings = load_settings(&db).await?;
        new_parent(&db, "early@example.com").await?;
        let start = at(2025, 6, 14, 9, 0);
        let meeting = meeting_with_qr(&db, start).await?;

        apply_meeting_penalties(&db, meeting.id, &settings, at(2025, 6, 14, 9, 20)).await?;
        let closed = find_meeting(&db, meeting.id).await?;
        assert_eq!(closed.status, MeetingStatus::Completed);
        assert!(closed.qr_code.is_none());
        assert!(closed.qr_code_expires_at.is_none());

        // registered after the run, so there is no frozen row to trip over
        let newcomer = new_parent(&db, "newcomer@example.com").await?;
        let err = check_in_with_qr(
            &db,
            meeting.id,
            TOKEN,
            newcomer.id,
            &settings,
            at(2025, 6, 14, 9, 30),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), MSG_FINALIZED);
        assert!(list_attendance(&db, None, Some(newcomer.id)).await?.is_empty());

        // a completed meeting still holding a token is refused as well
        let mut stale: meeting::ActiveModel = closed.clone().into();
        stale.qr_code = Set(Some(TOKEN.to_string()));
        stale.qr_code_expires_at = Set(Some(at(2025, 6, 14, 10, 0)));
        let stale = stale.update(&db).await?;
        assert!(matches!(
            validate_qr_scan(&stale, TOKEN, at(2025, 6, 14, 9, 30)),
            Err(ComputeError::Rule(msg)) if msg == MSG_FINALIZED
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_row_maps_to_already_recorded() -> Result<()> {
        let db = setup_db().await?;
        let settings = load_settings(&db).await?;
        let parent = new_parent(&db, "parent@example.com").await?;
        let meeting = new_meeting(&db, at(2025, 6, 14, 9, 0)).await?;

        let present_row = || {
            let mut row = blank_attendance(meeting.id, parent.id, now());
            let on_time = Lateness {
                is_late: false,
                late_minutes: 0,
            };
            apply_assessment(&mut row, AttendanceStatus::Present, on_time, &settings);
            row
        };
        present_row().insert(&db).await?;
        let err = present_row().insert(&db).await.unwrap_err();

        let mapped = already_recorded_on_conflict(err);
        assert_eq!(mapped.to_string(), MSG_ALREADY_RECORDED);
        assert!(matches!(
            already_recorded_on_conflict(DbErr::Custom("disk full".to_string())),
            ComputeError::Database(_)
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_manual_entry_overrides_assessment() -> Result<()> {
        let db = setup_db().await?;
        let settings = load_settings(&db).await?;
        let parent = new_parent(&db, "parent@example.com").await?;
        let meeting = new_meeting(&db, at(2025, 6, 14, 9, 0)).await?;

        let entry = |status| AttendanceEntry {
            meeting_id: meeting.id,
            parent_id: parent.id,
            status,
            checked_in_at: Some(at(2025, 6, 14, 9, 45)),
            remarks: None,
            recorded_by: None,
        };

        let absent = record_attendance(&db, entry(AttendanceStatus::Absent), &settings, now()).await?;
        assert_eq!(absent.penalty_amount, settings.absent_penalty_amount);
        assert!(absent.checked_in_at.is_none());

        let present = record_attendance(&db, entry(AttendanceStatus::Present), &settings, now()).await?;
        assert_eq!(present.id, absent.id);
        assert!(present.is_late);
        assert_eq!(present.penalty_amount, settings.late_penalty_amount);

        let excused = record_attendance(&db, entry(AttendanceStatus::Excused), &settings, now()).await?;
        assert!(!excused.has_penalty);
        assert_eq!(excused.penalty_amount, Decimal::ZERO);

        let admin = new_user(&db, "admin@example.com", user::UserRole::Admin).await?;
        let mut not_parent = entry(AttendanceStatus::Present);
        not_parent.parent_id = admin.id;
        assert!(matches!(
            record_attendance(&db, not_parent, &settings, now()).await,
            Err(ComputeError::InvalidInput(_))
        ));

        Ok(())
    }
}

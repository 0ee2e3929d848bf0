use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create users table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_auto(Users::Id))
                    .col(string(Users::Email).unique_key())
                    .col(string(Users::PasswordHash))
                    .col(string(Users::FirstName))
                    .col(string(Users::LastName))
                    .col(string_null(Users::Phone))
                    .col(string(Users::Role).string_len(10))
                    .col(boolean(Users::IsActive).default(true))
                    .col(boolean(Users::IsVerified).default(false))
                    .col(date_time(Users::CreatedAt))
                    .col(date_time(Users::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // Create otp_codes table
        manager
            .create_table(
                Table::create()
                    .table(OtpCodes::Table)
                    .if_not_exists()
                    .col(pk_auto(OtpCodes::Id))
                    .col(integer(OtpCodes::UserId))
                    .col(string(OtpCodes::Purpose).string_len(20))
                    .col(string(OtpCodes::CodeHash))
                    .col(date_time(OtpCodes::ExpiresAt))
                    .col(integer(OtpCodes::Attempts).default(0))
                    .col(date_time_null(OtpCodes::ConsumedAt))
                    .col(date_time(OtpCodes::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_otp_code_user")
                            .from(OtpCodes::Table, OtpCodes::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create students table
        manager
            .create_table(
                Table::create()
                    .table(Students::Table)
                    .if_not_exists()
                    .col(pk_auto(Students::Id))
                    .col(string(Students::StudentNumber).unique_key())
                    .col(string(Students::FirstName))
                    .col(string(Students::LastName))
                    .col(string(Students::GradeLevel))
                    .col(string_null(Students::Section))
                    .col(boolean(Students::IsActive).default(true))
                    .col(date_time(Students::CreatedAt))
                    .col(date_time(Students::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // Create parent_students table (parent-to-student links)
        manager
            .create_table(
                Table::create()
                    .table(ParentStudents::Table)
                    .if_not_exists()
                    .col(pk_auto(ParentStudents::Id))
                    .col(integer(ParentStudents::ParentId))
                    .col(integer(ParentStudents::StudentId))
                    .col(string(ParentStudents::Relationship))
                    .col(string(ParentStudents::Status).string_len(10))
                    .col(string_null(ParentStudents::RejectionReason))
                    .col(date_time(ParentStudents::RequestedAt))
                    .col(date_time_null(ParentStudents::ReviewedAt))
                    .col(integer_null(ParentStudents::ReviewedBy))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_parent_student_parent")
                            .from(ParentStudents::Table, ParentStudents::ParentId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_parent_student_student")
                            .from(ParentStudents::Table, ParentStudents::StudentId)
                            .to(Students::Table, Students::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_parent_students_pair")
                    .table(ParentStudents::Table)
                    .col(ParentStudents::ParentId)
                    .col(ParentStudents::StudentId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create meetings table
        manager
            .create_table(
                Table::create()
                    .table(Meetings::Table)
                    .if_not_exists()
                    .col(pk_auto(Meetings::Id))
                    .col(string(Meetings::Title))
                    .col(text_null(Meetings::Description))
                    .col(date_time(Meetings::MeetingDate))
                    .col(string_null(Meetings::Location))
                    .col(string(Meetings::Status).string_len(10))
                    .col(string_null(Meetings::QrCode))
                    .col(date_time_null(Meetings::QrCodeExpiresAt))
                    .col(integer_null(Meetings::CreatedBy))
                    .col(date_time(Meetings::CreatedAt))
                    .col(date_time(Meetings::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_meeting_creator")
                            .from(Meetings::Table, Meetings::CreatedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create attendance table
        manager
            .create_table(
                Table::create()
                    .table(Attendance::Table)
                    .if_not_exists()
                    .col(pk_auto(Attendance::Id))
                    .col(integer(Attendance::MeetingId))
                    .col(integer(Attendance::ParentId))
                    .col(string(Attendance::Status).string_len(10))
                    .col(boolean(Attendance::IsLate).default(false))
                    .col(integer(Attendance::LateMinutes).default(0))
                    .col(boolean(Attendance::HasPenalty).default(false))
                    .col(decimal(Attendance::PenaltyAmount).decimal_len(16, 4))
                    .col(boolean(Attendance::PenaltyApplied).default(false))
                    .col(boolean(Attendance::ScannedViaQr).default(false))
                    .col(date_time_null(Attendance::QrScannedAt))
                    .col(date_time_null(Attendance::CheckedInAt))
                    .col(string_null(Attendance::Remarks))
                    .col(integer_null(Attendance::RecordedBy))
                    .col(date_time(Attendance::CreatedAt))
                    .col(date_time(Attendance::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_attendance_meeting")
                            .from(Attendance::Table, Attendance::MeetingId)
                            .to(Meetings::Table, Meetings::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_attendance_parent")
                            .from(Attendance::Table, Attendance::ParentId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_attendance_meeting_parent")
                    .table(Attendance::Table)
                    .col(Attendance::MeetingId)
                    .col(Attendance::ParentId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create penalties table
        manager
            .create_table(
                Table::create()
                    .table(Penalties::Table)
                    .if_not_exists()
                    .col(pk_auto(Penalties::Id))
                    .col(integer(Penalties::ParentId))
                    .col(integer_null(Penalties::MeetingId))
                    .col(integer_null(Penalties::AttendanceId))
                    .col(string(Penalties::Reason))
                    .col(decimal(Penalties::Amount).decimal_len(16, 4))
                    .col(decimal(Penalties::DiscountAmount).decimal_len(16, 4))
                    .col(decimal(Penalties::AmountPaid).decimal_len(16, 4))
                    .col(decimal(Penalties::WaivedAmount).decimal_len(16, 4))
                    .col(decimal(Penalties::Balance).decimal_len(16, 4))
                    .col(string(Penalties::PaymentStatus).string_len(10))
                    .col(boolean(Penalties::IsPaid).default(false))
                    .col(boolean(Penalties::IsWaived).default(false))
                    .col(string_null(Penalties::WaivedReason))
                    .col(date_time_null(Penalties::WaivedAt))
                    .col(date_null(Penalties::DueDate))
                    .col(boolean(Penalties::IsOverdue).default(false))
                    .col(integer(Penalties::DaysOverdue).default(0))
                    .col(date_time_null(Penalties::PaidAt))
                    .col(date_time(Penalties::CreatedAt))
                    .col(date_time(Penalties::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_penalty_parent")
                            .from(Penalties::Table, Penalties::ParentId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_penalty_meeting")
                            .from(Penalties::Table, Penalties::MeetingId)
                            .to(Meetings::Table, Meetings::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create penalty_payments table
        manager
            .create_table(
                Table::create()
                    .table(PenaltyPayments::Table)
                    .if_not_exists()
                    .col(pk_auto(PenaltyPayments::Id))
                    .col(integer(PenaltyPayments::PenaltyId))
                    .col(decimal(PenaltyPayments::Amount).decimal_len(16, 4))
                    .col(string(PenaltyPayments::Method).string_len(15))
                    .col(string_null(PenaltyPayments::Reference))
                    .col(string_null(PenaltyPayments::Notes))
                    .col(date_time(PenaltyPayments::PaidAt))
                    .col(integer_null(PenaltyPayments::RecordedBy))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_penalty_payment_penalty")
                            .from(PenaltyPayments::Table, PenaltyPayments::PenaltyId)
                            .to(Penalties::Table, Penalties::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create projects table
        manager
            .create_table(
                Table::create()
                    .table(Projects::Table)
                    .if_not_exists()
                    .col(pk_auto(Projects::Id))
                    .col(string(Projects::Name))
                    .col(text_null(Projects::Description))
                    .col(decimal(Projects::Budget).decimal_len(16, 4))
                    .col(decimal(Projects::TotalExpenses).decimal_len(16, 4))
                    .col(decimal(Projects::Balance).decimal_len(16, 4))
                    .col(decimal(Projects::TotalRaised).decimal_len(16, 4))
                    .col(string(Projects::Status).string_len(10))
                    .col(date_null(Projects::StartDate))
                    .col(date_null(Projects::EndDate))
                    .col(date_time(Projects::CreatedAt))
                    .col(date_time(Projects::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // Create project_expenses table
        manager
            .create_table(
                Table::create()
                    .table(ProjectExpenses::Table)
                    .if_not_exists()
                    .col(pk_auto(ProjectExpenses::Id))
                    .col(integer(ProjectExpenses::ProjectId))
                    .col(string(ProjectExpenses::Description))
                    .col(string_null(ProjectExpenses::Category))
                    .col(decimal(ProjectExpenses::Amount).decimal_len(16, 4))
                    .col(date(ProjectExpenses::ExpenseDate))
                    .col(string_null(ProjectExpenses::ReceiptUrl))
                    .col(integer_null(ProjectExpenses::RecordedBy))
                    .col(date_time(ProjectExpenses::CreatedAt))
                    .col(date_time(ProjectExpenses::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_project_expense_project")
                            .from(ProjectExpenses::Table, ProjectExpenses::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create contributions table
        manager
            .create_table(
                Table::create()
                    .table(Contributions::Table)
                    .if_not_exists()
                    .col(pk_auto(Contributions::Id))
                    .col(integer(Contributions::ParentId))
                    .col(integer_null(Contributions::ProjectId))
                    .col(string(Contributions::Title))
                    .col(string_null(Contributions::Description))
                    .col(decimal(Contributions::Amount).decimal_len(16, 4))
                    .col(decimal(Contributions::DiscountAmount).decimal_len(16, 4))
                    .col(decimal(Contributions::AmountPaid).decimal_len(16, 4))
                    .col(decimal(Contributions::WaivedAmount).decimal_len(16, 4))
                    .col(decimal(Contributions::Balance).decimal_len(16, 4))
                    .col(string(Contributions::PaymentStatus).string_len(10))
                    .col(boolean(Contributions::IsPaid).default(false))
                    .col(boolean(Contributions::IsWaived).default(false))
                    .col(string_null(Contributions::WaivedReason))
                    .col(date_time_null(Contributions::WaivedAt))
                    .col(date_null(Contributions::DueDate))
                    .col(boolean(Contributions::IsOverdue).default(false))
                    .col(integer(Contributions::DaysOverdue).default(0))
                    .col(date_time_null(Contributions::PaidAt))
                    .col(date_time(Contributions::CreatedAt))
                    .col(date_time(Contributions::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_contribution_parent")
                            .from(Contributions::Table, Contributions::ParentId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_contribution_project")
                            .from(Contributions::Table, Contributions::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create contribution_payments table
        manager
            .create_table(
                Table::create()
                    .table(ContributionPayments::Table)
                    .if_not_exists()
                    .col(pk_auto(ContributionPayments::Id))
                    .col(integer(ContributionPayments::ContributionId))
                    .col(decimal(ContributionPayments::Amount).decimal_len(16, 4))
                    .col(string(ContributionPayments::Method).string_len(15))
                    .col(string_null(ContributionPayments::Reference))
                    .col(string_null(ContributionPayments::Notes))
                    .col(date_time(ContributionPayments::PaidAt))
                    .col(integer_null(ContributionPayments::RecordedBy))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_contribution_payment_contribution")
                            .from(
                                ContributionPayments::Table,
                                ContributionPayments::ContributionId,
                            )
                            .to(Contributions::Table, Contributions::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create announcements table
        manager
            .create_table(
                Table::create()
                    .table(Announcements::Table)
                    .if_not_exists()
                    .col(pk_auto(Announcements::Id))
                    .col(string(Announcements::Title))
                    .col(text(Announcements::Content))
                    .col(string(Announcements::Priority).string_len(10))
                    .col(boolean(Announcements::IsPublished).default(false))
                    .col(date_time_null(Announcements::PublishedAt))
                    .col(integer_null(Announcements::CreatedBy))
                    .col(date_time(Announcements::CreatedAt))
                    .col(date_time(Announcements::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // Create officers table
        manager
            .create_table(
                Table::create()
                    .table(Officers::Table)
                    .if_not_exists()
                    .col(pk_auto(Officers::Id))
                    .col(integer_null(Officers::UserId))
                    .col(string(Officers::Name))
                    .col(string(Officers::Position))
                    .col(date_null(Officers::TermStart))
                    .col(date_null(Officers::TermEnd))
                    .col(boolean(Officers::IsActive).default(true))
                    .col(date_time(Officers::CreatedAt))
                    .col(date_time(Officers::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_officer_user")
                            .from(Officers::Table, Officers::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create settings table (single keyed row, seeded by the next migration)
        manager
            .create_table(
                Table::create()
                    .table(Settings::Table)
                    .if_not_exists()
                    .col(integer(Settings::Id).primary_key())
                    .col(string(Settings::SchoolName))
                    .col(decimal(Settings::AbsentPenaltyAmount).decimal_len(16, 4))
                    .col(decimal(Settings::LatePenaltyAmount).decimal_len(16, 4))
                    .col(integer(Settings::LateThresholdMinutes))
                    .col(integer(Settings::QrExpiryMinutes))
                    .col(integer(Settings::PenaltyDueDays))
                    .col(decimal(Settings::DefaultContributionAmount).decimal_len(16, 4))
                    .col(date_time(Settings::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order to avoid foreign key constraints
        manager
            .drop_table(Table::drop().table(Settings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Officers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Announcements::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ContributionPayments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Contributions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProjectExpenses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Projects::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PenaltyPayments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Penalties::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Attendance::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Meetings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ParentStudents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Students::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OtpCodes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Email,
    PasswordHash,
    FirstName,
    LastName,
    Phone,
    Role,
    IsActive,
    IsVerified,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum OtpCodes {
    Table,
    Id,
    UserId,
    Purpose,
    CodeHash,
    ExpiresAt,
    Attempts,
    ConsumedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Students {
    Table,
    Id,
    StudentNumber,
    FirstName,
    LastName,
    GradeLevel,
    Section,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ParentStudents {
    Table,
    Id,
    ParentId,
    StudentId,
    Relationship,
    Status,
    RejectionReason,
    RequestedAt,
    ReviewedAt,
    ReviewedBy,
}

#[derive(DeriveIden)]
enum Meetings {
    Table,
    Id,
    Title,
    Description,
    MeetingDate,
    Location,
    Status,
    QrCode,
    QrCodeExpiresAt,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Attendance {
    Table,
    Id,
    MeetingId,
    ParentId,
    Status,
    IsLate,
    LateMinutes,
    HasPenalty,
    PenaltyAmount,
    PenaltyApplied,
    ScannedViaQr,
    QrScannedAt,
    CheckedInAt,
    Remarks,
    RecordedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Penalties {
    Table,
    Id,
    ParentId,
    MeetingId,
    AttendanceId,
    Reason,
    Amount,
    DiscountAmount,
    AmountPaid,
    WaivedAmount,
    Balance,
    PaymentStatus,
    IsPaid,
    IsWaived,
    WaivedReason,
    WaivedAt,
    DueDate,
    IsOverdue,
    DaysOverdue,
    PaidAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PenaltyPayments {
    Table,
    Id,
    PenaltyId,
    Amount,
    Method,
    Reference,
    Notes,
    PaidAt,
    RecordedBy,
}

#[derive(DeriveIden)]
enum Projects {
    Table,
    Id,
    Name,
    Description,
    Budget,
    TotalExpenses,
    Balance,
    TotalRaised,
    Status,
    StartDate,
    EndDate,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ProjectExpenses {
    Table,
    Id,
    ProjectId,
    Description,
    Category,
    Amount,
    ExpenseDate,
    ReceiptUrl,
    RecordedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Contributions {
    Table,
    Id,
    ParentId,
    ProjectId,
    Title,
    Description,
    Amount,
    DiscountAmount,
    AmountPaid,
    WaivedAmount,
    Balance,
    PaymentStatus,
    IsPaid,
    IsWaived,
    WaivedReason,
    WaivedAt,
    DueDate,
    IsOverdue,
    DaysOverdue,
    PaidAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ContributionPayments {
    Table,
    Id,
    ContributionId,
    Amount,
    Method,
    Reference,
    Notes,
    PaidAt,
    RecordedBy,
}

#[derive(DeriveIden)]
enum Announcements {
    Table,
    Id,
    Title,
    Content,
    Priority,
    IsPublished,
    PublishedAt,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Officers {
    Table,
    Id,
    UserId,
    Name,
    Position,
    TermStart,
    TermEnd,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Settings {
    Table,
    Id,
    SchoolName,
    AbsentPenaltyAmount,
    LatePenaltyAmount,
    LateThresholdMinutes,
    QrExpiryMinutes,
    PenaltyDueDays,
    DefaultContributionAmount,
    UpdatedAt,
}

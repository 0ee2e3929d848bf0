//! This file serves as the root for all SeaORM entity modules.
//! We define the data models of the PTA management system here: members and
//! their children, meetings and attendance, and the money-bearing records
//! (penalties, contributions, project ledgers) together with their history.

pub mod announcement;
pub mod attendance;
pub mod contribution;
pub mod contribution_payment;
pub mod meeting;
pub mod officer;
pub mod otp_code;
pub mod parent_student;
pub mod payment;
pub mod penalty;
pub mod penalty_payment;
pub mod project;
pub mod project_expense;
pub mod settings;
pub mod student;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::announcement::Entity as Announcement;
    pub use super::attendance::Entity as Attendance;
    pub use super::contribution::Entity as Contribution;
    pub use super::contribution_payment::Entity as ContributionPayment;
    pub use super::meeting::Entity as Meeting;
    pub use super::officer::Entity as Officer;
    pub use super::otp_code::Entity as OtpCode;
    pub use super::parent_student::Entity as ParentStudent;
    pub use super::penalty::Entity as Penalty;
    pub use super::penalty_payment::Entity as PenaltyPayment;
    pub use super::project::Entity as Project;
    pub use super::project_expense::Entity as ProjectExpense;
    pub use super::settings::Entity as Settings;
    pub use super::student::Entity as Student;
    pub use super::user::Entity as User;
}

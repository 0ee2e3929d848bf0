pub mod create_admin;
pub mod initdb;
pub mod mark_overdue;
pub mod migrate_and_serve;
pub mod serve;

pub use create_admin::create_admin;
pub use initdb::init_database;
pub use mark_overdue::mark_overdue;
pub use migrate_and_serve::migrate_and_serve;
pub use serve::serve;

use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;

/// A learner enrolled in the school. Parents are attached through `parent_student`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "students")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// School-issued learner reference number.
    #[sea_orm(unique)]
    pub student_number: String,
    pub first_name: String,
    pub last_name: String,
    pub grade_level: String,
    pub section: Option<String>,
    #[sea_orm(default_value = "true")]
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::parent_student::Entity")]
    ParentStudent,
}

impl Related<super::parent_student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ParentStudent.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

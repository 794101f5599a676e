use sea_orm::entity::prelude::*;

/// A row of the `tasks` table.
///
/// `completed` is stored as an integer flag (0 or 1); timestamps are kept as
/// the ISO-8601 text they were supplied with.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tasks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(column_type = "Text", unique)]
    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    #[sea_orm(column_name = "createdAt", column_type = "Text")]
    pub created_at: String,
    #[sea_orm(column_name = "completedAt", column_type = "Text", nullable)]
    pub completed_at: Option<String>,
    pub completed: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

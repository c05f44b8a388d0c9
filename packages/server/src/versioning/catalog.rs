use sea_orm::prelude::Expr;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use uuid::Uuid;

use crate::entity::file_record;

/// Row-level access to the `file_record` table.
///
/// Holds no state of its own; every call hits the connection it wraps, which
/// may be a pooled connection or an open transaction.
pub struct FileCatalog<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> FileCatalog<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Insert a fully populated record and return it as stored.
    pub async fn insert(&self, record: file_record::Model) -> Result<file_record::Model, DbErr> {
        file_record::ActiveModel::from(record)
            .reset_all()
            .insert(self.conn)
            .await
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<file_record::Model>, DbErr> {
        file_record::Entity::find_by_id(id).one(self.conn).await
    }

    /// Fetch a record and hold a row lock on it until the transaction ends.
    ///
    /// Backends without row locks ignore the lock clause.
    pub async fn get_for_update(&self, id: Uuid) -> Result<Option<file_record::Model>, DbErr> {
        file_record::Entity::find_by_id(id)
            .lock(LockType::Update)
            .one(self.conn)
            .await
    }

    /// Set the latest flag of a single record. Returns the number of rows touched.
    pub async fn update_is_latest(&self, id: Uuid, is_latest: bool) -> Result<u64, DbErr> {
        let result = file_record::Entity::update_many()
            .col_expr(file_record::Column::IsLatest, Expr::value(is_latest))
            .filter(file_record::Column::Id.eq(id))
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected)
    }

    /// Every record of a chain, root included, newest version first.
    pub async fn query_by_root(&self, root_id: Uuid) -> Result<Vec<file_record::Model>, DbErr> {
        file_record::Entity::find()
            .filter(file_record::Column::RootId.eq(root_id))
            .order_by_desc(file_record::Column::VersionNumber)
            .all(self.conn)
            .await
    }

    /// Records of a chain currently flagged as latest.
    pub async fn query_latest_by_root(
        &self,
        root_id: Uuid,
    ) -> Result<Vec<file_record::Model>, DbErr> {
        file_record::Entity::find()
            .filter(file_record::Column::RootId.eq(root_id))
            .filter(file_record::Column::IsLatest.eq(true))
            .order_by_desc(file_record::Column::VersionNumber)
            .all(self.conn)
            .await
    }

    /// Heads of every chain in a project, most recently revised first.
    pub async fn query_latest_by_project(
        &self,
        project_id: i32,
    ) -> Result<Vec<file_record::Model>, DbErr> {
        file_record::Entity::find()
            .filter(file_record::Column::ProjectId.eq(project_id))
            .filter(file_record::Column::IsLatest.eq(true))
            .order_by_desc(file_record::Column::CreatedAt)
            .order_by_desc(file_record::Column::Id)
            .all(self.conn)
            .await
    }
}

//! Database module configuration (`modules.db`).

use syncman_types::models::{CrudStub, TableRule};
use syncman_types::ProjectError;

use super::Manager;
use crate::error::SyncResult;

fn missing_database(project: &str, db_alias: &str) -> ProjectError {
    ProjectError::resource(project, "database", db_alias)
}

impl Manager {
    /// Drop a collection from a database.
    pub async fn set_delete_collection(
        &self,
        project: &str,
        db_alias: &str,
        collection: &str,
    ) -> SyncResult<()> {
        self.mutate_modules(
            project,
            |modules| {
                let db = modules.crud.get_mut(db_alias).ok_or_else(|| missing_database(project, db_alias))?;
                db.collections.remove(collection);
                Ok(())
            },
            |m, id, modules| m.set_crud_config(id, &modules.crud),
        )
        .await
    }

    /// Create or update a database connection. Existing collections are kept.
    pub async fn set_database_connection(
        &self,
        project: &str,
        db_alias: &str,
        stub: CrudStub,
    ) -> SyncResult<()> {
        self.mutate_modules(
            project,
            |modules| {
                match modules.crud.get_mut(db_alias) {
                    Some(db) => {
                        db.conn = stub.conn;
                        db.enabled = stub.enabled;
                        db.db_type = stub.db_type;
                    },
                    None => {
                        modules.crud.insert(
                            db_alias.to_string(),
                            CrudStub {
                                conn: stub.conn,
                                enabled: stub.enabled,
                                db_type: stub.db_type,
                                ..CrudStub::default()
                            },
                        );
                    },
                }
                Ok(())
            },
            |m, id, modules| m.set_crud_config(id, &modules.crud),
        )
        .await
    }

    pub async fn remove_database_config(&self, project: &str, db_alias: &str) -> SyncResult<()> {
        self.mutate_modules(
            project,
            |modules| {
                modules.crud.remove(db_alias);
                Ok(())
            },
            |m, id, modules| m.set_crud_config(id, &modules.crud),
        )
        .await
    }

    /// Set a collection's schema, creating the collection if needed.
    pub async fn set_modify_schema(
        &self,
        project: &str,
        db_alias: &str,
        collection: &str,
        schema: &str,
    ) -> SyncResult<()> {
        self.mutate_modules(
            project,
            |modules| {
                let db = modules.crud.get_mut(db_alias).ok_or_else(|| missing_database(project, db_alias))?;
                db.collections.entry(collection.to_string()).or_default().schema = schema.to_string();
                Ok(())
            },
            |m, id, modules| m.set_crud_config(id, &modules.crud),
        )
        .await
    }

    /// Set a collection's access rules and realtime flag. The schema is kept.
    pub async fn set_collection_rules(
        &self,
        project: &str,
        db_alias: &str,
        collection: &str,
        rules: TableRule,
    ) -> SyncResult<()> {
        self.mutate_modules(
            project,
            |modules| {
                let db = modules.crud.get_mut(db_alias).ok_or_else(|| missing_database(project, db_alias))?;
                let table = db.collections.entry(collection.to_string()).or_default();
                table.is_realtime_enabled = rules.is_realtime_enabled;
                table.rules = rules.rules;
                Ok(())
            },
            |m, id, modules| m.set_crud_config(id, &modules.crud),
        )
        .await
    }
}

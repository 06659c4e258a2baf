use sea_orm_migration::{prelude::*, sea_orm::ConnectionTrait};

#[derive(DeriveMigrationName)]
pub struct Migration;

/// (table, source column, folded column) for every name-searchable listing.
const SEARCH_COLUMNS: [(&str, &str, &str); 4] = [
    ("categories", "name", "name_folded"),
    ("genres", "name", "name_folded"),
    ("titles", "name", "name_folded"),
    ("users", "username", "username_folded"),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (table, _, folded) in SEARCH_COLUMNS {
            manager
                .alter_table(
                    Table::alter()
                        .table(Alias::new(table))
                        .add_column(
                            ColumnDef::new(Alias::new(folded)).string().not_null().default(""),
                        )
                        .to_owned(),
                )
                .await?;
        }

        // SQLite's LOWER() only folds ASCII, so existing rows are folded here.
        let db = manager.get_connection();
        let backend = manager.get_database_backend();
        for (table, source, folded) in SEARCH_COLUMNS {
            let rows = db
                .query_all(
                    backend.build(
                        &Query::select()
                            .columns([Alias::new("id"), Alias::new(source)])
                            .from(Alias::new(table))
                            .to_owned(),
                    ),
                )
                .await?;
            for row in rows {
                let id: i32 = row.try_get("", "id")?;
                let value: String = row.try_get("", source)?;
                manager
                    .exec_stmt(
                        Query::update()
                            .table(Alias::new(table))
                            .value(Alias::new(folded), value.to_lowercase())
                            .and_where(Expr::col(Alias::new("id")).eq(id))
                            .to_owned(),
                    )
                    .await?;
            }
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (table, _, folded) in SEARCH_COLUMNS {
            manager
                .alter_table(
                    Table::alter().table(Alias::new(table)).drop_column(Alias::new(folded)).to_owned(),
                )
                .await?;
        }

        Ok(())
    }
}

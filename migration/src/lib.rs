pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_catalog;
mod m20240102_000001_add_review_author_unique;
mod m20240103_000001_add_search_columns;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_catalog::Migration),
            Box::new(m20240102_000001_add_review_author_unique::Migration),
            Box::new(m20240103_000001_add_search_columns::Migration),
        ]
    }
}

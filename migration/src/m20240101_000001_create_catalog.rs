use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_auto(Users::Id))
                    .col(string_len_uniq(Users::Username, 150))
                    .col(string_len_uniq(Users::Email, 254))
                    .col(string_len(Users::FirstName, 150).default(""))
                    .col(string_len(Users::LastName, 150).default(""))
                    .col(text_null(Users::Bio))
                    .col(string_len(Users::Role, 20).default("user"))
                    .col(boolean(Users::IsStaff).default(false))
                    .col(big_integer_null(Users::LastLogin))
                    .col(big_integer(Users::DateJoined))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(pk_auto(Categories::Id))
                    .col(string_len_uniq(Categories::Name, 256))
                    .col(string_len_uniq(Categories::Slug, 50))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Genres::Table)
                    .if_not_exists()
                    .col(pk_auto(Genres::Id))
                    .col(string_len_uniq(Genres::Name, 256))
                    .col(string_len_uniq(Genres::Slug, 50))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Titles::Table)
                    .if_not_exists()
                    .col(pk_auto(Titles::Id))
                    .col(string_len(Titles::Name, 200))
                    .col(integer(Titles::Year))
                    .col(text_null(Titles::Description))
                    .col(integer_null(Titles::CategoryId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_titles_category_id")
                            .from(Titles::Table, Titles::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_titles_year")
                    .table(Titles::Table)
                    .col(Titles::Year)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TitleGenres::Table)
                    .if_not_exists()
                    .col(integer(TitleGenres::TitleId))
                    .col(integer(TitleGenres::GenreId))
                    .primary_key(
                        Index::create()
                            .col(TitleGenres::TitleId)
                            .col(TitleGenres::GenreId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_title_genres_title_id")
                            .from(TitleGenres::Table, TitleGenres::TitleId)
                            .to(Titles::Table, Titles::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_title_genres_genre_id")
                            .from(TitleGenres::Table, TitleGenres::GenreId)
                            .to(Genres::Table, Genres::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Reviews::Table)
                    .if_not_exists()
                    .col(pk_auto(Reviews::Id))
                    .col(text(Reviews::Text))
                    .col(integer(Reviews::Score))
                    .col(integer(Reviews::TitleId))
                    .col(integer(Reviews::AuthorId))
                    .col(big_integer(Reviews::PubDate))
                    .check(Expr::col(Reviews::Score).between(1, 10))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reviews_title_id")
                            .from(Reviews::Table, Reviews::TitleId)
                            .to(Titles::Table, Titles::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reviews_author_id")
                            .from(Reviews::Table, Reviews::AuthorId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reviews_pub_date")
                    .table(Reviews::Table)
                    .col(Reviews::PubDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Comments::Table)
                    .if_not_exists()
                    .col(pk_auto(Comments::Id))
                    .col(text(Comments::Text))
                    .col(integer(Comments::ReviewId))
                    .col(integer(Comments::AuthorId))
                    .col(big_integer(Comments::PubDate))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comments_review_id")
                            .from(Comments::Table, Comments::ReviewId)
                            .to(Reviews::Table, Reviews::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comments_author_id")
                            .from(Comments::Table, Comments::AuthorId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_comments_review_pub_date")
                    .table(Comments::Table)
                    .col(Comments::ReviewId)
                    .col(Comments::PubDate)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Comments::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Reviews::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(TitleGenres::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Titles::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Genres::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Categories::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Users::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Username,
    Email,
    FirstName,
    LastName,
    Bio,
    Role,
    IsStaff,
    LastLogin,
    DateJoined,
}

#[derive(DeriveIden)]
enum Categories {
    Table,
    Id,
    Name,
    Slug,
}

#[derive(DeriveIden)]
enum Genres {
    Table,
    Id,
    Name,
    Slug,
}

#[derive(DeriveIden)]
enum Titles {
    Table,
    Id,
    Name,
    Year,
    Description,
    CategoryId,
}

#[derive(DeriveIden)]
enum TitleGenres {
    Table,
    TitleId,
    GenreId,
}

#[derive(DeriveIden)]
enum Reviews {
    Table,
    Id,
    Text,
    Score,
    TitleId,
    AuthorId,
    PubDate,
}

#[derive(DeriveIden)]
enum Comments {
    Table,
    Id,
    Text,
    ReviewId,
    AuthorId,
    PubDate,
}

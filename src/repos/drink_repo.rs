/*
 * Responsibility
 * - drinks テーブル向け SQLx 操作 (id, title, recipe)
 * - recipe は JSON 文字列として保存し、読み出し時に Ingredient に戻す
 * - handler からは DrinkStore trait 経由で使う (テストでは in-memory 実装に差し替え)
 */
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::repos::error::RepoError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub color: String,
    pub parts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drink {
    pub id: i32,
    pub title: String,
    pub recipe: Vec<Ingredient>,
}

#[async_trait]
pub trait DrinkStore: Send + Sync {
    // Ordered by id.
    async fn list(&self) -> Result<Vec<Drink>, RepoError>;

    async fn create(&self, title: &str, recipe: &[Ingredient]) -> Result<Drink, RepoError>;

    // `None` fields are left untouched. `Ok(None)` when the id does not exist.
    async fn update(
        &self,
        id: i32,
        title: Option<&str>,
        recipe: Option<&[Ingredient]>,
    ) -> Result<Option<Drink>, RepoError>;

    // `Ok(false)` when the id does not exist.
    async fn delete(&self, id: i32) -> Result<bool, RepoError>;
}

#[derive(Debug, FromRow)]
struct DrinkRow {
    id: i32,
    title: String,
    recipe: String,
}

impl TryFrom<DrinkRow> for Drink {
    type Error = RepoError;

    fn try_from(row: DrinkRow) -> Result<Self, Self::Error> {
        let recipe = serde_json::from_str(&row.recipe)
            .map_err(|e| RepoError::Corrupt(format!("drink {}: {}", row.id, e)))?;
        Ok(Drink {
            id: row.id,
            title: row.title,
            recipe,
        })
    }
}

fn encode_recipe(recipe: &[Ingredient]) -> Result<String, RepoError> {
    serde_json::to_string(recipe).map_err(|e| RepoError::Corrupt(e.to_string()))
}

#[derive(Debug, Clone)]
pub struct PgDrinkStore {
    db: PgPool,
}

impl PgDrinkStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn ensure_schema(&self) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS drinks (
                id SERIAL PRIMARY KEY,
                title VARCHAR(80) NOT NULL UNIQUE,
                recipe TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// !! drops every record !! then seeds a single drink.
    pub async fn reset(&self) -> Result<(), RepoError> {
        sqlx::query("DROP TABLE IF EXISTS drinks")
            .execute(&self.db)
            .await?;
        self.ensure_schema().await?;

        let water = [Ingredient {
            name: "water".into(),
            color: "blue".into(),
            parts: 1,
        }];
        self.create("water", &water).await?;

        Ok(())
    }
}

#[async_trait]
impl DrinkStore for PgDrinkStore {
    async fn list(&self) -> Result<Vec<Drink>, RepoError> {
        let rows = sqlx::query_as::<_, DrinkRow>(
            r#"
            SELECT id, title, recipe
            FROM drinks
            ORDER BY id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Drink::try_from).collect()
    }

    async fn create(&self, title: &str, recipe: &[Ingredient]) -> Result<Drink, RepoError> {
        let row = sqlx::query_as::<_, DrinkRow>(
            r#"
            INSERT INTO drinks (title, recipe)
            VALUES ($1, $2)
            RETURNING id, title, recipe
            "#,
        )
        .bind(title)
        .bind(encode_recipe(recipe)?)
        .fetch_one(&self.db)
        .await
        .map_err(RepoError::from_sqlx)?;

        row.try_into()
    }

    async fn update(
        &self,
        id: i32,
        title: Option<&str>,
        recipe: Option<&[Ingredient]>,
    ) -> Result<Option<Drink>, RepoError> {
        let recipe = recipe.map(encode_recipe).transpose()?;

        let row = sqlx::query_as::<_, DrinkRow>(
            r#"
            UPDATE drinks
            SET
                title = COALESCE($2, title),
                recipe = COALESCE($3, recipe)
            WHERE id = $1
            RETURNING id, title, recipe
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(recipe)
        .fetch_optional(&self.db)
        .await
        .map_err(RepoError::from_sqlx)?;

        row.map(Drink::try_from).transpose()
    }

    async fn delete(&self, id: i32) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            DELETE FROM drinks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

use sqlx::{PgPool, Row};

use trackmirror_core::models::ProjectRow;

pub async fn exists(pool: &PgPool, project_key: &str) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM projects WHERE key = $1) AS present")
        .bind(project_key)
        .fetch_one(pool)
        .await?;
    Ok(row.get("present"))
}

/// Insert a project record, keeping the existing row on key conflict.
pub async fn save(pool: &PgPool, project: &ProjectRow) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO projects (key, name, url) VALUES ($1, $2, $3) ON CONFLICT (key) DO NOTHING")
        .bind(&project.key)
        .bind(&project.name)
        .bind(&project.url)
        .execute(pool)
        .await?;
    Ok(())
}

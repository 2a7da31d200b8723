use sqlx::{PgPool, Row};

/// Resolve a display name to its stable author id, creating the row on
/// first sighting.
///
/// Concurrent first-sightings race on the insert; the unique constraint on
/// `display_name` makes the loser's insert a no-op and the fallback select
/// converges every caller on the same id. No client-side locking.
pub async fn get_or_create(pool: &PgPool, display_name: &str) -> Result<i64, sqlx::Error> {
    let inserted = sqlx::query(
        "INSERT INTO authors (display_name) VALUES ($1) ON CONFLICT (display_name) DO NOTHING RETURNING id",
    )
    .bind(display_name)
    .fetch_optional(pool)
    .await?;

    if let Some(row) = inserted {
        return Ok(row.get("id"));
    }

    let row = sqlx::query("SELECT id FROM authors WHERE display_name = $1")
        .bind(display_name)
        .fetch_one(pool)
        .await?;
    Ok(row.get("id"))
}

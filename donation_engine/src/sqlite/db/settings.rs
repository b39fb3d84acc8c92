use sqlx::SqliteConnection;

use crate::db_types::{NewSetting, SiteSetting};

pub async fn fetch_settings(conn: &mut SqliteConnection) -> Result<Vec<SiteSetting>, sqlx::Error> {
    let settings = sqlx::query_as("SELECT * FROM site_settings ORDER BY setting_key").fetch_all(conn).await?;
    Ok(settings)
}

pub async fn fetch_setting(key: &str, conn: &mut SqliteConnection) -> Result<Option<SiteSetting>, sqlx::Error> {
    let setting =
        sqlx::query_as("SELECT * FROM site_settings WHERE setting_key = $1").bind(key).fetch_optional(conn).await?;
    Ok(setting)
}

/// Inserts or replaces a setting. An existing description is kept when the new one is empty.
pub async fn upsert_setting(setting: &NewSetting, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO site_settings (setting_key, setting_value, setting_type, description, updated_at)
        VALUES ($1, $2, $3, $4, CURRENT_TIMESTAMP)
        ON CONFLICT (setting_key) DO UPDATE SET
            setting_value = excluded.setting_value,
            setting_type = excluded.setting_type,
            description = COALESCE(excluded.description, site_settings.description),
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&setting.key)
    .bind(&setting.value)
    .bind(setting.setting_type.to_string())
    .bind(setting.description.as_deref())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn delete_all_settings(conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM site_settings").execute(conn).await?;
    Ok(result.rows_affected())
}

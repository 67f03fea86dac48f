//! Queries against the `domains` table.
use chrono::NaiveDate;
use sqlx::{Row, SqliteConnection};

use crate::event::Activation;

/// Stored registry row for a storefront domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRecord {
    pub full_url: String,
    pub tenant_id: String,
    pub hosted_zone_id: Option<i64>,
    pub active_status: Activation,
    pub activation_date: Option<NaiveDate>,
    pub deactivation_date: Option<NaiveDate>,
}

pub async fn find_by_url(
    conn: &mut SqliteConnection,
    full_url: &str,
) -> sqlx::Result<Option<DomainRecord>> {
    let row = sqlx::query(
        r#"
        SELECT
            full_url,
            tenant_id,
            hosted_zone_id,
            active_status,
            activation_date,
            deactivation_date
        FROM domains
        WHERE full_url = ?
        "#,
    )
    .bind(full_url)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let status: String = row.get("active_status");
    let active_status = Activation::from_status(&status).ok_or_else(|| {
        sqlx::Error::Decode(format!("unexpected active_status '{status}'").into())
    })?;

    Ok(Some(DomainRecord {
        full_url: row.get("full_url"),
        tenant_id: row.get("tenant_id"),
        hosted_zone_id: row.get("hosted_zone_id"),
        active_status,
        activation_date: row.get("activation_date"),
        deactivation_date: row.get("deactivation_date"),
    }))
}

/// Insert or re-activate a domain for a tenant. An existing zone hint is
/// kept when the event carries none.
pub async fn upsert_active(
    conn: &mut SqliteConnection,
    full_url: &str,
    tenant_id: &str,
    hosted_zone_id: Option<i64>,
    today: NaiveDate,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO domains (
            full_url,
            tenant_id,
            hosted_zone_id,
            active_status,
            activation_date
        ) VALUES (?, ?, ?, 'Y', ?)
        ON CONFLICT (full_url) DO UPDATE SET
            tenant_id = excluded.tenant_id,
            hosted_zone_id = COALESCE(excluded.hosted_zone_id, domains.hosted_zone_id),
            active_status = 'Y',
            activation_date = excluded.activation_date
        "#,
    )
    .bind(full_url)
    .bind(tenant_id)
    .bind(hosted_zone_id)
    .bind(today)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Mark a domain inactive. Returns the number of rows touched.
pub async fn mark_inactive(
    conn: &mut SqliteConnection,
    full_url: &str,
    today: NaiveDate,
) -> sqlx::Result<u64> {
    let res = sqlx::query(
        r#"
        UPDATE domains
        SET active_status = 'N', deactivation_date = ?
        WHERE full_url = ?
        "#,
    )
    .bind(today)
    .bind(full_url)
    .execute(&mut *conn)
    .await?;

    Ok(res.rows_affected())
}

pub async fn list_by_status(
    conn: &mut SqliteConnection,
    status: Activation,
) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar(
        "SELECT full_url FROM domains WHERE active_status = ? ORDER BY full_url",
    )
    .bind(status.as_status())
    .fetch_all(&mut *conn)
    .await
}

pub async fn delete(conn: &mut SqliteConnection, full_url: &str) -> sqlx::Result<u64> {
    let res = sqlx::query("DELETE FROM domains WHERE full_url = ?")
        .bind(full_url)
        .execute(&mut *conn)
        .await?;
    Ok(res.rows_affected())
}

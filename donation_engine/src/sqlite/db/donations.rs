use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Donation, NewDonation},
    donation_api::donation_objects::{DonationQueryFilter, DonationWithProject},
    traits::{LedgerError, PushAccepted, Settlement},
};

pub async fn insert_donation(donation: NewDonation, conn: &mut SqliteConnection) -> Result<Donation, LedgerError> {
    let donation: Donation = sqlx::query_as(
        r#"
            INSERT INTO donations (project_id, amount, donor_name, status, created_at, updated_at)
            VALUES ($1, $2, $3, 'pending', $4, $4)
            RETURNING *;
        "#,
    )
    .bind(donation.project_id)
    .bind(donation.amount)
    .bind(donation.donor_name)
    .bind(donation.created_at)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Donation #{} of {} saved for project #{}", donation.id, donation.amount, donation.project_id);
    Ok(donation)
}

pub async fn fetch_donation(id: i64, conn: &mut SqliteConnection) -> Result<Option<Donation>, sqlx::Error> {
    let donation = sqlx::query_as("SELECT * FROM donations WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(donation)
}

pub async fn fetch_donation_by_checkout_id(
    checkout_request_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Donation>, sqlx::Error> {
    let donation = sqlx::query_as("SELECT * FROM donations WHERE checkout_request_id = $1")
        .bind(checkout_request_id)
        .fetch_optional(conn)
        .await?;
    Ok(donation)
}

/// Fetches donations joined with their project title, according to the `DonationQueryFilter`. Newest first.
pub async fn search_donations(
    query: DonationQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<DonationWithProject>, sqlx::Error> {
    let limit = query.effective_limit();
    let mut builder = QueryBuilder::new(
        r#"
    SELECT d.*, p.title AS project_title FROM donations d
    JOIN projects p ON p.id = d.project_id
    "#,
    );
    let has_status = query.status.as_ref().map(|s| !s.is_empty()).unwrap_or(false);
    if query.project_id.is_some() || has_status {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(project_id) = query.project_id {
        where_clause.push("d.project_id = ");
        where_clause.push_bind_unseparated(project_id);
    }
    if let Some(statuses) = query.status.filter(|s| !s.is_empty()) {
        let status_clause = statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
        where_clause.push(format!("d.status IN ({status_clause})"));
    }
    builder.push(" ORDER BY julianday(d.created_at) DESC, d.id DESC LIMIT ");
    builder.push_bind(limit);
    trace!("🗃️ Executing query: {}", builder.sql());
    let donations = builder.build_query_as::<DonationWithProject>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_donations: {}", donations.len());
    Ok(donations)
}

/// Stores the provider's correlation ids against an in-flight donation. Returns `None` if the donation does not
/// exist or is no longer `pending`/`processing`.
pub async fn record_correlation_ids(
    donation_id: i64,
    accepted: &PushAccepted,
    conn: &mut SqliteConnection,
) -> Result<Option<Donation>, sqlx::Error> {
    let donation: Option<Donation> = sqlx::query_as(
        r#"
        UPDATE donations SET
            merchant_request_id = $1,
            checkout_request_id = $2,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $3 AND status IN ('pending', 'processing')
        RETURNING *
        "#,
    )
    .bind(&accepted.merchant_request_id)
    .bind(&accepted.checkout_request_id)
    .bind(donation_id)
    .fetch_optional(conn)
    .await?;
    Ok(donation)
}

/// The compare-and-set at the heart of the ledger.
///
/// Moves the donation to `settlement.status` only if it is currently `pending` or `processing`. Returns the updated
/// row when this call won, or `None` if the donation was already terminal (or does not exist).
/// An existing receipt is never overwritten with `NULL`.
pub async fn compare_and_set_terminal(
    donation_id: i64,
    settlement: &Settlement,
    conn: &mut SqliteConnection,
) -> Result<Option<Donation>, sqlx::Error> {
    let donation = sqlx::query_as(
        r#"
        UPDATE donations SET
            status = $1,
            mpesa_receipt = COALESCE($2, mpesa_receipt),
            result_desc = $3,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $4 AND status IN ('pending', 'processing')
        RETURNING *
        "#,
    )
    .bind(settlement.status.to_string())
    .bind(settlement.receipt.as_deref())
    .bind(settlement.result_desc.as_deref())
    .bind(donation_id)
    .fetch_optional(conn)
    .await?;
    Ok(donation)
}

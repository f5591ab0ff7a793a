//! The hold/confirm/cancel/expire state machine over `event_seats`.
//!
//! Every function here expects to run on a transaction connection obtained
//! through [`Store::run_in_tx`](crate::Store::run_in_tx), except
//! [`expire_holds`] which is a standalone sweep. Row counts are the guard:
//! a hold either claims every requested seat or nothing.

use std::time::Duration;

use sqlx::{PgConnection, Row};
use tixgo_core::RepoError;
use uuid::Uuid;

use crate::store::translate_db_err;

/// Claim `seat_ids` for `user_id` on `event_id`, returning the new hold id.
///
/// Expired holds on the event are reconciled first so their seats count as
/// available within this transaction. The conditional update then flips only
/// rows that are still `available`; if the affected row count differs from
/// the request, nothing is kept.
///
/// # Errors
///
/// - [`RepoError::SeatsUnavailable`] if any requested seat was not available.
/// - [`RepoError::Conflict`] on a hold-id collision.
pub async fn hold_seats(
    conn: &mut PgConnection,
    event_id: i64,
    user_id: i64,
    seat_ids: &[i64],
    ttl: Duration,
) -> Result<Uuid, RepoError> {
    let hold_id = Uuid::new_v4();
    let expires_at = chrono::Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64);

    sqlx::query(
        r"
        UPDATE event_seats
           SET status = 'available', hold_id = NULL, hold_expires_at = NULL
         WHERE event_id = $1
           AND status = 'held'
           AND hold_expires_at <= now()
        ",
    )
    .bind(event_id)
    .execute(&mut *conn)
    .await
    .map_err(translate_db_err)?;

    sqlx::query(
        r"
        INSERT INTO holds (id, event_id, user_id, expires_at)
        VALUES ($1, $2, $3, $4)
        ",
    )
    .bind(hold_id)
    .bind(event_id)
    .bind(user_id)
    .bind(expires_at)
    .execute(&mut *conn)
    .await
    .map_err(translate_db_err)?;

    let claimed = sqlx::query(
        r"
        UPDATE event_seats
           SET status = 'held', hold_id = $3, hold_expires_at = $4
         WHERE event_id = $1
           AND seat_id = ANY($2)
           AND status = 'available'
        ",
    )
    .bind(event_id)
    .bind(seat_ids)
    .bind(hold_id)
    .bind(expires_at)
    .execute(&mut *conn)
    .await
    .map_err(translate_db_err)?
    .rows_affected();

    if claimed != seat_ids.len() as u64 {
        tracing::debug!(
            event_id,
            requested = seat_ids.len(),
            claimed,
            "hold raced, aborting"
        );
        return Err(RepoError::SeatsUnavailable);
    }

    Ok(hold_id)
}

/// Turn every seat held under `hold_id` into `sold`, emitting one ticket per
/// seat inside a fresh order. Returns the order id.
///
/// # Errors
///
/// - [`RepoError::HoldExpired`] if the hold is gone or past its expiry.
/// - [`RepoError::NothingToConfirm`] if no seats were still held under it.
/// - [`RepoError::Conflict`] if a ticket for one of the seats already exists;
///   the `(event_id, seat_id)` uniqueness is the final no-double-sell guard.
pub async fn confirm_hold(
    conn: &mut PgConnection,
    hold_id: Uuid,
    total_cents: i64,
) -> Result<Uuid, RepoError> {
    let hold = sqlx::query(
        r"
        SELECT id, event_id, user_id, created_at, expires_at
          FROM holds
         WHERE id = $1 AND expires_at > now()
        ",
    )
    .bind(hold_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(translate_db_err)?
    .ok_or(RepoError::HoldExpired)
    .and_then(|row| crate::query::hold_from_row(&row).map_err(translate_db_err))?;

    let rows = sqlx::query(
        r"
        UPDATE event_seats
           SET status = 'sold', hold_id = NULL, hold_expires_at = NULL
         WHERE hold_id = $1
        RETURNING seat_id
        ",
    )
    .bind(hold_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(translate_db_err)?;

    let seat_ids = rows
        .iter()
        .map(|row| row.try_get::<i64, _>("seat_id"))
        .collect::<Result<Vec<i64>, _>>()
        .map_err(translate_db_err)?;

    if seat_ids.is_empty() {
        return Err(RepoError::NothingToConfirm);
    }

    let order_id = Uuid::new_v4();
    sqlx::query(
        r"
        INSERT INTO orders (id, event_id, user_id, total_cents)
        VALUES ($1, $2, $3, $4)
        ",
    )
    .bind(order_id)
    .bind(hold.event_id)
    .bind(hold.user_id)
    .bind(total_cents)
    .execute(&mut *conn)
    .await
    .map_err(translate_db_err)?;

    let mut tickets = sqlx::QueryBuilder::<sqlx::Postgres>::new(
        "INSERT INTO tickets (id, order_id, event_id, seat_id) ",
    );
    tickets.push_values(&seat_ids, |mut row, seat_id| {
        row.push_bind(Uuid::new_v4())
            .push_bind(order_id)
            .push_bind(hold.event_id)
            .push_bind(seat_id);
    });
    tickets
        .build()
        .execute(&mut *conn)
        .await
        .map_err(translate_db_err)?;

    sqlx::query("DELETE FROM holds WHERE id = $1")
        .bind(hold_id)
        .execute(&mut *conn)
        .await
        .map_err(translate_db_err)?;

    metrics::counter!("reservation.seats_sold.total").increment(seat_ids.len() as u64);

    Ok(order_id)
}

/// Release every seat held under `hold_id` and delete the hold.
///
/// # Errors
///
/// Returns [`RepoError::NotFound`] if no hold row was deleted.
pub async fn cancel_hold(conn: &mut PgConnection, hold_id: Uuid) -> Result<(), RepoError> {
    sqlx::query(
        r"
        UPDATE event_seats
           SET status = 'available', hold_id = NULL, hold_expires_at = NULL
         WHERE hold_id = $1
        ",
    )
    .bind(hold_id)
    .execute(&mut *conn)
    .await
    .map_err(translate_db_err)?;

    let deleted = sqlx::query("DELETE FROM holds WHERE id = $1")
        .bind(hold_id)
        .execute(&mut *conn)
        .await
        .map_err(translate_db_err)?
        .rows_affected();

    if deleted == 0 {
        return Err(RepoError::NotFound);
    }

    Ok(())
}

/// Reclaim every seat whose hold expiry has elapsed, across all events, and
/// drop the dead hold rows. Returns the number of seats released.
///
/// # Errors
///
/// Returns [`RepoError::Database`] on engine failure; a failure after the
/// seat update still reports the released count lost to the caller.
pub async fn expire_holds(conn: &mut PgConnection) -> Result<u64, RepoError> {
    let released = sqlx::query(
        r"
        UPDATE event_seats
           SET status = 'available', hold_id = NULL, hold_expires_at = NULL
         WHERE status = 'held' AND hold_expires_at <= now()
        ",
    )
    .execute(&mut *conn)
    .await
    .map_err(translate_db_err)?
    .rows_affected();

    sqlx::query("DELETE FROM holds WHERE expires_at <= now()")
        .execute(&mut *conn)
        .await
        .map_err(translate_db_err)?;

    if released > 0 {
        metrics::counter!("reservation.seats_released.total").increment(released);
    }

    Ok(released)
}

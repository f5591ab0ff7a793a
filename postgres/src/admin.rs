//! Venue, seat, and event materialization.
//!
//! `init_event_seats` is the one admin write that is part of the reservation
//! core: it copies a venue's seats into `event_seats` with an initial
//! `available` status, which is what the hold state machine mutates.

use sqlx::{PgConnection, Row};
use tixgo_core::{NewSeat, RepoError, Venue};

use crate::store::translate_db_err;

/// Insert a venue and return the created row.
///
/// # Errors
///
/// Returns [`RepoError::Conflict`] if a venue with the same name exists.
pub async fn create_venue(
    conn: &mut PgConnection,
    name: &str,
    seating_scheme: &serde_json::Value,
) -> Result<Venue, RepoError> {
    sqlx::query(
        r"
        INSERT INTO venues (name, seating_scheme)
        VALUES ($1, $2)
        RETURNING id, name, seating_scheme
        ",
    )
    .bind(name)
    .bind(seating_scheme)
    .fetch_one(&mut *conn)
    .await
    .and_then(|row| {
        Ok(Venue {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            seating_scheme: row
                .try_get::<Option<serde_json::Value>, _>("seating_scheme")?
                .unwrap_or(serde_json::Value::Null),
        })
    })
    .map_err(translate_db_err)
}

/// Insert seats for a venue in one statement, skipping duplicates. Returns
/// the number of rows actually inserted.
///
/// # Errors
///
/// Returns [`RepoError::NotFound`] if the venue does not exist.
pub async fn batch_create_seats(
    conn: &mut PgConnection,
    venue_id: i64,
    seats: &[NewSeat],
) -> Result<u64, RepoError> {
    if seats.is_empty() {
        return Ok(0);
    }

    let mut insert = sqlx::QueryBuilder::<sqlx::Postgres>::new(
        r#"INSERT INTO seats (venue_id, section, "row", number) "#,
    );
    insert.push_values(seats, |mut row, seat| {
        row.push_bind(venue_id)
            .push_bind(&seat.section)
            .push_bind(seat.row)
            .push_bind(seat.number);
    });
    insert.push(r#" ON CONFLICT (venue_id, section, "row", number) DO NOTHING"#);

    let created = insert
        .build()
        .execute(&mut *conn)
        .await
        .map_err(translate_db_err)?
        .rows_affected();

    Ok(created)
}

/// Insert an event and return its generated id.
///
/// # Errors
///
/// Returns [`RepoError::NotFound`] if the venue does not exist.
pub async fn create_event(
    conn: &mut PgConnection,
    venue_id: i64,
    title: &str,
    starts_at: chrono::DateTime<chrono::Utc>,
    ends_at: chrono::DateTime<chrono::Utc>,
) -> Result<i64, RepoError> {
    sqlx::query_scalar(
        r"
        INSERT INTO events (venue_id, title, starts_at, ends_at)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        ",
    )
    .bind(venue_id)
    .bind(title)
    .bind(starts_at)
    .bind(ends_at)
    .fetch_one(&mut *conn)
    .await
    .map_err(translate_db_err)
}

/// Materialize `event_seats` rows for an event from the venue's seats, all
/// starting as `available`. Returns the number of rows inserted.
///
/// # Errors
///
/// Returns [`RepoError::Database`] on engine failure.
pub async fn init_event_seats(
    conn: &mut PgConnection,
    event_id: i64,
    venue_id: i64,
) -> Result<u64, RepoError> {
    let inserted = sqlx::query(
        r"
        INSERT INTO event_seats (event_id, seat_id, status)
        SELECT $1, s.id, 'available'
          FROM seats s
         WHERE s.venue_id = $2
        ON CONFLICT DO NOTHING
        ",
    )
    .bind(event_id)
    .bind(venue_id)
    .execute(&mut *conn)
    .await
    .map_err(translate_db_err)?
    .rows_affected();

    Ok(inserted)
}

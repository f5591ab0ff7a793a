//! Read projections: events, availability counters, seat listings, orders.

use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};
use tixgo_core::RepoError;
use tixgo_core::{Event, EventCounts, Hold, Order, OrderWithTickets, Seat, SeatWithStatus, Ticket};
use uuid::Uuid;

use crate::store::translate_db_err;

pub(crate) fn hold_from_row(row: &PgRow) -> Result<Hold, sqlx::Error> {
    Ok(Hold {
        id: row.try_get("id")?,
        event_id: row.try_get("event_id")?,
        user_id: row.try_get("user_id")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}

fn event_from_row(row: &PgRow) -> Result<Event, sqlx::Error> {
    Ok(Event {
        id: row.try_get("id")?,
        venue_id: row.try_get("venue_id")?,
        title: row.try_get("title")?,
        starts_at: row.try_get("starts_at")?,
        ends_at: row.try_get("ends_at")?,
    })
}

fn seat_with_status_from_row(row: &PgRow) -> Result<SeatWithStatus, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(SeatWithStatus {
        seat: Seat {
            id: row.try_get("id")?,
            venue_id: row.try_get("venue_id")?,
            section: row.try_get("section")?,
            row: row.try_get("row")?,
            number: row.try_get("number")?,
        },
        status: status
            .parse()
            .map_err(|e: String| sqlx::Error::Decode(e.into()))?,
    })
}

fn order_from_row(row: &PgRow) -> Result<Order, sqlx::Error> {
    Ok(Order {
        id: row.try_get("id")?,
        event_id: row.try_get("event_id")?,
        user_id: row.try_get("user_id")?,
        total_cents: row.try_get("total_cents")?,
        created_at: row.try_get("created_at")?,
    })
}

fn ticket_from_row(row: &PgRow) -> Result<Ticket, sqlx::Error> {
    Ok(Ticket {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        event_id: row.try_get("event_id")?,
        seat_id: row.try_get("seat_id")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Fetch an event by id.
///
/// # Errors
///
/// Returns [`RepoError::NotFound`] if the event does not exist.
pub async fn get_event<'e>(db: impl sqlx::PgExecutor<'e>, id: i64) -> Result<Event, RepoError> {
    sqlx::query("SELECT id, venue_id, title, starts_at, ends_at FROM events WHERE id = $1")
        .bind(id)
        .fetch_one(db)
        .await
        .and_then(|row| event_from_row(&row))
        .map_err(translate_db_err)
}

/// List events ordered by start time, paginated.
///
/// # Errors
///
/// Returns [`RepoError::Database`] on engine failure.
pub async fn list_events<'e>(
    db: impl sqlx::PgExecutor<'e>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Event>, RepoError> {
    sqlx::query(
        r"
        SELECT id, venue_id, title, starts_at, ends_at
          FROM events
         ORDER BY starts_at
         LIMIT $1 OFFSET $2
        ",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
    .map_err(translate_db_err)?
    .iter()
    .map(|row| event_from_row(row).map_err(translate_db_err))
    .collect()
}

/// Count an event's seats grouped by status. An unknown event yields all
/// zeroes rather than an error; callers that care can check `total`.
///
/// # Errors
///
/// Returns [`RepoError::Database`] on engine failure.
pub async fn counts_by_status<'e>(
    db: impl sqlx::PgExecutor<'e>,
    event_id: i64,
) -> Result<EventCounts, RepoError> {
    let row = sqlx::query(
        r"
        SELECT
            COALESCE(SUM(CASE WHEN status = 'available' THEN 1 ELSE 0 END), 0) AS available,
            COALESCE(SUM(CASE WHEN status = 'held' THEN 1 ELSE 0 END), 0) AS held,
            COALESCE(SUM(CASE WHEN status = 'sold' THEN 1 ELSE 0 END), 0) AS sold
          FROM event_seats
         WHERE event_id = $1
        ",
    )
    .bind(event_id)
    .fetch_one(db)
    .await
    .map_err(translate_db_err)?;

    let counts = (|| -> Result<EventCounts, sqlx::Error> {
        let available: i64 = row.try_get("available")?;
        let held: i64 = row.try_get("held")?;
        let sold: i64 = row.try_get("sold")?;
        Ok(EventCounts {
            available,
            held,
            sold,
            total: available + held + sold,
        })
    })()
    .map_err(translate_db_err)?;

    Ok(counts)
}

/// List an event's seats joined with their status, ordered by position.
///
/// # Errors
///
/// Returns [`RepoError::Database`] on engine failure.
pub async fn list_event_seats<'e>(
    db: impl sqlx::PgExecutor<'e>,
    event_id: i64,
    only_available: bool,
    limit: i64,
    offset: i64,
) -> Result<Vec<SeatWithStatus>, RepoError> {
    let rows = if only_available {
        sqlx::query(
            r"
            SELECT s.id, s.venue_id, s.section, s.row, s.number, es.status::text AS status
              FROM event_seats es
              JOIN seats s ON s.id = es.seat_id
             WHERE es.event_id = $1 AND es.status = 'available'
             ORDER BY s.section, s.row, s.number
             LIMIT $2 OFFSET $3
            ",
        )
        .bind(event_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
    } else {
        sqlx::query(
            r"
            SELECT s.id, s.venue_id, s.section, s.row, s.number, es.status::text AS status
              FROM event_seats es
              JOIN seats s ON s.id = es.seat_id
             WHERE es.event_id = $1
             ORDER BY s.section, s.row, s.number
             LIMIT $2 OFFSET $3
            ",
        )
        .bind(event_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
    }
    .map_err(translate_db_err)?;

    rows.iter()
        .map(|row| seat_with_status_from_row(row).map_err(translate_db_err))
        .collect()
}

/// Fetch an order together with its tickets.
///
/// # Errors
///
/// Returns [`RepoError::NotFound`] if the order does not exist.
pub async fn order_with_tickets(
    conn: &mut PgConnection,
    order_id: Uuid,
) -> Result<OrderWithTickets, RepoError> {
    let order = sqlx::query(
        r"
        SELECT id, event_id, user_id, total_cents, created_at
          FROM orders
         WHERE id = $1
        ",
    )
    .bind(order_id)
    .fetch_one(&mut *conn)
    .await
    .and_then(|row| order_from_row(&row))
    .map_err(translate_db_err)?;

    let tickets = sqlx::query(
        r"
        SELECT id, order_id, event_id, seat_id, created_at
          FROM tickets
         WHERE order_id = $1
         ORDER BY created_at
        ",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(translate_db_err)?
    .iter()
    .map(|row| ticket_from_row(row).map_err(translate_db_err))
    .collect::<Result<Vec<Ticket>, RepoError>>()?;

    Ok(OrderWithTickets { order, tickets })
}

/// Fetch a hold by id, live or not.
///
/// # Errors
///
/// Returns [`RepoError::NotFound`] if the hold does not exist.
pub async fn get_hold<'e>(db: impl sqlx::PgExecutor<'e>, hold_id: Uuid) -> Result<Hold, RepoError> {
    sqlx::query(
        r"
        SELECT id, event_id, user_id, created_at, expires_at
          FROM holds
         WHERE id = $1
        ",
    )
    .bind(hold_id)
    .fetch_one(db)
    .await
    .and_then(|row| hold_from_row(&row))
    .map_err(translate_db_err)
}

//! SQLite order store.

use crate::domain::error::LedgerError;
use crate::domain::order::{LineItem, OrderRecord, StoredOrder, Transaction};
use crate::domain::reconciler::{KnownOrderIndex, ReconcilePlan};
use crate::domain::sync_config::StoreConfig;
use crate::ports::order_store_port::OrderStorePort;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_error(e: r2d2::Error) -> LedgerError {
    LedgerError::Database {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> LedgerError {
    LedgerError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn stamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(len: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(len, rusqlite::types::Type::Text, Box::new(e))
}

fn parse_stamp(text: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(text.len(), e))
}

fn parse_date(text: Option<String>) -> Result<Option<NaiveDate>, rusqlite::Error> {
    match text {
        Some(s) => NaiveDate::parse_from_str(&s, DATE_FORMAT)
            .map(Some)
            .map_err(|e| conversion_error(s.len(), e)),
        None => Ok(None),
    }
}

fn with_foreign_keys(manager: SqliteConnectionManager) -> SqliteConnectionManager {
    manager.with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"))
}

impl SqliteAdapter {
    pub fn from_config(store: &StoreConfig) -> Result<Self, LedgerError> {
        let manager = with_foreign_keys(SqliteConnectionManager::file(&store.path));
        let pool = Pool::builder()
            .max_size(store.pool_size)
            .build(manager)
            .map_err(pool_error)?;
        debug!("opened sqlite store at {}", store.path.display());
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, LedgerError> {
        let manager = with_foreign_keys(SqliteConnectionManager::memory());
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;
        Ok(Self { pool })
    }

    fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>, LedgerError> {
        self.pool.get().map_err(pool_error)
    }

    pub fn initialize_schema(&self) -> Result<(), LedgerError> {
        let conn = self.connection()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS orders (
                id TEXT PRIMARY KEY NOT NULL,
                owner TEXT NOT NULL,
                order_date TEXT,
                total REAL NOT NULL,
                created TEXT NOT NULL,
                updated TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS order_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                order_id TEXT NOT NULL REFERENCES orders(id),
                name TEXT NOT NULL,
                price REAL NOT NULL,
                created TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS order_transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                order_id TEXT NOT NULL REFERENCES orders(id),
                instrument_type TEXT NOT NULL,
                last_four TEXT NOT NULL,
                amount REAL NOT NULL,
                created TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_orders_owner_created ON orders(owner, created);
            CREATE INDEX IF NOT EXISTS idx_order_items_order ON order_items(order_id);
            CREATE INDEX IF NOT EXISTS idx_order_transactions_order ON order_transactions(order_id);",
        )
        .map_err(query_error)?;
        Ok(())
    }

    fn insert_children(
        conn: &Connection,
        order: &OrderRecord,
        created: &str,
    ) -> Result<(), LedgerError> {
        for item in &order.items {
            conn.execute(
                "INSERT INTO order_items (order_id, name, price, created) VALUES (?1, ?2, ?3, ?4)",
                params![order.order_id, item.name, item.price, created],
            )
            .map_err(query_error)?;
        }
        for tx in &order.transactions {
            conn.execute(
                "INSERT INTO order_transactions (order_id, instrument_type, last_four, amount, created)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![order.order_id, tx.instrument_type, tx.last_four, tx.amount, created],
            )
            .map_err(query_error)?;
        }
        Ok(())
    }

    fn insert_in(
        conn: &Connection,
        owner: &str,
        order: &OrderRecord,
        now: &str,
    ) -> Result<(), LedgerError> {
        conn.execute(
            "INSERT INTO orders (id, owner, order_date, total, created, updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                order.order_id,
                owner,
                order.order_date.map(|d| d.format(DATE_FORMAT).to_string()),
                order.total,
                now
            ],
        )
        .map_err(query_error)?;
        Self::insert_children(conn, order, now)
    }

    fn replace_in(
        conn: &Connection,
        owner: &str,
        order: &OrderRecord,
        now: &str,
    ) -> Result<(), LedgerError> {
        let changed = conn
            .execute(
                "UPDATE orders SET order_date = ?3, total = ?4, updated = ?5
                 WHERE id = ?1 AND owner = ?2",
                params![
                    order.order_id,
                    owner,
                    order.order_date.map(|d| d.format(DATE_FORMAT).to_string()),
                    order.total,
                    now
                ],
            )
            .map_err(query_error)?;
        if changed == 0 {
            return Err(LedgerError::DatabaseQuery {
                reason: format!("order {} does not exist for {}", order.order_id, owner),
            });
        }
        conn.execute(
            "DELETE FROM order_items WHERE order_id = ?1",
            params![order.order_id],
        )
        .map_err(query_error)?;
        conn.execute(
            "DELETE FROM order_transactions WHERE order_id = ?1",
            params![order.order_id],
        )
        .map_err(query_error)?;
        Self::insert_children(conn, order, now)
    }

    fn load_children(
        conn: &Connection,
        order_id: &str,
    ) -> Result<(Vec<LineItem>, Vec<Transaction>), LedgerError> {
        let mut stmt = conn
            .prepare("SELECT name, price FROM order_items WHERE order_id = ?1 ORDER BY id")
            .map_err(query_error)?;
        let items = stmt
            .query_map(params![order_id], |row| {
                Ok(LineItem {
                    name: row.get(0)?,
                    price: row.get(1)?,
                })
            })
            .map_err(query_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_error)?;

        let mut stmt = conn
            .prepare(
                "SELECT instrument_type, last_four, amount FROM order_transactions
                 WHERE order_id = ?1 ORDER BY id",
            )
            .map_err(query_error)?;
        let transactions = stmt
            .query_map(params![order_id], |row| {
                Ok(Transaction {
                    instrument_type: row.get(0)?,
                    last_four: row.get(1)?,
                    amount: row.get(2)?,
                })
            })
            .map_err(query_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_error)?;

        Ok((items, transactions))
    }

    fn load_orders(
        conn: &Connection,
        owner: Option<&str>,
        limit: usize,
    ) -> Result<Vec<StoredOrder>, LedgerError> {
        let mut stmt = conn
            .prepare(
                "SELECT id, owner, order_date, total, created, updated FROM orders
                 WHERE ?1 IS NULL OR owner = ?1
                 ORDER BY created DESC, rowid DESC
                 LIMIT ?2",
            )
            .map_err(query_error)?;

        let headers = stmt
            .query_map(params![owner, limit as i64], |row| {
                let id: String = row.get(0)?;
                let owner: String = row.get(1)?;
                let order_date = parse_date(row.get(2)?)?;
                let total: f64 = row.get(3)?;
                let created: String = row.get(4)?;
                let updated: String = row.get(5)?;
                Ok((
                    id,
                    owner,
                    order_date,
                    total,
                    parse_stamp(&created)?,
                    parse_stamp(&updated)?,
                ))
            })
            .map_err(query_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_error)?;

        let mut orders = Vec::with_capacity(headers.len());
        for (order_id, owner, order_date, total, created, updated) in headers {
            let (items, transactions) = Self::load_children(conn, &order_id)?;
            orders.push(StoredOrder {
                owner,
                record: OrderRecord {
                    order_id,
                    order_date,
                    items,
                    transactions,
                    total,
                },
                created,
                updated,
            });
        }
        Ok(orders)
    }

    fn load_one(
        conn: &Connection,
        order_id: &str,
        owner: Option<&str>,
    ) -> Result<Option<OrderRecord>, LedgerError> {
        let header = conn
            .query_row(
                "SELECT order_date, total FROM orders WHERE id = ?1 AND (?2 IS NULL OR owner = ?2)",
                params![order_id, owner],
                |row| {
                    let order_date = parse_date(row.get(0)?)?;
                    let total: f64 = row.get(1)?;
                    Ok((order_date, total))
                },
            )
            .optional()
            .map_err(query_error)?;

        match header {
            Some((order_date, total)) => {
                let (items, transactions) = Self::load_children(conn, order_id)?;
                Ok(Some(OrderRecord {
                    order_id: order_id.to_string(),
                    order_date,
                    items,
                    transactions,
                    total,
                }))
            }
            None => Ok(None),
        }
    }

    /// Stored record for `order_id`, regardless of owner.
    pub fn fetch_order(&self, order_id: &str) -> Result<Option<OrderRecord>, LedgerError> {
        let conn = self.connection()?;
        Self::load_one(&conn, order_id, None)
    }
}

impl OrderStorePort for SqliteAdapter {
    fn known_orders(&self, owner: &str, limit: usize) -> Result<KnownOrderIndex, LedgerError> {
        let conn = self.connection()?;
        let orders = Self::load_orders(&conn, Some(owner), limit)?;
        debug!("loaded {} known orders for {}", orders.len(), owner);
        Ok(KnownOrderIndex::from_records(
            owner,
            orders.into_iter().map(|o| o.record),
        ))
    }

    fn stored_orders(
        &self,
        owner: &str,
        order_ids: &[String],
    ) -> Result<Vec<OrderRecord>, LedgerError> {
        let conn = self.connection()?;
        let mut records = Vec::new();
        for order_id in order_ids {
            if let Some(record) = Self::load_one(&conn, order_id, Some(owner))? {
                records.push(record);
            }
        }
        debug!("found {} of {} older orders for {}", records.len(), order_ids.len(), owner);
        Ok(records)
    }

    fn insert_orders(&self, owner: &str, orders: &[OrderRecord]) -> Result<(), LedgerError> {
        let mut conn = self.connection()?;
        let tx = conn.transaction().map_err(query_error)?;
        let now = stamp(Utc::now());
        for order in orders {
            Self::insert_in(&tx, owner, order, &now)?;
        }
        tx.commit().map_err(query_error)?;
        Ok(())
    }

    fn update_order(&self, owner: &str, order: &OrderRecord) -> Result<(), LedgerError> {
        let mut conn = self.connection()?;
        let tx = conn.transaction().map_err(query_error)?;
        Self::replace_in(&tx, owner, order, &stamp(Utc::now()))?;
        tx.commit().map_err(query_error)?;
        Ok(())
    }

    fn apply_plan(&self, owner: &str, plan: &ReconcilePlan) -> Result<(), LedgerError> {
        let mut conn = self.connection()?;
        let tx = conn.transaction().map_err(query_error)?;
        let now = stamp(Utc::now());
        for order in &plan.to_create {
            Self::insert_in(&tx, owner, order, &now)?;
        }
        for order in &plan.to_update {
            Self::replace_in(&tx, owner, order, &now)?;
        }
        tx.commit().map_err(query_error)?;
        debug!(
            "applied {} creates and {} updates for {}",
            plan.to_create.len(),
            plan.to_update.len(),
            owner
        );
        Ok(())
    }

    fn recent_orders(
        &self,
        owner: Option<&str>,
        limit: usize,
    ) -> Result<Vec<StoredOrder>, LedgerError> {
        let conn = self.connection()?;
        Self::load_orders(&conn, owner, limit)
    }
}

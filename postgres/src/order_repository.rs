//! `PostgreSQL`-backed order store.

use chrono::{DateTime, Utc};
use orderflow_core::providers::OrderRepository;
use orderflow_core::{ActorId, Order, OrderError, OrderId, OrderStatistics, OrderStatus, Result};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;
use uuid::Uuid;

const ORDER_COLUMNS: &str =
    "id, title, description, status, created_by, processed_by, created_at, updated_at, version";

/// `PostgreSQL` implementation of [`OrderRepository`].
///
/// # Versioning
///
/// The `version` column holds the number of successful writes. A save of
/// an order read at version `n` runs `UPDATE ... WHERE version = n` and
/// bumps it to `n + 1`; zero affected rows means someone else wrote first,
/// reported as [`OrderError::ConcurrentModification`]. Orders with version
/// 0 are inserted.
#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    /// Connect with default pool settings.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Storage`] if the connection fails.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| OrderError::Storage(format!("Failed to connect to database: {e}")))?;
        Ok(Self::from_pool(pool))
    }

    /// Connect with a bounded pool.
    ///
    /// `acquire_timeout` bounds how long any store call waits for a
    /// connection.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Storage`] if the connection fails.
    pub async fn with_options(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| OrderError::Storage(format!("Failed to connect to database: {e}")))?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations, creating the `orders` table if needed.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Storage`] if migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| OrderError::Storage(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_where(&self, clause: &str, bind: Option<&str>) -> Result<Vec<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders {clause} ORDER BY created_at, id");
        let mut query = sqlx::query(&sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(storage)?;
        rows.iter().map(row_to_order).collect()
    }

    async fn insert(&self, order: &Order) -> Result<Order> {
        let version: Option<i64> = sqlx::query_scalar(
            r"
            INSERT INTO orders (
                id, title, description, status, created_by,
                processed_by, created_at, updated_at, version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 1)
            ON CONFLICT (id) DO NOTHING
            RETURNING version
            ",
        )
        .bind(*order.id.as_uuid())
        .bind(&order.title)
        .bind(order.description.as_deref())
        .bind(order.status.as_str())
        .bind(order.created_by.as_str())
        .bind(order.processed_by.as_ref().map(ActorId::as_str))
        .bind(order.created_at)
        .bind(order.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        with_version(order, version)
    }

    async fn update(&self, order: &Order) -> Result<Order> {
        let expected = i64::try_from(order.version)
            .map_err(|_| OrderError::Internal(format!("Version overflow for order {}", order.id)))?;

        let version: Option<i64> = sqlx::query_scalar(
            r"
            UPDATE orders
            SET status = $2, processed_by = $3, updated_at = $4, version = version + 1
            WHERE id = $1 AND version = $5
            RETURNING version
            ",
        )
        .bind(*order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.processed_by.as_ref().map(ActorId::as_str))
        .bind(order.updated_at)
        .bind(expected)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        with_version(order, version)
    }
}

impl OrderRepository for PostgresOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        row.as_ref().map(row_to_order).transpose()
    }

    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        self.fetch_where("WHERE status = $1", Some(status.as_str())).await
    }

    async fn find_by_creator(&self, creator: &ActorId) -> Result<Vec<Order>> {
        self.fetch_where("WHERE created_by = $1", Some(creator.as_str())).await
    }

    async fn find_all(&self) -> Result<Vec<Order>> {
        self.fetch_where("", None).await
    }

    async fn save(&self, order: &Order) -> Result<Order> {
        let saved = if order.version == 0 {
            self.insert(order).await?
        } else {
            self.update(order).await?
        };

        tracing::debug!(
            order_id = %saved.id,
            status = %saved.status,
            version = saved.version,
            "Order saved"
        );
        Ok(saved)
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;
        to_u64(count)
    }

    async fn count_by_status(&self, status: OrderStatus) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE status = $1")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;
        to_u64(count)
    }

    async fn statistics(&self) -> Result<OrderStatistics> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS count FROM orders GROUP BY status")
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        let mut stats = OrderStatistics::default();
        for row in &rows {
            let status: String = row.try_get("status").map_err(storage)?;
            let count = to_u64(row.try_get("count").map_err(storage)?)?;
            match OrderStatus::parse(&status)? {
                OrderStatus::Ready => stats.ready = count,
                OrderStatus::InProcess => stats.in_process = count,
                OrderStatus::Processed => stats.processed = count,
            }
            stats.total += count;
        }
        Ok(stats)
    }

    async fn exists_ownership(&self, actor: &ActorId, order_id: &OrderId) -> Result<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1 AND created_by = $2)")
            .bind(*order_id.as_uuid())
            .bind(actor.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(storage)
    }
}

fn storage(e: sqlx::Error) -> OrderError {
    OrderError::Storage(e.to_string())
}

fn to_u64(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| OrderError::Storage(format!("Negative count: {value}")))
}

fn with_version(order: &Order, version: Option<i64>) -> Result<Order> {
    let version = version.ok_or(OrderError::ConcurrentModification { order_id: order.id })?;
    let mut saved = order.clone();
    saved.version = to_u64(version)?;
    Ok(saved)
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    let id: Uuid = row.try_get("id").map_err(storage)?;
    let status: String = row.try_get("status").map_err(storage)?;
    let created_by: String = row.try_get("created_by").map_err(storage)?;
    let processed_by: Option<String> = row.try_get("processed_by").map_err(storage)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(storage)?;
    let updated_at: Option<DateTime<Utc>> = row.try_get("updated_at").map_err(storage)?;
    let version: i64 = row.try_get("version").map_err(storage)?;

    Ok(Order {
        id: OrderId::from_uuid(id),
        title: row.try_get("title").map_err(storage)?,
        description: row.try_get("description").map_err(storage)?,
        status: OrderStatus::parse(&status)?,
        created_by: ActorId::new(created_by),
        processed_by: processed_by.map(ActorId::new),
        created_at,
        updated_at,
        version: to_u64(version)?,
    })
}

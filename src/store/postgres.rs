use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, Postgres};
use sqlx::{FromRow, PgConnection, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::domain::aggregates::{
    Cart, CartLine, CartStatus, Coffee, CoffeeChanges, CoffeeQuery, CoffeeSummary, LineItem, NewCoffee, Order,
    OrderStatus, PaymentStatus, Tag,
};
use crate::domain::value_objects::Money;
use crate::store::{CatalogStore, CommerceStore, StoreTx};
use crate::{CommerceError, Result};

const FOREIGN_KEY_VIOLATION: &str = "23503";

const COFFEE_COLUMNS: &str = "c.id, c.name, c.description, c.price, c.image_url, c.created_at, c.updated_at";
const CART_COLUMNS: &str = "id, owner_id, status, payment_status, completed_at, created_at, updated_at";
const ORDER_COLUMNS: &str =
    "id, cart_id, total_items, shipping_fee, total_amount, status, delivery_address, payment_method, created_at";
const LINE_SELECT: &str = "SELECT i.id, i.cart_id, i.coffee_id, i.quantity, i.unit_price, i.created_at, i.updated_at, \
     c.name AS coffee_name, c.price AS coffee_price, c.image_url AS coffee_image_url \
     FROM cart_items i JOIN coffees c ON c.id = i.coffee_id";

#[derive(FromRow)]
struct CoffeeRow {
    id: Uuid,
    name: String,
    description: String,
    price: Decimal,
    image_url: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CoffeeRow {
    fn into_coffee(self, tags: Vec<Tag>) -> Coffee {
        Coffee {
            id: self.id, name: self.name, description: self.description, price: Money::new(self.price),
            image_url: self.image_url, tags, created_at: self.created_at, updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct TagRow { coffee_id: Uuid, id: Uuid, name: String }

#[derive(FromRow)]
struct CartRow {
    id: Uuid,
    owner_id: Option<String>,
    status: String,
    payment_status: Option<String>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CartRow> for Cart {
    type Error = CommerceError;
    fn try_from(row: CartRow) -> Result<Self> {
        Ok(Cart {
            id: row.id,
            owner_id: row.owner_id,
            status: row.status.parse::<CartStatus>()?,
            payment_status: row.payment_status.as_deref().map(str::parse::<PaymentStatus>).transpose()?,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct LineRow {
    id: Uuid,
    cart_id: Uuid,
    coffee_id: Uuid,
    quantity: i32,
    unit_price: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    coffee_name: String,
    coffee_price: Decimal,
    coffee_image_url: String,
}

impl TryFrom<LineRow> for CartLine {
    type Error = CommerceError;
    fn try_from(row: LineRow) -> Result<Self> {
        let item = LineItem {
            id: row.id,
            cart_id: row.cart_id,
            coffee_id: row.coffee_id,
            quantity: from_db_count(row.quantity)?,
            unit_price: Money::new(row.unit_price),
            created_at: row.created_at,
            updated_at: row.updated_at,
        };
        let coffee = CoffeeSummary {
            id: row.coffee_id, name: row.coffee_name, price: Money::new(row.coffee_price), image_url: row.coffee_image_url,
        };
        CartLine::new(item, coffee)
    }
}

#[derive(FromRow)]
struct OrderRow {
    id: Uuid,
    cart_id: Uuid,
    total_items: i32,
    shipping_fee: Decimal,
    total_amount: Decimal,
    status: String,
    delivery_address: String,
    payment_method: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = CommerceError;
    fn try_from(row: OrderRow) -> Result<Self> {
        Ok(Order {
            id: row.id,
            cart_id: row.cart_id,
            total_items: from_db_count(row.total_items)?,
            shipping_fee: Money::new(row.shipping_fee),
            total_amount: Money::new(row.total_amount),
            status: row.status.parse::<OrderStatus>()?,
            delivery_address: row.delivery_address,
            payment_method: row.payment_method,
            created_at: row.created_at,
        })
    }
}

fn from_db_count(value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| CommerceError::StorageError(format!("negative count {value} in database")))
}

fn to_db_count(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| CommerceError::StorageError(format!("count {value} does not fit in INTEGER")))
}

// =============================================================================
// Shared queries (usable from a pooled connection or a transaction)
// =============================================================================

async fn attach_tags(conn: &mut PgConnection, rows: Vec<CoffeeRow>) -> Result<Vec<Coffee>> {
    if rows.is_empty() {
        return Ok(vec![]);
    }
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let tag_rows = sqlx::query_as::<_, TagRow>(
        "SELECT ct.coffee_id, t.id, t.name FROM coffee_tags ct JOIN tags t ON t.id = ct.tag_id \
         WHERE ct.coffee_id = ANY($1) ORDER BY t.name",
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_coffee: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    for t in tag_rows {
        by_coffee.entry(t.coffee_id).or_default().push(Tag { id: t.id, name: t.name });
    }
    Ok(rows
        .into_iter()
        .map(|r| {
            let tags = by_coffee.remove(&r.id).unwrap_or_default();
            r.into_coffee(tags)
        })
        .collect())
}

async fn fetch_coffee(conn: &mut PgConnection, id: Uuid, for_update: bool) -> Result<Option<Coffee>> {
    let sql = format!(
        "SELECT {COFFEE_COLUMNS} FROM coffees c WHERE c.id = $1{}",
        if for_update { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query_as::<_, CoffeeRow>(&sql).bind(id).fetch_optional(&mut *conn).await?;
    match row {
        Some(row) => Ok(attach_tags(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

async fn upsert_tags(conn: &mut PgConnection, names: &[String]) -> Result<Vec<Tag>> {
    let mut tags: Vec<Tag> = Vec::with_capacity(names.len());
    for name in names {
        let (id, name): (Uuid, String) = sqlx::query_as(
            "INSERT INTO tags (id, name) VALUES ($1, $2) \
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name RETURNING id, name",
        )
        .bind(Uuid::now_v7())
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
        if !tags.iter().any(|t| t.id == id) {
            tags.push(Tag { id, name });
        }
    }
    Ok(tags)
}

async fn replace_coffee_tags(conn: &mut PgConnection, coffee_id: Uuid, tags: &[Tag]) -> Result<()> {
    sqlx::query("DELETE FROM coffee_tags WHERE coffee_id = $1").bind(coffee_id).execute(&mut *conn).await?;
    for tag in tags {
        sqlx::query("INSERT INTO coffee_tags (coffee_id, tag_id) VALUES ($1, $2)")
            .bind(coffee_id)
            .bind(tag.id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn fetch_lines(conn: &mut PgConnection, cart_id: Uuid) -> Result<Vec<CartLine>> {
    let sql = format!("{LINE_SELECT} WHERE i.cart_id = $1 ORDER BY i.created_at, i.id");
    let rows = sqlx::query_as::<_, LineRow>(&sql).bind(cart_id).fetch_all(&mut *conn).await?;
    rows.into_iter().map(CartLine::try_from).collect()
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &CoffeeQuery) {
    if let Some(name) = &query.name {
        qb.push(" AND c.name ILIKE ").push_bind(format!("%{name}%"));
    }
    if !query.tags.is_empty() {
        let tags: Vec<String> = query.tags.iter().map(|t| t.to_lowercase()).collect();
        qb.push(
            " AND EXISTS (SELECT 1 FROM coffee_tags ct JOIN tags t ON t.id = ct.tag_id \
             WHERE ct.coffee_id = c.id AND lower(t.name) = ANY(",
        )
        .push_bind(tags)
        .push("))");
    }
    if let Some(start) = query.start_date {
        qb.push(" AND c.created_at >= ").push_bind(start);
    }
    if let Some(end) = query.end_date {
        qb.push(" AND c.created_at <= ").push_bind(end);
    }
}

// =============================================================================
// Store
// =============================================================================

/// PostgreSQL-backed store. Cart mutations lock the cart row with `FOR UPDATE`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn find_coffee(&self, id: Uuid) -> Result<Option<Coffee>> {
        let mut conn = self.pool.acquire().await?;
        fetch_coffee(&mut conn, id, false).await
    }

    async fn coffee_exists(&self, id: Uuid) -> Result<bool> {
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM coffees WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn current_price(&self, id: Uuid) -> Result<Option<Money>> {
        let price: Option<(Decimal,)> = sqlx::query_as("SELECT price FROM coffees WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(price.map(|(p,)| Money::new(p)))
    }

    async fn list_coffees(&self) -> Result<Vec<Coffee>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("SELECT {COFFEE_COLUMNS} FROM coffees c ORDER BY c.created_at, c.id");
        let rows = sqlx::query_as::<_, CoffeeRow>(&sql).fetch_all(&mut *conn).await?;
        attach_tags(&mut conn, rows).await
    }

    async fn search_coffees(&self, query: &CoffeeQuery) -> Result<(Vec<Coffee>, u64)> {
        let mut conn = self.pool.acquire().await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM coffees c WHERE TRUE");
        push_filters(&mut count, query);
        let (total,) = count.build_query_as::<(i64,)>().fetch_one(&mut *conn).await?;

        let mut page = QueryBuilder::<Postgres>::new(format!("SELECT {COFFEE_COLUMNS} FROM coffees c WHERE TRUE"));
        push_filters(&mut page, query);
        page.push(" ORDER BY c.created_at, c.id LIMIT ")
            .push_bind(i64::from(query.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(query.offset));
        let rows = page.build_query_as::<CoffeeRow>().fetch_all(&mut *conn).await?;

        let coffees = attach_tags(&mut conn, rows).await?;
        Ok((coffees, u64::try_from(total).unwrap_or_default()))
    }

    async fn insert_coffee(&self, new: NewCoffee) -> Result<Coffee> {
        let mut tx = self.pool.begin().await?;
        let tags = upsert_tags(&mut tx, &new.tags).await?;
        let coffee = Coffee::create(new, tags);
        sqlx::query(
            "INSERT INTO coffees (id, name, description, price, image_url, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(coffee.id)
        .bind(&coffee.name)
        .bind(&coffee.description)
        .bind(coffee.price.amount())
        .bind(&coffee.image_url)
        .bind(coffee.created_at)
        .bind(coffee.updated_at)
        .execute(&mut *tx)
        .await?;
        replace_coffee_tags(&mut tx, coffee.id, &coffee.tags).await?;
        tx.commit().await?;
        Ok(coffee)
    }

    async fn update_coffee(&self, id: Uuid, changes: CoffeeChanges) -> Result<Option<Coffee>> {
        let mut tx = self.pool.begin().await?;
        let Some(mut coffee) = fetch_coffee(&mut tx, id, true).await? else { return Ok(None) };
        changes.apply(&mut coffee);
        sqlx::query(
            "UPDATE coffees SET name = $2, description = $3, price = $4, image_url = $5, updated_at = $6 WHERE id = $1",
        )
        .bind(coffee.id)
        .bind(&coffee.name)
        .bind(&coffee.description)
        .bind(coffee.price.amount())
        .bind(&coffee.image_url)
        .bind(coffee.updated_at)
        .execute(&mut *tx)
        .await?;
        if let Some(names) = &changes.tags {
            coffee.tags = upsert_tags(&mut tx, names).await?;
            replace_coffee_tags(&mut tx, coffee.id, &coffee.tags).await?;
        }
        tx.commit().await?;
        Ok(Some(coffee))
    }

    async fn delete_coffee(&self, id: Uuid) -> Result<bool> {
        match sqlx::query("DELETE FROM coffees WHERE id = $1").bind(id).execute(&self.pool).await {
            Ok(done) => Ok(done.rows_affected() > 0),
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) => {
                Err(CommerceError::CoffeeInUse(id))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CommerceStore for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx> {
        Ok(PgTx { tx: self.pool.begin().await? })
    }

    async fn insert_cart(&self, cart: &Cart) -> Result<()> {
        sqlx::query(
            "INSERT INTO carts (id, owner_id, status, payment_status, completed_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(cart.id)
        .bind(&cart.owner_id)
        .bind(cart.status.as_str())
        .bind(cart.payment_status.map(|p| p.as_str()))
        .bind(cart.completed_at)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_cart(&self, id: Uuid) -> Result<Option<Cart>> {
        let sql = format!("SELECT {CART_COLUMNS} FROM carts WHERE id = $1");
        let row = sqlx::query_as::<_, CartRow>(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.map(Cart::try_from).transpose()
    }

    async fn find_open_cart_by_owner(&self, owner_id: &str) -> Result<Option<Cart>> {
        let sql = format!(
            "SELECT {CART_COLUMNS} FROM carts WHERE owner_id = $1 AND status = 'open' \
             ORDER BY created_at DESC, id DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, CartRow>(&sql).bind(owner_id).fetch_optional(&self.pool).await?;
        row.map(Cart::try_from).transpose()
    }

    async fn cart_lines(&self, cart_id: Uuid) -> Result<Vec<CartLine>> {
        let mut conn = self.pool.acquire().await?;
        fetch_lines(&mut conn, cart_id).await
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query_as::<_, OrderRow>(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.map(Order::try_from).transpose()
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_cart(&mut self, id: Uuid) -> Result<Option<Cart>> {
        let sql = format!("SELECT {CART_COLUMNS} FROM carts WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, CartRow>(&sql).bind(id).fetch_optional(&mut *self.tx).await?;
        row.map(Cart::try_from).transpose()
    }

    async fn find_coffee(&mut self, id: Uuid) -> Result<Option<Coffee>> {
        fetch_coffee(&mut self.tx, id, false).await
    }

    async fn cart_line(&mut self, cart_id: Uuid, item_id: Uuid) -> Result<Option<CartLine>> {
        let sql = format!("{LINE_SELECT} WHERE i.cart_id = $1 AND i.id = $2");
        let row = sqlx::query_as::<_, LineRow>(&sql)
            .bind(cart_id)
            .bind(item_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(CartLine::try_from).transpose()
    }

    async fn line_for_coffee(&mut self, cart_id: Uuid, coffee_id: Uuid) -> Result<Option<LineItem>> {
        let sql = format!("{LINE_SELECT} WHERE i.cart_id = $1 AND i.coffee_id = $2");
        let row = sqlx::query_as::<_, LineRow>(&sql)
            .bind(cart_id)
            .bind(coffee_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(CartLine::try_from).transpose()?.map(|line| line.item))
    }

    async fn cart_lines(&mut self, cart_id: Uuid) -> Result<Vec<CartLine>> {
        fetch_lines(&mut self.tx, cart_id).await
    }

    async fn insert_line_item(&mut self, item: &LineItem) -> Result<()> {
        sqlx::query(
            "INSERT INTO cart_items (id, cart_id, coffee_id, quantity, unit_price, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(item.id)
        .bind(item.cart_id)
        .bind(item.coffee_id)
        .bind(to_db_count(item.quantity)?)
        .bind(item.unit_price.amount())
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_line_item(&mut self, item: &LineItem) -> Result<()> {
        sqlx::query("UPDATE cart_items SET quantity = $2, updated_at = $3 WHERE id = $1")
            .bind(item.id)
            .bind(to_db_count(item.quantity)?)
            .bind(item.updated_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn delete_line_item(&mut self, item_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE id = $1").bind(item_id).execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            "INSERT INTO orders (id, cart_id, total_items, shipping_fee, total_amount, status, \
             delivery_address, payment_method, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(order.id)
        .bind(order.cart_id)
        .bind(to_db_count(order.total_items)?)
        .bind(order.shipping_fee.amount())
        .bind(order.total_amount.amount())
        .bind(order.status.as_str())
        .bind(&order.delivery_address)
        .bind(&order.payment_method)
        .bind(order.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_cart(&mut self, cart: &Cart) -> Result<()> {
        sqlx::query(
            "UPDATE carts SET status = $2, payment_status = $3, completed_at = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(cart.id)
        .bind(cart.status.as_str())
        .bind(cart.payment_status.map(|p| p.as_str()))
        .bind(cart.completed_at)
        .bind(cart.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

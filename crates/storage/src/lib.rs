use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::{
    domain::{ItemStatus, Money, OrderId, Role},
    protocol::NewMenuItem,
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredUser {
    pub login: String,
    pub phone: String,
    pub favorite_items: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct StoredMenuItem {
    pub item_name: String,
    pub item_type: String,
    pub price: Money,
    pub description: String,
    pub image_url: String,
}

#[derive(Debug, Clone)]
pub struct StoredOrder {
    pub order_id: OrderId,
    pub login: String,
    pub paid: bool,
    pub received_at: DateTime<Utc>,
    pub total: Money,
}

#[derive(Debug, Clone)]
pub struct StoredLine {
    pub order_id: OrderId,
    pub item_name: String,
    pub unit_price: Money,
    pub last_updated: DateTime<Utc>,
    pub status: ItemStatus,
    pub comments: String,
}

/// A single-column change to a menu item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuEdit {
    Rename(String),
    Type(String),
    Price(Money),
    Description(String),
    ImageUrl(String),
}

/// Result of a menu change that is refused while live lines reference the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardedEdit {
    Applied,
    UnknownItem,
    InUse,
    NameTaken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceOutcome {
    Placed(OrderId),
    UnknownItem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended { total: Money },
    /// Missing, owned by someone else, or already paid.
    OrderNotEditable,
    UnknownItem,
    /// The new total would not fit in a cents column.
    TotalOverflow,
}

const ORDER_COLUMNS: &str = "order_id, login, paid, received_at, total_cents";
const LINE_COLUMNS: &str =
    "order_id, item_name, unit_price_cents, last_updated, status, comments";
const MENU_COLUMNS: &str = "item_name, item_type, price_cents, description, image_url";

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid database url '{database_url}'"))?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open database '{database_url}'"))?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to apply schema migrations")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Returns `None` when the login is already taken.
    pub async fn create_user(
        &self,
        login: &str,
        password: &str,
        phone: &str,
    ) -> Result<Option<StoredUser>> {
        let row = sqlx::query(
            "INSERT INTO users (login, password, phone, favorite_items, role)
             VALUES (?, ?, ?, '', 'Customer')
             ON CONFLICT(login) DO NOTHING
             RETURNING login, phone, favorite_items, role",
        )
        .bind(login)
        .bind(password)
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| user_from_row(&r)).transpose()
    }

    pub async fn find_user(&self, login: &str) -> Result<Option<StoredUser>> {
        let row = sqlx::query(
            "SELECT login, phone, favorite_items, role FROM users WHERE login = ?",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| user_from_row(&r)).transpose()
    }

    /// Exact (login, password) match.
    pub async fn verify_credentials(&self, login: &str, password: &str) -> Result<Option<Role>> {
        let row = sqlx::query("SELECT role FROM users WHERE login = ? AND password = ?")
            .bind(login)
            .bind(password)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| decode_role(&r.get::<String, _>(0))).transpose()
    }

    pub async fn role_for_login(&self, login: &str) -> Result<Option<Role>> {
        let row = sqlx::query("SELECT role FROM users WHERE login = ?")
            .bind(login)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| decode_role(&r.get::<String, _>(0))).transpose()
    }

    /// Swaps the password only if `old_password` still matches, in one statement.
    pub async fn replace_password(
        &self,
        login: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<bool> {
        let changed =
            sqlx::query("UPDATE users SET password = ? WHERE login = ? AND password = ?")
                .bind(new_password)
                .bind(login)
                .bind(old_password)
                .execute(&self.pool)
                .await?
                .rows_affected();
        Ok(changed == 1)
    }

    pub async fn update_phone(&self, login: &str, phone: &str) -> Result<bool> {
        let changed = sqlx::query("UPDATE users SET phone = ? WHERE login = ?")
            .bind(phone)
            .bind(login)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(changed == 1)
    }

    pub async fn append_favorite_items(&self, login: &str, items: &str) -> Result<bool> {
        let changed = sqlx::query(
            "UPDATE users
             SET favorite_items = CASE
                 WHEN favorite_items = '' THEN ?1
                 ELSE favorite_items || ', ' || ?1
             END
             WHERE login = ?2",
        )
        .bind(items)
        .bind(login)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(changed == 1)
    }

    pub async fn set_role(&self, login: &str, role: Role) -> Result<bool> {
        let changed = sqlx::query("UPDATE users SET role = ? WHERE login = ?")
            .bind(role.as_str())
            .bind(login)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(changed == 1)
    }

    pub async fn list_users(&self) -> Result<Vec<StoredUser>> {
        let rows = sqlx::query(
            "SELECT login, phone, favorite_items, role FROM users ORDER BY lower(login) ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(user_from_row).collect()
    }

    /// Returns `false` when an item with the same name already exists.
    pub async fn insert_menu_item(&self, item: &NewMenuItem) -> Result<bool> {
        let inserted = sqlx::query(
            "INSERT INTO menu (item_name, item_type, price_cents, description, image_url)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(item_name) DO NOTHING",
        )
        .bind(&item.item_name)
        .bind(&item.item_type)
        .bind(item.price.cents())
        .bind(&item.description)
        .bind(&item.image_url)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(inserted == 1)
    }

    pub async fn menu_items_by_name(&self, item_name: &str) -> Result<Vec<StoredMenuItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {MENU_COLUMNS} FROM menu WHERE item_name = ?"
        ))
        .bind(item_name)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(menu_item_from_row).collect()
    }

    pub async fn menu_items_by_type(&self, item_type: &str) -> Result<Vec<StoredMenuItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {MENU_COLUMNS} FROM menu WHERE item_type = ? ORDER BY item_name ASC"
        ))
        .bind(item_type)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(menu_item_from_row).collect()
    }

    pub async fn list_menu(&self) -> Result<Vec<StoredMenuItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {MENU_COLUMNS} FROM menu ORDER BY item_type ASC, item_name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(menu_item_from_row).collect()
    }

    pub async fn price_of(&self, item_name: &str) -> Result<Option<Money>> {
        let row = sqlx::query("SELECT price_cents FROM menu WHERE item_name = ?")
            .bind(item_name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| money(r.get::<i64, _>(0))).transpose()
    }

    /// Applies `edit` unless some line references the item. The reference
    /// check is repeated inside the UPDATE itself so a line appended between
    /// the pre-check and the write still blocks the edit.
    pub async fn update_menu_item(&self, item_name: &str, edit: &MenuEdit) -> Result<GuardedEdit> {
        let mut tx = self.pool.begin().await?;

        if let Some(blocked) = menu_guard(&mut tx, item_name).await? {
            return Ok(blocked);
        }

        if let MenuEdit::Rename(new_name) = edit {
            if new_name != item_name {
                let taken: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM menu WHERE item_name = ?")
                        .bind(new_name)
                        .fetch_one(&mut *tx)
                        .await?;
                if taken > 0 {
                    return Ok(GuardedEdit::NameTaken);
                }
            }
        }

        const GUARD: &str = "WHERE item_name = ?2
             AND NOT EXISTS (SELECT 1 FROM item_status s WHERE s.item_name = menu.item_name)";
        let updated = match edit {
            MenuEdit::Rename(value)
            | MenuEdit::Type(value)
            | MenuEdit::Description(value)
            | MenuEdit::ImageUrl(value) => {
                let column = match edit {
                    MenuEdit::Rename(_) => "item_name",
                    MenuEdit::Type(_) => "item_type",
                    MenuEdit::Description(_) => "description",
                    _ => "image_url",
                };
                sqlx::query(&format!("UPDATE menu SET {column} = ?1 {GUARD}"))
                    .bind(value.clone())
                    .bind(item_name)
                    .execute(&mut *tx)
                    .await?
            }
            MenuEdit::Price(price) => {
                sqlx::query(&format!("UPDATE menu SET price_cents = ?1 {GUARD}"))
                    .bind(price.cents())
                    .bind(item_name)
                    .execute(&mut *tx)
                    .await?
            }
        };

        if updated.rows_affected() != 1 {
            return Ok(GuardedEdit::InUse);
        }
        tx.commit().await?;
        Ok(GuardedEdit::Applied)
    }

    pub async fn delete_menu_item(&self, item_name: &str) -> Result<GuardedEdit> {
        let mut tx = self.pool.begin().await?;

        if let Some(blocked) = menu_guard(&mut tx, item_name).await? {
            return Ok(blocked);
        }

        let deleted = sqlx::query(
            "DELETE FROM menu
             WHERE item_name = ?
             AND NOT EXISTS (SELECT 1 FROM item_status s WHERE s.item_name = menu.item_name)",
        )
        .bind(item_name)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if deleted != 1 {
            return Ok(GuardedEdit::InUse);
        }
        tx.commit().await?;
        Ok(GuardedEdit::Applied)
    }

    /// Creates the order and its first line in one transaction; the new id
    /// comes straight back from the insert. The opening statement is a write
    /// so SQLite takes the write lock before anything is read.
    pub async fn create_order(
        &self,
        login: &str,
        item_name: &str,
        comment: &str,
        now: DateTime<Utc>,
    ) -> Result<PlaceOutcome> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "INSERT INTO orders (login, paid, received_at, total_cents)
             SELECT ?, 0, ?, price_cents FROM menu WHERE item_name = ?
             RETURNING order_id, total_cents",
        )
        .bind(login)
        .bind(now)
        .bind(item_name)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Ok(PlaceOutcome::UnknownItem);
        };
        let order_id = OrderId(row.get::<i64, _>(0));
        let price = money(row.get::<i64, _>(1))?;

        insert_line(&mut tx, order_id, item_name, price, comment, now).await?;

        tx.commit().await?;
        Ok(PlaceOutcome::Placed(order_id))
    }

    /// Adds a line to an unpaid order owned by `login`. The total is bumped
    /// with an in-place increment inside the same transaction as the insert,
    /// so concurrent appends cannot lose each other's amounts.
    pub async fn append_item(
        &self,
        order_id: OrderId,
        login: &str,
        item_name: &str,
        comment: &str,
        now: DateTime<Utc>,
    ) -> Result<AppendOutcome> {
        let mut tx = self.pool.begin().await?;

        // Touching the order first both checks editability and takes the write lock.
        let touched = sqlx::query(
            "UPDATE orders SET received_at = ?
             WHERE order_id = ? AND login = ? AND paid = 0",
        )
        .bind(now)
        .bind(order_id.0)
        .bind(login)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if touched != 1 {
            return Ok(AppendOutcome::OrderNotEditable);
        }

        let Some(price) = price_in_tx(&mut tx, item_name).await? else {
            return Ok(AppendOutcome::UnknownItem);
        };

        let current: i64 = sqlx::query_scalar("SELECT total_cents FROM orders WHERE order_id = ?")
            .bind(order_id.0)
            .fetch_one(&mut *tx)
            .await?;
        if money(current)?.checked_add(price).is_none() {
            return Ok(AppendOutcome::TotalOverflow);
        }

        let total: i64 = sqlx::query_scalar(
            "UPDATE orders SET total_cents = total_cents + ?
             WHERE order_id = ?
             RETURNING total_cents",
        )
        .bind(price.cents())
        .bind(order_id.0)
        .fetch_one(&mut *tx)
        .await?;
        let total = money(total)?;

        insert_line(&mut tx, order_id, item_name, price, comment, now).await?;

        tx.commit().await?;
        Ok(AppendOutcome::Appended { total })
    }

    /// Returns `false` if the order does not exist. Re-marking a paid order
    /// leaves every column as it was.
    pub async fn mark_paid(&self, order_id: OrderId) -> Result<bool> {
        let matched = sqlx::query("UPDATE orders SET paid = 1 WHERE order_id = ?")
            .bind(order_id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(matched == 1)
    }

    pub async fn load_order(&self, order_id: OrderId) -> Result<Option<StoredOrder>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = ?"
        ))
        .bind(order_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| order_from_row(&r)).transpose()
    }

    pub async fn list_orders_for_login(&self, login: &str, limit: u32) -> Result<Vec<StoredOrder>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS}
             FROM orders
             WHERE login = ?
             ORDER BY received_at DESC, order_id DESC
             LIMIT ?"
        ))
        .bind(login)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(order_from_row).collect()
    }

    /// Unpaid orders received at or after `since`, oldest first.
    pub async fn list_open_orders(&self, since: DateTime<Utc>) -> Result<Vec<StoredOrder>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS}
             FROM orders
             WHERE paid = 0 AND received_at >= ?
             ORDER BY received_at ASC, order_id ASC"
        ))
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(order_from_row).collect()
    }

    pub async fn lines_for_order(&self, order_id: OrderId) -> Result<Vec<StoredLine>> {
        let rows = sqlx::query(&format!(
            "SELECT {LINE_COLUMNS} FROM item_status WHERE order_id = ? ORDER BY line_id ASC"
        ))
        .bind(order_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(line_from_row).collect()
    }

    /// Sets the status of every line of `item_name` in the order and returns
    /// how many lines matched.
    pub async fn set_line_status(
        &self,
        order_id: OrderId,
        item_name: &str,
        status: &ItemStatus,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let changed = sqlx::query(
            "UPDATE item_status SET status = ?, last_updated = ?
             WHERE order_id = ? AND item_name = ?",
        )
        .bind(status.as_str())
        .bind(now)
        .bind(order_id.0)
        .bind(item_name)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(changed)
    }

    /// Replaces the comments on every line of `item_name` in the order. With
    /// `owner` set, only lines of that user's unpaid order are touched.
    pub async fn set_line_comment(
        &self,
        order_id: OrderId,
        item_name: &str,
        comment: &str,
        owner: Option<&str>,
    ) -> Result<u64> {
        let changed = match owner {
            None => {
                sqlx::query(
                    "UPDATE item_status SET comments = ? WHERE order_id = ? AND item_name = ?",
                )
                .bind(comment)
                .bind(order_id.0)
                .bind(item_name)
                .execute(&self.pool)
                .await?
            }
            Some(login) => {
                sqlx::query(
                    "UPDATE item_status SET comments = ?1
                     WHERE order_id = ?2 AND item_name = ?3
                     AND EXISTS (
                         SELECT 1 FROM orders o
                         WHERE o.order_id = ?2 AND o.login = ?4 AND o.paid = 0
                     )",
                )
                .bind(comment)
                .bind(order_id.0)
                .bind(item_name)
                .bind(login)
                .execute(&self.pool)
                .await?
            }
        };
        Ok(changed.rows_affected())
    }

    /// Sum of the unit prices recorded on an order's lines.
    pub async fn line_total(&self, order_id: OrderId) -> Result<Money> {
        let cents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(unit_price_cents), 0) FROM item_status WHERE order_id = ?",
        )
        .bind(order_id.0)
        .fetch_one(&self.pool)
        .await?;
        money(cents)
    }
}

async fn menu_guard(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    item_name: &str,
) -> Result<Option<GuardedEdit>> {
    let exists = sqlx::query("SELECT 1 FROM menu WHERE item_name = ?")
        .bind(item_name)
        .fetch_optional(&mut **tx)
        .await?;
    if exists.is_none() {
        return Ok(Some(GuardedEdit::UnknownItem));
    }

    let references: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM item_status WHERE item_name = ?")
            .bind(item_name)
            .fetch_one(&mut **tx)
            .await?;
    if references > 0 {
        return Ok(Some(GuardedEdit::InUse));
    }
    Ok(None)
}

async fn price_in_tx(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    item_name: &str,
) -> Result<Option<Money>> {
    let row = sqlx::query("SELECT price_cents FROM menu WHERE item_name = ?")
        .bind(item_name)
        .fetch_optional(&mut **tx)
        .await?;
    row.map(|r| money(r.get::<i64, _>(0))).transpose()
}

async fn insert_line(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    order_id: OrderId,
    item_name: &str,
    unit_price: Money,
    comment: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO item_status (order_id, item_name, unit_price_cents, last_updated, status, comments)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(order_id.0)
    .bind(item_name)
    .bind(unit_price.cents())
    .bind(now)
    .bind(ItemStatus::NotStarted.as_str())
    .bind(comment)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn money(cents: i64) -> Result<Money> {
    Money::from_cents(cents).ok_or_else(|| anyhow!("stored amount {cents} is negative"))
}

fn decode_role(raw: &str) -> Result<Role> {
    raw.parse::<Role>()
        .with_context(|| format!("stored role '{raw}' is not recognized"))
}

fn user_from_row(row: &SqliteRow) -> Result<StoredUser> {
    Ok(StoredUser {
        login: row.get::<String, _>(0),
        phone: row.get::<String, _>(1),
        favorite_items: row.get::<String, _>(2),
        role: decode_role(&row.get::<String, _>(3))?,
    })
}

fn menu_item_from_row(row: &SqliteRow) -> Result<StoredMenuItem> {
    Ok(StoredMenuItem {
        item_name: row.get::<String, _>(0),
        item_type: row.get::<String, _>(1),
        price: money(row.get::<i64, _>(2))?,
        description: row.get::<String, _>(3),
        image_url: row.get::<String, _>(4),
    })
}

fn order_from_row(row: &SqliteRow) -> Result<StoredOrder> {
    Ok(StoredOrder {
        order_id: OrderId(row.get::<i64, _>(0)),
        login: row.get::<String, _>(1),
        paid: row.get::<bool, _>(2),
        received_at: row.get::<DateTime<Utc>, _>(3),
        total: money(row.get::<i64, _>(4))?,
    })
}

fn line_from_row(row: &SqliteRow) -> Result<StoredLine> {
    Ok(StoredLine {
        order_id: OrderId(row.get::<i64, _>(0)),
        item_name: row.get::<String, _>(1),
        unit_price: money(row.get::<i64, _>(2))?,
        last_updated: row.get::<DateTime<Utc>, _>(3),
        status: ItemStatus::from(row.get::<String, _>(4)),
        comments: row.get::<String, _>(5),
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

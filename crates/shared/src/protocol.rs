//! Records handed across the boundary to whatever renders them. Each summary
//! can flatten itself into an ordered field sequence for tabular output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ItemStatus, Money, OrderId, Role};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMenuItem {
    pub item_name: String,
    pub item_type: String,
    pub price: Money,
    pub description: String,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItemSummary {
    pub item_name: String,
    pub item_type: String,
    pub price: Money,
    pub description: String,
    pub image_url: String,
}

impl MenuItemSummary {
    pub fn fields(&self) -> Vec<String> {
        vec![
            self.item_name.clone(),
            self.item_type.clone(),
            self.price.to_string(),
            self.description.clone(),
            self.image_url.clone(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub login: String,
    pub paid: bool,
    pub received_at: DateTime<Utc>,
    pub total: Money,
}

impl OrderSummary {
    pub fn fields(&self) -> Vec<String> {
        vec![
            self.order_id.to_string(),
            self.login.clone(),
            self.paid.to_string(),
            self.received_at.to_rfc3339(),
            self.total.to_string(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemLineSummary {
    pub order_id: OrderId,
    pub item_name: String,
    pub unit_price: Money,
    pub last_updated: DateTime<Utc>,
    pub status: ItemStatus,
    pub comments: String,
}

impl ItemLineSummary {
    pub fn fields(&self) -> Vec<String> {
        vec![
            self.order_id.to_string(),
            self.item_name.clone(),
            self.unit_price.to_string(),
            self.last_updated.to_rfc3339(),
            self.status.to_string(),
            self.comments.clone(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineStatus {
    pub item_name: String,
    pub status: ItemStatus,
}

impl LineStatus {
    pub fn fields(&self) -> Vec<String> {
        vec![self.item_name.clone(), self.status.to_string()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetail {
    pub order: OrderSummary,
    pub lines: Vec<ItemLineSummary>,
}

/// A user as shown back to people; the password never leaves the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub login: String,
    pub phone: String,
    pub favorite_items: String,
    pub role: Role,
}

impl UserProfile {
    pub fn fields(&self) -> Vec<String> {
        vec![
            self.login.clone(),
            self.phone.clone(),
            self.favorite_items.clone(),
            self.role.to_string(),
        ]
    }
}

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(OrderId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Customer,
    Employee,
    Manager,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized role '{0}'")]
pub struct RoleParseError(pub String);

impl Role {
    pub const ALL: [Role; 3] = [Role::Customer, Role::Employee, Role::Manager];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Customer => "Customer",
            Role::Employee => "Employee",
            Role::Manager => "Manager",
        }
    }

    /// Employees and managers work the counter.
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Employee | Role::Manager)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RoleParseError;

    /// Surrounding whitespace and letter case are not significant, so a stored
    /// `"Manager "` resolves to [`Role::Manager`] instead of falling through.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| RoleParseError(raw.to_string()))
    }
}

/// A non-negative amount of money held as whole cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Money(i64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyParseError {
    #[error("amount is empty")]
    Empty,
    #[error("amount '{0}' is negative")]
    Negative(String),
    #[error("amount '{0}' has more than two decimal places")]
    TooPrecise(String),
    #[error("amount '{0}' is not a number")]
    Malformed(String),
    #[error("amount '{0}' is too large")]
    Overflow(String),
}

impl Money {
    pub fn from_cents(cents: i64) -> Option<Self> {
        (cents >= 0).then_some(Self(cents))
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for Money {
    type Err = MoneyParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(MoneyParseError::Empty);
        }
        if trimmed.starts_with('-') {
            return Err(MoneyParseError::Negative(raw.to_string()));
        }

        let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
        if fraction.len() > 2 {
            return Err(MoneyParseError::TooPrecise(raw.to_string()));
        }
        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty()) || !all_digits(whole) || !all_digits(fraction)
        {
            return Err(MoneyParseError::Malformed(raw.to_string()));
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| MoneyParseError::Overflow(raw.to_string()))?
        };
        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().unwrap_or_default() * 10,
            _ => fraction.parse::<i64>().unwrap_or_default(),
        };

        whole
            .checked_mul(100)
            .and_then(|cents| cents.checked_add(fraction))
            .map(Money)
            .ok_or_else(|| MoneyParseError::Overflow(raw.to_string()))
    }
}

impl From<Money> for String {
    fn from(value: Money) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Money {
    type Error = MoneyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Preparation state of one line. Staff may write any text; the three named
/// states are the usual progression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ItemStatus {
    NotStarted,
    InProgress,
    Completed,
    Other(String),
}

impl ItemStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ItemStatus::NotStarted => "NotStarted",
            ItemStatus::InProgress => "InProgress",
            ItemStatus::Completed => "Completed",
            ItemStatus::Other(text) => text,
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ItemStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "NotStarted" => ItemStatus::NotStarted,
            "InProgress" => ItemStatus::InProgress,
            "Completed" => ItemStatus::Completed,
            _ => ItemStatus::Other(value),
        }
    }
}

impl From<&str> for ItemStatus {
    fn from(value: &str) -> Self {
        ItemStatus::from(value.to_string())
    }
}

impl From<ItemStatus> for String {
    fn from(value: ItemStatus) -> Self {
        match value {
            ItemStatus::Other(text) => text,
            known => known.as_str().to_string(),
        }
    }
}

/// Editable columns of a menu item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuField {
    Name,
    Type,
    Price,
    Description,
    ImageUrl,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized menu field '{0}'")]
pub struct MenuFieldParseError(pub String);

impl FromStr for MenuField {
    type Err = MenuFieldParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "name" | "itemname" | "item_name" => Ok(MenuField::Name),
            "type" => Ok(MenuField::Type),
            "price" => Ok(MenuField::Price),
            "description" => Ok(MenuField::Description),
            "url" | "imageurl" | "image_url" => Ok(MenuField::ImageUrl),
            _ => Err(MenuFieldParseError(raw.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_ignores_case_and_padding() {
        assert_eq!("Manager ".parse::<Role>(), Ok(Role::Manager));
        assert_eq!("employee".parse::<Role>(), Ok(Role::Employee));
        assert!("Chef".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn money_accepts_common_price_spellings() {
        assert_eq!("3.50".parse::<Money>().map(Money::cents), Ok(350));
        assert_eq!("3.5".parse::<Money>().map(Money::cents), Ok(350));
        assert_eq!("3".parse::<Money>().map(Money::cents), Ok(300));
        assert_eq!(".25".parse::<Money>().map(Money::cents), Ok(25));
        assert_eq!(Money::from_cents(575).map(|m| m.to_string()), Some("5.75".into()));
    }

    #[test]
    fn money_rejects_negative_and_sub_cent_amounts() {
        assert!(matches!("-1".parse::<Money>(), Err(MoneyParseError::Negative(_))));
        assert!(matches!("1.005".parse::<Money>(), Err(MoneyParseError::TooPrecise(_))));
        assert!(matches!("abc".parse::<Money>(), Err(MoneyParseError::Malformed(_))));
        assert!(matches!(".".parse::<Money>(), Err(MoneyParseError::Malformed(_))));
        assert_eq!(Money::from_cents(-5), None);
    }

    #[test]
    fn money_serializes_as_decimal_string() {
        let json = serde_json::to_string(&Money::from_cents(225)).expect("json");
        assert_eq!(json, "\"2.25\"");
    }

    #[test]
    fn free_form_status_round_trips_through_text() {
        assert_eq!(ItemStatus::from("InProgress"), ItemStatus::InProgress);
        let custom = ItemStatus::from("waiting on milk");
        assert_eq!(custom.as_str(), "waiting on milk");
    }
}

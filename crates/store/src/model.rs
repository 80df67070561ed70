//! Records persisted by the stores.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, ItemId, Money, TransactionId, Version};

/// A catalog item offered by a seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    #[serde(rename = "priceCents")]
    pub price: Money,
    /// Units currently available; unsigned, so it can never go negative.
    pub stock: u32,
    pub description: String,
    pub image: String,
    pub seller_id: AccountId,
    pub created_at: DateTime<Utc>,
    /// Bumped by every successful write; conditional writes compare against it.
    pub version: Version,
}

/// Fields for a new catalog item. The store assigns id, timestamp and version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub title: String,
    pub price: Money,
    pub stock: u32,
    pub description: String,
    pub image: String,
    pub seller_id: AccountId,
}

impl NewItem {
    /// Builds the stored record for this item.
    pub(crate) fn into_item(self, id: ItemId, created_at: DateTime<Utc>) -> Item {
        Item {
            id,
            title: self.title,
            price: self.price,
            stock: self.stock,
            description: self.description,
            image: self.image,
            seller_id: self.seller_id,
            created_at,
            version: Version::first(),
        }
    }
}

/// Quantity actually reserved per item for one order.
///
/// Items that could not be fulfilled at all are never present; a key is
/// only inserted with a positive quantity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FulfillmentMap(BTreeMap<ItemId, u32>);

impl FulfillmentMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `quantity` more units for `item_id`. Zero quantities are ignored.
    pub fn add(&mut self, item_id: ItemId, quantity: u32) {
        if quantity == 0 {
            return;
        }
        let entry = self.0.entry(item_id).or_insert(0);
        *entry = entry.saturating_add(quantity);
    }

    /// Returns the fulfilled quantity for an item, if any.
    pub fn get(&self, item_id: &ItemId) -> Option<u32> {
        self.0.get(item_id).copied()
    }

    pub fn contains(&self, item_id: &ItemId) -> bool {
        self.0.contains_key(item_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over `(item, quantity)` pairs in item id order.
    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, &u32)> {
        self.0.iter()
    }

    /// Total number of units across all items.
    pub fn total_units(&self) -> u64 {
        self.0.values().map(|q| u64::from(*q)).sum()
    }
}

impl FromIterator<(ItemId, u32)> for FulfillmentMap {
    fn from_iter<I: IntoIterator<Item = (ItemId, u32)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (item_id, quantity) in iter {
            map.add(item_id, quantity);
        }
        map
    }
}

/// Lifecycle status of a transaction. Orders are only ever placed, so
/// there is a single status until fulfilment exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Every new transaction starts here.
    #[default]
    Processing,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Processing => "Processing",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Processing" => Ok(TransactionStatus::Processing),
            other => Err(format!("unknown transaction status: {other}")),
        }
    }
}

/// A placed order: what was actually reserved, for whom, and where it goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub items: FulfillmentMap,
    pub date: DateTime<Utc>,
    pub status: TransactionStatus,
    pub address: String,
    pub user_id: AccountId,
}

/// Fields for a new transaction. The store assigns the id; status starts at `Processing`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub items: FulfillmentMap,
    pub date: DateTime<Utc>,
    pub address: String,
    pub user_id: AccountId,
}

impl NewTransaction {
    pub(crate) fn into_transaction(self, id: TransactionId) -> Transaction {
        Transaction {
            id,
            items: self.items,
            date: self.date,
            status: TransactionStatus::default(),
            address: self.address,
            user_id: self.user_id,
        }
    }
}

/// A marketplace account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub address: Option<String>,
    /// Present while the account is logged in.
    #[serde(skip_serializing)]
    pub session_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub address: Option<String>,
    pub session_token: Option<String>,
}

impl NewAccount {
    pub(crate) fn into_account(self, id: AccountId, created_at: DateTime<Utc>) -> Account {
        Account {
            id,
            email: self.email,
            password_hash: self.password_hash,
            address: self.address,
            session_token: self.session_token,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fulfillment_map_skips_zero_quantities() {
        let mut map = FulfillmentMap::new();
        let item = ItemId::new();
        map.add(item, 0);
        assert!(map.is_empty());
        assert!(!map.contains(&item));
    }

    #[test]
    fn fulfillment_map_sums_repeated_items() {
        let item = ItemId::new();
        let map: FulfillmentMap = [(item, 2), (item, 3)].into_iter().collect();
        assert_eq!(map.get(&item), Some(5));
        assert_eq!(map.len(), 1);
        assert_eq!(map.total_units(), 5);
    }

    #[test]
    fn fulfillment_map_serializes_as_object() {
        let item = ItemId::new();
        let map: FulfillmentMap = [(item, 3)].into_iter().collect();
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json[item.to_string()], 3);
        assert_eq!(json.as_object().unwrap().len(), 1);

        let back: FulfillmentMap = serde_json::from_value(json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn transaction_uses_wire_field_names() {
        let tx = NewTransaction {
            items: FulfillmentMap::new(),
            date: Utc::now(),
            address: "1 Main St".to_string(),
            user_id: AccountId::new(),
        }
        .into_transaction(TransactionId::new());

        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["status"], "Processing");
        assert_eq!(json["userId"], tx.user_id.to_string());
        assert!(json.get("user_id").is_none());
    }

    #[test]
    fn account_never_serializes_secrets() {
        let account = NewAccount {
            email: "a@b.io".to_string(),
            password_hash: "hash".to_string(),
            address: None,
            session_token: Some("token".to_string()),
        }
        .into_account(AccountId::new(), Utc::now());

        let json = serde_json::to_value(&account).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("sessionToken").is_none());
        assert_eq!(json["email"], "a@b.io");
    }

    #[test]
    fn status_round_trips_through_text() {
        let status = TransactionStatus::default();
        assert_eq!(status.as_str().parse::<TransactionStatus>(), Ok(status));
        assert!("Shipped".parse::<TransactionStatus>().is_err());
    }
}

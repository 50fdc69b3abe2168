//! Persistence gateway
//!
//! The jobs only read instrument and user records and write price updates
//! and balance snapshots. Storage itself lives behind [`PersistenceGateway`];
//! [`InMemoryStore`] backs the binary and the integration tests.

use crate::error::{Result, SchedulerError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A tracked instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    pub symbol: String,
    pub current_price: f64,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>, current_price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            current_price,
        }
    }
}

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// A user account, keyed by wallet address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub wallet_address: String,
    pub role: Role,
}

impl User {
    pub fn new(wallet_address: impl Into<String>) -> Self {
        Self {
            wallet_address: wallet_address.into(),
            role: Role::User,
        }
    }
}

/// Balance owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub id: u64,
    pub user_wallet_address: String,
    pub amount: f64,
}

/// Point-in-time copy of a balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSnapshot {
    pub balance_id: u64,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
}

/// Storage used by the recurring jobs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Every tracked instrument
    async fn list_instruments(&self) -> Result<Vec<Instrument>>;

    /// Overwrite the current price of `symbol`
    async fn update_instrument_price(&self, symbol: &str, price: f64) -> Result<()>;

    /// Start tracking an instrument, or refresh its price if already tracked
    async fn add_instrument(&self, instrument: Instrument) -> Result<()>;

    /// Every user account
    async fn list_users(&self) -> Result<Vec<User>>;

    /// Balance of the user with `wallet_address`, if one exists
    async fn get_balance(&self, wallet_address: &str) -> Result<Option<Balance>>;

    /// Persist a snapshot of `amount` for `balance_id`
    async fn record_balance_snapshot(&self, balance_id: u64, amount: f64)
    -> Result<BalanceSnapshot>;
}

#[derive(Debug, Default)]
struct Tables {
    instruments: Vec<Instrument>,
    users: Vec<User>,
    balances: HashMap<String, Balance>,
    snapshots: Vec<BalanceSnapshot>,
    next_balance_id: u64,
}

/// Process-local [`PersistenceGateway`]
///
/// Instruments are kept in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user, optionally with an opening balance
    pub async fn add_user(&self, user: User, balance: Option<f64>) {
        let mut tables = self.tables.write().await;
        if let Some(amount) = balance {
            tables.next_balance_id += 1;
            let balance = Balance {
                id: tables.next_balance_id,
                user_wallet_address: user.wallet_address.clone(),
                amount,
            };
            tables.balances.insert(user.wallet_address.clone(), balance);
        }
        tables.users.push(user);
    }

    /// Snapshots recorded so far, oldest first
    pub async fn snapshots(&self) -> Vec<BalanceSnapshot> {
        self.tables.read().await.snapshots.clone()
    }

    /// Current record for `symbol`
    pub async fn instrument(&self, symbol: &str) -> Option<Instrument> {
        self.tables
            .read()
            .await
            .instruments
            .iter()
            .find(|instrument| instrument.symbol == symbol)
            .cloned()
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryStore {
    async fn list_instruments(&self) -> Result<Vec<Instrument>> {
        Ok(self.tables.read().await.instruments.clone())
    }

    async fn update_instrument_price(&self, symbol: &str, price: f64) -> Result<()> {
        let mut tables = self.tables.write().await;
        let instrument = tables
            .instruments
            .iter_mut()
            .find(|instrument| instrument.symbol == symbol)
            .ok_or_else(|| SchedulerError::Persistence(format!("unknown instrument {symbol}")))?;
        instrument.current_price = price;
        Ok(())
    }

    async fn add_instrument(&self, instrument: Instrument) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables
            .instruments
            .iter_mut()
            .find(|existing| existing.symbol == instrument.symbol)
        {
            Some(existing) => existing.current_price = instrument.current_price,
            None => tables.instruments.push(instrument),
        }
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.tables.read().await.users.clone())
    }

    async fn get_balance(&self, wallet_address: &str) -> Result<Option<Balance>> {
        Ok(self.tables.read().await.balances.get(wallet_address).cloned())
    }

    async fn record_balance_snapshot(
        &self,
        balance_id: u64,
        amount: f64,
    ) -> Result<BalanceSnapshot> {
        let snapshot = BalanceSnapshot {
            balance_id,
            amount,
            created_at: Utc::now(),
        };
        self.tables.write().await.snapshots.push(snapshot.clone());
        Ok(snapshot)
    }
}

//! TradeLogRecord: one flat ENTRY or EXIT row of the trade log.

use super::ids::PositionId;
use super::signal::Side;
use crate::position_management::{ExitType, Position};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    Entry,
    Exit,
}

/// Flat trade-log row. ENTRY rows leave the exit columns empty and EXIT rows
/// leave `size` empty, so the whole log exports as one CSV table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLogRecord {
    pub timestamp: DateTime<Utc>,
    pub strategy: String,
    pub action: TradeAction,
    pub side: Side,
    pub price: f64,
    pub position_id: PositionId,

    // ── Entry only ──
    pub size: Option<f64>,

    // ── Exit only ──
    pub entry_time: Option<DateTime<Utc>>,
    pub entry_price: Option<f64>,
    pub exit_type: Option<ExitType>,
    pub pnl: Option<f64>,
    pub r_multiple: Option<f64>,
}

impl TradeLogRecord {
    pub fn entry(position: &Position) -> Self {
        Self {
            timestamp: position.entry_time,
            strategy: position.strategy_name.clone(),
            action: TradeAction::Entry,
            side: position.side,
            price: position.entry_price,
            position_id: position.id,
            size: Some(position.initial_size),
            entry_time: None,
            entry_price: None,
            exit_type: None,
            pnl: None,
            r_multiple: None,
        }
    }

    /// Exit row for a closed position. Returns `None` while it is still open.
    pub fn exit(position: &Position) -> Option<Self> {
        let timestamp = position.exit_time?;
        let price = position.exit_price?;
        Some(Self {
            timestamp,
            strategy: position.strategy_name.clone(),
            action: TradeAction::Exit,
            side: position.side,
            price,
            position_id: position.id,
            size: None,
            entry_time: Some(position.entry_time),
            entry_price: Some(position.entry_price),
            exit_type: position.exit_type,
            pnl: Some(position.realized_pnl()),
            r_multiple: Some(position.r_multiple()),
        })
    }

    pub fn is_entry(&self) -> bool {
        self.action == TradeAction::Entry
    }
}

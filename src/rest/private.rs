//! Private REST API endpoints (authentication required).
//!
//! These endpoints require API credentials to be configured on the client.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::KrakenError;
use crate::rest::KrakenClient;
use crate::rest::endpoints::{DEFAULT_COST, private};

/// Request for trade balance.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TradeBalanceRequest {
    /// Base asset for calculations (default: ZUSD).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
}

/// Trade balance response.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeBalance {
    /// Equivalent balance (combined balance of all currencies).
    #[serde(rename = "eb")]
    pub equivalent_balance: Decimal,
    /// Trade balance (combined balance of all equity currencies).
    #[serde(rename = "tb")]
    pub trade_balance: Decimal,
    /// Margin amount of open positions.
    #[serde(rename = "m", default)]
    pub margin: Decimal,
    /// Unrealized net profit/loss of open positions.
    #[serde(rename = "n", default)]
    pub unrealized_pnl: Decimal,
    /// Equity = trade balance + unrealized net profit/loss.
    #[serde(rename = "e")]
    pub equity: Decimal,
    /// Free margin = equity - initial margin.
    #[serde(rename = "mf")]
    pub free_margin: Decimal,
    /// Margin level = (equity / initial margin) * 100.
    #[serde(rename = "ml", default)]
    pub margin_level: Option<Decimal>,
}

impl KrakenClient {
    /// Get account balance.
    ///
    /// Returns the balances of all assets in the account.
    pub async fn get_account_balance(&self) -> Result<HashMap<String, Decimal>, KrakenError> {
        self.query_private(private::BALANCE, &(), DEFAULT_COST)
            .await?
            .into_result()
    }

    /// Get trade balance.
    ///
    /// Returns margin account details including equity, margin, and P&L.
    pub async fn get_trade_balance(
        &self,
        request: &TradeBalanceRequest,
    ) -> Result<TradeBalance, KrakenError> {
        self.query_private(private::TRADE_BALANCE, request, DEFAULT_COST)
            .await?
            .into_result()
    }
}

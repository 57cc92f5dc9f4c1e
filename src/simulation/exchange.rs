use crate::core::error::ClearingError;
use crate::core::instrument::ClearingInstrument;
use crate::market::MarketClearingReport;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Last traded price of every listed stock.
///
/// An explicitly owned registry: whoever needs prices holds a reference
/// to the exchange; there is no process-wide instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockExchange {
    prices: BTreeMap<ClearingInstrument, f64>,
}

impl StockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn price(&self, stock: &ClearingInstrument) -> Option<f64> {
        self.prices.get(stock).copied()
    }

    /// List a stock or overwrite its price. Prices must be finite and
    /// positive.
    pub fn set_price(&mut self, stock: ClearingInstrument, price: f64) -> Result<(), ClearingError> {
        if !price.is_finite() || price <= 0.0 {
            return Err(ClearingError::NonFinite {
                what: "stock price",
                value: price,
            });
        }
        self.prices.insert(stock, price);
        Ok(())
    }

    pub fn listed(&self) -> impl Iterator<Item = &ClearingInstrument> {
        self.prices.keys()
    }

    /// Take over the clearing price of every listed stock that traded
    /// at a single rate in an accepted session. Returns how many prices
    /// changed.
    pub fn apply_clearing(&mut self, report: &MarketClearingReport) -> usize {
        if !report.accepted {
            return 0;
        }
        let mut updated = 0;
        for (stock, price) in self.prices.iter_mut() {
            if let Some(cleared) = report.rate_of(stock) {
                if cleared != *price && cleared.is_finite() && cleared > 0.0 {
                    info!("{}: price {:.6} -> {:.6}", stock, *price, cleared);
                    *price = cleared;
                    updated += 1;
                }
            }
        }
        updated
    }
}

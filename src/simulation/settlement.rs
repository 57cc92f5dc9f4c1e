use crate::core::error::{ensure_finite, ClearingError};
use crate::core::instrument::ClearingInstrument;
use crate::core::participant::NodeId;
use crate::core::result::{MixedClearingNetworkResult, ResourceExchangeDelegate};
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use uuid::Uuid;

/// How cash moves when an edge of an instrument settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementStyle {
    /// The buyer pays `units × rate` to the seller and receives the units.
    Stock,
    /// The lender (seller) advances `units` of cash to the borrower
    /// (buyer); the rate is recorded on the contract.
    Loan,
}

/// A settled trade between two participants.
///
/// Contracts are immutable once created. `buyer` is the party with the
/// positive volume (stock buyer, borrower), `seller` the one with the
/// negative volume (issuer, lender).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    id: Uuid,
    instrument: ClearingInstrument,
    buyer: NodeId,
    seller: NodeId,
    units: f64,
    rate: f64,
    /// Cash that moved between the two parties.
    cash: f64,
    created_at: DateTime<Utc>,
}

impl Contract {
    pub fn new(
        instrument: ClearingInstrument,
        buyer: NodeId,
        seller: NodeId,
        units: f64,
        rate: f64,
        cash: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            instrument,
            buyer,
            seller,
            units,
            rate,
            cash,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn instrument(&self) -> &ClearingInstrument {
        &self.instrument
    }

    pub fn buyer(&self) -> &NodeId {
        &self.buyer
    }

    pub fn seller(&self) -> &NodeId {
        &self.seller
    }

    pub fn units(&self) -> f64 {
        self.units
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Cash balances, instrument positions and the contracts that produced
/// them.
///
/// Positions are signed: a stock buyer holds `+units`, an issuer
/// `−units`; a borrower owes (`−units`), a lender is owed (`+units`).
/// Every settlement is a transfer between two parties, so the sums of
/// cash and of each instrument's positions never change.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SettlementLedger {
    cash: HashMap<NodeId, f64>,
    positions: HashMap<(NodeId, ClearingInstrument), f64>,
    contracts: Vec<Contract>,
}

impl SettlementLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit opening cash to a party.
    pub fn deposit(&mut self, party: impl Into<NodeId>, amount: f64) -> Result<(), ClearingError> {
        ensure_finite("deposit", amount)?;
        *self.cash.entry(party.into()).or_insert(0.0) += amount;
        Ok(())
    }

    pub fn cash(&self, party: &NodeId) -> f64 {
        self.cash.get(party).copied().unwrap_or(0.0)
    }

    pub fn position(&self, party: &NodeId, instrument: &ClearingInstrument) -> f64 {
        self.positions
            .get(&(party.clone(), instrument.clone()))
            .copied()
            .unwrap_or(0.0)
    }

    /// Cash held across every party.
    pub fn total_cash(&self) -> f64 {
        self.cash.values().sum()
    }

    /// Sum of every party's position in `instrument`.
    pub fn net_position(&self, instrument: &ClearingInstrument) -> f64 {
        self.positions
            .iter()
            .filter(|((_, i), _)| i == instrument)
            .map(|(_, v)| v)
            .sum()
    }

    pub fn contracts(&self) -> &[Contract] {
        &self.contracts
    }

    /// Settle one clearing result. Trades `min(demand, supply)` units;
    /// nothing happens when that is zero or the rate is not finite.
    pub fn settle(&mut self, result: &MixedClearingNetworkResult, style: SettlementStyle) -> Option<&Contract> {
        let units = result.matched_volume();
        if units <= 0.0 || !result.rate().is_finite() {
            return None;
        }
        let buyer = result.party_a().clone();
        let seller = result.party_b().clone();
        let instrument = result.instrument().clone();

        let cash = match style {
            SettlementStyle::Stock => {
                let cash = units * result.rate();
                self.transfer_cash(&buyer, &seller, cash);
                cash
            }
            SettlementStyle::Loan => {
                self.transfer_cash(&seller, &buyer, units);
                units
            }
        };
        let (buyer_sign, seller_sign) = match style {
            SettlementStyle::Stock => (1.0, -1.0),
            SettlementStyle::Loan => (-1.0, 1.0),
        };
        *self
            .positions
            .entry((buyer.clone(), instrument.clone()))
            .or_insert(0.0) += buyer_sign * units;
        *self
            .positions
            .entry((seller.clone(), instrument.clone()))
            .or_insert(0.0) += seller_sign * units;

        debug!(
            "settled {} {:.6e} units at {:.6e}: {} -> {}",
            instrument, units, result.rate(), seller, buyer
        );
        self.contracts
            .push(Contract::new(instrument, buyer, seller, units, result.rate(), cash));
        self.contracts.last()
    }

    fn transfer_cash(&mut self, from: &NodeId, to: &NodeId, amount: f64) {
        *self.cash.entry(from.clone()).or_insert(0.0) -= amount;
        *self.cash.entry(to.clone()).or_insert(0.0) += amount;
    }
}

/// Commit callback that settles each edge into a shared ledger.
pub struct SettlementDelegate {
    ledger: Rc<RefCell<SettlementLedger>>,
    style: SettlementStyle,
}

impl SettlementDelegate {
    pub fn new(ledger: Rc<RefCell<SettlementLedger>>, style: SettlementStyle) -> Self {
        Self { ledger, style }
    }

    pub fn stocks(ledger: Rc<RefCell<SettlementLedger>>) -> Self {
        Self::new(ledger, SettlementStyle::Stock)
    }

    pub fn loans(ledger: Rc<RefCell<SettlementLedger>>) -> Self {
        Self::new(ledger, SettlementStyle::Loan)
    }
}

impl ResourceExchangeDelegate for SettlementDelegate {
    fn commit(&self, result: &MixedClearingNetworkResult) {
        self.ledger.borrow_mut().settle(result, self.style);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn result(instrument: ClearingInstrument, rate: f64, demand: f64, supply: f64) -> MixedClearingNetworkResult {
        MixedClearingNetworkResult::new(
            instrument,
            NodeId::new("BUYER"),
            NodeId::new("SELLER"),
            rate,
            demand,
            supply,
        )
    }

    #[test]
    fn test_stock_settlement_moves_cash_to_seller() {
        let stock = ClearingInstrument::new("Stocks", "ACME");
        let mut ledger = SettlementLedger::new();
        ledger.deposit("BUYER", 100.0).unwrap();

        let contract = ledger.settle(&result(stock.clone(), 4.0, 10.0, 6.0), SettlementStyle::Stock);
        assert_eq!(contract.map(|c| c.units()), Some(6.0));

        let buyer = NodeId::new("BUYER");
        let seller = NodeId::new("SELLER");
        assert_relative_eq!(ledger.cash(&buyer), 76.0);
        assert_relative_eq!(ledger.cash(&seller), 24.0);
        assert_relative_eq!(ledger.position(&buyer, &stock), 6.0);
        assert_relative_eq!(ledger.position(&seller, &stock), -6.0);
        assert_relative_eq!(ledger.total_cash(), 100.0);
        assert_eq!(ledger.net_position(&stock), 0.0);
    }

    #[test]
    fn test_loan_settlement_moves_cash_to_borrower() {
        let loans = ClearingInstrument::new("Loans", "L");
        let mut ledger = SettlementLedger::new();
        ledger.deposit("SELLER", 50.0).unwrap();
        ledger.settle(&result(loans.clone(), 0.05, 20.0, 30.0), SettlementStyle::Loan);

        let borrower = NodeId::new("BUYER");
        assert_relative_eq!(ledger.cash(&borrower), 20.0);
        assert_relative_eq!(ledger.position(&borrower, &loans), -20.0);
        assert_relative_eq!(ledger.total_cash(), 50.0);
        assert_eq!(ledger.contracts()[0].rate(), 0.05);
    }

    #[test]
    fn test_zero_volume_creates_no_contract() {
        let mut ledger = SettlementLedger::new();
        let r = result(ClearingInstrument::new("Loans", "L"), 0.05, 0.0, 30.0);
        assert!(ledger.settle(&r, SettlementStyle::Loan).is_none());
        assert!(ledger.contracts().is_empty());
        assert!(ledger.deposit("X", f64::NAN).is_err());
    }

    #[test]
    fn test_delegate_writes_shared_ledger() {
        let ledger = Rc::new(RefCell::new(SettlementLedger::new()));
        let delegate = SettlementDelegate::stocks(ledger.clone());
        delegate.commit(&result(ClearingInstrument::new("Stocks", "ACME"), 2.0, 1.0, 1.0));
        assert_eq!(ledger.borrow().contracts().len(), 1);
    }
}

//! Reference participants: simple banks, firms, funds and investors
//! whose responses exercise every response-function flavour.

use crate::core::participant::{ClearingMarketParticipant, MarketOrder, OrderSide};
use crate::optimization::PortfolioSolver;
use crate::response::{
    BoundedLinearResponse, ExpIOCPartitionFunction, InverseExpIOCPartitionFunction, LegKind,
    PartitionedResponseFunction, PortfolioResponseFunction, ResponseFunction, UnbiasedPartitionFunction,
};

// Keeps stock demand finite at rates touching zero.
const MIN_PRICE: f64 = 1e-12;

/// Investor spending a fixed cash amount on shares: demand `target / price`.
#[derive(Debug, Clone, PartialEq)]
pub struct StockBuyer {
    name: String,
    target: f64,
}

impl StockBuyer {
    pub fn new(name: impl Into<String>, target: f64) -> Self {
        Self {
            name: name.into(),
            target: target.max(0.0),
        }
    }

    pub fn target(&self) -> f64 {
        self.target
    }
}

impl ClearingMarketParticipant for StockBuyer {
    fn unique_name(&self) -> String {
        self.name.clone()
    }

    fn market_response_function(&self, _orders: &[MarketOrder]) -> Box<dyn ResponseFunction> {
        let target = self.target;
        Box::new(PartitionedResponseFunction::new(
            UnbiasedPartitionFunction,
            move |price: f64| target / price.max(MIN_PRICE),
        ))
    }
}

/// Firm selling a fixed number of shares whatever the price.
#[derive(Debug, Clone, PartialEq)]
pub struct StockIssuer {
    name: String,
    shares: f64,
}

impl StockIssuer {
    pub fn new(name: impl Into<String>, shares: f64) -> Self {
        Self {
            name: name.into(),
            shares: shares.max(0.0),
        }
    }

    pub fn shares(&self) -> f64 {
        self.shares
    }
}

impl ClearingMarketParticipant for StockIssuer {
    fn unique_name(&self) -> String {
        self.name.clone()
    }

    fn market_response_function(&self, _orders: &[MarketOrder]) -> Box<dyn ResponseFunction> {
        let shares = self.shares;
        Box::new(PartitionedResponseFunction::new(
            UnbiasedPartitionFunction,
            move |_price: f64| -shares,
        ))
    }
}

/// Firm borrowing along a bounded linear demand curve, splitting its
/// demand towards the cheapest lenders.
#[derive(Debug, Clone, PartialEq)]
pub struct Borrower {
    name: String,
    curve: BoundedLinearResponse,
}

impl Borrower {
    pub fn new(name: impl Into<String>, pivot_rate: f64, sensitivity: f64, max_volume: f64) -> Self {
        Self {
            name: name.into(),
            curve: BoundedLinearResponse::demand(pivot_rate, sensitivity, max_volume),
        }
    }
}

impl ClearingMarketParticipant for Borrower {
    fn unique_name(&self) -> String {
        self.name.clone()
    }

    fn market_response_function(&self, _orders: &[MarketOrder]) -> Box<dyn ResponseFunction> {
        Box::new(PartitionedResponseFunction::new(
            InverseExpIOCPartitionFunction::default(),
            self.curve,
        ))
    }
}

/// Fund lending along a bounded linear supply curve, favouring the
/// best-paying borrowers.
#[derive(Debug, Clone, PartialEq)]
pub struct Lender {
    name: String,
    curve: BoundedLinearResponse,
}

impl Lender {
    pub fn new(name: impl Into<String>, pivot_rate: f64, sensitivity: f64, max_volume: f64) -> Self {
        Self {
            name: name.into(),
            curve: BoundedLinearResponse::supply(pivot_rate, sensitivity, max_volume),
        }
    }
}

impl ClearingMarketParticipant for Lender {
    fn unique_name(&self) -> String {
        self.name.clone()
    }

    fn market_response_function(&self, _orders: &[MarketOrder]) -> Box<dyn ResponseFunction> {
        Box::new(PartitionedResponseFunction::new(ExpIOCPartitionFunction::default(), self.curve))
    }
}

/// Bank funding its lending with borrowing, deciding both jointly by
/// portfolio return maximization.
///
/// Every instrument it sells (lends) becomes an asset leg, every one it
/// buys (borrows) a liability leg.
#[derive(Debug, Clone, PartialEq)]
pub struct IntermediaryBank {
    name: String,
    cash: f64,
    capital: f64,
    asset_impact: f64,
    liability_impact: f64,
    solver: PortfolioSolver,
}

impl IntermediaryBank {
    pub fn new(name: impl Into<String>, cash: f64, capital: f64, impact: f64) -> Self {
        Self {
            name: name.into(),
            cash,
            capital,
            asset_impact: impact,
            liability_impact: impact,
            solver: PortfolioSolver::default(),
        }
    }

    pub fn with_impacts(mut self, asset_impact: f64, liability_impact: f64) -> Self {
        self.asset_impact = asset_impact;
        self.liability_impact = liability_impact;
        self
    }

    pub fn with_solver(mut self, solver: PortfolioSolver) -> Self {
        self.solver = solver;
        self
    }
}

impl ClearingMarketParticipant for IntermediaryBank {
    fn unique_name(&self) -> String {
        self.name.clone()
    }

    fn market_response_function(&self, orders: &[MarketOrder]) -> Box<dyn ResponseFunction> {
        let response = orders.iter().fold(
            PortfolioResponseFunction::new(self.cash, self.capital, self.solver.optimizer()),
            |response, order| match order.side {
                OrderSide::Sell => response.with_leg(order.instrument.clone(), LegKind::Asset, self.asset_impact),
                OrderSide::Buy => {
                    response.with_leg(order.instrument.clone(), LegKind::Liability, self.liability_impact)
                }
            },
        );
        Box::new(response)
    }
}

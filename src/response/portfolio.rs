use crate::core::instrument::ClearingInstrument;
use crate::core::opportunity::TradeOpportunity;
use crate::optimization::{PortfolioOptimizer, PortfolioProblem, RateCurve};
use crate::response::function::ResponseFunction;
use log::warn;

/// Which side of the balance sheet an instrument sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegKind {
    /// Held for return: the participant lends or buys, so its volumes
    /// come out negative.
    Asset,
    /// Used for funding: the participant borrows, volumes positive.
    Liability,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioLeg {
    pub instrument: ClearingInstrument,
    pub kind: LegKind,
    /// Absolute market impact per unit of volume.
    pub impact: f64,
}

/// Response of an intermediary that decides all of its asset and
/// liability volumes jointly by maximizing portfolio return.
///
/// Every quoted opportunity becomes one variable of the portfolio
/// problem, with the quoted rate as the curve intercept and the leg's
/// market impact as its slope.
pub struct PortfolioResponseFunction {
    legs: Vec<PortfolioLeg>,
    cash: f64,
    capital: f64,
    optimizer: Box<dyn PortfolioOptimizer>,
}

impl PortfolioResponseFunction {
    pub fn new(cash: f64, capital: f64, optimizer: Box<dyn PortfolioOptimizer>) -> Self {
        Self {
            legs: Vec::new(),
            cash,
            capital,
            optimizer,
        }
    }

    pub fn with_leg(mut self, instrument: ClearingInstrument, kind: LegKind, impact: f64) -> Self {
        self.legs.push(PortfolioLeg {
            instrument,
            kind,
            impact: impact.abs(),
        });
        self
    }

    fn leg_for(&self, instrument: &ClearingInstrument) -> Option<&PortfolioLeg> {
        self.legs.iter().find(|leg| &leg.instrument == instrument)
    }
}

impl ResponseFunction for PortfolioResponseFunction {
    fn value(&self, query: &[usize], opportunities: &[TradeOpportunity<'_>]) -> Vec<f64> {
        let mut assets = Vec::new();
        let mut liabilities = Vec::new();
        // (kind, position within its side) per opportunity
        let mut slots = Vec::with_capacity(opportunities.len());
        for opportunity in opportunities {
            match self.leg_for(opportunity.instrument) {
                Some(leg) if leg.kind == LegKind::Asset => {
                    slots.push(Some((LegKind::Asset, assets.len())));
                    assets.push(RateCurve::new(-leg.impact, opportunity.rate));
                }
                Some(leg) => {
                    slots.push(Some((LegKind::Liability, liabilities.len())));
                    liabilities.push(RateCurve::new(leg.impact, opportunity.rate));
                }
                None => slots.push(None),
            }
        }

        let allocation = match PortfolioProblem::new(&assets, &liabilities, self.cash, self.capital) {
            Ok(problem) => self.optimizer.solve(&problem),
            Err(err) => {
                warn!("portfolio response falls back to zero volumes: {}", err);
                vec![0.0; assets.len() + liabilities.len()]
            }
        };

        query
            .iter()
            .map(|&i| match slots[i] {
                Some((LegKind::Asset, k)) => -allocation[k],
                Some((LegKind::Liability, k)) => allocation[assets.len() + k],
                None => 0.0,
            })
            .collect()
    }
}

//! Reference collaborators around the clearing core: settlement,
//! a price registry, simple participants and random sessions.

pub mod agents;
pub mod exchange;
pub mod settlement;

pub use agents::{Borrower, IntermediaryBank, Lender, StockBuyer, StockIssuer};
pub use exchange::StockExchange;
pub use settlement::{Contract, SettlementDelegate, SettlementLedger, SettlementStyle};
pub use stress_test::{loan_session, relay_session, stock_session, ClearingSession, SessionConfig};

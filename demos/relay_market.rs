//! Firms borrow from a bank that funds itself from a fund.
//!
//! The bank's portfolio decision ties the loan rate to the bond rate,
//! so the two instruments form one coupled component and clear together:
//! the firm borrows `100(0.3 − rL)`, the fund lends `100 rB`, and the
//! bank relays `(rL − rB) / 4e-3`. Equilibrium is `rL = 0.175`,
//! `rB = 0.125` with 12.5 units flowing through.

use mixed_clearing::core::error::ClearingError;
use mixed_clearing::prelude::*;
use mixed_clearing::simulation::{Borrower, IntermediaryBank, Lender, SettlementDelegate, SettlementLedger};
use std::cell::RefCell;
use std::rc::Rc;

fn main() -> Result<(), ClearingError> {
    println!("╔══════════════════════════════════════════╗");
    println!("║  mixed-clearing: Relay Market Example    ║");
    println!("╚══════════════════════════════════════════╝\n");

    let loans = ClearingInstrument::new("Loans", "Commercial Loan");
    let bonds = ClearingInstrument::new("Bonds", "Bank Bond");
    let ledger = Rc::new(RefCell::new(SettlementLedger::new()));
    ledger.borrow_mut().deposit("FUND", 1e3)?;

    let mut market = MixedNetworkMarket::new();
    for instrument in [&loans, &bonds] {
        market.add_instrument(
            instrument.clone(),
            Rc::new(SettlementDelegate::loans(ledger.clone())),
            SubnetworkKind::Heterogeneous,
        );
    }

    let bank = Rc::new(IntermediaryBank::new("BANK", 0.0, 1e3, 1e-3).with_solver(PortfolioSolver::Lcqp));
    market.add_buy_order(Rc::new(Borrower::new("FIRM", 0.3, 100.0, 1e3)), &loans)?;
    market.add_sell_order(bank.clone(), &loans)?;
    market.add_buy_order(bank, &bonds)?;
    market.add_sell_order(Rc::new(Lender::new("FUND", 0.0, 100.0, 1e3)), &bonds)?;

    let report = market.match_all_orders(200, 100, Box::new(TargetResidualOrMaximumIterations::new(1e-12, 100)))?;

    println!("Algorithm:  {}", report.algorithm);
    println!("Residual:   {:.3e}", report.residual);
    for instrument in [&loans, &bonds] {
        println!(
            "{:<26} rate {:.6}, volume {:.6}",
            instrument.to_string(),
            report.rate_of(instrument).unwrap_or(f64::NAN),
            report.matched_volume(instrument)
        );
    }

    println!("\n━━━ Cash ━━━\n");
    let ledger = ledger.borrow();
    for party in ["FIRM", "BANK", "FUND"] {
        println!("{:<6} {:>10.4}", party, ledger.cash(&NodeId::new(party)));
    }
    Ok(())
}

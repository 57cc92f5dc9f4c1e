//! A single stock cleared in a shared pool.
//!
//! Three investors with cash targets face two issuers with fixed share
//! counts. Every investor sees one price, so the pool clears where total
//! cash over total shares balances.

use mixed_clearing::core::error::ClearingError;
use mixed_clearing::prelude::*;
use mixed_clearing::simulation::{SettlementDelegate, SettlementLedger, StockBuyer, StockExchange, StockIssuer};
use std::cell::RefCell;
use std::rc::Rc;

fn main() -> Result<(), ClearingError> {
    println!("╔══════════════════════════════════════════╗");
    println!("║  mixed-clearing: Stock Pool Example      ║");
    println!("╚══════════════════════════════════════════╝\n");

    let stock = ClearingInstrument::new("Stocks", "ACME");
    let ledger = Rc::new(RefCell::new(SettlementLedger::new()));
    let mut exchange = StockExchange::new();
    exchange.set_price(stock.clone(), 10.0)?;

    let mut market = MixedNetworkMarket::new();
    market.add_instrument(
        stock.clone(),
        Rc::new(SettlementDelegate::stocks(ledger.clone())),
        SubnetworkKind::Homogeneous,
    );
    market.set_domain(stock.clone(), RateDomain::new(1e-3, 1e3)?);
    market.set_initial_rate(stock.clone(), 10.0);

    for (name, cash) in [("ALICE", 600.0), ("BOB", 300.0), ("CAROL", 100.0)] {
        ledger.borrow_mut().deposit(name, cash)?;
        market.add_buy_order(Rc::new(StockBuyer::new(name, cash)), &stock)?;
    }
    for (name, shares) in [("ACME-TREASURY", 30.0), ("FOUNDER", 10.0)] {
        market.add_sell_order(Rc::new(StockIssuer::new(name, shares)), &stock)?;
    }

    let before = ledger.borrow().total_cash();
    let report = market.match_all_orders(200, 100, Box::new(TargetResidualOrMaximumIterations::new(1e-12, 100)))?;
    exchange.apply_clearing(&report);

    println!("━━━ Clearing ━━━\n");
    println!("Algorithm:      {}", report.algorithm);
    println!("Residual:       {:.3e}", report.residual);
    println!("Price:          {:.6} (expected {:.6})", exchange.price(&stock).unwrap_or(f64::NAN), 1000.0 / 40.0);
    println!("Matched volume: {:.6} shares\n", report.matched_volume(&stock));

    println!("━━━ Contracts ━━━\n");
    let ledger = ledger.borrow();
    for contract in ledger.contracts() {
        println!(
            "{:>14} buys {:>9.4} from {:<14} for {:>9.4}",
            contract.buyer(),
            contract.units(),
            contract.seller(),
            contract.cash()
        );
    }
    println!("\nTotal cash: {:.6} -> {:.6}", before, ledger.total_cash());
    Ok(())
}

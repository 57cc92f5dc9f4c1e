use mixed_clearing::clearing::{
    AlgorithmKind, MarchClearingAlgorithm, OrderOrIterations, TargetResidualOrMaximumIterations,
};
use mixed_clearing::config::ClearingConfig;
use mixed_clearing::core::error::ClearingError;
use mixed_clearing::core::instrument::{ClearingInstrument, RateDomain};
use mixed_clearing::core::participant::NodeId;
use mixed_clearing::core::result::RecordingDelegate;
use mixed_clearing::graph::{MixedClearingNetwork, MixedClearingNetworkBuilder};
use mixed_clearing::market::{MixedNetworkMarket, SubnetworkKind};
use mixed_clearing::response::{
    BoundedLinearResponse, CurveResponse, ExpIOCPartitionFunction, InverseExpIOCPartitionFunction,
    PartitionedResponseFunction, ResponseFunction, StepResponseFunction, UnbiasedPartitionFunction,
};
use mixed_clearing::simulation::{
    loan_session, relay_session, stock_session, Borrower, IntermediaryBank, Lender, SessionConfig,
    SettlementDelegate, SettlementLedger, StockBuyer, StockIssuer,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::rc::Rc;

fn stopping(target: f64, passes: usize) -> Box<TargetResidualOrMaximumIterations> {
    Box::new(TargetResidualOrMaximumIterations::new(target, passes))
}

/// Every firm can borrow from every bank; unbiased splits keep each
/// pair's equilibrium at the midpoint of the two pivots.
fn heterogeneous_grid(firm_pivots: &[f64], bank_pivots: &[f64]) -> MixedClearingNetwork {
    grid(
        firm_pivots,
        bank_pivots,
        |curve| Box::new(PartitionedResponseFunction::new(UnbiasedPartitionFunction, curve)),
        |curve| Box::new(PartitionedResponseFunction::new(UnbiasedPartitionFunction, curve)),
    )
}

/// Firms steer towards cheap banks and banks towards well-paying firms,
/// so every pair's rate depends on all the others.
fn coupled_grid(firm_pivots: &[f64], bank_pivots: &[f64], sensitivity: f64) -> MixedClearingNetwork {
    grid(
        firm_pivots,
        bank_pivots,
        |curve| {
            Box::new(PartitionedResponseFunction::new(
                InverseExpIOCPartitionFunction::new(sensitivity),
                curve,
            ))
        },
        |curve| Box::new(PartitionedResponseFunction::new(ExpIOCPartitionFunction::new(sensitivity), curve)),
    )
}

fn grid(
    firm_pivots: &[f64],
    bank_pivots: &[f64],
    firm: impl Fn(BoundedLinearResponse) -> Box<dyn ResponseFunction>,
    bank: impl Fn(BoundedLinearResponse) -> Box<dyn ResponseFunction>,
) -> MixedClearingNetwork {
    let loans = ClearingInstrument::new("Loans", "Commercial Loan");
    let delegate = Rc::new(RecordingDelegate::new());
    let mut builder = MixedClearingNetworkBuilder::new();
    for (i, pivot) in firm_pivots.iter().enumerate() {
        let curve = BoundedLinearResponse::demand(*pivot, 100.0, 1e3);
        builder
            .add_network_node(None, firm(curve), format!("FIRM-{:03}", i))
            .unwrap();
    }
    for (j, pivot) in bank_pivots.iter().enumerate() {
        let curve = BoundedLinearResponse::supply(*pivot, 100.0, 1e3);
        builder
            .add_network_node(None, bank(curve), format!("BANK-{:03}", j))
            .unwrap();
    }
    for i in 0..firm_pivots.len() {
        for j in 0..bank_pivots.len() {
            builder
                .add_edge(
                    format!("FIRM-{:03}", i),
                    format!("BANK-{:03}", j),
                    delegate.clone(),
                    loans.clone(),
                )
                .unwrap();
        }
    }
    builder.build()
}

#[test]
fn smooth_heterogeneous_100x100_clears() {
    let mut rng = StdRng::seed_from_u64(11);
    let firms: Vec<f64> = (0..100).map(|_| rng.gen_range(0.2..0.4)).collect();
    let banks: Vec<f64> = (0..100).map(|_| rng.gen_range(0.0..0.1)).collect();
    let mut network = heterogeneous_grid(&firms, &banks);
    assert_eq!(network.variable_count(), 10_000);

    let algorithm = MarchClearingAlgorithm::ascending(100, 1e-12, stopping(1e-12, 20));
    let residual = network.apply_clearing_algorithm(&algorithm);
    assert!(residual < 1e-10, "residual {}", residual);

    // edge (firm 3, bank 7) is variable 3 * 100 + 7
    let expected = 0.5 * (firms[3] + banks[7]);
    assert!((network.rate(307) - expected).abs() < 1e-10);
}

#[test]
fn coupled_heterogeneous_grid_clears() {
    let mut rng = StdRng::seed_from_u64(23);
    let firms: Vec<f64> = (0..12).map(|_| rng.gen_range(0.2..0.3)).collect();
    let banks: Vec<f64> = (0..9).map(|_| rng.gen_range(0.0..0.1)).collect();
    let mut network = coupled_grid(&firms, &banks, 25.0);

    let algorithm = MarchClearingAlgorithm::ascending(100, 1e-12, stopping(1e-12, 2_000));
    let residual = network.apply_clearing_algorithm(&algorithm);
    assert!(residual < 1e-10, "residual {}", residual);
    assert!(network.residuals().iter().all(|r| r.abs() < 1e-10));

    // the splits really couple the pairs: rates leave the midpoints
    let off_midpoint = (0..firms.len())
        .flat_map(|i| (0..banks.len()).map(move |j| (i, j)))
        .map(|(i, j)| (network.rate(i * banks.len() + j) - 0.5 * (firms[i] + banks[j])).abs())
        .fold(0.0_f64, f64::max);
    assert!(off_midpoint > 1e-6);
}

#[test]
fn loan_session_residual_is_bounded() {
    let clearing = ClearingConfig {
        algorithm: Some(AlgorithmKind::AscendingMarch),
        network_iterations: 2_000,
        acceptance_threshold: Some(1e-10),
        ..ClearingConfig::default()
    };
    for seed in 0..3 {
        let config = SessionConfig {
            buyers: 12,
            sellers: 9,
            seed,
            ..SessionConfig::default()
        };
        let mut session = loan_session(&config, &clearing).unwrap();
        let report = session.clear(&clearing).unwrap();
        assert!(report.accepted, "seed {}: residual {}", seed, report.residual);
        assert!(report.residual < 1e-10, "seed {}: residual {}", seed, report.residual);
        assert!(!session.ledger.borrow().contracts().is_empty());
    }
}

#[test]
fn pool_settles_every_investor_at_its_cash_target() {
    let stock = ClearingInstrument::new("Stocks", "ACME");
    let ledger = Rc::new(RefCell::new(SettlementLedger::new()));
    let mut market = MixedNetworkMarket::new();
    market.add_instrument(
        stock.clone(),
        Rc::new(SettlementDelegate::stocks(ledger.clone())),
        SubnetworkKind::Homogeneous,
    );
    market.set_domain(stock.clone(), RateDomain::new(1e-3, 1e4).unwrap());
    market.set_initial_rate(stock.clone(), 4.0);
    for (name, cash) in [("B1", 100.0), ("B2", 300.0)] {
        ledger.borrow_mut().deposit(name, cash).unwrap();
        market.add_buy_order(Rc::new(StockBuyer::new(name, cash)), &stock).unwrap();
    }
    market
        .add_sell_order(Rc::new(StockIssuer::new("ISSUER", 40.0)), &stock)
        .unwrap();

    let report = market.match_all_orders(200, 100, stopping(1e-12, 100)).unwrap();
    assert!(report.accepted);
    let price = report.rate_of(&stock).unwrap();
    assert!((price - 10.0).abs() < 1e-9, "price {}", price);

    let ledger = ledger.borrow();
    let (b1, b2, issuer) = (NodeId::new("B1"), NodeId::new("B2"), NodeId::new("ISSUER"));
    assert!((ledger.position(&b1, &stock) - 10.0).abs() < 1e-9);
    assert!((ledger.position(&b2, &stock) - 30.0).abs() < 1e-9);
    assert!((ledger.position(&issuer, &stock) + 40.0).abs() < 1e-9);
    assert!(ledger.cash(&b1).abs() < 1e-8);
    assert!(ledger.cash(&b2).abs() < 1e-8);
    assert!((ledger.cash(&issuer) - 400.0).abs() < 1e-8);
    assert!((ledger.total_cash() - 400.0).abs() < 1e-9);
}

#[test]
fn smooth_homogeneous_100x100_clears() {
    let config = SessionConfig {
        buyers: 100,
        sellers: 100,
        seed: 5,
        ..SessionConfig::default()
    };
    let clearing = ClearingConfig::default();
    let mut session = stock_session(&config, &clearing).unwrap();
    let report = session.clear(&clearing).unwrap();
    assert_eq!(report.algorithm, "ascending-march");
    assert_eq!(report.rates.len(), 1);
    assert!(report.residual < 1e-10, "residual {}", report.residual);
}

#[test]
fn discontinuous_supply_clears_within_looser_bound() {
    let loans = ClearingInstrument::new("Loans", "L");
    let delegate = Rc::new(RecordingDelegate::new());
    let mut builder = MixedClearingNetworkBuilder::new();
    for i in 0..20 {
        let shift = 0.005 * i as f64;
        builder
            .add_network_node(
                None,
                Box::new(CurveResponse::new(BoundedLinearResponse::demand(0.3 + shift, 100.0, 1e3))),
                format!("FIRM-{}", i),
            )
            .unwrap();
        // extra supply switches on at 5%, below every equilibrium
        let supply = StepResponseFunction::new(CurveResponse::new(BoundedLinearResponse::supply(0.0, 100.0, 1e3)))
            .with_step(0.05, -2.0);
        builder
            .add_network_node(None, Box::new(supply), format!("BANK-{}", i))
            .unwrap();
        builder
            .add_edge(format!("FIRM-{}", i), format!("BANK-{}", i), delegate.clone(), loans.clone())
            .unwrap();
    }
    let mut network = builder.build();

    let algorithm = MarchClearingAlgorithm::alternating(100, 1e-12, stopping(1e-12, 20));
    let residual = network.apply_clearing_algorithm(&algorithm);
    assert!(residual < 1e-7, "residual {}", residual);
    // 100(0.3 − r) = 100 r + 2
    assert!((network.rate(0) - 0.14).abs() < 1e-9);
}

#[test]
fn relay_through_intermediary_clears() {
    let loans = ClearingInstrument::new("Loans", "Commercial Loan");
    let bonds = ClearingInstrument::new("Bonds", "Bank Bond");
    let delegate = Rc::new(RecordingDelegate::new());
    let mut market = MixedNetworkMarket::new();
    market.add_instrument(loans.clone(), delegate.clone(), SubnetworkKind::Heterogeneous);
    market.add_instrument(bonds.clone(), delegate.clone(), SubnetworkKind::Heterogeneous);

    let bank = Rc::new(IntermediaryBank::new("BANK", 0.0, 1e3, 1e-3));
    market
        .add_buy_order(Rc::new(Borrower::new("FIRM", 0.3, 100.0, 1e3)), &loans)
        .unwrap();
    market.add_sell_order(bank.clone(), &loans).unwrap();
    market.add_buy_order(bank, &bonds).unwrap();
    market
        .add_sell_order(Rc::new(Lender::new("FUND", 0.0, 100.0, 1e3)), &bonds)
        .unwrap();

    let report = market.match_all_orders(200, 100, stopping(1e-12, 100)).unwrap();
    assert_eq!(report.algorithm, "levenberg-marquardt");
    assert!(report.residual < 1e-9, "residual {}", report.residual);

    // firm: 100(0.3 − rL) = x, fund: 100 rB = x, bank: x = (rL − rB) / 4e-3
    let loan_rate = report.rate_of(&loans).unwrap();
    let bond_rate = report.rate_of(&bonds).unwrap();
    assert!((loan_rate - 0.175).abs() < 1e-6, "loan rate {}", loan_rate);
    assert!((bond_rate - 0.125).abs() < 1e-6, "bond rate {}", bond_rate);
    assert_eq!(delegate.commit_count(), 2);
    assert!((report.matched_volume(&loans) - 12.5).abs() < 1e-4);
}

#[test]
fn conservation_of_cash_across_sessions() {
    let clearing = ClearingConfig::default();
    for seed in 0..5 {
        let config = SessionConfig {
            buyers: 8,
            sellers: 6,
            seed,
            ..SessionConfig::default()
        };
        for build in [stock_session, loan_session, relay_session] {
            let mut session = build(&config, &clearing).unwrap();
            let before = session.total_cash();
            let report = session.clear(&clearing).unwrap();
            let after = session.total_cash();
            assert!(report.accepted);
            assert!(
                (before - after).abs() <= before.abs().max(after.abs()) * 1e-10,
                "seed {}: {} -> {}",
                seed,
                before,
                after
            );
            let ledger = session.ledger.borrow();
            for instrument in &session.instruments {
                assert!(ledger.net_position(instrument).abs() < 1e-9);
            }
        }
    }
}

#[test]
fn price_discovery_moves_the_stock_price() {
    let clearing = ClearingConfig::default();
    for seed in 0..10 {
        let config = SessionConfig {
            seed,
            ..SessionConfig::default()
        };
        let mut session = stock_session(&config, &clearing).unwrap();
        let stock = session.instruments[0].clone();
        let before = session.exchange.price(&stock).unwrap();
        session.clear(&clearing).unwrap();
        let after = session.exchange.price(&stock).unwrap();
        assert!((after - before).abs() > 1e-6, "seed {}: price stuck at {}", seed, before);

        // the pool traded
        let spent: f64 = session
            .ledger
            .borrow()
            .contracts()
            .iter()
            .map(|c| c.cash())
            .sum();
        assert!(spent > 0.0);
    }
}

#[test]
fn hyperedge_commits_every_member_once_in_order() {
    let stock = ClearingInstrument::new("Stocks", "ACME");
    let delegate = Rc::new(RecordingDelegate::new());
    let mut builder = MixedClearingNetworkBuilder::new();
    for name in ["B1", "B2", "B3"] {
        builder
            .add_network_node(
                None,
                Box::new(PartitionedResponseFunction::new(
                    UnbiasedPartitionFunction,
                    BoundedLinearResponse::demand(0.6, 10.0, 1e3),
                )),
                name,
            )
            .unwrap();
    }
    for name in ["S1", "S2"] {
        builder
            .add_network_node(
                None,
                Box::new(PartitionedResponseFunction::new(
                    UnbiasedPartitionFunction,
                    BoundedLinearResponse::supply(0.1, 10.0, 1e3),
                )),
                name,
            )
            .unwrap();
    }
    builder.add_hyper_edge(stock.id()).unwrap();
    for buyer in ["B1", "B2", "B3"] {
        for seller in ["S1", "S2"] {
            builder
                .add_to_hyper_edge(buyer, seller, delegate.clone(), &stock.id(), stock.clone())
                .unwrap();
        }
    }
    let mut network = builder.build();
    assert_eq!(network.variable_count(), 1);
    assert_eq!(network.edge_count(), 6);

    let residual = network.apply_clearing_algorithm(&MarchClearingAlgorithm::ascending(
        100,
        1e-12,
        stopping(1e-12, 10),
    ));
    assert!(residual <= 1e-12);
    // 3 · 10(0.6 − p) = 2 · 10(p − 0.1)
    let rate = network.rate(0);
    assert!((rate - 0.4).abs() < 1e-12);

    let results = network.create_contracts().unwrap();
    assert_eq!(delegate.commit_count(), 6);
    let committed = delegate.results();
    assert_eq!(committed, results);
    let order: Vec<(&str, &str)> = committed
        .iter()
        .map(|r| (r.party_a().as_str(), r.party_b().as_str()))
        .collect();
    assert_eq!(
        order,
        vec![("B1", "S1"), ("B1", "S2"), ("B2", "S1"), ("B2", "S2"), ("B3", "S1"), ("B3", "S2")]
    );
    assert!(committed.iter().all(|r| r.rate() == rate));
}

#[test]
fn contracts_require_a_clearing_pass() {
    let network = heterogeneous_grid(&[0.3], &[0.1]);
    assert!(matches!(network.create_contracts(), Err(ClearingError::NotCleared)));
}

#[test]
fn rejected_session_leaves_ledger_untouched() {
    let ledger = Rc::new(RefCell::new(SettlementLedger::new()));
    ledger.borrow_mut().deposit("FUND", 1e3).unwrap();
    let loans = ClearingInstrument::new("Loans", "L");
    let mut market = MixedNetworkMarket::new().with_acceptance_threshold(1e-12);
    market.add_instrument(
        loans.clone(),
        Rc::new(SettlementDelegate::loans(ledger.clone())),
        SubnetworkKind::Heterogeneous,
    );
    market
        .add_buy_order(Rc::new(Borrower::new("FIRM", 0.3, 100.0, 1e3)), &loans)
        .unwrap();
    market
        .add_sell_order(Rc::new(Lender::new("FUND", 0.0, 100.0, 1e3)), &loans)
        .unwrap();

    // no pass runs, so the residual stays at its starting value
    let report = market
        .match_all_orders(100, 10, Box::new(OrderOrIterations::new(0, 10)))
        .unwrap();
    assert!(!report.accepted);
    assert!(report.results.is_empty());
    assert!(ledger.borrow().contracts().is_empty());
    assert_eq!(ledger.borrow().total_cash(), 1e3);
}

//! Integration test for the canonical linear scenario: one region, one sector, one market,
//! three periods, linear demand `d(p) = 100 - p` against linear supply `s(p) = p`.
use float_cmp::assert_approx_eq;
use marketsim::commodity::{Commodity, CommodityMap, MarketKind};
use marketsim::model_time::ModelTime;
use marketsim::output::output_tree;
use marketsim::region::Region;
use marketsim::scenario::Scenario;
use marketsim::settings::SolverSettings;
use marketsim::solver::ConvergenceStatus;

fn commodities() -> CommodityMap {
    let elc = Commodity {
        id: "ELC".into(),
        description: "electricity".into(),
        kind: MarketKind::Solved,
    };
    std::iter::once((elc.id.clone(), elc)).collect()
}

fn linear_region() -> Region {
    toml::from_str(
        r#"
        id = "GBR"

        [[sectors]]
        id = "power"
        commodity_id = "ELC"

        [[sectors.subsectors]]
        id = "generation"
        weighting = {kind = "fixed"}

        [[sectors.subsectors.technologies]]
        id = "plant"
        production = {kind = "linear", intercept = 0.0, slope = 1.0}

        [[final_demands]]
        commodity_id = "ELC"
        function = {kind = "linear", base = 100.0, slope = 1.0}
        "#,
    )
    .unwrap()
}

#[test]
fn test_linear_scenario_clears_at_fifty() {
    let model_time = ModelTime::new(vec![2020, 2025, 2030]).unwrap();
    let settings = SolverSettings {
        tolerance: 1e-9,
        ..SolverSettings::default()
    };
    let mut scenario =
        Scenario::new(model_time, commodities(), vec![linear_region()], settings).unwrap();

    let summary = scenario.run().unwrap();
    assert!(summary.all_solved());
    assert_eq!(summary.periods.len(), 3);

    let region = "GBR".into();
    let commodity = "ELC".into();
    for period in scenario.model_time().periods() {
        assert_eq!(
            scenario.period_status(period),
            Some(ConvergenceStatus::Solved)
        );
        assert_approx_eq!(
            f64,
            scenario.price(&region, &commodity, period).unwrap(),
            50.0,
            epsilon = 1e-6
        );
        assert_approx_eq!(
            f64,
            scenario.supply(&region, &commodity, period).unwrap(),
            50.0,
            epsilon = 1e-6
        );
        assert_approx_eq!(
            f64,
            scenario.demand(&region, &commodity, period).unwrap(),
            50.0,
            epsilon = 1e-6
        );
    }
}

#[test]
fn test_supply_cap_binds_and_market_clears() {
    // With supply capped at 40, the market clears where demand meets the cap:
    // 100 - p = 40, so p = 60 rather than the uncapped 50
    let model_time = ModelTime::new(vec![2020]).unwrap();
    let settings = SolverSettings {
        tolerance: 1e-9,
        ..SolverSettings::default()
    };
    let mut region = linear_region();
    region.supply_caps.insert("ELC".into(), 40.0);

    let mut scenario = Scenario::new(model_time, commodities(), vec![region], settings).unwrap();
    let summary = scenario.run().unwrap();
    assert!(summary.all_solved());

    let region_id = "GBR".into();
    let commodity = "ELC".into();
    let period = scenario.model_time().periods().next().unwrap();
    assert_approx_eq!(
        f64,
        scenario.price(&region_id, &commodity, period).unwrap(),
        60.0,
        epsilon = 1e-6
    );
    assert_approx_eq!(
        f64,
        scenario.supply(&region_id, &commodity, period).unwrap(),
        40.0,
        epsilon = 1e-6
    );
    assert_approx_eq!(
        f64,
        scenario.demand(&region_id, &commodity, period).unwrap(),
        40.0,
        epsilon = 1e-6
    );

    // The recorded hierarchy outputs are scaled down with the cap, not just the
    // posted market supply
    let tree = output_tree(&scenario);
    assert_approx_eq!(f64, tree[0].outputs[0], 40.0, epsilon = 1e-6);
}

#[test]
fn test_demand_growth_raises_later_prices() {
    let model_time = ModelTime::new(vec![2020, 2025, 2030]).unwrap();
    let mut region = linear_region();
    region.final_demands[0].growth_rate = 0.1;

    let mut scenario = Scenario::new(
        model_time,
        commodities(),
        vec![region],
        SolverSettings::default(),
    )
    .unwrap();
    let summary = scenario.run().unwrap();
    assert!(summary.all_solved());

    let region_id = "GBR".into();
    let commodity = "ELC".into();
    let mut prices = scenario
        .model_time()
        .periods()
        .map(|period| scenario.price(&region_id, &commodity, period).unwrap());
    let first = prices.next().unwrap();
    assert!(prices.all(|price| price > first));
}

//! Integration tests for the engine's core properties: determinism, conservation across
//! aggregation levels, coupled-market convergence and non-convergence reporting.
use float_cmp::assert_approx_eq;
use itertools::Itertools;
use marketsim::commodity::{Commodity, CommodityMap, MarketKind};
use marketsim::model_time::ModelTime;
use marketsim::output::{market_records, output_tree, OutputLevel};
use marketsim::region::Region;
use marketsim::scenario::Scenario;
use marketsim::settings::SolverSettings;
use marketsim::solver::ConvergenceStatus;

fn commodity(id: &str, kind: MarketKind) -> (marketsim::commodity::CommodityID, Commodity) {
    let commodity = Commodity {
        id: id.into(),
        description: String::new(),
        kind,
    };
    (commodity.id.clone(), commodity)
}

fn two_commodity_map() -> CommodityMap {
    [
        commodity("ELC", MarketKind::Solved),
        commodity("GAS", MarketKind::Solved),
    ]
    .into_iter()
    .collect()
}

/// Electricity supplied by two competing technologies, one gas-fired; gas supplied by its own
/// sector and demanded by the gas-fired technology.
fn coupled_region() -> Region {
    toml::from_str(
        r#"
        id = "GBR"

        [[sectors]]
        id = "power"
        commodity_id = "ELC"

        [[sectors.subsectors]]
        id = "generation"
        weighting = {kind = "logit", exponent = 2.0}

        [[sectors.subsectors.technologies]]
        id = "gas-turbine"
        production = {kind = "linear", intercept = 0.0, slope = 1.0}
        non_energy_cost = 0.5
        input = {commodity_id = "GAS", intensity = 0.5}

        [[sectors.subsectors.technologies]]
        id = "wind"
        production = {kind = "linear", intercept = 0.0, slope = 1.0}
        non_energy_cost = 1.5

        [[sectors]]
        id = "gas-extraction"
        commodity_id = "GAS"

        [[sectors.subsectors]]
        id = "wells"
        weighting = {kind = "fixed"}

        [[sectors.subsectors.technologies]]
        id = "well"
        production = {kind = "linear", intercept = 0.0, slope = 2.0}

        [[final_demands]]
        commodity_id = "ELC"
        function = {kind = "linear", base = 100.0, slope = 1.0}
        "#,
    )
    .unwrap()
}

fn run_coupled() -> Scenario {
    let model_time = ModelTime::new(vec![2020, 2025, 2030]).unwrap();
    let mut scenario = Scenario::new(
        model_time,
        two_commodity_map(),
        vec![coupled_region()],
        SolverSettings::default(),
    )
    .unwrap();
    scenario.run().unwrap();
    scenario
}

#[test]
fn test_coupled_markets_clear() {
    let scenario = run_coupled();
    let region = "GBR".into();

    for period in scenario.model_time().periods() {
        assert_eq!(
            scenario.period_status(period),
            Some(ConvergenceStatus::Solved)
        );
        for commodity in ["ELC", "GAS"] {
            let supply = scenario.supply(&region, &commodity.into(), period).unwrap();
            let demand = scenario.demand(&region, &commodity.into(), period).unwrap();
            let scale = supply.abs().max(demand.abs()).max(1.0);
            assert!((supply - demand).abs() <= 1e-6 * scale);
        }
    }
}

#[test]
fn test_determinism_bit_identical_prices() {
    let first = run_coupled();
    let second = run_coupled();

    let first_records = market_records(&first);
    let second_records = market_records(&second);
    assert_eq!(first_records.len(), second_records.len());
    for (a, b) in first_records.iter().zip(&second_records) {
        assert_eq!(a.region_id, b.region_id);
        assert_eq!(a.commodity_id, b.commodity_id);
        assert_eq!(a.price.to_bits(), b.price.to_bits());
        assert_eq!(a.supply.to_bits(), b.supply.to_bits());
        assert_eq!(a.demand.to_bits(), b.demand.to_bits());
    }
}

#[test]
fn test_conservation_across_aggregation_levels() {
    let scenario = run_coupled();
    let tree = output_tree(&scenario);
    let region_node = &tree[0];

    for (index, period) in scenario.model_time().periods().enumerate() {
        for sector_node in region_node
            .children
            .iter()
            .filter(|node| node.level == OutputLevel::Sector)
        {
            // Sector output equals the sum over its subsectors, which equals the sum over
            // their technologies
            let technology_total: f64 = sector_node
                .children
                .iter()
                .flat_map(|subsector| &subsector.children)
                .map(|technology| technology.outputs[index])
                .sum();
            assert_approx_eq!(
                f64,
                sector_node.outputs[index],
                technology_total,
                epsilon = 1e-12
            );
        }

        // The committed market supply equals the producing sector's output
        let power_output = region_node
            .children
            .iter()
            .find(|node| node.name == "power")
            .unwrap()
            .outputs[index];
        let elc_supply = scenario
            .supply(&"GBR".into(), &"ELC".into(), period)
            .unwrap();
        assert_approx_eq!(f64, power_output, elc_supply, epsilon = 1e-12);
    }
}

#[test]
fn test_nonconvergence_is_flagged_and_run_continues() {
    // Perfectly inelastic supply and demand at disjoint levels: no price can clear
    let region: Region = toml::from_str(
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
        production = {kind = "fixed", level = 10.0}

        [[final_demands]]
        commodity_id = "ELC"
        function = {kind = "fixed", level = 20.0}
        "#,
    )
    .unwrap();

    let model_time = ModelTime::new(vec![2020, 2025, 2030]).unwrap();
    let settings = SolverSettings {
        max_iterations: 30,
        ..SolverSettings::default()
    };
    let commodities: CommodityMap = std::iter::once(commodity("ELC", MarketKind::Solved)).collect();
    let mut scenario = Scenario::new(model_time, commodities, vec![region], settings).unwrap();

    let summary = scenario.run().unwrap();

    // Every period is committed with best-effort values and flagged; the run is not aborted
    assert_eq!(summary.periods.len(), 3);
    assert!(!summary.all_solved());
    for result in &summary.periods {
        assert_eq!(result.status, ConvergenceStatus::Unsolved);
        assert_eq!(result.iterations, 30);
    }

    // Committed best-effort quantities are still queryable
    let supply = scenario
        .supply(&"GBR".into(), &"ELC".into(), scenario.model_time().periods().next().unwrap())
        .unwrap();
    assert_approx_eq!(f64, supply, 10.0, epsilon = 1e-12);
}

#[test]
fn test_fixed_price_market_never_blocks_convergence() {
    // Gas has an exogenous price; its market accumulates the turbine's demand but is never
    // adjusted by the solver
    let commodities: CommodityMap = [
        commodity("ELC", MarketKind::Solved),
        commodity("GAS", MarketKind::FixedPrice),
    ]
    .into_iter()
    .collect();

    let region: Region = toml::from_str(
        r#"
        id = "GBR"

        [[sectors]]
        id = "power"
        commodity_id = "ELC"

        [[sectors.subsectors]]
        id = "generation"
        weighting = {kind = "fixed"}

        [[sectors.subsectors.technologies]]
        id = "gas-turbine"
        production = {kind = "linear", intercept = 0.0, slope = 1.0}
        input = {commodity_id = "GAS", intensity = 0.5}

        [[final_demands]]
        commodity_id = "ELC"
        function = {kind = "linear", base = 100.0, slope = 1.0}
        "#,
    )
    .unwrap();

    let model_time = ModelTime::new(vec![2020]).unwrap();
    let mut scenario = Scenario::new(
        model_time,
        commodities,
        vec![region],
        SolverSettings::default(),
    )
    .unwrap();
    scenario
        .set_fixed_price(&"GBR".into(), &"GAS".into(), 3.0)
        .unwrap();
    // Setting an exogenous price on a solved market is a contract violation
    assert!(scenario
        .set_fixed_price(&"GBR".into(), &"ELC".into(), 3.0)
        .is_err());

    let summary = scenario.run().unwrap();
    assert!(summary.all_solved());

    let period = scenario.model_time().periods().exactly_one().unwrap();
    let gas_price = scenario.price(&"GBR".into(), &"GAS".into(), period).unwrap();
    assert_approx_eq!(f64, gas_price, 3.0, epsilon = 1e-12);

    let gas_demand = scenario.demand(&"GBR".into(), &"GAS".into(), period).unwrap();
    let elc_supply = scenario.supply(&"GBR".into(), &"ELC".into(), period).unwrap();
    assert_approx_eq!(f64, gas_demand, 0.5 * elc_supply, epsilon = 1e-9);
}

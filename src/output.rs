//! Reporting views over a committed run.
//!
//! These produce plain data for the embedding program to encode however it likes; no file or
//! database format is owned here.
use crate::commodity::{CommodityID, MarketKind};
use crate::model_time::Period;
use crate::region::RegionID;
use crate::scenario::Scenario;
use strum::Display;

/// One market in one period, as committed
#[derive(Debug, Clone, PartialEq)]
pub struct MarketRecord {
    /// The market's region
    pub region_id: RegionID,
    /// The market's commodity
    pub commodity_id: CommodityID,
    /// Whether the solver adjusted this market's price
    pub kind: MarketKind,
    /// The period
    pub period: Period,
    /// The period's calendar year
    pub year: u32,
    /// Committed price
    pub price: f64,
    /// Committed supply
    pub supply: f64,
    /// Committed demand
    pub demand: f64,
    /// Whether the market cleared within tolerance
    pub solved: bool,
}

/// Flat per-period, per-market records for every committed period, ordered by period then by
/// market registration order.
pub fn market_records(scenario: &Scenario) -> Vec<MarketRecord> {
    let marketplace = scenario.marketplace();
    scenario
        .model_time()
        .iter()
        .filter(|(period, _)| scenario.period_status(*period).is_some())
        .flat_map(|(period, year)| {
            marketplace
                .iter()
                .map(move |(key, market)| (period, year, key, market))
        })
        .map(|(period, year, key, market)| MarketRecord {
            region_id: key.0.clone(),
            commodity_id: key.1.clone(),
            kind: market.kind,
            period,
            year,
            price: market.price(period.0),
            supply: market.supply(period.0),
            demand: market.demand(period.0),
            solved: market.is_solved(period.0) || market.is_trivially_cleared(period.0),
        })
        .collect()
}

/// The level of a node in the output tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum OutputLevel {
    /// A region
    #[strum(serialize = "region")]
    Region,
    /// A sector
    #[strum(serialize = "sector")]
    Sector,
    /// A subsector
    #[strum(serialize = "subsector")]
    Subsector,
    /// A technology
    #[strum(serialize = "technology")]
    Technology,
    /// A region's final demand for a commodity
    #[strum(serialize = "final demand")]
    FinalDemand,
}

/// One node of the committed output tree
#[derive(Debug, Clone, PartialEq)]
pub struct OutputNode {
    /// The node's identifier
    pub name: String,
    /// Which level of the hierarchy this node sits at
    pub level: OutputLevel,
    /// Committed output (or demand, for final demand nodes) per period
    pub outputs: Vec<f64>,
    /// The node's children
    pub children: Vec<OutputNode>,
}

/// The committed region/sector/subsector/technology output tree, queryable after the run.
pub fn output_tree(scenario: &Scenario) -> Vec<OutputNode> {
    let periods: Vec<Period> = scenario.model_time().periods().collect();

    scenario
        .world()
        .iter()
        .map(|(region_id, region)| {
            let sectors = region.sectors.iter().map(|sector| {
                let subsectors = sector.subsectors.iter().map(|subsector| {
                    let technologies = subsector.technologies.iter().map(|technology| OutputNode {
                        name: technology.id.to_string(),
                        level: OutputLevel::Technology,
                        outputs: periods.iter().map(|p| technology.output(p.0)).collect(),
                        children: Vec::new(),
                    });
                    OutputNode {
                        name: subsector.id.to_string(),
                        level: OutputLevel::Subsector,
                        outputs: periods.iter().map(|p| subsector.output(p.0)).collect(),
                        children: technologies.collect(),
                    }
                });
                OutputNode {
                    name: sector.id.to_string(),
                    level: OutputLevel::Sector,
                    outputs: periods.iter().map(|p| sector.output(p.0)).collect(),
                    children: subsectors.collect(),
                }
            });

            let final_demands = region.final_demands.iter().map(|final_demand| OutputNode {
                name: final_demand.commodity_id.to_string(),
                level: OutputLevel::FinalDemand,
                outputs: periods.iter().map(|p| final_demand.demand_for(p.0)).collect(),
                children: Vec::new(),
            });

            let children: Vec<OutputNode> = sectors.chain(final_demands).collect();
            let outputs = periods
                .iter()
                .enumerate()
                .map(|(index, _)| {
                    children
                        .iter()
                        .filter(|child| child.level == OutputLevel::Sector)
                        .map(|child| child.outputs[index])
                        .sum()
                })
                .collect();

            OutputNode {
                name: region_id.to_string(),
                level: OutputLevel::Region,
                outputs,
                children,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commodity::CommodityMap;
    use crate::fixture::{commodities, linear_region, model_time, solver_settings};
    use crate::model_time::ModelTime;
    use crate::region::Region;
    use crate::settings::SolverSettings;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_market_records_cover_committed_periods(
        linear_region: Region,
        commodities: CommodityMap,
        model_time: ModelTime,
        solver_settings: SolverSettings,
    ) {
        let mut scenario =
            Scenario::new(model_time, commodities, vec![linear_region], solver_settings).unwrap();
        scenario.run().unwrap();

        let records = market_records(&scenario);
        assert_eq!(records.len(), 3); // one market, three periods
        for record in &records {
            assert!(record.solved);
            assert_approx_eq!(f64, record.price, 50.0, epsilon = 1e-4);
            assert_approx_eq!(f64, record.supply, record.demand, epsilon = 1e-4);
        }
        assert_eq!(records[0].year, 2020);
    }

    #[rstest]
    fn test_output_tree_conserves_quantity(
        linear_region: Region,
        commodities: CommodityMap,
        model_time: ModelTime,
        solver_settings: SolverSettings,
    ) {
        let mut scenario =
            Scenario::new(model_time, commodities, vec![linear_region], solver_settings).unwrap();
        scenario.run().unwrap();

        let tree = output_tree(&scenario);
        assert_eq!(tree.len(), 1);
        let region = &tree[0];
        let sector = &region.children[0];
        let subsector = &sector.children[0];

        for index in 0..3 {
            let technology_total: f64 = subsector
                .children
                .iter()
                .map(|node| node.outputs[index])
                .sum();
            assert_eq!(subsector.outputs[index], technology_total);
            assert_eq!(sector.outputs[index], subsector.outputs[index]);
            assert_eq!(region.outputs[index], sector.outputs[index]);
        }
    }
}

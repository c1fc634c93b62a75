//! Sectors aggregate subsectors supplying a single commodity.
use crate::commodity::CommodityID;
use crate::id::define_id_type;
use crate::marketplace::{RegionPrices, StructuralError};
use crate::subsector::Subsector;
use crate::technology::ContributionMap;
use serde::Deserialize;

define_id_type! {SectorID}

/// A sector: the group of subsectors producing one commodity within a region
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Sector {
    /// Unique identifier for the sector
    pub id: SectorID,
    /// Text description of the sector
    #[serde(default)]
    pub description: String,
    /// The commodity this sector supplies
    pub commodity_id: CommodityID,
    /// The subsectors making up this sector
    pub subsectors: Vec<Subsector>,

    /// Output recorded for each period, overwritten on every evaluation
    #[serde(skip)]
    outputs: Vec<f64>,
}

impl Sector {
    /// Size the per-period output records. Called once during setup.
    pub(crate) fn initialise(&mut self, num_periods: usize) {
        self.outputs = vec![0.0; num_periods];
        for subsector in &mut self.subsectors {
            subsector.initialise(num_periods);
        }
    }

    /// Evaluate the sector against the currently posted prices.
    ///
    /// Recurses into each subsector and records the sector's total output of its commodity.
    /// `scale` uniformly scales every subsector's output (used for region-level supply caps).
    pub(crate) fn evaluate(
        &mut self,
        period: usize,
        prices: &RegionPrices,
        scale: f64,
        contributions: &mut ContributionMap,
    ) -> Result<(), StructuralError> {
        let mut total = 0.0;
        for subsector in &mut self.subsectors {
            subsector.evaluate(period, &self.commodity_id, prices, scale, contributions)?;
            total += subsector.output(period);
        }
        self.outputs[period] = total;

        Ok(())
    }

    /// The output recorded for `period` by the most recent evaluation
    pub fn output(&self, period: usize) -> f64 {
        self.outputs[period]
    }
}

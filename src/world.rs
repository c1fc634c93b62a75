//! The world owns the full region collection and drives one solver iteration's cascade.
use crate::commodity::CommodityMap;
use crate::marketplace::{Marketplace, StructuralError};
use crate::model_time::{ModelTime, Period};
use crate::region::{Region, RegionID, RegionMap};
use log::debug;

/// The full set of regions for a scenario.
///
/// The composition of the world is fixed for the lifetime of the run.
#[derive(Debug, Clone)]
pub struct World {
    regions: RegionMap,
}

impl World {
    /// Create a world from a list of regions. Region IDs must be unique.
    pub fn new(regions: Vec<Region>) -> Result<Self, StructuralError> {
        let mut map = RegionMap::new();
        for region in regions {
            let id = region.id.clone();
            if map.insert(id.clone(), region).is_some() {
                return Err(StructuralError::duplicate_region(&id));
            }
        }
        Ok(World { regions: map })
    }

    /// Iterate over the regions in definition order
    pub fn iter(&self) -> impl Iterator<Item = (&RegionID, &Region)> {
        self.regions.iter()
    }

    /// Look up a region by ID
    pub fn region(&self, region_id: &RegionID) -> Option<&Region> {
        self.regions.get(region_id)
    }

    /// Finish initialisation before the run begins.
    ///
    /// Sizes the per-period records throughout the tree and registers every market the tree
    /// implies with the marketplace. Every commodity a region references must be defined;
    /// anything else is a structural error.
    pub fn complete_init(
        &mut self,
        commodities: &CommodityMap,
        marketplace: &mut Marketplace,
        num_periods: usize,
    ) -> Result<(), StructuralError> {
        for region in self.regions.values_mut() {
            region.initialise(num_periods);
            for (region_id, commodity_id) in region.market_keys() {
                let commodity = commodities
                    .get(&commodity_id)
                    .ok_or_else(|| StructuralError::unknown_commodity(&commodity_id))?;
                marketplace.register(region_id, commodity_id, commodity.kind);
            }
        }
        debug!("Registered {} markets", marketplace.len());

        Ok(())
    }

    /// Derive the period-specific exogenous drivers for every region
    pub fn init_period(&mut self, period: Period, model_time: &ModelTime) {
        for region in self.regions.values_mut() {
            region.init_period(period, model_time);
        }
    }

    /// One solver iteration's full cascade: evaluate every region against the currently
    /// posted prices and post the resulting contributions.
    ///
    /// The caller must have called [`Marketplace::reset_to_zero`] first; given that, this
    /// operation produces identical supply and demand for identical prices.
    pub fn evaluate(
        &mut self,
        period: Period,
        marketplace: &mut Marketplace,
    ) -> Result<(), StructuralError> {
        for region in self.regions.values_mut() {
            let region_id = region.id.clone();
            let contributions = region.evaluate(period, marketplace)?;
            for (commodity_id, flows) in contributions {
                let key = (region_id.clone(), commodity_id);
                marketplace.add_to_supply(&key, period.0, flows.supply)?;
                marketplace.add_to_demand(&key, period.0, flows.demand)?;
            }
        }

        Ok(())
    }
}

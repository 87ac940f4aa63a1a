//! Per-hour ordering of regions along export flows.
//!
//! Spot prices propagate from exporters to importers, so each hour the
//! regions are visited in an order where every real exporter precedes its
//! importers. The interconnector graph may contain cycles; the walk operates
//! on the per-hour subgraph of links actually carrying power, which is
//! acyclic by construction of physical power flow (asserted, not solved).

use std::collections::{BTreeMap, BTreeSet};

use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;

use gdc_core::{GridError, GridResult, Interconnectors, Region, OUTFLOW_CAPACITY_COST_EUR_PER_MWH};
use gdc_ts::{keys, HourlyFrame};

/// Per-region flow columns needed by the walk: the total import and the
/// per-neighbor import/export series written by the extractor.
pub(crate) struct FlowColumns {
    pub import_total: Vec<f64>,
    pub import_from: BTreeMap<Region, Vec<f64>>,
    pub export_to: BTreeMap<Region, Vec<f64>>,
}

impl FlowColumns {
    pub fn from_frame(
        frame: &HourlyFrame,
        interconnectors: &Interconnectors,
        region: &Region,
        regions: &BTreeSet<Region>,
    ) -> GridResult<FlowColumns> {
        let mut import_from = BTreeMap::new();
        for (from, link) in interconnectors.connections_to(region) {
            if link.capacity_mw > 0.0 && regions.contains(&from) {
                import_from.insert(from.clone(), frame.values(&keys::import_key(&from))?);
            }
        }
        let mut export_to = BTreeMap::new();
        for (to, link) in interconnectors.connections_from(region) {
            if link.capacity_mw > 0.0 && regions.contains(&to) {
                export_to.insert(to.clone(), frame.values(&keys::export_key(&to))?);
            }
        }
        Ok(FlowColumns {
            import_total: frame.values(keys::IMPORT)?,
            import_from,
            export_to,
        })
    }
}

pub(crate) struct ExportFlow<'a> {
    interconnectors: &'a Interconnectors,
    include_transmission_loss_in_price: bool,
    regions: Vec<Region>,
    region_ids: BTreeMap<Region, u32>,
    /// Links with positive capacity among the modeled regions.
    graph: DiGraphMap<u32, ()>,
}

impl<'a> ExportFlow<'a> {
    pub fn new(
        interconnectors: &'a Interconnectors,
        regions: &BTreeSet<Region>,
        include_transmission_loss_in_price: bool,
    ) -> Self {
        let ordered: Vec<Region> = regions.iter().cloned().collect();
        let region_ids: BTreeMap<Region, u32> = ordered
            .iter()
            .enumerate()
            .map(|(index, region)| (region.clone(), index as u32))
            .collect();
        let mut graph = DiGraphMap::new();
        for id in region_ids.values() {
            graph.add_node(*id);
        }
        for (from, to_map) in &interconnectors.from_to {
            for (to, link) in to_map {
                if link.capacity_mw > 0.0 {
                    if let (Some(&from_id), Some(&to_id)) =
                        (region_ids.get(from), region_ids.get(to))
                    {
                        graph.add_edge(from_id, to_id, ());
                    }
                }
            }
        }
        ExportFlow {
            interconnectors,
            include_transmission_loss_in_price,
            regions: ordered,
            region_ids,
            graph,
        }
    }

    /// Neighbours actually exporting to `region` at hour `t`.
    fn real_exporters_to(
        &self,
        region: &Region,
        t: usize,
        flows: &BTreeMap<Region, FlowColumns>,
    ) -> Vec<Region> {
        let columns = &flows[region];
        self.graph
            .neighbors_directed(self.region_ids[region], Direction::Incoming)
            .map(|id| self.regions[id as usize].clone())
            .filter(|from| {
                columns
                    .import_from
                    .get(from)
                    .map(|values| values[t] > 0.0)
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Neighbours actually importing from `region` at hour `t`.
    fn real_importers_from(
        &self,
        region: &Region,
        t: usize,
        flows: &BTreeMap<Region, FlowColumns>,
    ) -> Vec<Region> {
        let columns = &flows[region];
        self.graph
            .neighbors_directed(self.region_ids[region], Direction::Outgoing)
            .map(|id| self.regions[id as usize].clone())
            .filter(|to| {
                columns
                    .export_to
                    .get(to)
                    .map(|values| values[t] > 0.0)
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Visit order for hour `t`: seeded by regions without imports, then
    /// promoting candidates whose real exporters have all been processed.
    pub fn order(&self, t: usize, flows: &BTreeMap<Region, FlowColumns>) -> GridResult<Vec<Region>> {
        let mut processed: BTreeSet<Region> = BTreeSet::new();
        let mut order: Vec<Region> = Vec::new();
        let mut candidates: Vec<Region> = self
            .regions
            .iter()
            .filter(|region| flows[*region].import_total[t] < keys::small_threshold())
            .cloned()
            .collect();

        while !candidates.is_empty() {
            let promoted: Vec<Region> = candidates
                .iter()
                .filter(|candidate| {
                    self.real_exporters_to(candidate, t, flows)
                        .iter()
                        .all(|exporter| processed.contains(exporter))
                })
                .cloned()
                .collect();
            if promoted.is_empty() {
                return Err(GridError::Numeric(format!(
                    "export flow at step {t} is cyclic; no candidate could be processed"
                )));
            }
            for region in promoted {
                processed.insert(region.clone());
                candidates.retain(|candidate| candidate != &region);
                for id in self
                    .graph
                    .neighbors_directed(self.region_ids[&region], Direction::Outgoing)
                {
                    let downstream = &self.regions[id as usize];
                    if !processed.contains(downstream) && !candidates.contains(downstream) {
                        candidates.push(downstream.clone());
                    }
                }
                order.push(region);
            }
        }
        Ok(order)
    }

    /// Import price of a region: the maximum spot price over its real
    /// exporters (optionally inflated by the transmission loss) plus the
    /// interconnector fee included in the optimization.
    pub fn import_price(
        &self,
        region: &Region,
        t: usize,
        flows: &BTreeMap<Region, FlowColumns>,
        prices: &BTreeMap<Region, Vec<f64>>,
    ) -> f64 {
        let mut import_price: f64 = 0.0;
        for exporter in self.real_exporters_to(region, t, flows) {
            let exporter_price = prices[&exporter][t];
            if self.include_transmission_loss_in_price {
                // The current market does not value transit, a future one
                // will need to.
                let loss = self.interconnectors.from_to[&exporter][region].loss;
                import_price = import_price.max(exporter_price / (1.0 - loss));
            } else {
                import_price = import_price.max(exporter_price);
            }
        }
        import_price + OUTFLOW_CAPACITY_COST_EUR_PER_MWH
    }

    /// Export price of a region: the maximum import price over its real
    /// importers.
    pub fn export_price(
        &self,
        region: &Region,
        t: usize,
        flows: &BTreeMap<Region, FlowColumns>,
        import_prices: &BTreeMap<Region, Vec<f64>>,
    ) -> f64 {
        let mut export_price: f64 = 0.0;
        for importer in self.real_importers_from(region, t, flows) {
            export_price = export_price.max(import_prices[&importer][t]);
        }
        export_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdc_core::Interconnector;

    fn region(name: &str) -> Region {
        Region::new(name)
    }

    fn flows_for(
        entries: Vec<(Region, f64, Vec<(Region, f64)>, Vec<(Region, f64)>)>,
    ) -> BTreeMap<Region, FlowColumns> {
        entries
            .into_iter()
            .map(|(name, import_total, imports, exports)| {
                (
                    name,
                    FlowColumns {
                        import_total: vec![import_total],
                        import_from: imports
                            .into_iter()
                            .map(|(from, value)| (from, vec![value]))
                            .collect(),
                        export_to: exports
                            .into_iter()
                            .map(|(to, value)| (to, vec![value]))
                            .collect(),
                    },
                )
            })
            .collect()
    }

    fn chain_interconnectors() -> Interconnectors {
        // A -> B -> C plus a cycle-forming C -> A link with capacity.
        let mut links = Interconnectors::new();
        links.insert(region("A"), region("B"), Interconnector::new(500.0, 0.02));
        links.insert(region("B"), region("C"), Interconnector::new(500.0, 0.02));
        links.insert(region("C"), region("A"), Interconnector::new(500.0, 0.02));
        links
    }

    #[test]
    fn test_order_visits_exporters_first() {
        let links = chain_interconnectors();
        let regions: BTreeSet<Region> = [region("A"), region("B"), region("C")].into();
        let walk = ExportFlow::new(&links, &regions, false);
        // A exports 300 MW to B, B forwards 100 MW to C; the C -> A link
        // is idle this hour.
        let flows = flows_for(vec![
            (region("A"), 0.0, vec![], vec![(region("B"), 300.0)]),
            (region("B"), 300.0, vec![(region("A"), 300.0)], vec![(region("C"), 100.0)]),
            (region("C"), 100.0, vec![(region("B"), 100.0)], vec![]),
        ]);
        let order = walk.order(0, &flows).unwrap();
        assert_eq!(order, vec![region("A"), region("B"), region("C")]);
    }

    #[test]
    fn test_order_visits_every_region_once() {
        let links = chain_interconnectors();
        let regions: BTreeSet<Region> = [region("A"), region("B"), region("C")].into();
        let walk = ExportFlow::new(&links, &regions, false);
        // No flows at all: every region is a seed.
        let flows = flows_for(vec![
            (region("A"), 0.0, vec![], vec![]),
            (region("B"), 0.0, vec![], vec![]),
            (region("C"), 0.0, vec![], vec![]),
        ]);
        let order = walk.order(0, &flows).unwrap();
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn test_import_price_takes_exporter_maximum_plus_fee() {
        let links = chain_interconnectors();
        let regions: BTreeSet<Region> = [region("A"), region("B"), region("C")].into();
        let walk = ExportFlow::new(&links, &regions, false);
        let flows = flows_for(vec![
            (region("A"), 0.0, vec![], vec![(region("B"), 300.0)]),
            (region("B"), 300.0, vec![(region("A"), 300.0)], vec![]),
            (region("C"), 0.0, vec![], vec![]),
        ]);
        let mut prices = BTreeMap::new();
        prices.insert(region("A"), vec![40.0]);
        prices.insert(region("B"), vec![0.0]);
        prices.insert(region("C"), vec![0.0]);
        let price = walk.import_price(&region("B"), 0, &flows, &prices);
        assert!((price - 42.0).abs() < 1e-9);
    }

    #[test]
    fn test_import_price_with_transmission_loss() {
        let links = chain_interconnectors();
        let regions: BTreeSet<Region> = [region("A"), region("B"), region("C")].into();
        let walk = ExportFlow::new(&links, &regions, true);
        let flows = flows_for(vec![
            (region("A"), 0.0, vec![], vec![(region("B"), 300.0)]),
            (region("B"), 300.0, vec![(region("A"), 300.0)], vec![]),
            (region("C"), 0.0, vec![], vec![]),
        ]);
        let mut prices = BTreeMap::new();
        prices.insert(region("A"), vec![49.0]);
        prices.insert(region("B"), vec![0.0]);
        prices.insert(region("C"), vec![0.0]);
        let price = walk.import_price(&region("B"), 0, &flows, &prices);
        assert!((price - (49.0 / 0.98 + 2.0)).abs() < 1e-9);
    }
}

//! Production, use, demand and trade of each carrier in each region.
use super::{CarrierQuantity, RegionMatrix};
use crate::data::ModelData;
use crate::expr::ExprMatrix;
use crate::region::{LineID, RegionID};
use crate::schema::ParameterKey;
use crate::table::ColumnKey;
use crate::technology::{TechCategory, Technology};
use crate::variables::{VarMatrix, Variables};

/// Whether a flow matrix describes production or use
#[derive(Clone, Copy, PartialEq)]
enum Direction {
    Production,
    Use,
}

/// Add the flows of one technology to the per-carrier totals of its region
fn add_technology_flows(
    data: &ModelData,
    region_id: &RegionID,
    tech: &Technology,
    flows: &VarMatrix,
    col: usize,
    direction: Direction,
    totals: &mut ExprMatrix,
) {
    let carriers = data.structure().region_carriers(region_id);
    let (tech_carriers, ratio_key) = match direction {
        Direction::Production => (&tech.outputs, ParameterKey::CarrierRatioOut),
        Direction::Use => (&tech.inputs, ParameterKey::CarrierRatioIn),
    };

    for carrier in tech_carriers {
        let carrier_idx = carriers
            .get_index_of(carrier)
            .expect("Carriers of a technology are carriers of its region");
        let ratios = (tech.category == TechCategory::ConversionPlus).then(|| {
            data.regional(
                region_id,
                ratio_key,
                &ColumnKey::TechnologyCarrier(tech.id.clone(), carrier.clone()),
            )
        });
        for row in 0..flows.rows() {
            let ratio = ratios.as_ref().map_or(1.0, |ratios| ratios[row]);
            totals
                .get_mut(row, carrier_idx)
                .add_term(flows.var(row, col), ratio);
        }
    }
}

/// Sum the flows of every technology of a region by carrier
fn technology_totals(
    data: &ModelData,
    region_id: &RegionID,
    variables: &Variables,
    direction: Direction,
) -> ExprMatrix {
    let structure = data.structure();
    let rows = structure.n_years() * structure.n_time_steps();
    let mut totals = ExprMatrix::zeros(rows, structure.region_carriers(region_id).len());
    let blocks = match direction {
        Direction::Production => &variables.production()[region_id],
        Direction::Use => &variables.consumption()[region_id],
    };

    for (category, flows) in blocks {
        for (col, tech) in structure
            .technologies_in(region_id, *category)
            .iter()
            .enumerate()
        {
            add_technology_flows(data, region_id, tech, flows, col, direction, &mut totals);
        }
    }

    totals
}

/// The exogenous demand of a region by carrier
fn demand_totals(data: &ModelData, region_id: &RegionID) -> ExprMatrix {
    let structure = data.structure();
    let carriers = structure.region_carriers(region_id);
    let rows = structure.n_years() * structure.n_time_steps();
    let mut totals = ExprMatrix::zeros(rows, carriers.len());

    for tech in structure.technologies_in(region_id, TechCategory::Demand) {
        let demand = data.tech(region_id, ParameterKey::Demand, tech);
        for carrier in &tech.inputs {
            let carrier_idx = carriers
                .get_index_of(carrier)
                .expect("Carriers of a technology are carriers of its region");
            for (row, value) in demand.iter().enumerate() {
                totals.get_mut(row, carrier_idx).add_constant(*value);
            }
        }
    }

    totals
}

/// Imports or exports of a region by carrier.
///
/// Imports are scaled by the efficiency of the line they arrive over, so losses are applied on
/// the receiving end only.
fn trade_totals(
    data: &ModelData,
    region_id: &RegionID,
    variables: &Variables,
    quantity: CarrierQuantity,
) -> ExprMatrix {
    let structure = data.structure();
    let carriers = structure.region_carriers(region_id);
    let n_time_steps = structure.n_time_steps();
    let rows = structure.n_years() * n_time_steps;
    let mut totals = ExprMatrix::zeros(rows, carriers.len());
    let blocks = match quantity {
        CarrierQuantity::TotalImportByCarrier => &variables.import()[region_id],
        _ => &variables.export()[region_id],
    };

    for (other_id, flows) in blocks {
        let line = LineID::new(region_id, other_id).expect("Trade is between distinct regions");
        for (carrier_idx, carrier) in carriers.iter().enumerate() {
            let catalog_idx = structure
                .carriers()
                .get_index_of(carrier)
                .expect("Region carriers are in the catalog");
            let efficiency = match quantity {
                CarrierQuantity::TotalImportByCarrier => {
                    Some(data.line(ParameterKey::LineEfficiency, &line, carrier))
                }
                _ => None,
            };
            for row in 0..rows {
                let factor = efficiency
                    .as_ref()
                    .map_or(1.0, |efficiency| efficiency[row / n_time_steps]);
                totals
                    .get_mut(row, carrier_idx)
                    .add_term(flows.var(row, catalog_idx), factor);
            }
        }
    }

    totals
}

/// Compute the per-carrier totals of every region
pub fn carrier_balances(
    data: &ModelData,
    variables: &Variables,
) -> Vec<(CarrierQuantity, RegionMatrix)> {
    let structure = data.structure();
    let per_region = |f: &dyn Fn(&RegionID) -> ExprMatrix| -> RegionMatrix {
        structure
            .regions()
            .iter()
            .map(|region_id| (region_id.clone(), f(region_id)))
            .collect()
    };

    let mut balances = vec![
        (
            CarrierQuantity::TotalProdByCarrier,
            per_region(&|region_id| {
                technology_totals(data, region_id, variables, Direction::Production)
            }),
        ),
        (
            CarrierQuantity::TotalUseByCarrier,
            per_region(&|region_id| technology_totals(data, region_id, variables, Direction::Use)),
        ),
        (
            CarrierQuantity::TotalDemandByCarrier,
            per_region(&|region_id| demand_totals(data, region_id)),
        ),
    ];

    if structure.multi_node() {
        for quantity in [
            CarrierQuantity::TotalImportByCarrier,
            CarrierQuantity::TotalExportByCarrier,
        ] {
            balances.push((
                quantity,
                per_region(&|region_id| trade_totals(data, region_id, variables, quantity)),
            ));
        }
    }

    balances
}

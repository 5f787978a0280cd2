//! Technology costs, their tax and subsidy components and the present value of investments.
use super::{RegionMatrix, RegionalMatrices, TechQuantity, per_category, tech_params};
use crate::data::ModelData;
use crate::expr::{ExprMatrix, LinExpr};
use crate::finance::{annuity_present_value, discount_factor, salvage_fraction};
use crate::region::RegionID;
use crate::schema::ParameterKey;
use crate::structure::{Mode, ModelStructure};
use crate::table::ColumnKey;
use crate::technology::{TaxOrSub, TechCategory};
use indexmap::IndexMap;

/// One column of tax or subsidy rates per technology of a category
fn taxsub_params(
    data: &ModelData,
    region_id: &RegionID,
    category: TechCategory,
    key: ParameterKey,
    kind: TaxOrSub,
) -> Vec<Vec<f64>> {
    data.structure()
        .technologies_in(region_id, category)
        .iter()
        .map(|tech| data.regional(region_id, key, &ColumnKey::TaxedTechnology(kind, tech.key())))
        .collect()
}

/// A cost, its tax and its subsidy
struct CostStream {
    base: TechQuantity,
    tax: TechQuantity,
    sub: TechQuantity,
    /// The quantity the cost is proportional to
    driver: TechQuantity,
    /// The specific cost
    cost_key: ParameterKey,
    /// The tax and subsidy rates
    taxsub_key: ParameterKey,
}

impl CostStream {
    fn compute(
        &self,
        data: &ModelData,
        tech: &IndexMap<TechQuantity, RegionalMatrices>,
    ) -> [(TechQuantity, RegionalMatrices); 3] {
        let structure = data.structure();
        let driver = &tech[&self.driver];
        let base = per_category(structure, TechCategory::has_capacity, |region_id, category| {
            driver[region_id][&category]
                .scale_columns(&tech_params(data, region_id, category, self.cost_key))
        });
        let share = |kind| {
            per_category(structure, TechCategory::has_capacity, |region_id, category| {
                base[region_id][&category].scale_columns(&taxsub_params(
                    data,
                    region_id,
                    category,
                    self.taxsub_key,
                    kind,
                ))
            })
        };
        let tax = share(TaxOrSub::Tax);
        let sub = share(TaxOrSub::Sub);

        [(self.base, base), (self.tax, tax), (self.sub, sub)]
    }
}

/// Compute fixed, variable, investment and decommissioning costs for every technology.
///
/// Tax and subsidy components are kept separate from the costs they apply to.
pub fn technology_costs(
    data: &ModelData,
    tech: &IndexMap<TechQuantity, RegionalMatrices>,
) -> Vec<(TechQuantity, RegionalMatrices)> {
    use TechQuantity as Q;

    let mut streams = vec![
        CostStream {
            base: Q::CostFix,
            tax: Q::CostFixTax,
            sub: Q::CostFixSub,
            driver: Q::TotalCapacity,
            cost_key: ParameterKey::TechFixedCost,
            taxsub_key: ParameterKey::FixTaxsub,
        },
        CostStream {
            base: Q::CostVariable,
            tax: Q::CostVariableTax,
            sub: Q::CostVariableSub,
            driver: Q::AnnualProduction,
            cost_key: ParameterKey::TechVarCost,
            taxsub_key: ParameterKey::VarTaxsub,
        },
    ];
    let planning = data.structure().mode() == Mode::Planning;
    if planning {
        streams.push(CostStream {
            base: Q::CostInv,
            tax: Q::CostInvTax,
            sub: Q::CostInvSub,
            driver: Q::NewCapacity,
            cost_key: ParameterKey::TechInvestmentCost,
            taxsub_key: ParameterKey::InvTaxsub,
        });
    }

    let mut costs: Vec<_> = streams
        .iter()
        .flat_map(|stream| stream.compute(data, tech))
        .collect();

    if planning {
        let decommissioned = &tech[&Q::DecommissionedCapacity];
        let decom = per_category(
            data.structure(),
            TechCategory::has_capacity,
            |region_id, category| {
                decommissioned[region_id][&category].scale_columns(&tech_params(
                    data,
                    region_id,
                    category,
                    ParameterKey::TechDecommissioningCost,
                ))
            },
        );
        costs.push((Q::CostDecom, decom));
    }

    costs
}

/// `base + tax - sub` for one region and category
pub fn net_cost(
    tech: &IndexMap<TechQuantity, RegionalMatrices>,
    [base, tax, sub]: [TechQuantity; 3],
    region_id: &RegionID,
    category: TechCategory,
) -> ExprMatrix {
    let get = |quantity| &tech[&quantity][region_id][&category];
    get(base).plus(get(tax)).minus(get(sub))
}

/// Calculate the present value of the investment annuities and the salvage value of every
/// region.
///
/// Each investment is paid off as an annuity over its economic lifetime. Every payment of an
/// investment is discounted at the region's discount rate for the year of investment, not the
/// rate of the year the payment falls in. There are `ceil(economic_lifetime)` payments while
/// the CRF uses the fractional lifetime (see [`annuity_present_value`]). The salvage value is
/// the part of each investment not yet depreciated at the end of the horizon, discounted from
/// the end of the horizon.
pub fn investment_present_values(
    data: &ModelData,
    tech: &IndexMap<TechQuantity, RegionalMatrices>,
) -> (RegionMatrix, RegionMatrix) {
    let structure = data.structure();
    let mut annuities = RegionMatrix::new();
    let mut salvages = RegionMatrix::new();
    for region_id in structure.regions() {
        let discount_rates = data.regional_value(region_id, ParameterKey::DiscountRate);
        let mut annuity = LinExpr::zero();
        let mut salvage = LinExpr::zero();
        for category in structure
            .technologies(region_id)
            .keys()
            .filter(|category| category.has_capacity())
        {
            let investment = net_cost(
                tech,
                [
                    TechQuantity::CostInv,
                    TechQuantity::CostInvTax,
                    TechQuantity::CostInvSub,
                ],
                region_id,
                *category,
            );
            for (col, technology) in structure
                .technologies_in(region_id, *category)
                .iter()
                .enumerate()
            {
                let perf = |key| data.tech_performance(region_id, key, technology);
                let economic_lifetime = perf(ParameterKey::EconomicLifetime);
                let lifetime = perf(ParameterKey::TechLifetime);
                let interest_rate = perf(ParameterKey::InterestRate);
                add_investment_terms(
                    structure,
                    investment.column(col),
                    &discount_rates,
                    InvestmentTerms {
                        economic_lifetime,
                        lifetime,
                        interest_rate,
                    },
                    &mut annuity,
                    &mut salvage,
                );
            }
        }
        annuities.insert(region_id.clone(), single_entry(annuity));
        salvages.insert(region_id.clone(), single_entry(salvage));
    }

    (annuities, salvages)
}

/// Financial properties of an investment
#[derive(Clone, Copy, Debug)]
pub struct InvestmentTerms {
    /// Period over which the investment is paid off
    pub economic_lifetime: f64,
    /// Period over which the capacity is usable
    pub lifetime: f64,
    /// Interest rate of the investment
    pub interest_rate: f64,
}

/// Add the present values of the annuity payments and of the salvage value of a stream of
/// yearly investments
pub fn add_investment_terms<'a>(
    structure: &ModelStructure,
    investment: impl Iterator<Item = &'a LinExpr>,
    discount_rates: &[f64],
    terms: InvestmentTerms,
    annuity: &mut LinExpr,
    salvage: &mut LinExpr,
) {
    let n_years = structure.n_years();
    let horizon = (n_years as u32 * structure.period_step()) as f64;
    let last_rate = discount_rates[n_years - 1];
    for (year_idx, cost) in investment.enumerate() {
        let elapsed = structure.years_elapsed(year_idx) as f64;
        let pv = annuity_present_value(
            terms.economic_lifetime,
            terms.interest_rate,
            discount_rates[year_idx],
            elapsed,
        );
        annuity.add_scaled(cost, pv);

        let remaining = salvage_fraction(terms.lifetime, terms.interest_rate, horizon - elapsed);
        salvage.add_scaled(cost, remaining * discount_factor(last_rate, horizon));
    }
}

fn single_entry(expr: LinExpr) -> ExprMatrix {
    ExprMatrix::from_fn(1, 1, |_, _| expr.clone())
}

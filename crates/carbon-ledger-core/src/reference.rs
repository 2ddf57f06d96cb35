//! Static Bangladesh reference data: activity emission factors, the scope to
//! category map, industry benchmarks and the regional, seasonal and export-market
//! tables used when advising on a ledger.

use serde::Serialize;
use time::Month;

use crate::Scope;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EmissionFactor {
    pub activity: &'static str,
    /// kgCO2e per `unit`.
    pub factor: f64,
    pub unit: &'static str,
    pub source: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FactorCategory {
    pub name: &'static str,
    pub factors: &'static [EmissionFactor],
}

const fn ef(
    activity: &'static str,
    factor: f64,
    unit: &'static str,
    source: &'static str,
) -> EmissionFactor {
    EmissionFactor { activity, factor, unit, source }
}

pub const EMISSION_FACTORS: &[FactorCategory] = &[
    FactorCategory {
        name: "Stationary Combustion",
        factors: &[
            ef("Natural Gas", 0.18316, "kWh", "IPCC 2006"),
            ef("Diesel", 2.68787, "liter", "IPCC 2006"),
            ef("Furnace Oil", 3.15123, "liter", "IPCC 2006"),
            ef("Coal", 2.42287, "kg", "IPCC 2006"),
            ef("Biomass (Wood)", 0.0, "kg", "IPCC 2006 - Carbon neutral"),
            ef("Jute Waste", 0.0, "kg", "Local biomass - Carbon neutral"),
            ef("Rice Husk", 0.0, "kg", "Agricultural waste - Carbon neutral"),
        ],
    },
    FactorCategory {
        name: "Mobile Combustion",
        factors: &[
            ef("Petrol/Gasoline", 2.31495, "liter", "IPCC 2006"),
            ef("Diesel", 2.70553, "liter", "IPCC 2006"),
            ef("CNG", 2.53721, "kg", "IPCC 2006"),
            ef("LPG", 1.55537, "liter", "IPCC 2006"),
            ef("Kerosene", 2.52348, "liter", "IPCC 2006"),
        ],
    },
    FactorCategory {
        name: "Process Emissions",
        factors: &[
            ef("Cement Production", 0.82, "kg cement", "Industry standard"),
            ef("Steel Production", 2.58, "kg steel", "Industry standard"),
            ef("Fertilizer Production", 2.4, "kg fertilizer", "Industry standard"),
            ef("Jute Processing", 0.15, "kg jute fiber", "Local estimate"),
            ef("Leather Tanning", 4.2, "kg leather", "Industry estimate"),
        ],
    },
    FactorCategory {
        name: "Refrigerants",
        factors: &[
            ef("R-410A", 2088.0, "kg", "IPCC AR5"),
            ef("R-134a", 1430.0, "kg", "IPCC AR5"),
            ef("R-404A", 3922.0, "kg", "IPCC AR5"),
            ef("R-407C", 1774.0, "kg", "IPCC AR5"),
            ef("R-22", 1810.0, "kg", "IPCC AR5"),
        ],
    },
    FactorCategory {
        name: "Electricity",
        factors: &[
            ef("Bangladesh Grid", 0.6815, "kWh", "Bangladesh grid emission factor 2023"),
            ef("Solar Power", 0.041, "kWh", "IPCC LCA"),
            ef("Hydropower", 0.024, "kWh", "IPCC LCA"),
            ef("Wind Power", 0.011, "kWh", "IPCC LCA"),
            ef("Biomass Power", 0.018, "kWh", "IPCC LCA"),
        ],
    },
    FactorCategory {
        name: "Steam",
        factors: &[
            ef("Purchased Steam (Natural Gas)", 0.19, "kg steam", "Industry standard"),
            ef("Purchased Steam (Biomass)", 0.02, "kg steam", "Industry standard"),
        ],
    },
    FactorCategory {
        name: "Business Travel",
        factors: &[
            ef("Domestic Flight", 0.15298, "passenger-km", "DEFRA 2023"),
            ef("International Flight (Short-haul)", 0.15298, "passenger-km", "DEFRA 2023"),
            ef("International Flight (Long-haul)", 0.19085, "passenger-km", "DEFRA 2023"),
            ef("Train", 0.03694, "passenger-km", "DEFRA 2023"),
            ef("Bus", 0.10471, "passenger-km", "DEFRA 2023"),
            ef("Rickshaw (CNG)", 0.08545, "km", "Local estimate"),
            ef("Taxi", 0.14549, "km", "DEFRA 2023"),
            ef("Launch/Ferry", 0.05234, "passenger-km", "Local estimate"),
        ],
    },
    FactorCategory {
        name: "Employee Commuting",
        factors: &[
            ef("Car (Petrol)", 0.17336, "km", "DEFRA 2023"),
            ef("Car (Diesel)", 0.16844, "km", "DEFRA 2023"),
            ef("Motorcycle", 0.11501, "km", "DEFRA 2023"),
            ef("Bus", 0.10471, "passenger-km", "DEFRA 2023"),
            ef("Rickshaw (CNG)", 0.08545, "passenger-km", "Local estimate"),
            ef("Rickshaw (Manual)", 0.0, "passenger-km", "Zero emission"),
            ef("Train", 0.03694, "passenger-km", "DEFRA 2023"),
            ef("Walking", 0.0, "km", "Zero emission"),
            ef("Bicycle", 0.0, "km", "Zero emission"),
        ],
    },
    FactorCategory {
        name: "Freight Transportation",
        factors: &[
            ef("Truck (Diesel)", 0.62068, "tonne-km", "DEFRA 2023"),
            ef("Rail Freight", 0.02683, "tonne-km", "DEFRA 2023"),
            ef("Ship (Inland)", 0.03147, "tonne-km", "DEFRA 2023"),
            ef("Ship (International)", 0.01185, "tonne-km", "DEFRA 2023"),
            ef("Air Freight", 1.02, "tonne-km", "DEFRA 2023"),
        ],
    },
    FactorCategory {
        name: "Waste Management",
        factors: &[
            ef("Landfill (Mixed Waste)", 0.45727, "kg", "DEFRA 2023"),
            ef("Landfill (Food Waste)", 0.34, "kg", "DEFRA 2023"),
            ef("Recycling (Mixed)", 0.01042, "kg", "DEFRA 2023"),
            ef("Composting", 0.01042, "kg", "DEFRA 2023"),
            ef("Incineration", 0.01613, "kg", "DEFRA 2023"),
            ef("Open Burning", 2.3, "kg", "Local estimate - discouraged"),
        ],
    },
    FactorCategory {
        name: "Water and Wastewater",
        factors: &[
            ef("Water Supply", 0.298, "cubic meter", "Adjusted for Bangladesh"),
            ef("Water Treatment", 0.615, "cubic meter", "Adjusted for Bangladesh"),
            ef("Wastewater Treatment", 0.708, "cubic meter", "Industry standard"),
            ef("Septic Tank", 0.15, "cubic meter", "Local estimate"),
        ],
    },
    FactorCategory {
        name: "Purchased Goods & Services",
        factors: &[
            ef("Jute Fiber", 0.82, "kg", "Local LCA study"),
            ef("Jute Products", 1.15, "kg", "Local LCA study"),
            ef("Cotton (Raw)", 3.8, "kg", "Global average"),
            ef("Cotton Textiles", 5.89, "kg", "Industry study"),
            ef("Leather (Raw)", 14.2, "kg", "Industry study"),
            ef("Leather Products", 17.0, "kg", "Industry study"),
            ef("Pharmaceuticals", 12.5, "kg", "Industry estimate"),
            ef("Rice", 2.7, "kg", "FAO study"),
            ef("Fish (Freshwater)", 5.4, "kg", "FAO study"),
            ef("Fish (Marine)", 3.1, "kg", "FAO study"),
            ef("Shrimp (Farmed)", 18.0, "kg", "FAO study"),
            ef("Tea", 2.5, "kg", "Industry study"),
            ef("Sugar", 1.8, "kg", "Industry study"),
            ef("Cement", 0.82, "kg", "Industry standard"),
            ef("Steel (Primary)", 2.58, "kg", "Industry standard"),
            ef("Steel (Secondary)", 0.89, "kg", "Industry standard"),
            ef("Bricks (Clay)", 0.22, "kg", "Local estimate"),
            ef("Bamboo", 0.02, "kg", "Local estimate"),
            ef("Paper", 0.919, "kg", "DEFRA 2023"),
            ef("Plastic (General)", 3.14, "kg", "DEFRA 2023"),
            ef("Glass", 0.85, "kg", "DEFRA 2023"),
            ef("Aluminum", 11.46, "kg", "DEFRA 2023"),
            ef("Copper", 4.94, "kg", "DEFRA 2023"),
            ef("Office Paper (A4)", 4.6, "kg", "DEFRA 2023"),
            ef("Computers", 300.0, "piece", "Industry estimate"),
            ef("Mobile Phones", 70.0, "piece", "Industry estimate"),
        ],
    },
    FactorCategory {
        name: "Hotel Stays",
        factors: &[
            ef("Hotel (Budget)", 12.2, "night", "DEFRA 2023"),
            ef("Hotel (Mid-range)", 24.3, "night", "DEFRA 2023"),
            ef("Hotel (Luxury)", 65.2, "night", "DEFRA 2023"),
            ef("Guesthouse", 8.5, "night", "Local estimate"),
        ],
    },
];

// Categories listed per scope may have no factor rows; entries under them carry
// an operator-supplied factor.
const SCOPE_1_CATEGORIES: &[&str] = &[
    "Stationary Combustion",
    "Mobile Combustion",
    "Process Emissions",
    "Refrigerants",
    "Fugitive Emissions",
];

const SCOPE_2_CATEGORIES: &[&str] =
    &["Electricity", "Steam", "District Cooling", "District Heating"];

const SCOPE_3_CATEGORIES: &[&str] = &[
    "Business Travel",
    "Employee Commuting",
    "Freight Transportation",
    "Waste Management",
    "Water and Wastewater",
    "Purchased Goods & Services",
    "Hotel Stays",
    "Capital Goods",
    "Fuel and Energy-Related Activities",
    "Upstream Transportation & Distribution",
    "Downstream Transportation & Distribution",
    "Use of Sold Products",
    "End-of-Life Treatment of Sold Products",
    "Leased Assets",
    "Franchises",
    "Investments",
];

fn category(name: &str) -> Option<&'static FactorCategory> {
    EMISSION_FACTORS.iter().find(|category| category.name == name)
}

#[must_use]
pub fn lookup(category_name: &str, activity: &str) -> Option<&'static EmissionFactor> {
    category(category_name)?.factors.iter().find(|factor| factor.activity == activity)
}

/// Activities with a factor row in `category_name`, in table order. Empty when unknown.
#[must_use]
pub fn activities(category_name: &str) -> Vec<&'static str> {
    category(category_name)
        .map(|category| category.factors.iter().map(|factor| factor.activity).collect())
        .unwrap_or_default()
}

#[must_use]
pub fn categories(scope: Scope) -> &'static [&'static str] {
    match scope {
        Scope::Scope1 => SCOPE_1_CATEGORIES,
        Scope::Scope2 => SCOPE_2_CATEGORIES,
        Scope::Scope3 => SCOPE_3_CATEGORIES,
    }
}

#[must_use]
pub fn unit(category_name: &str, activity: &str) -> Option<&'static str> {
    lookup(category_name, activity).map(|factor| factor.unit)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchMatch {
    pub category: &'static str,
    pub factors: Vec<&'static EmissionFactor>,
}

/// Case-insensitive substring search over category and activity names. A category
/// name match returns all of its activities.
#[must_use]
pub fn search(term: &str) -> Vec<SearchMatch> {
    let needle = term.to_lowercase();
    EMISSION_FACTORS
        .iter()
        .filter_map(|category| {
            let category_hit = category.name.to_lowercase().contains(&needle);
            let factors = category
                .factors
                .iter()
                .filter(|factor| category_hit || factor.activity.to_lowercase().contains(&needle))
                .collect::<Vec<_>>();
            (!factors.is_empty()).then_some(SearchMatch { category: category.name, factors })
        })
        .collect()
}

type MetricTable = &'static [(&'static str, f64)];

const INDUSTRY_BENCHMARKS: &[(&str, MetricTable)] = &[
    (
        "Ready Made Garments",
        &[("per_piece_garment", 5.2), ("per_kg_fabric", 8.1), ("electricity_intensity", 2.5)],
    ),
    ("Textiles", &[("per_kg_yarn", 12.5), ("per_kg_fabric", 15.8), ("per_meter_fabric", 0.95)]),
    ("Jute Processing", &[("per_kg_raw_jute", 0.82), ("per_kg_jute_product", 1.15)]),
    ("Leather", &[("per_sq_ft", 2.8), ("per_kg_leather", 17.0)]),
    ("Pharmaceuticals", &[("per_kg_product", 12.5), ("per_vial", 0.15)]),
    ("Steel", &[("per_tonne", 2580.0)]),
    ("Cement", &[("per_tonne", 820.0)]),
    ("Food Processing", &[("per_kg_rice", 2.7), ("per_kg_fish", 5.4)]),
];

fn metric(table: MetricTable, name: &str) -> Option<f64> {
    table.iter().find(|(key, _)| *key == name).map(|(_, value)| *value)
}

#[must_use]
pub fn industry_benchmark(industry: &str, metric_name: &str) -> Option<f64> {
    INDUSTRY_BENCHMARKS
        .iter()
        .find(|(name, _)| *name == industry)
        .and_then(|(_, table)| metric(*table, metric_name))
}

#[must_use]
pub fn industries() -> Vec<&'static str> {
    INDUSTRY_BENCHMARKS.iter().map(|(name, _)| *name).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Recommendation {
    pub key: &'static str,
    pub factor: f64,
    pub unit: &'static str,
    pub note: &'static str,
}

const RECOMMENDATIONS: &[Recommendation] = &[
    Recommendation {
        key: "electricity",
        factor: 0.6815,
        unit: "kWh",
        note: "Bangladesh national grid average (2023). Consider solar panels to reduce emissions.",
    },
    Recommendation {
        key: "diesel_generator",
        factor: 2.68787,
        unit: "liter",
        note: "Common backup power during load shedding. Consider battery storage with solar.",
    },
    Recommendation {
        key: "cng_transport",
        factor: 2.53721,
        unit: "kg",
        note: "Cleaner than petrol/diesel for Bangladesh urban transport.",
    },
    Recommendation {
        key: "jute_products",
        factor: 1.15,
        unit: "kg",
        note: "Bangladesh's eco-friendly fiber with low carbon footprint.",
    },
    Recommendation {
        key: "rmg_production",
        factor: 5.2,
        unit: "piece",
        note: "Ready-made garment production - major Bangladesh export sector.",
    },
];

#[must_use]
pub fn recommendation(key: &str) -> Option<&'static Recommendation> {
    RECOMMENDATIONS.iter().find(|recommendation| recommendation.key == key)
}

const REGIONAL_FACTORS: &[(&str, MetricTable)] = &[
    (
        "Dhaka",
        &[
            ("electricity_peak_demand", 1.2),
            ("transport_congestion", 1.15),
            ("waste_management", 0.9),
        ],
    ),
    (
        "Chittagong",
        &[
            ("electricity_peak_demand", 1.1),
            ("transport_congestion", 1.05),
            ("industrial_density", 1.25),
            ("port_activities", 1.3),
        ],
    ),
    (
        "Rajshahi",
        &[
            ("electricity_peak_demand", 1.0),
            ("agricultural_intensity", 0.8),
            ("biomass_availability", 0.7),
        ],
    ),
    (
        "Khulna",
        &[("electricity_peak_demand", 1.05), ("shrimp_farming", 1.4), ("mangrove_carbon", 0.6)],
    ),
    (
        "Sylhet",
        &[("electricity_peak_demand", 1.0), ("tea_industry", 0.9), ("gas_availability", 0.85)],
    ),
];

/// Adjustment multiplier for a division; 1.0 when the division or factor is unknown.
#[must_use]
pub fn regional_factor(region: &str, factor_type: &str) -> f64 {
    REGIONAL_FACTORS
        .iter()
        .find(|(name, _)| *name == region)
        .and_then(|(_, table)| metric(*table, factor_type))
        .unwrap_or(1.0)
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Monsoon,
    Winter,
    Summer,
}

impl Season {
    /// June through September is monsoon, December through February is winter.
    #[must_use]
    pub fn for_month(month: Month) -> Self {
        match month {
            Month::June | Month::July | Month::August | Month::September => Self::Monsoon,
            Month::December | Month::January | Month::February => Self::Winter,
            _ => Self::Summer,
        }
    }

    fn factors(self) -> MetricTable {
        match self {
            Self::Monsoon => &[
                ("electricity_demand", 0.85),
                ("transport_efficiency", 1.2),
                ("industrial_output", 0.9),
            ],
            Self::Winter => &[
                ("electricity_demand", 0.75),
                ("transport_efficiency", 1.0),
                ("industrial_output", 1.1),
            ],
            Self::Summer => &[
                ("electricity_demand", 1.4),
                ("transport_efficiency", 1.0),
                ("industrial_output", 1.0),
            ],
        }
    }
}

#[must_use]
pub fn seasonal_factor(season: Season, factor_type: &str) -> f64 {
    metric(season.factors(), factor_type).unwrap_or(1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarketRequirement {
    pub market: &'static str,
    pub reporting_required: bool,
    pub verification_needed: bool,
    pub effective_from: Option<&'static str>,
    pub affected_sectors: &'static [&'static str],
    pub voluntary_standards: &'static [&'static str],
    pub obligations: &'static [&'static str],
    pub documentation: &'static str,
}

const EXPORT_MARKET_REQUIREMENTS: &[MarketRequirement] = &[
    MarketRequirement {
        market: "European Union",
        reporting_required: true,
        verification_needed: true,
        effective_from: Some("2026-01-01"),
        affected_sectors: &["steel", "cement", "fertilizers", "aluminum", "electricity"],
        voluntary_standards: &[],
        obligations: &["Carbon Border Adjustment Mechanism (CBAM)"],
        documentation: "EU CBAM certificates required",
    },
    MarketRequirement {
        market: "United States",
        reporting_required: false,
        verification_needed: false,
        effective_from: None,
        affected_sectors: &["textiles", "apparel", "leather"],
        voluntary_standards: &["HIGG", "BCI", "GOTS"],
        obligations: &["buyer-specific sustainability requirements"],
        documentation: "Sustainability scorecards",
    },
    MarketRequirement {
        market: "Japan",
        reporting_required: false,
        verification_needed: false,
        effective_from: None,
        affected_sectors: &[],
        voluntary_standards: &[],
        obligations: &["voluntary carbon labeling", "green finance"],
        documentation: "Carbon footprint labels",
    },
    MarketRequirement {
        market: "United Kingdom",
        reporting_required: false,
        verification_needed: false,
        effective_from: None,
        affected_sectors: &[],
        voluntary_standards: &[],
        obligations: &["Modern Slavery Act", "environmental due diligence"],
        documentation: "Sustainability reports",
    },
];

#[must_use]
pub fn export_requirements(market: &str) -> Option<&'static MarketRequirement> {
    EXPORT_MARKET_REQUIREMENTS.iter().find(|requirement| requirement.market == market)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_factor_and_unit_resolve() {
        let Some(grid) = lookup("Electricity", "Bangladesh Grid") else {
            panic!("grid factor should exist");
        };
        assert_eq!(grid.factor, 0.6815);
        assert_eq!(unit("Stationary Combustion", "Diesel"), Some("liter"));
        assert_eq!(unit("Mobile Combustion", "Diesel"), Some("liter"));
        assert_eq!(lookup("Electricity", "Nuclear"), None);
        assert_eq!(lookup("Fugitive Emissions", "Diesel"), None);
    }

    #[test]
    fn every_factor_category_belongs_to_exactly_one_scope() {
        for category in EMISSION_FACTORS {
            let owners = Scope::ALL
                .iter()
                .filter(|scope| categories(**scope).contains(&category.name))
                .count();
            assert_eq!(owners, 1, "category {} must map to one scope", category.name);
            for factor in category.factors {
                assert!(factor.factor >= 0.0 && factor.factor.is_finite());
            }
        }
    }

    #[test]
    fn activities_preserve_table_order() {
        assert_eq!(
            activities("Steam"),
            vec!["Purchased Steam (Natural Gas)", "Purchased Steam (Biomass)"]
        );
        assert!(activities("District Cooling").is_empty());
    }

    #[test]
    fn search_matches_category_or_activity_case_insensitively() {
        let hits = search("RICKSHAW");
        let categories = hits.iter().map(|hit| hit.category).collect::<Vec<_>>();
        assert_eq!(categories, vec!["Business Travel", "Employee Commuting"]);
        assert_eq!(hits[1].factors.len(), 2);

        let steam = search("steam");
        assert_eq!(steam.len(), 1);
        assert_eq!(steam[0].factors.len(), 2);

        assert!(search("hovercraft").is_empty());
    }

    #[test]
    fn adjustment_tables_default_to_unity() {
        assert_eq!(regional_factor("Chittagong", "port_activities"), 1.3);
        assert_eq!(regional_factor("Barisal", "port_activities"), 1.0);
        assert_eq!(seasonal_factor(Season::Summer, "electricity_demand"), 1.4);
        assert_eq!(seasonal_factor(Season::Winter, "unknown"), 1.0);
        assert_eq!(Season::for_month(Month::July), Season::Monsoon);
        assert_eq!(Season::for_month(Month::January), Season::Winter);
        assert_eq!(Season::for_month(Month::April), Season::Summer);
    }

    #[test]
    fn benchmarks_recommendations_and_markets_resolve() {
        assert_eq!(industry_benchmark("Steel", "per_tonne"), Some(2580.0));
        assert_eq!(industry_benchmark("Steel", "per_vial"), None);
        assert_eq!(industries().first(), Some(&"Ready Made Garments"));
        assert_eq!(recommendation("diesel_generator").map(|r| r.factor), Some(2.68787));

        let Some(eu) = export_requirements("European Union") else {
            panic!("EU requirements should exist");
        };
        assert!(eu.reporting_required && eu.verification_needed);
        assert_eq!(export_requirements("China"), None);
    }
}

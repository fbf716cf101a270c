//! Cost of ownership per km² of a disaggregated RAN deployment.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cpu_estimator::CpuUtilization;
use crate::error::{Error, Result};
use crate::overhead::OverheadModel;
use crate::params::SimulationParameters;
use crate::traffic::TrafficCalculator;

/// Default ceiling of per-core utilization before virtualization overhead.
pub const MAX_CORE_UTILIZATION: f64 = 80.0;

/// Same-site optics span between the switch and the sector radios (meters).
const SECTOR_SFP_DISTANCE_M: f64 = 100.0;

/// L1 accelerator ports assumed per sector bundle in the unit count.
const L1_SECTORS_PER_CONTROLLER: f64 = 4.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Number(f64),
    Text(String),
}

/// One priced SKU with its capability attributes (ports, speed, distance,
/// cores, ...).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub price: f64,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl CatalogItem {
    /// Numeric attribute; `price` is addressable like any other attribute.
    pub fn attribute(&self, key: &str) -> Option<f64> {
        if key == "price" {
            return Some(self.price);
        }
        match self.attributes.get(key) {
            Some(AttributeValue::Number(value)) => Some(*value),
            _ => None,
        }
    }

    fn required(&self, category: &str, key: &str) -> Result<f64> {
        self.attribute(key).ok_or_else(|| {
            Error::configuration(
                format!("catalog.{category}.{key}"),
                format!(
                    "numeric attribute missing on `{}`",
                    self.model.as_deref().unwrap_or("unnamed item")
                ),
            )
        })
    }
}

/// Category name to SKU list.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CostCatalog {
    categories: BTreeMap<String, Vec<CatalogItem>>,
}

impl CostCatalog {
    pub fn new(categories: BTreeMap<String, Vec<CatalogItem>>) -> CostCatalog {
        CostCatalog { categories }
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<CostCatalog> {
        let path = path.as_ref();
        let catalog: CostCatalog = toml::from_str(&std::fs::read_to_string(path)?)?;
        info!(path = %path.display(), categories = catalog.categories.len(), "loaded cost catalog");
        Ok(catalog)
    }

    pub fn category(&self, category: &str) -> Result<&[CatalogItem]> {
        self.categories
            .get(category)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::configuration(format!("catalog.{category}"), "missing category"))
    }
}

/// Counts and prices of compute for one node at a given utilization.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ServerCost {
    pub cpu_price: f64,
    pub server_price: f64,
    pub number_of_cpus: f64,
    pub number_of_servers: f64,
}

/// Inputs of one cost run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CostRequest {
    pub sites_per_km2: f64,
    pub capacity_gbps: f64, // per sector
    pub rudu_distance: f64, // m
    pub ducu_distance: f64, // m
    pub utilization: CpuUtilization,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CostReport {
    /// USD per km² over the asset lifetime.
    pub cost_breakdown: BTreeMap<String, f64>,
    /// Units for one branch of `ru_du_ratio x du_cuup_ratio` radios.
    pub components_breakdown: BTreeMap<String, f64>,
}

impl CostReport {
    pub fn total_cost(&self) -> f64 {
        self.cost_breakdown.values().sum()
    }
}

/// Sites per km² when hexagonal cells of `site_radius` meters tile the plane.
pub fn sites_per_km2(site_radius: f64) -> Result<f64> {
    if !(site_radius > 0.0) {
        return Err(Error::DegenerateInput(format!(
            "site radius must be positive, got {site_radius} m"
        )));
    }
    let inter_site_distance = 2.0 * site_radius;
    let site_area_km2 = (3f64.sqrt() / 2.0) * inter_site_distance.powi(2) / 1e6;
    Ok(1.0 / site_area_km2)
}

pub struct CostEngine<'a> {
    params: &'a SimulationParameters,
    catalog: &'a CostCatalog,
    overhead: &'a dyn OverheadModel,
}

impl<'a> CostEngine<'a> {
    pub fn new(
        params: &'a SimulationParameters,
        catalog: &'a CostCatalog,
        overhead: &'a dyn OverheadModel,
    ) -> CostEngine<'a> {
        CostEngine {
            params,
            catalog,
            overhead,
        }
    }

    /// Total cost of ownership over `asset_lifetime` years. Capex adds the
    /// upfront price to yearly maintenance of `opex_percentage_of_capex`
    /// (rounded to whole dollars); opex is the yearly price itself. Year
    /// zero is undiscounted.
    pub fn discount_ownership_cost(&self, cost: f64, capex: bool) -> f64 {
        let rate = self.params.discount_rate / 100.0;
        let (upfront, yearly) = if capex {
            let maintenance = (cost * self.params.opex_percentage_of_capex / 100.0).round_ties_even();
            (cost, maintenance)
        } else {
            (0.0, cost)
        };
        upfront
            + (0..self.params.asset_lifetime)
                .map(|year| yearly / (1.0 + rate).powi(year as i32))
                .sum::<f64>()
    }

    /// Cheapest item of `category` whose every constrained attribute is at
    /// least the requested value. Ties keep the first listed item.
    pub fn cost_optimized(&self, category: &str, constraints: &[(&str, f64)]) -> Result<&'a CatalogItem> {
        let mut selected: Option<&CatalogItem> = None;
        for item in self.catalog.category(category)? {
            let mut satisfied = true;
            for (key, minimum) in constraints {
                if item.required(category, key)? < *minimum {
                    satisfied = false;
                    break;
                }
            }
            if satisfied && selected.map_or(true, |best| item.price < best.price) {
                selected = Some(item);
            }
        }

        let item = selected.ok_or_else(|| Error::NotFound {
            category: category.to_string(),
            constraints: describe(constraints),
        })?;
        debug!(
            category,
            model = item.model.as_deref().unwrap_or("-"),
            price = item.price,
            "selected catalog item"
        );
        Ok(item)
    }

    fn price(&self, category: &str, constraints: &[(&str, f64)]) -> Result<f64> {
        Ok(self.cost_optimized(category, constraints)?.price)
    }

    /// CPUs and servers needed for `cpu_util` percent, with the first `cpu`
    /// and `server` SKUs of the catalog.
    pub fn server_cost(&self, cpu_util: f64, max_utilization: f64) -> Result<ServerCost> {
        let p = self.params;
        let overhead = self.overhead.overhead(
            p.type_of_server,
            p.type_of_virtualization,
            p.prop_or_not,
            p.n_virtual_machines,
        )?;
        let headroom = max_utilization - overhead;
        if !(headroom > 0.0) {
            return Err(Error::DegenerateInput(format!(
                "virtualization overhead {overhead}% leaves no headroom under {max_utilization}%"
            )));
        }
        if cpu_util > 100.0 {
            warn!(cpu_util, "sizing servers for an overloaded node");
        }

        let cpu = first_item(self.catalog, "cpu")?;
        let server = first_item(self.catalog, "server")?;

        let number_of_cores = cpu_util / headroom;
        let number_of_cpus = number_of_cores / cpu.required("cpu", "cores")?;
        let number_of_servers = number_of_cpus / server.required("server", "cpu_max")?;

        Ok(ServerCost {
            cpu_price: number_of_cpus * cpu.price,
            server_price: number_of_servers * server.price,
            number_of_cpus,
            number_of_servers,
        })
    }

    pub fn get_cost(&self, request: &CostRequest) -> Result<CostReport> {
        let p = self.params;
        let sectors = p.sectorization as f64;
        let sites = request.sites_per_km2;
        let sites_per_du = sites * sectors / p.ru_du_ratio;
        let site_capacity = request.capacity_gbps * sectors;
        let fronthaul = TrafficCalculator::new(p)?.ecpri_throughput() * sectors;
        let f1u = site_capacity * p.ru_du_ratio * (1.0 - p.signaling_overhead);
        let f1c = site_capacity * p.ru_du_ratio * p.signaling_overhead;

        let capex = |price: f64| self.discount_ownership_cost(price, true);
        let opex = |price: f64| self.discount_ownership_cost(price, false);

        let leased_line_capex = |speed: f64, distance: f64| -> Result<f64> {
            let fixed = self.price("lease_line_installation", &[("speed", speed)])?;
            let per_meter = self.price("lease_line_installation_per_meter", &[("speed", speed)])?;
            Ok(capex(fixed + per_meter * distance))
        };
        let leased_line_opex =
            |speed: f64| -> Result<f64> { Ok(opex(self.price("lease_line_rental", &[("speed", speed)])?)) };

        let l1 = self.cost_optimized("l1_controller", &[])?;
        let l1_ports = l1.required("l1_controller", "ports")?;

        let cucp = self.server_cost(request.utilization.cucp_utils, MAX_CORE_UTILIZATION)?;
        let cuup = self.server_cost(request.utilization.cuup_utils, MAX_CORE_UTILIZATION)?;
        let du = self.server_cost(request.utilization.du_utils, MAX_CORE_UTILIZATION)?;

        let mut costs = BTreeMap::new();
        let mut put = |name: &str, value: f64| {
            costs.insert(name.to_string(), value);
        };
        put(
            "single_sector_antenna",
            capex(self.price("single_sector_antenna", &[])?) * sectors * sites,
        );
        put("ru", capex(self.price("ru", &[])?) * sectors * sites);
        put("tower", self.price("tower", &[])? * sites);
        put("transportation", self.price("transportation", &[])? * sites);
        put("installation", self.price("installation", &[])? * sites);
        put("site_rental", opex(self.price("site_rental", &[])?) * sites);
        put(
            "power_generator_battery_system",
            capex(self.price("power_generator_battery_system", &[])?) * sites,
        );
        put(
            "fiber_switch",
            capex(self.price("switch", &[("ports", sectors + 1.0), ("speed", site_capacity)])?) * sites,
        );
        // one optic at the radio site and one at the DU
        put(
            "sfp_ru",
            capex(self.price(
                "sfp",
                &[("distance", request.rudu_distance), ("speed", site_capacity)],
            )?) * 2.0
                * sites,
        );
        put(
            "sfp_sectors",
            capex(self.price(
                "sfp",
                &[("distance", SECTOR_SFP_DISTANCE_M), ("speed", request.capacity_gbps)],
            )?) * sectors
                * sites,
        );
        put(
            "eCPRI_leased_line_capex",
            leased_line_capex(fronthaul, request.rudu_distance)? * sites,
        );
        put("eCPRI_leased_line_opex", leased_line_opex(fronthaul)? * sites);
        put(
            "f1u_leased_line_capex",
            leased_line_capex(f1u, request.ducu_distance)? * sites_per_du,
        );
        put("f1u_leased_line_opex", leased_line_opex(f1u)? * sites_per_du);
        put(
            "f1c_leased_line_capex",
            leased_line_capex(f1c, request.ducu_distance)? * sites_per_du,
        );
        put("f1c_leased_line_opex", leased_line_opex(f1c)? * sites_per_du);
        put("l1_controller", capex(l1.price) * sites / l1_ports);
        for (role, server) in [("cucp", &cucp), ("cuup", &cuup), ("du", &du)] {
            put(&format!("{role}_cpu"), capex(server.cpu_price) * sectors * sites);
            put(&format!("{role}_server"), capex(server.server_price) * sectors * sites);
        }

        let site_count = p.ru_du_ratio * p.du_cuup_ratio / sectors;
        let mut components = BTreeMap::new();
        let mut count = |name: &str, value: f64| {
            components.insert(name.to_string(), value);
        };
        count("single_sector_antenna", site_count * sectors);
        count("ru", site_count * sectors);
        count("tower", site_count);
        count("power_generator_battery_system", site_count);
        count("fiber_switch", site_count);
        count("sfp", site_count * sectors * 2.0);
        count("eCPRI_Throughput(Gbps)", fronthaul);
        count("f1u_Throughput(Gbps)", f1u);
        count("f1c_Throughput(Gbps)", f1c);
        count("l1_controller", site_count * sectors / L1_SECTORS_PER_CONTROLLER);
        for (role, server) in [("cucp", &cucp), ("cuup", &cuup), ("du", &du)] {
            count(&format!("{role}_cpu"), server.number_of_cpus * sectors * site_count);
            count(&format!("{role}_server"), server.number_of_servers * sectors * site_count);
        }

        let report = CostReport {
            cost_breakdown: costs,
            components_breakdown: components,
        };
        info!(total = report.total_cost(), sites_per_km2 = sites, "cost per km2");
        Ok(report)
    }
}

fn first_item<'c>(catalog: &'c CostCatalog, category: &str) -> Result<&'c CatalogItem> {
    catalog.category(category)?.first().ok_or_else(|| Error::NotFound {
        category: category.to_string(),
        constraints: "any item".to_string(),
    })
}

fn describe(constraints: &[(&str, f64)]) -> String {
    if constraints.is_empty() {
        return "no constraints".to_string();
    }
    constraints
        .iter()
        .map(|(key, value)| format!("{key} >= {value}"))
        .collect::<Vec<_>>()
        .join(", ")
}

//! Simulation configuration
//!
//! This module defines the parameter records for products, pipeline
//! stages, suppliers, demand, quality and financials, plus the two
//! factory presets (tile and sanitary ware) and the four standard
//! scenarios. The kernel and the factory model consume these records;
//! they never reach into variant-specific constants.
//!
//! All time values are virtual HOURS; raw-material quantities are
//! tonnes; product quantities are square metres (tile family) or whole
//! units (sanitary family).

use thiserror::Error;

use crate::core_types::Qty;
use crate::models::StageStamp;

/// How product quantities behave arithmetically.
///
/// `SquareMeters` quantities stay fractional through the quality split;
/// `Units` quantities are floored to whole pieces wherever a split
/// could produce a fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityKind {
    SquareMeters,
    Units,
}

/// One sellable product.
#[derive(Debug, Clone)]
pub struct ProductSpec {
    pub key: String,
    pub name: String,
    /// Ex-works price per m² or per unit
    pub unit_price_eur: f64,
    /// Green body weight consumed per m² or per unit (kg)
    pub body_kg: f64,
    /// Wet glaze applied per m² or per unit (kg)
    pub glaze_kg: f64,
    pub needs_glaze: bool,
    /// Fraction of customer demand landing on this product
    pub demand_share: f64,
    /// Display colour for report tooling
    pub color: String,
}

/// What a pipeline stage does with a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageRole {
    /// Consumes raw minerals, fills the bulk buffer
    BulkPrep,
    /// Drains the bulk buffer, assigns a product, creates the batch
    Forming,
    /// Batch-in, batch-out transformation; stamps one timestamp
    Transform {
        stamp: StageStamp,
        consumes_glaze: bool,
    },
    /// Quality split and hand-off to the finished-goods warehouse
    Finishing,
}

/// One group of identical machines plus its stochastic behaviour.
#[derive(Debug, Clone)]
pub struct StageSpec {
    pub key: String,
    pub name: String,
    pub role: StageRole,
    /// Machine count = worker count for the stage
    pub count: usize,
    pub proc_mean_hr: f64,
    pub proc_std_hr: f64,
    pub mtbf_hr: f64,
    pub mttr_hr: f64,
}

/// One raw-material supplier (one supplier per material).
#[derive(Debug, Clone)]
pub struct SupplierSpec {
    pub material: String,
    pub name: String,
    pub delivery_qty_t: f64,
    pub lead_time_mean_hr: f64,
    pub lead_time_std_hr: f64,
    /// Probability a delivery arrives on time
    pub reliability: f64,
    pub unit_cost_eur_t: f64,
    /// Replenishment triggers below this level (scaled by the
    /// scenario's safety-stock factor)
    pub reorder_point_t: f64,
    pub max_stock_t: f64,
}

/// Customer demand shape.
#[derive(Debug, Clone)]
pub struct DemandSpec {
    pub mean_orders_per_day: f64,
    pub mean_order_qty: Qty,
    pub std_order_qty: Qty,
    pub min_order_qty: Qty,
    pub std_lead_time_days: f64,
    pub express_lead_time_days: f64,
    pub express_fraction: f64,
    pub express_premium: f64,
}

/// Quality split applied at finishing. Rates must sum to 1.
#[derive(Debug, Clone)]
pub struct QualitySpec {
    pub grade_a_rate: f64,
    pub grade_b_rate: f64,
    pub reject_rate: f64,
    pub grade_b_price_factor: f64,
    /// Present for the sanitary family only
    pub functional_tests: Option<FunctionalTestSpec>,
}

#[derive(Debug, Clone)]
pub struct FunctionalTestSpec {
    pub leak_pass_rate: f64,
    pub flush_pass_rate: f64,
}

#[derive(Debug, Clone)]
pub struct FinancialSpec {
    pub energy_cost_per_batch_eur: f64,
    pub labor_cost_per_shift_eur: f64,
    pub shifts_per_day: f64,
    pub breakdown_repair_cost_eur: f64,
    /// Lost margin + expediting cost per m² or unit short
    pub stockout_penalty_eur: f64,
    pub holding_cost_pct_per_year: f64,
}

/// A what-if overlay on top of a factory preset.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub key: String,
    pub label: String,
    pub description: String,
    pub demand_factor: f64,
    pub machine_reliability_factor: f64,
    pub supplier_reliability_factor: f64,
    pub extra_kilns: usize,
    pub safety_stock_factor: f64,
    /// `(start_hr, end_hr)` during which no new kaolin orders are placed
    pub kaolin_disruption: Option<(f64, f64)>,
}

impl Scenario {
    pub fn baseline() -> Self {
        Scenario {
            key: "baseline".into(),
            label: "Baseline".into(),
            description: "Normal 90-day operations - balanced supply & demand".into(),
            demand_factor: 1.0,
            machine_reliability_factor: 1.0,
            supplier_reliability_factor: 1.0,
            extra_kilns: 0,
            safety_stock_factor: 1.0,
            kaolin_disruption: None,
        }
    }

    /// The four standard scenarios, in presentation order.
    pub fn all() -> Vec<Scenario> {
        vec![
            Scenario::baseline(),
            Scenario {
                key: "supply_disruption".into(),
                label: "Supply Disruption".into(),
                description: "35-day kaolin port strike (day 15-50)".into(),
                kaolin_disruption: Some((15.0 * 24.0, 50.0 * 24.0)),
                ..Scenario::baseline()
            },
            Scenario {
                key: "demand_surge".into(),
                label: "Demand Surge".into(),
                description: "Construction boom - 30% demand uplift across all products".into(),
                demand_factor: 1.30,
                ..Scenario::baseline()
            },
            Scenario {
                key: "optimised".into(),
                label: "Optimised".into(),
                description: "One extra kiln + 50% safety-stock uplift".into(),
                extra_kilns: 1,
                safety_stock_factor: 1.5,
                ..Scenario::baseline()
            },
        ]
    }

    pub fn by_key(key: &str) -> Option<Scenario> {
        Scenario::all().into_iter().find(|s| s.key == key)
    }
}

/// Complete factory parameter set. Built by one of the presets (or by
/// hand in tests) and validated once at factory construction.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub factory_name: String,
    pub sim_days: u32,
    pub hours_per_day: f64,
    /// Fundamental granule of the simulation: quantity per batch
    pub batch_size: Qty,
    pub quantity_kind: QuantityKind,
    pub products: Vec<ProductSpec>,
    /// Fraction of dry body weight per mineral; must sum to 1
    pub body_composition: Vec<(String, f64)>,
    /// Pipeline order: bulk prep, forming, transforms, finishing
    pub stages: Vec<StageSpec>,
    pub suppliers: Vec<SupplierSpec>,
    /// Tonnes on hand at time zero, per material
    pub initial_inventory: Vec<(String, f64)>,
    pub bulk_buffer_capacity: Qty,
    pub bulk_buffer_initial: Qty,
    /// Finished goods on hand at time zero / warehouse cap, per product
    pub fg_initial: Vec<(String, Qty)>,
    pub fg_max: Vec<(String, Qty)>,
    pub demand: DemandSpec,
    pub customers: Vec<String>,
    pub quality: QualitySpec,
    pub financial: FinancialSpec,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("body composition fractions sum to {0}, expected 1.0")]
    CompositionSum(f64),
    #[error("quality rates sum to {0}, expected 1.0")]
    QualityRateSum(f64),
    #[error("stage {0} has no machines")]
    EmptyStage(String),
    #[error("pipeline must be bulk prep, forming, one or more transforms, finishing")]
    StageOrder,
    #[error("no supplier for material {0}")]
    UnknownMaterial(String),
    #[error("no initial inventory entry for material {0}")]
    MissingInventory(String),
    #[error("product {0} is missing a finished-goods entry")]
    MissingFinishedGoods(String),
    #[error("{0} must be positive")]
    NonPositive(&'static str),
    #[error("negative value in {0}")]
    Negative(&'static str),
}

impl SimConfig {
    pub fn horizon_hours(&self) -> f64 {
        f64::from(self.sim_days) * self.hours_per_day
    }

    /// Demand-weighted average body weight per m² or unit (kg).
    pub fn avg_body_kg(&self) -> f64 {
        self.products
            .iter()
            .map(|p| p.body_kg * p.demand_share)
            .sum()
    }

    pub fn product(&self, key: &str) -> &ProductSpec {
        self.products
            .iter()
            .find(|p| p.key == key)
            .unwrap_or_else(|| panic!("unknown product {key}"))
    }

    pub fn supplier(&self, material: &str) -> &SupplierSpec {
        self.suppliers
            .iter()
            .find(|s| s.material == material)
            .unwrap_or_else(|| panic!("unknown material {material}"))
    }

    pub fn initial_inventory_t(&self, material: &str) -> f64 {
        self.initial_inventory
            .iter()
            .find(|(m, _)| m == material)
            .map(|(_, t)| *t)
            .unwrap_or(0.0)
    }

    pub fn fg_initial_for(&self, product: &str) -> Qty {
        self.fg_initial
            .iter()
            .find(|(p, _)| p == product)
            .map(|(_, q)| *q)
            .unwrap_or(0.0)
    }

    pub fn fg_max_for(&self, product: &str) -> Qty {
        self.fg_max
            .iter()
            .find(|(p, _)| p == product)
            .map(|(_, q)| *q)
            .unwrap_or(0.0)
    }

    /// The stage holding the kiln role (the one scenarios add machines
    /// to): the transform that stamps the firing timestamp.
    pub fn kiln_stage(&self) -> &StageSpec {
        self.stages
            .iter()
            .find(|s| {
                matches!(
                    s.role,
                    StageRole::Transform {
                        stamp: StageStamp::Fired,
                        ..
                    }
                )
            })
            .expect("pipeline has no kiln stage")
    }

    /// Round a quantity down to whole pieces for the unit family; no-op
    /// for the continuous family.
    pub fn quantize(&self, qty: Qty) -> Qty {
        match self.quantity_kind {
            QuantityKind::SquareMeters => qty,
            QuantityKind::Units => qty.floor(),
        }
    }

    /// Fail fast on inconsistent parameters (fractions not summing,
    /// empty stages, missing cross-references).
    pub fn validate(&self) -> Result<(), ConfigError> {
        const TOL: f64 = 1e-9;

        let comp_sum: f64 = self.body_composition.iter().map(|(_, f)| f).sum();
        if (comp_sum - 1.0).abs() > TOL {
            return Err(ConfigError::CompositionSum(comp_sum));
        }
        let q = &self.quality;
        let rate_sum = q.grade_a_rate + q.grade_b_rate + q.reject_rate;
        if (rate_sum - 1.0).abs() > TOL {
            return Err(ConfigError::QualityRateSum(rate_sum));
        }
        if q.grade_a_rate < 0.0 || q.grade_b_rate < 0.0 || q.reject_rate < 0.0 {
            return Err(ConfigError::Negative("quality rates"));
        }

        if self.batch_size <= 0.0 {
            return Err(ConfigError::NonPositive("batch size"));
        }
        if self.sim_days == 0 || self.hours_per_day <= 0.0 {
            return Err(ConfigError::NonPositive("simulation horizon"));
        }
        if self.demand.mean_orders_per_day <= 0.0 {
            return Err(ConfigError::NonPositive("mean orders per day"));
        }

        // Pipeline shape: bulk prep, forming, transforms, finishing
        let roles_ok = self.stages.len() >= 4
            && self.stages[0].role == StageRole::BulkPrep
            && self.stages[1].role == StageRole::Forming
            && self.stages.last().unwrap().role == StageRole::Finishing
            && self.stages[2..self.stages.len() - 1]
                .iter()
                .all(|s| matches!(s.role, StageRole::Transform { .. }));
        if !roles_ok {
            return Err(ConfigError::StageOrder);
        }
        for stage in &self.stages {
            if stage.count == 0 {
                return Err(ConfigError::EmptyStage(stage.key.clone()));
            }
            if stage.proc_mean_hr <= 0.0 || stage.mtbf_hr <= 0.0 || stage.mttr_hr <= 0.0 {
                return Err(ConfigError::NonPositive("stage timing parameters"));
            }
        }

        let glaze_needed = self.stages.iter().any(|s| {
            matches!(
                s.role,
                StageRole::Transform {
                    consumes_glaze: true,
                    ..
                }
            )
        });
        let mut materials: Vec<&str> = self
            .body_composition
            .iter()
            .map(|(m, _)| m.as_str())
            .collect();
        if glaze_needed {
            materials.push("glaze");
        }
        for mat in materials {
            if !self.suppliers.iter().any(|s| s.material == mat) {
                return Err(ConfigError::UnknownMaterial(mat.to_string()));
            }
        }
        for sup in &self.suppliers {
            if !self.initial_inventory.iter().any(|(m, _)| m == &sup.material) {
                return Err(ConfigError::MissingInventory(sup.material.clone()));
            }
            if sup.delivery_qty_t <= 0.0 || sup.max_stock_t <= 0.0 {
                return Err(ConfigError::NonPositive("supplier quantities"));
            }
            if sup.reliability < 0.0 || sup.reorder_point_t < 0.0 {
                return Err(ConfigError::Negative("supplier parameters"));
            }
        }
        for product in &self.products {
            let has_init = self.fg_initial.iter().any(|(p, _)| p == &product.key);
            let has_max = self.fg_max.iter().any(|(p, _)| p == &product.key);
            if !has_init || !has_max {
                return Err(ConfigError::MissingFinishedGoods(product.key.clone()));
            }
            if product.demand_share < 0.0 || product.body_kg < 0.0 || product.glaze_kg < 0.0 {
                return Err(ConfigError::Negative("product parameters"));
            }
        }
        Ok(())
    }

    /// AzulCer tile works: floating m², five stages, two roller hearth
    /// kilns at 4 h/batch (12 batches ≈ 3 000 m²/day theoretical max).
    pub fn tile() -> Self {
        SimConfig {
            factory_name: "AzulCer Tile Industries".into(),
            sim_days: 90,
            hours_per_day: 24.0,
            batch_size: 250.0,
            quantity_kind: QuantityKind::SquareMeters,
            products: vec![
                ProductSpec {
                    key: "PORC-60".into(),
                    name: "Porcelain 60x60 Floor Tile".into(),
                    unit_price_eur: 22.0,
                    body_kg: 19.5,
                    glaze_kg: 1.1,
                    needs_glaze: true,
                    demand_share: 0.40,
                    color: "#2E86AB".into(),
                },
                ProductSpec {
                    key: "CER-45".into(),
                    name: "Ceramic 45x45 Wall Tile".into(),
                    unit_price_eur: 14.0,
                    body_kg: 16.0,
                    glaze_kg: 1.0,
                    needs_glaze: true,
                    demand_share: 0.35,
                    color: "#A23B72".into(),
                },
                ProductSpec {
                    key: "DECO-30".into(),
                    name: "Decor 30x30 Accent Tile".into(),
                    unit_price_eur: 30.0,
                    body_kg: 17.0,
                    glaze_kg: 1.4,
                    needs_glaze: true,
                    demand_share: 0.25,
                    color: "#F18F01".into(),
                },
            ],
            body_composition: vec![
                ("clay".into(), 0.55),
                ("kaolin".into(), 0.20),
                ("feldspar".into(), 0.15),
                ("silica".into(), 0.10),
            ],
            stages: vec![
                StageSpec {
                    key: "body_prep".into(),
                    name: "Body Preparation Line".into(),
                    role: StageRole::BulkPrep,
                    count: 2,
                    proc_mean_hr: 3.0,
                    proc_std_hr: 0.4,
                    mtbf_hr: 400.0,
                    mttr_hr: 4.0,
                },
                StageSpec {
                    key: "forming".into(),
                    name: "Hydraulic Press Line".into(),
                    role: StageRole::Forming,
                    count: 3,
                    proc_mean_hr: 2.0,
                    proc_std_hr: 0.3,
                    mtbf_hr: 500.0,
                    mttr_hr: 2.5,
                },
                StageSpec {
                    key: "glazing".into(),
                    name: "Glaze Line".into(),
                    role: StageRole::Transform {
                        stamp: StageStamp::Glazed,
                        consumes_glaze: true,
                    },
                    count: 2,
                    proc_mean_hr: 1.0,
                    proc_std_hr: 0.15,
                    mtbf_hr: 450.0,
                    mttr_hr: 3.0,
                },
                StageSpec {
                    key: "kiln".into(),
                    name: "Roller Hearth Kiln".into(),
                    role: StageRole::Transform {
                        stamp: StageStamp::Fired,
                        consumes_glaze: false,
                    },
                    count: 2,
                    proc_mean_hr: 4.0,
                    proc_std_hr: 0.5,
                    mtbf_hr: 600.0,
                    mttr_hr: 6.0,
                },
                StageSpec {
                    key: "finishing".into(),
                    name: "Sorting & Packaging Line".into(),
                    role: StageRole::Finishing,
                    count: 3,
                    proc_mean_hr: 1.0,
                    proc_std_hr: 0.2,
                    mtbf_hr: 800.0,
                    mttr_hr: 1.0,
                },
            ],
            // Delivery sizes cap mineral inflow just under the body
            // preparation rate, so supply (not the prep lines) paces
            // the head of the pipeline while the kiln stays saturated
            suppliers: vec![
                SupplierSpec {
                    material: "clay".into(),
                    name: "ClayMin Lda".into(),
                    delivery_qty_t: 38.0,
                    lead_time_mean_hr: 48.0,
                    lead_time_std_hr: 8.0,
                    reliability: 0.92,
                    unit_cost_eur_t: 85.0,
                    reorder_point_t: 90.0,
                    max_stock_t: 180.0,
                },
                SupplierSpec {
                    material: "kaolin".into(),
                    name: "KaolinMine S.A.".into(),
                    delivery_qty_t: 24.0,
                    lead_time_mean_hr: 72.0,
                    lead_time_std_hr: 16.0,
                    reliability: 0.82,
                    unit_cost_eur_t: 110.0,
                    reorder_point_t: 40.0,
                    max_stock_t: 100.0,
                },
                SupplierSpec {
                    material: "feldspar".into(),
                    name: "FeldsparCo S.L.".into(),
                    delivery_qty_t: 10.0,
                    lead_time_mean_hr: 42.0,
                    lead_time_std_hr: 8.0,
                    reliability: 0.88,
                    unit_cost_eur_t: 120.0,
                    reorder_point_t: 24.0,
                    max_stock_t: 60.0,
                },
                SupplierSpec {
                    material: "silica".into(),
                    name: "SilicaTech Lda".into(),
                    delivery_qty_t: 6.0,
                    lead_time_mean_hr: 36.0,
                    lead_time_std_hr: 6.0,
                    reliability: 0.91,
                    unit_cost_eur_t: 95.0,
                    reorder_point_t: 16.0,
                    max_stock_t: 40.0,
                },
                SupplierSpec {
                    material: "glaze".into(),
                    name: "ChemGlaze GmbH".into(),
                    delivery_qty_t: 9.0,
                    lead_time_mean_hr: 72.0,
                    lead_time_std_hr: 14.0,
                    reliability: 0.85,
                    unit_cost_eur_t: 280.0,
                    reorder_point_t: 11.0,
                    max_stock_t: 36.0,
                },
            ],
            initial_inventory: vec![
                ("clay".into(), 120.0),
                ("kaolin".into(), 45.0),
                ("feldspar".into(), 36.0),
                ("silica".into(), 24.0),
                ("glaze".into(), 15.0),
            ],
            bulk_buffer_capacity: 2_000.0,
            bulk_buffer_initial: 250.0,
            fg_initial: vec![
                ("PORC-60".into(), 4_000.0),
                ("CER-45".into(), 3_200.0),
                ("DECO-30".into(), 1_800.0),
            ],
            fg_max: vec![
                ("PORC-60".into(), 40_000.0),
                ("CER-45".into(), 40_000.0),
                ("DECO-30".into(), 40_000.0),
            ],
            demand: DemandSpec {
                mean_orders_per_day: 9.0,
                mean_order_qty: 280.0,
                std_order_qty: 90.0,
                min_order_qty: 50.0,
                std_lead_time_days: 7.0,
                express_lead_time_days: 3.0,
                express_fraction: 0.20,
                express_premium: 1.15,
            },
            customers: default_customers(),
            quality: QualitySpec {
                grade_a_rate: 0.82,
                grade_b_rate: 0.12,
                reject_rate: 0.06,
                grade_b_price_factor: 0.70,
                functional_tests: None,
            },
            financial: FinancialSpec {
                energy_cost_per_batch_eur: 190.0,
                labor_cost_per_shift_eur: 2_800.0,
                shifts_per_day: 3.0,
                breakdown_repair_cost_eur: 2_500.0,
                stockout_penalty_eur: 8.0,
                holding_cost_pct_per_year: 0.20,
            },
        }
    }

    /// SaniCer sanitary works: whole units, seven stages, one tunnel
    /// kiln on a 24 h cycle (the designed bottleneck), functional leak
    /// and flush testing after the quality split.
    pub fn sanitary() -> Self {
        SimConfig {
            factory_name: "SaniCer Sanitary Ware Industries".into(),
            sim_days: 90,
            hours_per_day: 24.0,
            batch_size: 50.0,
            quantity_kind: QuantityKind::Units,
            products: vec![
                ProductSpec {
                    key: "ONE-PIECE-STD".into(),
                    name: "One-Piece Standard Commode".into(),
                    unit_price_eur: 180.0,
                    body_kg: 35.0,
                    glaze_kg: 2.5,
                    needs_glaze: true,
                    demand_share: 0.45,
                    color: "#2E86AB".into(),
                },
                ProductSpec {
                    key: "TWO-PIECE-ECO".into(),
                    name: "Two-Piece Economy Commode".into(),
                    unit_price_eur: 120.0,
                    body_kg: 28.0,
                    glaze_kg: 2.0,
                    needs_glaze: true,
                    demand_share: 0.35,
                    color: "#A23B72".into(),
                },
                ProductSpec {
                    key: "WALL-HUNG-PREM".into(),
                    name: "Wall-Hung Premium Commode".into(),
                    unit_price_eur: 280.0,
                    body_kg: 22.0,
                    glaze_kg: 1.8,
                    needs_glaze: true,
                    demand_share: 0.20,
                    color: "#F18F01".into(),
                },
            ],
            body_composition: vec![
                ("clay".into(), 0.40),
                ("kaolin".into(), 0.25),
                ("feldspar".into(), 0.20),
                ("silica".into(), 0.15),
            ],
            stages: vec![
                StageSpec {
                    key: "slip_prep".into(),
                    name: "Slip Preparation Line".into(),
                    role: StageRole::BulkPrep,
                    count: 2,
                    proc_mean_hr: 4.0,
                    proc_std_hr: 0.5,
                    mtbf_hr: 350.0,
                    mttr_hr: 5.0,
                },
                StageSpec {
                    key: "casting".into(),
                    name: "Pressure Casting Mold Set".into(),
                    role: StageRole::Forming,
                    count: 8,
                    proc_mean_hr: 6.0,
                    proc_std_hr: 0.8,
                    mtbf_hr: 400.0,
                    mttr_hr: 3.5,
                },
                StageSpec {
                    key: "demolding".into(),
                    name: "Demolding & Initial Drying".into(),
                    role: StageRole::Transform {
                        stamp: StageStamp::Demolded,
                        consumes_glaze: false,
                    },
                    count: 3,
                    proc_mean_hr: 18.0,
                    proc_std_hr: 2.0,
                    mtbf_hr: 500.0,
                    mttr_hr: 2.0,
                },
                StageSpec {
                    key: "fettling".into(),
                    name: "Fettling & Trimming Station".into(),
                    role: StageRole::Transform {
                        stamp: StageStamp::Fettled,
                        consumes_glaze: false,
                    },
                    count: 6,
                    proc_mean_hr: 2.5,
                    proc_std_hr: 0.4,
                    mtbf_hr: 600.0,
                    mttr_hr: 1.5,
                },
                StageSpec {
                    key: "glazing".into(),
                    name: "Spray Glazing Booth".into(),
                    role: StageRole::Transform {
                        stamp: StageStamp::Glazed,
                        consumes_glaze: true,
                    },
                    count: 4,
                    proc_mean_hr: 1.2,
                    proc_std_hr: 0.2,
                    mtbf_hr: 450.0,
                    mttr_hr: 3.0,
                },
                StageSpec {
                    key: "kiln".into(),
                    name: "Tunnel Kiln".into(),
                    role: StageRole::Transform {
                        stamp: StageStamp::Fired,
                        consumes_glaze: false,
                    },
                    count: 1,
                    proc_mean_hr: 24.0,
                    proc_std_hr: 2.0,
                    mtbf_hr: 720.0,
                    mttr_hr: 8.0,
                },
                StageSpec {
                    key: "finishing".into(),
                    name: "Quality Control & Packaging".into(),
                    role: StageRole::Finishing,
                    count: 4,
                    proc_mean_hr: 1.5,
                    proc_std_hr: 0.3,
                    mtbf_hr: 800.0,
                    mttr_hr: 1.0,
                },
            ],
            suppliers: vec![
                SupplierSpec {
                    material: "clay".into(),
                    name: "ClayMin Lda".into(),
                    delivery_qty_t: 50.0,
                    lead_time_mean_hr: 36.0,
                    lead_time_std_hr: 6.0,
                    reliability: 0.92,
                    unit_cost_eur_t: 85.0,
                    reorder_point_t: 65.0,
                    max_stock_t: 260.0,
                },
                SupplierSpec {
                    material: "feldspar".into(),
                    name: "FeldsparCo S.L.".into(),
                    delivery_qty_t: 30.0,
                    lead_time_mean_hr: 42.0,
                    lead_time_std_hr: 8.0,
                    reliability: 0.88,
                    unit_cost_eur_t: 120.0,
                    reorder_point_t: 40.0,
                    max_stock_t: 150.0,
                },
                SupplierSpec {
                    material: "silica".into(),
                    name: "SilicaTech Lda".into(),
                    delivery_qty_t: 25.0,
                    lead_time_mean_hr: 36.0,
                    lead_time_std_hr: 6.0,
                    reliability: 0.91,
                    unit_cost_eur_t: 95.0,
                    reorder_point_t: 32.0,
                    max_stock_t: 120.0,
                },
                SupplierSpec {
                    material: "kaolin".into(),
                    name: "KaolinMine S.A.".into(),
                    delivery_qty_t: 20.0,
                    lead_time_mean_hr: 72.0,
                    lead_time_std_hr: 16.0,
                    reliability: 0.82,
                    unit_cost_eur_t: 110.0,
                    reorder_point_t: 22.0,
                    max_stock_t: 100.0,
                },
                SupplierSpec {
                    material: "glaze".into(),
                    name: "ChemGlaze GmbH".into(),
                    delivery_qty_t: 12.0,
                    lead_time_mean_hr: 72.0,
                    lead_time_std_hr: 14.0,
                    reliability: 0.85,
                    unit_cost_eur_t: 280.0,
                    reorder_point_t: 10.0,
                    max_stock_t: 55.0,
                },
            ],
            initial_inventory: vec![
                ("clay".into(), 90.0),
                ("feldspar".into(), 50.0),
                ("silica".into(), 40.0),
                ("kaolin".into(), 25.0),
                ("glaze".into(), 10.0),
            ],
            bulk_buffer_capacity: 5_000.0,
            bulk_buffer_initial: 200.0,
            fg_initial: vec![
                ("ONE-PIECE-STD".into(), 200.0),
                ("TWO-PIECE-ECO".into(), 150.0),
                ("WALL-HUNG-PREM".into(), 100.0),
            ],
            fg_max: vec![
                ("ONE-PIECE-STD".into(), 5_000.0),
                ("TWO-PIECE-ECO".into(), 5_000.0),
                ("WALL-HUNG-PREM".into(), 5_000.0),
            ],
            demand: DemandSpec {
                mean_orders_per_day: 5.0,
                mean_order_qty: 25.0,
                std_order_qty: 8.0,
                min_order_qty: 5.0,
                std_lead_time_days: 7.0,
                express_lead_time_days: 3.0,
                express_fraction: 0.20,
                express_premium: 1.15,
            },
            customers: default_customers(),
            quality: QualitySpec {
                grade_a_rate: 0.75,
                grade_b_rate: 0.15,
                reject_rate: 0.10,
                grade_b_price_factor: 0.65,
                functional_tests: Some(FunctionalTestSpec {
                    leak_pass_rate: 0.98,
                    flush_pass_rate: 0.97,
                }),
            },
            financial: FinancialSpec {
                energy_cost_per_batch_eur: 280.0,
                labor_cost_per_shift_eur: 3_500.0,
                shifts_per_day: 3.0,
                breakdown_repair_cost_eur: 2_500.0,
                stockout_penalty_eur: 25.0,
                holding_cost_pct_per_year: 0.20,
            },
        }
    }
}

fn default_customers() -> Vec<String> {
    [
        "BuildCo Portugal",
        "Iberian Sanitary Distributors",
        "ConstructMax S.A.",
        "Mediterranean Build",
        "Porto Renovations",
        "Atlantic Contracts Ltd",
        "HomeStyle Iberia",
        "SaniPro Europe",
        "Lisbon Interiors",
        "Douro Construction Group",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        SimConfig::tile().validate().unwrap();
        SimConfig::sanitary().validate().unwrap();
    }

    #[test]
    fn test_bad_composition_rejected() {
        let mut cfg = SimConfig::tile();
        cfg.body_composition[0].1 = 0.60; // sum now 1.05
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::CompositionSum(_))
        ));
    }

    #[test]
    fn test_bad_quality_rates_rejected() {
        let mut cfg = SimConfig::sanitary();
        cfg.quality.reject_rate = 0.30;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::QualityRateSum(_))
        ));
    }

    #[test]
    fn test_empty_stage_rejected() {
        let mut cfg = SimConfig::tile();
        cfg.stages[3].count = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::EmptyStage(k)) if k == "kiln"));
    }

    #[test]
    fn test_stage_order_enforced() {
        let mut cfg = SimConfig::tile();
        cfg.stages.swap(0, 1);
        assert!(matches!(cfg.validate(), Err(ConfigError::StageOrder)));
    }

    #[test]
    fn test_kiln_stage_lookup() {
        assert_eq!(SimConfig::tile().kiln_stage().key, "kiln");
        assert_eq!(SimConfig::sanitary().kiln_stage().count, 1);
    }

    #[test]
    fn test_quantize_by_family() {
        assert_eq!(SimConfig::tile().quantize(187.5), 187.5);
        assert_eq!(SimConfig::sanitary().quantize(37.5), 37.0);
    }

    #[test]
    fn test_scenarios_cover_standard_set() {
        let keys: Vec<String> = Scenario::all().into_iter().map(|s| s.key).collect();
        assert_eq!(
            keys,
            vec!["baseline", "supply_disruption", "demand_surge", "optimised"]
        );
        let opt = Scenario::by_key("optimised").unwrap();
        assert_eq!(opt.extra_kilns, 1);
        assert_eq!(opt.safety_stock_factor, 1.5);
        assert!(Scenario::by_key("unknown").is_none());
    }
}

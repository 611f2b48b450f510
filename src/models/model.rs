//! Parametric models for time-of-flight and rate curves.
//!
//! Each model is a pure function of one variable `x` (time in s) and a
//! fixed-arity parameter vector. `Model` bundles a kind with its parameter
//! table (initial value, inclusive bounds, fixed flag) and optional fit range.

use serde::{Deserialize, Serialize};

use crate::domain::TimeWindow;
use crate::math::erfc;

/// Smallest allowed time constant (s); keeps `x/τ` finite.
pub const LIFETIME_FLOOR: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelKind {
    /// `c`
    Constant,
    /// `N0·exp(-x/τ)`
    SingleExpo,
    /// `N0·exp(-x/τ) + B`
    SingleExpoWithBackground,
    /// `N1·exp(-x/τ1) + N2·exp(-x/τ2)`
    DoubleExpo,
    /// Diffusive rise of the UCN density toward steady state:
    /// `p0·(erfc(√(τd/x) − √(x/τ)) − exp(4√(τd/τ))·erfc(√(τd/x) + √(x/τ)))`
    Saturation,
    /// Delayed rise followed by a three-component decay, plus background:
    /// `step(x ≥ onset+td)·p0·(1 − e^(−s/τr))·(e^(−s/τ1) + N2·e^(−s/τ2) + N3·e^(−s/τ3)) + B`
    /// with `s = x − onset − td`.
    Li6Decay { onset: f64 },
}

impl ModelKind {
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Constant => "pol0",
            ModelKind::SingleExpo => "SingleExpo",
            ModelKind::SingleExpoWithBackground => "SingleExpoWithBackground",
            ModelKind::DoubleExpo => "DoubleExpo",
            ModelKind::Saturation => "satfit",
            ModelKind::Li6Decay { .. } => "li6fit",
        }
    }

    pub fn param_count(self) -> usize {
        match self {
            ModelKind::Constant => 1,
            ModelKind::SingleExpo => 2,
            ModelKind::SingleExpoWithBackground => 3,
            ModelKind::DoubleExpo => 4,
            ModelKind::Saturation => 3,
            ModelKind::Li6Decay { .. } => 9,
        }
    }
}

/// Predict `y(x)` for the given model kind.
///
/// # Panics
/// Panics if `p` is shorter than `model.param_count()`.
pub fn predict(model: ModelKind, x: f64, p: &[f64]) -> f64 {
    match model {
        ModelKind::Constant => p[0],
        ModelKind::SingleExpo => p[0] * (-x / p[1]).exp(),
        ModelKind::SingleExpoWithBackground => p[0] * (-x / p[1]).exp() + p[2],
        ModelKind::DoubleExpo => p[0] * (-x / p[1]).exp() + p[2] * (-x / p[3]).exp(),
        ModelKind::Saturation => saturation(x, p[0], p[1], p[2]),
        ModelKind::Li6Decay { onset } => {
            let s = x - onset - p[0];
            if s < 0.0 {
                return p[8];
            }
            let rise = -(-s / p[2]).exp_m1();
            let decay = (-s / p[3]).exp() + p[4] * (-s / p[5]).exp() + p[6] * (-s / p[7]).exp();
            p[1] * rise * decay + p[8]
        }
    }
}

fn saturation(x: f64, p0: f64, tau_d: f64, tau: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    let a = (tau_d / x).sqrt();
    let b = (x / tau).sqrt();
    p0 * (erfc(a - b) - (4.0 * (tau_d / tau).sqrt()).exp() * erfc(a + b))
}

/// How a parameter behaves under multi-start seeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamRole {
    Amplitude,
    Lifetime,
    Delay,
    Offset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
    pub fixed: bool,
    /// Externally known uncertainty of a fixed parameter.
    pub error: f64,
    pub role: ParamRole,
}

impl Param {
    pub fn new(name: &str, value: f64, lower: f64, upper: f64, role: ParamRole) -> Self {
        Self {
            name: name.to_string(),
            value,
            lower,
            upper,
            fixed: false,
            error: 0.0,
            role,
        }
    }

    pub fn clamp(&self, v: f64) -> f64 {
        v.clamp(self.lower, self.upper)
    }
}

/// A model kind with its parameter table and fit range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub kind: ModelKind,
    pub params: Vec<Param>,
    pub range: Option<TimeWindow>,
}

impl Model {
    pub fn constant() -> Self {
        Self {
            kind: ModelKind::Constant,
            params: vec![Param::new("R", 1.0, f64::NEG_INFINITY, f64::INFINITY, ParamRole::Offset)],
            range: None,
        }
    }

    pub fn single_expo() -> Self {
        Self {
            kind: ModelKind::SingleExpo,
            params: vec![
                Param::new("N0", 10.0, 0.0, 1e6, ParamRole::Amplitude),
                Param::new("tau", 10.0, LIFETIME_FLOOR, 1000.0, ParamRole::Lifetime),
            ],
            range: None,
        }
    }

    pub fn single_expo_with_background() -> Self {
        Self {
            kind: ModelKind::SingleExpoWithBackground,
            params: vec![
                Param::new("N0", 1000.0, 0.0, 1e6, ParamRole::Amplitude),
                Param::new("tau", 15.0, LIFETIME_FLOOR, 1000.0, ParamRole::Lifetime),
                Param::new("Background", 200.0, 0.0, 1e6, ParamRole::Offset),
            ],
            range: None,
        }
    }

    pub fn double_expo() -> Self {
        Self {
            kind: ModelKind::DoubleExpo,
            params: vec![
                Param::new("N1", 1.0, 0.0, 1e6, ParamRole::Amplitude),
                Param::new("tau1", 10.0, LIFETIME_FLOOR, 1e6, ParamRole::Lifetime),
                Param::new("N2", 0.1, 0.0, 1e6, ParamRole::Amplitude),
                Param::new("tau2", 50.0, LIFETIME_FLOOR, 1e6, ParamRole::Lifetime),
            ],
            range: None,
        }
    }

    /// Monitor-detector saturation curve over `range`.
    pub fn saturation(range: TimeWindow) -> Self {
        Self {
            kind: ModelKind::Saturation,
            params: vec![
                Param::new("p0", 500.0, 0.0, 1e4, ParamRole::Amplitude),
                Param::new("tau_d", 12.0, LIFETIME_FLOOR, 100.0, ParamRole::Lifetime),
                Param::new("tau", 30.0, LIFETIME_FLOOR, 100.0, ParamRole::Lifetime),
            ],
            range: Some(range),
        }
    }

    /// Li6 arrival spectrum after the valve opens at `onset`, with a fixed
    /// background of `background ± background_error` per bin.
    pub fn li6_decay(range: TimeWindow, onset: f64, background: f64, background_error: f64) -> Self {
        let mut bg = Param::new("Background", background, background, background, ParamRole::Offset);
        bg.fixed = true;
        bg.error = background_error;
        Self {
            kind: ModelKind::Li6Decay { onset },
            params: vec![
                Param::new("t_d", 1.5, 0.0, 5.0, ParamRole::Delay),
                Param::new("p0", 1000.0, 0.0, 1e5, ParamRole::Amplitude),
                Param::new("tau_rise", 0.2, LIFETIME_FLOOR, 5.0, ParamRole::Lifetime),
                Param::new("tau_1", 1.5, LIFETIME_FLOOR, 10.0, ParamRole::Lifetime),
                Param::new("N_2", 1.0, 0.0, 10.0, ParamRole::Amplitude),
                Param::new("tau_2", 14.0, LIFETIME_FLOOR, 30.0, ParamRole::Lifetime),
                Param::new("N_3", 0.1, 0.0, 10.0, ParamRole::Amplitude),
                Param::new("tau_3", 30.0, LIFETIME_FLOOR, 100.0, ParamRole::Lifetime),
                bg,
            ],
            range: Some(range),
        }
    }

    pub fn with_range(mut self, range: TimeWindow) -> Self {
        self.range = Some(range);
        self
    }

    /// Replace the initial values (clamped into bounds; fixed parameters keep
    /// their value).
    pub fn with_values(mut self, values: &[f64]) -> Self {
        for (p, &v) in self.params.iter_mut().zip(values) {
            if !p.fixed {
                p.value = p.clamp(v);
            }
        }
        self
    }

    pub fn values(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.value).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.name.clone()).collect()
    }

    pub fn free_indices(&self) -> Vec<usize> {
        self.params
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.fixed)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn eval(&self, x: f64, values: &[f64]) -> f64 {
        predict(self.kind, x, values)
    }

    pub fn in_range(&self, x: f64) -> bool {
        self.range.is_none_or(|r| x >= r.start && x <= r.end)
    }
}

/// Sample a fitted curve on an even grid (for plotting).
pub fn curve_grid(kind: ModelKind, values: &[f64], range: TimeWindow, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    (0..n)
        .map(|i| {
            let x = range.start + range.width() * i as f64 / (n as f64 - 1.0);
            (x, predict(kind, x, values))
        })
        .collect()
}

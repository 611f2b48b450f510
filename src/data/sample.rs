//! Synthetic cycle generation.
//!
//! Produces physically plausible cycles for demos and tests: a 60 s
//! irradiation during which the He3 monitor fills up, a 120 s counting
//! period in which UCN arrive at the Li6 detector after the valve opens, and
//! a 100 s background period. Counts are Poisson, arrival delays
//! exponential, and all slow control sits at nominal values so every
//! generated cycle passes the acceptance checks.

use chrono::DateTime;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Exp1, Poisson, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::domain::Cycle;
use crate::physics::vapor_pressure;
use crate::reduce::extract::SCM_SHUNT_OHMS;

/// Period durations (s): irradiation, counting, eight unused, background.
pub const PERIOD_DURATIONS: [f64; 11] = [60.0, 120.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 100.0];
const BEAM_ON: f64 = 60.0;
const BEAM_OFF: f64 = 220.0;
/// Time slicing of the inhomogeneous He3 rate (s).
const HE3_SLICE: f64 = 0.1;
const FIRST_START: i64 = 1_530_000_000;

/// Source and detector parameters of a simulated run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleProfile {
    /// Fraction of the reference UCN yield reaching the Li6 detector.
    pub transmission: f64,
    /// Li6 signal counts at transmission 1.
    pub li6_yield: f64,
    pub li6_background_rate: f64,
    /// Extra Li6 rate per µA while the beam is on (1/s/µA).
    pub li6_beam_background: f64,
    /// Delay between valve opening and first arrivals (s).
    pub li6_delay: f64,
    pub li6_rise: f64,
    pub li6_fast_decay: f64,
    pub li6_slow_decay: f64,
    pub li6_slow_fraction: f64,
    /// Saturated He3 monitor rate at 1 µA (1/s).
    pub he3_rate: f64,
    pub he3_fill_time: f64,
    pub he3_drain_time: f64,
    pub he3_background_rate: f64,
    pub beam_current: f64,
    pub beam_noise: f64,
    pub temperature: f64,
    /// Magnet current (A).
    pub scm_current: f64,
}

impl Default for CycleProfile {
    fn default() -> Self {
        Self {
            transmission: 1.0,
            li6_yield: 5000.0,
            li6_background_rate: 2.16,
            li6_beam_background: 0.5,
            li6_delay: 1.0,
            li6_rise: 0.3,
            li6_fast_decay: 2.0,
            li6_slow_decay: 12.0,
            li6_slow_fraction: 0.2,
            he3_rate: 30.0,
            he3_fill_time: 20.0,
            he3_drain_time: 30.0,
            he3_background_rate: 0.0403,
            beam_current: 1.0,
            beam_noise: 0.005,
            temperature: 0.9,
            scm_current: 0.0,
        }
    }
}

fn poisson<R: Rng + ?Sized>(rng: &mut R, mean: f64) -> u64 {
    if !(mean > 0.0 && mean.is_finite()) {
        return 0;
    }
    Poisson::new(mean).map(|d| d.sample(rng) as u64).unwrap_or(0)
}

fn exponential<R: Rng + ?Sized>(rng: &mut R, tau: f64) -> f64 {
    let e: f64 = rng.sample(Exp1);
    tau * e
}

fn normal<R: Rng + ?Sized>(rng: &mut R, mean: f64, sigma: f64) -> f64 {
    let z: f64 = rng.sample(StandardNormal);
    mean + sigma * z
}

fn uniform_hits<R: Rng + ?Sized>(rng: &mut R, rate: f64, from: f64, to: f64, out: &mut Vec<f64>) {
    for _ in 0..poisson(rng, rate * (to - from)) {
        out.push(rng.gen_range(from..to));
    }
}

/// He3 monitor rate at time `t` into the cycle.
fn he3_rate(profile: &CycleProfile, beam: f64, t: f64) -> f64 {
    let saturated = profile.he3_rate * beam;
    let signal = if t < BEAM_ON {
        saturated * -(-t / profile.he3_fill_time).exp_m1()
    } else {
        let at_end = saturated * -(-BEAM_ON / profile.he3_fill_time).exp_m1();
        at_end * (-(t - BEAM_ON) / profile.he3_drain_time).exp()
    };
    signal + profile.he3_background_rate
}

/// Counts of `hits` inside each period.
fn period_counts(hits: &[f64]) -> Vec<u64> {
    let mut start = 0.0;
    PERIOD_DURATIONS
        .iter()
        .map(|&d| {
            let end = start + d;
            let n = hits.iter().filter(|&&t| t >= start && t < end).count() as u64;
            start = end;
            n
        })
        .collect()
}

/// One simulated cycle.
pub fn simulate_cycle<R: Rng + ?Sized>(run: u32, cycle: u32, profile: &CycleProfile, rng: &mut R) -> Cycle {
    let active = BEAM_ON + BEAM_OFF;
    let beam_current: Vec<f64> = (0..10)
        .map(|_| normal(rng, profile.beam_current, profile.beam_noise))
        .collect();
    let beam = profile.beam_current;

    let mut li6_hits = Vec::new();
    uniform_hits(rng, profile.li6_background_rate, 0.0, active, &mut li6_hits);
    uniform_hits(rng, profile.li6_beam_background * beam, 0.0, BEAM_ON, &mut li6_hits);
    for _ in 0..poisson(rng, profile.li6_yield * profile.transmission) {
        let decay = if rng.gen_bool(profile.li6_slow_fraction.clamp(0.0, 1.0)) {
            profile.li6_slow_decay
        } else {
            profile.li6_fast_decay
        };
        let t = BEAM_ON + profile.li6_delay + exponential(rng, profile.li6_rise) + exponential(rng, decay);
        if t < active {
            li6_hits.push(t);
        }
    }
    li6_hits.sort_by(f64::total_cmp);
    let li6_channels = li6_hits.iter().map(|_| rng.gen_range(0..10)).collect();

    let mut he3_hits = Vec::new();
    let slices = (active / HE3_SLICE).round() as usize;
    for i in 0..slices {
        let from = i as f64 * HE3_SLICE;
        let rate = he3_rate(profile, beam, from + HE3_SLICE / 2.0);
        uniform_hits(rng, rate, from, from + HE3_SLICE, &mut he3_hits);
    }
    he3_hits.sort_by(f64::total_cmp);

    let temperatures: Vec<Vec<f64>> = (0..3)
        .map(|_| (0..5).map(|_| normal(rng, profile.temperature, 0.002)).collect())
        .collect();
    let vapor: Vec<f64> = temperatures[0]
        .iter()
        .map(|&t| vapor_pressure(t).unwrap_or(0.0))
        .collect();
    let scm_voltages = (0..10)
        .map(|_| normal(rng, profile.scm_current * SCM_SHUNT_OHMS, 1e-7))
        .collect();

    let start = FIRST_START + i64::from(run) * 3600 + i64::from(cycle) * 300;
    Cycle {
        run,
        cycle,
        start: DateTime::from_timestamp(start, 0).unwrap_or_default(),
        li6_counts: period_counts(&li6_hits),
        he3_counts: period_counts(&he3_hits),
        durations: PERIOD_DURATIONS.to_vec(),
        beam_on_duration: BEAM_ON,
        beam_off_duration: BEAM_OFF,
        beam_current,
        temperatures,
        vapor_pressure_low: vapor.clone(),
        vapor_pressure_high: vapor,
        vacuum_gauge: vec![0.0; 5],
        isolation_valve: vec![0.0, 1.0, 1.0, 0.0],
        valve0_state: vec![1, 1],
        valve1_state: vec![0, 1],
        scm_voltages,
        li6_hits,
        li6_channels,
        he3_hits,
    }
}

/// `cycles` consecutive cycles of one run, reproducible from `seed`.
pub fn simulate_run(run: u32, cycles: u32, profile: &CycleProfile, seed: u64) -> Vec<Cycle> {
    let mut rng = StdRng::seed_from_u64(seed);
    (1..=cycles)
        .map(|cycle| simulate_cycle(run, cycle, profile, &mut rng))
        .collect()
}

/// A reproducible default cycle.
pub fn nominal_cycle(run: u32, cycle: u32) -> Cycle {
    let mut rng = StdRng::seed_from_u64((u64::from(run) << 32) | u64::from(cycle));
    simulate_cycle(run, cycle, &CycleProfile::default(), &mut rng)
}

//! Cycle data-quality screening.
//!
//! Every raw cycle ends in one of two states: accepted, or rejected with a
//! `Rejection` naming the measured value and the threshold it violated.
//! Rejections are logged by the caller and never abort the batch.
//!
//! Checks run in a fixed order and the first failing one is reported:
//!
//! 1. minimum beam current
//! 2. beam current fluctuation (population std dev)
//! 3. Li6 data present in the background period
//! 4. isolation valve opened at least once
//! 5. vacuum gauge not switched on
//! 6. Li6 signal above background in the counting period
//! 7. Li6 background not anomalously high
//! 8. enough monitor counts in the counting period

use thiserror::Error;
use tracing::warn;

use crate::domain::{AnalysisConfig, Cycle, Detector};
use crate::math::{max_value, min_value, std_dev};

/// Why a cycle was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("{what} has no readings")]
    NoReadings { what: &'static str },

    #[error("period {period} is missing from the cycle data")]
    MissingPeriod { period: usize },

    #[error("beam current dropped below {threshold} uA ({min} uA)")]
    LowBeamCurrent { min: f64, threshold: f64 },

    #[error("beam current fluctuated by {std} uA (limit {threshold} uA)")]
    BeamFluctuation { std: f64, threshold: f64 },

    #[error("no Li6 counts in background period {period}")]
    NoBackgroundData { period: usize },

    #[error("isolation valve never opened (max status {max})")]
    ValveNeverOpened { max: f64 },

    #[error("vacuum gauge was on ({reading} torr inside ({low}, {high}))")]
    GaugeActive { reading: f64, low: f64, high: f64 },

    #[error("Li6 sees only background ({rate}/s, needs {threshold}/s)")]
    BackgroundDominated { rate: f64, threshold: f64 },

    #[error("Li6 sees high background ({rate}/s, limit {threshold}/s)")]
    HighBackground { rate: f64, threshold: f64 },

    #[error("not enough monitor counts ({counts}, needs {threshold})")]
    LowMonitorCounts { counts: f64, threshold: f64 },
}

fn period_counts(cycle: &Cycle, detector: Detector, period: usize) -> Result<f64, Rejection> {
    cycle
        .period_counts(detector, period)
        .ok_or(Rejection::MissingPeriod { period })
}

fn period_duration(cycle: &Cycle, period: usize) -> Result<f64, Rejection> {
    cycle
        .period_duration(period)
        .ok_or(Rejection::MissingPeriod { period })
}

/// Run all acceptance checks on `cycle`.
pub fn screen_cycle(cycle: &Cycle, config: &AnalysisConfig) -> Result<(), Rejection> {
    let t = &config.thresholds;
    let p = &config.periods;

    let beam = &cycle.beam_current;
    let min_beam = min_value(beam).ok_or(Rejection::NoReadings { what: "beam current" })?;
    if min_beam < t.min_beam_current {
        return Err(Rejection::LowBeamCurrent {
            min: min_beam,
            threshold: t.min_beam_current,
        });
    }
    let std = std_dev(beam).unwrap_or(0.0);
    if std > t.max_beam_fluctuation {
        return Err(Rejection::BeamFluctuation {
            std,
            threshold: t.max_beam_fluctuation,
        });
    }

    let li6_background = period_counts(cycle, Detector::Li6, p.background)?;
    if li6_background == 0.0 {
        return Err(Rejection::NoBackgroundData { period: p.background });
    }

    let valve = max_value(&cycle.isolation_valve).ok_or(Rejection::NoReadings { what: "isolation valve" })?;
    if valve < 1.0 {
        return Err(Rejection::ValveNeverOpened { max: valve });
    }

    if let Some(&reading) = cycle
        .vacuum_gauge
        .iter()
        .find(|&&r| t.gauge_active_low < r && r < t.gauge_active_high)
    {
        return Err(Rejection::GaugeActive {
            reading,
            low: t.gauge_active_low,
            high: t.gauge_active_high,
        });
    }

    let signal = period_counts(cycle, Detector::Li6, p.counting)?;
    let counting = period_duration(cycle, p.counting)?;
    if signal < t.min_signal_rate * counting {
        return Err(Rejection::BackgroundDominated {
            rate: signal / counting,
            threshold: t.min_signal_rate,
        });
    }

    let background = period_duration(cycle, p.background)?;
    if li6_background > t.max_background_rate * background {
        return Err(Rejection::HighBackground {
            rate: li6_background / background,
            threshold: t.max_background_rate,
        });
    }

    let monitor = period_counts(cycle, Detector::He3, p.counting)?;
    if monitor < t.min_monitor_counts {
        return Err(Rejection::LowMonitorCounts {
            counts: monitor,
            threshold: t.min_monitor_counts,
        });
    }

    Ok(())
}

/// Log a warning for an unexpected valve configuration. Never rejects.
pub fn check_valves(cycle: &Cycle) -> bool {
    let nominal = cycle.valves_nominal();
    if !nominal {
        warn!(
            run = cycle.run,
            cycle = cycle.cycle,
            valve0 = ?cycle.valve0_state,
            valve1 = ?cycle.valve1_state,
            "abnormal valve configuration"
        );
    }
    nominal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::nominal_cycle;

    #[test]
    fn nominal_cycle_is_accepted() {
        let cycle = nominal_cycle(1000, 1);
        assert_eq!(screen_cycle(&cycle, &AnalysisConfig::default()), Ok(()));
        assert!(check_valves(&cycle));
    }

    #[test]
    fn low_beam_is_rejected_citing_threshold() {
        let mut cycle = nominal_cycle(1000, 1);
        cycle.beam_current = vec![1.0, 0.05, 1.0];
        let err = screen_cycle(&cycle, &AnalysisConfig::default()).unwrap_err();
        assert_eq!(err, Rejection::LowBeamCurrent { min: 0.05, threshold: 0.1 });
        assert!(err.to_string().contains("0.1"));
    }

    #[test]
    fn steady_beam_is_accepted() {
        let mut cycle = nominal_cycle(1000, 1);
        cycle.beam_current = vec![5.001, 4.999, 5.0, 5.001, 4.999];
        assert!(screen_cycle(&cycle, &AnalysisConfig::default()).is_ok());
    }

    #[test]
    fn fluctuating_beam_is_rejected() {
        let mut cycle = nominal_cycle(1000, 1);
        cycle.beam_current = vec![1.0, 1.1, 0.9, 1.0];
        let err = screen_cycle(&cycle, &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(err, Rejection::BeamFluctuation { threshold, .. } if threshold == 0.02));
    }

    #[test]
    fn each_check_has_its_reason() {
        let config = AnalysisConfig::default();

        let mut c = nominal_cycle(1, 1);
        c.li6_counts[10] = 0;
        assert_eq!(screen_cycle(&c, &config), Err(Rejection::NoBackgroundData { period: 10 }));

        let mut c = nominal_cycle(1, 1);
        c.isolation_valve = vec![0.0, 0.0];
        assert_eq!(screen_cycle(&c, &config), Err(Rejection::ValveNeverOpened { max: 0.0 }));

        let mut c = nominal_cycle(1, 1);
        c.vacuum_gauge = vec![1e-8, 1e-5];
        assert!(matches!(screen_cycle(&c, &config), Err(Rejection::GaugeActive { reading, .. }) if reading == 1e-5));

        let mut c = nominal_cycle(1, 1);
        c.li6_counts[1] = 5;
        assert!(matches!(screen_cycle(&c, &config), Err(Rejection::BackgroundDominated { .. })));

        let mut c = nominal_cycle(1, 1);
        c.li6_counts[10] = 5000;
        assert!(matches!(screen_cycle(&c, &config), Err(Rejection::HighBackground { .. })));

        let mut c = nominal_cycle(1, 1);
        c.he3_counts[1] = 299;
        assert_eq!(
            screen_cycle(&c, &config),
            Err(Rejection::LowMonitorCounts { counts: 299.0, threshold: 300.0 })
        );
    }

    #[test]
    fn truncated_period_arrays_are_rejected() {
        let mut c = nominal_cycle(1, 1);
        c.li6_counts.truncate(5);
        assert_eq!(
            screen_cycle(&c, &AnalysisConfig::default()),
            Err(Rejection::MissingPeriod { period: 10 })
        );
    }

    #[test]
    fn abnormal_valves_warn_but_pass() {
        let mut c = nominal_cycle(1, 1);
        c.valve1_state = vec![1, 1];
        assert!(!check_valves(&c));
        assert!(screen_cycle(&c, &AnalysisConfig::default()).is_ok());
    }
}

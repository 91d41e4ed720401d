//! Period-over-period change, favorability and benchmark classification.
//!
//! `is_favorable` (direction of change) and `meets_benchmark` (level of the
//! current value) are separate predicates and are never merged.

use serde::Serialize;

use crate::logging::{log, obj, v_num, v_opt, v_str, Domain, Level};
use crate::metric::{MetricDefinition, Polarity, Unit};

/// Direction of a period-over-period change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Flat,
    Unknown,
}

impl Trend {
    pub fn from_change(percent_change: Option<f64>) -> Self {
        match percent_change {
            None => Trend::Unknown,
            Some(c) if c > 0.0 => Trend::Up,
            Some(c) if c < 0.0 => Trend::Down,
            Some(_) => Trend::Flat,
        }
    }
}

/// `(current - previous) / previous * 100`.
///
/// Absent when there is no previous value or it is zero; never NaN or infinite.
pub fn percent_change(current: f64, previous: Option<f64>) -> Option<f64> {
    let previous = previous?;
    if previous == 0.0 {
        return None;
    }
    let change = (current - previous) / previous * 100.0;
    change.is_finite().then_some(change)
}

/// Whether a change moved in the metric's good direction. Zero is neutral.
pub fn is_favorable(polarity: Polarity, percent_change: Option<f64>) -> Option<bool> {
    let change = percent_change?;
    Some(match polarity {
        Polarity::LowerIsBetter => change < 0.0,
        Polarity::HigherIsBetter => change > 0.0,
    })
}

/// Whether `current` sits on the good side of the benchmark (inclusive).
pub fn meets_benchmark(def: &MetricDefinition, current: f64) -> bool {
    match def.polarity {
        Polarity::LowerIsBetter => current <= def.benchmark,
        Polarity::HigherIsBetter => current >= def.benchmark,
    }
}

/// Signed distance from the benchmark as a percentage of it; absent for a zero benchmark.
pub fn benchmark_gap(def: &MetricDefinition, current: f64) -> Option<f64> {
    if def.benchmark == 0.0 {
        return None;
    }
    let gap = (current - def.benchmark) / def.benchmark.abs() * 100.0;
    gap.is_finite().then_some(gap)
}

#[derive(Debug, Clone, Default)]
pub struct ValueFormatter {
    pub currency_grouping: bool,
    pub ratio_suffix: String,
}

impl ValueFormatter {
    pub fn new(currency_grouping: bool, ratio_suffix: &str) -> Self {
        Self {
            currency_grouping,
            ratio_suffix: ratio_suffix.to_string(),
        }
    }

    pub fn format(&self, unit: &Unit, value: f64) -> String {
        if !value.is_finite() {
            return "N/A".to_string();
        }
        match unit {
            Unit::Percentage => format!("{:.2}%", value),
            Unit::Currency => self.currency(value),
            Unit::Ratio => format!("{:.2}{}", value, self.ratio_suffix),
            Unit::DayCount => format!("{} days", value.round() as i64),
            Unit::PlainCount => format!("{}", value.round() as i64),
            Unit::CustomSuffix(suffix) => format!("{:.2}{}", value, suffix),
        }
    }

    fn currency(&self, value: f64) -> String {
        let digits = format!("{:.2}", value.abs());
        let digits = if self.currency_grouping {
            group_thousands(&digits)
        } else {
            digits
        };
        // "-0.00" would read as a loss
        if value < 0.0 && digits.chars().any(|c| c.is_ascii_digit() && c != '0') {
            format!("-${}", digits)
        } else {
            format!("${}", digits)
        }
    }
}

fn group_thousands(fixed: &str) -> String {
    let (int_part, frac) = fixed.split_once('.').unwrap_or((fixed, ""));
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3 + 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if !frac.is_empty() {
        grouped.push('.');
        grouped.push_str(frac);
    }
    grouped
}

/// All derived facts about one observation of a metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub current: f64,
    pub previous: Option<f64>,
    pub percent_change: Option<f64>,
    pub is_favorable: Option<bool>,
    pub meets_benchmark: bool,
    pub benchmark_gap: Option<f64>,
    pub trend: Trend,
    pub display: String,
    pub benchmark_display: String,
}

/// Mean of a series judged against the benchmark.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkSummary {
    pub samples: usize,
    pub average: f64,
    pub benchmark: f64,
    pub meets_benchmark: bool,
    pub benchmark_gap: Option<f64>,
    pub display: String,
    pub benchmark_display: String,
}

#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    formatter: ValueFormatter,
}

impl Evaluator {
    pub fn new(formatter: ValueFormatter) -> Self {
        Self { formatter }
    }

    pub fn formatter(&self) -> &ValueFormatter {
        &self.formatter
    }

    pub fn evaluate(&self, def: &MetricDefinition, current: f64, previous: Option<f64>) -> Evaluation {
        let change = percent_change(current, previous);
        let eval = Evaluation {
            current,
            previous,
            percent_change: change,
            is_favorable: is_favorable(def.polarity, change),
            meets_benchmark: meets_benchmark(def, current),
            benchmark_gap: benchmark_gap(def, current),
            trend: Trend::from_change(change),
            display: self.formatter.format(&def.unit, current),
            benchmark_display: self.formatter.format(&def.unit, def.benchmark),
        };
        log(
            Level::Trace,
            Domain::Evaluate,
            "evaluated",
            obj(&[
                ("metric", v_str(&def.key)),
                ("current", v_num(current)),
                ("previous", v_opt(previous)),
                ("percent_change", v_opt(change)),
                ("meets_benchmark", serde_json::json!(eval.meets_benchmark)),
            ]),
        );
        eval
    }

    /// Average of `values`; absent for an empty slice.
    pub fn summarize(&self, def: &MetricDefinition, values: &[f64]) -> Option<BenchmarkSummary> {
        if values.is_empty() {
            return None;
        }
        let average = values.iter().sum::<f64>() / values.len() as f64;
        Some(BenchmarkSummary {
            samples: values.len(),
            average,
            benchmark: def.benchmark,
            meets_benchmark: meets_benchmark(def, average),
            benchmark_gap: benchmark_gap(def, average),
            display: self.formatter.format(&def.unit, average),
            benchmark_display: self.formatter.format(&def.unit, def.benchmark),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn metric(polarity: Polarity, unit: Unit, benchmark: f64) -> MetricDefinition {
        MetricDefinition::new("m", "Metric", unit, benchmark, polarity)
    }

    #[test]
    fn test_zero_previous_has_no_change() {
        assert_eq!(percent_change(50.0, Some(0.0)), None);
        assert_eq!(percent_change(0.0, Some(0.0)), None);
        assert_eq!(percent_change(50.0, None), None);
    }

    #[test]
    fn test_change_is_unrounded() {
        let change = percent_change(120.0, Some(90.0)).unwrap();
        assert!((change - 33.333333333333336).abs() < 1e-12);
    }

    #[test]
    fn test_polarity_symmetry() {
        let lower = metric(Polarity::LowerIsBetter, Unit::PlainCount, 100.0);
        let higher = metric(Polarity::HigherIsBetter, Unit::PlainCount, 100.0);
        let ev = Evaluator::default();

        let a = ev.evaluate(&lower, 90.0, Some(100.0));
        assert_eq!(a.percent_change, Some(-10.0));
        assert_eq!(a.is_favorable, Some(true));
        assert_eq!(a.trend, Trend::Down);

        let b = ev.evaluate(&higher, 90.0, Some(100.0));
        assert_eq!(b.percent_change, Some(-10.0));
        assert_eq!(b.is_favorable, Some(false));
    }

    #[test]
    fn test_unchanged_is_neutral() {
        for polarity in [Polarity::LowerIsBetter, Polarity::HigherIsBetter] {
            assert_eq!(is_favorable(polarity, Some(0.0)), Some(false));
        }
        assert_eq!(Trend::from_change(Some(0.0)), Trend::Flat);
        assert_eq!(Trend::from_change(None), Trend::Unknown);
    }

    #[test]
    fn test_benchmark_without_previous() {
        let churn = metric(Polarity::LowerIsBetter, Unit::Percentage, 5.0);
        let ev = Evaluator::default().evaluate(&churn, 4.2, None);
        assert_eq!(ev.percent_change, None);
        assert_eq!(ev.is_favorable, None);
        assert!(ev.meets_benchmark);

        let uptime = metric(Polarity::HigherIsBetter, Unit::Percentage, 99.9);
        assert!(meets_benchmark(&uptime, 99.9));
        assert!(!meets_benchmark(&uptime, 99.8));
    }

    #[test]
    fn test_benchmark_and_change_disagree() {
        // Improving but still worse than target
        let cac = metric(Polarity::LowerIsBetter, Unit::Currency, 200.0);
        let ev = Evaluator::default().evaluate(&cac, 250.0, Some(300.0));
        assert_eq!(ev.is_favorable, Some(true));
        assert!(!ev.meets_benchmark);
    }

    #[test]
    fn test_benchmark_gap() {
        let growth = metric(Polarity::HigherIsBetter, Unit::Percentage, 20.0);
        assert_eq!(benchmark_gap(&growth, 25.0), Some(25.0));
        assert_eq!(benchmark_gap(&growth, 15.0), Some(-25.0));

        let cash = metric(Polarity::HigherIsBetter, Unit::Currency, 0.0);
        assert_eq!(benchmark_gap(&cash, 10.0), None);
    }

    #[test]
    fn test_formatting() {
        let f = ValueFormatter::default();
        assert_eq!(f.format(&Unit::Percentage, 12.345), "12.35%");
        assert_eq!(f.format(&Unit::Currency, 1999.5), "$1999.50");
        assert_eq!(f.format(&Unit::DayCount, 44.6), "45 days");
        assert_eq!(f.format(&Unit::PlainCount, 7.4), "7");
        assert_eq!(f.format(&Unit::Ratio, 3.14159), "3.14");
        assert_eq!(f.format(&Unit::CustomSuffix(" hours".into()), 1.5), "1.50 hours");
        assert_eq!(f.format(&Unit::Currency, -50.0), "-$50.00");
        assert_eq!(f.format(&Unit::Currency, -0.001), "$0.00");
        assert_eq!(f.format(&Unit::Percentage, f64::NAN), "N/A");
    }

    #[test]
    fn test_formatting_options() {
        let f = ValueFormatter::new(true, ":1");
        assert_eq!(f.format(&Unit::Currency, 1234567.891), "$1,234,567.89");
        assert_eq!(f.format(&Unit::Currency, 999.0), "$999.00");
        assert_eq!(f.format(&Unit::Currency, -33333.0), "-$33,333.00");
        assert_eq!(f.format(&Unit::Ratio, 3.0), "3.00:1");
    }

    #[test]
    fn test_summarize() {
        let def = metric(Polarity::HigherIsBetter, Unit::Percentage, 10.0);
        let ev = Evaluator::default();
        assert!(ev.summarize(&def, &[]).is_none());

        let s = ev.summarize(&def, &[8.0, 12.0, 13.0]).unwrap();
        assert_eq!(s.samples, 3);
        assert_eq!(s.average, 11.0);
        assert!(s.meets_benchmark);
        assert_eq!(s.display, "11.00%");
        assert_eq!(s.benchmark_display, "10.00%");
    }

    fn finite() -> impl Strategy<Value = f64> {
        prop::num::f64::NORMAL | prop::num::f64::SUBNORMAL | prop::num::f64::ZERO
    }

    proptest! {
        #[test]
        fn prop_change_is_finite_or_absent(
            current in finite(),
            previous in prop_oneof![Just(0.0), Just(-0.0), finite()],
            lower in any::<bool>(),
        ) {
            let polarity = if lower { Polarity::LowerIsBetter } else { Polarity::HigherIsBetter };
            let change = percent_change(current, Some(previous));
            if let Some(c) = change {
                prop_assert!(c.is_finite());
            }
            if previous == 0.0 {
                prop_assert_eq!(change, None);
            }
            prop_assert_eq!(is_favorable(polarity, change).is_none(), change.is_none());
            prop_assert_eq!(Trend::from_change(change) == Trend::Unknown, change.is_none());
            prop_assert_eq!(percent_change(current, None), None);
        }
    }
}

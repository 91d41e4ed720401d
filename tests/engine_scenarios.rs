//! End-to-end checks: date range in, evaluated series out.

use chrono::NaiveDate;

use kpi_engine::{
    EngineConfig, EngineError, MetricDefinition, MetricRegistry, MetricsEngine, PeriodValues, Polarity,
    TimeFrame, Unit,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn engine_with(defs: Vec<MetricDefinition>) -> MetricsEngine {
    MetricsEngine::new(EngineConfig::default(), MetricRegistry::from_definitions(defs).unwrap())
}

fn values(periods: &[kpi_engine::Period], raw: &[f64]) -> PeriodValues {
    periods.iter().zip(raw).map(|(p, v)| (p.start_date, *v)).collect()
}

#[test]
fn three_week_plain_count_scenario() {
    let engine = engine_with(vec![MetricDefinition::new(
        "tickets",
        "Tickets Closed",
        Unit::PlainCount,
        100.0,
        Polarity::HigherIsBetter,
    )]);
    // Mon 2024-08-05 .. Sun 2024-08-25: exactly three weeks
    let periods = engine.bucketize(d(2024, 8, 5), d(2024, 8, 25)).unwrap();
    assert_eq!(
        periods.iter().map(|p| p.label.as_str()).collect::<Vec<_>>(),
        vec!["Week 32", "Week 33", "Week 34"]
    );

    let series = engine
        .assemble_series("tickets", &periods, &values(&periods, &[100.0, 90.0, 120.0]))
        .unwrap();
    assert_eq!(series.len(), 3);
    assert_eq!(series.points[0].percent_change, None);
    assert_eq!(series.points[1].percent_change, Some(-10.0));
    assert_eq!(series.points[1].is_favorable, Some(false));
    assert!((series.points[2].percent_change.unwrap() - 33.33).abs() < 0.01);
    assert_eq!(series.points[2].is_favorable, Some(true));

    // First point has no change but still has a benchmark verdict
    assert!(series.points[0].meets_benchmark);
    assert!(!series.points[1].meets_benchmark);
}

#[test]
fn lower_is_better_series() {
    let engine = engine_with(vec![MetricDefinition::new(
        "cycle_time",
        "Cycle Time",
        Unit::DayCount,
        10.0,
        Polarity::LowerIsBetter,
    )]);
    let periods = engine.bucketize(d(2024, 3, 4), d(2024, 3, 17)).unwrap();
    let series = engine
        .assemble_series("cycle_time", &periods, &values(&periods, &[100.0, 90.0]))
        .unwrap();
    assert_eq!(series.points[1].percent_change, Some(-10.0));
    assert_eq!(series.points[1].is_favorable, Some(true));
    assert!(!series.points[1].meets_benchmark);
    assert_eq!(series.points[1].display, "90 days");
}

#[test]
fn all_entities_view_is_a_mean() {
    let engine = MetricsEngine::new(EngineConfig::default(), MetricRegistry::builtin());
    let periods = engine.bucketize(d(2024, 8, 5), d(2024, 8, 11)).unwrap();
    let alice = values(&periods, &[10.0]);
    let bob = values(&periods, &[20.0]);
    let combined = engine.aggregate_mean(&[alice, bob]);
    assert_eq!(combined.get(periods[0].start_date), Some(15.0));

    let series = engine.assemble_series("profit_ratio", &periods, &combined).unwrap();
    assert_eq!(series.points[0].display, "15.00%");
    assert!(series.points[0].meets_benchmark);
}

#[test]
fn zero_previous_never_yields_infinity() {
    let engine = MetricsEngine::new(EngineConfig::default(), MetricRegistry::builtin());
    let ev = engine.evaluate("operating_cash_flow", 5000.0, Some(0.0)).unwrap();
    assert_eq!(ev.percent_change, None);
    assert_eq!(ev.is_favorable, None);
    assert_eq!(ev.benchmark_gap, None);
    assert!(ev.meets_benchmark);
}

#[test]
fn invalid_inputs_surface_as_errors() {
    let engine = MetricsEngine::new(EngineConfig::default(), MetricRegistry::builtin());
    assert!(matches!(
        engine.bucketize(d(2024, 8, 12), d(2024, 8, 1)),
        Err(EngineError::InvalidRange { .. })
    ));

    let periods = engine.bucketize(d(2024, 8, 5), d(2024, 8, 18)).unwrap();
    let partial = values(&periods, &[1.0]);
    let err = engine.assemble_series("cac", &periods, &partial).unwrap_err();
    assert!(matches!(err, EngineError::MissingValue { ref metric, .. } if metric == "cac"));

    assert!(matches!(
        engine.assemble_series("nps", &periods, &partial),
        Err(EngineError::MissingDefinition(_))
    ));
}

#[test]
fn past_year_frame_is_the_whole_calendar_year() {
    let engine = MetricsEngine::new(EngineConfig::default(), MetricRegistry::builtin());
    let frame: TimeFrame = "year:2023".parse().unwrap();
    let periods = engine.periods_for(&frame, d(2024, 8, 14)).unwrap();
    // 2023-01-01 is a Sunday, so the first Monday week starts in 2022
    assert_eq!(periods[0].start_date, d(2022, 12, 26));
    assert_eq!(periods[0].label, "Week 52");
    assert_eq!(periods[periods.len() - 1].end_date, d(2023, 12, 31));
    assert_eq!(periods.len(), 53);
}

#[test]
fn ytd_frame_buckets_from_january() {
    let engine = MetricsEngine::new(EngineConfig::default(), MetricRegistry::builtin());
    let periods = engine.periods_for(&TimeFrame::YearToDate, d(2024, 1, 10)).unwrap();
    // 2024-01-01 is a Monday
    assert_eq!(periods.len(), 2);
    assert_eq!(periods[0].start_date, d(2024, 1, 1));
    assert_eq!(periods[0].label, "Week 1");
}

#[test]
fn recap_and_summary_agree_with_points() {
    let engine = MetricsEngine::new(EngineConfig::default(), MetricRegistry::builtin());
    let periods = engine.bucketize(d(2024, 8, 5), d(2024, 8, 25)).unwrap();
    let series = engine
        .assemble_series("churn_rate", &periods, &values(&periods, &[6.0, 5.0, 4.0]))
        .unwrap()
        .with_entity("FirmOS");

    let row = engine.recap("churn_rate", &series).unwrap().unwrap();
    assert_eq!(row.current_display, "4.00%");
    assert_eq!(row.previous_display, "5.00%");
    assert_eq!(row.is_favorable, Some(true));
    assert_eq!(row.period, "Week 34");

    let summary = engine.summary("churn_rate", &series).unwrap().unwrap();
    assert_eq!(summary.average, 5.0);
    assert!(summary.meets_benchmark);
    assert_eq!(summary.benchmark_gap, Some(0.0));
}

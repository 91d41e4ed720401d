use std::fs;

use chrono::NaiveDate;
use kpi_engine::source::{resolve_entities, resolve_values};
use kpi_engine::{
    EngineConfig, EngineError, FixtureSource, MetricRegistry, MetricsEngine, SourceKind, SyntheticSource,
};
use tempfile::TempDir;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn engine() -> MetricsEngine {
    MetricsEngine::new(EngineConfig::default(), MetricRegistry::builtin())
}

#[tokio::test]
async fn synthetic_series_is_reproducible() {
    let engine = engine();
    let periods = engine.bucketize(d(2024, 7, 1), d(2024, 8, 31)).unwrap();
    let source = SyntheticSource::new(42, 0.5);
    let entities = vec!["FirmOS".to_string(), "Acme Corp".to_string()];

    let a = engine.resolve_combined(&source, "ltv", &entities, &periods).await.unwrap();
    let b = engine.resolve_combined(&source, "ltv", &entities, &periods).await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a.values.len(), periods.len());
    assert!(a.is_complete());

    let sa = engine.assemble_series("ltv", &periods, &a.values).unwrap();
    let sb = engine.assemble_series("ltv", &periods, &b.values).unwrap();
    assert_eq!(sa.digest(), sb.digest());
}

#[tokio::test]
async fn combined_values_are_entity_means() {
    let engine = engine();
    let periods = engine.bucketize(d(2024, 8, 5), d(2024, 8, 18)).unwrap();
    let source = SyntheticSource::new(3, 0.25);
    let def = engine.definition("acv").unwrap();
    let entities = vec!["x".to_string(), "y".to_string()];

    let per_entity = resolve_entities(&source, def, &entities, &periods).await.unwrap();
    assert_eq!(per_entity[0].0, "x");
    assert_eq!(per_entity[1].0, "y");

    let combined = engine.resolve_combined(&source, "acv", &entities, &periods).await.unwrap();
    for p in &periods {
        let mean = (per_entity[0].1.value_for(p).unwrap() + per_entity[1].1.value_for(p).unwrap()) / 2.0;
        assert_eq!(combined.values.value_for(p), Some(mean));
        assert_eq!(combined.contributors.get(&p.start_date), Some(&2));
    }
}

#[tokio::test]
async fn partial_entity_means_are_flagged() {
    let source = FixtureSource::from_json_str(
        r#"{"cac": {
            "Acme Corp": {"2024-08-05": 200.0, "2024-08-12": 180.0},
            "FirmOS": {"2024-08-05": 100.0}
        }}"#,
    )
    .unwrap();
    let engine = engine();
    let periods = engine.bucketize(d(2024, 8, 5), d(2024, 8, 18)).unwrap();
    let entities = vec!["Acme Corp".to_string(), "FirmOS".to_string()];
    let combined = engine.resolve_combined(&source, "cac", &entities, &periods).await.unwrap();

    assert_eq!(combined.entities, 2);
    assert_eq!(combined.values.get(d(2024, 8, 5)), Some(150.0));
    assert_eq!(combined.values.get(d(2024, 8, 12)), Some(180.0));
    assert_eq!(combined.partial_periods(), vec![d(2024, 8, 12)]);
    assert!(!combined.is_complete());
}

#[tokio::test]
async fn fixture_gaps_are_reported_not_zeroed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("metrics.json");
    fs::write(
        &path,
        r#"{"cac": {"Acme Corp": {"2024-08-05": 210.0, "2024-08-19": 190.0}}}"#,
    )
    .unwrap();

    let cfg = EngineConfig {
        source: SourceKind::Fixture,
        fixture_path: path.to_string_lossy().to_string(),
        ..EngineConfig::default()
    };
    let source = cfg.source.build(&cfg).unwrap();
    assert_eq!(source.name(), "fixture");

    let engine = engine();
    let periods = engine.bucketize(d(2024, 8, 5), d(2024, 8, 25)).unwrap();
    let def = engine.definition("cac").unwrap();
    let values = resolve_values(source.as_ref(), def, "Acme Corp", &periods).await.unwrap();
    assert_eq!(values.len(), 2);

    let err = engine.assemble_series("cac", &periods, &values).unwrap_err();
    assert!(matches!(err, EngineError::MissingValue { ref period, .. } if period.starts_with("Week 33")));
}

#[tokio::test]
async fn fixture_series_assembles() {
    let source = FixtureSource::from_json_str(
        r#"{"time_to_close": {"FirmOS": {"2024-08-05": 70, "2024-08-12": 63, "2024-08-19": 58}}}"#,
    )
    .unwrap();
    let engine = engine();
    let periods = engine.bucketize(d(2024, 8, 5), d(2024, 8, 25)).unwrap();
    let values = engine
        .resolve_combined(&source, "time_to_close", &["FirmOS".to_string()], &periods)
        .await
        .unwrap();
    let series = engine.assemble_series("time_to_close", &periods, &values.values).unwrap();
    let last = series.latest().unwrap();
    assert_eq!(last.display, "58 days");
    assert_eq!(last.is_favorable, Some(true));
    assert!(last.meets_benchmark);
    assert!(!series.points[0].meets_benchmark);
}

#[test]
fn missing_fixture_file_fails_build() {
    let cfg = EngineConfig {
        source: SourceKind::Fixture,
        fixture_path: "/nonexistent/metrics.json".to_string(),
        ..EngineConfig::default()
    };
    assert!(cfg.source.build(&cfg).is_err());
}

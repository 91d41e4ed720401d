use anyhow::{anyhow, bail, Result};
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};

use kpi_engine::logging::{log, obj, v_str, Domain, Level};
use kpi_engine::period::TimeFrame;
use kpi_engine::source::MetricSource;
use kpi_engine::{EngineConfig, MetricsEngine};

const USAGE: &str = "usage: kpi-engine <metrics | periods | series <metric> [entity...] | recap [entity...]> \
[--frame weeks:N|ytd|year:YYYY|YYYY-MM-DD..YYYY-MM-DD] [--today YYYY-MM-DD]";

struct Args {
    command: String,
    positional: Vec<String>,
    frame: Option<TimeFrame>,
    today: NaiveDate,
}

fn parse_args(mut raw: impl Iterator<Item = String>) -> Result<Args> {
    let command = raw.next().ok_or_else(|| anyhow!(USAGE))?;
    let mut positional = Vec::new();
    let mut frame = None;
    let mut today = Utc::now().date_naive();
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--frame" => {
                let v = raw.next().ok_or_else(|| anyhow!("--frame needs a value"))?;
                frame = Some(v.parse::<TimeFrame>()?);
            }
            "--today" => {
                let v = raw.next().ok_or_else(|| anyhow!("--today needs a value"))?;
                today = v.parse::<NaiveDate>()?;
            }
            _ => positional.push(arg),
        }
    }
    Ok(Args {
        command,
        positional,
        frame,
        today,
    })
}

fn entities_or_all(positional: &[String]) -> Vec<String> {
    if positional.is_empty() {
        vec!["all".to_string()]
    } else {
        positional.to_vec()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    let cfg = EngineConfig::from_env();
    let source: Box<dyn MetricSource> = cfg.source.build(&cfg)?;
    let engine = MetricsEngine::from_config(cfg)?;
    let frame = args.frame.unwrap_or_else(|| engine.default_time_frame());
    let periods = engine.periods_for(&frame, args.today)?;

    log(
        Level::Info,
        Domain::System,
        "command",
        obj(&[
            ("command", v_str(&args.command)),
            ("source", v_str(source.name())),
            ("today", v_str(&args.today.to_string())),
            ("periods", json!(periods.len())),
        ]),
    );

    let out: Value = match args.command.as_str() {
        "metrics" => serde_json::to_value(engine.registry().iter().collect::<Vec<_>>())?,
        "periods" => Value::Array(
            periods
                .iter()
                .map(|p| {
                    json!({
                        "label": p.label,
                        "start_date": p.start_date,
                        "end_date": p.end_date,
                        "range": p.range_label(),
                    })
                })
                .collect(),
        ),
        "series" => {
            let (key, rest) = args
                .positional
                .split_first()
                .ok_or_else(|| anyhow!("series needs a metric key\n{}", USAGE))?;
            let entities = entities_or_all(rest);
            let combined = engine
                .resolve_combined(source.as_ref(), key, &entities, &periods)
                .await?;
            let series = engine.assemble_series(key, &periods, &combined.values)?;
            let series = if entities.len() == 1 {
                series.with_entity(&entities[0])
            } else {
                series
            };
            let summary = engine.summary(key, &series)?;
            json!({
                "entities": entities,
                "series": series,
                "summary": summary,
                "contributors": combined.contributors,
                "partial_periods": combined.partial_periods(),
            })
        }
        "recap" => {
            let entities = entities_or_all(&args.positional);
            let mut rows = Vec::new();
            for def in engine.registry().iter() {
                for entity in &entities {
                    let combined = engine
                        .resolve_combined(source.as_ref(), &def.key, std::slice::from_ref(entity), &periods)
                        .await?;
                    let series = engine
                        .assemble_series(&def.key, &periods, &combined.values)?
                        .with_entity(entity);
                    if let Some(row) = engine.recap(&def.key, &series)? {
                        rows.push(row);
                    }
                }
            }
            serde_json::to_value(rows)?
        }
        other => bail!("unknown command {:?}\n{}", other, USAGE),
    };

    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

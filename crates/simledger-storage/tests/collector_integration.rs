mod common;

use common::{LifeGrid, temp_db_path};
use duckdb::Connection;
use simledger_core::{CollectorConfig, Reporter, ReporterRegistry, Value};
use simledger_storage::Collector;
use std::fs;

fn file_config(path: &std::path::Path) -> CollectorConfig {
    CollectorConfig {
        connection: format!("duckdb:{}", path.display()),
        ..CollectorConfig::default()
    }
}

fn life_collector(config: CollectorConfig) -> Collector<LifeGrid> {
    let mut model_reporters = ReporterRegistry::new();
    model_reporters
        .register("count", Reporter::function(|_m: &LifeGrid| Value::Int(9)))
        .expect("model reporter");
    let mut agent_reporters = ReporterRegistry::new();
    agent_reporters
        .register("alive", Reporter::attribute("isAlive"))
        .expect("agent reporter");
    Collector::new(config, model_reporters, agent_reporters).expect("collector")
}

#[test]
fn two_steps_over_a_3x3_torus_land_as_2_model_and_18_agent_rows() {
    let path = temp_db_path("scenario");
    let mut grid = LifeGrid::new(3, 3);
    let mut collector = life_collector(file_config(&path));

    grid.step();
    collector.collect(&grid).expect("first collect");
    grid.step();
    collector.collect(&grid).expect("second collect");
    collector.close().expect("close");
    drop(collector);

    let conn = Connection::open(&path).expect("reopen");

    let model_rows: i64 = conn
        .query_row("select count(*) from model", [], |row| row.get(0))
        .expect("model count");
    assert_eq!(model_rows, 2);

    // The scheduler increments before collection: the first collected step
    // must be stamped 0, not 1.
    let steps: Vec<i64> = {
        let mut stmt = conn
            .prepare("select \"step\" from model order by \"step\"")
            .expect("prepare");
        let mut rows = stmt.query([]).expect("query");
        let mut steps = Vec::new();
        while let Some(row) = rows.next().expect("next") {
            steps.push(row.get(0).expect("step"));
        }
        steps
    };
    assert_eq!(steps, vec![0, 1]);

    let counts: i64 = conn
        .query_row(
            "select count(*) from model where \"count\" = 9",
            [],
            |row| row.get(0),
        )
        .expect("count column");
    assert_eq!(counts, 2);

    let agent_rows: i64 = conn
        .query_row("select count(*) from agents", [], |row| row.get(0))
        .expect("agents count");
    assert_eq!(agent_rows, 18);
    for step in 0..2 {
        let per_step: i64 = conn
            .query_row(
                "select count(*) from agents where \"step\" = ?",
                [step],
                |row| row.get(0),
            )
            .expect("per-step count");
        assert_eq!(per_step, 9);
    }

    let run_ids: i64 = conn
        .query_row(
            "select count(distinct \"runID\") from agents",
            [],
            |row| row.get(0),
        )
        .expect("distinct runs");
    assert_eq!(run_ids, 1);
    let runs: i64 = conn
        .query_row("select count(*) from runs", [], |row| row.get(0))
        .expect("runs count");
    assert_eq!(runs, 1);

    drop(conn);
    let _ = fs::remove_file(path);
}

#[test]
fn sequential_runs_get_consecutive_ids() {
    let path = temp_db_path("run-ids");
    for expected in 1..=3_i64 {
        let mut grid = LifeGrid::new(2, 2);
        let mut collector = life_collector(file_config(&path));
        grid.step();
        collector.collect(&grid).expect("collect");
        assert_eq!(collector.run_id(), Some(expected));
        collector.close().expect("close");
    }

    let conn = Connection::open(&path).expect("reopen");
    let ids: Vec<i64> = {
        let mut stmt = conn
            .prepare("select id from runs order by id")
            .expect("prepare");
        let mut rows = stmt.query([]).expect("query");
        let mut ids = Vec::new();
        while let Some(row) = rows.next().expect("next") {
            ids.push(row.get(0).expect("id"));
        }
        ids
    };
    assert_eq!(ids, vec![1, 2, 3]);

    drop(conn);
    let _ = fs::remove_file(path);
}

#[test]
fn all_four_reporter_kinds_survive_the_full_pipeline() {
    let path = temp_db_path("polymorphic");
    let mut grid = LifeGrid::new(3, 3);

    let mut model_reporters: ReporterRegistry<LifeGrid> = ReporterRegistry::new();
    model_reporters
        .register("population", Reporter::attribute("population"))
        .expect("attribute");
    model_reporters
        .register(
            "aliveShare",
            Reporter::function(|m: &LifeGrid| {
                Value::Real(m.alive_count() as f64 / 9.0)
            }),
        )
        .expect("function");
    model_reporters
        .register(
            "gridArea",
            Reporter::with_args(
                |args: &[Value]| match (&args[0], &args[1]) {
                    (Value::Int(w), Value::Int(h)) => Value::Int(w * h),
                    _ => Value::Null,
                },
                vec![Value::Int(3), Value::Int(3)],
            ),
        )
        .expect("with args");
    model_reporters
        .register("scenario", Reporter::bound(|| Value::Text("life".to_string())))
        .expect("bound");

    let mut collector: Collector<LifeGrid> = Collector::new(
        file_config(&path),
        model_reporters,
        ReporterRegistry::new(),
    )
    .expect("collector");

    grid.step();
    collector.collect(&grid).expect("collect");
    collector.close().expect("close");
    drop(collector);

    // A blinker line on a 3x3 torus stays fully populated after one step,
    // so aliveShare is deterministic.
    let expected_share = {
        let mut check = LifeGrid::new(3, 3);
        check.step();
        check.alive_count() as f64 / 9.0
    };

    let conn = Connection::open(&path).expect("reopen");
    let (population, share, area, scenario): (i64, f64, i64, String) = conn
        .query_row(
            "select \"population\", \"aliveShare\", \"gridArea\", \"scenario\" from model",
            [],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                ))
            },
        )
        .expect("model row");
    assert_eq!(population, 9);
    assert!((share - expected_share).abs() < 1e-9);
    assert_eq!(area, 9);
    assert_eq!(scenario, "life");

    drop(conn);
    let _ = fs::remove_file(path);
}

#[test]
fn redeclaring_a_table_with_other_columns_is_rejected_across_processes() {
    use simledger_core::{ColumnSpec, ColumnType};

    let path = temp_db_path("schema-conflict");
    let mut first = file_config(&path);
    first.table_schemas.insert(
        "trace".to_string(),
        vec![ColumnSpec::new("event", ColumnType::Text)],
    );
    let mut collector = life_collector(first);
    collector.close().expect("close");
    drop(collector);

    let mut second = file_config(&path);
    second.table_schemas.insert(
        "trace".to_string(),
        vec![
            ColumnSpec::new("event", ColumnType::Text),
            ColumnSpec::new("weight", ColumnType::Real),
        ],
    );
    let mut model_reporters: ReporterRegistry<LifeGrid> = ReporterRegistry::new();
    model_reporters
        .register("count", Reporter::function(|_m: &LifeGrid| Value::Int(0)))
        .expect("reporter");
    let result = Collector::new(second, model_reporters, ReporterRegistry::new());
    assert!(result.is_err(), "conflicting redeclaration must not open");

    let _ = fs::remove_file(path);
}

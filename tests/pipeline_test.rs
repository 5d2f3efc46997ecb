use arthropod_monthly::aggregate::seasonal_aggregate;
use arthropod_monthly::output::{generate_summary, write_csv};
use arthropod_monthly::view::{build_view, ViewChoice};
use arthropod_monthly::{run, FillPolicy, PipelineConfig, PipelineError, Season};
use chrono::NaiveDate;
use proptest::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const SPIDERS: &str = "\
id,observed_on,iconic_taxon_name
1,2017-01-15,Arachnida
2,2017-01-20,Arachnida
3,2017-02-03,Arachnida
4,2017-02-10,Insecta
5,unknown,Arachnida
6,2018-07-04,Arachnida
";

const FLIES: &str = "\
id,observed_on,iconic_taxon_name
1,2017-06-02 08:15:00 UTC,Insecta
2,2017-06-30,Insecta
";

const AIR_QUALITY: &str = "\
Unique ID,Name,Time Period,Start_Date,Data Value
1,Fine particles (PM 2.5),Annual Average 2017,01/01/2017,8.0
2,Fine particles (PM 2.5),Winter 2017-18,12/01/2017,10.0
3,Fine particles (PM 2.5),2005-2007,01/01/2005,12.0
4,Fine particles (PM 2.5),Summer 2017,06/01/2017,not measured
";

const WEATHER: &str = "\
STATION,NAME,DATE,TAVG
USW00014732,\"LAGUARDIA AIRPORT, NY US\",2017-01,39.5
USW00014732,\"LAGUARDIA AIRPORT, NY US\",2017-02,41.0
USW00094728,\"NY CITY CENTRAL PARK, NY US\",2017-01,38.0
";

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

fn study_dir(config: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "spiders.csv", SPIDERS);
    write(dir.path(), "flies.csv", FLIES);
    write(dir.path(), "air_quality.csv", AIR_QUALITY);
    write(dir.path(), "weather.csv", WEATHER);
    write(dir.path(), "pipeline.toml", config);
    dir
}

const CONFIG: &str = r#"
[window]
start = "2017-01-01"
end = "2018-02-28"

[output]
directory = "out"

[[observations]]
column = "spider_count"
path = "spiders.csv"
category = "Arachnida"

[[observations]]
column = "fly_count"
path = "flies.csv"
category = "Insecta"

[[periods]]
column = "aqi_mean"
path = "air_quality.csv"

[[stations]]
column = "temp_mean"
path = "weather.csv"
station = "LAGUARDIA AIRPORT, NY US"
"#;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn full_run_from_config_file() {
    let dir = study_dir(CONFIG);
    let config = PipelineConfig::from_file(&dir.path().join("pipeline.toml")).unwrap();
    let out = run(&config).unwrap();

    assert_eq!(out.grid.len(), 14);
    assert_eq!(out.merged.rows.len(), 14);
    assert_eq!(out.merged.rows[0].key.month_start, d(2017, 1, 1));
    assert_eq!(out.merged.rows[13].key.month_start, d(2018, 2, 1));

    let spiders = out.merged.counts("spider_count").unwrap();
    assert_eq!(&spiders[..3], &[2, 1, 0]);
    assert_eq!(spiders.iter().sum::<u64>(), 3);

    let flies = out.merged.counts("fly_count").unwrap();
    assert_eq!(flies[5], 2);

    // Annual 2017 covers Jan..Dec 2017; Winter 2017-18 covers Dec..Feb.
    let aqi = out.merged.values("aqi_mean").unwrap();
    assert_eq!(aqi[0], Some(8.0));
    assert_eq!(aqi[11], Some(9.0));
    assert_eq!(aqi[12], Some(10.0));
    assert_eq!(aqi[13], Some(10.0));

    let temp = out.merged.values("temp_mean").unwrap();
    assert_eq!(&temp[..3], &[Some(39.5), Some(41.0), None]);

    assert_eq!(
        out.merged.column_spec("temp_mean").unwrap().policy,
        FillPolicy::Measurement
    );
    let aq_report = out.reports.iter().find(|r| r.source.ends_with("air_quality.csv")).unwrap();
    assert_eq!(aq_report.unknown_labels, 1);
    assert_eq!(aq_report.parse_errors, 1);
}

#[test]
fn merged_counts_are_complete_and_measurements_may_be_missing() {
    let dir = study_dir(CONFIG);
    let config = PipelineConfig::from_file(&dir.path().join("pipeline.toml")).unwrap();
    let out = run(&config).unwrap();
    for spec in &out.merged.columns {
        let values = out.merged.values(&spec.name).unwrap();
        match spec.policy {
            FillPolicy::Count => assert!(values.iter().all(|v| matches!(v, Some(n) if *n >= 0.0))),
            FillPolicy::Measurement => {}
        }
    }
    assert!(out.merged.values("temp_mean").unwrap().iter().any(Option::is_none));
}

#[test]
fn seasonal_view_and_summary_from_a_run() {
    let dir = study_dir(CONFIG);
    let config = PipelineConfig::from_file(&dir.path().join("pipeline.toml")).unwrap();
    let out = run(&config).unwrap();

    let seasonal = seasonal_aggregate(&out.merged, "spider_count", None).unwrap();
    let first = seasonal.keys()[0];
    assert_eq!((first.year, first.season), (2017, Season::Winter));
    assert_eq!(seasonal.column("spider_count_season").unwrap()[0], Some(3.0));

    let view = build_view(ViewChoice::Seasonal, &out.merged).unwrap();
    let out_dir = &config.output.directory;
    fs::create_dir_all(out_dir).unwrap();
    let path = out_dir.join("seasonal.csv");
    write_csv(&path, &view).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("year,season,spider_count,fly_count,aqi_mean,temp_mean\n2017,Winter,3,0,8,40.25\n"));

    let summary = serde_json::to_value(generate_summary(&out)).unwrap();
    assert_eq!(summary["months"], 14);
    assert_eq!(summary["columns"][0]["total"], 3.0);
    assert_eq!(summary["columns"][3]["months_missing"], 12);
}

#[test]
fn missing_category_column_aborts_with_schema_error() {
    let config = CONFIG.replace("category = \"Insecta\"", "category = \"Insecta\"\ncategory_column = \"taxon\"");
    let dir = study_dir(&config);
    let config = PipelineConfig::from_file(&dir.path().join("pipeline.toml")).unwrap();
    let err = run(&config).unwrap_err();
    match err {
        PipelineError::Schema { source_name, columns } => {
            assert!(source_name.ends_with("flies.csv"));
            assert_eq!(columns, vec!["taxon"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn mid_month_window_start_keeps_first_month_measurements() {
    let dir = study_dir(&CONFIG.replace("start = \"2017-01-01\"", "start = \"2017-01-15\""));
    let config = PipelineConfig::from_file(&dir.path().join("pipeline.toml")).unwrap();
    let out = run(&config).unwrap();

    assert_eq!(out.merged.rows[0].key.month_start, d(2017, 1, 1));
    assert_eq!(out.merged.values("temp_mean").unwrap()[0], Some(39.5));
    assert_eq!(out.merged.values("aqi_mean").unwrap()[0], Some(8.0));
    // Both January sightings fall on or after the 15th.
    assert_eq!(out.merged.counts("spider_count").unwrap()[0], 2);
}

#[test]
fn missing_source_file_is_io_error() {
    let dir = study_dir(&CONFIG.replace("weather.csv", "nowhere.csv"));
    let config = PipelineConfig::from_file(&dir.path().join("pipeline.toml")).unwrap();
    assert!(matches!(run(&config), Err(PipelineError::Io { .. })));
}

#[test]
fn repeated_runs_are_identical() {
    let dir = study_dir(CONFIG);
    let config = PipelineConfig::from_file(&dir.path().join("pipeline.toml")).unwrap();
    let a = run(&config).unwrap();
    let b = run(&config).unwrap();
    assert_eq!(a.merged, b.merged);
    assert_eq!(a.reports, b.reports);
}

proptest! {
    #[test]
    fn season_mapping_total_and_idempotent(month in 1u32..=12) {
        let season = Season::from_month(month).unwrap();
        prop_assert!(season.months().contains(&month));
        // re-deriving from any month of the season gives the same season
        for &m in season.months() {
            prop_assert_eq!(Season::from_month(m), Some(season));
        }
    }
}

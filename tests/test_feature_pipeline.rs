//! Integration test: readings CSV → windowed features → Parquet shards

use chrono::{Duration, NaiveDateTime};
use energy_forecast::timeseries::{
    FeatureConfig, FeaturePipeline, FeatureTable, StreamingFeatures, WindowConfig,
};
use energy_forecast::utils::DataLoader;
use energy_forecast::ForecastError;
use std::io::Write;
use std::path::PathBuf;

fn scratch_dir() -> tempfile::TempDir {
    tempfile::tempdir().unwrap()
}

fn base() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("2007-01-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
}

/// Hourly readings CSV with `power_mean(i) = i`, rows written in `order`
fn write_csv(dir: &PathBuf, order: &[usize]) -> PathBuf {
    let path = dir.join("hourly.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        "datetime,Global_active_power_mean,Global_active_power_max,Global_active_power_min,Global_active_power_std,Voltage_mean"
    )
    .unwrap();
    for &i in order {
        let ts = base() + Duration::hours(i as i64);
        writeln!(
            file,
            "{},{}.0,{}.5,{}.0,0.25,240.0",
            ts.format("%Y-%m-%d %H:%M:%S"),
            i,
            i,
            i.saturating_sub(1)
        )
        .unwrap();
    }
    path
}

#[test]
fn test_closed_form_series() {
    let tmp = scratch_dir();
    let dir = tmp.path().to_path_buf();
    let order: Vec<usize> = (0..200).collect();
    let readings = DataLoader::new().load_readings(&write_csv(&dir, &order)).unwrap();
    let table = FeaturePipeline::new(FeatureConfig::default()).unwrap().run(readings).unwrap();

    assert_eq!(table.len(), 200 - 168);
    for record in table.records() {
        let i = record.target_power;
        assert_eq!(record.lags, vec![i - 1.0, i - 24.0, i - 168.0]);
        assert!((record.rolling_mean - (i - 84.5)).abs() < 1e-9);
        assert!((record.rolling_std - 2366f64.sqrt()).abs() < 1e-9);
    }
    assert_eq!(table.records()[0].target_power, 168.0);
}

#[test]
fn test_unsorted_input_matches_sorted() {
    let tmp = scratch_dir();
    let dir = tmp.path().to_path_buf();
    let sorted: Vec<usize> = (0..220).collect();
    let mut shuffled = sorted.clone();
    shuffled.reverse();
    shuffled.swap(3, 150);

    let loader = DataLoader::new();
    let pipeline = FeaturePipeline::new(FeatureConfig::default()).unwrap();
    let a = pipeline.run(loader.load_readings(&write_csv(&dir, &sorted)).unwrap()).unwrap();
    let b = pipeline.run(loader.load_readings(&write_csv(&dir, &shuffled)).unwrap()).unwrap();
    assert_eq!(a.records(), b.records());
}

#[test]
fn test_duplicate_timestamp_rejected() {
    let tmp = scratch_dir();
    let dir = tmp.path().to_path_buf();
    let mut order: Vec<usize> = (0..180).collect();
    order.push(42);
    let readings = DataLoader::new().load_readings(&write_csv(&dir, &order)).unwrap();
    let err = FeaturePipeline::new(FeatureConfig::default()).unwrap().run(readings).unwrap_err();
    assert!(matches!(err, ForecastError::Parse(_)));
}

#[test]
fn test_sequential_parallel_and_streaming_agree() {
    let tmp = scratch_dir();
    let dir = tmp.path().to_path_buf();
    let order: Vec<usize> = (0..400).collect();
    let readings = DataLoader::new().load_readings(&write_csv(&dir, &order)).unwrap();

    let parallel = FeaturePipeline::new(FeatureConfig::default().with_parallel(true))
        .unwrap()
        .run(readings.clone())
        .unwrap();
    let sequential = FeaturePipeline::new(FeatureConfig::default().with_parallel(false))
        .unwrap()
        .run(readings.clone())
        .unwrap();

    let mut streaming = StreamingFeatures::new(WindowConfig::default()).unwrap();
    let streamed: Vec<_> = readings
        .into_iter()
        .filter_map(|r| streaming.push(r).unwrap())
        .collect();

    assert_eq!(parallel.records(), sequential.records());
    assert_eq!(parallel.records(), streamed.as_slice());
}

#[test]
fn test_parquet_shards_round_trip() {
    let tmp = scratch_dir();
    let dir = tmp.path().to_path_buf();
    let order: Vec<usize> = (0..500).collect();
    let readings = DataLoader::new().load_readings(&write_csv(&dir, &order)).unwrap();
    let table = FeaturePipeline::new(FeatureConfig::default()).unwrap().run(readings).unwrap();

    let out = dir.join("features");
    let shards = table.write_shards(&out, 100).unwrap();
    assert_eq!(shards.len(), 4);
    assert!(shards[0].ends_with("part-00000.parquet"));

    let loaded = FeatureTable::read_dir(&out).unwrap();
    assert_eq!(loaded.columns(), table.columns());
    assert_eq!(loaded.records(), table.records());

    // Rewriting with larger shards replaces the old files
    assert_eq!(table.write_shards(&out, 1000).unwrap().len(), 1);
    assert_eq!(FeatureTable::read_dir(&out).unwrap().len(), table.len());
}

#[test]
fn test_missing_value_is_parse_error() {
    let tmp = scratch_dir();
    let dir = tmp.path().to_path_buf();
    let path = dir.join("bad.csv");
    std::fs::write(
        &path,
        "datetime,Global_active_power_mean,Global_active_power_max,Global_active_power_min,Global_active_power_std,Voltage_mean\n\
         2007-01-01 00:00:00,1.0,1.5,0.5,0.1,240.0\n\
         2007-01-01 01:00:00,,1.5,0.5,0.1,240.0\n",
    )
    .unwrap();
    let err = DataLoader::new().load_readings(&path).unwrap_err();
    assert!(matches!(err, ForecastError::Parse(_)), "{err}");
}

#[test]
fn test_nan_reading_is_parse_error() {
    let tmp = scratch_dir();
    let dir = tmp.path().to_path_buf();
    let order: Vec<usize> = (0..600).collect();
    let path = write_csv(&dir, &order);

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<String> = content
        .lines()
        .enumerate()
        .map(|(n, line)| {
            // header is line 0, so data row 300 is line 301
            if n == 301 {
                let mut fields: Vec<&str> = line.split(',').collect();
                fields[1] = "NaN";
                fields.join(",")
            } else {
                line.to_string()
            }
        })
        .collect();
    std::fs::write(&path, lines.join("\n") + "\n").unwrap();

    let err = DataLoader::new().load_readings(&path).unwrap_err();
    assert!(matches!(err, ForecastError::Parse(_)), "{err}");
    assert!(err.to_string().contains("Global_active_power_mean"));
}

use std::{fs, path::Path};

use approx::assert_relative_eq;
use serde_json::json;
use zonalmap::{pipeline::{ArtifactKind, SourceSpec}, FeatureLayer, RunConfig};

/// Two wards over the grid and one far outside it.
fn write_wards(dir: &Path) {
    let square = |x0: f64, y0: f64| json!({
        "type": "Polygon",
        "coordinates": [[[x0, y0], [x0 + 1.0, y0], [x0 + 1.0, y0 + 1.0], [x0, y0 + 1.0], [x0, y0]]],
    });
    let features = [("w1", square(0.0, 0.0)), ("w2", square(1.0, 0.0)), ("w3", square(10.0, 10.0))]
        .into_iter()
        .map(|(id, geometry)| json!({
            "type": "Feature",
            "geometry": geometry,
            "properties": { "WardID_": id, "HVI": 0.5 },
        }))
        .collect::<Vec<_>>();
    let collection = json!({ "type": "FeatureCollection", "features": features });
    fs::write(dir.join("wards.geojson"), serde_json::to_vec(&collection).unwrap()).unwrap();
}

/// A 2 x 4 grid of half-degree pixels covering x 0..2, y 0..1.
fn write_grid(path: &Path, rows: [[f64; 4]; 2]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let body = rows.iter()
        .map(|row| row.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n");
    let text = format!("ncols 4\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 0.5\nNODATA_value -9999\n{body}\n");
    fs::write(path, text).unwrap();
}

fn write_config(dir: &Path, config: serde_json::Value) -> RunConfig {
    let path = dir.join("run.json");
    fs::write(&path, serde_json::to_vec_pretty(&config).unwrap()).unwrap();
    RunConfig::load(&path).unwrap()
}

#[test]
fn local_raster_is_extracted_joined_and_rendered() {
    let dir = tempfile::tempdir().unwrap();
    write_wards(dir.path());
    write_grid(&dir.path().join("lst.asc"), [[1.0, 2.0, 3.0, 4.0], [5.0, 6.0, -9999.0, 8.0]]);

    let config = write_config(dir.path(), json!({
        "input": "wards.geojson",
        "id_field": "WardID_",
        "output_dir": "out",
        "datasets": [{
            "column": "LST",
            "source": { "type": "local", "path": "lst.asc" },
            "map": { "output": "lst.svg", "title": "Land Surface Temperature", "palette": "RdYlBu_r" }
        }],
        "maps": [{ "column": "NOT_THERE", "output": "missing.svg" }],
        "csv": "joined.csv"
    }));

    let report = zonalmap::run(&config).unwrap();

    let values = &report.extractions[0].values;
    assert_eq!(values.len(), 3);
    assert_relative_eq!(values[0].1.unwrap(), 3.5);
    assert_relative_eq!(values[1].1.unwrap(), 5.0);
    assert_eq!(values[2].1, None);
    assert_eq!(report.joins[0].matched, 2);
    assert_eq!(report.joins[0].missing, 1);

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].step, "map NOT_THERE");

    let kinds = report.artifacts.iter().map(|a| a.kind).collect::<Vec<_>>();
    assert_eq!(kinds, vec![ArtifactKind::Map, ArtifactKind::Vector, ArtifactKind::Table]);

    let svg = fs::read_to_string(dir.path().join("out/lst.svg")).unwrap();
    assert!(svg.starts_with("<svg") || svg.starts_with("<?xml"));
    assert!(svg.contains("Land Surface Temperature"));
    assert!(!dir.path().join("out/missing.svg").exists());

    let joined = FeatureLayer::read(&dir.path().join("out/joined.geojson"), Some("WardID_")).unwrap();
    assert_eq!(joined.len(), 3);
    assert_eq!(joined.ids()[2].as_str(), "w3");
    assert_eq!(joined.column_values("LST").unwrap(), vec![Some(3.5), Some(5.0), None]);
    assert_eq!(joined.column_values("HVI").unwrap(), vec![Some(0.5); 3]);

    let csv = fs::read_to_string(dir.path().join("out/joined.csv")).unwrap();
    assert_eq!(csv.lines().count(), 4);
}

#[test]
fn dataset_overlay_writes_page_and_image() {
    let dir = tempfile::tempdir().unwrap();
    write_wards(dir.path());
    write_grid(&dir.path().join("lst.asc"), [[20.0, 25.0, 30.0, 35.0], [40.0, 45.0, -9999.0, 10.0]]);

    let config = write_config(dir.path(), json!({
        "input": "wards.geojson",
        "id_field": "WardID_",
        "output_dir": "out",
        "datasets": [{
            "column": "LST",
            "source": { "type": "local", "path": "lst.asc" },
            "overlay": { "output": "html/lst.html", "title": "Land Surface Temperature",
                         "legend_label": "Land Surface Temperature (°C)",
                         "vmin": 20, "vmax": 40, "palette": ["#0000ff", "#ffff00", "#ff0000"] }
        }]
    }));

    let report = zonalmap::run(&config).unwrap();
    assert!(!report.has_failures(), "{:?}", report.failures);
    let interactive = report.artifacts.iter().find(|a| a.kind == ArtifactKind::Interactive).unwrap();
    assert_eq!(interactive.path, dir.path().join("out/html/lst.html"));

    let html = fs::read_to_string(&interactive.path).unwrap();
    assert!(html.contains(r#"L.imageOverlay("lst.png", [[0.0,0.0],[1.0,2.0]]"#));
    assert!(html.contains("Land Surface Temperature (°C)"));

    let png = fs::read(dir.path().join("out/html/lst.png")).unwrap();
    assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    // IHDR width and height, big-endian: one image pixel per grid cell.
    assert_eq!(u32::from_be_bytes([png[16], png[17], png[18], png[19]]), 4);
    assert_eq!(u32::from_be_bytes([png[20], png[21], png[22], png[23]]), 2);
}

#[test]
fn johannesburg_config_carries_landsat_and_combined_figure() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/johannesburg.json");
    let config = RunConfig::load(&path).unwrap();

    let landsat = config.datasets.iter().find(|d| d.column == "LANDSAT_TEMP").unwrap();
    assert!(matches!(&landsat.source, SourceSpec::Collection { band, .. } if band == "ST_B10"));
    assert_relative_eq!(landsat.rescale.scale, 0.00341802);
    assert_relative_eq!(landsat.rescale.offset, 149.0 - 273.15, epsilon = 1e-9);
    assert_eq!(landsat.map.as_ref().unwrap().output, Path::new("landsat_temp_map.png"));

    let combined = config.figures.iter().find(|f| f.output == Path::new("combined_analysis.png")).unwrap();
    let columns = combined.panels.iter().map(|p| p.column.as_str()).collect::<Vec<_>>();
    assert_eq!(columns, ["MODIS_LST", "LANDSAT_TEMP", "MODIS_NDVI", "POPULATION"]);
    assert_eq!(combined.ncols, 2);

    let overlays = config.datasets.iter().filter(|d| d.overlay.is_some()).count();
    assert_eq!(overlays, 4);
}

#[test]
fn collection_mean_respects_the_date_window() {
    let dir = tempfile::tempdir().unwrap();
    write_wards(dir.path());
    let band = dir.path().join("rasters/MOD11A2/LST_Day_1km");
    write_grid(&band.join("lst_2023-01-01.asc"), [[2.0; 4]; 2]);
    write_grid(&band.join("lst_2023-06-01.asc"), [[4.0; 4]; 2]);
    write_grid(&band.join("lst_2024-01-01.asc"), [[100.0; 4]; 2]);

    let source = |reducer: &str| json!({
        "type": "collection", "collection": "MOD11A2", "band": "LST_Day_1km",
        "start": "2023-01-01", "end": "2024-01-01", "reducer": reducer,
    });
    let config = write_config(dir.path(), json!({
        "input": "wards.geojson",
        "id_field": "WardID_",
        "output_dir": "out",
        "data_root": "rasters",
        "datasets": [
            { "column": "LST_MEAN", "source": source("mean"), "rescale": { "scale": 0.5, "offset": -1.0 } },
            { "column": "LST_FIRST", "source": source("first") }
        ]
    }));

    let report = zonalmap::run(&config).unwrap();
    assert!(!report.has_failures(), "{:?}", report.failures);

    let mean = &report.extractions[0].values;
    assert_relative_eq!(mean[0].1.unwrap(), 0.5);
    assert_relative_eq!(mean[1].1.unwrap(), 0.5);
    assert_eq!(mean[2].1, None);

    let first = &report.extractions[1].values;
    assert_relative_eq!(first[0].1.unwrap(), 2.0);
}

#[test]
fn failed_dataset_does_not_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    write_wards(dir.path());

    let config = write_config(dir.path(), json!({
        "input": "wards.geojson",
        "id_field": "WardID_",
        "output_dir": "out",
        "datasets": [{ "column": "NDVI", "source": { "type": "local", "path": "absent.asc" } }],
        "maps": [{ "column": "HVI", "output": "hvi.svg", "vmin": 0.0, "vmax": 1.0 }]
    }));

    let report = zonalmap::run(&config).unwrap();
    assert!(report.has_failures());
    assert_eq!(report.failures[0].step, "dataset NDVI");
    assert!(report.extractions.is_empty());
    assert!(dir.path().join("out/hvi.svg").exists());
    assert!(dir.path().join("out/joined.geojson").exists());
}

#[test]
fn unreadable_input_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), json!({ "input": "nowhere.geojson", "output_dir": "out" }));
    let err = zonalmap::run(&config).unwrap_err();
    assert!(format!("{err:#}").contains("failed to load input layer"));
}

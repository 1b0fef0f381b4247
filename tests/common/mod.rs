//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// Three stands around the default airport center
pub const STANDS_JSON: &str = r#"{
  "apronview.stands.v1": "{\"2\":{\"lat\":-34.8210,\"lng\":-58.5360,\"hdg\":90},\"10\":{\"lat\":-34.8220,\"lng\":-58.5370,\"hdg\":180},\"9\":{\"lat\":-34.8200,\"lng\":-58.5350,\"hdg\":0}}"
}"#;

/// A feed with a turnaround on 10, an arrival moving 2>9 and a departure on
/// an unknown stand
pub const FEED_JSON: &str = r#"{
  "serverTime": "2026-02-06T12:00:00Z",
  "arrivals": [
    {"flight": "AR1301", "reg": "lv-aaa", "pos": "10", "time": "11:40", "origin": "COR", "status": "LANDED"},
    {"flight": "AR1503", "reg": "LV-BBB", "pos": "2>9", "time": "11:55", "origin": "MDZ", "status": "ON BLOCK"},
    {"flight": "AR1999", "reg": "", "pos": "2", "time": "12:10", "origin": "USH"}
  ],
  "departures": [
    {"flight": "AR1302", "reg": "LV-AAA", "pos": "10", "time": "13:00", "dest": "COR", "status": "BOARDING"},
    {"flight": "AR1700", "reg": "LV-CCC", "pos": "77", "time": "13:30", "dest": "BRC"}
  ]
}"#;

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

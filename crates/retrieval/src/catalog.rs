use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use walkdir::WalkDir;
use wayfinder_core::{Coordinate, Place, SemanticPayload, SourcePrice};

/// One place as stored in a catalog file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub place_id: String,
    #[serde(default)]
    pub osm_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub name_en: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub opening_hours: Option<String>,
    #[serde(default)]
    pub price_info: Option<SourcePrice>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl CatalogRecord {
    pub fn position(&self) -> Option<Coordinate> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
            _ => None,
        }
    }

    pub fn to_place(&self) -> Place {
        let mut place = Place {
            place_id: self.place_id.clone(),
            osm_id: self.osm_id.clone(),
            name: self.name.clone(),
            name_en: self.name_en.clone(),
            address: self.address.clone(),
            categories: self.categories.clone(),
            opening_hours: self.opening_hours.clone(),
            price_info: self.price_info,
            ..Place::default()
        };
        place.set_position(self.position());
        place
    }

    pub fn to_payload(&self) -> SemanticPayload {
        SemanticPayload {
            name: Some(self.name.clone()),
            name_en: self.name_en.clone(),
            address: self.address.clone(),
            categories: self.categories.clone(),
            lat: self.lat,
            lon: self.lon,
            summary: self.summary.clone(),
            opening_hours: self.opening_hours.clone(),
            price_info: self.price_info,
            osm_id: self.osm_id.clone(),
        }
    }

    /// Text indexed for keyword and vector matching.
    pub fn search_text(&self) -> String {
        [
            Some(self.name.as_str()),
            self.name_en.as_deref(),
            self.address.as_deref(),
            self.summary.as_deref(),
        ]
        .into_iter()
        .flatten()
        .chain(self.categories.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// Reads every `.json` (array or single record) and `.jsonl` file under
/// `root`, which may also be a single file. The first record wins on
/// duplicate `place_id`s.
pub fn load_records(root: &Path) -> Result<Vec<CatalogRecord>> {
    let mut records = Vec::new();
    let mut seen = HashSet::new();

    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
    {
        let path = entry.path();
        let extension = path.extension().and_then(|ext| ext.to_str());
        if !matches!(extension, Some("json") | Some("jsonl")) {
            continue;
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed reading catalog file: {}", path.display()))?;
        let parsed = if extension == Some("jsonl") {
            parse_lines(&raw).with_context(|| format!("invalid catalog lines in {}", path.display()))?
        } else {
            parse_document(&raw).with_context(|| format!("invalid catalog file {}", path.display()))?
        };

        for record in parsed {
            if seen.insert(record.place_id.clone()) {
                records.push(record);
            } else {
                warn!(place_id = %record.place_id, file = %path.display(), "duplicate catalog record skipped");
            }
        }
    }

    Ok(records)
}

fn parse_document(raw: &str) -> Result<Vec<CatalogRecord>> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(anyhow::Error::from))
            .collect(),
        value @ Value::Object(_) => Ok(vec![serde_json::from_value(value)?]),
        _ => anyhow::bail!("expected an array of places or a single place object"),
    }
}

fn parse_lines(raw: &str) -> Result<Vec<CatalogRecord>> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}", index + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("wayfinder-catalog-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn reads_arrays_objects_and_lines() {
        let dir = scratch_dir("mixed");
        fs::write(
            dir.join("a.json"),
            r#"[{"place_id":"p1","name":"Cafe Giảng","categories":["cafe"],"lat":21.03,"lon":105.85,"price_info":{"min":30000}}]"#,
        )
        .unwrap();
        fs::write(dir.join("b.json"), r#"{"place_id":"p2","name":"Hồ Tây"}"#).unwrap();
        fs::write(
            dir.join("c.jsonl"),
            "{\"place_id\":\"p3\",\"name\":\"Chợ Đồng Xuân\"}\n\n{\"place_id\":\"p1\",\"name\":\"dup\"}\n",
        )
        .unwrap();
        fs::write(dir.join("notes.md"), "# ignored").unwrap();

        let records = load_records(&dir).unwrap();
        let ids = records.iter().map(|r| r.place_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, ["p1", "p2", "p3"]);
        assert_eq!(records[0].name, "Cafe Giảng");
        assert_eq!(records[0].price_info.unwrap().band().max, 60_000);

        let place = records[1].to_place();
        assert!(!place.has_position);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn malformed_file_names_the_path() {
        let dir = scratch_dir("broken");
        fs::write(dir.join("bad.json"), "{not json").unwrap();
        let error = load_records(&dir).unwrap_err();
        assert!(format!("{error:#}").contains("bad.json"));
        fs::remove_dir_all(&dir).unwrap();
    }
}

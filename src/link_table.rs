//! JSON link tables keyed `link1`, `link2`, ... plus a reserved `_meta` entry.
//!
//! Field names are kept stable for the downstream notebooks that read them.

use crate::dedup::{Resolution, ResolvedLink};
use crate::error::HarvestError;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::warn;

pub const META_KEY: &str = "_meta";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    #[serde(rename = "duplicate list", default)]
    pub duplicate_list: Vec<String>,
    #[serde(rename = "original form", default)]
    pub original_form: String,
    #[serde(rename = "bare minimum form", default)]
    pub canonical_form: String,
    #[serde(rename = "original start position of the current link", default)]
    pub start: usize,
    #[serde(rename = "original end position of the current link", default)]
    pub end: usize,
    #[serde(rename = "accompanying RAG summary + metadata string", default)]
    pub summary: String,
    #[serde(default)]
    pub selected: u8,
}

impl LinkEntry {
    fn from_resolved(link: &ResolvedLink) -> Self {
        let occurrence = &link.occurrence;
        Self {
            duplicate_list: link.duplicates.iter().map(|id| link_key(*id)).collect(),
            original_form: occurrence.original_form.clone(),
            canonical_form: occurrence.canonical_key.clone(),
            start: occurrence.start,
            end: occurrence.end,
            summary: occurrence.summary.clone(),
            selected: u8::from(link.selected),
        }
    }

    /// The URL to retrieve for this entry, if any.
    pub fn url(&self) -> Option<&str> {
        [self.original_form.as_str(), self.canonical_form.as_str()]
            .into_iter()
            .find(|candidate| !candidate.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    pub links_found: usize,
    pub deduplicated: usize,
    pub policy: String,
    pub source: String,
}

/// Ordered link table as written to disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkTable {
    pub meta: Option<TableMeta>,
    pub entries: Vec<(String, LinkEntry)>,
}

pub fn link_key(id: usize) -> String {
    format!("link{id}")
}

impl LinkTable {
    /// Every occurrence, selected or not.
    pub fn full(resolution: &Resolution, meta: TableMeta) -> Self {
        Self::from_links(resolution.links.iter(), meta)
    }

    /// Only the representative of each duplicate group.
    pub fn deduplicated(resolution: &Resolution, meta: TableMeta) -> Self {
        Self::from_links(resolution.selected(), meta)
    }

    fn from_links<'a>(links: impl Iterator<Item = &'a ResolvedLink>, meta: TableMeta) -> Self {
        Self {
            meta: Some(meta),
            entries: links
                .map(|link| (link_key(link.occurrence.id), LinkEntry::from_resolved(link)))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// URLs of all entries, in table order.
    pub fn urls(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|(_, entry)| entry.url())
            .map(str::to_string)
            .collect()
    }

    /// Parse a table. Entries that do not look like link records are skipped
    /// with a warning rather than failing the whole table.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: Map<String, Value> = serde_json::from_str(json)?;
        let mut table = LinkTable::default();
        for (key, value) in raw {
            if key == META_KEY {
                table.meta = serde_json::from_value(value).ok();
                continue;
            }
            match serde_json::from_value::<LinkEntry>(value) {
                Ok(entry) => table.entries.push((key, entry)),
                Err(e) => warn!(key = %key, error = %e, "skipping malformed link record"),
            }
        }
        Ok(table)
    }

    pub fn load(path: &Path) -> Result<Self, HarvestError> {
        if !path.exists() {
            return Err(HarvestError::MissingInput(path.to_path_buf()));
        }
        let json = std::fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;
        Self::from_json(&json).map_err(|e| HarvestError::json(path, e))
    }

    pub fn save(&self, path: &Path) -> Result<(), HarvestError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| HarvestError::json(path, e))?;
        std::fs::write(path, json).map_err(|e| HarvestError::io(path, e))
    }
}

impl Serialize for LinkTable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = self.entries.len() + usize::from(self.meta.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        if let Some(meta) = &self.meta {
            map.serialize_entry(META_KEY, meta)?;
        }
        for (key, entry) in &self.entries {
            map.serialize_entry(key, entry)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::{FirstOccurrence, analyze};

    fn meta() -> TableMeta {
        TableMeta {
            links_found: 2,
            deduplicated: 1,
            policy: "first".to_string(),
            source: "notes.txt".to_string(),
        }
    }

    #[test]
    fn serializes_with_stable_field_names_in_order() {
        let resolution = analyze(
            "See [guide](https://WWW.Example.com/Doc/) and also https://example.com/doc",
            &FirstOccurrence,
        );
        let table = LinkTable::full(&resolution, meta());
        let value = serde_json::to_value(&table).unwrap();

        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["_meta", "link1", "link2"]);

        let first = &value["link1"];
        assert_eq!(first["original form"], "https://WWW.Example.com/Doc/");
        assert_eq!(first["bare minimum form"], "example.com/doc");
        assert_eq!(first["duplicate list"], serde_json::json!(["link2"]));
        assert_eq!(first["original start position of the current link"], 12);
        assert_eq!(first["original end position of the current link"], 39);
        assert_eq!(first["accompanying RAG summary + metadata string"], "");
        assert_eq!(first["selected"], 1);
        assert_eq!(value["link2"]["selected"], 0);

        let dedup = LinkTable::deduplicated(&resolution, meta());
        assert_eq!(dedup.len(), 1);
        assert_eq!(dedup.entries[0].0, "link1");
    }

    #[test]
    fn parsing_skips_meta_and_malformed_records() {
        let json = r#"{
            "_meta": {"links_found": 3, "deduplicated": 2, "policy": "richest", "source": "x"},
            "link1": {"original form": "https://a.com", "bare minimum form": "a.com", "selected": 1},
            "link4": {"original form": "", "bare minimum form": "b.com/x", "selected": 1},
            "link5": "not a record"
        }"#;
        let table = LinkTable::from_json(json).unwrap();
        assert_eq!(table.meta.as_ref().map(|m| m.links_found), Some(3));
        assert_eq!(table.len(), 2);
        assert_eq!(table.urls(), ["https://a.com", "b.com/x"]);
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = LinkTable::load(&dir.path().join("deduplicated.json")).unwrap_err();
        assert!(matches!(err, HarvestError::MissingInput(_)));
    }

    #[test]
    fn save_then_load_keeps_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.json");
        let resolution = analyze("https://a.com/x and https://b.com/y", &FirstOccurrence);
        let table = LinkTable::full(&resolution, meta());
        table.save(&path).unwrap();

        let loaded = LinkTable::load(&path).unwrap();
        assert_eq!(loaded, table);
    }
}

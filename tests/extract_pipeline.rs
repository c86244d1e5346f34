use httpmock::prelude::*;
use httpmock::Method::HEAD;
use linkharvest::commands::{self, FetchOptions};
use linkharvest::dedup::{FirstOccurrence, RichestSummary};
use linkharvest::link_table::LinkTable;
use linkharvest::{HarvestConfig, HarvestError};
use std::path::Path;
use std::time::Duration;

const NOTES: &str = "\
# Vendor notes

1. **[Product guide](https://WWW.Example.com/Guide/?utm_source=chat)**
2. Pricing: https://example.com/pricing
3. See https://example.com/guide again for install steps and supported models.
";

fn write_source(data_dir: &Path, vendor: &str, text: &str) -> std::path::PathBuf {
    let dir = data_dir.join(vendor);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("original sources.txt"), text).unwrap();
    dir
}

#[test]
fn extract_writes_both_tables_per_source() {
    let data = tempfile::tempdir().unwrap();
    let vendor = write_source(data.path(), "example", NOTES);

    let reports =
        commands::run_extract(data.path(), &FirstOccurrence, &HarvestConfig::default()).unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].links_found, 3);
    assert_eq!(reports[0].deduplicated, 2);

    let full = LinkTable::load(&vendor.join("dictionary1.json")).unwrap();
    let keys: Vec<&str> = full.entries.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, ["link1", "link2", "link3"]);
    assert_eq!(full.entries[0].1.canonical_form, "example.com/guide");
    assert_eq!(full.entries[0].1.duplicate_list, ["link3"]);
    assert_eq!(full.entries[1].1.canonical_form, "example.com/pricing");
    assert!(full.entries[1].1.duplicate_list.is_empty());

    let dedup = LinkTable::load(&vendor.join("deduplicated.json")).unwrap();
    assert_eq!(
        dedup.urls(),
        [
            "https://WWW.Example.com/Guide/?utm_source=chat",
            "https://example.com/pricing"
        ]
    );
    assert_eq!(dedup.meta.map(|m| m.policy), Some("first".to_string()));
}

#[test]
fn richest_policy_prefers_the_described_occurrence() {
    let data = tempfile::tempdir().unwrap();
    let vendor = write_source(data.path(), "example", NOTES);

    commands::run_extract(data.path(), &RichestSummary, &HarvestConfig::default()).unwrap();

    let dedup = LinkTable::load(&vendor.join("deduplicated.json")).unwrap();
    let keys: Vec<&str> = dedup.entries.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, ["link2", "link3"]);
    assert!(dedup.entries[1].1.summary.contains("install steps"));
}

#[test]
fn extract_without_sources_is_an_error() {
    let data = tempfile::tempdir().unwrap();
    let err = commands::run_extract(data.path(), &FirstOccurrence, &HarvestConfig::default())
        .unwrap_err();
    assert!(matches!(err, HarvestError::NoSources(_)));
}

#[tokio::test]
async fn fetch_without_run_is_a_dry_run() {
    let data = tempfile::tempdir().unwrap();
    let vendor = write_source(data.path(), "example", NOTES);
    commands::run_extract(data.path(), &FirstOccurrence, &HarvestConfig::default()).unwrap();

    let outcome = commands::run_fetch(
        &vendor,
        HarvestConfig::default(),
        FetchOptions {
            run: false,
            render: false,
        },
    )
    .await
    .unwrap();

    assert!(outcome.is_none());
    assert!(!vendor.join("fetch_manifest.json").exists());
    assert!(!vendor.join("files").exists());
}

#[tokio::test]
async fn fetch_without_table_reports_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let err = commands::run_fetch(
        dir.path(),
        HarvestConfig::default(),
        FetchOptions {
            run: true,
            render: false,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, HarvestError::MissingInput(_)));
}

#[tokio::test]
async fn extracted_links_are_fetched_into_a_manifest() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(HEAD).path("/brochure.pdf");
            then.status(200).header("content-type", "application/pdf");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/brochure.pdf");
            then.status(200).body("%PDF-1.7");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(HEAD).path("/products");
            then.status(200).header("content-type", "text/html");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/products");
            then.status(200).body("<html>products</html>");
        })
        .await;

    let notes = format!(
        "Brochure: {}\nCatalogue [products]({}) with details.\nAgain {}\n",
        server.url("/brochure.pdf"),
        server.url("/products"),
        server.url("/products/"),
    );
    let data = tempfile::tempdir().unwrap();
    let vendor = write_source(data.path(), "acme", &notes);
    commands::run_extract(data.path(), &FirstOccurrence, &HarvestConfig::default()).unwrap();

    let config = HarvestConfig {
        timeout: Duration::from_secs(5),
        preflight_url: None,
        ..HarvestConfig::default()
    };
    let manifest = commands::run_fetch(
        &vendor,
        config,
        FetchOptions {
            run: true,
            render: false,
        },
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(manifest.len(), 2);
    assert_eq!(manifest.count_ok(), 2);
    assert_eq!(
        std::fs::read_to_string(vendor.join("files").join("brochure.pdf")).unwrap(),
        "%PDF-1.7"
    );
    assert!(vendor.join("web pages").join("products.html").exists());

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(vendor.join("fetch_manifest.json")).unwrap())
            .unwrap();
    let statuses: Vec<&str> = written
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, ["ok", "ok"]);
}

#[tokio::test]
async fn unwritable_manifest_path_is_an_io_error() {
    let data = tempfile::tempdir().unwrap();
    let vendor = write_source(data.path(), "acme", "Dead link: http://127.0.0.1:1/gone\n");
    commands::run_extract(data.path(), &FirstOccurrence, &HarvestConfig::default()).unwrap();
    // A directory where the manifest file should go.
    std::fs::create_dir(vendor.join("fetch_manifest.json")).unwrap();

    let config = HarvestConfig {
        timeout: Duration::from_secs(5),
        preflight_url: None,
        ..HarvestConfig::default()
    };
    let err = commands::run_fetch(
        &vendor,
        config,
        FetchOptions {
            run: true,
            render: false,
        },
    )
    .await
    .unwrap_err();

    match err {
        HarvestError::Io { path, .. } => assert_eq!(path, vendor.join("fetch_manifest.json")),
        other => panic!("expected an I/O error, got {other:?}"),
    }
}

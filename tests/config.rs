use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::tempdir;
use topcharts::config::{
    ChartsConfig, Credentials, TrackCollection, expand_candidates, load_config, load_config_file,
};
use topcharts::fetch::{HttpRequest, ReqwestTransport, Transport, fetch};
use topcharts::model::{Region, SourceKind};
use topcharts::pipeline::{ChartResolver, ResolveOptions};
use url::Url;

#[test]
fn built_in_defaults_validate() -> Result<()> {
    let config = load_config(None)?;
    assert_eq!(config.server.bind, "127.0.0.1:5175");
    assert_eq!(config.scrape.candidates.len(), 3);
    assert_eq!(config.csv.candidates.len(), 3);
    assert_eq!(config.catalog.album_limit, 5);
    assert_eq!(config.catalog.tracks, TrackCollection::Albums);
    assert_eq!(
        config.regions.get("es").map(|r| r.name.as_str()),
        Some("spain")
    );
    Ok(())
}

#[test]
fn partial_toml_keeps_section_defaults() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("charts.toml");
    fs::write(
        &path,
        r#"
[server]
bind = "0.0.0.0:8080"

[regions.br]
name = "brazil"

[catalog]
artist = "Somebody Else"
tracks = "top_tracks"
market = "BR"
"#,
    )?;

    let config = load_config_file(&path)?;
    assert_eq!(config.server.bind, "0.0.0.0:8080");
    assert_eq!(config.regions.len(), 1);
    assert_eq!(config.catalog.artist, "Somebody Else");
    assert_eq!(config.catalog.tracks, TrackCollection::TopTracks);
    assert_eq!(config.catalog.timeout_secs, 10);
    assert_eq!(config.scrape.script_ids, vec!["__NEXT_DATA__".to_string()]);
    assert!(config.csv.normalize);
    Ok(())
}

#[test]
fn invalid_values_are_rejected_with_context() -> Result<()> {
    let dir = tempdir()?;
    let cases = [
        ("[server]\nbind = \"not-an-addr\"\n", "server.bind"),
        ("[csv]\ntimeout_secs = 0\n", "csv.timeout_secs"),
        ("[scrape]\ncandidates = [\"\"]\n", "scrape.candidates[0]"),
        ("[csv]\ncandidates = [\"relative/{{region}}\"]\n", "csv.candidates[0]"),
        ("[csv]\nheader_pattern = \"(unclosed\"\n", "header_pattern"),
        ("[catalog]\nalbum_limit = 0\n", "album_limit"),
        ("[regions.\"bad code\"]\nname = \"x\"\n", "region code"),
    ];

    for (index, (text, needle)) in cases.iter().enumerate() {
        let path = dir.path().join(format!("case-{index}.toml"));
        fs::write(&path, text)?;
        let err = load_config_file(&path).expect_err("config must be rejected");
        let message = format!("{err:#}");
        assert!(message.contains(needle), "{message} should mention {needle}");
    }
    Ok(())
}

#[test]
fn disabled_catalog_skips_catalog_validation() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("charts.toml");
    fs::write(&path, "[catalog]\nenabled = false\nartist = \"\"\n")?;
    let config = load_config_file(&path)?;
    assert!(!config.catalog.enabled);
    Ok(())
}

#[test]
fn region_lookup_by_code_name_and_passthrough() {
    let config = ChartsConfig::default();

    let by_code = config.region(" ES ").expect("code lookup");
    assert_eq!(by_code.code, "es");
    assert_eq!(by_code.name, "spain");

    let by_name = config.region("United-Kingdom").expect("name lookup");
    assert_eq!(by_name.code, "gb");

    let unknown = config.region("portugal").expect("well-formed token");
    assert_eq!(unknown.code, "portugal");
    assert_eq!(unknown.name, "portugal");

    assert!(config.region("").is_none());
    assert!(config.region("es/../x").is_none());
    assert!(config.region("es_es").is_none());
    assert!(config.region(&"x".repeat(33)).is_none());
}

#[test]
fn templates_expand_both_placeholders() {
    let region = Region {
        code: "mx".to_string(),
        name: "mexico".to_string(),
    };
    let templates = vec![
        "https://a.test/{{region}}/charts/{{region_name}}".to_string(),
        "https://b.test/static".to_string(),
    ];

    let urls: Vec<String> = expand_candidates(&templates, &region)
        .into_iter()
        .map(|c| c.url)
        .collect();
    assert_eq!(
        urls,
        vec![
            "https://a.test/mx/charts/mexico".to_string(),
            "https://b.test/static".to_string()
        ]
    );
}

#[test]
fn credentials_require_both_non_blank_values() {
    assert!(Credentials::from_parts(None, Some("s".to_string())).is_none());
    assert!(Credentials::from_parts(Some("i".to_string()), None).is_none());
    assert!(Credentials::from_parts(Some("  ".to_string()), Some("s".to_string())).is_none());

    let creds = Credentials::from_parts(Some(" id ".to_string()), Some("secret\n".to_string()))
        .expect("both present");
    assert_eq!(creds.client_id, "id");
    assert_eq!(creds.client_secret, "secret");

    let debug = format!("{creds:?}");
    assert!(!debug.contains("secret\n") && !debug.contains("\"secret\""));
    assert!(debug.contains("redacted"));
}

#[test]
fn source_kind_names() {
    assert_eq!(SourceKind::parse("API"), Some(SourceKind::CatalogApi));
    assert_eq!(SourceKind::parse("catalog"), Some(SourceKind::CatalogApi));
    assert_eq!(SourceKind::parse(" csv "), Some(SourceKind::Csv));
    assert_eq!(SourceKind::parse("rss"), None);
    assert_eq!(SourceKind::Scrape.to_string(), "scrape");
}

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn reqwest_transport_reads_file_urls() -> Result<()> {
    let url = Url::from_file_path(fixture_path("regional-es.csv"))
        .map_err(|_| anyhow::anyhow!("fixture path is not absolute"))?;
    let transport = ReqwestTransport::new()?;

    let doc = fetch(&transport, &HttpRequest::get(url.as_str(), Duration::from_secs(1)))?;
    assert_eq!(doc.status, 200);
    assert!(doc.text().starts_with("Position,Track Name,Artist"));

    let missing = Url::from_file_path(fixture_path("does-not-exist.csv"))
        .map_err(|_| anyhow::anyhow!("fixture path is not absolute"))?;
    assert!(
        transport
            .execute(&HttpRequest::get(missing.as_str(), Duration::from_secs(1)))
            .is_err()
    );
    Ok(())
}

#[test]
fn file_candidates_resolve_offline() -> Result<()> {
    let dir = fixture_path("");
    let template = format!(
        "{}regional-{{{{region}}}}.csv",
        Url::from_directory_path(&dir)
            .map_err(|_| anyhow::anyhow!("fixture dir is not absolute"))?
    );

    let mut config = ChartsConfig::default();
    config.scrape.enabled = false;
    config.csv.candidates = vec![template];
    let region = config.region("es").expect("es region");

    let resolver = ChartResolver::for_region(&config, None, &region, &ResolveOptions::default())?;
    let result = resolver.resolve(&ReqwestTransport::new()?)?;

    assert_eq!(result.source, SourceKind::Csv);
    assert_eq!(result.items.len(), 4);
    assert_eq!(result.items[2].track, "Niña, Te Quiero");
    assert_eq!(result.items[2].artist, "Estopa");
    Ok(())
}

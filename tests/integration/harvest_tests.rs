//! Integration tests for the harvester
//!
//! These tests use wiremock to stand up a small archive (listing pages,
//! issues, articles) and run the full three-phase harvest against it.

use archive_harvest::config::{
    ArchiveConfig, Config, LinksConfig, NetworkConfig, OutputConfig, PaginationConfig,
    UserAgentConfig,
};
use archive_harvest::crawler::{Harvester, PageCountSource};
use archive_harvest::extract::JournalArticleExtractor;
use archive_harvest::output::{write_report, CsvOptions, CsvOutputHandler, XlsxOutputHandler};
use archive_harvest::{DiagnosticReason, ExtractError, PageKind, Record, RecordExtractor};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration for an archive served by `base_url`
fn create_test_config(base_url: &str) -> Config {
    Config {
        archive: ArchiveConfig {
            url: format!("{}/archive", base_url),
            page_url_template: "{archive}/{page}".to_string(),
        },
        links: LinksConfig {
            container_selector: "a.issue".to_string(),
            leaf_selector: "a.article".to_string(),
        },
        pagination: PaginationConfig {
            fallback_page_count: 2,
            ..PaginationConfig::default()
        },
        network: NetworkConfig {
            max_workers_per_phase: 3,
            request_timeout_secs: 2,
            unit_delay_ms: 5, // Very short for testing
            max_attempts: 3,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestHarvest".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig::default(),
    }
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!("<html><body>{}</body></html>", body))
        .insert_header("content-type", "text/html")
}

fn article(title: &str) -> String {
    format!(r#"<h1 class="page_title">{}</h1>"#, title)
}

/// Serves `body` at `at`, expecting exactly one request
async fn serve_once(server: &MockServer, at: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(html(body))
        .expect(1)
        .mount(server)
        .await;
}

fn journal() -> Arc<dyn RecordExtractor> {
    Arc::new(JournalArticleExtractor::new().expect("built-in selectors parse"))
}

async fn harvest(config: &Config, extractor: Arc<dyn RecordExtractor>) -> archive_harvest::HarvestReport {
    Harvester::new(config, extractor, CancellationToken::new())
        .expect("valid test config")
        .run()
        .await
}

#[tokio::test]
async fn test_end_to_end_single_issue() {
    let server = MockServer::start().await;

    serve_once(
        &server,
        "/archive",
        r#"<p>Showing 1-2 of 2</p><a class="issue" href="/issue/1">Vol 1</a>"#,
    )
    .await;
    serve_once(
        &server,
        "/issue/1",
        r#"<a class="article" href="/article/1">A</a><a class="article" href="/article/2">B</a>"#,
    )
    .await;
    serve_once(&server, "/article/1", &article("First")).await;
    serve_once(&server, "/article/2", &article("Second")).await;

    let report = harvest(&create_test_config(&server.uri()), journal()).await;

    assert_eq!(report.records.len(), 2);
    assert!(report.diagnostics.is_empty());
    assert_eq!(report.pagination.pages, 1);
    assert!(matches!(
        report.pagination.source,
        PageCountSource::Summary {
            start: 1,
            end: 2,
            total: 2
        }
    ));
    assert!(!report.cancelled);
    assert_eq!(report.leaves.succeeded, 2);
    assert_eq!(report.containers.succeeded, 1);
    assert_eq!(report.listing_pages.succeeded, 1);

    let mut titles: Vec<&str> = report
        .records
        .iter()
        .filter_map(|r| r.get("title"))
        .collect();
    titles.sort_unstable();
    assert_eq!(titles, vec!["First", "Second"]);
    for record in &report.records {
        assert!(record.source_url().starts_with(&server.uri()));
    }
}

#[tokio::test]
async fn test_overlapping_listing_pages_fetch_each_url_once() {
    let server = MockServer::start().await;

    serve_once(
        &server,
        "/archive",
        r#"<p>1-2 of 4</p>
           <a class="issue" href="/issue/1">1</a>
           <a class="issue" href="/issue/2">2</a>"#,
    )
    .await;
    serve_once(
        &server,
        "/archive/2",
        r#"<p>3-4 of 4</p>
           <a class="issue" href="/issue/2#toc">2 again</a>
           <a class="issue" href="/issue/3">3</a>"#,
    )
    .await;
    for issue in ["/issue/1", "/issue/2", "/issue/3"] {
        serve_once(
            &server,
            issue,
            r#"<a class="article" href="/article/shared">Shared</a>"#,
        )
        .await;
    }
    serve_once(&server, "/article/shared", &article("Shared")).await;

    let report = harvest(&create_test_config(&server.uri()), journal()).await;

    assert_eq!(report.pagination.pages, 2);
    assert_eq!(report.listing_pages.succeeded, 2);
    assert_eq!(report.containers.succeeded, 3);
    assert_eq!(report.leaves.attempted(), 1);
    assert_eq!(report.records.len(), 1);
    assert!(report.diagnostics.is_empty());
}

#[tokio::test]
async fn test_all_containers_failing_still_terminates() {
    let server = MockServer::start().await;

    serve_once(
        &server,
        "/archive",
        r#"<p>1-10 of 2</p>
           <a class="issue" href="/issue/1">1</a>
           <a class="issue" href="/issue/2">2</a>"#,
    )
    .await;
    for issue in ["/issue/1", "/issue/2"] {
        Mock::given(method("GET"))
            .and(path(issue))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;
    }

    let report = harvest(&create_test_config(&server.uri()), journal()).await;

    assert!(report.records.is_empty());
    assert_eq!(report.diagnostics.len(), 2);
    assert!(report
        .diagnostics
        .iter()
        .all(|d| d.kind == PageKind::Container));
    assert_eq!(report.containers.failed, 2);
    assert_eq!(report.leaves.attempted(), 0);
}

#[tokio::test]
async fn test_retry_exhaustion_on_leaf() {
    let server = MockServer::start().await;

    serve_once(
        &server,
        "/archive",
        r#"<a class="issue" href="/issue/1">1</a>"#,
    )
    .await;
    serve_once(
        &server,
        "/issue/1",
        r#"<a class="article" href="/article/flaky">Flaky</a>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/article/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let report = harvest(&create_test_config(&server.uri()), journal()).await;

    assert!(report.records.is_empty());
    assert_eq!(report.diagnostics.len(), 1);
    let diagnostic = &report.diagnostics[0];
    assert_eq!(diagnostic.kind, PageKind::Leaf);
    assert!(diagnostic.url.ends_with("/article/flaky"));
    assert_eq!(
        diagnostic.reason,
        DiagnosticReason::RetriesExhausted {
            attempts: 3,
            cause: "HTTP 503".to_string()
        }
    );
}

#[tokio::test]
async fn test_not_found_leaf_is_not_retried() {
    let server = MockServer::start().await;

    serve_once(
        &server,
        "/archive",
        r#"<a class="issue" href="/issue/1">1</a>"#,
    )
    .await;
    serve_once(
        &server,
        "/issue/1",
        r#"<a class="article" href="/article/gone">Gone</a>
           <a class="article" href="/article/ok">Ok</a>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/article/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    serve_once(&server, "/article/ok", &article("Ok")).await;

    let report = harvest(&create_test_config(&server.uri()), journal()).await;

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].reason, DiagnosticReason::NotFound);
    assert_eq!(report.leaves.not_found, 1);
    assert_eq!(report.leaves.succeeded, 1);
}

#[tokio::test]
async fn test_degraded_pagination_uses_fallback() {
    let server = MockServer::start().await;

    serve_once(
        &server,
        "/archive",
        r#"<a class="issue" href="/issue/1">1</a><a href="/archive/2">Next</a>"#,
    )
    .await;
    serve_once(
        &server,
        "/archive/2",
        r#"<a class="issue" href="/issue/2">2</a>"#,
    )
    .await;
    serve_once(&server, "/issue/1", "<p>empty issue</p>").await;
    serve_once(&server, "/issue/2", "<p>empty issue</p>").await;

    let report = harvest(&create_test_config(&server.uri()), journal()).await;

    assert!(report.discovery_degraded());
    assert_eq!(report.pagination.source, PageCountSource::NextControlFallback);
    assert_eq!(report.pagination.pages, 2);
    assert_eq!(report.containers.succeeded, 2);
    assert!(report.records.is_empty());
    assert!(report.diagnostics.is_empty());
}

#[tokio::test]
async fn test_no_pagination_signal_is_single_page() {
    let server = MockServer::start().await;

    serve_once(&server, "/archive", r#"<a class="issue" href="/issue/1">1</a>"#).await;
    serve_once(&server, "/issue/1", "").await;

    let report = harvest(&create_test_config(&server.uri()), journal()).await;

    assert_eq!(report.pagination.pages, 1);
    assert_eq!(report.pagination.source, PageCountSource::SinglePageAssumed);
    assert_eq!(report.listing_pages.attempted(), 1);
}

#[tokio::test]
async fn test_extraction_failure_becomes_diagnostic() {
    let server = MockServer::start().await;

    serve_once(&server, "/archive", r#"<a class="issue" href="/issue/1">1</a>"#).await;
    serve_once(
        &server,
        "/issue/1",
        r#"<a class="article" href="/article/1">1</a>"#,
    )
    .await;
    serve_once(&server, "/article/1", "<p>Under maintenance</p>").await;

    let report = harvest(&create_test_config(&server.uri()), journal()).await;

    assert!(report.records.is_empty());
    assert_eq!(report.diagnostics.len(), 1);
    assert!(matches!(
        report.diagnostics[0].reason,
        DiagnosticReason::Extraction(_)
    ));
    assert_eq!(report.leaves.failed, 1);
}

#[tokio::test]
async fn test_panicking_extractor_does_not_abort_run() {
    let server = MockServer::start().await;

    serve_once(&server, "/archive", r#"<a class="issue" href="/issue/1">1</a>"#).await;
    serve_once(
        &server,
        "/issue/1",
        r#"<a class="article" href="/article/bad">bad</a>
           <a class="article" href="/article/good">good</a>"#,
    )
    .await;
    serve_once(&server, "/article/bad", "bad").await;
    serve_once(&server, "/article/good", "good").await;

    let extractor = |body: &str, url: &Url| -> Result<Vec<Record>, ExtractError> {
        if body.contains("bad") {
            panic!("extractor bug");
        }
        Ok(vec![Record::new(url.as_str()).with_field("body", Some("good"))])
    };

    let report = harvest(&create_test_config(&server.uri()), Arc::new(extractor)).await;

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.diagnostics.len(), 1);
    assert!(matches!(
        report.diagnostics[0].reason,
        DiagnosticReason::WorkerPanicked(_)
    ));
}

#[tokio::test]
async fn test_records_always_point_at_the_fetched_leaf() {
    let server = MockServer::start().await;

    serve_once(&server, "/archive", r#"<a class="issue" href="/issue/1">1</a>"#).await;
    serve_once(
        &server,
        "/issue/1",
        r#"<a class="article" href="/article/1">1</a>"#,
    )
    .await;
    serve_once(&server, "/article/1", &article("One")).await;

    let extractor = |_: &str, _: &Url| -> Result<Vec<Record>, ExtractError> {
        Ok(vec![
            Record::new("https://elsewhere.example/never-fetched").with_field("n", Some("1")),
            Record::new("").with_field("n", Some("2")),
        ])
    };

    let report = harvest(&create_test_config(&server.uri()), Arc::new(extractor)).await;

    let leaf = format!("{}/article/1", server.uri());
    assert_eq!(report.records.len(), 2);
    for record in &report.records {
        assert_eq!(record.source_url(), leaf);
    }
    assert_eq!(report.unique_sources(), 1);
    assert!(report.diagnostics.is_empty());
}

#[tokio::test]
async fn test_cancellation_mid_leaf_phase() {
    let server = MockServer::start().await;

    serve_once(&server, "/archive", r#"<a class="issue" href="/issue/1">1</a>"#).await;
    serve_once(
        &server,
        "/issue/1",
        r#"<a class="article" href="/article/1">1</a>
           <a class="article" href="/article/2">2</a>
           <a class="article" href="/article/3">3</a>"#,
    )
    .await;
    serve_once(&server, "/article/1", &article("One")).await;
    for leaf in ["/article/2", "/article/3"] {
        Mock::given(method("GET"))
            .and(path(leaf))
            .respond_with(html(&article("Never")))
            .expect(0)
            .mount(&server)
            .await;
    }

    let mut config = create_test_config(&server.uri());
    config.network.max_workers_per_phase = 1;

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let extractor = move |_: &str, url: &Url| -> Result<Vec<Record>, ExtractError> {
        token.cancel();
        Ok(vec![Record::new(url.as_str()).with_field("title", Some("One"))])
    };

    let report = Harvester::new(&config, Arc::new(extractor), cancel)
        .expect("valid test config")
        .run()
        .await;

    assert!(report.cancelled);
    assert_eq!(report.records.len(), 1);
    assert!(report.records[0].source_url().ends_with("/article/1"));
    assert_eq!(report.skipped, 2);
    assert_eq!(report.leaves.attempted(), 1);
    assert!(report.diagnostics.is_empty());
}

#[tokio::test]
async fn test_cancelled_before_start_sends_no_requests() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(html(r#"<p>1-1 of 3</p><a class="issue" href="/issue/1">1</a>"#))
        .expect(0)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = Harvester::new(&create_test_config(&server.uri()), journal(), cancel)
        .expect("valid test config")
        .run()
        .await;

    assert!(report.cancelled);
    assert_eq!(report.pagination.pages, 1);
    assert!(report.discovery_degraded());
    // Only the archive page itself was ever admitted
    assert_eq!(report.skipped, 1);
    assert_eq!(report.listing_pages.attempted(), 0);
    assert!(report.records.is_empty());
    assert!(report.diagnostics.is_empty());
}

#[tokio::test]
async fn test_report_written_as_csv() {
    let server = MockServer::start().await;
    let dir = tempfile::TempDir::new().unwrap();

    serve_once(&server, "/archive", r#"<a class="issue" href="/issue/1">1</a>"#).await;
    serve_once(
        &server,
        "/issue/1",
        r#"<a class="article" href="/article/b">b</a>
           <a class="article" href="/article/a">a</a>
           <a class="article" href="/article/missing">m</a>"#,
    )
    .await;
    serve_once(&server, "/article/a", &article("Alpha")).await;
    serve_once(&server, "/article/b", &article("Beta")).await;
    Mock::given(method("GET"))
        .and(path("/article/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let report = harvest(&create_test_config(&server.uri()), journal()).await;

    let handler = CsvOutputHandler::new(
        dir.path().join("records.csv"),
        dir.path().join("diagnostics.csv"),
        CsvOptions::default(),
    );
    let (records, diagnostics) = write_report(&handler, &report).unwrap();
    assert_eq!((records, diagnostics), (2, 1));

    let written = std::fs::read_to_string(handler.records_path()).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("journal|issn|volume"));
    assert!(lines[0].ends_with("|source_url"));
    assert!(lines[1].contains("|Alpha|"));
    assert!(lines[2].contains("|Beta|"));

    let written = std::fs::read_to_string(handler.diagnostics_path()).unwrap();
    assert!(written.contains("/article/missing|leaf|not found (HTTP 404)"));

    let spreadsheet = XlsxOutputHandler::new(dir.path().join("records.xlsx"), "");
    assert_eq!(write_report(&spreadsheet, &report).unwrap(), (2, 1));
    assert!(spreadsheet.path().exists());
}

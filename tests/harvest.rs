use certfinder::sources::{CrtShSource, DatabaseSource};
use certfinder::types::OutputFormat;
use certfinder::{CertFinderEngine, CertFinderError, Config, NameStore, PipelineState};
use mockito::Matcher;

fn aggregator_query() -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("q".into(), "%.example.com".into()),
        Matcher::UrlEncoded("output".into(), "json".into()),
    ])
}

#[tokio::test]
async fn aggregator_names_are_printed_once_in_first_seen_order() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/")
        .match_query(aggregator_query())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"[{"name_value":"www.example.com"},
                {"name_value":"www.example.com"},
                {"name_value":"mail.example.com\nwww.example.com"}]"#,
        )
        .create_async()
        .await;

    let source = CrtShSource::new(&format!("{}/", server.url()));
    let mut engine = CertFinderEngine::new(Config::default(), Box::new(source)).unwrap();

    let mut out = Vec::new();
    let stats = engine.run_to("example.com", &mut out).await.unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "www.example.com\nmail.example.com\n");
    assert_eq!(stats.records_fetched, 3);
    assert_eq!(stats.unique_subdomains, 2);
    assert_eq!(engine.state(), PipelineState::Done);
    mock.assert_async().await;
}

#[tokio::test]
async fn concatenated_aggregator_body_is_repaired() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/")
        .match_query(aggregator_query())
        .with_status(200)
        .with_body(r#"{"name_value":"a.example.com"}{"name_value":"b.example.com"}"#)
        .create_async()
        .await;

    let mut config = Config::default();
    config.output.format = OutputFormat::Csv;
    let source = CrtShSource::new(&format!("{}/", server.url()));
    let mut engine = CertFinderEngine::new(config, Box::new(source)).unwrap();

    let mut out = Vec::new();
    engine.run_to("api.example.com", &mut out).await.unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "subdomain\na.example.com\nb.example.com\n");
}

#[tokio::test]
async fn aggregator_error_status_is_fatal() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let source = CrtShSource::new(&format!("{}/", server.url()));
    let mut engine = CertFinderEngine::new(Config::default(), Box::new(source)).unwrap();

    let mut out = Vec::new();
    let result = engine.run_to("example.com", &mut out).await;
    assert!(matches!(result, Err(CertFinderError::UnexpectedStatus(503))));
    assert!(out.is_empty());
    assert_eq!(engine.state(), PipelineState::Failed);
}

#[tokio::test]
async fn stored_names_feed_the_same_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.db");

    let store = NameStore::open(&path).await.unwrap();
    for name in ["a.example.com", "b.example.org", "a.example.com", "c.example.com"] {
        store.append(name).await.unwrap();
    }
    store.close().await;

    let source = DatabaseSource::new(path);
    let mut engine = CertFinderEngine::new(Config::default(), Box::new(source)).unwrap();

    let mut out = Vec::new();
    let stats = engine.run_to("www.example.com", &mut out).await.unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "a.example.com\nc.example.com\n");
    assert_eq!(stats.records_fetched, 3);
}

#[tokio::test]
async fn missing_store_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let source = DatabaseSource::new(dir.path().join("absent.db"));
    let mut engine = CertFinderEngine::new(Config::default(), Box::new(source)).unwrap();

    let mut out = Vec::new();
    let result = engine.run_to("example.com", &mut out).await;
    assert!(matches!(result, Err(CertFinderError::StorageError(_))));
    assert!(!dir.path().join("absent.db").exists());
}

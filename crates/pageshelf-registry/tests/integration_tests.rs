//! Integration tests for pageshelf-registry

use pageshelf::clock::ManualClock;
use pageshelf::{FileRecord, content_type};
use pageshelf_registry::*;
use std::sync::Arc;

const NOW: u64 = 1_700_000_000_000;

fn registry() -> (Registry, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(NOW));
    let registry = Registry::builder(
        Arc::new(MemoryStorage::new()),
        Arc::new(MemoryKvStorage::with_clock(clock.clone())),
    )
    .with_clock(clock.clone())
    .build();
    (registry, clock)
}

fn html(tenant: &str, slug: &str, body: &str) -> PublishRequest {
    PublishRequest {
        tenant: tenant.into(),
        slug: Some(slug.into()),
        files: vec![FileRecord::text("index.html", body)],
        html_ttl: Some(60),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_publish_then_get_content_round_trips() {
    let (registry, _) = registry();
    registry
        .publish(html("alice", "index", "<h1>Hi</h1>"))
        .await
        .unwrap();

    let content = registry.get_content("alice:index").await.unwrap();
    assert_eq!(content.body, b"<h1>Hi</h1>");
    assert_eq!(content.content_type, content_type::HTML);
    assert_eq!(
        content.headers.get("x-content-type-options").map(String::as_str),
        Some("nosniff")
    );
}

#[tokio::test]
async fn test_list_versions_newest_first() {
    let (registry, clock) = registry();
    let v1 = registry.publish(html("alice", "index", "one")).await.unwrap();
    clock.advance_millis(5);
    let v2 = registry.publish(html("alice", "index", "two")).await.unwrap();
    assert!(v1.version < v2.version);

    let versions: Vec<u64> = registry
        .list_versions("alice", "index")
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.version)
        .collect();
    assert_eq!(versions, vec![v2.version, v1.version]);
}

#[tokio::test]
async fn test_rollback_serves_older_version() {
    let (registry, clock) = registry();
    let v1 = registry.publish(html("alice", "index", "one")).await.unwrap();
    clock.advance_millis(5);
    registry.publish(html("alice", "index", "two")).await.unwrap();

    let pointer = registry.rollback("alice", "index", v1.version).await.unwrap();
    assert_eq!(pointer.version, v1.version);
    assert_eq!(pointer.cache_ttl, 60);

    let content = registry.resolve("alice", "", None).await.unwrap();
    assert_eq!(content.body, b"one");
    assert_eq!(content.version, v1.version);
}

#[tokio::test]
async fn test_rollback_to_missing_version_leaves_pointer() {
    let (registry, _) = registry();
    let published = registry.publish(html("alice", "index", "one")).await.unwrap();

    let err = registry.rollback("alice", "index", 12345).await.unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(_)));

    let pointer = registry.pointer("alice", "index").await.unwrap().unwrap();
    assert_eq!(pointer, published.pointer);
}

#[tokio::test]
async fn test_expired_page_is_gone_and_unlisted() {
    let (registry, clock) = registry();
    registry
        .publish(PublishRequest {
            delete_after_seconds: Some(600),
            ..html("alice", "index", "temporary")
        })
        .await
        .unwrap();

    assert!(registry.resolve("alice", "", None).await.is_ok());

    clock.advance_secs(601);
    assert!(matches!(
        registry.resolve("alice", "", None).await,
        Err(RegistryError::Gone(_))
    ));
    assert!(matches!(
        registry.get_content("alice:index").await,
        Err(RegistryError::Gone(_))
    ));
    assert!(registry.list_versions("alice", "index").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_referer_and_basename_fallback() {
    let (registry, _) = registry();
    registry
        .publish(PublishRequest {
            tenant: "alice".into(),
            slug: Some("docs".into()),
            files: vec![
                FileRecord::text("index.html", r#"<link href="/css/styles.css">"#),
                FileRecord::text("css/styles.css", "h1{color:red}"),
            ],
            ..Default::default()
        })
        .await
        .unwrap();

    let content = registry
        .resolve("alice", "styles.css", Some("https://host/p/alice/docs/intro"))
        .await
        .unwrap();
    assert_eq!(content.slug, "docs");
    assert_eq!(content.path, "css/styles.css");
    assert_eq!(content.body, b"h1{color:red}");

    // the stored entry document references the asset relatively
    let index = registry.resolve("alice", "docs", None).await.unwrap();
    assert_eq!(index.body, br#"<link href="css/styles.css">"#);
}

#[tokio::test]
async fn test_single_html_publish_and_versioned_page_id() {
    let (registry, clock) = registry();
    let first = registry
        .publish_single_html(SingleHtmlRequest {
            tenant: "alice".into(),
            slug: Some("notes".into()),
            html_base64: Some("PGgxPkhpPC9oMT4=".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(first.url, "/p/alice/notes");

    clock.advance_millis(10);
    registry
        .publish_single_html(SingleHtmlRequest {
            tenant: "alice".into(),
            slug: Some("notes".into()),
            html: Some("<h1>Bye</h1>".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    let old = registry.get_content(&first.page_id).await.unwrap();
    assert_eq!(old.body, b"<h1>Hi</h1>");

    let current = registry.get_content("alice:notes").await.unwrap();
    assert_eq!(current.body, b"<h1>Bye</h1>");

    assert!(matches!(
        registry.get_content("alice:notes:abc").await,
        Err(RegistryError::Validation(_))
    ));
}

#[tokio::test]
async fn test_tenants_are_isolated_and_case_insensitive() {
    let (registry, _) = registry();
    registry.publish(html("Alice", "index", "alice")).await.unwrap();

    assert_eq!(
        registry.resolve("ALICE", "", None).await.unwrap().body,
        b"alice"
    );
    assert!(matches!(
        registry.resolve("bob", "", None).await,
        Err(RegistryError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_admit_limits_publishes() {
    let clock = Arc::new(ManualClock::new(NOW));
    let registry = Registry::builder(
        Arc::new(MemoryStorage::new()),
        Arc::new(MemoryKvStorage::with_clock(clock.clone())),
    )
    .with_clock(clock.clone())
    .with_rate_limit(RateLimitConfig {
        window_seconds: 60,
        limit: 2,
    })
    .build();

    assert!(registry.admit("publish", "198.51.100.4").await.is_ok());
    assert!(registry.admit("publish", "198.51.100.4").await.is_ok());
    assert!(matches!(
        registry.admit("publish", "198.51.100.4").await,
        Err(RegistryError::RateLimited { retry_after: 60, limit: 2 })
    ));
}

#[tokio::test]
async fn test_receipt_url_serves_the_published_page() {
    let (registry, clock) = registry();

    for slug in ["v1.2", "css", "assets", "blog/2024", "report.html", "docs"] {
        let body = format!("page {slug}");
        let receipt = registry.publish(html("alice", slug, &body)).await.unwrap();
        clock.advance_millis(1);

        let path = receipt
            .url
            .strip_prefix("/p/alice/")
            .expect("url is under the tenant");
        let content = registry.resolve("alice", path, None).await.unwrap();
        assert_eq!(content.body, body.as_bytes(), "slug {slug} served via {}", receipt.url);
        assert_eq!(content.version, receipt.version);
    }
}

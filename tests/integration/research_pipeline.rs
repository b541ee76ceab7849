// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Duration;

use researchrs::domain::search::engine::StaticDispatcher;
use researchrs::{
    ExclusionReason, FetchStatus, Fetcher, ResearchError, ResearchService, Settings,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.fetcher.request_timeout_secs = 2;
    settings.fetcher.max_retries = 0;
    settings.fetcher.initial_backoff_ms = 20;
    settings.throttle.per_domain_rate_limit = 100;
    settings
}

fn service_with(settings: &Settings, urls: Vec<String>) -> ResearchService {
    let fetcher = Arc::new(Fetcher::new(settings).expect("client should build"));
    ResearchService::new(Arc::new(StaticDispatcher::new(urls)), fetcher, settings)
}

fn article(title: &str, paragraphs: &[&str]) -> String {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<p>{}</p>", p))
        .collect();
    format!(
        "<html><head><title>{title}</title>\
         <meta name=\"description\" content=\"{title}\"></head>\
         <body><article><h1>{title}</h1>{body}</article></body></html>"
    )
}

async fn mount_page(server: &MockServer, route: &str, html: String) {
    // set_body_string会把mime重置为text/plain，必须用set_body_raw声明HTML
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(html, "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

const OWNERSHIP_TEXT: &str = "Ownership rules in Rust move values between bindings and the \
    borrow checker verifies every reference before the program compiles. Borrowing lets \
    functions read data without taking ownership of the data.";

async fn mount_research_corpus(server: &MockServer) {
    mount_page(
        server,
        "/ownership",
        article("Rust Ownership and Borrowing", &[OWNERSHIP_TEXT]),
    )
    .await;
    mount_page(
        server,
        "/gardening",
        article(
            "Gardening Vegetables at Home",
            &["Tomatoes and peppers need warm soil, steady watering and plenty of sunlight. \
               Raised beds keep the soil loose so roots spread quickly during the season."],
        ),
    )
    .await;
    mount_page(
        server,
        "/quantum",
        article(
            "Quantum Hardware Progress",
            &["Superconducting qubits now hold coherence long enough for useful error \
               correction experiments, and trapped ion machines keep improving gate fidelity."],
        ),
    )
    .await;
    mount_page(
        server,
        "/cooking",
        article(
            "Mediterranean Cooking Basics",
            &["Olive oil, lemon and fresh herbs carry most mediterranean dishes. Simple \
               grilled fish with seasonal vegetables makes a complete weeknight dinner."],
        ),
    )
    .await;
}

#[tokio::test]
async fn test_research_full_pipeline_partitions_every_candidate() {
    let server = MockServer::start().await;
    mount_research_corpus(&server).await;

    // 与 /ownership 近重复：同标题，正文仅一词之差
    mount_page(
        &server,
        "/ownership-mirror",
        article(
            "Rust Ownership and Borrowing",
            &[&OWNERSHIP_TEXT.replace("compiles", "builds")],
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/logo"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forbidden"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let candidates: Vec<String> = [
        "/ownership",
        "/gardening",
        "/quantum",
        "/cooking",
        "/ownership-mirror",
        "/logo",
        "/missing",
        "/forbidden",
    ]
    .iter()
    .map(|route| format!("{}{}", server.uri(), route))
    .collect();

    let settings = test_settings();
    let service = service_with(&settings, candidates);
    let report = service.research("rust ownership", 4).await.unwrap();

    assert_eq!(report.sources.len(), 4);
    let source_urls: Vec<&str> = report.sources.iter().map(|d| d.url.as_str()).collect();
    assert!(source_urls.iter().all(|url| {
        url.ends_with("/ownership")
            || url.ends_with("/gardening")
            || url.ends_with("/quantum")
            || url.ends_with("/cooking")
    }));

    // 每个未入选候选都带原因出现在失败列表
    assert_eq!(report.failures.len(), 4);
    let reason_of = |suffix: &str| {
        report
            .failures
            .iter()
            .find(|f| f.url.ends_with(suffix))
            .map(|f| f.reason.clone())
            .expect("failure entry present")
    };
    assert_eq!(reason_of("/ownership-mirror"), ExclusionReason::Duplicate);
    assert!(matches!(
        reason_of("/logo"),
        ExclusionReason::ExtractionFailed(_)
    ));
    assert_eq!(
        reason_of("/missing"),
        ExclusionReason::FetchFailed(FetchStatus::NetworkError)
    );
    assert_eq!(
        reason_of("/forbidden"),
        ExclusionReason::FetchFailed(FetchStatus::Blocked)
    );

    assert_eq!(report.domains_covered, vec!["127.0.0.1".to_string()]);
    assert!(report.total_word_count > 0);
    assert!(!report.keyword_ranking.is_empty());
    // 跨文档关键词按权重降序
    for pair in report.keyword_ranking.windows(2) {
        assert!(pair[0].1 >= pair[1].1);
    }
}

#[tokio::test]
async fn test_report_is_deterministic_across_runs() {
    let server = MockServer::start().await;
    mount_research_corpus(&server).await;

    let candidates: Vec<String> = ["/ownership", "/gardening", "/quantum"]
        .iter()
        .map(|route| format!("{}{}", server.uri(), route))
        .collect();

    let settings = test_settings();
    let service = service_with(&settings, candidates);

    let first = service.research("mixed topics", 3).await.unwrap();
    let second = service.research("mixed topics", 3).await.unwrap();

    let urls = |report: &researchrs::Report| {
        report
            .sources
            .iter()
            .map(|d| d.url.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(urls(&first), urls(&second));
    assert_eq!(first.keyword_ranking, second.keyword_ranking);
    assert_eq!(first.domains_covered, second.domains_covered);
    assert_eq!(first.total_word_count, second.total_word_count);
}

#[tokio::test]
async fn test_sources_beyond_limit_are_reported_as_truncated() {
    let server = MockServer::start().await;
    mount_research_corpus(&server).await;

    let candidates: Vec<String> = ["/ownership", "/gardening"]
        .iter()
        .map(|route| format!("{}{}", server.uri(), route))
        .collect();

    let settings = test_settings();
    let service = service_with(&settings, candidates);
    let report = service.research("anything", 1).await.unwrap();

    assert_eq!(report.sources.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].reason, ExclusionReason::Truncated);
}

#[tokio::test]
async fn test_deadline_yields_partial_report_without_token_deficit() {
    let server = MockServer::start().await;
    mount_research_corpus(&server).await;
    for route in ["/stuck1", "/stuck2"] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(article("Never Arrives", &["too late"]), "text/html; charset=utf-8")
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&server)
            .await;
    }

    let candidates: Vec<String> = ["/ownership", "/gardening", "/stuck1", "/stuck2"]
        .iter()
        .map(|route| format!("{}{}", server.uri(), route))
        .collect();

    let mut settings = test_settings();
    settings.research.overall_deadline_secs = 1;
    let service = service_with(&settings, candidates);
    let capacity = settings.throttle.per_domain_rate_limit as f64;

    let started = std::time::Instant::now();
    let report = service.research("partial run", 4).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));

    assert_eq!(report.sources.len(), 2);
    let cancelled = report
        .failures
        .iter()
        .filter(|f| f.reason == ExclusionReason::FetchFailed(FetchStatus::Cancelled))
        .count();
    assert_eq!(cancelled, 2);

    // 被取消的请求退还令牌，只有完成的两次消费了预算
    let available = service.fetcher().throttle().available("127.0.0.1");
    assert!(available > capacity - 2.5, "available = {}", available);
}

#[tokio::test]
async fn test_fetch_one_returns_scored_document() {
    let server = MockServer::start().await;
    mount_research_corpus(&server).await;

    let settings = test_settings();
    let service = service_with(&settings, Vec::new());
    let document = service
        .fetch_one(&format!("{}/ownership", server.uri()))
        .await
        .unwrap();

    assert_eq!(document.title, "Rust Ownership and Borrowing");
    assert!(document.word_count > 10);
    assert!(!document.preview.is_empty());
    assert!(!document.keyword_scores.is_empty());
    assert!(document.keyword_scores.contains_key("ownership"));
}

#[tokio::test]
async fn test_fetch_batch_preserves_input_order_and_isolates_failures() {
    let server = MockServer::start().await;
    mount_research_corpus(&server).await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let settings = test_settings();
    let service = service_with(&settings, Vec::new());
    let urls = vec![
        format!("{}/gardening", server.uri()),
        format!("{}/missing", server.uri()),
        format!("{}/quantum", server.uri()),
    ];
    let outcomes = service.fetch_batch(urls.clone()).await;

    assert_eq!(outcomes.len(), 3);
    for (expected, (url, _)) in urls.iter().zip(outcomes.iter()) {
        assert_eq!(expected, url);
    }
    assert!(outcomes[0].1.is_ok());
    assert!(matches!(
        outcomes[1].1,
        Err(ResearchError::Fetch(FetchStatus::NetworkError))
    ));
    assert!(outcomes[2].1.is_ok());
}

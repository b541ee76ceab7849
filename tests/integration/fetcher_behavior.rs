// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

use researchrs::{FetchRequest, FetchStatus, Fetcher, Settings};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 适合本地mock服务器的快速配置
fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.fetcher.request_timeout_secs = 1;
    settings.fetcher.max_retries = 2;
    settings.fetcher.initial_backoff_ms = 20;
    settings.fetcher.max_redirects = 2;
    settings.throttle.per_domain_rate_limit = 100;
    settings
}

fn fetcher_with(settings: &Settings) -> Fetcher {
    Fetcher::new(settings).expect("client should build")
}

#[tokio::test]
async fn test_success_carries_body_and_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<html><head><title>Hi</title></head><body>ok</body></html>",
            "text/html; charset=utf-8",
        ))
        .mount(&server)
        .await;

    let fetcher = fetcher_with(&test_settings());
    let result = fetcher.fetch_one(&format!("{}/page", server.uri())).await;

    assert_eq!(result.status, FetchStatus::Ok);
    assert_eq!(result.http_status, Some(200));
    assert_eq!(result.attempts, 1);
    assert!(result.content_type.as_deref().unwrap().starts_with("text/html"));
    assert!(result.body.is_some());
    assert!(result.final_url.as_deref().unwrap().ends_with("/page"));
}

#[tokio::test]
async fn test_batch_yields_one_result_per_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>fine</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut settings = test_settings();
    settings.fetcher.max_retries = 0;
    let fetcher = fetcher_with(&settings);
    let requests = vec![
        FetchRequest::new(format!("{}/ok", server.uri())),
        FetchRequest::new(format!("{}/missing", server.uri())),
        FetchRequest::new(format!("{}/broken", server.uri())),
    ];
    let results = fetcher.fetch_batch(requests, None).await;

    assert_eq!(results.len(), 3);
    let status_of = |suffix: &str| {
        results
            .iter()
            .find(|r| r.url.ends_with(suffix))
            .map(|r| r.status)
            .expect("result present")
    };
    assert_eq!(status_of("/ok"), FetchStatus::Ok);
    // 其余4xx为终态网络错误
    assert_eq!(status_of("/missing"), FetchStatus::NetworkError);
    // 5xx重试额度耗尽后落为网络错误
    assert_eq!(status_of("/broken"), FetchStatus::NetworkError);
}

#[tokio::test]
async fn test_transient_server_error_is_retried_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>recovered</html>"))
        .mount(&server)
        .await;

    let fetcher = fetcher_with(&test_settings());
    let result = fetcher.fetch_one(&format!("{}/flaky", server.uri())).await;

    assert_eq!(result.status, FetchStatus::Ok);
    assert_eq!(result.attempts, 2);
}

#[tokio::test]
async fn test_forbidden_and_rate_limited_are_terminal_blocked() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forbidden"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let fetcher = fetcher_with(&test_settings());

    let forbidden = fetcher
        .fetch_one(&format!("{}/forbidden", server.uri()))
        .await;
    assert_eq!(forbidden.status, FetchStatus::Blocked);
    // 终态失败不消耗重试额度
    assert_eq!(forbidden.attempts, 1);

    let limited = fetcher.fetch_one(&format!("{}/limited", server.uri())).await;
    assert_eq!(limited.status, FetchStatus::Blocked);
    assert_eq!(limited.http_status, Some(429));
}

#[tokio::test]
async fn test_redirect_chain_beyond_limit_fails() {
    let server = MockServer::start().await;
    for hop in 1..=4 {
        Mock::given(method("GET"))
            .and(path(format!("/hop{}", hop)))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", format!("{}/hop{}", server.uri(), hop + 1).as_str()),
            )
            .mount(&server)
            .await;
    }

    // max_redirects = 2，四跳链必然超限
    let fetcher = fetcher_with(&test_settings());
    let result = fetcher.fetch_one(&format!("{}/hop1", server.uri())).await;
    assert_eq!(result.status, FetchStatus::TooManyRedirects);
}

#[tokio::test]
async fn test_slow_response_maps_to_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html>late</html>")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut settings = test_settings();
    settings.fetcher.max_retries = 0;
    let fetcher = fetcher_with(&settings);
    let result = fetcher.fetch_one(&format!("{}/slow", server.uri())).await;

    assert_eq!(result.status, FetchStatus::Timeout);
    assert_eq!(result.attempts, 1);
    assert_eq!(fetcher.dead_letter_count(), 1);
}

#[tokio::test]
async fn test_exhausted_domain_budget_maps_to_blocked() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .mount(&server)
        .await;

    let mut settings = test_settings();
    settings.throttle.per_domain_rate_limit = 1;
    settings.throttle.acquire_timeout_secs = 0;
    settings.fetcher.max_retries = 0;
    let fetcher = fetcher_with(&settings);

    let first = fetcher.fetch_one(&format!("{}/page", server.uri())).await;
    assert_eq!(first.status, FetchStatus::Ok);

    // 预算耗尽且等不到令牌，未发出网络请求
    let second = fetcher.fetch_one(&format!("{}/page", server.uri())).await;
    assert_eq!(second.status, FetchStatus::Blocked);
    assert_eq!(second.attempts, 0);
}

#[tokio::test]
async fn test_batch_deadline_cancels_and_refunds_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stuck"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html>never in time</html>")
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let settings = test_settings();
    let fetcher = fetcher_with(&settings);
    let capacity = settings.throttle.per_domain_rate_limit as f64;

    let deadline = tokio::time::Instant::now() + Duration::from_millis(200);
    let requests = vec![
        FetchRequest::new(format!("{}/stuck", server.uri())),
        FetchRequest::new(format!("{}/stuck", server.uri())),
    ];
    let results = fetcher.fetch_batch(requests, Some(deadline)).await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.status == FetchStatus::Cancelled));

    // 取消的请求退还令牌，不留下预算赤字
    let available = fetcher.throttle().available("127.0.0.1");
    assert!(available > capacity - 0.5, "available = {}", available);
}

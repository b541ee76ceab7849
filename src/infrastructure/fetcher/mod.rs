// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod retry_policy;

use dashmap::DashMap;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::redirect;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::settings::{FetcherSettings, Settings};
use crate::domain::models::fetch::{FetchRequest, FetchResult, FetchStatus};
use crate::infrastructure::metrics::FETCH_DEAD_LETTER;
use crate::infrastructure::throttle::domain_throttle::{DomainThrottle, ThrottleError};
use crate::utils::url_utils::{is_valid_url, registrable_domain};
use retry_policy::RetryPolicy;

/// 并发抓取器
///
/// 共享一个HTTP客户端，通过有界工作池和每域名并发槽限制负载。
/// 瞬时失败（超时、连接错误、5xx、限流等待超时）按指数退避重试，
/// 终态失败（401/403/429、重定向超限、其余4xx）立即结束。
/// 每个请求恰好产生一个结果，抓取失败不会使批次中断。
pub struct Fetcher {
    client: reqwest::Client,
    throttle: Arc<DomainThrottle>,
    domain_slots: DashMap<String, Arc<Semaphore>>,
    settings: FetcherSettings,
    retry_policy: RetryPolicy,
    dead_letters: AtomicU64,
}

impl Fetcher {
    /// 创建新的抓取器
    ///
    /// TLS证书校验始终开启，不提供关闭开关
    pub fn new(settings: &Settings) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = reqwest::Client::builder()
            .user_agent(settings.fetcher.user_agent.clone())
            .default_headers(headers)
            .redirect(redirect::Policy::limited(settings.fetcher.max_redirects))
            .build()?;

        Ok(Self {
            client,
            throttle: Arc::new(DomainThrottle::new(&settings.throttle)),
            domain_slots: DashMap::new(),
            settings: settings.fetcher.clone(),
            retry_policy: RetryPolicy::from_settings(&settings.fetcher),
            dead_letters: AtomicU64::new(0),
        })
    }

    /// 共享的域名限流器
    pub fn throttle(&self) -> Arc<DomainThrottle> {
        self.throttle.clone()
    }

    /// 重试额度耗尽的请求总数
    pub fn dead_letter_count(&self) -> u64 {
        self.dead_letters.load(Ordering::Relaxed)
    }

    /// 抓取单个URL
    pub async fn fetch_one(&self, url: &str) -> FetchResult {
        self.fetch_with_deadline(FetchRequest::new(url), None).await
    }

    /// 并发抓取一批URL
    ///
    /// 高优先级请求先提交到工作池；工作池大小为 max_concurrency。
    /// 到达批次截止时间后未完成的请求以 Cancelled 结束，
    /// 返回结果与输入一一对应（完成顺序，不保证输入顺序）
    pub async fn fetch_batch(
        &self,
        mut requests: Vec<FetchRequest>,
        batch_deadline: Option<Instant>,
    ) -> Vec<FetchResult> {
        requests.sort_by_key(|r| std::cmp::Reverse(r.priority.unwrap_or(0)));

        futures::stream::iter(
            requests
                .into_iter()
                .map(|request| self.fetch_with_deadline(request, batch_deadline)),
        )
        .buffer_unordered(self.settings.max_concurrency.max(1))
        .collect()
        .await
    }

    /// 执行单个请求，尊重批次和单请求截止时间
    async fn fetch_with_deadline(
        &self,
        request: FetchRequest,
        batch_deadline: Option<Instant>,
    ) -> FetchResult {
        let deadline = match (batch_deadline, request.deadline) {
            (Some(batch), Some(own)) => Some(batch.min(own)),
            (batch, own) => batch.or(own),
        };

        let start = Instant::now();
        match deadline {
            Some(deadline) => {
                tokio::select! {
                    result = self.fetch_inner(&request.url) => result,
                    _ = tokio::time::sleep_until(deadline) => {
                        debug!(url = %request.url, "fetch cancelled at deadline");
                        let mut result = FetchResult::failure(&request.url, FetchStatus::Cancelled);
                        result.elapsed = start.elapsed();
                        result
                    }
                }
            }
            None => self.fetch_inner(&request.url).await,
        }
    }

    /// 抓取核心：限流、发送、重试
    async fn fetch_inner(&self, url: &str) -> FetchResult {
        let start = Instant::now();

        if !is_valid_url(url) {
            warn!(url, "invalid url rejected without network attempt");
            let mut result = FetchResult::failure(url, FetchStatus::NetworkError);
            result.elapsed = start.elapsed();
            return result;
        }
        let domain = match registrable_domain(url) {
            Some(domain) => domain,
            None => {
                let mut result = FetchResult::failure(url, FetchStatus::NetworkError);
                result.elapsed = start.elapsed();
                return result;
            }
        };

        // 每域名并发槽，独立于全局工作池
        let slots = self
            .domain_slots
            .entry(domain.clone())
            .or_insert_with(|| Arc::new(Semaphore::new(self.settings.per_domain_concurrency.max(1))))
            .clone();
        let _slot = match slots.acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                let mut result = FetchResult::failure(url, FetchStatus::NetworkError);
                result.elapsed = start.elapsed();
                return result;
            }
        };

        let mut attempt = 0u32;
        let mut sent = 0u32;
        let mut last_http = None;

        loop {
            attempt += 1;
            let last_status: FetchStatus;
            match self.throttle.acquire(&domain).await {
                Ok(permit) => {
                    debug!(url, domain = %domain, attempt, "sending request");
                    let send_result = self
                        .client
                        .get(url)
                        .timeout(self.settings.request_timeout())
                        .send()
                        .await;
                    sent += 1;
                    // 网络尝试已发生，令牌确认消费
                    permit.commit();

                    match send_result {
                        Ok(response) => {
                            let http_status = response.status().as_u16();
                            last_http = Some(http_status);

                            if response.status().is_success() {
                                let final_url = response.url().to_string();
                                let content_type = response
                                    .headers()
                                    .get(CONTENT_TYPE)
                                    .and_then(|value| value.to_str().ok())
                                    .map(|value| value.to_string());
                                match response.bytes().await {
                                    Ok(body) => {
                                        return FetchResult {
                                            url: url.to_string(),
                                            final_url: Some(final_url),
                                            status: FetchStatus::Ok,
                                            http_status: Some(http_status),
                                            content_type,
                                            body: Some(body),
                                            elapsed: start.elapsed(),
                                            attempts: sent,
                                        };
                                    }
                                    // 正文读取中断按瞬时网络错误处理
                                    Err(_) => last_status = FetchStatus::NetworkError,
                                }
                            } else if matches!(http_status, 401 | 403 | 429) {
                                return self.failure(
                                    url,
                                    FetchStatus::Blocked,
                                    Some(http_status),
                                    start,
                                    sent,
                                );
                            } else if response.status().is_server_error() {
                                last_status = FetchStatus::NetworkError;
                            } else {
                                return self.failure(
                                    url,
                                    FetchStatus::NetworkError,
                                    Some(http_status),
                                    start,
                                    sent,
                                );
                            }
                        }
                        Err(error) => {
                            if error.is_redirect() {
                                return self.failure(
                                    url,
                                    FetchStatus::TooManyRedirects,
                                    None,
                                    start,
                                    sent,
                                );
                            }
                            last_status = if error.is_timeout() {
                                FetchStatus::Timeout
                            } else {
                                FetchStatus::NetworkError
                            };
                        }
                    }
                }
                Err(ThrottleError::ThrottleTimeout { .. }) => {
                    // 窗口内等不到令牌视同被限流拒绝
                    last_status = FetchStatus::Blocked;
                }
            }

            if !self.retry_policy.should_retry(attempt) {
                self.dead_letters.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(FETCH_DEAD_LETTER).increment(1);
                return self.failure(url, last_status, last_http, start, sent);
            }
            tokio::time::sleep(self.retry_policy.calculate_backoff(attempt)).await;
        }
    }

    fn failure(
        &self,
        url: &str,
        status: FetchStatus,
        http_status: Option<u16>,
        start: Instant,
        attempts: u32,
    ) -> FetchResult {
        warn!(url, %status, http_status, attempts, "fetch failed");
        FetchResult {
            url: url.to_string(),
            final_url: None,
            status,
            http_status,
            content_type: None,
            body: None,
            elapsed: start.elapsed(),
            attempts,
        }
    }
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::Utc;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::settings::{ResearchSettings, Settings};
use crate::domain::models::document::Document;
use crate::domain::models::fetch::{FetchRequest, FetchResult, FetchStatus};
use crate::domain::models::report::{ExclusionReason, Report, ReportFailure};
use crate::domain::search::engine::{QueryDispatcher, SearchError};
use crate::domain::services::deduplicator::{DeduplicationConfig, DocumentDeduplicator};
use crate::domain::services::extraction_service::{ExtractionError, ExtractionService};
use crate::domain::services::keyword_analyzer::KeywordAnalyzer;
use crate::infrastructure::fetcher::Fetcher;
use crate::utils::url_utils;

/// 研究流水线错误类型
#[derive(Debug, Error)]
pub enum ResearchError {
    /// 输入无效
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// 抓取以失败终态结束
    #[error("Fetch failed: {0}")]
    Fetch(FetchStatus),
    /// 内容提取失败
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
}

/// 研究编排服务
///
/// 对外操作入口：research 走完整流水线（搜索、抓取、提取、
/// 分析、综合），fetch_one / fetch_batch 跳过搜索和综合，
/// extract_urls 为纯文本操作。
///
/// 报告是输入文档集合的确定性函数：排名和聚合不依赖
/// 抓取完成顺序，同样的源集合产出同样的报告。
pub struct ResearchService {
    dispatcher: Arc<dyn QueryDispatcher>,
    fetcher: Arc<Fetcher>,
    analyzer: KeywordAnalyzer,
    deduplicator: DocumentDeduplicator,
    settings: ResearchSettings,
}

impl ResearchService {
    /// 创建新的研究服务
    pub fn new(
        dispatcher: Arc<dyn QueryDispatcher>,
        fetcher: Arc<Fetcher>,
        settings: &Settings,
    ) -> Self {
        Self {
            dispatcher,
            fetcher,
            analyzer: KeywordAnalyzer::new(settings.research.max_keywords_per_document),
            deduplicator: DocumentDeduplicator::new(DeduplicationConfig {
                similarity_threshold: settings.research.dedup_similarity_threshold,
            }),
            settings: settings.research.clone(),
        }
    }

    /// 共享的抓取器
    pub fn fetcher(&self) -> Arc<Fetcher> {
        self.fetcher.clone()
    }

    /// 围绕主题执行完整研究流水线
    ///
    /// 候选URL按 overfetch_factor 超量获取，补偿抓取和提取的
    /// 损耗。整体截止时间到达时返回已完成部分组成的报告，
    /// 未完成的URL以 Cancelled 记入失败列表。
    /// 搜索后端不可用不报错，返回携带原因的空报告。
    pub async fn research(&self, topic: &str, max_sources: usize) -> Result<Report, ResearchError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ResearchError::InvalidInput("topic is empty".to_string()));
        }
        if max_sources == 0 {
            return Err(ResearchError::InvalidInput(
                "max_sources must be positive".to_string(),
            ));
        }

        let deadline = Instant::now() + self.settings.overall_deadline();
        let candidate_limit = max_sources.saturating_mul(self.settings.overfetch_factor as usize);

        info!(topic, max_sources, candidate_limit, dispatcher = self.dispatcher.name(), "research started");

        // 搜索与抓取共享整体截止时间，后端挂起不会拖住整个调用
        let search = tokio::time::timeout_at(deadline, self.dispatcher.search(topic, candidate_limit));
        let candidates = match search.await {
            Err(_) => {
                warn!(topic, "search backend did not answer before the overall deadline");
                return Ok(Report::empty_with_reason(
                    topic,
                    ExclusionReason::SearchUnavailable,
                ));
            }
            Ok(Ok(urls)) => urls,
            Ok(Err(SearchError::SearchUnavailable(reason))) => {
                warn!(topic, %reason, "search backend unavailable");
                return Ok(Report::empty_with_reason(
                    topic,
                    ExclusionReason::SearchUnavailable,
                ));
            }
            Ok(Err(SearchError::InvalidQuery(reason))) => {
                return Err(ResearchError::InvalidInput(reason));
            }
        };

        // 候选排名：搜索返回顺序即相关性顺序
        let rank_of: HashMap<String, usize> = candidates
            .iter()
            .enumerate()
            .map(|(rank, url)| (url.clone(), rank))
            .collect();
        let requests: Vec<FetchRequest> = candidates
            .iter()
            .enumerate()
            .map(|(rank, url)| {
                FetchRequest::new(url.clone()).with_priority((candidates.len() - rank) as i32)
            })
            .collect();

        let results = self.fetcher.fetch_batch(requests, Some(deadline)).await;

        let mut extracted: Vec<(usize, Document)> = Vec::new();
        let mut failures: Vec<(usize, ReportFailure)> = Vec::new();
        let last_rank = candidates.len();

        for result in &results {
            let rank = rank_of.get(&result.url).copied().unwrap_or(last_rank);
            if !result.is_ok() {
                failures.push((
                    rank,
                    ReportFailure {
                        url: result.url.clone(),
                        reason: ExclusionReason::FetchFailed(result.status),
                    },
                ));
                continue;
            }
            match ExtractionService::extract(result, Utc::now()) {
                Ok(mut document) => {
                    self.analyzer.score(&mut document);
                    extracted.push((rank, document));
                }
                Err(error) => {
                    debug!(url = %result.url, %error, "extraction failed");
                    failures.push((
                        rank,
                        ReportFailure {
                            url: result.url.clone(),
                            reason: ExclusionReason::ExtractionFailed(error.to_string()),
                        },
                    ));
                }
            }
        }

        // 去重输入按候选排名排序，使结果与完成顺序无关
        extracted.sort_by_key(|(rank, _)| *rank);
        let ranks: Vec<usize> = extracted.iter().map(|(rank, _)| *rank).collect();
        let documents: Vec<Document> = extracted.into_iter().map(|(_, doc)| doc).collect();

        let outcome = self.deduplicator.partition(&documents);
        for &index in &outcome.duplicates {
            failures.push((
                ranks[index],
                ReportFailure {
                    url: documents[index].url.clone(),
                    reason: ExclusionReason::Duplicate,
                },
            ));
        }

        // 排名：类别置信度与关键词密度的加权和，平局按候选排名
        let mut scored: Vec<(usize, f64)> = outcome
            .kept
            .iter()
            .map(|&index| {
                let document = &documents[index];
                let score = 0.5 * document.category_confidence
                    + KeywordAnalyzer::keyword_density(document);
                (index, score)
            })
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(ranks[a.0].cmp(&ranks[b.0]))
        });

        let mut slots: Vec<Option<Document>> = documents.into_iter().map(Some).collect();
        let mut sources: Vec<Document> = Vec::new();
        for &(index, _) in scored.iter() {
            if sources.len() < max_sources {
                if let Some(document) = slots[index].take() {
                    sources.push(document);
                }
            } else if let Some(document) = slots[index].take() {
                failures.push((
                    ranks[index],
                    ReportFailure {
                        url: document.url,
                        reason: ExclusionReason::Truncated,
                    },
                ));
            }
        }

        failures.sort_by_key(|(rank, _)| *rank);

        let keyword_ranking = self.analyzer.aggregate(sources.iter());
        let mut domains_covered: Vec<String> =
            sources.iter().filter_map(|doc| doc.domain()).collect();
        domains_covered.sort();
        domains_covered.dedup();
        let total_word_count = sources.iter().map(|doc| doc.word_count).sum();

        info!(
            topic,
            sources = sources.len(),
            failures = failures.len(),
            "research finished"
        );

        Ok(Report {
            topic: topic.to_string(),
            sources,
            keyword_ranking,
            failures: failures.into_iter().map(|(_, failure)| failure).collect(),
            domains_covered,
            total_word_count,
            generated_at: Utc::now(),
        })
    }

    /// 抓取并提取单个URL
    pub async fn fetch_one(&self, url: &str) -> Result<Document, ResearchError> {
        if !url_utils::is_valid_url(url) {
            return Err(ResearchError::InvalidInput(format!("invalid url: {}", url)));
        }
        let result = self.fetcher.fetch_one(url).await;
        self.document_from(&result)
    }

    /// 抓取并提取一批URL，跳过搜索和综合
    ///
    /// 返回与输入同序的 (url, 结果) 对，单个失败不影响其他条目
    pub async fn fetch_batch(
        &self,
        urls: Vec<String>,
    ) -> Vec<(String, Result<Document, ResearchError>)> {
        let requests: Vec<FetchRequest> = urls.iter().map(|url| FetchRequest::new(url.clone())).collect();
        let results = self.fetcher.fetch_batch(requests, None).await;

        let mut by_url: HashMap<String, Vec<FetchResult>> = HashMap::new();
        for result in results {
            by_url.entry(result.url.clone()).or_default().push(result);
        }

        urls.into_iter()
            .map(|url| {
                let outcome = match by_url.get_mut(&url).and_then(|bucket| bucket.pop()) {
                    Some(result) => self.document_from(&result),
                    None => Err(ResearchError::Fetch(FetchStatus::Cancelled)),
                };
                (url, outcome)
            })
            .collect()
    }

    /// 从自由文本中提取URL，纯本地操作
    pub fn extract_urls(&self, text: &str) -> Vec<String> {
        url_utils::extract_urls(text)
    }

    fn document_from(&self, result: &FetchResult) -> Result<Document, ResearchError> {
        if !result.is_ok() {
            return Err(ResearchError::Fetch(result.status));
        }
        let mut document = ExtractionService::extract(result, Utc::now())?;
        self.analyzer.score(&mut document);
        Ok(document)
    }
}

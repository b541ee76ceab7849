// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::document::Document;
use crate::domain::models::fetch::FetchStatus;

/// URL被排除出报告的原因
///
/// 每个未进入最终源列表的URL都会带着可读原因出现在报告中，
/// 调用方仅凭报告内容即可区分"没有找到源"和"部分源失败"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExclusionReason {
    /// 抓取失败，附带终态
    FetchFailed(FetchStatus),
    /// 提取失败，附带原因描述
    ExtractionFailed(String),
    /// 与更早命中的源重复
    Duplicate,
    /// 排名截断，超出 max_sources
    Truncated,
    /// 搜索后端不可用
    SearchUnavailable,
}

impl std::fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExclusionReason::FetchFailed(status) => write!(f, "fetch failed: {}", status),
            ExclusionReason::ExtractionFailed(reason) => {
                write!(f, "extraction failed: {}", reason)
            }
            ExclusionReason::Duplicate => f.write_str("duplicate of an earlier source"),
            ExclusionReason::Truncated => f.write_str("truncated by source limit"),
            ExclusionReason::SearchUnavailable => f.write_str("search backend unavailable"),
        }
    }
}

/// 报告中的失败条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFailure {
    /// 被排除的URL（搜索不可用时为空字符串）
    pub url: String,
    /// 排除原因
    pub reason: ExclusionReason,
}

/// 研究报告
///
/// 综合器的终态产物，生成后不可变。
/// 源列表顺序是排名步骤的确定性函数，与抓取完成顺序无关。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// 研究主题
    pub topic: String,
    /// 入选的文档，按排名排序，长度不超过 max_sources
    pub sources: Vec<Document>,
    /// 跨文档关键词排名 (term, weight)，按权重降序
    pub keyword_ranking: Vec<(String, f64)>,
    /// 未入选URL及其原因
    pub failures: Vec<ReportFailure>,
    /// 覆盖的域名（去重、排序）
    pub domains_covered: Vec<String>,
    /// 入选文档的总词数
    pub total_word_count: usize,
    /// 报告生成时间
    pub generated_at: DateTime<Utc>,
}

impl Report {
    /// 构造仅携带失败信息的空报告
    pub fn empty_with_reason(topic: impl Into<String>, reason: ExclusionReason) -> Self {
        Self {
            topic: topic.into(),
            sources: Vec::new(),
            keyword_ranking: Vec::new(),
            failures: vec![ReportFailure {
                url: String::new(),
                reason,
            }],
            domains_covered: Vec::new(),
            total_word_count: 0,
            generated_at: Utc::now(),
        }
    }
}

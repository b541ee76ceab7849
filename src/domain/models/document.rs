// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 文档类别
///
/// 由规则分类器根据正文和元数据信号判定，无信号或平局时为 Unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentCategory {
    /// 学术内容
    Academic,
    /// 新闻内容
    News,
    /// 技术内容
    Technical,
    /// 商业内容
    Business,
    /// 无法判定
    Unknown,
}

impl std::fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DocumentCategory::Academic => "academic",
            DocumentCategory::News => "news",
            DocumentCategory::Technical => "technical",
            DocumentCategory::Business => "business",
            DocumentCategory::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// 文档中提取到的链接
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLink {
    /// 绝对化后的链接URL
    pub url: String,
    /// 链接文本
    pub text: String,
}

/// 提取后的结构化文档
///
/// 由提取服务从成功的抓取结果创建，关键词评分由分析器填充，
/// 此后归综合器所有且不再修改。所有映射使用有序结构，
/// 保证相同输入字节产生逐字节相同的文档。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// 来源URL
    pub url: String,
    /// 标题
    pub title: String,
    /// 正文文本
    pub text: String,
    /// 正文预览（按词边界截断）
    pub preview: String,
    /// 词数
    pub word_count: usize,
    /// 文档类别
    pub category: DocumentCategory,
    /// 类别置信度 (0.0-1.0)
    pub category_confidence: f64,
    /// 发布时间（元数据中可解析时）
    pub published_at: Option<DateTime<Utc>>,
    /// 提取时间，由调用方提供
    pub extracted_at: DateTime<Utc>,
    /// 元数据（author、description、og:title 等）
    pub metadata: BTreeMap<String, String>,
    /// 页面中的链接，上限50条
    pub links: Vec<DocumentLink>,
    /// 关键词评分 term -> weight，由关键词分析器填充
    pub keyword_scores: BTreeMap<String, f64>,
}

impl Document {
    /// 估算阅读时间（分钟，约200词/分钟，至少1分钟）
    pub fn reading_time_minutes(&self) -> usize {
        (self.word_count / 200).max(1)
    }

    /// 来源域名
    pub fn domain(&self) -> Option<String> {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
    }

    /// 去重指纹：规范化标题 + 正文前200个字符
    ///
    /// 两个文档的指纹相似度超过阈值即视为重复
    pub fn dedup_fingerprint(&self) -> String {
        let title = self
            .title
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let leading: String = self
            .text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
            .chars()
            .take(200)
            .collect();
        format!("{} {}", title, leading)
    }
}

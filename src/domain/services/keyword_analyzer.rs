// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::domain::models::document::Document;

/// 词条识别模式：3个及以上字母的单词
static TERM_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-zA-Z]{3,}\b").unwrap());

/// 停用词表，常见功能词不参与评分
static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "from",
        "up", "about", "into", "through", "during", "before", "after", "above", "below",
        "between", "among", "since", "until", "while", "where", "when", "why", "what", "which",
        "who", "how", "all", "any", "both", "each", "few", "more", "most", "other", "some",
        "such", "only", "own", "same", "than", "too", "very", "can", "will", "just", "don",
        "should", "now", "this", "that", "these", "those", "are", "was", "were", "been",
        "being", "have", "has", "had", "having", "does", "did", "doing", "would", "could",
        "may", "might", "must", "shall", "not", "its", "his", "her", "their", "our", "your",
    ]
    .into_iter()
    .collect()
});

/// 关键词分析器
///
/// 文档内评分使用按文档长度归一化的词频，跨文档聚合
/// 直接求和归一化贡献：在多个短文档中反复出现的词
/// 胜过只在一个长文档中出现一次的词，体现跨源共识。
/// 评分自包含，不依赖外部语料统计，与输入顺序无关。
#[derive(Debug, Clone)]
pub struct KeywordAnalyzer {
    /// 每篇文档保留的词条数上限
    max_terms: usize,
}

impl Default for KeywordAnalyzer {
    fn default() -> Self {
        Self { max_terms: 20 }
    }
}

impl KeywordAnalyzer {
    /// 创建新的关键词分析器
    pub fn new(max_terms: usize) -> Self {
        Self { max_terms }
    }

    /// 为文档填充关键词评分
    ///
    /// weight(term) = count(term) / total_terms，仅保留权重最高的
    /// max_terms 个词条；权重并列时按词条字典序取舍，保证确定性
    pub fn score(&self, document: &mut Document) {
        document.keyword_scores = self.score_text(&document.text);
    }

    /// 对一段文本计算关键词评分
    pub fn score_text(&self, text: &str) -> BTreeMap<String, f64> {
        let lowered = text.to_lowercase();
        let mut counts: HashMap<String, u64> = HashMap::new();
        let mut total: u64 = 0;

        for m in TERM_REGEX.find_iter(&lowered) {
            let term = m.as_str();
            if STOP_WORDS.contains(term) {
                continue;
            }
            *counts.entry(term.to_string()).or_insert(0) += 1;
            total += 1;
        }

        if total == 0 {
            return BTreeMap::new();
        }

        let mut ranked: Vec<(String, u64)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(self.max_terms);

        ranked
            .into_iter()
            .map(|(term, count)| (term, count as f64 / total as f64))
            .collect()
    }

    /// 跨文档聚合关键词权重
    ///
    /// 对每个词条求和各文档的归一化权重，返回按权重降序
    /// （并列按词条升序）的排名。聚合仅是入选文档的单调函数：
    /// 移除一篇文档不会增加任何词条的权重。
    pub fn aggregate<'a, I>(&self, documents: I) -> Vec<(String, f64)>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut totals: BTreeMap<String, f64> = BTreeMap::new();
        for document in documents {
            for (term, weight) in &document.keyword_scores {
                *totals.entry(term.clone()).or_insert(0.0) += weight;
            }
        }

        let mut ranking: Vec<(String, f64)> = totals.into_iter().collect();
        ranking.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranking
    }

    /// 文档关键词密度：已保留词条的权重之和
    ///
    /// 用于综合器的排名步骤
    pub fn keyword_density(document: &Document) -> f64 {
        document.keyword_scores.values().sum()
    }
}

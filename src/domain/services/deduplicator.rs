// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::document::Document;

/// 去重配置
#[derive(Debug, Clone)]
pub struct DeduplicationConfig {
    /// 指纹相似度阈值 (0.0-1.0)，超过判为重复
    pub similarity_threshold: f64,
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
        }
    }
}

/// 去重判定结果
#[derive(Debug)]
pub struct DeduplicationOutcome {
    /// 保留的文档下标（相对输入顺序）
    pub kept: Vec<usize>,
    /// 判为重复的文档下标
    pub duplicates: Vec<usize>,
}

/// 文档去重器
///
/// 基于规范化标题+首段文本的 Jaro-Winkler 相似度判重，
/// 输入按排名顺序给出，重复时保留排名靠前的一份
pub struct DocumentDeduplicator {
    config: DeduplicationConfig,
}

impl DocumentDeduplicator {
    /// 创建新的去重器
    pub fn new(config: DeduplicationConfig) -> Self {
        Self { config }
    }

    /// 使用默认配置创建去重器
    pub fn with_default_config() -> Self {
        Self::new(DeduplicationConfig::default())
    }

    /// 计算两个文档的指纹相似度
    pub fn similarity(&self, a: &Document, b: &Document) -> f64 {
        strsim::jaro_winkler(&a.dedup_fingerprint(), &b.dedup_fingerprint())
    }

    /// 判断两个文档是否重复
    pub fn is_duplicate(&self, a: &Document, b: &Document) -> bool {
        self.similarity(a, b) > self.config.similarity_threshold
    }

    /// 对按排名排序的文档序列去重
    ///
    /// 返回保留和淘汰的下标，保留集中任意两篇文档的
    /// 相似度都不超过阈值
    pub fn partition(&self, documents: &[Document]) -> DeduplicationOutcome {
        let mut kept: Vec<usize> = Vec::new();
        let mut duplicates: Vec<usize> = Vec::new();

        for (index, document) in documents.iter().enumerate() {
            let duplicate_of_kept = kept
                .iter()
                .any(|&kept_index| self.is_duplicate(document, &documents[kept_index]));
            if duplicate_of_kept {
                duplicates.push(index);
            } else {
                kept.push(index);
            }
        }

        DeduplicationOutcome { kept, duplicates }
    }
}

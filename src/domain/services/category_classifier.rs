// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::BTreeMap;

use crate::domain::models::document::DocumentCategory;

/// 各类别的指示词表
///
/// 正文或元数据中出现指示词即计一分
const ACADEMIC_INDICATORS: &[&str] = &[
    "research",
    "study",
    "analysis",
    "methodology",
    "findings",
    "abstract",
    "hypothesis",
    "peer-reviewed",
];
const NEWS_INDICATORS: &[&str] = &[
    "breaking",
    "reported",
    "according to",
    "sources",
    "news",
    "journalist",
    "correspondent",
];
const TECHNICAL_INDICATORS: &[&str] = &[
    "implementation",
    "algorithm",
    "code",
    "technical",
    "documentation",
    "api",
    "compiler",
    "framework",
];
const BUSINESS_INDICATORS: &[&str] = &[
    "market",
    "revenue",
    "company",
    "business",
    "industry",
    "investors",
    "quarterly",
];

/// 规则分类器
///
/// 对正文和元数据做指示词计分，映射到四个具体类别。
/// 无信号或最高分并列时判为 Unknown，绝不无依据地猜测类别。
pub struct CategoryClassifier;

impl CategoryClassifier {
    /// 判定文档类别及置信度
    ///
    /// # 参数
    ///
    /// * `text` - 文档正文
    /// * `metadata` - 文档元数据映射
    ///
    /// # 返回值
    ///
    /// (类别, 置信度)，置信度为最高分占全部得分的比例，
    /// Unknown 时为 0.0
    pub fn classify(
        text: &str,
        metadata: &BTreeMap<String, String>,
    ) -> (DocumentCategory, f64) {
        let mut haystack = text.to_lowercase();
        for value in metadata.values() {
            haystack.push(' ');
            haystack.push_str(&value.to_lowercase());
        }

        let scores = [
            (
                DocumentCategory::Academic,
                Self::indicator_hits(&haystack, ACADEMIC_INDICATORS),
            ),
            (
                DocumentCategory::News,
                Self::indicator_hits(&haystack, NEWS_INDICATORS),
            ),
            (
                DocumentCategory::Technical,
                Self::indicator_hits(&haystack, TECHNICAL_INDICATORS),
            ),
            (
                DocumentCategory::Business,
                Self::indicator_hits(&haystack, BUSINESS_INDICATORS),
            ),
        ];

        let total: u32 = scores.iter().map(|(_, s)| s).sum();
        let best = scores.iter().map(|(_, s)| *s).max().unwrap_or(0);
        if best == 0 {
            return (DocumentCategory::Unknown, 0.0);
        }

        let tied = scores.iter().filter(|(_, s)| *s == best).count();
        if tied > 1 {
            // 平局时不猜测具体类别
            return (DocumentCategory::Unknown, 0.0);
        }

        let (category, score) = scores
            .iter()
            .find(|(_, s)| *s == best)
            .copied()
            .unwrap_or((DocumentCategory::Unknown, 0));
        (category, score as f64 / total as f64)
    }

    /// 统计指示词命中数（每个指示词最多记一次）
    fn indicator_hits(haystack: &str, indicators: &[&str]) -> u32 {
        indicators
            .iter()
            .filter(|indicator| haystack.contains(*indicator))
            .count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_technical_content_is_classified() {
        let (category, confidence) = CategoryClassifier::classify(
            "The implementation of this algorithm is covered in the API documentation.",
            &BTreeMap::new(),
        );
        assert_eq!(category, DocumentCategory::Technical);
        assert!(confidence > 0.5);
    }

    #[test]
    fn test_academic_content_is_classified() {
        let (category, _) = CategoryClassifier::classify(
            "Our research study presents a methodology and findings from the analysis.",
            &BTreeMap::new(),
        );
        assert_eq!(category, DocumentCategory::Academic);
    }

    #[test]
    fn test_no_signal_yields_unknown() {
        let (category, confidence) =
            CategoryClassifier::classify("A pleasant walk in the park.", &BTreeMap::new());
        assert_eq!(category, DocumentCategory::Unknown);
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn test_tie_yields_unknown() {
        // 各命中一个news和business指示词
        let (category, confidence) =
            CategoryClassifier::classify("breaking market", &BTreeMap::new());
        assert_eq!(category, DocumentCategory::Unknown);
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn test_metadata_contributes_signal() {
        let mut metadata = BTreeMap::new();
        metadata.insert(
            "description".to_string(),
            "Quarterly revenue report for investors".to_string(),
        );
        let (category, _) = CategoryClassifier::classify("Company overview.", &metadata);
        assert_eq!(category, DocumentCategory::Business);
    }
}

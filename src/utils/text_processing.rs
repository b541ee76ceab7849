// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static SENTENCE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+").unwrap());
static PARAGRAPH_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

/// 清理和规范化文本内容
///
/// 解码HTML实体、折叠空白字符并移除控制字符
pub fn clean_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let decoded = html_escape::decode_html_entities(text);
    let collapsed = WHITESPACE_REGEX.replace_all(&decoded, " ");
    collapsed
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_string()
}

/// 按词边界截断文本并追加省略号
///
/// 词边界回退不超过截断长度的20%，否则硬截断
pub fn truncate_text(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }

    let truncated: String = text.chars().take(max_length).collect();
    match truncated.rfind(' ') {
        Some(last_space) if last_space * 5 > max_length * 4 => {
            format!("{}...", &truncated[..last_space])
        }
        _ => format!("{}...", truncated),
    }
}

/// 统计句子数
pub fn sentence_count(text: &str) -> usize {
    SENTENCE_REGEX.find_iter(text).count()
}

/// 统计段落数
pub fn paragraph_count(text: &str) -> usize {
    PARAGRAPH_REGEX.find_iter(text).count()
}

/// 统计词数
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

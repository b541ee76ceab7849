// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::domain::models::document::{Document, DocumentLink};
use crate::domain::models::fetch::FetchResult;
use crate::domain::services::category_classifier::CategoryClassifier;
use crate::utils::text_processing::{clean_text, truncate_text, word_count};
use crate::utils::{text_processing, url_utils};

/// 提取错误类型
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// 文档损坏或没有可提取内容
    #[error("Malformed document: {0}")]
    Malformed(String),
    /// 不支持的内容类型
    #[error("Unsupported content: {0}")]
    Unsupported(String),
}

/// 正文提取策略
///
/// 按固定顺序尝试的封闭集合，而非开放的回调列表
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    /// HTML文档（主要路径）
    Html,
    /// 纯文本
    PlainText,
    /// PDF文本层（最小回退）
    Pdf,
}

/// 脚本、样式等不可见区块的清理模式
static SCRIPT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap());
static STYLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap());
static NOSCRIPT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<noscript[^>]*>.*?</noscript>").unwrap());
static COMMENT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<!--.*?-->").unwrap());

/// 导航、广告等样板区块的清理模式
static BOILERPLATE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(nav|header|footer|aside)[^>]*>.*?</(nav|header|footer|aside)>").unwrap()
});

/// 主内容区域的结构化选择器，按优先级排序
static MAIN_CONTENT_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        "main",
        "article",
        r#"[role="main"]"#,
        ".content",
        ".main-content",
        ".post-content",
        ".entry-content",
        ".article-content",
        "#content",
        "#main",
    ]
    .iter()
    .map(|s| Selector::parse(s).unwrap())
    .collect()
});

static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static DENSITY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div, section, article").unwrap());

/// 元数据选择器表：(输出键, CSS选择器)
static META_SELECTORS: Lazy<Vec<(&'static str, Selector)>> = Lazy::new(|| {
    [
        ("description", r#"meta[name="description"]"#),
        ("meta_keywords", r#"meta[name="keywords"]"#),
        ("author", r#"meta[name="author"]"#),
        ("published_date", r#"meta[name="date"]"#),
        ("published_date", r#"meta[property="article:published_time"]"#),
        ("og_title", r#"meta[property="og:title"]"#),
        ("og_description", r#"meta[property="og:description"]"#),
    ]
    .iter()
    .map(|(key, selector)| (*key, Selector::parse(selector).unwrap()))
    .collect()
});

/// PDF文本对象 (BT ... ET) 的定位模式
static PDF_TEXT_OBJECT_REGEX: Lazy<regex::bytes::Regex> =
    Lazy::new(|| regex::bytes::Regex::new(r"(?s)BT(.*?)ET").unwrap());
/// PDF字面字符串模式
static PDF_STRING_REGEX: Lazy<regex::bytes::Regex> =
    Lazy::new(|| regex::bytes::Regex::new(r"\(((?:[^()\\]|\\.)*)\)").unwrap());

/// 密度启发式的最小文本长度，低于该值回退到body全文
const DENSITY_MIN_TEXT_LEN: usize = 100;
/// 单篇文档保留的链接数上限
const MAX_LINKS: usize = 50;
/// 正文预览长度
const PREVIEW_LEN: usize = 500;

/// 内容提取服务
///
/// 将抓取结果的原始正文转换为结构化文档。
/// 对输入是纯函数：相同的字节和内容类型总是产生相同的文档，
/// 提取时间戳由调用方提供而非内部生成。
pub struct ExtractionService;

impl ExtractionService {
    /// 从成功的抓取结果提取文档
    ///
    /// # 参数
    ///
    /// * `result` - 状态为Ok的抓取结果
    /// * `extracted_at` - 调用方提供的提取时间戳
    ///
    /// # 返回值
    ///
    /// * `Ok(Document)` - 结构化文档
    /// * `Err(ExtractionError)` - 文档损坏或内容类型不受支持
    pub fn extract(
        result: &FetchResult,
        extracted_at: DateTime<Utc>,
    ) -> Result<Document, ExtractionError> {
        let body = result
            .body
            .as_ref()
            .ok_or_else(|| ExtractionError::Malformed("empty response body".to_string()))?;
        let source_url = result.final_url.as_deref().unwrap_or(&result.url);

        let kind = Self::detect_kind(result.content_type.as_deref(), source_url, body)?;
        debug!(url = %source_url, kind = ?kind, "extracting document");

        let mut document = match kind {
            BodyKind::Html => Self::extract_html(source_url, body, extracted_at)?,
            BodyKind::PlainText => Self::extract_plain_text(source_url, body, extracted_at)?,
            BodyKind::Pdf => Self::extract_pdf(source_url, body, extracted_at)?,
        };

        let (category, confidence) =
            CategoryClassifier::classify(&document.text, &document.metadata);
        document.category = category;
        document.category_confidence = confidence;
        Ok(document)
    }

    /// 根据声明或嗅探判定内容类型
    fn detect_kind(
        content_type: Option<&str>,
        url: &str,
        body: &[u8],
    ) -> Result<BodyKind, ExtractionError> {
        if let Some(declared) = content_type {
            let declared = declared.to_lowercase();
            if declared.contains("html") || declared.contains("xhtml") {
                return Ok(BodyKind::Html);
            }
            if declared.contains("pdf") {
                return Ok(BodyKind::Pdf);
            }
            if declared.starts_with("text/") {
                return Ok(BodyKind::PlainText);
            }
            if !declared.contains("octet-stream") {
                return Err(ExtractionError::Unsupported(declared));
            }
        }

        // 未声明或不透明声明时嗅探正文
        if body.starts_with(b"%PDF-") || url_utils::is_pdf_url(url) {
            return Ok(BodyKind::Pdf);
        }
        let head: String = String::from_utf8_lossy(&body[..body.len().min(1024)]).to_lowercase();
        if head.contains("<html") || head.contains("<!doctype") {
            return Ok(BodyKind::Html);
        }
        if std::str::from_utf8(body).is_ok() {
            return Ok(BodyKind::PlainText);
        }
        Err(ExtractionError::Unsupported(
            "undeclared binary content".to_string(),
        ))
    }

    /// HTML提取路径
    fn extract_html(
        url: &str,
        body: &[u8],
        extracted_at: DateTime<Utc>,
    ) -> Result<Document, ExtractionError> {
        let raw = String::from_utf8_lossy(body);
        let cleaned = Self::strip_invisible_blocks(&raw);
        let html = Html::parse_document(&cleaned);

        let metadata = Self::extract_metadata(&html);
        let title = html
            .select(&TITLE_SELECTOR)
            .next()
            .map(|t| clean_text(&t.text().collect::<String>()))
            .filter(|t| !t.is_empty())
            .or_else(|| metadata.get("og_title").cloned())
            .unwrap_or_default();

        let text = Self::extract_main_text(&html);
        if text.is_empty() && title.is_empty() {
            return Err(ExtractionError::Malformed(
                "no extractable content".to_string(),
            ));
        }

        let links = Self::extract_links(&html, url);
        let published_at = metadata
            .get("published_date")
            .and_then(|raw| Self::parse_published_date(raw));

        Ok(Self::assemble(
            url,
            title,
            text,
            "html",
            metadata,
            links,
            published_at,
            extracted_at,
        ))
    }

    /// 纯文本提取路径
    fn extract_plain_text(
        url: &str,
        body: &[u8],
        extracted_at: DateTime<Utc>,
    ) -> Result<Document, ExtractionError> {
        let raw = String::from_utf8_lossy(body);
        let text = raw.trim().to_string();
        if text.is_empty() {
            return Err(ExtractionError::Malformed("empty text body".to_string()));
        }

        let title = text
            .lines()
            .find(|line| !line.trim().is_empty())
            .map(|line| truncate_text(line.trim(), 80))
            .unwrap_or_default();

        Ok(Self::assemble(
            url,
            title,
            text,
            "text",
            BTreeMap::new(),
            Vec::new(),
            None,
            extracted_at,
        ))
    }

    /// PDF文本层最小回退
    ///
    /// 只读取文本对象中的字面字符串，不解压内容流
    fn extract_pdf(
        url: &str,
        body: &[u8],
        extracted_at: DateTime<Utc>,
    ) -> Result<Document, ExtractionError> {
        if !body.starts_with(b"%PDF-") {
            return Err(ExtractionError::Malformed("missing PDF header".to_string()));
        }

        let mut fragments: Vec<String> = Vec::new();
        for object in PDF_TEXT_OBJECT_REGEX.captures_iter(body) {
            if let Some(inner) = object.get(1) {
                for literal in PDF_STRING_REGEX.captures_iter(inner.as_bytes()) {
                    if let Some(raw) = literal.get(1) {
                        let unescaped = Self::unescape_pdf_string(raw.as_bytes());
                        if !unescaped.trim().is_empty() {
                            fragments.push(unescaped);
                        }
                    }
                }
            }
        }

        if fragments.is_empty() {
            return Err(ExtractionError::Malformed(
                "no text layer in PDF".to_string(),
            ));
        }

        let text = clean_text(&fragments.join(" "));
        let title = Url::parse(url)
            .ok()
            .and_then(|u| {
                u.path_segments()
                    .and_then(|segments| segments.last().map(|s| s.to_string()))
            })
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| url.to_string());

        Ok(Self::assemble(
            url,
            title,
            text,
            "pdf",
            BTreeMap::new(),
            Vec::new(),
            None,
            extracted_at,
        ))
    }

    /// 组装文档，附带内容统计元数据
    #[allow(clippy::too_many_arguments)]
    fn assemble(
        url: &str,
        title: String,
        text: String,
        content_type: &str,
        mut metadata: BTreeMap<String, String>,
        links: Vec<DocumentLink>,
        published_at: Option<DateTime<Utc>>,
        extracted_at: DateTime<Utc>,
    ) -> Document {
        metadata.insert("content_type".to_string(), content_type.to_string());
        metadata.insert(
            "sentence_count".to_string(),
            text_processing::sentence_count(&text).to_string(),
        );
        metadata.insert(
            "paragraph_count".to_string(),
            text_processing::paragraph_count(&text).to_string(),
        );

        let preview = truncate_text(&text, PREVIEW_LEN);
        let word_count = word_count(&text);

        let mut document = Document {
            url: url.to_string(),
            title,
            text,
            preview,
            word_count,
            category: crate::domain::models::document::DocumentCategory::Unknown,
            category_confidence: 0.0,
            published_at,
            extracted_at,
            metadata,
            links,
            keyword_scores: BTreeMap::new(),
        };
        document.metadata.insert(
            "reading_time_minutes".to_string(),
            document.reading_time_minutes().to_string(),
        );
        document
    }

    /// 移除脚本、样式、注释和样板区块
    fn strip_invisible_blocks(html: &str) -> String {
        let without_scripts = SCRIPT_REGEX.replace_all(html, "");
        let without_styles = STYLE_REGEX.replace_all(&without_scripts, "");
        let without_noscript = NOSCRIPT_REGEX.replace_all(&without_styles, "");
        let without_comments = COMMENT_REGEX.replace_all(&without_noscript, "");
        BOILERPLATE_REGEX
            .replace_all(&without_comments, "")
            .to_string()
    }

    /// 提取元数据
    fn extract_metadata(html: &Html) -> BTreeMap<String, String> {
        let mut metadata = BTreeMap::new();
        for (key, selector) in META_SELECTORS.iter() {
            if metadata.contains_key(*key) {
                continue;
            }
            if let Some(element) = html.select(selector).next() {
                if let Some(content) = element.value().attr("content") {
                    let cleaned = clean_text(content);
                    if !cleaned.is_empty() {
                        metadata.insert(key.to_string(), cleaned);
                    }
                }
            }
        }
        metadata
    }

    /// 按策略顺序提取主内容文本
    ///
    /// 先尝试语义化容器选择器，再尝试文本密度最高的区块，
    /// 最后回退到body全文
    fn extract_main_text(html: &Html) -> String {
        for selector in MAIN_CONTENT_SELECTORS.iter() {
            if let Some(element) = html.select(selector).next() {
                let text = Self::element_text(&element);
                if !text.is_empty() {
                    return text;
                }
            }
        }

        if let Some(element) = Self::densest_block(html) {
            let text = Self::element_text(&element);
            if text.len() >= DENSITY_MIN_TEXT_LEN {
                return text;
            }
        }

        html.select(&BODY_SELECTOR)
            .next()
            .map(|body| Self::element_text(&body))
            .unwrap_or_default()
    }

    /// 查找文本密度最高的区块
    ///
    /// 密度 = 文本长度 / (1 + 后代元素数)，偏向文字多、结构浅的容器
    fn densest_block(html: &Html) -> Option<ElementRef<'_>> {
        let mut best: Option<(f64, usize, ElementRef<'_>)> = None;
        for element in html.select(&DENSITY_SELECTOR) {
            let text_len: usize = element.text().map(str::len).sum();
            if text_len < DENSITY_MIN_TEXT_LEN {
                continue;
            }
            let descendants = element
                .descendants()
                .filter(|node| node.value().is_element())
                .count();
            let density = text_len as f64 / (1 + descendants) as f64;
            let replace = match &best {
                Some((best_density, best_len, _)) => {
                    density > *best_density
                        || (density == *best_density && text_len > *best_len)
                }
                None => true,
            };
            if replace {
                best = Some((density, text_len, element));
            }
        }
        best.map(|(_, _, element)| element)
    }

    /// 收集元素的可见文本
    fn element_text(element: &ElementRef<'_>) -> String {
        clean_text(&element.text().collect::<Vec<_>>().join(" "))
    }

    /// 提取页面链接，相对路径基于来源URL绝对化
    fn extract_links(html: &Html, base_url: &str) -> Vec<DocumentLink> {
        let base = match Url::parse(base_url) {
            Ok(base) => base,
            Err(_) => return Vec::new(),
        };

        let mut links = Vec::new();
        for element in html.select(&LINK_SELECTOR) {
            if links.len() >= MAX_LINKS {
                break;
            }
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let text = clean_text(&element.text().collect::<String>());
            if text.is_empty() {
                continue;
            }
            let Ok(resolved) = url_utils::resolve_url(&base, href) else {
                continue;
            };
            if !matches!(resolved.scheme(), "http" | "https") {
                continue;
            }
            links.push(DocumentLink {
                url: resolved.to_string(),
                text,
            });
        }
        links
    }

    /// 解析元数据中的发布时间
    ///
    /// 只接受确定性的绝对格式，避免相对时间引入非确定性
    fn parse_published_date(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        let prefix: String = raw.chars().take(10).collect();
        if let Ok(date) = NaiveDate::parse_from_str(&prefix, "%Y-%m-%d") {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
        None
    }

    /// 反转义PDF字面字符串
    fn unescape_pdf_string(raw: &[u8]) -> String {
        let mut out = Vec::with_capacity(raw.len());
        let mut iter = raw.iter().copied().peekable();
        while let Some(byte) = iter.next() {
            if byte == b'\\' {
                match iter.next() {
                    Some(b'n') => out.push(b'\n'),
                    Some(b't') => out.push(b'\t'),
                    Some(b'r') => out.push(b'\r'),
                    Some(other) => out.push(other),
                    None => {}
                }
            } else {
                out.push(byte);
            }
        }
        String::from_utf8_lossy(&out).to_string()
    }
}

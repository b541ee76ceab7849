// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use regex::Regex;
use url::{ParseError, Url};

/// 文本中URL的识别模式
static URL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"{}|\\^`\[\]]+"#).unwrap());

/// 常见的两段式公共后缀，用于可注册域名判定
static TWO_PART_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "gov.uk", "co.jp", "co.kr", "co.in", "co.nz", "com.au",
    "net.au", "org.au", "com.cn", "net.cn", "org.cn", "com.br", "com.mx", "com.tw", "com.sg",
    "com.hk",
];

/// 校验字符串是否为有效的http(s) URL
///
/// 要求同时具备scheme和host
pub fn is_valid_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some()
        }
        Err(_) => false,
    }
}

/// 提取URL的主机名
pub fn extract_host(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

/// 提取URL的可注册域名
///
/// 子域名归并到可注册域名，同一站点共享一个限流预算，
/// 防止通过子域名扇出绕过限流
pub fn registrable_domain(url: &str) -> Option<String> {
    let host = extract_host(url)?;
    Some(registrable_domain_of_host(&host))
}

/// 从主机名计算可注册域名
pub fn registrable_domain_of_host(host: &str) -> String {
    // IP字面量没有可注册域名，整体作为限流键
    if host.parse::<std::net::IpAddr>().is_ok() {
        return host.to_string();
    }

    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() <= 2 {
        return host.to_string();
    }

    let last_two = labels[labels.len() - 2..].join(".");
    if TWO_PART_SUFFIXES.contains(&last_two.as_str()) {
        labels[labels.len() - 3..].join(".")
    } else {
        last_two
    }
}

/// 判断URL是否指向PDF文件
pub fn is_pdf_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| u.path().to_lowercase().ends_with(".pdf"))
        .unwrap_or(false)
}

/// 将可能为相对路径的URL转换为绝对路径URL
pub fn resolve_url(base_url: &Url, path: &str) -> Result<Url, ParseError> {
    base_url.join(path)
}

/// 从自由文本中提取URL
///
/// 纯正则识别，不访问网络。去除尾部标点，
/// 按首次出现顺序去重返回
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut urls = Vec::new();

    for m in URL_REGEX.find_iter(text) {
        let trimmed = m
            .as_str()
            .trim_end_matches(['.', ',', ';', ':', '!', '?', ')', '\'', '"']);
        if trimmed.is_empty() || !is_valid_url(trimmed) {
            continue;
        }
        if seen.insert(trimmed.to_string()) {
            urls.push(trimmed.to_string());
        }
    }

    urls
}

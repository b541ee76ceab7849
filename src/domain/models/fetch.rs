// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// 抓取请求
///
/// 每个候选URL创建一个请求，创建后不可变，由抓取器消费一次
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// 目标URL
    pub url: String,
    /// 可选优先级，数值越大越先提交到工作池
    pub priority: Option<i32>,
    /// 可选的单请求截止时间
    pub deadline: Option<Instant>,
}

impl FetchRequest {
    /// 创建新的抓取请求
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            priority: None,
            deadline: None,
        }
    }

    /// 设置优先级
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// 设置截止时间
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// 抓取终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchStatus {
    /// 抓取成功
    Ok,
    /// 请求超时（重试额度耗尽后）
    Timeout,
    /// 被目标站点或限流预算拒绝 (401/403/429/ThrottleTimeout)
    Blocked,
    /// 网络错误（连接失败、非成功状态码等）
    NetworkError,
    /// 重定向跳数超过上限
    TooManyRedirects,
    /// 整体截止时间到达，请求被取消
    Cancelled,
}

impl FetchStatus {
    /// 是否成功
    pub fn is_ok(&self) -> bool {
        matches!(self, FetchStatus::Ok)
    }
}

impl std::fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FetchStatus::Ok => "ok",
            FetchStatus::Timeout => "timeout",
            FetchStatus::Blocked => "blocked",
            FetchStatus::NetworkError => "network error",
            FetchStatus::TooManyRedirects => "too many redirects",
            FetchStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// 抓取结果
///
/// 每个输入请求恰好产生一个结果，失败时正文为空
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// 请求的URL
    pub url: String,
    /// 重定向后的最终URL
    pub final_url: Option<String>,
    /// 抓取终态
    pub status: FetchStatus,
    /// HTTP状态码（收到响应时）
    pub http_status: Option<u16>,
    /// 响应声明的Content-Type
    pub content_type: Option<String>,
    /// 响应正文
    pub body: Option<Bytes>,
    /// 抓取耗时
    pub elapsed: Duration,
    /// 实际发出的请求次数（含重试）
    pub attempts: u32,
}

impl FetchResult {
    /// 构造失败结果
    pub fn failure(url: impl Into<String>, status: FetchStatus) -> Self {
        Self {
            url: url.into(),
            final_url: None,
            status,
            http_status: None,
            content_type: None,
            body: None,
            elapsed: Duration::ZERO,
            attempts: 0,
        }
    }

    /// 是否成功
    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }
}

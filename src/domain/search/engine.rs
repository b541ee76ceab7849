// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use thiserror::Error;

/// 搜索错误类型
#[derive(Debug, Error, Clone)]
pub enum SearchError {
    /// 搜索后端不可用
    #[error("Search backend unavailable: {0}")]
    SearchUnavailable(String),
    /// 无效查询
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// 查询调度器接口
///
/// 外部搜索后端的抽象，本核心只消费不实现。
/// 返回按相关性排序的候选URL序列，调用方自行限流。
#[async_trait]
pub trait QueryDispatcher: Send + Sync {
    /// 根据主题检索候选URL
    ///
    /// # 参数
    ///
    /// * `topic` - 查询主题
    /// * `max_results` - 返回的候选URL数量上限
    ///
    /// # 返回值
    ///
    /// * `Ok(Vec<String>)` - 按排名排序的候选URL
    /// * `Err(SearchError)` - 搜索后端失败
    async fn search(&self, topic: &str, max_results: usize) -> Result<Vec<String>, SearchError>;

    /// 获取调度器名称
    fn name(&self) -> &'static str;
}

/// 固定URL列表调度器
///
/// 将给定的URL列表当作搜索结果返回，用于测试和直接批量抓取
pub struct StaticDispatcher {
    urls: Vec<String>,
}

impl StaticDispatcher {
    /// 创建新的固定列表调度器
    pub fn new(urls: Vec<String>) -> Self {
        Self { urls }
    }
}

#[async_trait]
impl QueryDispatcher for StaticDispatcher {
    async fn search(&self, _topic: &str, max_results: usize) -> Result<Vec<String>, SearchError> {
        Ok(self.urls.iter().take(max_results).cloned().collect())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

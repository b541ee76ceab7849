// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// 应用程序配置设置
///
/// 包含域名限流、抓取器和研究编排的所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 域名限流配置
    pub throttle: ThrottleSettings,
    /// 抓取器配置
    pub fetcher: FetcherSettings,
    /// 研究编排配置
    pub research: ResearchSettings,
}

/// 域名限流配置设置
///
/// 限流按可注册域名计数，同一站点的子域名共享一个令牌桶
#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleSettings {
    /// 每个域名在滚动窗口内允许的请求数
    pub per_domain_rate_limit: u32,
    /// 滚动窗口长度（秒）
    pub window_secs: u64,
    /// 等待令牌的最长时间（秒），超时返回 ThrottleTimeout
    pub acquire_timeout_secs: u64,
}

/// 抓取器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherSettings {
    /// 工作池大小（全局最大并发抓取数）
    pub max_concurrency: usize,
    /// 单个域名的最大并发抓取数
    pub per_domain_concurrency: usize,
    /// 单次请求超时时间（秒）
    pub request_timeout_secs: u64,
    /// 瞬时失败的最大重试次数
    pub max_retries: u32,
    /// 重试初始退避时间（毫秒）
    pub initial_backoff_ms: u64,
    /// 重定向跳数上限，超过判定为 TooManyRedirects
    pub max_redirects: usize,
    /// 请求使用的User-Agent
    pub user_agent: String,
}

/// 研究编排配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ResearchSettings {
    /// research 调用的整体截止时间（秒）
    pub overall_deadline_secs: u64,
    /// 候选源超量获取倍数，补偿抓取和提取的损耗
    pub overfetch_factor: u32,
    /// 去重相似度阈值 (0.0-1.0)
    pub dedup_similarity_threshold: f64,
    /// 每篇文档保留的关键词数量上限
    pub max_keywords_per_document: usize,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            per_domain_rate_limit: 5,
            window_secs: 60,
            acquire_timeout_secs: 15,
        }
    }
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            per_domain_concurrency: 2,
            request_timeout_secs: 30,
            max_retries: 2,
            initial_backoff_ms: 500,
            max_redirects: 5,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
                .to_string(),
        }
    }
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self {
            overall_deadline_secs: 60,
            overfetch_factor: 2,
            dedup_similarity_threshold: 0.85,
            max_keywords_per_document: 20,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            throttle: ThrottleSettings::default(),
            fetcher: FetcherSettings::default(),
            research: ResearchSettings::default(),
        }
    }
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 从配置文件和环境变量加载配置，支持默认值
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let defaults = Settings::default();
        let builder = Config::builder()
            // Throttle defaults
            .set_default(
                "throttle.per_domain_rate_limit",
                defaults.throttle.per_domain_rate_limit,
            )?
            .set_default("throttle.window_secs", defaults.throttle.window_secs)?
            .set_default(
                "throttle.acquire_timeout_secs",
                defaults.throttle.acquire_timeout_secs,
            )?
            // Fetcher defaults
            .set_default(
                "fetcher.max_concurrency",
                defaults.fetcher.max_concurrency as u64,
            )?
            .set_default(
                "fetcher.per_domain_concurrency",
                defaults.fetcher.per_domain_concurrency as u64,
            )?
            .set_default(
                "fetcher.request_timeout_secs",
                defaults.fetcher.request_timeout_secs,
            )?
            .set_default("fetcher.max_retries", defaults.fetcher.max_retries)?
            .set_default(
                "fetcher.initial_backoff_ms",
                defaults.fetcher.initial_backoff_ms,
            )?
            .set_default("fetcher.max_redirects", defaults.fetcher.max_redirects as u64)?
            .set_default("fetcher.user_agent", defaults.fetcher.user_agent.clone())?
            // Research defaults
            .set_default(
                "research.overall_deadline_secs",
                defaults.research.overall_deadline_secs,
            )?
            .set_default(
                "research.overfetch_factor",
                defaults.research.overfetch_factor,
            )?
            .set_default(
                "research.dedup_similarity_threshold",
                defaults.research.dedup_similarity_threshold,
            )?
            .set_default(
                "research.max_keywords_per_document",
                defaults.research.max_keywords_per_document as u64,
            )?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("RESEARCHRS").separator("__"));

        builder.build()?.try_deserialize()
    }
}

impl ThrottleSettings {
    /// 滚动窗口长度
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// 令牌等待超时时间
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

impl FetcherSettings {
    /// 单次请求超时时间
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// 重试初始退避时间
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }
}

impl ResearchSettings {
    /// research 调用的整体截止时间
    pub fn overall_deadline(&self) -> Duration {
        Duration::from_secs(self.overall_deadline_secs)
    }
}

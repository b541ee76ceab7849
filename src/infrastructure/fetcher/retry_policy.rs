// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

use crate::config::settings::FetcherSettings;

/// 重试策略配置
///
/// 只对瞬时失败（超时、连接错误、5xx、限流等待超时）计数，
/// 终态失败不消耗重试额度
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大重试次数
    pub max_retries: u32,
    /// 初始退避时间
    pub initial_backoff: Duration,
    /// 最大退避时间
    pub max_backoff: Duration,
    /// 退避乘数
    pub backoff_multiplier: f64,
    /// 抖动因子 (0.0-1.0)
    pub jitter_factor: f64,
    /// 是否启用抖动
    pub enable_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            enable_jitter: true,
        }
    }
}

impl RetryPolicy {
    /// 从抓取器配置创建重试策略
    pub fn from_settings(settings: &FetcherSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_backoff: settings.initial_backoff(),
            ..Self::default()
        }
    }

    /// 计算下次重试的退避时间
    ///
    /// 指数退避，`attempt` 从1开始计数
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let backoff_secs = self.initial_backoff.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);

        let capped_backoff = backoff_secs.min(self.max_backoff.as_secs_f64());

        let jitter_range = capped_backoff * self.jitter_factor;
        // 零退避时抖动区间为空，不能采样
        let final_backoff = if self.enable_jitter && jitter_range > 0.0 {
            let jitter = rand::random_range(-jitter_range..jitter_range);
            (capped_backoff + jitter).max(0.0)
        } else {
            capped_backoff
        };

        Duration::from_secs_f64(final_backoff)
    }

    /// 是否应该重试
    ///
    /// `attempt` 为已经发出的请求次数
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use crate::config::settings::ThrottleSettings;
use crate::infrastructure::metrics::{THROTTLE_TIMEOUT, THROTTLE_WAIT};

/// 限流错误类型
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ThrottleError {
    /// 等待令牌超时
    #[error("Throttle timeout for domain {domain}")]
    ThrottleTimeout { domain: String },
}

/// 单个域名的限流预算
///
/// 令牌桶：容量为窗口内允许的请求数，按时间连续填充。
/// 首次请求某域名时惰性创建，流水线运行期间不销毁。
#[derive(Debug)]
struct DomainBudget {
    /// 当前可用令牌数，不会超过容量
    tokens: f64,
    /// 上次填充时间
    last_refill: Instant,
}

impl DomainBudget {
    fn new(capacity: u32) -> Self {
        Self {
            tokens: capacity as f64,
            last_refill: Instant::now(),
        }
    }

    /// 按流逝时间填充令牌，上限为容量
    fn refill(&mut self, now: Instant, capacity: u32, refill_per_sec: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * refill_per_sec).min(capacity as f64);
        self.last_refill = now;
    }
}

/// 令牌持有凭证
///
/// 请求真正发出后调用 `commit` 消费令牌；
/// 未提交即被丢弃（例如截止时间取消了工作者）时
/// 在 Drop 中退还令牌，保证取消不产生令牌赤字
#[must_use = "dropping an uncommitted permit refunds the token"]
pub struct ThrottlePermit<'a> {
    throttle: &'a DomainThrottle,
    domain: String,
    committed: bool,
}

impl std::fmt::Debug for ThrottlePermit<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottlePermit")
            .field("domain", &self.domain)
            .field("committed", &self.committed)
            .finish()
    }
}

impl ThrottlePermit<'_> {
    /// 确认令牌已被真实请求消费
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for ThrottlePermit<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.throttle.refund(&self.domain);
        }
    }
}

/// 域名限流器
///
/// 每个可注册域名一个令牌桶，`acquire` 在有令牌时立即返回，
/// 否则挂起等待填充，超时返回 ThrottleTimeout。
/// 令牌扣减在互斥锁内完成，并发调用不会重复消费同一令牌。
/// 各域名预算互相独立，等待一个域名不会饿死其他域名。
pub struct DomainThrottle {
    budgets: DashMap<String, Arc<Mutex<DomainBudget>>>,
    capacity: u32,
    refill_per_sec: f64,
    acquire_timeout: Duration,
}

impl DomainThrottle {
    /// 创建新的域名限流器
    pub fn new(settings: &ThrottleSettings) -> Self {
        let capacity = settings.per_domain_rate_limit.max(1);
        let window_secs = settings.window().as_secs_f64().max(1.0);
        Self {
            budgets: DashMap::new(),
            capacity,
            refill_per_sec: capacity as f64 / window_secs,
            acquire_timeout: settings.acquire_timeout(),
        }
    }

    /// 令牌桶容量
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// 使用默认超时获取一个令牌
    pub async fn acquire(&self, domain: &str) -> Result<ThrottlePermit<'_>, ThrottleError> {
        self.acquire_with_timeout(domain, self.acquire_timeout).await
    }

    /// 获取一个令牌，最多等待 `timeout`
    ///
    /// 有令牌时为无等待快速路径；无令牌时挂起到下次填充，
    /// 等待超过 `timeout` 返回 ThrottleTimeout
    pub async fn acquire_with_timeout(
        &self,
        domain: &str,
        timeout: Duration,
    ) -> Result<ThrottlePermit<'_>, ThrottleError> {
        let deadline = Instant::now() + timeout;

        loop {
            let wait = {
                let budget_arc = self.budget(domain);
                let mut budget = budget_arc.lock();
                let now = Instant::now();
                budget.refill(now, self.capacity, self.refill_per_sec);
                if budget.tokens >= 1.0 {
                    budget.tokens -= 1.0;
                    return Ok(ThrottlePermit {
                        throttle: self,
                        domain: domain.to_string(),
                        committed: false,
                    });
                }
                Duration::from_secs_f64((1.0 - budget.tokens) / self.refill_per_sec)
            };

            if Instant::now() + wait > deadline {
                metrics::counter!(THROTTLE_TIMEOUT).increment(1);
                return Err(ThrottleError::ThrottleTimeout {
                    domain: domain.to_string(),
                });
            }

            debug!(domain, wait_ms = wait.as_millis() as u64, "waiting for domain token");
            metrics::counter!(THROTTLE_WAIT).increment(1);
            tokio::time::sleep(wait).await;
        }
    }

    /// 当前可用令牌数（含时间填充），用于赤字校验
    pub fn available(&self, domain: &str) -> f64 {
        let budget_arc = self.budget(domain);
        let mut budget = budget_arc.lock();
        budget.refill(Instant::now(), self.capacity, self.refill_per_sec);
        budget.tokens
    }

    /// 重置所有域名预算（新一轮运行）
    pub fn reset(&self) {
        self.budgets.clear();
    }

    /// 退还一个令牌，上限为容量
    fn refund(&self, domain: &str) {
        let budget_arc = self.budget(domain);
        let mut budget = budget_arc.lock();
        let now = Instant::now();
        budget.refill(now, self.capacity, self.refill_per_sec);
        budget.tokens = (budget.tokens + 1.0).min(self.capacity as f64);
    }

    /// 惰性创建域名预算
    fn budget(&self, domain: &str) -> Arc<Mutex<DomainBudget>> {
        self.budgets
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(DomainBudget::new(self.capacity))))
            .clone()
    }
}

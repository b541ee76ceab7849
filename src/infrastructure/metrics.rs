// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, Unit};

/// 抓取死信计数：重试额度耗尽后仍然失败的请求
pub const FETCH_DEAD_LETTER: &str = "researchrs_fetch_dead_letter_total";
/// 限流等待计数：令牌不足进入等待的次数
pub const THROTTLE_WAIT: &str = "researchrs_throttle_wait_total";
/// 限流超时计数：等待令牌超时的次数
pub const THROTTLE_TIMEOUT: &str = "researchrs_throttle_timeout_total";

/// 注册指标描述
///
/// 导出器的安装由宿主进程负责，本核心只负责计数
pub fn describe_metrics() {
    describe_counter!(
        FETCH_DEAD_LETTER,
        Unit::Count,
        "Requests that exhausted their retry budget"
    );
    describe_counter!(
        THROTTLE_WAIT,
        Unit::Count,
        "Times a fetch worker waited for a domain token"
    );
    describe_counter!(
        THROTTLE_TIMEOUT,
        Unit::Count,
        "Times a token wait timed out"
    );
}

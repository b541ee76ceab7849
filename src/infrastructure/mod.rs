// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 提供网络抓取、域名限流和指标注册等外部能力
pub mod fetcher;
pub mod metrics;
pub mod throttle;

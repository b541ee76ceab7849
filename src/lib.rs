// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用层模块
///
/// 包含研究流水线的编排逻辑和对外操作入口
pub mod application;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含核心业务实体、服务和搜索接口
pub mod domain;

/// 基础设施模块
///
/// 提供网络抓取、域名限流和指标等外部能力
pub mod infrastructure;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;

pub use application::research_service::{ResearchError, ResearchService};
pub use config::settings::Settings;
pub use domain::models::document::{Document, DocumentCategory};
pub use domain::models::fetch::{FetchRequest, FetchResult, FetchStatus};
pub use domain::models::report::{ExclusionReason, Report};
pub use domain::search::engine::{QueryDispatcher, SearchError};
pub use infrastructure::fetcher::Fetcher;
pub use infrastructure::throttle::domain_throttle::{DomainThrottle, ThrottleError};

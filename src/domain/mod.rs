// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：抓取请求/结果、文档和研究报告
/// - 搜索接口（search）：外部查询调度器的抽象
/// - 服务（services）：内容提取、关键词分析、分类和去重
///
/// 领域层不依赖任何网络实现，便于独立测试业务规则。
pub mod models;
pub mod search;
pub mod services;

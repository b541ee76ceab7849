// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含内容提取、关键词分析、类别判定和结果去重
pub mod category_classifier;
pub mod deduplicator;
pub mod extraction_service;
pub mod keyword_analyzer;

// 该文件是 Logistik 项目的一部分。
// src/output.rs - 报表输出定义
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use thiserror::Error;
use url::Url;

use crate::FromUrl;
use crate::FromUrlWithScheme;
use crate::stock::ColorCounts;

/// 库存报表写入目标
pub trait ReportSink {
  type Error;
  /// 写入一种物品的颜色统计，`name` 为报表名称
  fn write_report(&self, name: &str, counts: &ColorCounts) -> Result<(), Self::Error>;
}

mod text_report;
pub use self::text_report::{TextReportError, TextReportOutput};

#[cfg(feature = "json_report")]
mod json_report;
#[cfg(feature = "json_report")]
pub use self::json_report::{JsonReportError, JsonReportOutput};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("文本报表错误: {0}")]
  TextReportError(#[from] TextReportError),
  #[cfg(feature = "json_report")]
  #[error("JSON 报表错误: {0}")]
  JsonReportError(#[from] JsonReportError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum ReportWrapper {
  TextReportOutput(TextReportOutput),
  #[cfg(feature = "json_report")]
  JsonReportOutput(JsonReportOutput),
}

impl FromUrl for ReportWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      TextReportOutput::SCHEME => {
        let output = TextReportOutput::from_url(url)?;
        Ok(ReportWrapper::TextReportOutput(output))
      }
      #[cfg(feature = "json_report")]
      JsonReportOutput::SCHEME => {
        let output = JsonReportOutput::from_url(url)?;
        Ok(ReportWrapper::JsonReportOutput(output))
      }
      _ => Err(OutputError::SchemeMismatch),
    }
  }
}

impl ReportSink for ReportWrapper {
  type Error = OutputError;

  fn write_report(&self, name: &str, counts: &ColorCounts) -> Result<(), Self::Error> {
    match self {
      ReportWrapper::TextReportOutput(output) => output
        .write_report(name, counts)
        .map_err(OutputError::from),
      #[cfg(feature = "json_report")]
      ReportWrapper::JsonReportOutput(output) => output
        .write_report(name, counts)
        .map_err(OutputError::from),
    }
  }
}

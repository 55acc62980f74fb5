// 该文件是 Logistik 项目的一部分。
// src/output/json_report.rs - JSON 库存报表
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

use std::path::PathBuf;

use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, output::ReportSink, stock::ColorCounts};

#[derive(Error, Debug)]
pub enum JsonReportError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  SerializeError(#[from] serde_json::Error),
}

/// 每种物品一个 JSON 文件 `<目录>/<名称>.json`
///
/// 地址格式: `json:///path/to/reports`
pub struct JsonReportOutput {
  directory: PathBuf,
}

impl FromUrlWithScheme for JsonReportOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonReportOutput {
  type Error = JsonReportError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonReportError::SchemeMismatch);
    }

    Ok(JsonReportOutput {
      directory: PathBuf::from(uri.path()),
    })
  }
}

impl ReportSink for JsonReportOutput {
  type Error = JsonReportError;

  fn write_report(&self, name: &str, counts: &ColorCounts) -> Result<(), Self::Error> {
    std::fs::create_dir_all(&self.directory)?;

    let document = json!({
      "item": name,
      "generated_at": Utc::now().to_rfc3339(),
      "counts": counts,
    });

    let path = self.directory.join(format!("{}.json", name));
    std::fs::write(&path, serde_json::to_vec_pretty(&document)?)?;
    info!("报表 {} 已创建", path.display());

    Ok(())
  }
}

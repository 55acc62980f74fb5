// 该文件是 Logistik 项目的一部分。
// src/output/text_report.rs - 文本库存报表
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

use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, output::ReportSink, stock::ColorCounts};

#[derive(Error, Debug)]
pub enum TextReportError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 每种物品一个文本文件 `<目录>/<名称>.txt`，每行 `<颜色> <数量>`
///
/// 地址格式: `folder:///path/to/reports`，加上 `?dated` 时按 `年/月/日` 建立子目录。
pub struct TextReportOutput {
  directory: PathBuf,
  dated: bool,
}

impl FromUrlWithScheme for TextReportOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for TextReportOutput {
  type Error = TextReportError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(TextReportError::SchemeMismatch);
    }

    let dated = uri.query_pairs().any(|(k, _)| k == "dated");

    Ok(TextReportOutput {
      directory: PathBuf::from(uri.path()),
      dated,
    })
  }
}

impl TextReportOutput {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: directory.into(),
      dated: false,
    }
  }

  fn report_dir(&self) -> PathBuf {
    if !self.dated {
      return self.directory.clone();
    }
    let now = Utc::now();
    self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()))
  }

  fn render(counts: &ColorCounts) -> String {
    counts
      .iter()
      .map(|(color, count)| format!("{} {}\n", color, count))
      .collect()
  }
}

impl ReportSink for TextReportOutput {
  type Error = TextReportError;

  fn write_report(&self, name: &str, counts: &ColorCounts) -> Result<(), Self::Error> {
    let directory = self.report_dir();
    std::fs::create_dir_all(&directory)?;

    let path = directory.join(format!("{}.txt", name));
    info!("创建报表 {} ...", path.display());
    std::fs::write(&path, Self::render(counts))?;
    info!("报表 {} 已创建", path.display());

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn writes_one_line_per_color() {
    let dir = tempfile::tempdir().unwrap();
    let output = TextReportOutput::new(dir.path().join("reports"));

    let mut counts = ColorCounts::new();
    counts.insert("red".to_string(), 3);
    counts.insert("blue".to_string(), 1);
    output.write_report("bottles", &counts).unwrap();

    let text = std::fs::read_to_string(dir.path().join("reports/bottles.txt")).unwrap();
    assert_eq!(text, "blue 1\nred 3\n");
  }

  #[test]
  fn dated_query_nests_reports_by_day() {
    let dir = tempfile::tempdir().unwrap();
    let url = Url::parse(&format!("folder://{}?dated", dir.path().display())).unwrap();
    let output = TextReportOutput::from_url(&url).unwrap();

    let mut counts = ColorCounts::new();
    counts.insert("black".to_string(), 2);
    output.write_report("cups", &counts).unwrap();

    let now = Utc::now();
    let path = dir
      .path()
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()))
      .join("cups.txt");
    assert_eq!(std::fs::read_to_string(path).unwrap(), "black 2\n");
  }
}

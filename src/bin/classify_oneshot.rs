// 该文件是 Logistik 项目的一部分。
// src/bin/classify_oneshot.rs - 单张图像识别
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use logistik::{
  FromUrl, classify::Pipeline, input::ImageFileInput, label::ClassCatalog, model::ExecDetector,
};
use tracing::info;

/// Logistik 单张识别参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测模型地址
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 类别名称文件
  #[arg(long, value_name = "FILE")]
  pub names: PathBuf,
  /// 输入图像，例如 image:///data/item.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型地址: {}", args.model);
  info!("输入来源: {}", args.input);

  let classes = ClassCatalog::from_names_file(&args.names)?;
  let detector = ExecDetector::from_url(&args.model)?;
  let pipeline = Pipeline::new(detector, classes);

  for item in ImageFileInput::from_url(&args.input)? {
    let loaded = item?;
    let now = std::time::Instant::now();
    let classification = pipeline.process(&loaded.image)?;
    info!(
      "{} -> {}，耗时: {:.2?}",
      loaded.path.display(),
      classification,
      now.elapsed()
    );
  }

  Ok(())
}

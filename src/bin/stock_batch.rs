// 该文件是 Logistik 项目的一部分。
// src/bin/stock_batch.rs - 批量识别并生成库存报表
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
  FromUrl,
  classify::{Pipeline, PolicyConfig},
  input::InputWrapper,
  label::ClassCatalog,
  model::ExecDetector,
  output::ReportWrapper,
  task::{BatchTask, Task},
};
use tracing::info;

/// Logistik 批处理参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测模型地址，例如 exec:///opt/yolo/detect?arg=--cfg&arg=yolov3.cfg
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 类别名称文件（每行一个，如 coco.names）
  #[arg(long, value_name = "FILE")]
  pub names: PathBuf,
  /// 输入来源，例如 folder:///data/Lote0001
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 报表输出，例如 folder:///data/Archivos 或 json:///data/reports
  #[arg(long, value_name = "REPORT")]
  pub report: Url,
  /// 物体类型识别的置信度阈值
  #[arg(long, default_value = "0.3", value_name = "THRESHOLD")]
  pub type_confidence: f32,
  /// 颜色验证的置信度阈值
  #[arg(long, default_value = "0.2", value_name = "THRESHOLD")]
  pub color_confidence: f32,
  /// 最多处理的图像数量
  #[arg(long, value_name = "COUNT")]
  pub max_images: Option<usize>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型地址: {}", args.model);
  info!("类别文件: {}", args.names.display());
  info!("输入来源: {}", args.input);
  info!("报表输出: {}", args.report);

  // 配置缺失时在处理任何图像之前退出
  let classes = ClassCatalog::from_names_file(&args.names)?;
  let detector = ExecDetector::from_url(&args.model)?;
  let config = PolicyConfig {
    type_confidence: args.type_confidence,
    color_confidence: args.color_confidence,
    ..PolicyConfig::default()
  };
  let pipeline = Pipeline::new(detector, classes).with_config(config)?;

  let input = InputWrapper::from_url(&args.input)?;
  let output = ReportWrapper::from_url(&args.report)?;

  let summary = BatchTask::default()
    .with_max_images(args.max_images)
    .with_ctrlc()?
    .run_task(input, &pipeline, output)?;

  info!(
    "猫 {}，牛 {}，狗 {}，其他 {}，未知 {}，颜色未知 {}",
    summary.cats, summary.cows, summary.dogs, summary.others, summary.unknown, summary.uncolored
  );
  for (item, counts) in summary.stock.iter() {
    for (color, count) in counts {
      info!("{} {}: {}", item, color, count);
    }
  }

  Ok(())
}

// 该文件是 Logistik 项目的一部分。
// src/task.rs - 批处理任务
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

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::{
  classify::{Classification, Pipeline},
  input::ImageItem,
  model::Detector,
  output::ReportSink,
  stock::{StockAggregator, StockTable},
};

pub trait Task<I, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Output, Self::Error>;
}

/// 批处理结果汇总
///
/// 不计入库存的分类结果只在这里计数，不写入报表。
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
  pub processed: usize,
  pub skipped: usize,
  pub cats: usize,
  pub cows: usize,
  pub dogs: usize,
  pub others: usize,
  pub unknown: usize,
  pub uncolored: usize,
  pub interrupted: bool,
  pub stock: StockTable,
}

impl BatchSummary {
  fn tally(&mut self, classification: &Classification) {
    match classification {
      Classification::Bottle(None) | Classification::Cup(None) => self.uncolored += 1,
      Classification::Bottle(Some(_)) | Classification::Cup(Some(_)) => {}
      Classification::Cat => self.cats += 1,
      Classification::Cow => self.cows += 1,
      Classification::Dog => self.dogs += 1,
      Classification::Other(_) => self.others += 1,
      Classification::Unknown => self.unknown += 1,
    }
  }
}

/// 逐张处理图像并统计库存，结束后为每种有库存的物品写一份报表
#[derive(Default, Debug)]
pub struct BatchTask {
  max_images: Option<usize>,
  stop: Option<Arc<AtomicBool>>,
}

impl BatchTask {
  pub fn with_max_images(mut self, max_images: Option<usize>) -> Self {
    self.max_images = max_images;
    self
  }

  /// 外部设置该标志后，任务在当前图像处理完后停止
  pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
    self.stop = Some(stop);
    self
  }

  /// 收到 Ctrl-C 时停止批处理，已统计的库存仍会写入报表
  pub fn with_ctrlc(self) -> Result<Self, ctrlc::Error> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    ctrlc::set_handler(move || {
      info!("收到中断信号，处理完当前图像后退出...");
      flag.store(true, Ordering::SeqCst);
    })?;
    Ok(self.with_stop_flag(stop))
  }

  fn stopped(&self) -> bool {
    self
      .stop
      .as_ref()
      .map(|stop| stop.load(Ordering::SeqCst))
      .unwrap_or(false)
  }
}

impl<I, D, O> Task<I, &Pipeline<D>, O> for BatchTask
where
  I: Iterator<Item = ImageItem>,
  D: Detector,
  O: ReportSink,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Output = BatchSummary;
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: &Pipeline<D>, output: O) -> Result<Self::Output, Self::Error> {
    info!("开始批处理任务...");
    let mut summary = BatchSummary::default();
    let mut stock = StockAggregator::new();

    loop {
      // 在读取下一张图像之前检查停止条件
      if self.max_images.map(|n| summary.processed >= n).unwrap_or(false) {
        info!("达到指定图像数量 {}，停止处理", summary.processed);
        break;
      }
      if self.stopped() {
        warn!("中断信号接收，退出批处理");
        summary.interrupted = true;
        break;
      }

      let Some(item) = input.next() else {
        break;
      };

      let loaded = match item {
        Ok(loaded) => loaded,
        Err(e) => {
          warn!("跳过无法读取的图像: {}", e);
          summary.skipped += 1;
          continue;
        }
      };

      let now = std::time::Instant::now();
      let classification = model.process(&loaded.image)?;
      info!(
        "{} -> {}，耗时: {:.2?}",
        loaded.path.display(),
        classification,
        now.elapsed()
      );

      stock.record(&classification);
      summary.tally(&classification);
      summary.processed += 1;
    }

    let table = stock.into_table();
    for (item, counts) in table.iter() {
      if counts.is_empty() {
        continue;
      }
      output.write_report(item.report_name(), counts)?;
    }

    info!(
      "批处理完成: 处理 {} 张，跳过 {} 张，库存合计 {}",
      summary.processed,
      summary.skipped,
      table.total()
    );
    summary.stock = table;
    Ok(summary)
  }
}

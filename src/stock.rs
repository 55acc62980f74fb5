// 该文件是 Logistik 项目的一部分。
// src/stock.rs - 库存统计
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

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::classify::Classification;

/// 计入库存的物品种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StockItem {
  Bottle,
  Cup,
}

impl StockItem {
  /// 报表名称
  pub fn report_name(&self) -> &'static str {
    match self {
      StockItem::Bottle => "bottles",
      StockItem::Cup => "cups",
    }
  }
}

impl fmt::Display for StockItem {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StockItem::Bottle => f.write_str("bottle"),
      StockItem::Cup => f.write_str("cup"),
    }
  }
}

/// 颜色到数量的映射
pub type ColorCounts = BTreeMap<String, u64>;

/// 按物品种类与颜色统计的库存表
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockTable {
  items: BTreeMap<StockItem, ColorCounts>,
}

impl StockTable {
  pub fn get(&self, item: StockItem) -> Option<&ColorCounts> {
    self.items.get(&item)
  }

  pub fn count(&self, item: StockItem, color: &str) -> u64 {
    self
      .items
      .get(&item)
      .and_then(|counts| counts.get(color))
      .copied()
      .unwrap_or(0)
  }

  pub fn iter(&self) -> impl Iterator<Item = (StockItem, &ColorCounts)> {
    self.items.iter().map(|(item, counts)| (*item, counts))
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  /// 库存总数
  pub fn total(&self) -> u64 {
    self.items.values().flat_map(|counts| counts.values()).sum()
  }

  fn increment(&mut self, item: StockItem, color: &str) -> u64 {
    let count = self
      .items
      .entry(item)
      .or_default()
      .entry(color.to_string())
      .or_insert(0);
    *count += 1;
    *count
  }
}

/// 库存累加器
///
/// 只统计带有颜色的瓶子和杯子，计数只增不减。
#[derive(Debug, Default)]
pub struct StockAggregator {
  table: StockTable,
}

impl StockAggregator {
  pub fn new() -> Self {
    Self::default()
  }

  /// 记录一次分类结果，返回是否计入了库存
  pub fn record(&mut self, classification: &Classification) -> bool {
    let (item, color) = match classification {
      Classification::Bottle(Some(color)) => (StockItem::Bottle, color),
      Classification::Cup(Some(color)) => (StockItem::Cup, color),
      _ => return false,
    };

    if color.is_empty() {
      return false;
    }

    let count = self.table.increment(item, color);
    debug!("库存更新: {} {} -> {}", item, color, count);
    true
  }

  pub fn table(&self) -> &StockTable {
    &self.table
  }

  pub fn into_table(self) -> StockTable {
    self.table
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn bottle(color: &str) -> Classification {
    Classification::Bottle(Some(color.to_string()))
  }

  #[test]
  fn repeated_records_add_up() {
    let mut stock = StockAggregator::new();
    for _ in 0..7 {
      assert!(stock.record(&bottle("red")));
    }
    assert_eq!(stock.table().count(StockItem::Bottle, "red"), 7);
    assert_eq!(stock.table().total(), 7);
  }

  #[test]
  fn unrelated_records_leave_entries_untouched() {
    let mut stock = StockAggregator::new();
    stock.record(&bottle("blue"));
    stock.record(&Classification::Cup(Some("blue".to_string())));
    let before = stock.table().clone();

    assert!(!stock.record(&Classification::Cat));
    assert!(!stock.record(&Classification::Dog));
    assert!(!stock.record(&Classification::Unknown));
    assert!(!stock.record(&Classification::Other("person".to_string())));
    assert!(!stock.record(&Classification::Bottle(None)));
    assert!(!stock.record(&Classification::Cup(Some(String::new()))));

    assert_eq!(stock.table(), &before);
  }

  #[test]
  fn bottles_and_cups_are_kept_apart() {
    let mut stock = StockAggregator::new();
    stock.record(&bottle("green"));
    stock.record(&Classification::Cup(Some("green".to_string())));
    stock.record(&Classification::Cup(Some("green".to_string())));

    let table = stock.into_table();
    assert_eq!(table.count(StockItem::Bottle, "green"), 1);
    assert_eq!(table.count(StockItem::Cup, "green"), 2);
    assert_eq!(table.count(StockItem::Cup, "red"), 0);
  }

  #[test]
  fn empty_table_has_no_items() {
    let stock = StockAggregator::new();
    assert!(stock.table().is_empty());
    assert!(stock.table().get(StockItem::Bottle).is_none());
  }

  #[test]
  fn report_names() {
    assert_eq!(StockItem::Bottle.report_name(), "bottles");
    assert_eq!(StockItem::Cup.report_name(), "cups");
  }
}

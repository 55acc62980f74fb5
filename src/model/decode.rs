// 该文件是 Logistik 项目的一部分。
// src/model/decode.rs - 检测行解码
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

use tracing::debug;

use super::{BoxRect, Candidate, DetectionRow, ModelError};

/// 找到最高类别分数，分数相同时取下标最小者
fn argmax(scores: &[f32]) -> (usize, f32) {
  let mut best_id = 0usize;
  let mut best_score = scores[0];
  for (class_id, &score) in scores.iter().enumerate().skip(1) {
    if score > best_score {
      best_score = score;
      best_id = class_id;
    }
  }
  (best_id, best_score)
}

/// 将归一化的中心点/尺寸转换为像素坐标下的左上角/尺寸
fn to_pixel_box(geometry: [f32; 4], width: u32, height: u32) -> BoxRect {
  let (width, height) = (width as f32, height as f32);
  let cx = geometry[0] * width;
  let cy = geometry[1] * height;
  let w = geometry[2] * width;
  let h = geometry[3] * height;

  // 半宽半高向下取整，结果再向零截断
  let x0 = (cx - (w / 2.0).floor()) as i32;
  let y0 = (cy - (h / 2.0).floor()) as i32;

  BoxRect::new(x0, y0, w as i32, h as i32)
}

/// 解码检测器输出
///
/// 每行取最高分数的类别作为 `class_id`，该分数作为置信度；
/// 置信度严格大于 `conf_threshold` 的行被转换为像素坐标的候选框，
/// 其余行静默丢弃。所有行的类别数量必须一致。
pub fn decode_rows(
  rows: &[DetectionRow],
  width: u32,
  height: u32,
  conf_threshold: f32,
) -> Result<Vec<Candidate>, ModelError> {
  let Some(first) = rows.first() else {
    return Ok(Vec::new());
  };
  let class_count = first.class_count();

  let mut candidates = Vec::new();
  for row in rows {
    if row.class_count() != class_count {
      return Err(ModelError::InconsistentClassCount {
        expected: class_count,
        actual: row.class_count(),
      });
    }

    let (class_id, confidence) = argmax(row.scores());
    if confidence <= conf_threshold {
      continue;
    }

    candidates.push(Candidate {
      bbox: to_pixel_box(row.geometry(), width, height),
      confidence,
      class_id,
    });
  }

  debug!(
    "解码 {} 行，{} 个候选框超过阈值 {}",
    rows.len(),
    candidates.len(),
    conf_threshold
  );

  Ok(candidates)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn row(geometry: [f32; 4], scores: &[f32]) -> DetectionRow {
    DetectionRow::from_parts(geometry, 0.0, scores).unwrap()
  }

  #[test]
  fn converts_normalized_center_to_pixel_corner() {
    let rows = [row([0.5, 0.5, 0.25, 0.5], &[0.1, 0.9])];
    let candidates = decode_rows(&rows, 640, 480, 0.3).unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].bbox, BoxRect::new(240, 120, 160, 240));
    assert_eq!(candidates[0].class_id, 1);
    assert_eq!(candidates[0].confidence, 0.9);
  }

  #[test]
  fn half_extent_is_floored_before_subtraction() {
    // w = 31/512 * 256 = 15.5 -> 半宽 floor(7.75) = 7, x0 = 128 - 7 = 121, w 截断为 15
    let rows = [row([0.5, 0.5, 0.060546875, 0.060546875], &[0.8])];
    let candidates = decode_rows(&rows, 256, 256, 0.3).unwrap();
    assert_eq!(candidates[0].bbox, BoxRect::new(121, 121, 15, 15));
  }

  #[test]
  fn rows_at_threshold_are_dropped() {
    let rows = [
      row([0.5, 0.5, 0.1, 0.1], &[0.3, 0.0]),
      row([0.5, 0.5, 0.1, 0.1], &[0.0, 0.31]),
    ];
    let candidates = decode_rows(&rows, 100, 100, 0.3).unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].class_id, 1);
  }

  #[test]
  fn objectness_is_ignored() {
    let rows = [DetectionRow::from_parts([0.5, 0.5, 0.1, 0.1], 0.0, &[0.9]).unwrap()];
    assert_eq!(decode_rows(&rows, 100, 100, 0.3).unwrap().len(), 1);
  }

  #[test]
  fn ties_resolve_to_lowest_class() {
    let rows = [row([0.5, 0.5, 0.1, 0.1], &[0.2, 0.6, 0.6])];
    let candidates = decode_rows(&rows, 100, 100, 0.3).unwrap();
    assert_eq!(candidates[0].class_id, 1);
  }

  #[test]
  fn inconsistent_class_count_is_fatal() {
    let rows = [
      row([0.5, 0.5, 0.1, 0.1], &[0.9, 0.1]),
      row([0.5, 0.5, 0.1, 0.1], &[0.9]),
    ];
    let err = decode_rows(&rows, 100, 100, 0.3).unwrap_err();
    assert_eq!(
      err,
      ModelError::InconsistentClassCount {
        expected: 2,
        actual: 1
      }
    );
  }

  #[test]
  fn empty_input_decodes_to_nothing() {
    assert!(decode_rows(&[], 100, 100, 0.3).unwrap().is_empty());
  }
}

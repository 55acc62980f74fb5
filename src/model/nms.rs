// 该文件是 Logistik 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use std::cmp::Ordering;

use tracing::debug;

use super::Candidate;

/// 排序键：置信度降序，相同置信度时按边界框和类别升序，保证结果与输入顺序无关
fn ranking(a: &Candidate, b: &Candidate) -> Ordering {
  b.confidence
    .total_cmp(&a.confidence)
    .then_with(|| a.bbox.cmp(&b.bbox))
    .then_with(|| a.class_id.cmp(&b.class_id))
}

/// 贪心非极大值抑制（不区分类别）
///
/// 先丢弃置信度不高于 `score_threshold` 的候选框，然后按置信度从高到低依次选择，
/// 与任一已保留框的 IoU 超过 `overlap_threshold` 的候选框被抑制。
/// 返回被保留候选框在输入中的下标，按选择顺序排列。
pub fn suppress(candidates: &[Candidate], score_threshold: f32, overlap_threshold: f32) -> Vec<usize> {
  let mut order: Vec<usize> = (0..candidates.len())
    .filter(|&idx| candidates[idx].confidence > score_threshold)
    .collect();
  order.sort_by(|&a, &b| ranking(&candidates[a], &candidates[b]).then(a.cmp(&b)));

  let mut kept: Vec<usize> = Vec::new();
  for idx in order {
    let candidate = &candidates[idx];
    let overlapped = kept
      .iter()
      .any(|&k| candidates[k].bbox.iou(&candidate.bbox) > overlap_threshold);
    if !overlapped {
      kept.push(idx);
    }
  }

  debug!(
    "NMS: {} 个候选框，保留 {} 个 (IoU 阈值 {})",
    candidates.len(),
    kept.len(),
    overlap_threshold
  );

  kept
}

// 该文件是 Logistik 项目的一部分。
// src/model.rs - 检测模型
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

use image::RgbImage;
use thiserror::Error;

/// 行首的几何与 objectness 字段数量: cx, cy, w, h, objectness
pub const ROW_HEADER_LEN: usize = 5;

/// 目标检测器
///
/// 检测器本身是外部组件：输入一张图像，输出每个候选区域的原始行数据。
/// 对同一张图像，检测器应当给出相同的结果。
pub trait Detector {
  type Error: std::error::Error + Send + Sync + 'static;

  fn infer(&self, image: &RgbImage) -> Result<Vec<DetectionRow>, Self::Error>;
}

impl<D: Detector + ?Sized> Detector for &D {
  type Error = D::Error;

  fn infer(&self, image: &RgbImage) -> Result<Vec<DetectionRow>, Self::Error> {
    (**self).infer(image)
  }
}

#[derive(Error, Debug, PartialEq)]
pub enum ModelError {
  #[error("检测行长度不足: 期望至少 {expected} 个值, 实际 {actual} 个")]
  RowTooShort { expected: usize, actual: usize },
  #[error("检测行包含非有限数值: 第 {0} 个值")]
  NonFiniteValue(usize),
  #[error("检测行类别数量不一致: 期望 {expected}, 实际 {actual}")]
  InconsistentClassCount { expected: usize, actual: usize },
}

/// 检测器输出的一行: `[cx, cy, w, h, objectness, score_1..score_K]`，
/// 坐标为相对图像尺寸的归一化值
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRow {
  values: Box<[f32]>,
}

impl DetectionRow {
  pub fn new(values: Vec<f32>) -> Result<Self, ModelError> {
    if values.len() <= ROW_HEADER_LEN {
      return Err(ModelError::RowTooShort {
        expected: ROW_HEADER_LEN + 1,
        actual: values.len(),
      });
    }

    if let Some(idx) = values.iter().position(|v| !v.is_finite()) {
      return Err(ModelError::NonFiniteValue(idx));
    }

    Ok(Self {
      values: values.into_boxed_slice(),
    })
  }

  /// 以几何、objectness 与类别分数构造一行
  pub fn from_parts(geometry: [f32; 4], objectness: f32, scores: &[f32]) -> Result<Self, ModelError> {
    let mut values = Vec::with_capacity(ROW_HEADER_LEN + scores.len());
    values.extend_from_slice(&geometry);
    values.push(objectness);
    values.extend_from_slice(scores);
    Self::new(values)
  }

  /// `[cx, cy, w, h]`
  pub fn geometry(&self) -> [f32; 4] {
    [self.values[0], self.values[1], self.values[2], self.values[3]]
  }

  pub fn scores(&self) -> &[f32] {
    &self.values[ROW_HEADER_LEN..]
  }

  pub fn class_count(&self) -> usize {
    self.values.len() - ROW_HEADER_LEN
  }
}

/// 像素坐标下的边界框，`(x, y)` 为左上角
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BoxRect {
  pub x: i32,
  pub y: i32,
  pub width: i32,
  pub height: i32,
}

impl BoxRect {
  pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  pub fn area(&self) -> i64 {
    self.width.max(0) as i64 * self.height.max(0) as i64
  }

  /// 交并比
  pub fn iou(&self, other: &BoxRect) -> f32 {
    let x1 = self.x.max(other.x) as i64;
    let y1 = self.y.max(other.y) as i64;
    let x2 = (self.x as i64 + self.width as i64).min(other.x as i64 + other.width as i64);
    let y2 = (self.y as i64 + self.height as i64).min(other.y as i64 + other.height as i64);

    let intersection = (x2 - x1).max(0) * (y2 - y1).max(0);
    let union = self.area() + other.area() - intersection;

    if union > 0 {
      intersection as f32 / union as f32
    } else {
      0.0
    }
  }
}

/// 解码并通过置信度阈值的候选框
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
  pub bbox: BoxRect,
  pub confidence: f32,
  pub class_id: usize,
}

mod decode;
mod nms;
pub use self::decode::decode_rows;
pub use self::nms::suppress;

#[cfg(feature = "exec_detector")]
mod exec;
#[cfg(feature = "exec_detector")]
pub use self::exec::{ExecDetector, ExecDetectorError};

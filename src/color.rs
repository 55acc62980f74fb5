// 该文件是 Logistik 项目的一部分。
// src/color.rs - 颜色范围与 HSV 掩码
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

use std::sync::LazyLock;

use image::{ImageBuffer, Rgb, RgbImage};

/// HSV 图像，三个通道依次为 H ∈ [0, 180)、S ∈ [0, 255]、V ∈ [0, 255]
pub type HsvImage = ImageBuffer<Rgb<u8>, Vec<u8>>;

/// 一个命名的 HSV 颜色范围，上下界均包含
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorRange {
  pub name: String,
  pub lower: [u8; 3],
  pub upper: [u8; 3],
}

impl ColorRange {
  pub fn new(name: impl Into<String>, lower: [u8; 3], upper: [u8; 3]) -> Self {
    Self {
      name: name.into(),
      lower,
      upper,
    }
  }

  pub fn contains(&self, hsv: &Rgb<u8>) -> bool {
    (0..3).all(|c| self.lower[c] <= hsv[c] && hsv[c] <= self.upper[c])
  }
}

/// 有序的颜色目录，颜色识别按此顺序逐一验证
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorCatalog {
  ranges: Box<[ColorRange]>,
}

impl ColorCatalog {
  pub fn new(ranges: impl IntoIterator<Item = ColorRange>) -> Self {
    Self {
      ranges: ranges.into_iter().collect(),
    }
  }

  pub fn iter(&self) -> impl Iterator<Item = &ColorRange> {
    self.ranges.iter()
  }

  pub fn len(&self) -> usize {
    self.ranges.len()
  }

  pub fn is_empty(&self) -> bool {
    self.ranges.is_empty()
  }
}

impl Default for ColorCatalog {
  /// 红、黄、绿、蓝、黑
  fn default() -> Self {
    Self::new([
      ColorRange::new("red", [3, 30, 30], [8, 250, 250]),
      ColorRange::new("yellow", [25, 30, 30], [30, 250, 250]),
      ColorRange::new("green", [35, 40, 40], [85, 255, 255]),
      ColorRange::new("blue", [100, 40, 40], [125, 255, 255]),
      ColorRange::new("black", [0, 0, 0], [180, 255, 50]),
    ])
  }
}

const HSV_SHIFT: u32 = 12;
const HSV_ROUND: i32 = 1 << (HSV_SHIFT - 1);

/// 定点除法表：`sdiv[v] = round(255 << 12 / v)`，`hdiv[d] = round((180 << 12) / 6d)`
static DIV_TABLES: LazyLock<([i32; 256], [i32; 256])> = LazyLock::new(|| {
  let mut sdiv = [0i32; 256];
  let mut hdiv = [0i32; 256];
  for i in 1..256 {
    sdiv[i] = ((255 << HSV_SHIFT) as f64 / i as f64).round_ties_even() as i32;
    hdiv[i] = ((180 << HSV_SHIFT) as f64 / (6.0 * i as f64)).round_ties_even() as i32;
  }
  (sdiv, hdiv)
});

/// 8 位 RGB 转 HSV，使用定点查表运算，色相取值 [0, 180)
fn rgb_to_hsv(pixel: &Rgb<u8>) -> Rgb<u8> {
  let (sdiv, hdiv) = &*DIV_TABLES;
  let [r, g, b] = pixel.0.map(i32::from);
  let v = r.max(g).max(b);
  let diff = v - r.min(g).min(b);

  let s = (diff * sdiv[v as usize] + HSV_ROUND) >> HSV_SHIFT;

  let h = if v == r {
    g - b
  } else if v == g {
    b - r + 2 * diff
  } else {
    r - g + 4 * diff
  };
  let h = (h * hdiv[diff as usize] + HSV_ROUND) >> HSV_SHIFT;
  let h = if h < 0 { h + 180 } else { h };

  Rgb([h as u8, s as u8, v as u8])
}

/// RGB 转 8 位 HSV
pub fn to_hsv(image: &RgbImage) -> HsvImage {
  ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
    rgb_to_hsv(image.get_pixel(x, y))
  })
}

/// 保留 HSV 值落在范围内的像素，其余像素置零
pub fn apply_mask(image: &RgbImage, hsv: &HsvImage, range: &ColorRange) -> RgbImage {
  ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
    if range.contains(hsv.get_pixel(x, y)) {
      *image.get_pixel(x, y)
    } else {
      Rgb([0, 0, 0])
    }
  })
}

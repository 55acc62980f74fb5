// 该文件是 Logistik 项目的一部分。
// src/classify.rs - 物体分类与颜色识别流程
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

use std::borrow::Cow;
use std::fmt;

use image::RgbImage;
use imageproc::filter::separable_filter_equal;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  color::{ColorCatalog, apply_mask, to_hsv},
  label::{ClassCatalog, ObjectType},
  model::{Candidate, Detector, ModelError, decode_rows, suppress},
};

#[derive(Error, Debug)]
pub enum ClassifyError {
  #[error("检测器错误: {0}")]
  Detector(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("检测结果格式错误: {0}")]
  Model(#[from] ModelError),
  #[error("类别索引 {class_id} 超出类别表范围 ({len})")]
  ClassOutOfRange { class_id: usize, len: usize },
  #[error("模糊核大小必须为正奇数: {0}")]
  InvalidBlurKernel(u32),
  #[error("模糊标准差无效: {0}")]
  InvalidBlurSigma(f32),
}

/// 分类流程参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyConfig {
  /// 物体类型识别的置信度阈值
  pub type_confidence: f32,
  /// 颜色验证的置信度阈值
  pub color_confidence: f32,
  /// NMS 的 IoU 阈值为 `置信度阈值 - overlap_offset`
  pub overlap_offset: f32,
  /// 重试时高斯模糊的核大小（奇数）
  pub blur_kernel: u32,
  /// 重试时高斯模糊的标准差
  pub blur_sigma: f32,
}

impl Default for PolicyConfig {
  fn default() -> Self {
    Self {
      type_confidence: 0.3,
      color_confidence: 0.2,
      overlap_offset: 0.1,
      blur_kernel: 5,
      blur_sigma: 4.0,
    }
  }
}

impl PolicyConfig {
  /// 检查模糊参数，标准差不大于 0 时由核大小推算
  pub fn validate(&self) -> Result<(), ClassifyError> {
    if self.blur_kernel % 2 == 0 {
      return Err(ClassifyError::InvalidBlurKernel(self.blur_kernel));
    }
    if !self.blur_sigma.is_finite() {
      return Err(ClassifyError::InvalidBlurSigma(self.blur_sigma));
    }
    Ok(())
  }
}

/// 单张图像的最终分类结果，只有瓶子和杯子带颜色
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
  Bottle(Option<String>),
  Cup(Option<String>),
  Cat,
  Cow,
  Dog,
  Other(String),
  Unknown,
}

impl Classification {
  pub fn object_type(&self) -> ObjectType {
    match self {
      Classification::Bottle(_) => ObjectType::Bottle,
      Classification::Cup(_) => ObjectType::Cup,
      Classification::Cat => ObjectType::Cat,
      Classification::Cow => ObjectType::Cow,
      Classification::Dog => ObjectType::Dog,
      Classification::Other(name) => ObjectType::Other(name.clone()),
      Classification::Unknown => ObjectType::Unknown,
    }
  }

  pub fn color(&self) -> Option<&str> {
    match self {
      Classification::Bottle(color) | Classification::Cup(color) => color.as_deref(),
      _ => None,
    }
  }
}

impl fmt::Display for Classification {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Classification::Bottle(Some(color)) | Classification::Cup(Some(color)) => {
        write!(f, "{} ({})", self.object_type(), color)
      }
      Classification::Bottle(None) | Classification::Cup(None) => {
        write!(f, "{} (颜色未知)", self.object_type())
      }
      other => write!(f, "{}", other.object_type()),
    }
  }
}

/// 一维高斯核，权重归一化；`sigma <= 0` 时按 `0.3 * ((size - 1) / 2 - 1) + 0.8` 推算
fn gaussian_kernel(size: u32, sigma: f32) -> Vec<f32> {
  let center = (size / 2) as f32;
  let sigma = if sigma > 0.0 {
    sigma
  } else {
    0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8
  };
  let weights: Vec<f32> = (0..size)
    .map(|i| {
      let d = i as f32 - center;
      (-(d * d) / (2.0 * sigma * sigma)).exp()
    })
    .collect();
  let sum: f32 = weights.iter().sum();
  weights.into_iter().map(|w| w / sum).collect()
}

/// 固定尺寸高斯模糊，核大小须为正奇数
pub fn blur(image: &RgbImage, kernel: u32, sigma: f32) -> Result<RgbImage, ClassifyError> {
  PolicyConfig {
    blur_kernel: kernel,
    blur_sigma: sigma,
    ..PolicyConfig::default()
  }
  .validate()?;
  let kernel = gaussian_kernel(kernel, sigma);
  Ok(separable_filter_equal(image, kernel.as_slice()))
}

/// 物体分类流程
///
/// 持有检测器、类别表、颜色目录和参数，对单张图像给出分类结果。
pub struct Pipeline<D> {
  detector: D,
  classes: ClassCatalog,
  colors: ColorCatalog,
  config: PolicyConfig,
}

impl<D: Detector> Pipeline<D> {
  pub fn new(detector: D, classes: ClassCatalog) -> Self {
    Self {
      detector,
      classes,
      colors: ColorCatalog::default(),
      config: PolicyConfig::default(),
    }
  }

  pub fn with_colors(mut self, colors: ColorCatalog) -> Self {
    self.colors = colors;
    self
  }

  pub fn with_config(mut self, config: PolicyConfig) -> Result<Self, ClassifyError> {
    config.validate()?;
    self.config = config;
    Ok(self)
  }

  pub fn detector(&self) -> &D {
    &self.detector
  }

  /// 一次完整的检测：推理、解码、NMS，返回保留下来的候选框
  pub fn detect(&self, image: &RgbImage, confidence: f32) -> Result<Vec<Candidate>, ClassifyError> {
    let rows = self
      .detector
      .infer(image)
      .map_err(|e| ClassifyError::Detector(Box::new(e)))?;

    let candidates = decode_rows(&rows, image.width(), image.height(), confidence)?;
    if let Some(bad) = candidates.iter().find(|c| c.class_id >= self.classes.len()) {
      return Err(ClassifyError::ClassOutOfRange {
        class_id: bad.class_id,
        len: self.classes.len(),
      });
    }

    let kept = suppress(
      &candidates,
      confidence,
      confidence - self.config.overlap_offset,
    );
    Ok(kept.into_iter().map(|idx| candidates[idx].clone()).collect())
  }

  /// 单次识别：恰好保留一个候选框时取其类别，否则为未知
  fn recognize(&self, image: &RgbImage) -> Result<ObjectType, ClassifyError> {
    let survivors = self.detect(image, self.config.type_confidence)?;
    match survivors.as_slice() {
      [only] => self
        .classes
        .object_type(only.class_id)
        .ok_or(ClassifyError::ClassOutOfRange {
          class_id: only.class_id,
          len: self.classes.len(),
        }),
      _ => {
        debug!("识别结果不唯一: {} 个候选框", survivors.len());
        Ok(ObjectType::Unknown)
      }
    }
  }

  /// 识别物体类型
  ///
  /// 若首次识别不是瓶子或杯子，对图像做一次模糊后再识别一次，并以第二次结果为准。
  /// 返回最终类型及产生该结果的图像（原图或模糊后的图像）。
  pub fn classify<'i>(
    &self,
    image: &'i RgbImage,
  ) -> Result<(ObjectType, Cow<'i, RgbImage>), ClassifyError> {
    let object_type = self.recognize(image)?;
    if object_type.is_stock_item() {
      return Ok((object_type, Cow::Borrowed(image)));
    }

    debug!("首次识别为 {}，模糊后重试", object_type);
    let blurred = blur(image, self.config.blur_kernel, self.config.blur_sigma)?;
    let object_type = self.recognize(&blurred)?;
    Ok((object_type, Cow::Owned(blurred)))
  }

  /// 颜色识别
  ///
  /// 按颜色目录顺序，对每个颜色范围生成掩码图像并重新检测，
  /// 恰好检测到一个物体即认为该颜色匹配。遍历不会提前结束，
  /// 多个颜色匹配时以目录中最后一个匹配的颜色为准。
  pub fn probe_color(&self, image: &RgbImage) -> Result<Option<String>, ClassifyError> {
    let hsv = to_hsv(image);
    let mut color = None;

    for range in self.colors.iter() {
      let masked = apply_mask(image, &hsv, range);
      let survivors = self.detect(&masked, self.config.color_confidence)?;
      if survivors.len() == 1 {
        debug!("颜色 {} 验证通过", range.name);
        color = Some(range.name.clone());
      }
    }

    Ok(color)
  }

  /// 完整处理一张图像
  pub fn process(&self, image: &RgbImage) -> Result<Classification, ClassifyError> {
    let (object_type, used) = self.classify(image)?;

    let classification = match object_type {
      ObjectType::Bottle => Classification::Bottle(self.probe_color(&used)?),
      ObjectType::Cup => Classification::Cup(self.probe_color(&used)?),
      ObjectType::Cat => Classification::Cat,
      ObjectType::Cow => Classification::Cow,
      ObjectType::Dog => Classification::Dog,
      ObjectType::Other(name) => Classification::Other(name),
      ObjectType::Unknown => Classification::Unknown,
    };

    match &classification {
      Classification::Bottle(Some(color)) | Classification::Cup(Some(color)) => {
        info!("识别为 {}，颜色 {}", classification.object_type(), color)
      }
      Classification::Bottle(None) | Classification::Cup(None) => {
        warn!("识别为 {}，但无法确定颜色", classification.object_type())
      }
      Classification::Cat => warn!("传送带上出现了猫，请操作员处理"),
      Classification::Cow | Classification::Dog => {
        info!("识别为 {}", classification.object_type())
      }
      Classification::Other(name) => info!("识别为其他物体: {}", name),
      Classification::Unknown => info!("无法识别该物体"),
    }

    Ok(classification)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::color::ColorRange;
  use crate::model::DetectionRow;
  use image::Rgb;
  use std::cell::Cell;
  use std::convert::Infallible;

  const BOTTLE: usize = 39;
  const CUP: usize = 41;
  const DOG: usize = 16;

  fn row(geometry: [f32; 4], class_id: usize, score: f32) -> DetectionRow {
    let mut scores = vec![0.0; 80];
    scores[class_id] = score;
    DetectionRow::from_parts(geometry, 1.0, &scores).unwrap()
  }

  /// 按调用次序依次返回预设结果，并记录调用次数
  struct Scripted {
    responses: Vec<Vec<DetectionRow>>,
    calls: Cell<usize>,
  }

  impl Scripted {
    fn new(responses: Vec<Vec<DetectionRow>>) -> Self {
      Self {
        responses,
        calls: Cell::new(0),
      }
    }
  }

  impl Detector for Scripted {
    type Error = Infallible;

    fn infer(&self, _image: &RgbImage) -> Result<Vec<DetectionRow>, Self::Error> {
      let call = self.calls.get();
      self.calls.set(call + 1);
      Ok(self.responses.get(call).cloned().unwrap_or_default())
    }
  }

  /// 图像中存在满足条件的像素时返回一个候选框
  struct PixelKeyed<F: Fn(&Rgb<u8>) -> bool> {
    matches: F,
    class_id: usize,
  }

  impl<F: Fn(&Rgb<u8>) -> bool> Detector for PixelKeyed<F> {
    type Error = Infallible;

    fn infer(&self, image: &RgbImage) -> Result<Vec<DetectionRow>, Self::Error> {
      if image.pixels().any(|p| (self.matches)(p)) {
        Ok(vec![row([0.5, 0.5, 0.5, 0.5], self.class_id, 0.9)])
      } else {
        Ok(Vec::new())
      }
    }
  }

  fn solid(color: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(16, 16, Rgb(color))
  }

  fn pipeline<D: Detector>(detector: D) -> Pipeline<D> {
    Pipeline::new(detector, ClassCatalog::coco())
  }

  #[test]
  fn single_candidate_is_accepted_without_retry() {
    let p = pipeline(Scripted::new(vec![vec![row(
      [0.5, 0.5, 0.2, 0.2],
      CUP,
      0.8,
    )]]));
    let image = solid([10, 10, 10]);
    let (object_type, used) = p.classify(&image).unwrap();
    assert_eq!(object_type, ObjectType::Cup);
    assert!(matches!(used, Cow::Borrowed(_)));
    assert_eq!(p.detector().calls.get(), 1);
  }

  #[test]
  fn ambiguous_result_retries_exactly_once() {
    // 置信度相同、重叠较小的两个框都会保留，结果不唯一
    let ambiguous = vec![
      row([0.3125, 0.5, 0.625, 0.625], DOG, 0.8),
      row([0.8125, 0.5, 0.625, 0.625], DOG, 0.8),
    ];
    let p = pipeline(Scripted::new(vec![
      ambiguous.clone(),
      ambiguous.clone(),
      ambiguous,
    ]));
    let image = solid([200, 0, 0]);
    let (object_type, used) = p.classify(&image).unwrap();
    assert_eq!(object_type, ObjectType::Unknown);
    assert!(matches!(used, Cow::Owned(_)));
    assert_eq!(p.detector().calls.get(), 2);
  }

  #[test]
  fn empty_result_retries_and_takes_retry_outcome() {
    let p = pipeline(Scripted::new(vec![
      Vec::new(),
      vec![row([0.5, 0.5, 0.2, 0.2], BOTTLE, 0.6)],
    ]));
    let image = solid([0, 0, 200]);
    let (object_type, used) = p.classify(&image).unwrap();
    assert_eq!(object_type, ObjectType::Bottle);
    assert!(matches!(used, Cow::Owned(_)));
    assert_eq!(p.detector().calls.get(), 2);
  }

  #[test]
  fn non_stock_result_is_replaced_by_retry() {
    let p = pipeline(Scripted::new(vec![
      vec![row([0.5, 0.5, 0.2, 0.2], DOG, 0.9)],
      Vec::new(),
    ]));
    let (object_type, _) = p.classify(&solid([0, 0, 0])).unwrap();
    assert_eq!(object_type, ObjectType::Unknown);
  }

  #[test]
  fn type_detection_uses_type_threshold() {
    // 0.25 低于 0.3，不会被识别
    let p = pipeline(Scripted::new(vec![
      vec![row([0.5, 0.5, 0.2, 0.2], BOTTLE, 0.25)],
      vec![row([0.5, 0.5, 0.2, 0.2], BOTTLE, 0.25)],
    ]));
    let (object_type, _) = p.classify(&solid([0, 0, 0])).unwrap();
    assert_eq!(object_type, ObjectType::Unknown);
  }

  #[test]
  fn class_index_outside_catalog_is_fatal() {
    let detector = Scripted::new(vec![vec![
      DetectionRow::from_parts([0.5, 0.5, 0.2, 0.2], 1.0, &[0.0, 0.0, 0.9]).unwrap(),
    ]]);
    let p = Pipeline::new(detector, ClassCatalog::new(["bottle", "cup"]));
    let err = p.classify(&solid([0, 0, 0])).unwrap_err();
    assert!(matches!(
      err,
      ClassifyError::ClassOutOfRange {
        class_id: 2,
        len: 2
      }
    ));
  }

  #[test]
  fn color_probe_returns_last_matching_color() {
    // 左半绿色、右半蓝色：绿和蓝两个掩码都能检测到物体
    let mut image = solid([0, 200, 0]);
    for x in 8..16 {
      for y in 0..16 {
        image.put_pixel(x, y, Rgb([0, 0, 200]));
      }
    }
    let p = pipeline(PixelKeyed {
      matches: |p: &Rgb<u8>| p.0 != [0, 0, 0],
      class_id: BOTTLE,
    });
    assert_eq!(p.probe_color(&image).unwrap().as_deref(), Some("blue"));
  }

  #[test]
  fn color_probe_prefers_black_when_every_range_matches() {
    let p = pipeline(Scripted::new(
      (0..5)
        .map(|_| vec![row([0.5, 0.5, 0.2, 0.2], BOTTLE, 0.5)])
        .collect(),
    ));
    assert_eq!(
      p.probe_color(&solid([0, 200, 0])).unwrap().as_deref(),
      Some("black")
    );
    assert_eq!(p.detector().calls.get(), 5);
  }

  #[test]
  fn color_probe_uses_color_threshold() {
    // 0.25 高于颜色阈值 0.2，但低于类型阈值 0.3
    let p = pipeline(Scripted::new(vec![
      Vec::new(),
      Vec::new(),
      vec![row([0.5, 0.5, 0.2, 0.2], BOTTLE, 0.25)],
    ]));
    assert_eq!(
      p.probe_color(&solid([0, 200, 0])).unwrap().as_deref(),
      Some("green")
    );
  }

  #[test]
  fn color_probe_uses_injected_catalog() {
    // 只有两个颜色的目录：灰色物体只能匹配自定义的 "gray"
    let colors = ColorCatalog::new([
      ColorRange::new("gray", [0, 0, 100], [180, 30, 200]),
      ColorRange::new("green", [35, 40, 40], [85, 255, 255]),
    ]);
    let p = pipeline(PixelKeyed {
      matches: |p: &Rgb<u8>| p.0 != [0, 0, 0],
      class_id: CUP,
    })
    .with_colors(colors);
    assert_eq!(
      p.probe_color(&solid([150, 150, 150])).unwrap().as_deref(),
      Some("gray")
    );
    assert_eq!(
      p.process(&solid([150, 150, 150])).unwrap(),
      Classification::Cup(Some("gray".to_string()))
    );
  }

  #[test]
  fn color_probe_without_match_is_none() {
    let p = pipeline(Scripted::new(Vec::new()));
    assert_eq!(p.probe_color(&solid([0, 200, 0])).unwrap(), None);
  }

  #[test]
  fn process_assigns_color_to_bottle() {
    let p = pipeline(PixelKeyed {
      matches: |p: &Rgb<u8>| p[1] > 150 && p[0] < 50 && p[2] < 50,
      class_id: BOTTLE,
    });
    let result = p.process(&solid([0, 200, 0])).unwrap();
    assert_eq!(result, Classification::Bottle(Some("green".to_string())));
    assert_eq!(result.color(), Some("green"));
  }

  #[test]
  fn process_leaves_animals_without_color() {
    let p = pipeline(PixelKeyed {
      matches: |_: &Rgb<u8>| true,
      class_id: 15,
    });
    let result = p.process(&solid([90, 90, 90])).unwrap();
    assert_eq!(result, Classification::Cat);
    assert_eq!(result.color(), None);
  }

  #[test]
  fn gaussian_kernel_is_normalized_and_symmetric() {
    let kernel = gaussian_kernel(5, 4.0);
    assert_eq!(kernel.len(), 5);
    assert!((kernel.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    assert!((kernel[0] - kernel[4]).abs() < 1e-6);
    assert!(kernel[2] > kernel[1]);
  }

  #[test]
  fn zero_sigma_is_derived_from_kernel_size() {
    let kernel = gaussian_kernel(5, 0.0);
    assert!(kernel.iter().all(|w| w.is_finite()));
    assert!((kernel.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    // 5x5 时推算出的标准差为 1.1
    let reference = gaussian_kernel(5, 1.1);
    for (a, b) in kernel.iter().zip(&reference) {
      assert!((a - b).abs() < 1e-6);
    }
    let blurred = blur(&solid([120, 60, 30]), 5, 0.0).unwrap();
    let center = blurred.get_pixel(8, 8);
    assert!((center[0] as i32 - 120).abs() <= 1);
  }

  #[test]
  fn invalid_blur_parameters_are_rejected() {
    let image = solid([10, 10, 10]);
    assert!(matches!(
      blur(&image, 4, 4.0),
      Err(ClassifyError::InvalidBlurKernel(4))
    ));
    assert!(matches!(
      blur(&image, 0, 4.0),
      Err(ClassifyError::InvalidBlurKernel(0))
    ));
    assert!(matches!(
      blur(&image, 5, f32::NAN),
      Err(ClassifyError::InvalidBlurSigma(_))
    ));

    let config = PolicyConfig {
      blur_kernel: 6,
      ..PolicyConfig::default()
    };
    assert!(
      Pipeline::new(Scripted::new(Vec::new()), ClassCatalog::coco())
        .with_config(config)
        .is_err()
    );
  }

  #[test]
  fn blur_keeps_flat_image_flat() {
    let image = solid([120, 60, 30]);
    let blurred = blur(&image, 5, 4.0).unwrap();
    assert_eq!(blurred.dimensions(), image.dimensions());
    for p in blurred.pixels() {
      for c in 0..3 {
        assert!((p[c] as i32 - image.get_pixel(0, 0)[c] as i32).abs() <= 1);
      }
    }
  }
}

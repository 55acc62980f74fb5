// 该文件是 Logistik 项目的一部分。
// src/label.rs - 类别目录与物体类型
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

use std::fmt;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("类别文件缺失: {path}: {source}")]
  CatalogMissing {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("类别文件为空: {0}")]
  CatalogEmpty(String),
}

/// 检测器的类别名称表，下标即检测器输出的类别索引
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassCatalog {
  names: Box<[String]>,
}

impl ClassCatalog {
  pub fn new<I, S>(names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      names: names.into_iter().map(Into::into).collect(),
    }
  }

  /// 内置的 80 类 COCO 类别表
  pub fn coco() -> Self {
    Self::new(COCO_CLASSES)
  }

  /// 从 `coco.names` 风格的文件加载，每行一个类别名
  pub fn from_names_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::CatalogMissing {
      path: path.display().to_string(),
      source,
    })?;

    let catalog = Self::parse(&text);
    if catalog.is_empty() {
      return Err(ConfigError::CatalogEmpty(path.display().to_string()));
    }

    info!("加载类别文件: {}，共 {} 个类别", path.display(), catalog.len());
    Ok(catalog)
  }

  fn parse(text: &str) -> Self {
    // 只去掉整体首尾空白，中间空行保留占位以维持下标
    let names: Vec<&str> = text.trim().split('\n').map(str::trim).collect();
    if names.len() == 1 && names[0].is_empty() {
      return Self::new(Vec::<String>::new());
    }
    debug!("类别文件解析完成: {} 行", names.len());
    Self::new(names)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn get(&self, class_id: usize) -> Option<&str> {
    self.names.get(class_id).map(String::as_str)
  }

  pub fn object_type(&self, class_id: usize) -> Option<ObjectType> {
    self.get(class_id).map(ObjectType::from_label)
  }
}

/// 物体类型
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectType {
  Bottle,
  Cup,
  Cat,
  Cow,
  Dog,
  /// 类别表中的其他已知类别
  Other(String),
  /// 没有检测到物体，或检测结果不唯一
  Unknown,
}

impl ObjectType {
  pub fn from_label(label: &str) -> Self {
    match label {
      "bottle" => ObjectType::Bottle,
      "cup" => ObjectType::Cup,
      "cat" => ObjectType::Cat,
      "cow" => ObjectType::Cow,
      "dog" => ObjectType::Dog,
      other => ObjectType::Other(other.to_string()),
    }
  }

  /// 是否需要进行颜色识别（瓶子与杯子）
  pub fn is_stock_item(&self) -> bool {
    matches!(self, ObjectType::Bottle | ObjectType::Cup)
  }
}

impl fmt::Display for ObjectType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ObjectType::Bottle => f.write_str("bottle"),
      ObjectType::Cup => f.write_str("cup"),
      ObjectType::Cat => f.write_str("cat"),
      ObjectType::Cow => f.write_str("cow"),
      ObjectType::Dog => f.write_str("dog"),
      ObjectType::Other(name) => f.write_str(name),
      ObjectType::Unknown => f.write_str("unknown"),
    }
  }
}

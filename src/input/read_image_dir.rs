// 该文件是 Logistik 项目的一部分。
// src/input/read_image_dir.rs - 图像目录输入
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::{ImageItem, LoadedImage, read_image_file::load_image},
};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum ImageDirInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像目录不存在: {0}")]
  SourceMissing(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

fn is_image_file(path: &Path) -> bool {
  path.is_file()
    && path
      .extension()
      .and_then(|ext| ext.to_str())
      .map(|ext| {
        IMAGE_EXTENSIONS
          .iter()
          .any(|known| known.eq_ignore_ascii_case(ext))
      })
      .unwrap_or(false)
}

/// 图像目录，按文件名顺序逐张读取
///
/// 地址格式: `folder:///path/to/batch`
pub struct ImageDirInput {
  files: std::vec::IntoIter<PathBuf>,
}

impl FromUrlWithScheme for ImageDirInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for ImageDirInput {
  type Error = ImageDirInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageDirInputError::SchemeMismatch);
    }
    Self::open(url.path())
  }
}

impl ImageDirInput {
  pub fn open(directory: impl AsRef<Path>) -> Result<Self, ImageDirInputError> {
    let directory = directory.as_ref();
    if !directory.is_dir() {
      error!("图像目录不存在: {}", directory.display());
      return Err(ImageDirInputError::SourceMissing(
        directory.display().to_string(),
      ));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)? {
      let path = entry?.path();
      if is_image_file(&path) {
        files.push(path);
      } else {
        debug!("跳过非图像文件: {}", path.display());
      }
    }
    files.sort();

    info!("图像目录 {} 中共有 {} 个图像文件", directory.display(), files.len());

    Ok(ImageDirInput {
      files: files.into_iter(),
    })
  }

  /// 尚未读取的文件数量
  pub fn remaining(&self) -> usize {
    self.files.len()
  }
}

impl Iterator for ImageDirInput {
  type Item = ImageItem;

  fn next(&mut self) -> Option<Self::Item> {
    let path = self.files.next()?;
    Some(load_image(&path).map(|image| LoadedImage { path, image }))
  }
}

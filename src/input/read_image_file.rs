// 该文件是 Logistik 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::{ImageItem, LoadedImage},
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {path}: {source}")]
  IoError {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("Image loading error: {path}: {source}")]
  ImageLoadError {
    path: PathBuf,
    #[source]
    source: image::ImageError,
  },
}

/// 读取并解码一张图像，格式按文件内容识别
pub(crate) fn load_image(path: &Path) -> Result<RgbImage, ImageFileInputError> {
  let io_error = |source| ImageFileInputError::IoError {
    path: path.to_path_buf(),
    source,
  };

  let image = ImageReader::open(path)
    .map_err(io_error)?
    .with_guessed_format()
    .map_err(io_error)?
    .decode()
    .map_err(|source| ImageFileInputError::ImageLoadError {
      path: path.to_path_buf(),
      source,
    })?;

  Ok(image.to_rgb8())
}

/// 单个图像文件
pub struct ImageFileInput {
  image: Option<LoadedImage>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let path = PathBuf::from(url.path());
    let image = load_image(&path)?;

    Ok(ImageFileInput {
      image: Some(LoadedImage { path, image }),
    })
  }
}

impl Iterator for ImageFileInput {
  type Item = ImageItem;

  fn next(&mut self) -> Option<Self::Item> {
    self.image.take().map(Ok)
  }
}

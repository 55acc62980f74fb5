// 该文件是 Logistik 项目的一部分。
// src/model/exec.rs - 外部进程检测器
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

use std::io::{Cursor, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use image::{ImageFormat, RgbImage};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectionRow, Detector, ModelError},
};

const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Error, Debug)]
pub enum ExecDetectorError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("检测程序不存在: {0}")]
  ExecutableMissing(String),
  #[error("无效的超时参数: {0}")]
  InvalidTimeout(String),
  #[error("图像编码错误: {0}")]
  EncodeError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("检测程序退出异常: {0}")]
  ProcessFailed(std::process::ExitStatus),
  #[error("检测程序超时: {0:?}")]
  Timeout(Duration),
  #[error("检测结果解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("检测结果格式错误: {0}")]
  MalformedRow(#[from] ModelError),
}

/// 通过外部程序运行检测模型
///
/// 每次推理启动一次程序：图像以 PNG 编码写入标准输入，
/// 程序在标准输出上返回 JSON 数组 `[[cx, cy, w, h, obj, s1, .., sK], ..]`。
/// 地址格式: `exec:///path/to/program?arg=--weights&arg=yolov3.weights&timeout_ms=30000`
#[derive(Debug, Clone)]
pub struct ExecDetector {
  program: PathBuf,
  args: Vec<String>,
  timeout: Duration,
}

impl FromUrlWithScheme for ExecDetector {
  const SCHEME: &'static str = "exec";
}

impl FromUrl for ExecDetector {
  type Error = ExecDetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ExecDetectorError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let program = PathBuf::from(url.path());
    if !program.is_file() {
      error!("检测程序不存在: {}", program.display());
      return Err(ExecDetectorError::ExecutableMissing(
        program.display().to_string(),
      ));
    }

    let mut args = Vec::new();
    let mut timeout = Duration::from_millis(DEFAULT_TIMEOUT_MS);
    for (k, v) in url.query_pairs() {
      match k.as_ref() {
        "arg" => args.push(v.into_owned()),
        "timeout_ms" => {
          let ms = v
            .parse::<u64>()
            .map_err(|_| ExecDetectorError::InvalidTimeout(v.to_string()))?;
          timeout = Duration::from_millis(ms);
        }
        _ => debug!("忽略未知参数: {}={}", k, v),
      }
    }

    info!(
      "使用外部检测程序: {} {:?}, 超时 {:?}",
      program.display(),
      args,
      timeout
    );

    Ok(ExecDetector {
      program,
      args,
      timeout,
    })
  }
}

impl ExecDetector {
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  fn encode(image: &RgbImage) -> Result<Vec<u8>, ExecDetectorError> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
  }

  fn terminate(&self, child: &mut Child) -> ExecDetectorError {
    error!("检测程序超时 ({:?})，终止进程", self.timeout);
    let _ = child.kill();
    let _ = child.wait();
    ExecDetectorError::Timeout(self.timeout)
  }

  fn parse(stdout: &[u8]) -> Result<Vec<DetectionRow>, ExecDetectorError> {
    let raw: Vec<Vec<f32>> = serde_json::from_slice(stdout)?;
    let rows = raw
      .into_iter()
      .map(DetectionRow::new)
      .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
  }
}

impl Detector for ExecDetector {
  type Error = ExecDetectorError;

  fn infer(&self, image: &RgbImage) -> Result<Vec<DetectionRow>, Self::Error> {
    let payload = Self::encode(image)?;

    let now = Instant::now();
    let mut child = Command::new(&self.program)
      .args(&self.args)
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::inherit())
      .spawn()?;

    // 写入与读取放在独立线程，避免管道缓冲区写满时互相阻塞
    let mut stdin = child
      .stdin
      .take()
      .ok_or_else(|| std::io::Error::other("无法获取检测程序标准输入"))?;
    let writer = thread::spawn(move || stdin.write_all(&payload));

    let mut stdout = child
      .stdout
      .take()
      .ok_or_else(|| std::io::Error::other("无法获取检测程序标准输出"))?;
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
      let mut buf = Vec::new();
      let result = stdout.read_to_end(&mut buf).map(|_| buf);
      let _ = tx.send(result);
    });

    let deadline = now + self.timeout;
    let output = match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
      Ok(output) => output?,
      Err(_) => return Err(self.terminate(&mut child)),
    };

    // 关闭标准输出后仍可能不退出，退出等待同样受超时限制
    let status = loop {
      if let Some(status) = child.try_wait()? {
        break status;
      }
      if Instant::now() >= deadline {
        return Err(self.terminate(&mut child));
      }
      thread::sleep(EXIT_POLL_INTERVAL);
    };

    match writer.join() {
      Ok(result) => result?,
      Err(_) => return Err(std::io::Error::other("标准输入写入线程异常退出").into()),
    }
    if !status.success() {
      return Err(ExecDetectorError::ProcessFailed(status));
    }

    let rows = Self::parse(&output)?;
    debug!("外部检测完成: {} 行，耗时 {:.2?}", rows.len(), now.elapsed());
    Ok(rows)
  }
}

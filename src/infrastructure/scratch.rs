//! 截图临时目录 - 基础设施层
//!
//! 操作过程中写入的截图只在本次运行内有效：启动时清空，清除或退出时删除。

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use tracing::debug;

use crate::error::FileError;

const QUESTION_IMAGE_NAME: &str = "question.png";
const CONTEXT_IMAGE_NAME: &str = "context.png";
const SUBJECTIVE_DIR_NAME: &str = "subjective";

/// 截图临时目录
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 清空残留文件并创建目录结构
    pub fn prepare(&self) -> Result<(), FileError> {
        self.remove_all()?;
        let subjective = self.subjective_dir();
        fs::create_dir_all(&subjective).map_err(|source| FileError::CreateDirFailed {
            path: subjective.display().to_string(),
            source,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn question_path(&self) -> PathBuf {
        self.root.join(QUESTION_IMAGE_NAME)
    }

    pub fn context_path(&self) -> PathBuf {
        self.root.join(CONTEXT_IMAGE_NAME)
    }

    pub fn subjective_dir(&self) -> PathBuf {
        self.root.join(SUBJECTIVE_DIR_NAME)
    }

    /// 第 `index` 张主观题截图（从 1 开始）
    pub fn subjective_path(&self, index: usize) -> PathBuf {
        self.subjective_dir().join(format!("{}.png", index))
    }

    pub fn save_png(&self, path: &Path, image: &RgbaImage) -> Result<(), FileError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| FileError::CreateDirFailed {
                path: parent.display().to_string(),
                source,
            })?;
        }
        image
            .save(path)
            .map_err(|e| FileError::write_failed(path.display().to_string(), e))?;
        debug!("截图已保存: {}", path.display());
        Ok(())
    }

    /// 删除单个文件，文件不存在视为成功
    pub fn remove_file(&self, path: &Path) -> Result<(), FileError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(FileError::DeleteFailed {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    /// 删除上下文与所有主观题截图，保留目录
    pub fn clear(&self) -> Result<(), FileError> {
        self.remove_file(&self.context_path())?;
        self.remove_file(&self.question_path())?;
        let dir = self.subjective_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(FileError::DeleteFailed {
                    path: dir.display().to_string(),
                    source,
                })
            }
        };
        for entry in entries.flatten() {
            self.remove_file(&entry.path())?;
        }
        Ok(())
    }

    /// 删除整个目录
    pub fn remove_all(&self) -> Result<(), FileError> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(FileError::DeleteFailed {
                path: self.root.display().to_string(),
                source,
            }),
        }
    }
}

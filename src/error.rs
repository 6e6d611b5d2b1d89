// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 面向用户的错误: 全部以消息框形式展示

use std::path::{Path, PathBuf};

use thiserror::Error;

/// 消息框级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Failed to load model:\n{message}")]
    ModelLoad { path: PathBuf, message: String },

    #[error("Detection failed:\n{0}")]
    Detection(String),

    #[error("Failed to save result:\n{message}")]
    Save { path: PathBuf, message: String },

    #[error("Failed to open video source!\n{0}")]
    MediaOpen(String),

    #[error("Failed to display image:\n{0}")]
    Display(String),

    #[error("Please load a model first!")]
    NoModel,

    #[error("Please select an image or video first!")]
    NoSource,

    #[error("No result to save!")]
    NoResult,

    #[error("No model to reload. Please load a model first.")]
    NothingToReload,

    #[error("Detection is running. Stop it first.")]
    Busy,
}

impl DetectorError {
    pub fn model_load(path: &Path, err: anyhow::Error) -> Self {
        Self::ModelLoad {
            path: path.to_path_buf(),
            message: format!("{:#}", err),
        }
    }

    pub fn detection(err: anyhow::Error) -> Self {
        Self::Detection(format!("{:#}", err))
    }

    pub fn save(path: &Path, err: anyhow::Error) -> Self {
        Self::Save {
            path: path.to_path_buf(),
            message: format!("{:#}", err),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::ModelLoad { .. }
            | Self::Detection(_)
            | Self::Save { .. }
            | Self::MediaOpen(_)
            | Self::Display(_) => Severity::Error,
            Self::NoModel | Self::NoSource | Self::NoResult | Self::Busy => Severity::Warning,
            Self::NothingToReload => Severity::Info,
        }
    }

    /// 消息框标题
    pub fn title(&self) -> &'static str {
        match self.severity() {
            Severity::Error => "Error",
            Severity::Warning => "Warning",
            Severity::Info => "Info",
        }
    }
}

//! 作业目录
//!
//! 一个目录下的每个 `.cmap` 文件是一个作业，文件名即作业名。

use crate::error::FileError;
use crate::native::{self, JobFile, JobMetadata};
use cadmap_core::model::MapModel;
use std::path::{Path, PathBuf};

/// 作业文件扩展名
pub const JOB_EXTENSION: &str = "cmap";

#[derive(Debug, Clone)]
pub struct JobDirectory {
    root: PathBuf,
}

impl JobDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{JOB_EXTENSION}"))
    }

    /// 创建空作业
    pub fn create_job(&self, name: &str) -> Result<JobFile, FileError> {
        validate_name(name)?;
        let path = self.path_of(name);
        if path.exists() {
            return Err(FileError::JobExists(name.to_string()));
        }
        std::fs::create_dir_all(&self.root)?;
        let job = JobFile::new(JobMetadata::new(name));
        native::save(&job, &path)?;
        Ok(job)
    }

    /// 读取作业文件
    pub fn open_job(&self, name: &str) -> Result<JobFile, FileError> {
        validate_name(name)?;
        let path = self.path_of(name);
        if !path.is_file() {
            return Err(FileError::JobNotFound(name.to_string()));
        }
        native::load(&path)
    }

    /// 把模型的编辑记录写回作业
    pub fn save_job(&self, metadata: &JobMetadata, model: &MapModel) -> Result<(), FileError> {
        validate_name(&metadata.name)?;
        let job = JobFile::from_model(metadata.clone(), model);
        native::save(&job, &self.path_of(&metadata.name))
    }

    /// 按名称排序的全部作业
    pub fn find_all_job_names(&self) -> Result<Vec<String>, FileError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(JOB_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

fn validate_name(name: &str) -> Result<(), FileError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', ':']);
    if invalid {
        return Err(FileError::InvalidFormat(format!("Invalid job name '{name}'")));
    }
    Ok(())
}

//! CadMap 作业文件格式（.cmap）
//!
//! 16 字节文件头之后是 zstd 压缩的 MessagePack 数据，内容为作业元数据和
//! 按序号排列的编辑记录。打开作业时记录经过前向引用解析后重放成模型。

use crate::error::FileError;
use cadmap_core::config::EngineConfig;
use cadmap_core::model::MapModel;
use cadmap_core::persist::{self, EditRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use uuid::Uuid;

/// 文件魔数 "CMAP"
const MAGIC: &[u8; 4] = b"CMAP";

/// 当前文件格式版本
const FORMAT_VERSION: u32 = 1;

/// Zstd 压缩级别
const COMPRESSION_LEVEL: i32 = 3;

/// 文件头（16 字节）
#[derive(Debug)]
struct FileHeader {
    magic: [u8; 4],
    version: u32,
    /// 标志位（预留）
    flags: u32,
    /// 压缩后数据长度
    compressed_size: u32,
}

impl FileHeader {
    fn new(compressed_size: u32) -> Self {
        Self {
            magic: *MAGIC,
            version: FORMAT_VERSION,
            flags: 0,
            compressed_size,
        }
    }

    fn write(&self, writer: &mut impl Write) -> Result<(), std::io::Error> {
        writer.write_all(&self.magic)?;
        writer.write_all(&self.version.to_le_bytes())?;
        writer.write_all(&self.flags.to_le_bytes())?;
        writer.write_all(&self.compressed_size.to_le_bytes())?;
        Ok(())
    }

    fn read(reader: &mut impl Read) -> Result<Self, FileError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;

        if &magic != MAGIC {
            return Err(FileError::InvalidFormat(
                "Invalid magic number, not a CMAP job file".to_string(),
            ));
        }

        let mut buf = [0u8; 4];

        reader.read_exact(&mut buf)?;
        let version = u32::from_le_bytes(buf);

        reader.read_exact(&mut buf)?;
        let flags = u32::from_le_bytes(buf);

        reader.read_exact(&mut buf)?;
        let compressed_size = u32::from_le_bytes(buf);

        Ok(Self {
            magic,
            version,
            flags,
            compressed_size,
        })
    }
}

/// 作业元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMetadata {
    pub id: Uuid,
    pub name: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl JobMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created: now,
            modified: now,
        }
    }
}

/// 作业文件内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFile {
    pub metadata: JobMetadata,
    pub records: Vec<EditRecord>,
}

impl JobFile {
    pub fn new(metadata: JobMetadata) -> Self {
        Self {
            metadata,
            records: Vec::new(),
        }
    }

    /// 从模型的操作链生成记录
    pub fn from_model(mut metadata: JobMetadata, model: &MapModel) -> Self {
        metadata.modified = Utc::now();
        Self {
            metadata,
            records: model.to_records(),
        }
    }

    /// 解析记录并重放成模型
    pub fn open(&self, config: &EngineConfig) -> Result<MapModel, FileError> {
        Ok(persist::load(&self.records, config)?)
    }
}

/// 保存作业文件
pub fn save(job: &JobFile, path: &Path) -> Result<(), FileError> {
    let msgpack_data = rmp_serde::to_vec(job)?;
    let compressed_data = zstd::encode_all(msgpack_data.as_slice(), COMPRESSION_LEVEL)?;

    let compressed_size = u32::try_from(compressed_data.len()).map_err(|_| {
        FileError::InvalidFormat(format!(
            "Job payload of {} bytes exceeds the format limit",
            compressed_data.len()
        ))
    })?;

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    FileHeader::new(compressed_size).write(&mut writer)?;
    writer.write_all(&compressed_data)?;
    writer.flush()?;

    tracing::info!(
        "Saved job '{}' with {} records to {} ({} bytes compressed)",
        job.metadata.name,
        job.records.len(),
        path.display(),
        compressed_data.len()
    );

    Ok(())
}

/// 读取作业文件，不重放
pub fn load(path: &Path) -> Result<JobFile, FileError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let header = FileHeader::read(&mut reader)?;

    if header.version > FORMAT_VERSION {
        return Err(FileError::UnsupportedVersion(format!(
            "File version {} is newer than supported version {}",
            header.version, FORMAT_VERSION
        )));
    }

    let mut compressed_data = vec![0u8; header.compressed_size as usize];
    reader.read_exact(&mut compressed_data)?;

    let msgpack_data = zstd::decode_all(compressed_data.as_slice())?;
    let job: JobFile = rmp_serde::from_slice(&msgpack_data)?;

    tracing::info!(
        "Loaded job '{}' with {} records from {}",
        job.metadata.name,
        job.records.len(),
        path.display()
    );

    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadmap_core::operation::{OperationId, OperationKind};

    fn square() -> MapModel {
        let mut model = MapModel::default();
        let mut points = Vec::new();
        for (x, y) in [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)] {
            let op = model
                .execute(OperationKind::ControlPoint { x, y, z: None })
                .unwrap();
            points.push(model.outputs(op).unwrap()[0]);
        }
        for i in 0..4 {
            model
                .execute(OperationKind::NewLine {
                    start: points[i],
                    end: points[(i + 1) % 4],
                    topological: true,
                })
                .unwrap();
        }
        model
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parcel.cmap");
        let model = square();
        let job = JobFile::from_model(JobMetadata::new("Parcel"), &model);

        save(&job, &path).unwrap();

        let mut reader = BufReader::new(File::open(&path).unwrap());
        let header = FileHeader::read(&mut reader).unwrap();
        assert_eq!(&header.magic, MAGIC);
        assert_eq!(header.version, FORMAT_VERSION);

        let loaded = load(&path).unwrap();
        assert_eq!(loaded, job);

        let reopened = loaded.open(&EngineConfig::default()).unwrap();
        assert_eq!(reopened.operations().len(), 8);
        assert_eq!(reopened.snapshot(), model.snapshot());
    }

    #[test]
    fn test_revision_survives_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("revised.cmap");
        let mut model = square();
        model
            .revise(
                OperationId(1),
                OperationKind::ControlPoint {
                    x: -5.0,
                    y: 0.0,
                    z: None,
                },
            )
            .unwrap();

        save(&JobFile::from_model(JobMetadata::new("Revised"), &model), &path).unwrap();
        let reopened = load(&path).unwrap().open(&EngineConfig::default()).unwrap();

        assert_eq!(reopened.snapshot().total_area(), 125.0);
    }

    #[test]
    fn test_invalid_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invalid.cmap");

        let mut file = File::create(&path).unwrap();
        file.write_all(b"XXXX").unwrap();
        file.write_all(&[0u8; 12]).unwrap();
        drop(file);

        assert!(matches!(load(&path), Err(FileError::InvalidFormat(_))));
    }

    #[test]
    fn test_newer_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.cmap");

        let mut file = File::create(&path).unwrap();
        file.write_all(MAGIC).unwrap();
        file.write_all(&(FORMAT_VERSION + 1).to_le_bytes()).unwrap();
        file.write_all(&[0u8; 8]).unwrap();
        drop(file);

        assert!(matches!(load(&path), Err(FileError::UnsupportedVersion(_))));
    }

    #[test]
    fn test_open_reports_load_errors() {
        let mut job = JobFile::from_model(JobMetadata::new("Broken"), &square());
        // 第一条线引用的端点不再定义
        job.records.remove(0);

        assert!(matches!(
            job.open(&EngineConfig::default()),
            Err(FileError::Load(_))
        ));
    }
}

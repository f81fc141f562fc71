//! CadMap 文件格式处理
//!
//! 支持：
//! - `.cmap` 作业文件（zstd 压缩的 MessagePack 编辑记录流）
//! - 作业目录管理
//! - `.dxf` 导出

pub mod dxf_io;
pub mod error;
pub mod job;
pub mod native;

pub use error::FileError;
pub use job::JobDirectory;
pub use native::{JobFile, JobMetadata};

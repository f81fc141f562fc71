//! CadMap 拓扑与前推引擎
//!
//! 地籍图中每个要素的位置都是一串编辑操作的输出。修改上游操作的观测值后，
//! 所有使用其输出的下游操作按序号重新计算，多边形拓扑随之增量修复。
//!
//! # 架构设计
//!
//! - `feature`: 点、线、文本要素及共享节点，点位修改时通知依赖者
//! - `operation`: 封闭的操作种类、首次执行与前推、按序号排列的操作链
//! - `topology`: 由线推导分界线与环，增量修复与检查
//! - `rollforward`: 前推状态机，故障与取消都是显式结果
//! - `persist`: 带字段标记的编辑记录与前向引用解析
//! - `shared`: 整体读写锁和后台重建线程
//!
//! # 示例
//!
//! ```rust
//! use cadmap_core::prelude::*;
//!
//! let mut model = MapModel::default();
//! let mut corners = Vec::new();
//! for (x, y) in [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)] {
//!     let op = model.execute(OperationKind::ControlPoint { x, y, z: None }).unwrap();
//!     corners.push(model.outputs(op).unwrap()[0]);
//! }
//! for i in 0..4 {
//!     model
//!         .execute(OperationKind::NewLine {
//!             start: corners[i],
//!             end: corners[(i + 1) % 4],
//!             topological: true,
//!         })
//!         .unwrap();
//! }
//!
//! // 修订第一个控制点，下游的线和多边形随之更新
//! let outcome = model
//!     .revise(OperationId(1), OperationKind::ControlPoint { x: -5.0, y: 0.0, z: None })
//!     .unwrap();
//! assert!(outcome.is_complete());
//! assert_eq!(model.snapshot().polygons[0].area, 125.0);
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod feature;
pub mod geometry;
pub mod math;
pub mod model;
pub mod operation;
pub mod persist;
pub mod rollforward;
pub mod shared;
pub mod spatial;
pub mod topology;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::config::{EngineConfig, TopologyConfig};
    pub use crate::context::{EditingContext, PositionChange};
    pub use crate::error::{EditError, LoadError, TopologyError};
    pub use crate::feature::{Dependent, FeatureGraph, FeatureId, FeatureKind};
    pub use crate::geometry::{Segment, TextGeometry};
    pub use crate::math::{BoundingBox2, Point2, Vector2};
    pub use crate::model::MapModel;
    pub use crate::operation::{OperationId, OperationKind, RollforwardFault};
    pub use crate::persist::{load, DataField, EditRecord, FieldValue};
    pub use crate::rollforward::{RollforwardOutcome, RollforwardReport};
    pub use crate::shared::{share, CancelToken, SharedMap, TopologyWorker, WorkerEvent};
    pub use crate::topology::{CheckItem, CheckType, GeometricModel, RingKind, Topology};
}

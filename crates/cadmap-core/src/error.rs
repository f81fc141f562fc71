//! 核心错误定义
//!
//! 前推故障与拓扑缺陷不在此列：前者是 `RollforwardOutcome::Faulted`，
//! 后者是 `CheckItem`，两者都是可由用户修正的正常结果。

use crate::feature::{FeatureId, FeatureKind};
use crate::operation::OperationId;
use crate::persist::DataField;
use thiserror::Error;

/// 拓扑内部一致性被破坏（引擎缺陷）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TopologyError {
    #[error("Ring traced from ({x:.3}, {y:.3}) did not close")]
    RingNotClosed { x: f64, y: f64 },

    #[error("Broken divider back-reference: {0}")]
    BackReference(String),

    #[error("Ring winding does not match its kind: {0}")]
    Winding(String),
}

/// 编辑与前推过程中的契约错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditError {
    #[error("Feature not found: {0}")]
    UnknownFeature(FeatureId),

    #[error("Operation not found: {0}")]
    UnknownOperation(OperationId),

    #[error("Feature {0} already exists")]
    DuplicateFeature(FeatureId),

    #[error("Feature {feature} is a {found:?}, expected a {expected:?}")]
    WrongKind {
        feature: FeatureId,
        expected: FeatureKind,
        found: FeatureKind,
    },

    #[error("Operation {operation} replayed out of sequence (after {last})")]
    OutOfSequence {
        operation: OperationId,
        last: OperationId,
    },

    #[error("Operation {operation} consumes {feature}, created by later {creator}")]
    ConsumesLaterFeature {
        operation: OperationId,
        feature: FeatureId,
        creator: OperationId,
    },

    #[error("Operation {operation} consumes {feature}, which is no longer active")]
    InactiveFeature {
        operation: OperationId,
        feature: FeatureId,
    },

    #[error("{kind} rejected: {reason}")]
    Rejected { kind: &'static str, reason: String },

    #[error("Revision of {operation} rejected: {reason}")]
    RevisionMismatch {
        operation: OperationId,
        reason: String,
    },

    #[error("Operation {operation} produced {found} outputs, expected {expected}")]
    OutputMismatch {
        operation: OperationId,
        expected: usize,
        found: usize,
    },

    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),
}

/// 编辑流加载错误（数据不一致，加载失败）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("Operation {operation} references {feature}, which is never defined")]
    UnresolvedReference {
        operation: OperationId,
        feature: FeatureId,
    },

    #[error("Operation {operation} references {feature}, created later by {creator}")]
    OutOfOrderReference {
        operation: OperationId,
        feature: FeatureId,
        creator: OperationId,
    },

    #[error("Operation {operation} expects {feature} to be a {expected:?}, found {found:?}")]
    WrongReferenceKind {
        operation: OperationId,
        feature: FeatureId,
        expected: FeatureKind,
        found: FeatureKind,
    },

    #[error("Sequence number {0} appears more than once")]
    DuplicateSequence(OperationId),

    #[error("Feature {0} is defined more than once")]
    DuplicateFeature(FeatureId),

    #[error("Unknown operation kind tag: {0}")]
    UnknownKind(u8),

    #[error("Operation {operation} is missing field {field:?}")]
    MissingField {
        operation: OperationId,
        field: DataField,
    },

    #[error("Operation {operation} has malformed field tag {tag}")]
    MalformedField { operation: OperationId, tag: u16 },

    #[error("Operation {operation} declares {found} output ids, expected {expected}")]
    OutputCount {
        operation: OperationId,
        expected: usize,
        found: usize,
    },

    #[error("Replay failed: {0}")]
    Edit(#[from] EditError),
}

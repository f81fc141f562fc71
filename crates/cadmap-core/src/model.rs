//! 地图模型
//!
//! 把要素图、操作链和拓扑组合成一个可编辑的整体。所有编辑都经过这里：
//! 新操作按序号追加并立即修复拓扑；修订观测值后从该操作开始前推。

use crate::config::EngineConfig;
use crate::context::EditingContext;
use crate::error::{EditError, TopologyError};
use crate::feature::{FeatureGraph, FeatureId};
use crate::operation::{Operation, OperationChain, OperationId, OperationKind};
use crate::persist::{to_record, EditRecord};
use crate::rollforward::{Rollforward, RollforwardOutcome};
use crate::shared::CancelToken;
use crate::topology::{CheckItem, GeometricModel, RepairReport, Topology};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct MapModel {
    config: EngineConfig,
    features: FeatureGraph,
    operations: OperationChain,
    topology: Topology,
}

impl Default for MapModel {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl MapModel {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            features: FeatureGraph::new(&config),
            topology: Topology::new(config.topology.clone()),
            operations: OperationChain::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn features(&self) -> &FeatureGraph {
        &self.features
    }

    pub fn operations(&self) -> &OperationChain {
        &self.operations
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// 操作的输出要素
    pub fn outputs(&self, id: OperationId) -> Option<&[FeatureId]> {
        self.operations.get(id).map(|op| op.outputs.as_slice())
    }

    /// 追加一个新操作，返回其序号
    pub fn execute(&mut self, kind: OperationKind) -> Result<OperationId, EditError> {
        let id = self.operations.next_id();
        let mut ctx = EditingContext::update();
        self.execute_with(id, kind, None, &mut ctx, true)?;
        Ok(id)
    }

    /// 加载时按记录重放：使用记录中的序号和输出ID，拓扑留待最后统一重建
    pub(crate) fn replay(
        &mut self,
        id: OperationId,
        kind: OperationKind,
        declared: &[FeatureId],
    ) -> Result<(), EditError> {
        let mut ctx = EditingContext::startup();
        self.execute_with(id, kind, Some(declared), &mut ctx, false)
    }

    fn execute_with(
        &mut self,
        id: OperationId,
        kind: OperationKind,
        declared: Option<&[FeatureId]>,
        ctx: &mut EditingContext,
        repair: bool,
    ) -> Result<(), EditError> {
        if let Some(last) = self.operations.last_id() {
            if id <= last {
                return Err(EditError::OutOfSequence { operation: id, last });
            }
        }
        let name = kind.name();
        let (operation, applied) = Operation::execute(
            id,
            kind,
            &mut self.features,
            ctx,
            declared,
            self.config.tolerance(),
        )?;
        let outputs = operation.outputs.len();
        self.operations.push(operation)?;

        for line in applied.lines {
            self.topology.mark_dirty(line);
        }
        if repair {
            self.topology.repair(&self.features)?;
        }
        debug!(operation = %id, kind = name, outputs, "Executed");
        Ok(())
    }

    /// 修订已有操作的观测值并前推
    ///
    /// 种类、输入要素和输出数量必须保持不变。
    pub fn revise(&mut self, id: OperationId, kind: OperationKind) -> Result<RollforwardOutcome, EditError> {
        let current = self
            .operations
            .get(id)
            .ok_or(EditError::UnknownOperation(id))?;
        current
            .kind
            .check_revision(&kind)
            .map_err(|reason| EditError::RevisionMismatch {
                operation: id,
                reason,
            })?;
        self.operations.replace_kind(id, kind)?;
        self.rollforward([id], None)
    }

    /// 从给定操作开始前推
    pub fn rollforward(
        &mut self,
        changed: impl IntoIterator<Item = OperationId>,
        cancel: Option<&CancelToken>,
    ) -> Result<RollforwardOutcome, EditError> {
        let tolerance = self.config.tolerance();
        Rollforward::new(
            &mut self.features,
            &mut self.topology,
            &self.operations,
            tolerance,
            changed,
        )
        .run(cancel)
    }

    /// 重放全部操作（修正故障原因后使用）
    pub fn rerun_all(&mut self, cancel: Option<&CancelToken>) -> Result<RollforwardOutcome, EditError> {
        let ids: Vec<OperationId> = self.operations.ids().collect();
        self.rollforward(ids, cancel)
    }

    pub fn rebuild_topology(&mut self) -> Result<RepairReport, TopologyError> {
        let report = self.topology.rebuild(&self.features)?;
        info!(
            lines = report.lines,
            dividers = self.topology.divider_count(),
            rings = self.topology.ring_count(),
            "Topology rebuilt"
        );
        Ok(report)
    }

    pub fn check(&self) -> Vec<CheckItem> {
        self.topology.check()
    }

    pub fn snapshot(&self) -> GeometricModel {
        self.topology.snapshot()
    }

    /// 按序号输出编辑记录
    pub fn to_records(&self) -> Vec<EditRecord> {
        self.operations.iter().map(to_record).collect()
    }
}

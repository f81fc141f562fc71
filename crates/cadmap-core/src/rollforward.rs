//! 前推协调器
//!
//! 上游操作的观测值或输出改变后，按序号重放所有受影响的下游操作：
//!
//! ```text
//! Pending ──> Replaying(op) ──> Repairing(op) ──> Pending ──> ... ──> Complete
//!                  │
//!                  └──> Faulted
//! ```
//!
//! 点移动时，依赖它的线被标记为待修复，依赖它的操作被加入待重放集合。
//! 每个操作重放后立即修复拓扑，因此取消或故障时已重放的部分总是完整的。

use crate::context::{EditingContext, PositionChange};
use crate::error::EditError;
use crate::feature::{Dependent, FeatureGraph, FeatureId, MoveObserver};
use crate::operation::{OperationChain, OperationId, RollforwardFault, StepResult};
use crate::shared::CancelToken;
use crate::topology::{RepairReport, Topology};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// 前推状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollforwardState {
    Pending,
    Replaying(OperationId),
    Repairing(OperationId),
    Faulted,
    Complete,
}

/// 一趟前推的记录
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RollforwardReport {
    /// 按顺序重放过的操作
    pub replayed: Vec<OperationId>,
    /// 所有点位变化
    pub changes: Vec<PositionChange>,
    pub topology: RepairReport,
}

impl RollforwardReport {
    pub fn moved_points(&self) -> usize {
        let mut ids: Vec<FeatureId> = self.changes.iter().map(|c| c.feature).collect();
        ids.sort();
        ids.dedup();
        ids.len()
    }

    /// 已有点的最大位移（新建点不计）
    pub fn largest_shift(&self) -> f64 {
        self.changes
            .iter()
            .filter_map(|c| c.delta())
            .map(|d| d.norm())
            .fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RollforwardOutcome {
    Complete(RollforwardReport),
    /// 在故障操作处停止；之前的操作已更新，之后的保持原样
    Faulted {
        fault: RollforwardFault,
        report: RollforwardReport,
    },
    /// 在两个操作之间被取消
    Cancelled(RollforwardReport),
}

impl RollforwardOutcome {
    pub fn report(&self) -> &RollforwardReport {
        match self {
            RollforwardOutcome::Complete(report)
            | RollforwardOutcome::Faulted { report, .. }
            | RollforwardOutcome::Cancelled(report) => report,
        }
    }

    pub fn fault(&self) -> Option<&RollforwardFault> {
        match self {
            RollforwardOutcome::Faulted { fault, .. } => Some(fault),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, RollforwardOutcome::Complete(_))
    }
}

/// 把移动通知分派到拓扑和待重放集合
struct Scheduler<'a> {
    topology: &'a mut Topology,
    pending: &'a mut BTreeSet<OperationId>,
    current: OperationId,
    out_of_order: Option<OperationId>,
}

impl MoveObserver for Scheduler<'_> {
    fn on_pre_move(&mut self, _moved: FeatureId, dependent: Dependent) {
        if let Dependent::Line(line) = dependent {
            self.topology.mark_dirty(line);
        }
    }

    fn on_post_move(&mut self, _moved: FeatureId, dependent: Dependent) {
        if let Dependent::Operation(op) = dependent {
            if op < self.current {
                self.out_of_order.get_or_insert(op);
            } else if op > self.current {
                self.pending.insert(op);
            }
        }
    }
}

/// 一趟前推
pub struct Rollforward<'a> {
    features: &'a mut FeatureGraph,
    topology: &'a mut Topology,
    operations: &'a OperationChain,
    tolerance: f64,
    pending: BTreeSet<OperationId>,
    state: RollforwardState,
    report: RollforwardReport,
}

impl<'a> Rollforward<'a> {
    pub fn new(
        features: &'a mut FeatureGraph,
        topology: &'a mut Topology,
        operations: &'a OperationChain,
        tolerance: f64,
        changed: impl IntoIterator<Item = OperationId>,
    ) -> Self {
        Self {
            features,
            topology,
            operations,
            tolerance,
            pending: changed.into_iter().collect(),
            state: RollforwardState::Pending,
            report: RollforwardReport::default(),
        }
    }

    pub fn state(&self) -> RollforwardState {
        self.state
    }

    pub fn pending(&self) -> impl Iterator<Item = OperationId> + '_ {
        self.pending.iter().copied()
    }

    fn transition(&mut self, next: RollforwardState) {
        debug!(from = ?self.state, to = ?next, "Rollforward transition");
        self.state = next;
    }

    /// 执行到完成、故障或取消
    pub fn run(mut self, cancel: Option<&CancelToken>) -> Result<RollforwardOutcome, EditError> {
        // 调用前累积的移动先修复
        self.report.topology.merge(&self.topology.repair(self.features)?);

        loop {
            if cancel.is_some_and(|c| c.is_cancelled()) {
                info!(
                    replayed = self.report.replayed.len(),
                    remaining = self.pending.len(),
                    "Rollforward cancelled"
                );
                return Ok(RollforwardOutcome::Cancelled(self.report));
            }
            let Some(id) = self.pending.pop_first() else {
                break;
            };
            if let Some(fault) = self.step(id)? {
                warn!(operation = %fault.operation, reason = %fault.reason, "Rollforward fault");
                self.transition(RollforwardState::Faulted);
                return Ok(RollforwardOutcome::Faulted {
                    fault,
                    report: self.report,
                });
            }
        }

        self.transition(RollforwardState::Complete);
        info!(
            replayed = self.report.replayed.len(),
            moved = self.report.moved_points(),
            rings_created = self.report.topology.rings_created,
            rings_deleted = self.report.topology.rings_deleted,
            "Rollforward complete"
        );
        Ok(RollforwardOutcome::Complete(self.report))
    }

    fn step(&mut self, id: OperationId) -> Result<Option<RollforwardFault>, EditError> {
        let operations = self.operations;
        let operation = operations
            .get(id)
            .ok_or(EditError::UnknownOperation(id))?;
        self.transition(RollforwardState::Replaying(id));

        let mut ctx = EditingContext::update();
        let mut scheduler = Scheduler {
            topology: &mut *self.topology,
            pending: &mut self.pending,
            current: id,
            out_of_order: None,
        };
        let result = operation.rollforward(self.features, &mut ctx, &mut scheduler, self.tolerance)?;
        if let Some(dependent) = scheduler.out_of_order {
            return Err(EditError::OutOfSequence {
                operation: dependent,
                last: id,
            });
        }

        let applied = match result {
            StepResult::Applied(applied) => applied,
            StepResult::Faulted(fault) => return Ok(Some(fault)),
        };
        let changes = ctx.take_changes();
        debug!(operation = %id, kind = operation.kind.name(), moved = changes.len(), "Replayed");
        self.report.replayed.push(id);
        self.report.changes.extend(changes);

        self.transition(RollforwardState::Repairing(id));
        for line in applied.lines {
            self.topology.mark_dirty(line);
        }
        let repaired = self.topology.repair(self.features)?;
        self.report.topology.merge(&repaired);

        self.transition(RollforwardState::Pending);
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::operation::{Operation, OperationKind};

    struct Fixture {
        features: FeatureGraph,
        topology: Topology,
        operations: OperationChain,
    }

    impl Fixture {
        fn new() -> Self {
            let config = EngineConfig::default();
            Self {
                features: FeatureGraph::new(&config),
                topology: Topology::new(config.topology),
                operations: OperationChain::new(),
            }
        }

        fn add(&mut self, kind: OperationKind) -> Vec<FeatureId> {
            let id = self.operations.next_id();
            let mut ctx = EditingContext::update();
            let (op, applied) =
                Operation::execute(id, kind, &mut self.features, &mut ctx, None, 1e-6).unwrap();
            for line in applied.lines {
                self.topology.mark_dirty(line);
            }
            let outputs = op.outputs.clone();
            self.operations.push(op).unwrap();
            self.topology.repair(&self.features).unwrap();
            outputs
        }

        fn revise(&mut self, id: u32, kind: OperationKind) {
            self.operations.replace_kind(OperationId(id), kind).unwrap();
        }

        fn run(&mut self, changed: &[u32]) -> RollforwardOutcome {
            Rollforward::new(
                &mut self.features,
                &mut self.topology,
                &self.operations,
                1e-6,
                changed.iter().map(|id| OperationId(*id)),
            )
            .run(None)
            .unwrap()
        }

        fn at(&self, id: FeatureId) -> (f64, f64) {
            let p = self.features.position(id).unwrap();
            (p.x, p.y)
        }
    }

    fn control(x: f64, y: f64) -> OperationKind {
        OperationKind::ControlPoint { x, y, z: None }
    }

    #[test]
    fn test_downstream_operations_replay_in_order() {
        let mut f = Fixture::new();
        let a = f.add(control(0.0, 0.0))[0];
        let b = f.add(OperationKind::Radial {
            from: a,
            bearing: 0.0,
            distance: 10.0,
        })[0];
        let c = f.add(OperationKind::Radial {
            from: b,
            bearing: std::f64::consts::FRAC_PI_2,
            distance: 5.0,
        })[0];

        f.revise(1, control(100.0, 0.0));
        let outcome = f.run(&[1]);

        assert!(outcome.is_complete());
        let report = outcome.report();
        assert_eq!(
            report.replayed,
            vec![OperationId(1), OperationId(2), OperationId(3)]
        );
        assert_eq!(report.moved_points(), 3);
        assert!((report.largest_shift() - 100.0).abs() < 1e-9);
        assert_eq!(f.at(b), (100.0, 10.0));
        let (cx, cy) = f.at(c);
        assert!((cx - 105.0).abs() < 1e-9 && (cy - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_unchanged_rollforward_moves_nothing() {
        let mut f = Fixture::new();
        let a = f.add(control(0.0, 0.0))[0];
        f.add(OperationKind::Radial {
            from: a,
            bearing: 1.0,
            distance: 10.0,
        });

        let outcome = f.run(&[1, 2]);
        let report = outcome.report();
        assert_eq!(report.replayed, vec![OperationId(1), OperationId(2)]);
        assert!(report.changes.is_empty());
        assert_eq!(report.topology, RepairReport::default());
    }

    #[test]
    fn test_fault_halts_and_leaves_later_operations_stale() {
        let mut f = Fixture::new();
        let a = f.add(control(0.0, 0.0))[0];
        let b = f.add(control(10.0, 0.0))[0];
        let radial = f.add(OperationKind::Radial {
            from: a,
            bearing: 0.0,
            distance: 3.0,
        })[0];
        let crossing = f.add(OperationKind::IntersectTwoDistances {
            from1: a,
            distance1: 6.0,
            from2: b,
            distance2: 6.0,
            default: true,
        })[0];
        let line = f.add(OperationKind::NewLine {
            start: radial,
            end: crossing,
            topological: true,
        })[0];
        let before = f.at(crossing);

        // A 与 B 相距 20，两个 6 米的圆不再相交
        f.revise(1, control(-10.0, 0.0));
        let outcome = f.run(&[1]);

        let fault = outcome.fault().unwrap();
        assert_eq!(fault.operation, OperationId(4));
        assert_eq!(outcome.report().replayed, vec![OperationId(1), OperationId(3)]);
        assert_eq!(f.at(radial), (-10.0, 3.0));
        assert_eq!(f.at(crossing), before);
        assert!(f.features.get(line).unwrap().is_active());
    }

    #[test]
    fn test_lines_that_no_longer_cross_fault() {
        let mut f = Fixture::new();
        let a = f.add(control(0.0, 0.0))[0];
        let b = f.add(control(10.0, 10.0))[0];
        let c = f.add(control(0.0, 10.0))[0];
        let d = f.add(control(10.0, 0.0))[0];
        let l1 = f.add(OperationKind::NewLine {
            start: a,
            end: b,
            topological: true,
        })[0];
        let l2 = f.add(OperationKind::NewLine {
            start: c,
            end: d,
            topological: true,
        })[0];
        let x = f.add(OperationKind::IntersectTwoLines { line1: l1, line2: l2 })[0];
        assert_eq!(f.at(x), (5.0, 5.0));

        // L2 平移后与 L1 平行
        f.revise(3, control(20.0, 10.0));
        let outcome = f.run(&[3]);

        let fault = outcome.fault().unwrap();
        assert_eq!(fault.operation, OperationId(7));
        assert_eq!(fault.kind, "IntersectTwoLines");
        assert_eq!(outcome.report().replayed, vec![OperationId(3), OperationId(6)]);
        assert_eq!(f.at(c), (20.0, 10.0));
        assert_eq!(f.at(x), (5.0, 5.0));
    }

    #[test]
    fn test_cancelled_before_first_operation() {
        let mut f = Fixture::new();
        f.add(control(0.0, 0.0));
        f.revise(1, control(5.0, 5.0));

        let token = CancelToken::new();
        token.cancel();
        let outcome = Rollforward::new(
            &mut f.features,
            &mut f.topology,
            &f.operations,
            1e-6,
            [OperationId(1)],
        )
        .run(Some(&token))
        .unwrap();

        assert!(matches!(outcome, RollforwardOutcome::Cancelled(_)));
        assert!(outcome.report().replayed.is_empty());
    }

    #[test]
    fn test_moved_line_endpoint_repairs_rings() {
        let mut f = Fixture::new();
        let corners: Vec<FeatureId> = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]
            .iter()
            .map(|(x, y)| f.add(control(*x, *y))[0])
            .collect();
        for i in 0..4 {
            f.add(OperationKind::NewLine {
                start: corners[i],
                end: corners[(i + 1) % 4],
                topological: true,
            });
        }
        assert_eq!(f.topology.snapshot().polygons[0].area, 100.0);

        f.revise(3, control(20.0, 10.0));
        let outcome = f.run(&[3]);

        assert!(outcome.is_complete());
        // 两条线的创建操作也依赖该点，重放时不产生移动
        assert_eq!(
            outcome.report().replayed,
            vec![OperationId(3), OperationId(6), OperationId(7)]
        );
        assert_eq!(outcome.report().topology.rings_created, 2);
        assert_eq!(f.topology.snapshot().polygons[0].area, 150.0);
        f.topology.validate().unwrap();
    }
}

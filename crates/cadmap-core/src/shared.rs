//! 共享模型与后台任务
//!
//! 整个模型只有一把粗粒度读写锁：编辑、前推和拓扑重建持有写锁直到完成，
//! 界面重绘等只读查询取读锁。后台线程通过 crossbeam 通道报告进度。

use crate::model::MapModel;
use crate::operation::OperationId;
use crate::rollforward::RollforwardOutcome;
use crate::topology::RepairReport;
use crossbeam::channel::{unbounded, Receiver, Sender};
use crossbeam::sync::ShardedLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

pub type SharedMap = Arc<ShardedLock<MapModel>>;

pub fn share(model: MapModel) -> SharedMap {
    Arc::new(ShardedLock::new(model))
}

/// 取消标记，前推只在两个操作之间检查
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 后台任务事件
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// 已取得写锁
    Started,
    Rebuilt(RepairReport),
    RolledForward(RollforwardOutcome),
    Failed(String),
}

/// 在后台线程上持有写锁执行的拓扑任务
pub struct TopologyWorker {
    handle: Option<JoinHandle<()>>,
    events: Receiver<WorkerEvent>,
    cancel: CancelToken,
}

impl TopologyWorker {
    fn spawn<F>(map: SharedMap, name: &str, task: F) -> Self
    where
        F: FnOnce(&mut MapModel, &CancelToken) -> WorkerEvent + Send + 'static,
    {
        let (tx, rx): (Sender<WorkerEvent>, Receiver<WorkerEvent>) = unbounded();
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let task_name = name.to_string();

        let handle = thread::spawn(move || {
            let mut model = match map.write() {
                Ok(guard) => guard,
                Err(_) => {
                    error!(task = %task_name, "Model lock poisoned");
                    let _ = tx.send(WorkerEvent::Failed("model lock poisoned".into()));
                    return;
                }
            };
            let _ = tx.send(WorkerEvent::Started);
            debug!(task = %task_name, "Worker holds model lock");
            let event = task(&mut *model, &token);
            drop(model);
            let _ = tx.send(event);
        });

        Self {
            handle: Some(handle),
            events: rx,
            cancel,
        }
    }

    /// 全量重建拓扑
    pub fn spawn_rebuild(map: SharedMap) -> Self {
        Self::spawn(map, "rebuild", |model, _| match model.rebuild_topology() {
            Ok(report) => WorkerEvent::Rebuilt(report),
            Err(e) => WorkerEvent::Failed(e.to_string()),
        })
    }

    /// 从给定操作开始前推，可取消
    pub fn spawn_rollforward(map: SharedMap, changed: Vec<OperationId>) -> Self {
        Self::spawn(map, "rollforward", move |model, token| {
            match model.rollforward(changed, Some(token)) {
                Ok(outcome) => WorkerEvent::RolledForward(outcome),
                Err(e) => WorkerEvent::Failed(e.to_string()),
            }
        })
    }

    pub fn events(&self) -> &Receiver<WorkerEvent> {
        &self.events
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// 等待线程结束，返回全部事件
    pub fn join(mut self) -> Vec<WorkerEvent> {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Topology worker panicked");
            }
        }
        self.events.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationKind;

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
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_background_rebuild_reports_completion() {
        let map = share(square());
        let worker = TopologyWorker::spawn_rebuild(map.clone());
        let events = worker.join();

        assert!(matches!(events.first(), Some(WorkerEvent::Started)));
        match events.last() {
            Some(WorkerEvent::Rebuilt(report)) => assert_eq!(report.rings_created, 2),
            other => panic!("unexpected event: {other:?}"),
        }
        let model = map.read().unwrap();
        assert_eq!(model.snapshot().polygons.len(), 1);
    }

    #[test]
    fn test_background_rollforward() {
        let map = share(square());
        let ids: Vec<OperationId> = map.read().unwrap().operations().ids().collect();
        let events = TopologyWorker::spawn_rollforward(map.clone(), ids).join();

        match events.last() {
            Some(WorkerEvent::RolledForward(outcome)) => {
                assert!(outcome.is_complete());
                assert_eq!(outcome.report().replayed.len(), 8);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}

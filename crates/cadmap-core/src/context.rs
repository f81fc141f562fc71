//! 编辑上下文
//!
//! 每一趟编辑流处理（加载或更新）选定一种上下文，并显式传入每次几何修改：
//! - `Startup`: 反序列化已有模型，位置变化不记录
//! - `Update`: 用户编辑或前推，记录每个点的新旧位置

use crate::feature::FeatureId;
use crate::math::{Point2, Vector2};

/// 一次点位变化
#[derive(Debug, Clone, PartialEq)]
pub struct PositionChange {
    pub feature: FeatureId,
    /// 新建的点没有旧位置
    pub old: Option<Point2>,
    pub new: Point2,
}

impl PositionChange {
    /// 位移量，新建点返回 None
    pub fn delta(&self) -> Option<Vector2> {
        self.old.map(|old| self.new - old)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditingContext {
    Startup,
    Update { changes: Vec<PositionChange> },
}

impl EditingContext {
    pub fn startup() -> Self {
        EditingContext::Startup
    }

    pub fn update() -> Self {
        EditingContext::Update {
            changes: Vec::new(),
        }
    }

    /// 记录位置变化；加载期间丢弃
    pub fn register_change(&mut self, change: PositionChange) {
        if let EditingContext::Update { changes } = self {
            changes.push(change);
        }
    }

    pub fn changes(&self) -> &[PositionChange] {
        match self {
            EditingContext::Startup => &[],
            EditingContext::Update { changes } => changes,
        }
    }

    /// 取出已记录的变化
    pub fn take_changes(&mut self) -> Vec<PositionChange> {
        match self {
            EditingContext::Startup => Vec::new(),
            EditingContext::Update { changes } => std::mem::take(changes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(old: Option<Point2>) -> PositionChange {
        PositionChange {
            feature: FeatureId(1),
            old,
            new: Point2::new(0.0, 5.0),
        }
    }

    #[test]
    fn test_startup_discards_changes() {
        let mut ctx = EditingContext::startup();
        ctx.register_change(change(Some(Point2::origin())));
        assert!(ctx.changes().is_empty());
        assert!(ctx.take_changes().is_empty());
    }

    #[test]
    fn test_update_records_changes() {
        let mut ctx = EditingContext::update();
        ctx.register_change(change(Some(Point2::origin())));
        ctx.register_change(change(None));

        assert_eq!(ctx.changes().len(), 2);
        assert_eq!(ctx.changes()[0].delta(), Some(Vector2::new(0.0, 5.0)));
        assert_eq!(ctx.changes()[1].delta(), None);

        let taken = ctx.take_changes();
        assert_eq!(taken.len(), 2);
        assert!(ctx.changes().is_empty());
    }
}

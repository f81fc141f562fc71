//! 分界线
//!
//! 分界线是多边形拓扑的最小单元：线要素在交点处断开后的一段，
//! 左右两侧各引用一个环（或为空）。完全重合的线段共用一条分界线。

use super::keys::RingKey;
use crate::feature::FeatureId;
use crate::geometry::Segment;
use crate::math::Point2;

/// 分界线端点
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Terminal {
    pub position: Point2,
    /// 端点上的点要素；合成的交点为 None
    pub point: Option<FeatureId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DividerStatus {
    /// 两端都连到其它分界线，参与环的追踪
    Connected,
    /// 一端悬空（含修剪后悬空的分支）
    Dangle,
    /// 两端都悬空
    Floating,
}

/// 相对于分界线方向（起点→终点）的一侧
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone)]
pub struct Divider {
    /// 覆盖这一段的线要素，多于一条表示重叠
    pub lines: Vec<FeatureId>,
    pub start: Terminal,
    pub end: Terminal,
    pub left: Option<RingKey>,
    pub right: Option<RingKey>,
    pub status: DividerStatus,
}

impl Divider {
    pub fn new(line: FeatureId, start: Terminal, end: Terminal) -> Self {
        Self {
            lines: vec![line],
            start,
            end,
            left: None,
            right: None,
            status: DividerStatus::Connected,
        }
    }

    pub fn segment(&self) -> Segment {
        Segment::new(self.start.position, self.end.position)
    }

    pub fn length(&self) -> f64 {
        self.segment().length()
    }

    pub fn ring(&self, side: Side) -> Option<RingKey> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub fn set_ring(&mut self, side: Side, ring: Option<RingKey>) {
        match side {
            Side::Left => self.left = ring,
            Side::Right => self.right = ring,
        }
    }

    /// 多条线共用
    pub fn is_overlap(&self) -> bool {
        self.lines.len() > 1
    }

    /// 两侧是同一个环
    pub fn is_bridge(&self) -> bool {
        self.left.is_some() && self.left == self.right
    }
}

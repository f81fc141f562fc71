//! 多边形环

use super::divider::Side;
use super::keys::{DividerKey, RingKey};
use crate::geometry::point_in_polygon;
use crate::math::{BoundingBox2, Point2};
use bitflags::bitflags;

bitflags! {
    /// 环状态标记
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct RingFlags: u8 {
        /// 待删除，修复结束时从表中移除
        const DELETED  = 0b0000_0001;
        /// 不被任何多边形包含的岛
        const FLOATING = 0b0000_0010;
        /// 已进入空间索引
        const INDEXED  = 0b0000_0100;
        /// 边界中含有多条线共用的分界线
        const OVERLAP  = 0b0000_1000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RingKind {
    /// 逆时针追踪、面积为正的面
    Polygon,
    /// 连通分量的外边界，面积非正
    Island,
}

/// 环的一条边：环位于分界线的哪一侧
///
/// 左侧表示沿分界线正向（起点→终点）行进，右侧表示反向。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundaryFace {
    pub divider: DividerKey,
    pub side: Side,
}

impl BoundaryFace {
    pub fn forward(&self) -> bool {
        self.side == Side::Left
    }
}

#[derive(Debug, Clone)]
pub struct Ring {
    pub kind: RingKind,
    /// 首尾相接的边界，面始终在行进方向左侧
    pub edges: Vec<BoundaryFace>,
    /// 各边起点坐标
    pub outline: Vec<Point2>,
    /// 有向面积
    pub area: f64,
    pub extent: BoundingBox2,
    pub flags: RingFlags,
    /// 包含该岛的多边形
    pub enclosed_by: Option<RingKey>,
}

impl Ring {
    pub fn is_polygon(&self) -> bool {
        self.kind == RingKind::Polygon
    }

    pub fn is_deleted(&self) -> bool {
        self.flags.contains(RingFlags::DELETED)
    }

    pub fn contains_point(&self, p: &Point2) -> bool {
        self.extent.contains(p) && point_in_polygon(p, &self.outline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let mut flags = RingFlags::default();
        assert!(flags.is_empty());
        flags.insert(RingFlags::INDEXED | RingFlags::OVERLAP);
        assert!(flags.contains(RingFlags::INDEXED));
        flags.remove(RingFlags::INDEXED);
        assert_eq!(flags, RingFlags::OVERLAP);
    }
}

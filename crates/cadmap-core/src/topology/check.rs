//! 拓扑检查
//!
//! 缺陷不是错误：它们是需要用户修正的数据问题，逐条列出供界面定位。

use super::{DividerStatus, RingFlags, Topology};
use crate::feature::FeatureId;
use crate::math::Point2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CheckType {
    /// 分界线短于阈值
    SmallLine,
    /// 多条线重合
    Overlap,
    /// 一端悬空
    Dangle,
    /// 两端都悬空
    Floating,
    /// 两侧是同一个多边形
    Bridge,
    /// 多边形面积小于阈值
    SmallPolygon,
    /// 岛不被任何多边形包含
    NotEnclosed,
}

/// 一条检查结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckItem {
    pub check: CheckType,
    pub position: Point2,
    pub lines: Vec<FeatureId>,
}

impl Topology {
    /// 列出当前拓扑中的缺陷，按类型排序
    pub fn check(&self) -> Vec<CheckItem> {
        let config = self.config();
        let mut items = Vec::new();

        for (_, d) in self.dividers() {
            let position = d.segment().midpoint();
            let mut push = |check| {
                items.push(CheckItem {
                    check,
                    position,
                    lines: d.lines.clone(),
                })
            };
            if d.length() < config.small_line_length {
                push(CheckType::SmallLine);
            }
            if d.is_overlap() {
                push(CheckType::Overlap);
            }
            match d.status {
                DividerStatus::Dangle => push(CheckType::Dangle),
                DividerStatus::Floating => push(CheckType::Floating),
                DividerStatus::Connected if d.is_bridge() => push(CheckType::Bridge),
                DividerStatus::Connected => {}
            }
        }

        for (_, ring) in self.rings() {
            let lines = || {
                let mut lines: Vec<FeatureId> = ring
                    .edges
                    .iter()
                    .filter_map(|e| self.divider(e.divider))
                    .flat_map(|d| d.lines.iter().copied())
                    .collect();
                lines.sort();
                lines.dedup();
                lines
            };
            if ring.is_polygon() && ring.area < config.small_polygon_area {
                items.push(CheckItem {
                    check: CheckType::SmallPolygon,
                    position: ring.extent.center(),
                    lines: lines(),
                });
            }
            if !ring.is_polygon() && ring.flags.contains(RingFlags::FLOATING) {
                items.push(CheckItem {
                    check: CheckType::NotEnclosed,
                    position: ring.outline.first().copied().unwrap_or(ring.extent.center()),
                    lines: lines(),
                });
            }
        }

        items.sort_by(|a, b| {
            a.check
                .cmp(&b.check)
                .then(a.position.x.total_cmp(&b.position.x))
                .then(a.position.y.total_cmp(&b.position.y))
        });
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::feature::FeatureGraph;
    use crate::operation::OperationId;

    fn build(segments: &[((f64, f64), (f64, f64))]) -> Topology {
        let config = EngineConfig::default();
        let mut features = FeatureGraph::new(&config);
        let mut topology = Topology::new(config.topology.clone());
        let op = OperationId(1);
        for ((x1, y1), (x2, y2)) in segments {
            let a = features.create_point(Point2::new(*x1, *y1), None, op, None).unwrap();
            let b = features.create_point(Point2::new(*x2, *y2), None, op, None).unwrap();
            let l = features.create_line(a, b, true, op, None).unwrap();
            topology.mark_dirty(l);
        }
        topology.repair(&features).unwrap();
        topology
    }

    fn kinds(items: &[CheckItem]) -> Vec<CheckType> {
        items.iter().map(|i| i.check).collect()
    }

    #[test]
    fn test_crossing_reports_four_dangles() {
        let topology = build(&[((0.0, 0.0), (10.0, 10.0)), ((0.0, 10.0), (10.0, 0.0))]);
        let items = topology.check();
        assert_eq!(kinds(&items), vec![CheckType::Dangle; 4]);
        assert!(items.iter().all(|i| i.lines.len() == 1));
    }

    #[test]
    fn test_lone_line_is_floating() {
        let topology = build(&[((0.0, 0.0), (5.0, 0.0))]);
        let items = topology.check();
        assert_eq!(kinds(&items), vec![CheckType::Floating]);
        assert_eq!(items[0].position, Point2::new(2.5, 0.0));
    }

    #[test]
    fn test_square_reports_unenclosed_island() {
        let topology = build(&[
            ((0.0, 0.0), (10.0, 0.0)),
            ((10.0, 0.0), (10.0, 10.0)),
            ((10.0, 10.0), (0.0, 10.0)),
            ((0.0, 10.0), (0.0, 0.0)),
        ]);
        let items = topology.check();
        assert_eq!(kinds(&items), vec![CheckType::NotEnclosed]);
        assert_eq!(items[0].lines.len(), 4);
    }

    #[test]
    fn test_small_polygon_and_overlap() {
        let topology = build(&[
            ((0.0, 0.0), (0.001, 0.0)),
            ((0.001, 0.0), (0.001, 0.001)),
            ((0.001, 0.001), (0.0, 0.001)),
            ((0.0, 0.001), (0.0, 0.0)),
            ((0.0, 0.0), (0.0, 0.001)),
        ]);
        let items = topology.check();
        let found = kinds(&items);
        assert!(found.contains(&CheckType::SmallPolygon));
        assert!(found.contains(&CheckType::Overlap));
        assert!(!found.contains(&CheckType::Dangle));
    }
}

//! 几何模型快照
//!
//! 与环的键和追踪顺序无关的多边形描述，用于比较增量修复与全量重建的结果，
//! 以及重放后的输出。面积由规范化后的轮廓重新计算，与追踪起点无关。

use super::Topology;
use crate::geometry::signed_area;
use crate::math::Point2;
use approx::AbsDiffEq;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonShape {
    /// 从字典序最小的顶点开始的逆时针轮廓
    pub outline: Vec<Point2>,
    pub area: f64,
    /// 归属于该多边形的岛数量
    pub islands: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometricModel {
    pub polygons: Vec<PolygonShape>,
}

impl GeometricModel {
    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    pub fn total_area(&self) -> f64 {
        self.polygons.iter().map(|p| p.area).sum()
    }
}

impl AbsDiffEq for PolygonShape {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::default_epsilon()
    }

    /// 顶点逐个在容差内；面积按轮廓尺度放宽
    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        let scale = self.outline.len().max(1) as f64;
        self.islands == other.islands
            && self.outline.len() == other.outline.len()
            && self
                .outline
                .iter()
                .zip(&other.outline)
                .all(|(a, b)| a.abs_diff_eq(b, epsilon))
            && (self.area - other.area).abs() <= epsilon * scale * self.area.abs().sqrt().max(1.0)
    }
}

impl AbsDiffEq for GeometricModel {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.polygons.len() == other.polygons.len()
            && self
                .polygons
                .iter()
                .zip(&other.polygons)
                .all(|(a, b)| a.abs_diff_eq(b, epsilon))
    }
}

fn lexicographic(a: &Point2, b: &Point2) -> Ordering {
    a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y))
}

fn canonical(outline: &[Point2]) -> Vec<Point2> {
    let start = outline
        .iter()
        .enumerate()
        .min_by(|a, b| lexicographic(a.1, b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let mut out = outline.to_vec();
    out.rotate_left(start);
    out
}

impl Topology {
    pub fn snapshot(&self) -> GeometricModel {
        let mut polygons: Vec<PolygonShape> = self
            .polygons()
            .map(|(key, ring)| {
                let outline = canonical(&ring.outline);
                PolygonShape {
                    area: signed_area(&outline),
                    outline,
                    islands: self
                        .rings()
                        .filter(|(_, r)| r.enclosed_by == Some(key))
                        .count(),
                }
            })
            .collect();

        polygons.sort_by(|a, b| {
            let first = match (a.outline.first(), b.outline.first()) {
                (Some(pa), Some(pb)) => lexicographic(pa, pb),
                _ => Ordering::Equal,
            };
            first
                .then(a.area.total_cmp(&b.area))
                .then(a.outline.len().cmp(&b.outline.len()))
        });
        GeometricModel { polygons }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_outline_starts_at_lowest_vertex() {
        let outline = vec![
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
        ];
        let c = canonical(&outline);
        assert_eq!(c[0], Point2::new(0.0, 0.0));
        assert_eq!(c[1], Point2::new(10.0, 0.0));
        assert_eq!(c.len(), 4);
    }

    #[test]
    fn test_models_equal_within_tolerance() {
        let shape = |dx: f64| PolygonShape {
            outline: vec![
                Point2::new(0.0, 0.0),
                Point2::new(10.0 + dx, 0.0),
                Point2::new(0.0, 10.0),
            ],
            area: 50.0 + 5.0 * dx,
            islands: 0,
        };
        let exact = GeometricModel {
            polygons: vec![shape(0.0)],
        };
        let drifted = GeometricModel {
            polygons: vec![shape(1e-13)],
        };

        assert_ne!(exact, drifted);
        assert!(exact.abs_diff_eq(&drifted, 1e-9));
        assert!(!exact.abs_diff_eq(&GeometricModel { polygons: vec![shape(1e-3)] }, 1e-9));
        assert!(!exact.abs_diff_eq(&GeometricModel::default(), 1e-9));
    }

    #[test]
    fn test_totals() {
        let model = GeometricModel {
            polygons: vec![
                PolygonShape {
                    outline: vec![],
                    area: 25.0,
                    islands: 0,
                },
                PolygonShape {
                    outline: vec![],
                    area: 50.0,
                    islands: 1,
                },
            ],
        };
        assert_eq!(model.polygon_count(), 2);
        assert_eq!(model.total_area(), 75.0);
    }
}

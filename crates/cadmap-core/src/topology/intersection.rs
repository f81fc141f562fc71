//! 线段相交分类
//!
//! 分类相对于第一条线段：
//! - Touch: 单点相交，位于起点、终点或内部
//! - Graze: 共线重叠，覆盖起点、终点、仅内部，或整条线段

use crate::geometry::Segment;
use crate::math::{cross, Point2, EPSILON};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntersectionType {
    TouchStart,
    TouchEnd,
    /// 内部交叉或另一条线的端点落在内部
    TouchOther,
    GrazeStart,
    GrazeEnd,
    GrazeOther,
    /// 重叠覆盖整条线段
    GrazeTotal,
}

impl IntersectionType {
    pub fn is_graze(&self) -> bool {
        matches!(
            self,
            IntersectionType::GrazeStart
                | IntersectionType::GrazeEnd
                | IntersectionType::GrazeOther
                | IntersectionType::GrazeTotal
        )
    }
}

/// 一次相交
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionData {
    pub kind: IntersectionType,
    /// 交点；重叠时为重叠段起点
    pub position: Point2,
    /// 交点在第一条线段上的参数，用于排序
    pub param: f64,
    /// 重叠段终点及其参数
    pub graze_end: Option<(Point2, f64)>,
}

impl IntersectionData {
    /// 第一条线段需要断开的位置
    pub fn split_points(&self) -> Vec<(f64, Point2)> {
        let mut out = vec![(self.param, self.position)];
        if let Some((p, t)) = self.graze_end {
            out.push((t, p));
        }
        out
    }
}

fn touch(param: f64, position: Point2) -> IntersectionData {
    let kind = if param == 0.0 {
        IntersectionType::TouchStart
    } else if param == 1.0 {
        IntersectionType::TouchEnd
    } else {
        IntersectionType::TouchOther
    };
    IntersectionData {
        kind,
        position,
        param,
        graze_end: None,
    }
}

/// 计算 `a` 与 `b` 的相交
///
/// 端点附近（容差内）的交点吸附到端点，参数取 0 或 1。
pub fn intersect(a: &Segment, b: &Segment, tolerance: f64) -> Option<IntersectionData> {
    let d1 = a.vector();
    let d2 = b.vector();
    let len1 = d1.norm();
    let len2 = d2.norm();
    if len1 <= tolerance || len2 <= tolerance {
        return None;
    }
    if !a.bounding_box().expanded(tolerance).intersects(&b.bounding_box()) {
        return None;
    }
    let tol_t = tolerance / len1;

    if a.distance_to_line(&b.start) <= tolerance && a.distance_to_line(&b.end) <= tolerance {
        let t0 = a.param_of(&b.start);
        let t1 = a.param_of(&b.end);
        let (lo, lo_pt, hi, hi_pt) = if t0 <= t1 {
            (t0, b.start, t1, b.end)
        } else {
            (t1, b.end, t0, b.start)
        };
        if lo > 1.0 + tol_t || hi < -tol_t {
            return None;
        }

        let (s, s_pt) = if lo <= tol_t { (0.0, a.start) } else { (lo, lo_pt) };
        let (e, e_pt) = if hi >= 1.0 - tol_t { (1.0, a.end) } else { (hi, hi_pt) };

        if (e - s) * len1 <= tolerance {
            return Some(if s == 0.0 {
                touch(0.0, a.start)
            } else if e == 1.0 {
                touch(1.0, a.end)
            } else {
                touch(s, s_pt)
            });
        }

        let kind = match (s == 0.0, e == 1.0) {
            (true, true) => IntersectionType::GrazeTotal,
            (true, false) => IntersectionType::GrazeStart,
            (false, true) => IntersectionType::GrazeEnd,
            (false, false) => IntersectionType::GrazeOther,
        };
        return Some(IntersectionData {
            kind,
            position: s_pt,
            param: s,
            graze_end: Some((e_pt, e)),
        });
    }

    let denom = cross(&d1, &d2);
    if denom.abs() <= EPSILON * len1 * len2 {
        return None;
    }
    let w = b.start - a.start;
    let t = cross(&w, &d2) / denom;
    let u = cross(&w, &d1) / denom;
    let tol_u = tolerance / len2;
    if t < -tol_t || t > 1.0 + tol_t || u < -tol_u || u > 1.0 + tol_u {
        return None;
    }

    Some(if t <= tol_t {
        touch(0.0, a.start)
    } else if t >= 1.0 - tol_t {
        touch(1.0, a.end)
    } else if u <= tol_u {
        touch(t, b.start)
    } else if u >= 1.0 - tol_u {
        touch(t, b.end)
    } else {
        touch(t, crossing_point(a, b))
    })
}

fn point_order(a: &Point2, b: &Point2) -> Ordering {
    a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y))
}

/// 起点为字典序较小端点的同一条线段
fn ordered(s: &Segment) -> Segment {
    if point_order(&s.start, &s.end).is_le() {
        *s
    } else {
        Segment::new(s.end, s.start)
    }
}

/// 内部交叉点：与参数顺序和线段方向无关，两条线各自断开时得到同一个坐标
fn crossing_point(a: &Segment, b: &Segment) -> Point2 {
    let (a, b) = (ordered(a), ordered(b));
    let first = point_order(&a.start, &b.start).then(point_order(&a.end, &b.end));
    let (p, q) = if first.is_le() { (a, b) } else { (b, a) };
    let t = cross(&(q.start - p.start), &q.vector()) / cross(&p.vector(), &q.vector());
    p.point_at(t)
}

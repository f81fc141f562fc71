//! 几何图元定义
//!
//! 纯值类型，不含依赖跟踪：
//! - 线段 (Segment)
//! - 文本 (TextGeometry)
//! - 测量计算：方位角放样、两圆交点、多边形面积与点包含

use crate::math::{cross, BoundingBox2, Point2, Vector2, EPSILON};
use serde::{Deserialize, Serialize};

/// 线段
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Point2,
    pub end: Point2,
}

impl Segment {
    pub fn new(start: Point2, end: Point2) -> Self {
        Self { start, end }
    }

    /// 计算线段长度
    pub fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }

    /// 起点指向终点的向量（未归一化）
    pub fn vector(&self) -> Vector2 {
        self.end - self.start
    }

    /// 计算线段方向向量（单位向量），退化线段返回 None
    pub fn direction(&self) -> Option<Vector2> {
        let v = self.vector();
        let len = v.norm();
        (len > EPSILON).then(|| v / len)
    }

    /// 计算线段中点
    pub fn midpoint(&self) -> Point2 {
        Point2::new(
            (self.start.x + self.end.x) / 2.0,
            (self.start.y + self.end.y) / 2.0,
        )
    }

    /// 参数 t∈[0,1] 处的点
    pub fn point_at(&self, t: f64) -> Point2 {
        self.start + self.vector() * t
    }

    /// 点在线段所在直线上的投影参数（不截断）
    pub fn param_of(&self, point: &Point2) -> f64 {
        let v = self.vector();
        let len2 = v.norm_squared();
        if len2 < EPSILON {
            return 0.0;
        }
        (point - self.start).dot(&v) / len2
    }

    /// 计算点到线段的距离
    pub fn distance_to_point(&self, point: &Point2) -> f64 {
        let v = self.end - self.start;
        let w = point - self.start;

        let c1 = w.dot(&v);
        if c1 <= 0.0 {
            return (point - self.start).norm();
        }

        let c2 = v.dot(&v);
        if c2 <= c1 {
            return (point - self.end).norm();
        }

        let b = c1 / c2;
        let pb = self.start + v * b;
        (point - pb).norm()
    }

    /// 点到线段所在直线的垂距
    pub fn distance_to_line(&self, point: &Point2) -> f64 {
        let v = self.vector();
        let len = v.norm();
        if len < EPSILON {
            return (point - self.start).norm();
        }
        cross(&v, &(point - self.start)).abs() / len
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        BoundingBox2::new(self.start, self.end)
    }

    /// 两线段的交点：不平行且交点落在两条线段范围内（含容差）
    pub fn crossing(&self, other: &Segment, tolerance: f64) -> Option<Point2> {
        let d1 = self.vector();
        let d2 = other.vector();
        let denom = cross(&d1, &d2);
        let len1 = d1.norm();
        let len2 = d2.norm();
        if len1 < EPSILON || len2 < EPSILON || denom.abs() <= EPSILON * len1 * len2 {
            return None;
        }

        let w = other.start - self.start;
        let t = cross(&w, &d2) / denom;
        let u = cross(&w, &d1) / denom;
        let tol_t = tolerance / len1;
        let tol_u = tolerance / len2;
        if t < -tol_t || t > 1.0 + tol_t || u < -tol_u || u > 1.0 + tol_u {
            return None;
        }
        Some(self.point_at(t.clamp(0.0, 1.0)))
    }
}

/// 文本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextGeometry {
    /// 插入点
    pub position: Point2,
    /// 文本内容
    pub content: String,
    /// 文本高度
    pub height: f64,
    /// 旋转角度（弧度）
    pub rotation: f64,
}

impl TextGeometry {
    pub fn new(position: Point2, content: impl Into<String>, height: f64) -> Self {
        Self {
            position,
            content: content.into(),
            height,
            rotation: 0.0,
        }
    }

    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    /// 估算文本宽度（中文字符宽度接近高度，其余约为高度的0.6倍）
    pub fn estimated_width(&self) -> f64 {
        let char_count = self.content.chars().count();
        let cjk_count = self.content.chars().filter(|c| Self::is_cjk(*c)).count();
        let ascii_count = char_count - cjk_count;

        (cjk_count as f64 * self.height) + (ascii_count as f64 * self.height * 0.6)
    }

    fn is_cjk(c: char) -> bool {
        matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '\u{F900}'..='\u{FAFF}')
    }

    /// 获取包围盒（按旋转后的四个角点计算）
    pub fn bounding_box(&self) -> BoundingBox2 {
        let width = self.estimated_width();
        let (sin_r, cos_r) = self.rotation.sin_cos();
        let corners = [(0.0, 0.0), (width, 0.0), (width, self.height), (0.0, self.height)];

        BoundingBox2::from_points(corners.iter().map(|&(x, y)| {
            Point2::new(
                x * cos_r - y * sin_r + self.position.x,
                x * sin_r + y * cos_r + self.position.y,
            )
        }))
    }
}

/// 按方位角（自坐标北顺时针，弧度）和距离放样
pub fn bearing_offset(from: &Point2, bearing: f64, distance: f64) -> Point2 {
    let (sin_b, cos_b) = bearing.sin_cos();
    Point2::new(from.x + distance * sin_b, from.y + distance * cos_b)
}

/// 两圆交点
///
/// 返回 0 个（不相交或同心）、1 个（相切，容差内）或 2 个交点；
/// 两个交点时顺序为 [c1→c2 左侧, c1→c2 右侧]。
pub fn circle_intersections(
    c1: &Point2,
    r1: f64,
    c2: &Point2,
    r2: f64,
    tolerance: f64,
) -> Vec<Point2> {
    let v = c2 - c1;
    let d = v.norm();
    if d < tolerance {
        return Vec::new();
    }
    if d > r1 + r2 + tolerance || d < (r1 - r2).abs() - tolerance {
        return Vec::new();
    }

    let a = (r1 * r1 - r2 * r2 + d * d) / (2.0 * d);
    let h = (r1 * r1 - a * a).max(0.0).sqrt();
    let base = c1 + v * (a / d);
    if h <= tolerance {
        return vec![base];
    }

    let left = Vector2::new(-v.y, v.x) * (h / d);
    vec![base + left, base - left]
}

/// 多边形有向面积（逆时针为正）
pub fn signed_area(outline: &[Point2]) -> f64 {
    if outline.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for (i, p) in outline.iter().enumerate() {
        let q = &outline[(i + 1) % outline.len()];
        sum += p.x * q.y - q.x * p.y;
    }
    sum / 2.0
}

/// 射线法判断点是否在多边形内（边界上的点结果不确定）
pub fn point_in_polygon(point: &Point2, outline: &[Point2]) -> bool {
    let n = outline.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (&outline[i], &outline[j]);
        if (pi.y > point.y) != (pj.y > point.y) {
            let x = (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x;
            if point.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_segment_length() {
        let seg = Segment::new(Point2::new(0.0, 0.0), Point2::new(3.0, 4.0));
        assert!((seg.length() - 5.0).abs() < EPSILON);
        assert_relative_eq!(seg.param_of(&Point2::new(3.0, 4.0)), 1.0);
    }

    #[test]
    fn test_segment_crossing() {
        let a = Segment::new(Point2::new(0.0, 0.0), Point2::new(10.0, 10.0));
        let b = Segment::new(Point2::new(0.0, 10.0), Point2::new(10.0, 0.0));
        let x = a.crossing(&b, 1e-6).unwrap();
        assert_relative_eq!(x.x, 5.0, epsilon = 1e-9);
        assert_relative_eq!(x.y, 5.0, epsilon = 1e-9);

        let parallel = Segment::new(Point2::new(0.0, 1.0), Point2::new(10.0, 11.0));
        assert!(a.crossing(&parallel, 1e-6).is_none());

        let short = Segment::new(Point2::new(0.0, 10.0), Point2::new(4.0, 6.0));
        assert!(a.crossing(&short, 1e-6).is_none());
    }

    #[test]
    fn test_bearing_offset() {
        let origin = Point2::origin();
        let north = bearing_offset(&origin, 0.0, 5.0);
        assert_relative_eq!(north.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(north.y, 5.0, epsilon = 1e-12);

        let east = bearing_offset(&origin, FRAC_PI_2, 5.0);
        assert_relative_eq!(east.x, 5.0, epsilon = 1e-12);
        assert_relative_eq!(east.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_circle_intersections() {
        let c1 = Point2::new(0.0, 0.0);
        let c2 = Point2::new(10.0, 0.0);

        let both = circle_intersections(&c1, 6.0, &c2, 6.0, 1e-6);
        assert_eq!(both.len(), 2);
        // 左侧在前
        assert!(both[0].y > 0.0);
        assert!(both[1].y < 0.0);
        assert_relative_eq!(both[0].x, 5.0, epsilon = 1e-9);

        let tangent = circle_intersections(&c1, 5.0, &c2, 5.0, 1e-6);
        assert_eq!(tangent.len(), 1);

        assert!(circle_intersections(&c1, 4.0, &c2, 4.0, 1e-6).is_empty());
    }

    #[test]
    fn test_signed_area_and_containment() {
        let square = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
        ];
        assert_relative_eq!(signed_area(&square), 100.0);

        let mut reversed = square;
        reversed.reverse();
        assert_relative_eq!(signed_area(&reversed), -100.0);

        assert!(point_in_polygon(&Point2::new(5.0, 5.0), &square));
        assert!(!point_in_polygon(&Point2::new(15.0, 5.0), &square));
    }

    #[test]
    fn test_text_bounding_box() {
        let text = TextGeometry::new(Point2::new(1.0, 1.0), "ab", 2.0);
        let bbox = text.bounding_box();
        assert_relative_eq!(bbox.width(), 2.4, epsilon = 1e-9);
        assert_relative_eq!(bbox.height(), 2.0, epsilon = 1e-9);
    }
}

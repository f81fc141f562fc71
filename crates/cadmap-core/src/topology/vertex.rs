//! 拓扑顶点表与修复用的局部平面图
//!
//! 每次修复时新建：容差范围内的位置归并为同一个顶点，先登记的位置为准。
//! 局部图只在被访问的顶点处装载已有分界线，修复的工作量与变化的范围成正比。

use super::{DividerKey, DividerStatus, HalfEdge, Topology};
use crate::feature::FeatureId;
use crate::math::{BoundingBox2, Point2, EPSILON};
use std::collections::{HashMap, HashSet};

pub(crate) type VertexId = usize;

#[derive(Debug)]
pub(crate) struct VertexTable {
    tolerance: f64,
    cell_size: f64,
    grid: HashMap<(i64, i64), Vec<VertexId>>,
    positions: Vec<Point2>,
    points: Vec<Option<FeatureId>>,
}

impl VertexTable {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            cell_size: tolerance.max(EPSILON),
            grid: HashMap::new(),
            positions: Vec::new(),
            points: Vec::new(),
        }
    }

    fn cell(&self, p: &Point2) -> (i64, i64) {
        (
            (p.x / self.cell_size).floor() as i64,
            (p.y / self.cell_size).floor() as i64,
        )
    }

    fn find(&self, p: &Point2) -> Option<VertexId> {
        let (cx, cy) = self.cell(p);
        let mut best: Option<(VertexId, f64)> = None;
        for gx in cx - 1..=cx + 1 {
            for gy in cy - 1..=cy + 1 {
                let Some(ids) = self.grid.get(&(gx, gy)) else {
                    continue;
                };
                for id in ids {
                    let d = (self.positions[*id] - p).norm();
                    if d <= self.tolerance && best.map_or(true, |(_, bd)| d < bd) {
                        best = Some((*id, d));
                    }
                }
            }
        }
        best.map(|(id, _)| id)
    }

    /// 登记位置，返回归并后的顶点
    pub fn register(&mut self, p: Point2, point: Option<FeatureId>) -> VertexId {
        if let Some(id) = self.find(&p) {
            if self.points[id].is_none() {
                self.points[id] = point;
            }
            return id;
        }
        let id = self.positions.len();
        self.positions.push(p);
        self.points.push(point);
        let cell = self.cell(&p);
        self.grid.entry(cell).or_default().push(id);
        id
    }

    pub fn position(&self, id: VertexId) -> Point2 {
        self.positions[id]
    }

    /// 顶点上的点要素（交点顶点为 None）
    pub fn point(&self, id: VertexId) -> Option<FeatureId> {
        self.points[id]
    }
}

/// 修复过程中按需装载的顶点与出边
#[derive(Debug)]
pub(crate) struct LocalGraph {
    vertices: VertexTable,
    ends: HashMap<DividerKey, (VertexId, VertexId)>,
    incident: HashMap<VertexId, Vec<DividerKey>>,
    loaded: HashSet<VertexId>,
    /// 每个顶点的已连接出边，按角度升序；状态确定后才计算
    outgoing: HashMap<VertexId, Vec<(f64, HalfEdge)>>,
}

impl LocalGraph {
    pub fn new(tolerance: f64) -> Self {
        Self {
            vertices: VertexTable::new(tolerance),
            ends: HashMap::new(),
            incident: HashMap::new(),
            loaded: HashSet::new(),
            outgoing: HashMap::new(),
        }
    }

    /// 登记位置；先装载该处已有的分界线，使保留的端点优先
    pub fn vertex(&mut self, p: Point2, point: Option<FeatureId>, topo: &Topology) -> VertexId {
        self.load_at(p, topo);
        self.vertices.register(p, point)
    }

    fn load_at(&mut self, p: Point2, topo: &Topology) {
        let tol = self.vertices.tolerance;
        let area = BoundingBox2::new(p, p).expanded(tol);
        for line in topo.line_index.query_rect(&area) {
            for key in topo.dividers_of(line) {
                if self.ends.contains_key(key) {
                    continue;
                }
                let Some(d) = topo.dividers.get(*key) else {
                    continue;
                };
                if (d.start.position - p).norm() <= tol || (d.end.position - p).norm() <= tol {
                    let s = self.vertices.register(d.start.position, d.start.point);
                    let e = self.vertices.register(d.end.position, d.end.point);
                    self.add(*key, s, e);
                }
            }
        }
    }

    pub fn add(&mut self, key: DividerKey, s: VertexId, e: VertexId) {
        if self.ends.insert(key, (s, e)).is_some() {
            return;
        }
        if s != e {
            self.incident.entry(s).or_default().push(key);
            self.incident.entry(e).or_default().push(key);
        }
    }

    /// 顶点上的全部分界线（不论状态）
    pub fn incident(&mut self, v: VertexId, topo: &Topology) -> Vec<DividerKey> {
        if self.loaded.insert(v) {
            let p = self.vertices.position(v);
            self.load_at(p, topo);
        }
        self.incident.get(&v).cloned().unwrap_or_default()
    }

    /// 两个顶点之间已有的分界线
    pub fn edge_between(&mut self, a: VertexId, b: VertexId, topo: &Topology) -> Option<DividerKey> {
        let target = (a.min(b), a.max(b));
        self.incident(a, topo).into_iter().find(|k| {
            self.ends
                .get(k)
                .is_some_and(|(s, e)| ((*s).min(*e), (*s).max(*e)) == target)
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.positions.len()
    }

    pub fn ends(&self, key: DividerKey) -> Option<(VertexId, VertexId)> {
        self.ends.get(&key).copied()
    }

    pub fn from_to(&self, he: HalfEdge) -> Option<(VertexId, VertexId)> {
        let (s, e) = self.ends(he.0)?;
        Some(if he.1 { (s, e) } else { (e, s) })
    }

    pub fn position(&self, v: VertexId) -> Point2 {
        self.vertices.position(v)
    }

    pub fn point(&self, v: VertexId) -> Option<FeatureId> {
        self.vertices.point(v)
    }

    /// 顶点的已连接出边，按角度升序
    pub fn outgoing(&mut self, v: VertexId, topo: &Topology) -> &[(f64, HalfEdge)] {
        if !self.outgoing.contains_key(&v) {
            let here = self.position(v);
            let mut list = Vec::new();
            for key in self.incident(v, topo) {
                let connected = topo
                    .dividers
                    .get(key)
                    .is_some_and(|d| d.status == DividerStatus::Connected);
                let Some((s, e)) = self.ends(key).filter(|_| connected) else {
                    continue;
                };
                let (forward, other) = if s == v { (true, e) } else { (false, s) };
                let there = self.position(other);
                list.push(((there.y - here.y).atan2(there.x - here.x), (key, forward)));
            }
            list.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            self.outgoing.insert(v, list);
        }
        self.outgoing.get(&v).map(|l| l.as_slice()).unwrap_or(&[])
    }

    /// 面左侧追踪的下一条半边：到达顶点处孪生边顺时针方向的下一条出边
    pub fn next(&mut self, he: HalfEdge, topo: &Topology) -> Option<HalfEdge> {
        let twin = (he.0, !he.1);
        let (vertex, _) = self.from_to(twin)?;
        let list = self.outgoing(vertex, topo);
        let i = list.iter().position(|(_, h)| *h == twin)?;
        let n = list.len();
        Some(list[(i + n - 1) % n].1)
    }
}

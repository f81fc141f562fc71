//! 多边形拓扑
//!
//! 由有效的拓扑线推导分界线与环：
//! 1. 两两计算范围重叠的线的相交类型，在交点处把线断开成分界线；
//!    完全重合的一段只建一条分界线，记录所有覆盖它的线
//! 2. 反复修剪悬空的分界线，剩下的分界线两端都有连接
//! 3. 在每个顶点按角度排序出边，沿"孪生边顺时针方向的下一条出边"追踪面，
//!    面始终在行进方向左侧；面积为正是多边形，否则是岛
//! 4. 回填分界线左右侧的环引用，岛寻找包含它的最小多边形
//!
//! 增量修复只删除与变化分界线相邻的环并重新追踪缺少环的一侧，
//! 其余环保持原有键不变。顶点和出边只在修复经过的位置按需装载。

pub mod check;
pub mod divider;
pub mod intersection;
pub mod keys;
pub mod ring;
pub mod snapshot;
mod vertex;

pub use check::{CheckItem, CheckType};
pub use divider::{Divider, DividerStatus, Side, Terminal};
pub use intersection::{intersect, IntersectionData, IntersectionType};
pub use keys::{DividerKey, RingKey};
pub use ring::{BoundaryFace, Ring, RingFlags, RingKind};
pub use snapshot::{GeometricModel, PolygonShape};

use crate::config::TopologyConfig;
use crate::error::TopologyError;
use crate::feature::{FeatureGraph, FeatureId};
use crate::geometry::{signed_area, Segment};
use crate::math::{BoundingBox2, Point2};
use crate::spatial::SpatialIndex;
use rayon::prelude::*;
use slotmap::SlotMap;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};
use vertex::{LocalGraph, VertexId};

/// 半边：分界线及行进方向（true 为起点→终点）
type HalfEdge = (DividerKey, bool);

fn side_of(forward: bool) -> Side {
    if forward {
        Side::Left
    } else {
        Side::Right
    }
}

/// 一次修复的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub lines: usize,
    pub dividers_removed: usize,
    pub dividers_created: usize,
    pub rings_deleted: usize,
    pub rings_created: usize,
    /// 新出现的悬空分界线
    pub dangles: usize,
    /// 修复经过的顶点
    pub vertices: usize,
}

impl RepairReport {
    pub fn merge(&mut self, other: &RepairReport) {
        self.lines += other.lines;
        self.dividers_removed += other.dividers_removed;
        self.dividers_created += other.dividers_created;
        self.rings_deleted += other.rings_deleted;
        self.rings_created += other.rings_created;
        self.dangles += other.dangles;
        self.vertices += other.vertices;
    }
}

/// 拓扑模型
#[derive(Debug, Clone)]
pub struct Topology {
    config: TopologyConfig,
    dividers: SlotMap<DividerKey, Divider>,
    rings: SlotMap<RingKey, Ring>,
    line_dividers: BTreeMap<FeatureId, Vec<DividerKey>>,
    line_index: SpatialIndex<FeatureId>,
    ring_index: SpatialIndex<RingKey>,
    dirty: BTreeSet<FeatureId>,
}

impl Topology {
    pub fn new(config: TopologyConfig) -> Self {
        Self {
            line_index: SpatialIndex::new(config.grid_cell_size),
            ring_index: SpatialIndex::new(config.grid_cell_size),
            config,
            dividers: SlotMap::with_key(),
            rings: SlotMap::with_key(),
            line_dividers: BTreeMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    pub fn config(&self) -> &TopologyConfig {
        &self.config
    }

    pub fn divider(&self, key: DividerKey) -> Option<&Divider> {
        self.dividers.get(key)
    }

    pub fn ring(&self, key: RingKey) -> Option<&Ring> {
        self.rings.get(key).filter(|r| !r.is_deleted())
    }

    pub fn dividers(&self) -> impl Iterator<Item = (DividerKey, &Divider)> {
        self.dividers.iter()
    }

    pub fn rings(&self) -> impl Iterator<Item = (RingKey, &Ring)> {
        self.rings.iter().filter(|(_, r)| !r.is_deleted())
    }

    pub fn polygons(&self) -> impl Iterator<Item = (RingKey, &Ring)> {
        self.rings().filter(|(_, r)| r.is_polygon())
    }

    pub fn divider_count(&self) -> usize {
        self.dividers.len()
    }

    pub fn ring_count(&self) -> usize {
        self.rings().count()
    }

    /// 线被断开成的分界线
    pub fn dividers_of(&self, line: FeatureId) -> &[DividerKey] {
        self.line_dividers
            .get(&line)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// 以某条线为边界的环
    pub fn rings_of_line(&self, line: FeatureId) -> Vec<RingKey> {
        let mut out = Vec::new();
        for key in self.dividers_of(line) {
            if let Some(d) = self.dividers.get(*key) {
                for ring in [d.left, d.right].into_iter().flatten() {
                    if !out.contains(&ring) {
                        out.push(ring);
                    }
                }
            }
        }
        out
    }

    /// 包含该点的最小多边形
    pub fn polygon_at(&self, p: &Point2) -> Option<RingKey> {
        self.ring_index
            .query_point(p)
            .into_iter()
            .filter_map(|k| self.ring(k).map(|r| (k, r)))
            .filter(|(_, r)| r.is_polygon() && r.contains_point(p))
            .min_by(|a, b| a.1.area.total_cmp(&b.1.area))
            .map(|(k, _)| k)
    }

    /// 标记需要重新断开的线（移动、新建、失效）
    pub fn mark_dirty(&mut self, line: FeatureId) {
        self.dirty.insert(line);
    }

    pub fn has_pending_repair(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// 增量修复所有被标记的线
    pub fn repair(&mut self, features: &FeatureGraph) -> Result<RepairReport, TopologyError> {
        if !self.has_pending_repair() {
            return Ok(RepairReport::default());
        }
        let dirty = std::mem::take(&mut self.dirty);
        let affected = self.affected_lines(&dirty, features);
        let report = self.retrace(&affected, features, false)?;
        debug!(
            dirty = dirty.len(),
            lines = report.lines,
            rings_deleted = report.rings_deleted,
            rings_created = report.rings_created,
            "Topology repaired"
        );
        Ok(report)
    }

    /// 丢弃现有拓扑并由全部拓扑线重建
    pub fn rebuild(&mut self, features: &FeatureGraph) -> Result<RepairReport, TopologyError> {
        self.dividers.clear();
        self.rings.clear();
        self.line_dividers.clear();
        self.line_index.clear();
        self.ring_index.clear();
        self.dirty.clear();

        let lines: BTreeSet<FeatureId> = features.topological_lines().into_iter().collect();
        let report = self.retrace(&lines, features, self.config.parallel_rebuild)?;
        debug!(
            lines = report.lines,
            dividers = self.dividers.len(),
            rings = report.rings_created,
            "Topology rebuilt"
        );
        Ok(report)
    }

    /// 受影响的线：被标记的线、与其新旧范围重叠的线，以及与它们共用分界线的线
    fn affected_lines(&self, dirty: &BTreeSet<FeatureId>, features: &FeatureGraph) -> BTreeSet<FeatureId> {
        let tol = self.config.tolerance;
        let mut affected = dirty.clone();
        for line in dirty {
            if let Some(old) = self.line_index.get_bbox(line) {
                affected.extend(self.line_index.query_rect(&old.expanded(tol)));
            }
            if features.is_topological_line(*line) {
                if let Ok(seg) = features.segment(*line) {
                    affected.extend(self.line_index.query_rect(&seg.bounding_box().expanded(tol)));
                }
            }
        }

        let mut queue: Vec<FeatureId> = affected.iter().copied().collect();
        while let Some(line) = queue.pop() {
            for key in self.dividers_of(line) {
                if let Some(d) = self.dividers.get(*key) {
                    for other in &d.lines {
                        if affected.insert(*other) {
                            queue.push(*other);
                        }
                    }
                }
            }
        }
        affected
    }

    /// 删除环，失去环的分界线记入 `opened`
    fn delete_ring(
        &mut self,
        key: RingKey,
        deleted: &mut Vec<RingKey>,
        opened: &mut HashSet<DividerKey>,
    ) {
        let Some(ring) = self.rings.get_mut(key) else {
            return;
        };
        if ring.is_deleted() {
            return;
        }
        ring.flags.insert(RingFlags::DELETED);
        ring.flags.remove(RingFlags::INDEXED);
        let edges = ring.edges.clone();
        for edge in edges {
            if let Some(d) = self.dividers.get_mut(edge.divider) {
                if d.ring(edge.side) == Some(key) {
                    d.set_ring(edge.side, None);
                    opened.insert(edge.divider);
                }
            }
        }
        self.ring_index.remove(&key);
        deleted.push(key);
    }

    /// 重新断开 `affected` 中的线并修复相邻的环
    fn retrace(
        &mut self,
        affected: &BTreeSet<FeatureId>,
        features: &FeatureGraph,
        parallel: bool,
    ) -> Result<RepairReport, TopologyError> {
        let tol = self.config.tolerance;
        let mut report = RepairReport {
            lines: affected.len(),
            ..Default::default()
        };

        // 更新线索引
        let mut segments: BTreeMap<FeatureId, Segment> = BTreeMap::new();
        for line in affected {
            let seg = features
                .is_topological_line(*line)
                .then(|| features.segment(*line).ok())
                .flatten()
                .filter(|s| s.length() > tol);
            match seg {
                Some(seg) => {
                    self.line_index.insert(*line, seg.bounding_box());
                    segments.insert(*line, seg);
                }
                None => {
                    self.line_index.remove(line);
                }
            }
        }

        let splits = self.split_points(&segments, features, parallel);

        // 删除旧分界线及其两侧的环
        let mut deleted_rings = Vec::new();
        let mut opened = HashSet::new();
        let mut loose_ends = Vec::new();
        let mut removed: Vec<DividerKey> = affected
            .iter()
            .filter_map(|line| self.line_dividers.remove(line))
            .flatten()
            .collect();
        removed.sort();
        removed.dedup();
        for key in &removed {
            if let Some(d) = self.dividers.get(*key) {
                let sides = [d.left, d.right];
                loose_ends.push(d.start.position);
                loose_ends.push(d.end.position);
                for ring in sides.into_iter().flatten() {
                    self.delete_ring(ring, &mut deleted_rings, &mut opened);
                }
            }
            self.dividers.remove(*key);
        }
        report.dividers_removed = removed.len();

        // 顶点：保留的分界线端点优先
        let mut graph = LocalGraph::new(tol);
        for line in segments.keys() {
            if let Some((sp, ep)) = features.line_ends(*line) {
                let seg = segments[line];
                graph.vertex(seg.start, Some(sp), self);
                graph.vertex(seg.end, Some(ep), self);
            }
        }

        // 新分界线，状态稍后确定
        let mut created: HashSet<DividerKey> = HashSet::new();
        for (line, mut points) in splits {
            let seg = segments[&line];
            let (sp, ep) = match features.line_ends(line) {
                Some((s, e)) => (Some(s), Some(e)),
                None => (None, None),
            };
            points.push((0.0, seg.start));
            points.push((1.0, seg.end));
            points.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut chain: Vec<VertexId> = Vec::with_capacity(points.len());
            for (t, p) in points {
                let point = if t == 0.0 {
                    sp
                } else if t == 1.0 {
                    ep
                } else {
                    None
                };
                let v = graph.vertex(p, point, self);
                if chain.last() != Some(&v) {
                    chain.push(v);
                }
            }

            let mut keys = Vec::new();
            for pair in chain.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                let key = match graph.edge_between(a, b, self) {
                    Some(key) => {
                        if let Some(d) = self.dividers.get_mut(key) {
                            if !d.lines.contains(&line) {
                                d.lines.push(line);
                            }
                        }
                        key
                    }
                    None => {
                        let terminal = |v: VertexId| Terminal {
                            position: graph.position(v),
                            point: graph.point(v),
                        };
                        let mut divider = Divider::new(line, terminal(a), terminal(b));
                        divider.status = DividerStatus::Dangle;
                        let key = self.dividers.insert(divider);
                        graph.add(key, a, b);
                        created.insert(key);
                        key
                    }
                };
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
            self.line_dividers.insert(line, keys);
        }
        for key in &created {
            let Some((s, e)) = graph.ends(*key) else {
                continue;
            };
            if let Some(d) = self.dividers.get_mut(*key) {
                d.start.point = graph.point(s);
                d.end.point = graph.point(e);
            }
        }
        report.dividers_created = created.len();

        let loose: Vec<VertexId> = loose_ends
            .into_iter()
            .map(|p| graph.vertex(p, None, self))
            .collect();
        let (newly_connected, newly_dangling) = self.settle(&mut graph, loose, &created);
        for key in &newly_dangling {
            if let Some(d) = self.dividers.get(*key) {
                let sides = [d.left, d.right];
                for ring in sides.into_iter().flatten() {
                    self.delete_ring(ring, &mut deleted_rings, &mut opened);
                }
            }
        }
        report.dangles = newly_dangling.len();

        // 新连接的分界线落入的面需要重新追踪
        let inserted: HashSet<DividerKey> = newly_connected.iter().copied().collect();
        let mut split_faces = Vec::new();
        for key in &newly_connected {
            for forward in [true, false] {
                let he = (*key, forward);
                let Some((vertex, _)) = graph.from_to(he) else {
                    continue;
                };
                let list = graph.outgoing(vertex, self);
                let Some(i) = list.iter().position(|(_, h)| *h == he) else {
                    continue;
                };
                let n = list.len();
                for step in 1..n {
                    let (dk, fwd) = list[(i + n - step) % n].1;
                    if inserted.contains(&dk) {
                        continue;
                    }
                    if let Some(ring) = self.dividers.get(dk).and_then(|d| d.ring(side_of(fwd))) {
                        split_faces.push(ring);
                    }
                    break;
                }
            }
        }
        for ring in split_faces {
            self.delete_ring(ring, &mut deleted_rings, &mut opened);
        }

        // 追踪缺少环的一侧：只可能是新连接的或刚失去环的分界线
        let mut pending: BTreeSet<DividerKey> = opened.into_iter().collect();
        pending.extend(newly_connected);
        let mut created_rings = Vec::new();
        for key in pending {
            for forward in [true, false] {
                let missing = self.dividers.get(key).is_some_and(|d| {
                    d.status == DividerStatus::Connected && d.ring(side_of(forward)).is_none()
                });
                if missing {
                    created_rings.push(self.trace_face((key, forward), &mut graph)?);
                }
            }
        }

        for key in &created_rings {
            if let Some(ring) = self.rings.get_mut(*key) {
                self.ring_index.insert(*key, ring.extent);
                ring.flags.insert(RingFlags::INDEXED);
            }
        }
        self.update_enclosures(&created_rings, &deleted_rings);

        for key in &deleted_rings {
            self.rings.remove(*key);
        }
        report.rings_deleted = deleted_rings.len();
        report.rings_created = created_rings.len();
        report.vertices = graph.vertex_count();

        if report.dangles > 0 {
            warn!(dangles = report.dangles, "Topology has dangling dividers");
        }
        Ok(report)
    }

    /// 确定分界线状态，返回新连接和新悬空的分界线
    ///
    /// 先从失去分界线的顶点剥离只剩一条连接边的链；再把仍有连接边的顶点当作锚点，
    /// 在其余非连接的分界线中反复修剪度为1的非锚点顶点，剩下的分界线转为连接。
    /// 只访问从变化处经由非连接分界线可达的顶点。
    fn settle(
        &mut self,
        graph: &mut LocalGraph,
        loose: Vec<VertexId>,
        created: &HashSet<DividerKey>,
    ) -> (Vec<DividerKey>, Vec<DividerKey>) {
        let connected = |topo: &Topology, key: &DividerKey| {
            topo.dividers
                .get(*key)
                .is_some_and(|d| d.status == DividerStatus::Connected)
        };

        let mut peeled = HashSet::new();
        let mut stack = loose.clone();
        while let Some(v) = stack.pop() {
            let core: Vec<DividerKey> = graph
                .incident(v, self)
                .into_iter()
                .filter(|k| connected(self, k))
                .collect();
            let [key] = core.as_slice() else {
                continue;
            };
            let key = *key;
            if let Some(d) = self.dividers.get_mut(key) {
                d.status = DividerStatus::Dangle;
            }
            peeled.insert(key);
            if let Some((s, e)) = graph.ends(key) {
                stack.push(if s == v { e } else { s });
            }
        }

        let mut stack = loose;
        for key in created.iter().chain(peeled.iter()) {
            if let Some((s, e)) = graph.ends(*key) {
                stack.push(s);
                stack.push(e);
            }
        }
        let seeds: HashSet<VertexId> = stack.iter().copied().collect();
        let mut explored = HashSet::new();
        let mut anchors = HashSet::new();
        let mut candidates: BTreeSet<DividerKey> = BTreeSet::new();
        while let Some(v) = stack.pop() {
            if !explored.insert(v) {
                continue;
            }
            let incident = graph.incident(v, self);
            if incident.iter().any(|k| connected(self, k)) {
                anchors.insert(v);
                if !seeds.contains(&v) {
                    continue;
                }
            }
            for key in incident {
                if !connected(self, &key) && candidates.insert(key) {
                    if let Some((s, e)) = graph.ends(key) {
                        stack.push(s);
                        stack.push(e);
                    }
                }
            }
        }

        let mut degree: HashMap<VertexId, usize> = HashMap::new();
        for key in &candidates {
            if let Some((s, e)) = graph.ends(*key) {
                *degree.entry(s).or_default() += 1;
                *degree.entry(e).or_default() += 1;
            }
        }
        let mut alive = candidates.clone();
        let mut stack: Vec<VertexId> = degree
            .iter()
            .filter(|(v, d)| **d == 1 && !anchors.contains(*v))
            .map(|(v, _)| *v)
            .collect();
        while let Some(v) = stack.pop() {
            if anchors.contains(&v) || degree.get(&v) != Some(&1) {
                continue;
            }
            let Some(key) = graph.incident(v, self).into_iter().find(|k| alive.contains(k)) else {
                continue;
            };
            alive.remove(&key);
            if let Some((s, e)) = graph.ends(key) {
                for w in [s, e] {
                    if let Some(d) = degree.get_mut(&w) {
                        *d -= 1;
                        if *d == 1 && !anchors.contains(&w) {
                            stack.push(w);
                        }
                    }
                }
            }
        }

        let mut newly_connected = Vec::new();
        let mut newly_dangling = Vec::new();
        for key in candidates {
            let status = if alive.contains(&key) {
                DividerStatus::Connected
            } else {
                let Some((s, e)) = graph.ends(key) else {
                    continue;
                };
                if graph.incident(s, self).len() == 1 && graph.incident(e, self).len() == 1 {
                    DividerStatus::Floating
                } else {
                    DividerStatus::Dangle
                }
            };
            let was = peeled.contains(&key);
            if status == DividerStatus::Connected && !was {
                newly_connected.push(key);
            }
            if status != DividerStatus::Connected && (was || created.contains(&key)) {
                newly_dangling.push(key);
            }
            if let Some(d) = self.dividers.get_mut(key) {
                d.status = status;
            }
        }
        (newly_connected, newly_dangling)
    }

    /// 每条线需要断开的参数位置
    fn split_points(
        &self,
        segments: &BTreeMap<FeatureId, Segment>,
        features: &FeatureGraph,
        parallel: bool,
    ) -> Vec<(FeatureId, Vec<(f64, Point2)>)> {
        let tol = self.config.tolerance;
        let index = &self.line_index;
        let compute = |(line, seg): (&FeatureId, &Segment)| {
            let mut points = Vec::new();
            for other in index.query_rect(&seg.bounding_box().expanded(tol)) {
                if other == *line {
                    continue;
                }
                let other_seg = match segments.get(&other) {
                    Some(s) => *s,
                    None => match features.segment(other) {
                        Ok(s) => s,
                        Err(_) => continue,
                    },
                };
                if let Some(x) = intersect(seg, &other_seg, tol) {
                    points.extend(x.split_points());
                }
            }
            (*line, points)
        };

        if parallel {
            segments.par_iter().map(compute).collect()
        } else {
            segments.iter().map(compute).collect()
        }
    }

    fn trace_face(&mut self, start: HalfEdge, graph: &mut LocalGraph) -> Result<RingKey, TopologyError> {
        let start_pos = graph
            .from_to(start)
            .map_or(Point2::origin(), |(v, _)| graph.position(v));
        let not_closed = || TopologyError::RingNotClosed {
            x: start_pos.x,
            y: start_pos.y,
        };

        let mut edges = Vec::new();
        let mut outline = Vec::new();
        let mut visited = HashSet::new();
        let mut he = start;
        loop {
            if !visited.insert(he) {
                return Err(not_closed());
            }
            let taken = self
                .dividers
                .get(he.0)
                .map_or(true, |d| d.ring(side_of(he.1)).is_some());
            if taken {
                return Err(not_closed());
            }
            edges.push(BoundaryFace {
                divider: he.0,
                side: side_of(he.1),
            });
            let (from, _) = graph.from_to(he).ok_or_else(not_closed)?;
            outline.push(graph.position(from));

            he = graph.next(he, self).ok_or_else(not_closed)?;
            if he == start {
                break;
            }
        }

        let area = signed_area(&outline);
        let mut flags = RingFlags::default();
        if edges
            .iter()
            .any(|e| self.dividers.get(e.divider).is_some_and(|d| d.is_overlap()))
        {
            flags.insert(RingFlags::OVERLAP);
        }
        let ring = Ring {
            kind: if area > 0.0 {
                RingKind::Polygon
            } else {
                RingKind::Island
            },
            extent: BoundingBox2::from_points(outline.iter().copied()),
            edges,
            outline,
            area,
            flags,
            enclosed_by: None,
        };
        let edges = ring.edges.clone();
        let key = self.rings.insert(ring);
        for edge in edges {
            if let Some(d) = self.dividers.get_mut(edge.divider) {
                d.set_ring(edge.side, Some(key));
            }
        }
        Ok(key)
    }

    fn islands_in(&self, extent: &BoundingBox2, keep: impl Fn(&Ring) -> bool) -> Vec<RingKey> {
        self.ring_index
            .query_rect(extent)
            .into_iter()
            .filter(|k| {
                self.rings
                    .get(*k)
                    .is_some_and(|r| !r.is_deleted() && !r.is_polygon() && keep(r))
            })
            .collect()
    }

    /// 重新确定岛的归属：新岛、原归属被删除的岛、与新多边形重叠的岛
    fn update_enclosures(&mut self, created: &[RingKey], deleted: &[RingKey]) {
        let mut islands: BTreeSet<RingKey> = BTreeSet::new();
        for key in created {
            let Some(ring) = self.rings.get(*key) else {
                continue;
            };
            if !ring.is_polygon() {
                islands.insert(*key);
                continue;
            }
            let extent = ring.extent;
            islands.extend(self.islands_in(&extent, |r| r.extent.intersects(&extent)));
        }
        for key in deleted {
            let Some(ring) = self.rings.get(*key).filter(|r| r.is_polygon()) else {
                continue;
            };
            let extent = ring.extent;
            islands.extend(self.islands_in(&extent, |r| r.enclosed_by == Some(*key)));
        }

        for island in islands {
            let Some(ring) = self.rings.get(island) else {
                continue;
            };
            let Some(probe) = ring.outline.first().copied() else {
                continue;
            };
            // 同一连通部分的多边形都在岛的外轮廓之内，面积不超过岛
            let outer = -ring.area * (1.0 + 1e-9);
            let enclosing = self
                .ring_index
                .query_point(&probe)
                .into_iter()
                .filter_map(|k| self.rings.get(k).map(|r| (k, r)))
                .filter(|(_, r)| r.is_polygon() && !r.is_deleted())
                .filter(|(_, r)| r.area > outer)
                .filter(|(_, r)| r.contains_point(&probe))
                .min_by(|a, b| a.1.area.total_cmp(&b.1.area))
                .map(|(k, _)| k);

            if let Some(ring) = self.rings.get_mut(island) {
                ring.enclosed_by = enclosing;
                ring.flags.set(RingFlags::FLOATING, enclosing.is_none());
            }
        }
    }

    /// 检查分界线与环之间的一致性
    pub fn validate(&self) -> Result<(), TopologyError> {
        let tol = self.config.tolerance;
        for (key, ring) in self.rings() {
            let n = ring.edges.len();
            if n == 0 {
                return Err(TopologyError::BackReference("ring without edges".into()));
            }
            let ends: Vec<(Point2, Point2)> = ring
                .edges
                .iter()
                .map(|edge| -> Result<(Point2, Point2), TopologyError> {
                    let d = self.dividers.get(edge.divider).ok_or_else(|| {
                        TopologyError::BackReference("ring refers to a removed divider".into())
                    })?;
                    if d.ring(edge.side) != Some(key) {
                        return Err(TopologyError::BackReference(format!(
                            "{:?} side of a divider does not point back to its ring",
                            edge.side
                        )));
                    }
                    Ok(if edge.forward() {
                        (d.start.position, d.end.position)
                    } else {
                        (d.end.position, d.start.position)
                    })
                })
                .collect::<Result<_, _>>()?;

            for i in 0..n {
                let to = ends[i].1;
                let next_from = ends[(i + 1) % n].0;
                if (to - next_from).norm() > tol {
                    return Err(TopologyError::RingNotClosed { x: to.x, y: to.y });
                }
            }

            let outline: Vec<Point2> = ends.iter().map(|e| e.0).collect();
            let positive = signed_area(&outline) > 0.0;
            if positive != ring.is_polygon() {
                return Err(TopologyError::Winding(format!(
                    "{:?} ring has signed area {:.3}",
                    ring.kind, ring.area
                )));
            }
        }

        for (key, d) in &self.dividers {
            for side in [Side::Left, Side::Right] {
                let Some(ring_key) = d.ring(side) else {
                    continue;
                };
                let ring = self.ring(ring_key).ok_or_else(|| {
                    TopologyError::BackReference("divider refers to a removed ring".into())
                })?;
                if !ring.edges.contains(&BoundaryFace { divider: key, side }) {
                    return Err(TopologyError::BackReference(format!(
                        "ring does not list the divider on its {side:?} side"
                    )));
                }
            }
            if d.status != DividerStatus::Connected && (d.left.is_some() || d.right.is_some()) {
                return Err(TopologyError::BackReference(
                    "dangling divider bounds a ring".into(),
                ));
            }
        }
        Ok(())
    }
}

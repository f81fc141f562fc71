//! 要素图
//!
//! 点、线、文本要素存放在以 [`FeatureId`] 为键的表中，每个要素由唯一的创建操作拥有。
//! 依赖关系（线依赖端点、操作依赖输入）只保存 id，通过表查找，不持有所有权。
//!
//! 重合的点通过 [`Node`] 共享位置：节点由最先创建的点拥有，其余成员点读取节点坐标。
//!
//! 所有点位修改都必须经过 [`FeatureGraph::move_point`]，它在写入前后依次通知每个依赖者。

use crate::config::EngineConfig;
use crate::context::{EditingContext, PositionChange};
use crate::error::EditError;
use crate::geometry::{Segment, TextGeometry};
use crate::math::{BoundingBox2, Point2};
use crate::operation::OperationId;
use crate::spatial::SpatialIndex;
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};
use std::collections::BTreeMap;
use std::fmt;

new_key_type! {
    /// 共享节点键
    pub struct NodeKey;
}

/// 要素ID（持久化时写入，跨版本稳定）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureId(pub u32);

impl FeatureId {
    /// 尚未绑定的引用
    pub const NULL: FeatureId = FeatureId(0);

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F{}", self.0)
    }
}

/// 要素类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureKind {
    Point,
    Line,
    Text,
}

/// 要素几何
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureGeometry {
    /// 自有坐标的点
    Point { position: Point2, z: Option<f64> },
    /// 通过节点读取坐标的点
    SharedPoint { node: NodeKey },
    /// 连接两个点要素的线
    Line {
        start: FeatureId,
        end: FeatureId,
        /// 是否参与多边形拓扑
        topological: bool,
    },
    Text(TextGeometry),
}

impl FeatureGeometry {
    pub fn kind(&self) -> FeatureKind {
        match self {
            FeatureGeometry::Point { .. } | FeatureGeometry::SharedPoint { .. } => FeatureKind::Point,
            FeatureGeometry::Line { .. } => FeatureKind::Line,
            FeatureGeometry::Text(_) => FeatureKind::Text,
        }
    }
}

/// 依赖者（弱引用，仅用于查找）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dependent {
    /// 以该要素为输入的操作
    Operation(OperationId),
    /// 以该点为端点的线
    Line(FeatureId),
}

/// 要素
#[derive(Debug, Clone)]
pub struct Feature {
    pub id: FeatureId,
    pub geometry: FeatureGeometry,
    /// 创建操作，创建后不再改变
    pub creator: OperationId,
    pub dependents: Vec<Dependent>,
    /// 被细分或删除的要素
    pub inactive: bool,
}

impl Feature {
    pub fn kind(&self) -> FeatureKind {
        self.geometry.kind()
    }

    pub fn is_active(&self) -> bool {
        !self.inactive
    }
}

/// 共享位置节点
#[derive(Debug, Clone)]
pub struct Node {
    pub position: Point2,
    pub z: Option<f64>,
    /// 可以移动节点的点
    pub owner: FeatureId,
    pub members: Vec<FeatureId>,
}

/// 移动通知接收者
pub trait MoveObserver {
    /// 写入新位置之前调用，每个依赖者一次
    fn on_pre_move(&mut self, moved: FeatureId, dependent: Dependent);
    /// 写入新位置之后调用，每个依赖者一次
    fn on_post_move(&mut self, moved: FeatureId, dependent: Dependent);
}

/// 忽略所有通知
#[derive(Debug, Default)]
pub struct NoObserver;

impl MoveObserver for NoObserver {
    fn on_pre_move(&mut self, _moved: FeatureId, _dependent: Dependent) {}
    fn on_post_move(&mut self, _moved: FeatureId, _dependent: Dependent) {}
}

/// 要素图
#[derive(Debug, Clone)]
pub struct FeatureGraph {
    features: BTreeMap<FeatureId, Feature>,
    nodes: SlotMap<NodeKey, Node>,
    /// 点要素位置索引，用于发现重合点
    point_index: SpatialIndex<FeatureId>,
    next_id: u32,
    tolerance: f64,
}

impl FeatureGraph {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            features: BTreeMap::new(),
            nodes: SlotMap::with_key(),
            point_index: SpatialIndex::new(config.topology.grid_cell_size),
            next_id: 1,
            tolerance: config.tolerance(),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn get(&self, id: FeatureId) -> Option<&Feature> {
        self.features.get(&id)
    }

    pub fn contains(&self, id: FeatureId) -> bool {
        self.features.contains_key(&id)
    }

    /// 按ID顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.values()
    }

    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn node_of(&self, id: FeatureId) -> Option<NodeKey> {
        match self.features.get(&id)?.geometry {
            FeatureGeometry::SharedPoint { node } => Some(node),
            _ => None,
        }
    }

    fn feature(&self, id: FeatureId) -> Result<&Feature, EditError> {
        self.features.get(&id).ok_or(EditError::UnknownFeature(id))
    }

    fn feature_mut(&mut self, id: FeatureId) -> Result<&mut Feature, EditError> {
        self.features.get_mut(&id).ok_or(EditError::UnknownFeature(id))
    }

    pub fn kind_of(&self, id: FeatureId) -> Result<FeatureKind, EditError> {
        Ok(self.feature(id)?.kind())
    }

    /// 检查要素存在且类型符合
    pub fn expect_kind(&self, id: FeatureId, expected: FeatureKind) -> Result<(), EditError> {
        let found = self.kind_of(id)?;
        if found != expected {
            return Err(EditError::WrongKind {
                feature: id,
                expected,
                found,
            });
        }
        Ok(())
    }

    /// 点的当前位置（共享点读取节点）
    pub fn position(&self, id: FeatureId) -> Option<Point2> {
        match &self.features.get(&id)?.geometry {
            FeatureGeometry::Point { position, .. } => Some(*position),
            FeatureGeometry::SharedPoint { node } => self.nodes.get(*node).map(|n| n.position),
            _ => None,
        }
    }

    pub fn z(&self, id: FeatureId) -> Option<f64> {
        match &self.features.get(&id)?.geometry {
            FeatureGeometry::Point { z, .. } => *z,
            FeatureGeometry::SharedPoint { node } => self.nodes.get(*node).and_then(|n| n.z),
            _ => None,
        }
    }

    pub fn point_position(&self, id: FeatureId) -> Result<Point2, EditError> {
        self.expect_kind(id, FeatureKind::Point)?;
        self.position(id).ok_or(EditError::UnknownFeature(id))
    }

    pub fn line_ends(&self, id: FeatureId) -> Option<(FeatureId, FeatureId)> {
        match self.features.get(&id)?.geometry {
            FeatureGeometry::Line { start, end, .. } => Some((start, end)),
            _ => None,
        }
    }

    /// 线的当前几何
    pub fn segment(&self, id: FeatureId) -> Result<Segment, EditError> {
        self.expect_kind(id, FeatureKind::Line)?;
        let (start, end) = self.line_ends(id).ok_or(EditError::UnknownFeature(id))?;
        Ok(Segment::new(
            self.point_position(start)?,
            self.point_position(end)?,
        ))
    }

    /// 有效且参与拓扑的线
    pub fn is_topological_line(&self, id: FeatureId) -> bool {
        matches!(
            self.features.get(&id),
            Some(Feature {
                geometry: FeatureGeometry::Line { topological: true, .. },
                inactive: false,
                ..
            })
        )
    }

    /// 所有有效的拓扑线
    pub fn topological_lines(&self) -> Vec<FeatureId> {
        self.features
            .keys()
            .copied()
            .filter(|id| self.is_topological_line(*id))
            .collect()
    }

    pub fn text(&self, id: FeatureId) -> Option<&TextGeometry> {
        match &self.features.get(&id)?.geometry {
            FeatureGeometry::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn dependents(&self, id: FeatureId) -> &[Dependent] {
        self.features
            .get(&id)
            .map(|f| f.dependents.as_slice())
            .unwrap_or(&[])
    }

    fn allocate_id(&mut self, requested: Option<FeatureId>) -> Result<FeatureId, EditError> {
        let id = match requested {
            Some(id) if !id.is_null() => id,
            _ => FeatureId(self.next_id),
        };
        if self.features.contains_key(&id) {
            return Err(EditError::DuplicateFeature(id));
        }
        self.next_id = self.next_id.max(id.0 + 1);
        Ok(id)
    }

    /// 创建要素并归属于 `creator`
    ///
    /// `id` 为 None 时分配下一个可用ID；加载时传入记录中的ID。
    pub fn create_feature(
        &mut self,
        geometry: FeatureGeometry,
        creator: OperationId,
        id: Option<FeatureId>,
    ) -> Result<FeatureId, EditError> {
        let id = self.allocate_id(id)?;
        self.features.insert(
            id,
            Feature {
                id,
                geometry,
                creator,
                dependents: Vec::new(),
                inactive: false,
            },
        );
        Ok(id)
    }

    /// 创建点；与已有有效点重合时加入其共享节点
    pub fn create_point(
        &mut self,
        position: Point2,
        z: Option<f64>,
        creator: OperationId,
        id: Option<FeatureId>,
    ) -> Result<FeatureId, EditError> {
        let geometry = match self.coincident_point(&position) {
            Some(existing) => FeatureGeometry::SharedPoint {
                node: self.ensure_node(existing)?,
            },
            None => FeatureGeometry::Point { position, z },
        };
        let id = self.create_feature(geometry, creator, id)?;

        if let Some(key) = self.node_of(id) {
            if let Some(node) = self.nodes.get_mut(key) {
                node.members.push(id);
            }
        }
        if let Some(p) = self.position(id) {
            self.point_index.insert(id, BoundingBox2::new(p, p));
        }
        Ok(id)
    }

    /// 创建线，并登记为两个端点的依赖者
    pub fn create_line(
        &mut self,
        start: FeatureId,
        end: FeatureId,
        topological: bool,
        creator: OperationId,
        id: Option<FeatureId>,
    ) -> Result<FeatureId, EditError> {
        self.expect_kind(start, FeatureKind::Point)?;
        self.expect_kind(end, FeatureKind::Point)?;
        let id = self.create_feature(
            FeatureGeometry::Line {
                start,
                end,
                topological,
            },
            creator,
            id,
        )?;
        self.add_dependent(start, Dependent::Line(id))?;
        self.add_dependent(end, Dependent::Line(id))?;
        Ok(id)
    }

    pub fn create_text(
        &mut self,
        text: TextGeometry,
        creator: OperationId,
        id: Option<FeatureId>,
    ) -> Result<FeatureId, EditError> {
        self.create_feature(FeatureGeometry::Text(text), creator, id)
    }

    /// 登记依赖者（重复登记忽略）
    pub fn add_dependent(&mut self, id: FeatureId, dependent: Dependent) -> Result<(), EditError> {
        let feature = self.feature_mut(id)?;
        if !feature.dependents.contains(&dependent) {
            feature.dependents.push(dependent);
        }
        Ok(())
    }

    fn coincident_point(&self, position: &Point2) -> Option<FeatureId> {
        let probe = BoundingBox2::new(*position, *position).expanded(self.tolerance);
        self.point_index
            .query_rect(&probe)
            .into_iter()
            .filter(|id| self.features.get(id).is_some_and(|f| f.is_active()))
            .filter(|id| {
                self.position(*id)
                    .is_some_and(|p| (p - position).norm() <= self.tolerance)
            })
            .min()
    }

    /// 确保点拥有节点，必要时把自有坐标转入新节点
    fn ensure_node(&mut self, id: FeatureId) -> Result<NodeKey, EditError> {
        let geometry = self.feature(id)?.geometry.clone();
        match geometry {
            FeatureGeometry::SharedPoint { node } => Ok(node),
            FeatureGeometry::Point { position, z } => {
                let node = self.nodes.insert(Node {
                    position,
                    z,
                    owner: id,
                    members: vec![id],
                });
                self.feature_mut(id)?.geometry = FeatureGeometry::SharedPoint { node };
                Ok(node)
            }
            other => Err(EditError::WrongKind {
                feature: id,
                expected: FeatureKind::Point,
                found: other.kind(),
            }),
        }
    }

    /// 收集一组点的依赖者；线依赖者的下游操作一并收集（去重，保持顺序）
    fn collect_dependents(&self, points: &[FeatureId]) -> Vec<Dependent> {
        fn push(out: &mut Vec<Dependent>, dep: Dependent) {
            if !out.contains(&dep) {
                out.push(dep);
            }
        }

        let mut out = Vec::new();
        for point in points {
            for dep in self.dependents(*point) {
                push(&mut out, *dep);
                if let Dependent::Line(line) = dep {
                    for downstream in self.dependents(*line) {
                        push(&mut out, *downstream);
                    }
                }
            }
        }
        out
    }

    /// 移动点
    ///
    /// 节点拥有者移动整个节点；其他成员移到不同位置时脱离节点。
    /// 位置不变时不通知，返回 `false`。
    pub fn move_point(
        &mut self,
        id: FeatureId,
        position: Point2,
        z: Option<f64>,
        ctx: &mut EditingContext,
        observer: &mut dyn MoveObserver,
    ) -> Result<bool, EditError> {
        let geometry = self.feature(id)?.geometry.clone();
        match geometry {
            FeatureGeometry::Point {
                position: old,
                z: old_z,
            } => {
                if old == position && old_z == z {
                    return Ok(false);
                }
                let dependents = self.collect_dependents(&[id]);
                notify_pre(observer, id, &dependents);

                self.feature_mut(id)?.geometry = FeatureGeometry::Point { position, z };
                self.point_index.insert(id, BoundingBox2::new(position, position));
                ctx.register_change(PositionChange {
                    feature: id,
                    old: Some(old),
                    new: position,
                });

                notify_post(observer, id, &dependents);
                Ok(true)
            }
            FeatureGeometry::SharedPoint { node } => {
                let current = self
                    .nodes
                    .get(node)
                    .cloned()
                    .ok_or(EditError::UnknownFeature(id))?;

                if current.owner == id {
                    if current.position == position && current.z == z {
                        return Ok(false);
                    }
                    let mut dependents = self.collect_dependents(&current.members);
                    // 成员随节点移动，其创建操作需要重新计算以决定是否脱离
                    for member in current.members.iter().filter(|m| **m != id) {
                        let creator = Dependent::Operation(self.feature(*member)?.creator);
                        if !dependents.contains(&creator) {
                            dependents.push(creator);
                        }
                    }
                    notify_pre(observer, id, &dependents);

                    if let Some(n) = self.nodes.get_mut(node) {
                        n.position = position;
                        n.z = z;
                    }
                    for member in &current.members {
                        self.point_index
                            .insert(*member, BoundingBox2::new(position, position));
                        ctx.register_change(PositionChange {
                            feature: *member,
                            old: Some(current.position),
                            new: position,
                        });
                    }

                    notify_post(observer, id, &dependents);
                    Ok(true)
                } else {
                    if (current.position - position).norm() <= self.tolerance {
                        return Ok(false);
                    }
                    let dependents = self.collect_dependents(&[id]);
                    notify_pre(observer, id, &dependents);

                    self.detach(id, node, position, z)?;
                    ctx.register_change(PositionChange {
                        feature: id,
                        old: Some(current.position),
                        new: position,
                    });

                    notify_post(observer, id, &dependents);
                    Ok(true)
                }
            }
            other => Err(EditError::WrongKind {
                feature: id,
                expected: FeatureKind::Point,
                found: other.kind(),
            }),
        }
    }

    /// 成员点脱离节点；只剩拥有者时节点解散
    fn detach(
        &mut self,
        id: FeatureId,
        node: NodeKey,
        position: Point2,
        z: Option<f64>,
    ) -> Result<(), EditError> {
        self.feature_mut(id)?.geometry = FeatureGeometry::Point { position, z };
        self.point_index.insert(id, BoundingBox2::new(position, position));

        let dissolve = match self.nodes.get_mut(node) {
            Some(n) => {
                n.members.retain(|m| *m != id);
                n.members.len() <= 1
            }
            None => false,
        };
        if dissolve {
            if let Some(n) = self.nodes.remove(node) {
                self.feature_mut(n.owner)?.geometry = FeatureGeometry::Point {
                    position: n.position,
                    z: n.z,
                };
            }
        }
        Ok(())
    }

    /// 替换文本几何，返回是否有变化
    pub fn set_text(&mut self, id: FeatureId, text: TextGeometry) -> Result<bool, EditError> {
        let feature = self.feature_mut(id)?;
        match &feature.geometry {
            FeatureGeometry::Text(current) if *current == text => Ok(false),
            FeatureGeometry::Text(_) => {
                feature.geometry = FeatureGeometry::Text(text);
                Ok(true)
            }
            other => Err(EditError::WrongKind {
                feature: id,
                expected: FeatureKind::Text,
                found: other.kind(),
            }),
        }
    }

    /// 设置失效标记，返回是否有变化
    pub fn set_inactive(&mut self, id: FeatureId, inactive: bool) -> Result<bool, EditError> {
        let feature = self.feature_mut(id)?;
        if feature.inactive == inactive {
            return Ok(false);
        }
        feature.inactive = inactive;
        Ok(true)
    }
}

fn notify_pre(observer: &mut dyn MoveObserver, moved: FeatureId, dependents: &[Dependent]) {
    for dep in dependents {
        observer.on_pre_move(moved, *dep);
    }
}

fn notify_post(observer: &mut dyn MoveObserver, moved: FeatureId, dependents: &[Dependent]) {
    for dep in dependents {
        observer.on_post_move(moved, *dep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        pre: Vec<(FeatureId, Dependent)>,
        post: Vec<(FeatureId, Dependent)>,
    }

    impl MoveObserver for Recorder {
        fn on_pre_move(&mut self, moved: FeatureId, dependent: Dependent) {
            self.pre.push((moved, dependent));
        }
        fn on_post_move(&mut self, moved: FeatureId, dependent: Dependent) {
            self.post.push((moved, dependent));
        }
    }

    fn graph() -> FeatureGraph {
        FeatureGraph::new(&EngineConfig::default())
    }

    #[test]
    fn test_line_registers_on_endpoints() {
        let mut g = graph();
        let a = g.create_point(Point2::new(0.0, 0.0), None, OperationId(1), None).unwrap();
        let b = g.create_point(Point2::new(10.0, 0.0), None, OperationId(2), None).unwrap();
        let l = g.create_line(a, b, true, OperationId(3), None).unwrap();

        assert_eq!(g.dependents(a), &[Dependent::Line(l)]);
        assert_eq!(g.dependents(b), &[Dependent::Line(l)]);
        assert_eq!(g.get(l).unwrap().creator, OperationId(3));
        assert!(g.is_topological_line(l));

        let err = g.create_line(l, b, true, OperationId(4), None).unwrap_err();
        assert!(matches!(err, EditError::WrongKind { .. }));
    }

    #[test]
    fn test_move_notifies_line_dependent() {
        let mut g = graph();
        let a = g.create_point(Point2::new(0.0, 0.0), None, OperationId(1), None).unwrap();
        let b = g.create_point(Point2::new(10.0, 0.0), None, OperationId(2), None).unwrap();
        let l = g.create_line(a, b, true, OperationId(3), None).unwrap();

        let mut ctx = EditingContext::update();
        let mut rec = Recorder::default();
        let moved = g
            .move_point(a, Point2::new(0.0, 5.0), None, &mut ctx, &mut rec)
            .unwrap();

        assert!(moved);
        assert_eq!(rec.pre, vec![(a, Dependent::Line(l))]);
        assert_eq!(rec.post, vec![(a, Dependent::Line(l))]);
        let seg = g.segment(l).unwrap();
        assert_eq!(seg.start, Point2::new(0.0, 5.0));
        assert_eq!(seg.end, Point2::new(10.0, 0.0));
        assert_eq!(ctx.changes().len(), 1);
    }

    #[test]
    fn test_unchanged_move_is_silent() {
        let mut g = graph();
        let a = g.create_point(Point2::new(1.0, 1.0), None, OperationId(1), None).unwrap();
        g.add_dependent(a, Dependent::Operation(OperationId(2))).unwrap();

        let mut rec = Recorder::default();
        let moved = g
            .move_point(a, Point2::new(1.0, 1.0), None, &mut EditingContext::update(), &mut rec)
            .unwrap();
        assert!(!moved);
        assert!(rec.pre.is_empty() && rec.post.is_empty());
    }

    #[test]
    fn test_move_without_dependents_is_legal() {
        let mut g = graph();
        let a = g.create_point(Point2::new(1.0, 1.0), None, OperationId(1), None).unwrap();
        let mut rec = Recorder::default();
        assert!(g
            .move_point(a, Point2::new(2.0, 2.0), None, &mut EditingContext::update(), &mut rec)
            .unwrap());
        assert!(rec.post.is_empty());
        assert_eq!(g.position(a), Some(Point2::new(2.0, 2.0)));
    }

    #[test]
    fn test_node_move_notifies_each_dependent_once() {
        let mut g = graph();
        let p = g.create_point(Point2::new(0.0, 0.0), None, OperationId(1), None).unwrap();
        let q = g.create_point(Point2::new(0.0, 0.0), None, OperationId(2), None).unwrap();
        let r = g.create_point(Point2::new(10.0, 0.0), None, OperationId(3), None).unwrap();
        let s = g.create_point(Point2::new(0.0, 10.0), None, OperationId(4), None).unwrap();
        let l1 = g.create_line(p, r, true, OperationId(5), None).unwrap();
        let l2 = g.create_line(q, s, true, OperationId(6), None).unwrap();
        g.add_dependent(p, Dependent::Operation(OperationId(7))).unwrap();
        g.add_dependent(q, Dependent::Operation(OperationId(7))).unwrap();

        let node = g.node_of(p).unwrap();
        assert_eq!(g.node_of(q), Some(node));
        assert_eq!(g.node(node).unwrap().owner, p);

        let mut rec = Recorder::default();
        g.move_point(p, Point2::new(1.0, 1.0), None, &mut EditingContext::update(), &mut rec)
            .unwrap();

        assert_eq!(g.position(q), Some(Point2::new(1.0, 1.0)));
        assert_eq!(
            rec.post,
            vec![
                (p, Dependent::Line(l1)),
                (p, Dependent::Operation(OperationId(7))),
                (p, Dependent::Line(l2)),
                // q 的创建操作需要重新计算
                (p, Dependent::Operation(OperationId(2))),
            ]
        );
        assert_eq!(rec.pre.len(), rec.post.len());
    }

    #[test]
    fn test_member_detaches_when_moved_apart() {
        let mut g = graph();
        let p = g.create_point(Point2::new(0.0, 0.0), None, OperationId(1), None).unwrap();
        let q = g.create_point(Point2::new(0.0, 0.0), None, OperationId(2), None).unwrap();
        let mut ctx = EditingContext::update();

        // 重新计算到同一位置：保持共享
        assert!(!g
            .move_point(q, Point2::new(0.0, 0.0), None, &mut ctx, &mut NoObserver)
            .unwrap());

        assert!(g
            .move_point(q, Point2::new(3.0, 0.0), None, &mut ctx, &mut NoObserver)
            .unwrap());
        assert_eq!(g.position(p), Some(Point2::new(0.0, 0.0)));
        assert_eq!(g.position(q), Some(Point2::new(3.0, 0.0)));
        assert!(g.node_of(p).is_none());
        assert!(g.node_of(q).is_none());
    }

    #[test]
    fn test_requested_id_advances_allocator() {
        let mut g = graph();
        let a = g
            .create_point(Point2::new(0.0, 0.0), None, OperationId(1), Some(FeatureId(40)))
            .unwrap();
        assert_eq!(a, FeatureId(40));
        let b = g.create_point(Point2::new(5.0, 0.0), None, OperationId(2), None).unwrap();
        assert_eq!(b, FeatureId(41));

        let dup = g.create_point(Point2::new(9.0, 0.0), None, OperationId(3), Some(FeatureId(40)));
        assert_eq!(dup, Err(EditError::DuplicateFeature(FeatureId(40))));
    }
}

//! 编辑操作
//!
//! 操作种类是封闭的枚举，每种都实现同一套约定：
//! - `calculate`: 由输入要素和观测值纯计算输出几何
//! - `execute`: 首次执行，创建输出要素并登记依赖
//! - `rollforward`: 上游变化后重新计算，按原有输出ID写回几何
//!
//! 序号决定唯一合法的前推顺序，操作只能使用序号更小的操作创建的要素。

use crate::context::{EditingContext, PositionChange};
use crate::error::EditError;
use crate::feature::{
    Dependent, FeatureGeometry, FeatureGraph, FeatureId, FeatureKind, MoveObserver,
};
use crate::geometry::{bearing_offset, circle_intersections, TextGeometry};
use crate::math::{cross, Point2};
use crate::persist::DataField;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 操作序号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperationId(pub u32);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 操作种类及其观测值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OperationKind {
    /// 控制点坐标
    ControlPoint { x: f64, y: f64, z: Option<f64> },
    /// 支距：由已知点按方位角（自坐标北顺时针，弧度）和距离放样
    Radial {
        from: FeatureId,
        bearing: f64,
        distance: f64,
    },
    NewLine {
        start: FeatureId,
        end: FeatureId,
        topological: bool,
    },
    IntersectTwoLines { line1: FeatureId, line2: FeatureId },
    /// 距离交会；`default` 取 from1→from2 右侧的解
    IntersectTwoDistances {
        from1: FeatureId,
        distance1: f64,
        from2: FeatureId,
        distance2: f64,
        default: bool,
    },
    /// 按自起点的距离细分线，原线失效
    LineSubdivision { line: FeatureId, distances: Vec<f64> },
    NewText {
        x: f64,
        y: f64,
        text: String,
        height: f64,
        rotation: f64,
    },
    Deletion { features: Vec<FeatureId> },
}

/// 计算出的输出几何
#[derive(Debug, Clone, PartialEq)]
pub enum Calculated {
    Point { position: Point2, z: Option<f64> },
    Line {
        start: EndRef,
        end: EndRef,
        topological: bool,
    },
    Text(TextGeometry),
}

/// 线端点：已有要素或本操作的第 n 个输出
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndRef {
    Feature(FeatureId),
    Output(usize),
}

/// 计算结果
#[derive(Debug, Clone, PartialEq)]
pub enum Calculation {
    Done(Vec<Calculated>),
    /// 输入无法产生有效几何，附可读原因
    Fault(String),
}

/// 前推故障（用户可修正）
#[derive(Debug, Clone, PartialEq)]
pub struct RollforwardFault {
    pub operation: OperationId,
    pub kind: &'static str,
    pub reason: String,
}

impl fmt::Display for RollforwardFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.operation, self.reason)
    }
}

/// 一次执行或前推后需要刷新拓扑的线
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppliedChanges {
    pub lines: Vec<FeatureId>,
}

/// 单个操作前推的结果
#[derive(Debug, Clone, PartialEq)]
pub enum StepResult {
    Applied(AppliedChanges),
    Faulted(RollforwardFault),
}

impl OperationKind {
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::ControlPoint { .. } => "ControlPoint",
            OperationKind::Radial { .. } => "Radial",
            OperationKind::NewLine { .. } => "NewLine",
            OperationKind::IntersectTwoLines { .. } => "IntersectTwoLines",
            OperationKind::IntersectTwoDistances { .. } => "IntersectTwoDistances",
            OperationKind::LineSubdivision { .. } => "LineSubdivision",
            OperationKind::NewText { .. } => "NewText",
            OperationKind::Deletion { .. } => "Deletion",
        }
    }

    /// 持久化种类标记，不得重新编号
    pub fn tag(&self) -> u8 {
        match self {
            OperationKind::ControlPoint { .. } => 1,
            OperationKind::Radial { .. } => 2,
            OperationKind::NewLine { .. } => 3,
            OperationKind::IntersectTwoLines { .. } => 4,
            OperationKind::IntersectTwoDistances { .. } => 5,
            OperationKind::LineSubdivision { .. } => 6,
            OperationKind::NewText { .. } => 7,
            OperationKind::Deletion { .. } => 8,
        }
    }

    /// 输入要素及期望类型（None 表示任意类型）
    pub fn input_kinds(&self) -> Vec<(FeatureId, Option<FeatureKind>)> {
        use FeatureKind::{Line, Point};
        match self {
            OperationKind::ControlPoint { .. } | OperationKind::NewText { .. } => Vec::new(),
            OperationKind::Radial { from, .. } => vec![(*from, Some(Point))],
            OperationKind::NewLine { start, end, .. } => {
                vec![(*start, Some(Point)), (*end, Some(Point))]
            }
            OperationKind::IntersectTwoLines { line1, line2 } => {
                vec![(*line1, Some(Line)), (*line2, Some(Line))]
            }
            OperationKind::IntersectTwoDistances { from1, from2, .. } => {
                vec![(*from1, Some(Point)), (*from2, Some(Point))]
            }
            OperationKind::LineSubdivision { line, .. } => vec![(*line, Some(Line))],
            OperationKind::Deletion { features } => features.iter().map(|f| (*f, None)).collect(),
        }
    }

    pub fn inputs(&self) -> Vec<FeatureId> {
        self.input_kinds().into_iter().map(|(f, _)| f).collect()
    }

    /// 输出要素类型，顺序与 `calculate` 的结果一致
    pub fn output_kinds(&self) -> Vec<FeatureKind> {
        match self {
            OperationKind::ControlPoint { .. }
            | OperationKind::Radial { .. }
            | OperationKind::IntersectTwoLines { .. }
            | OperationKind::IntersectTwoDistances { .. } => vec![FeatureKind::Point],
            OperationKind::NewLine { .. } => vec![FeatureKind::Line],
            OperationKind::LineSubdivision { distances, .. } => {
                let n = distances.len();
                let mut kinds = vec![FeatureKind::Point; n];
                kinds.extend(std::iter::repeat(FeatureKind::Line).take(n + 1));
                kinds
            }
            OperationKind::NewText { .. } => vec![FeatureKind::Text],
            OperationKind::Deletion { .. } => Vec::new(),
        }
    }

    /// 执行后失效的要素
    pub fn deactivates(&self) -> Vec<FeatureId> {
        match self {
            OperationKind::LineSubdivision { line, .. } => vec![*line],
            OperationKind::Deletion { features } => features.clone(),
            _ => Vec::new(),
        }
    }

    /// 修订只允许改观测值，不允许改种类、输入或输出结构
    pub fn check_revision(&self, revised: &OperationKind) -> Result<(), String> {
        if std::mem::discriminant(self) != std::mem::discriminant(revised) {
            return Err(format!("cannot turn {} into {}", self.name(), revised.name()));
        }
        if self.inputs() != revised.inputs() {
            return Err("input features differ".to_string());
        }
        if self.output_kinds() != revised.output_kinds() {
            return Err("number of outputs differs".to_string());
        }
        Ok(())
    }

    /// 绑定单个要素引用，字段不属于该种类时返回 false
    pub fn apply_feature_ref(&mut self, field: DataField, feature: FeatureId) -> bool {
        let slot = match (self, field) {
            (OperationKind::Radial { from, .. }, DataField::From) => from,
            (OperationKind::NewLine { start, .. }, DataField::From) => start,
            (OperationKind::NewLine { end, .. }, DataField::To) => end,
            (OperationKind::IntersectTwoLines { line1, .. }, DataField::Line1) => line1,
            (OperationKind::IntersectTwoLines { line2, .. }, DataField::Line2) => line2,
            (OperationKind::IntersectTwoDistances { from1, .. }, DataField::From1) => from1,
            (OperationKind::IntersectTwoDistances { from2, .. }, DataField::From2) => from2,
            (OperationKind::LineSubdivision { line, .. }, DataField::Line) => line,
            _ => return false,
        };
        *slot = feature;
        true
    }

    /// 绑定要素引用数组
    pub fn apply_feature_ref_array(&mut self, field: DataField, refs: &[FeatureId]) -> bool {
        match (self, field) {
            (OperationKind::Deletion { features }, DataField::Features) => {
                *features = refs.to_vec();
                true
            }
            _ => false,
        }
    }

    /// 纯计算，不修改要素图
    pub fn calculate(&self, features: &FeatureGraph, tolerance: f64) -> Result<Calculation, EditError> {
        let done = |c: Calculated| -> Result<Calculation, EditError> {
            Ok(Calculation::Done(vec![c]))
        };
        match self {
            OperationKind::ControlPoint { x, y, z } => done(Calculated::Point {
                position: Point2::new(*x, *y),
                z: *z,
            }),

            OperationKind::Radial {
                from,
                bearing,
                distance,
            } => {
                if *distance <= tolerance {
                    return Ok(Calculation::Fault(format!(
                        "distance {distance} is not positive"
                    )));
                }
                let origin = features.point_position(*from)?;
                done(Calculated::Point {
                    position: bearing_offset(&origin, *bearing, *distance),
                    z: None,
                })
            }

            OperationKind::NewLine {
                start,
                end,
                topological,
            } => {
                let a = features.point_position(*start)?;
                let b = features.point_position(*end)?;
                if (b - a).norm() <= tolerance {
                    return Ok(Calculation::Fault(format!(
                        "end points {start} and {end} coincide"
                    )));
                }
                done(Calculated::Line {
                    start: EndRef::Feature(*start),
                    end: EndRef::Feature(*end),
                    topological: *topological,
                })
            }

            OperationKind::IntersectTwoLines { line1, line2 } => {
                let a = features.segment(*line1)?;
                let b = features.segment(*line2)?;
                match a.crossing(&b, tolerance) {
                    Some(position) => done(Calculated::Point { position, z: None }),
                    None => Ok(Calculation::Fault(format!(
                        "lines {line1} and {line2} no longer intersect"
                    ))),
                }
            }

            OperationKind::IntersectTwoDistances {
                from1,
                distance1,
                from2,
                distance2,
                default,
            } => {
                let c1 = features.point_position(*from1)?;
                let c2 = features.point_position(*from2)?;
                let solutions = circle_intersections(&c1, *distance1, &c2, *distance2, tolerance);
                let position = match solutions.as_slice() {
                    [] => {
                        return Ok(Calculation::Fault(format!(
                            "distances {distance1} from {from1} and {distance2} from {from2} do not intersect"
                        )))
                    }
                    [only] => *only,
                    [first, second, ..] => {
                        let right_first = cross(&(c2 - c1), &(first - c1)) < 0.0;
                        match (*default, right_first) {
                            (true, true) | (false, false) => *first,
                            _ => *second,
                        }
                    }
                };
                done(Calculated::Point { position, z: None })
            }

            OperationKind::LineSubdivision { line, distances } => {
                let seg = features.segment(*line)?;
                let (start, end) = features
                    .line_ends(*line)
                    .ok_or(EditError::UnknownFeature(*line))?;
                // 原线在首次执行后即失效，按几何标记而不是有效性判断
                let topological = matches!(
                    features.get(*line).map(|f| &f.geometry),
                    Some(FeatureGeometry::Line { topological: true, .. })
                );

                let length = seg.length();
                if distances.is_empty() {
                    return Ok(Calculation::Fault("no subdivision distances".to_string()));
                }
                if let Some(d) = distances.iter().find(|d| **d <= tolerance) {
                    return Ok(Calculation::Fault(format!("distance {d} is not positive")));
                }
                let total: f64 = distances.iter().sum();
                if total >= length - tolerance {
                    return Ok(Calculation::Fault(format!(
                        "distances total {total:.3} but {line} is only {length:.3} long"
                    )));
                }

                let n = distances.len();
                let mut out = Vec::with_capacity(2 * n + 1);
                let mut along = 0.0;
                for d in distances {
                    along += d;
                    out.push(Calculated::Point {
                        position: seg.point_at(along / length),
                        z: None,
                    });
                }
                for i in 0..=n {
                    let from = if i == 0 { EndRef::Feature(start) } else { EndRef::Output(i - 1) };
                    let to = if i == n { EndRef::Feature(end) } else { EndRef::Output(i) };
                    out.push(Calculated::Line {
                        start: from,
                        end: to,
                        topological,
                    });
                }
                Ok(Calculation::Done(out))
            }

            OperationKind::NewText {
                x,
                y,
                text,
                height,
                rotation,
            } => done(Calculated::Text(
                TextGeometry::new(Point2::new(*x, *y), text.clone(), *height).with_rotation(*rotation),
            )),

            OperationKind::Deletion { .. } => Ok(Calculation::Done(Vec::new())),
        }
    }
}

/// 编辑操作
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub id: OperationId,
    pub kind: OperationKind,
    /// 本操作拥有的输出要素，顺序与 `calculate` 一致
    pub outputs: Vec<FeatureId>,
}

impl Operation {
    /// 首次执行
    ///
    /// `declared` 为加载时记录中的输出ID；新编辑传 None 由要素图分配。
    pub fn execute(
        id: OperationId,
        kind: OperationKind,
        features: &mut FeatureGraph,
        ctx: &mut EditingContext,
        declared: Option<&[FeatureId]>,
        tolerance: f64,
    ) -> Result<(Operation, AppliedChanges), EditError> {
        for (input, expected) in kind.input_kinds() {
            let feature = features.get(input).ok_or(EditError::UnknownFeature(input))?;
            if !feature.is_active() {
                return Err(EditError::InactiveFeature {
                    operation: id,
                    feature: input,
                });
            }
            if let Some(expected) = expected {
                features.expect_kind(input, expected)?;
            }
            if feature.creator >= id {
                return Err(EditError::ConsumesLaterFeature {
                    operation: id,
                    feature: input,
                    creator: feature.creator,
                });
            }
        }

        let calculated = match kind.calculate(features, tolerance)? {
            Calculation::Done(c) => c,
            Calculation::Fault(reason) => {
                return Err(EditError::Rejected {
                    kind: kind.name(),
                    reason,
                })
            }
        };
        if let Some(ids) = declared {
            if ids.len() != calculated.len() {
                return Err(EditError::OutputMismatch {
                    operation: id,
                    expected: calculated.len(),
                    found: ids.len(),
                });
            }
        }

        let mut applied = AppliedChanges::default();
        let mut outputs: Vec<FeatureId> = Vec::with_capacity(calculated.len());
        for (i, calc) in calculated.into_iter().enumerate() {
            let requested = declared.map(|ids| ids[i]);
            let created = match calc {
                Calculated::Point { position, z } => {
                    let point = features.create_point(position, z, id, requested)?;
                    if let Some(actual) = features.position(point) {
                        ctx.register_change(PositionChange {
                            feature: point,
                            old: None,
                            new: actual,
                        });
                    }
                    point
                }
                Calculated::Line {
                    start,
                    end,
                    topological,
                } => {
                    let start = resolve_end(id, start, &outputs)?;
                    let end = resolve_end(id, end, &outputs)?;
                    let line = features.create_line(start, end, topological, id, requested)?;
                    applied.lines.push(line);
                    line
                }
                Calculated::Text(text) => features.create_text(text, id, requested)?,
            };
            outputs.push(created);
        }

        for input in kind.inputs() {
            features.add_dependent(input, Dependent::Operation(id))?;
        }
        deactivate(&kind, features, &mut applied)?;

        Ok((Operation { id, kind, outputs }, applied))
    }

    /// 重新计算并写回原有输出
    ///
    /// 输入未变时几何与ID都与上次完全相同，不产生任何移动。
    /// 故障时不修改任何输出。
    pub fn rollforward(
        &self,
        features: &mut FeatureGraph,
        ctx: &mut EditingContext,
        observer: &mut dyn MoveObserver,
        tolerance: f64,
    ) -> Result<StepResult, EditError> {
        let calculated = match self.kind.calculate(features, tolerance)? {
            Calculation::Done(c) => c,
            Calculation::Fault(reason) => {
                return Ok(StepResult::Faulted(RollforwardFault {
                    operation: self.id,
                    kind: self.kind.name(),
                    reason,
                }))
            }
        };
        if calculated.len() != self.outputs.len() {
            return Err(EditError::OutputMismatch {
                operation: self.id,
                expected: self.outputs.len(),
                found: calculated.len(),
            });
        }

        let mut applied = AppliedChanges::default();
        for (output, calc) in self.outputs.iter().zip(calculated) {
            match calc {
                Calculated::Point { position, z } => {
                    features.move_point(*output, position, z, ctx, observer)?;
                }
                // 端点是固定的要素引用，端点移动已经通过点的依赖者传播
                Calculated::Line { .. } => {}
                Calculated::Text(text) => {
                    features.set_text(*output, text)?;
                }
            }
        }
        deactivate(&self.kind, features, &mut applied)?;

        Ok(StepResult::Applied(applied))
    }
}

fn resolve_end(op: OperationId, end: EndRef, outputs: &[FeatureId]) -> Result<FeatureId, EditError> {
    match end {
        EndRef::Feature(id) => Ok(id),
        EndRef::Output(i) => outputs.get(i).copied().ok_or(EditError::OutputMismatch {
            operation: op,
            expected: i + 1,
            found: outputs.len(),
        }),
    }
}

fn deactivate(
    kind: &OperationKind,
    features: &mut FeatureGraph,
    applied: &mut AppliedChanges,
) -> Result<(), EditError> {
    for feature in kind.deactivates() {
        if features.set_inactive(feature, true)? && features.kind_of(feature)? == FeatureKind::Line {
            applied.lines.push(feature);
        }
    }
    Ok(())
}

/// 按序号排列的操作链
#[derive(Debug, Clone, Default)]
pub struct OperationChain {
    operations: BTreeMap<OperationId, Operation>,
}

impl OperationChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn get(&self, id: OperationId) -> Option<&Operation> {
        self.operations.get(&id)
    }

    pub fn last_id(&self) -> Option<OperationId> {
        self.operations.keys().next_back().copied()
    }

    /// 下一个可用序号
    pub fn next_id(&self) -> OperationId {
        OperationId(self.last_id().map_or(1, |id| id.0 + 1))
    }

    /// 追加操作，序号必须严格递增
    pub fn push(&mut self, operation: Operation) -> Result<(), EditError> {
        if let Some(last) = self.last_id() {
            if operation.id <= last {
                return Err(EditError::OutOfSequence {
                    operation: operation.id,
                    last,
                });
            }
        }
        self.operations.insert(operation.id, operation);
        Ok(())
    }

    /// 替换观测值（结构检查由调用方完成）
    pub fn replace_kind(&mut self, id: OperationId, kind: OperationKind) -> Result<(), EditError> {
        let op = self
            .operations
            .get_mut(&id)
            .ok_or(EditError::UnknownOperation(id))?;
        op.kind = kind;
        Ok(())
    }

    pub fn ids(&self) -> impl Iterator<Item = OperationId> + '_ {
        self.operations.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.operations.values()
    }
}

//! 编辑流持久化
//!
//! 每个操作保存为一条 [`EditRecord`]：种类标记、序号、若干 (字段标记, 值)。
//! 加载分两阶段：
//! 1. 依次解析记录，要素引用交给 [`ForwardRefResolver`]，
//!    引用的要素尚未出现时排队，等其定义记录读到后再绑定
//! 2. 按序号在 `Startup` 上下文中重放，使用记录中的输出ID，最后全量重建拓扑

use crate::config::EngineConfig;
use crate::error::{EditError, LoadError};
use crate::feature::{FeatureId, FeatureKind};
use crate::model::MapModel;
use crate::operation::{Operation, OperationId, OperationKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// 字段标记，写入文件后不得重新编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum DataField {
    X = 1,
    Y = 2,
    Z = 3,
    From = 4,
    To = 5,
    Bearing = 6,
    Distance = 7,
    Topological = 8,
    Line1 = 9,
    Line2 = 10,
    From1 = 11,
    Distance1 = 12,
    From2 = 13,
    Distance2 = 14,
    Default = 15,
    Line = 16,
    Distances = 17,
    Text = 18,
    Height = 19,
    Rotation = 20,
    Features = 21,
    /// 操作的输出要素ID
    Ids = 22,
}

impl DataField {
    const ALL: [DataField; 22] = [
        DataField::X,
        DataField::Y,
        DataField::Z,
        DataField::From,
        DataField::To,
        DataField::Bearing,
        DataField::Distance,
        DataField::Topological,
        DataField::Line1,
        DataField::Line2,
        DataField::From1,
        DataField::Distance1,
        DataField::From2,
        DataField::Distance2,
        DataField::Default,
        DataField::Line,
        DataField::Distances,
        DataField::Text,
        DataField::Height,
        DataField::Rotation,
        DataField::Features,
        DataField::Ids,
    ];

    pub fn tag(self) -> u16 {
        self as u16
    }

    pub fn from_tag(tag: u16) -> Option<DataField> {
        Self::ALL.iter().copied().find(|f| f.tag() == tag)
    }

    /// 引用字段期望的要素类型
    pub fn expected_kind(self) -> Option<FeatureKind> {
        match self {
            DataField::From | DataField::To | DataField::From1 | DataField::From2 => {
                Some(FeatureKind::Point)
            }
            DataField::Line | DataField::Line1 | DataField::Line2 => Some(FeatureKind::Line),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Text(String),
    FloatArray(Vec<f64>),
    FeatureRef(FeatureId),
    FeatureRefArray(Vec<FeatureId>),
}

/// 一条编辑记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditRecord {
    pub kind: u8,
    pub sequence: u32,
    pub fields: Vec<(u16, FieldValue)>,
}

impl EditRecord {
    pub fn operation(&self) -> OperationId {
        OperationId(self.sequence)
    }

    pub fn get(&self, field: DataField) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(tag, _)| *tag == field.tag())
            .map(|(_, v)| v)
    }
}

/// 字段写入接口
pub trait EditWriter {
    fn write(&mut self, field: DataField, value: FieldValue);

    fn write_float(&mut self, field: DataField, value: f64) {
        self.write(field, FieldValue::Float(value));
    }

    fn write_bool(&mut self, field: DataField, value: bool) {
        self.write(field, FieldValue::Bool(value));
    }

    fn write_text(&mut self, field: DataField, value: &str) {
        self.write(field, FieldValue::Text(value.to_string()));
    }

    fn write_floats(&mut self, field: DataField, values: &[f64]) {
        self.write(field, FieldValue::FloatArray(values.to_vec()));
    }

    fn write_feature_ref(&mut self, field: DataField, feature: FeatureId) {
        self.write(field, FieldValue::FeatureRef(feature));
    }

    fn write_feature_refs(&mut self, field: DataField, features: &[FeatureId]) {
        self.write(field, FieldValue::FeatureRefArray(features.to_vec()));
    }
}

/// 收集字段生成记录
#[derive(Debug, Default)]
pub struct RecordWriter {
    fields: Vec<(u16, FieldValue)>,
}

impl RecordWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self, kind: u8, sequence: u32) -> EditRecord {
        EditRecord {
            kind,
            sequence,
            fields: self.fields,
        }
    }
}

impl EditWriter for RecordWriter {
    fn write(&mut self, field: DataField, value: FieldValue) {
        self.fields.push((field.tag(), value));
    }
}

/// 可写入编辑流的对象
pub trait Persistent {
    fn write_data(&self, writer: &mut dyn EditWriter);
}

impl Persistent for OperationKind {
    fn write_data(&self, w: &mut dyn EditWriter) {
        match self {
            OperationKind::ControlPoint { x, y, z } => {
                w.write_float(DataField::X, *x);
                w.write_float(DataField::Y, *y);
                if let Some(z) = z {
                    w.write_float(DataField::Z, *z);
                }
            }
            OperationKind::Radial {
                from,
                bearing,
                distance,
            } => {
                w.write_feature_ref(DataField::From, *from);
                w.write_float(DataField::Bearing, *bearing);
                w.write_float(DataField::Distance, *distance);
            }
            OperationKind::NewLine {
                start,
                end,
                topological,
            } => {
                w.write_feature_ref(DataField::From, *start);
                w.write_feature_ref(DataField::To, *end);
                w.write_bool(DataField::Topological, *topological);
            }
            OperationKind::IntersectTwoLines { line1, line2 } => {
                w.write_feature_ref(DataField::Line1, *line1);
                w.write_feature_ref(DataField::Line2, *line2);
            }
            OperationKind::IntersectTwoDistances {
                from1,
                distance1,
                from2,
                distance2,
                default,
            } => {
                w.write_feature_ref(DataField::From1, *from1);
                w.write_float(DataField::Distance1, *distance1);
                w.write_feature_ref(DataField::From2, *from2);
                w.write_float(DataField::Distance2, *distance2);
                w.write_bool(DataField::Default, *default);
            }
            OperationKind::LineSubdivision { line, distances } => {
                w.write_feature_ref(DataField::Line, *line);
                w.write_floats(DataField::Distances, distances);
            }
            OperationKind::NewText {
                x,
                y,
                text,
                height,
                rotation,
            } => {
                w.write_float(DataField::X, *x);
                w.write_float(DataField::Y, *y);
                w.write_text(DataField::Text, text);
                w.write_float(DataField::Height, *height);
                w.write_float(DataField::Rotation, *rotation);
            }
            OperationKind::Deletion { features } => {
                w.write_feature_refs(DataField::Features, features);
            }
        }
    }
}

impl Persistent for Operation {
    fn write_data(&self, w: &mut dyn EditWriter) {
        self.kind.write_data(w);
        w.write_feature_refs(DataField::Ids, &self.outputs);
    }
}

pub fn to_record(operation: &Operation) -> EditRecord {
    let mut writer = RecordWriter::new();
    operation.write_data(&mut writer);
    writer.finish(operation.kind.tag(), operation.id.0)
}

/// 待解析的要素引用
#[derive(Debug, Clone, PartialEq)]
pub enum RawRef {
    Single(DataField, FeatureId),
    Array(DataField, Vec<FeatureId>),
}

/// 解析后的记录：引用字段暂为空ID
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    pub operation: OperationId,
    pub kind: OperationKind,
    pub outputs: Vec<FeatureId>,
    pub refs: Vec<RawRef>,
}

/// 按字段读取一条记录
pub struct RecordReader<'a> {
    record: &'a EditRecord,
    refs: Vec<RawRef>,
}

impl<'a> RecordReader<'a> {
    pub fn new(record: &'a EditRecord) -> Self {
        Self {
            record,
            refs: Vec::new(),
        }
    }

    fn operation(&self) -> OperationId {
        self.record.operation()
    }

    fn missing(&self, field: DataField) -> LoadError {
        LoadError::MissingField {
            operation: self.operation(),
            field,
        }
    }

    fn malformed(&self, field: DataField) -> LoadError {
        LoadError::MalformedField {
            operation: self.operation(),
            tag: field.tag(),
        }
    }

    pub fn float(&self, field: DataField) -> Result<f64, LoadError> {
        self.opt_float(field)?.ok_or_else(|| self.missing(field))
    }

    pub fn opt_float(&self, field: DataField) -> Result<Option<f64>, LoadError> {
        match self.record.get(field) {
            None => Ok(None),
            Some(FieldValue::Float(v)) => Ok(Some(*v)),
            Some(FieldValue::Int(v)) => Ok(Some(*v as f64)),
            Some(_) => Err(self.malformed(field)),
        }
    }

    pub fn bool(&self, field: DataField) -> Result<bool, LoadError> {
        match self.record.get(field) {
            None => Err(self.missing(field)),
            Some(FieldValue::Bool(v)) => Ok(*v),
            Some(_) => Err(self.malformed(field)),
        }
    }

    pub fn text(&self, field: DataField) -> Result<String, LoadError> {
        match self.record.get(field) {
            None => Err(self.missing(field)),
            Some(FieldValue::Text(v)) => Ok(v.clone()),
            Some(_) => Err(self.malformed(field)),
        }
    }

    pub fn floats(&self, field: DataField) -> Result<Vec<f64>, LoadError> {
        match self.record.get(field) {
            None => Err(self.missing(field)),
            Some(FieldValue::FloatArray(v)) => Ok(v.clone()),
            Some(_) => Err(self.malformed(field)),
        }
    }

    /// 读取引用并登记待解析，返回空ID占位
    pub fn feature_ref(&mut self, field: DataField) -> Result<FeatureId, LoadError> {
        match self.record.get(field) {
            None => Err(self.missing(field)),
            Some(FieldValue::FeatureRef(id)) => {
                self.refs.push(RawRef::Single(field, *id));
                Ok(FeatureId::NULL)
            }
            Some(_) => Err(self.malformed(field)),
        }
    }

    pub fn feature_refs(&mut self, field: DataField) -> Result<Vec<FeatureId>, LoadError> {
        match self.record.get(field) {
            None => Err(self.missing(field)),
            Some(FieldValue::FeatureRefArray(ids)) => {
                self.refs.push(RawRef::Array(field, ids.clone()));
                Ok(vec![FeatureId::NULL; ids.len()])
            }
            Some(_) => Err(self.malformed(field)),
        }
    }

    fn outputs(&self) -> Result<Vec<FeatureId>, LoadError> {
        match self.record.get(DataField::Ids) {
            None => Ok(Vec::new()),
            Some(FieldValue::FeatureRefArray(ids)) => Ok(ids.clone()),
            Some(_) => Err(self.malformed(DataField::Ids)),
        }
    }

    pub fn parse(mut self) -> Result<ParsedRecord, LoadError> {
        if let Some((tag, _)) = self
            .record
            .fields
            .iter()
            .find(|(tag, _)| DataField::from_tag(*tag).is_none())
        {
            return Err(LoadError::MalformedField {
                operation: self.operation(),
                tag: *tag,
            });
        }

        let kind = match self.record.kind {
            1 => OperationKind::ControlPoint {
                x: self.float(DataField::X)?,
                y: self.float(DataField::Y)?,
                z: self.opt_float(DataField::Z)?,
            },
            2 => OperationKind::Radial {
                from: self.feature_ref(DataField::From)?,
                bearing: self.float(DataField::Bearing)?,
                distance: self.float(DataField::Distance)?,
            },
            3 => OperationKind::NewLine {
                start: self.feature_ref(DataField::From)?,
                end: self.feature_ref(DataField::To)?,
                topological: self.bool(DataField::Topological)?,
            },
            4 => OperationKind::IntersectTwoLines {
                line1: self.feature_ref(DataField::Line1)?,
                line2: self.feature_ref(DataField::Line2)?,
            },
            5 => OperationKind::IntersectTwoDistances {
                from1: self.feature_ref(DataField::From1)?,
                distance1: self.float(DataField::Distance1)?,
                from2: self.feature_ref(DataField::From2)?,
                distance2: self.float(DataField::Distance2)?,
                default: self.bool(DataField::Default)?,
            },
            6 => OperationKind::LineSubdivision {
                line: self.feature_ref(DataField::Line)?,
                distances: self.floats(DataField::Distances)?,
            },
            7 => OperationKind::NewText {
                x: self.float(DataField::X)?,
                y: self.float(DataField::Y)?,
                text: self.text(DataField::Text)?,
                height: self.float(DataField::Height)?,
                rotation: self.opt_float(DataField::Rotation)?.unwrap_or(0.0),
            },
            8 => OperationKind::Deletion {
                features: self.feature_refs(DataField::Features)?,
            },
            other => return Err(LoadError::UnknownKind(other)),
        };

        let outputs = self.outputs()?;
        let expected = kind.output_kinds().len();
        if outputs.len() != expected {
            return Err(LoadError::OutputCount {
                operation: self.operation(),
                expected,
                found: outputs.len(),
            });
        }

        Ok(ParsedRecord {
            operation: self.operation(),
            kind,
            outputs,
            refs: self.refs,
        })
    }
}

/// 引用解析结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// 已绑定
    Handled,
    /// 引用的要素尚未定义，已排队
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Single,
    Array(usize),
}

#[derive(Debug, Clone, Copy)]
struct Waiter {
    consumer: OperationId,
    field: DataField,
    slot: Slot,
}

#[derive(Debug)]
struct PendingOperation {
    kind: OperationKind,
    outputs: Vec<FeatureId>,
    arrays: HashMap<DataField, Vec<FeatureId>>,
}

/// 前向引用解析器
#[derive(Debug, Default)]
pub struct ForwardRefResolver {
    /// 已定义的要素：创建操作和类型
    known: HashMap<FeatureId, (OperationId, FeatureKind)>,
    waiting: HashMap<FeatureId, Vec<Waiter>>,
    operations: BTreeMap<OperationId, PendingOperation>,
}

impl ForwardRefResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一条记录及其输出要素，并绑定等待这些要素的引用
    pub fn define(
        &mut self,
        operation: OperationId,
        kind: OperationKind,
        outputs: Vec<FeatureId>,
    ) -> Result<(), LoadError> {
        if self.operations.contains_key(&operation) {
            return Err(LoadError::DuplicateSequence(operation));
        }
        let output_kinds = kind.output_kinds();
        self.operations.insert(
            operation,
            PendingOperation {
                kind,
                outputs: outputs.clone(),
                arrays: HashMap::new(),
            },
        );

        for (feature, feature_kind) in outputs.into_iter().zip(output_kinds) {
            if self.known.insert(feature, (operation, feature_kind)).is_some() {
                return Err(LoadError::DuplicateFeature(feature));
            }
            for waiter in self.waiting.remove(&feature).unwrap_or_default() {
                self.bind(waiter, feature)?;
            }
        }
        Ok(())
    }

    /// 解析单个引用字段
    pub fn resolve(
        &mut self,
        consumer: OperationId,
        field: DataField,
        feature: FeatureId,
    ) -> Result<Resolution, LoadError> {
        self.offer(
            Waiter {
                consumer,
                field,
                slot: Slot::Single,
            },
            feature,
        )
    }

    /// 解析引用数组，全部绑定时返回 `Handled`
    pub fn resolve_array(
        &mut self,
        consumer: OperationId,
        field: DataField,
        features: &[FeatureId],
    ) -> Result<Resolution, LoadError> {
        if let Some(op) = self.operations.get_mut(&consumer) {
            op.arrays
                .insert(field, vec![FeatureId::NULL; features.len()]);
        }
        let mut resolution = Resolution::Handled;
        for (i, feature) in features.iter().enumerate() {
            let waiter = Waiter {
                consumer,
                field,
                slot: Slot::Array(i),
            };
            if self.offer(waiter, *feature)? == Resolution::Deferred {
                resolution = Resolution::Deferred;
            }
        }
        Ok(resolution)
    }

    fn offer(&mut self, waiter: Waiter, feature: FeatureId) -> Result<Resolution, LoadError> {
        if self.known.contains_key(&feature) {
            self.bind(waiter, feature)?;
            Ok(Resolution::Handled)
        } else {
            self.waiting.entry(feature).or_default().push(waiter);
            Ok(Resolution::Deferred)
        }
    }

    fn bind(&mut self, waiter: Waiter, feature: FeatureId) -> Result<(), LoadError> {
        let Some(&(creator, found)) = self.known.get(&feature) else {
            return Err(LoadError::UnresolvedReference {
                operation: waiter.consumer,
                feature,
            });
        };
        if creator >= waiter.consumer {
            return Err(LoadError::OutOfOrderReference {
                operation: waiter.consumer,
                feature,
                creator,
            });
        }
        if let Some(expected) = waiter.field.expected_kind() {
            if expected != found {
                return Err(LoadError::WrongReferenceKind {
                    operation: waiter.consumer,
                    feature,
                    expected,
                    found,
                });
            }
        }

        let malformed = LoadError::MalformedField {
            operation: waiter.consumer,
            tag: waiter.field.tag(),
        };
        let op = self
            .operations
            .get_mut(&waiter.consumer)
            .ok_or(LoadError::Edit(EditError::UnknownOperation(waiter.consumer)))?;
        let applied = match waiter.slot {
            Slot::Single => op.kind.apply_feature_ref(waiter.field, feature),
            Slot::Array(i) => match op.arrays.get_mut(&waiter.field) {
                Some(refs) if i < refs.len() => {
                    refs[i] = feature;
                    op.kind.apply_feature_ref_array(waiter.field, refs)
                }
                _ => false,
            },
        };
        if applied {
            Ok(())
        } else {
            Err(malformed)
        }
    }

    /// 流读完后检查是否还有未解析的引用，返回按序号排列的操作
    pub fn finish(self) -> Result<Vec<(OperationId, OperationKind, Vec<FeatureId>)>, LoadError> {
        let unresolved = self
            .waiting
            .iter()
            .flat_map(|(feature, waiters)| waiters.iter().map(|w| (w.consumer, *feature)))
            .min();
        if let Some((operation, feature)) = unresolved {
            return Err(LoadError::UnresolvedReference { operation, feature });
        }
        Ok(self
            .operations
            .into_iter()
            .map(|(id, op)| (id, op.kind, op.outputs))
            .collect())
    }
}

/// 由编辑记录重建模型
pub fn load(records: &[EditRecord], config: &EngineConfig) -> Result<MapModel, LoadError> {
    let mut resolver = ForwardRefResolver::new();
    let mut deferred = 0usize;
    for record in records {
        let parsed = RecordReader::new(record).parse()?;
        let operation = parsed.operation;
        resolver.define(operation, parsed.kind, parsed.outputs)?;
        for raw in parsed.refs {
            let resolution = match raw {
                RawRef::Single(field, feature) => resolver.resolve(operation, field, feature)?,
                RawRef::Array(field, features) => {
                    resolver.resolve_array(operation, field, &features)?
                }
            };
            if resolution == Resolution::Deferred {
                deferred += 1;
            }
        }
    }
    let operations = resolver.finish()?;
    debug!(records = records.len(), deferred, "Edit stream resolved");

    let mut model = MapModel::new(config.clone());
    let count = operations.len();
    for (id, kind, outputs) in operations {
        model.replay(id, kind, &outputs)?;
    }
    model.rebuild_topology().map_err(EditError::from)?;
    info!(
        operations = count,
        features = model.features().len(),
        rings = model.topology().ring_count(),
        "Model loaded"
    );
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: u8, sequence: u32, fields: Vec<(DataField, FieldValue)>) -> EditRecord {
        EditRecord {
            kind,
            sequence,
            fields: fields.into_iter().map(|(f, v)| (f.tag(), v)).collect(),
        }
    }

    fn point(sequence: u32, id: u32, x: f64, y: f64) -> EditRecord {
        record(
            1,
            sequence,
            vec![
                (DataField::X, FieldValue::Float(x)),
                (DataField::Y, FieldValue::Float(y)),
                (DataField::Ids, FieldValue::FeatureRefArray(vec![FeatureId(id)])),
            ],
        )
    }

    fn line(sequence: u32, id: u32, from: u32, to: u32) -> EditRecord {
        record(
            3,
            sequence,
            vec![
                (DataField::From, FieldValue::FeatureRef(FeatureId(from))),
                (DataField::To, FieldValue::FeatureRef(FeatureId(to))),
                (DataField::Topological, FieldValue::Bool(true)),
                (DataField::Ids, FieldValue::FeatureRefArray(vec![FeatureId(id)])),
            ],
        )
    }

    fn square_model() -> MapModel {
        let mut model = MapModel::default();
        let mut points = Vec::new();
        for (x, y) in [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)] {
            let op = model
                .execute(OperationKind::ControlPoint { x, y, z: Some(1.5) })
                .unwrap();
            points.push(model.outputs(op).unwrap()[0]);
        }
        for i in 0..4 {
            model
                .execute(OperationKind::NewLine {
                    start: points[i],
                    end: points[(i + 1) % 4],
                    topological: true,
                })
                .unwrap();
        }
        model
            .execute(OperationKind::NewText {
                x: 5.0,
                y: 5.0,
                text: "Lot 7".into(),
                height: 2.0,
                rotation: 0.0,
            })
            .unwrap();
        model
    }

    #[test]
    fn test_data_field_tags() {
        assert_eq!(DataField::from_tag(DataField::Ids.tag()), Some(DataField::Ids));
        assert_eq!(DataField::from_tag(0), None);
        assert_eq!(DataField::From.expected_kind(), Some(FeatureKind::Point));
        assert_eq!(DataField::Line2.expected_kind(), Some(FeatureKind::Line));
        assert_eq!(DataField::Features.expected_kind(), None);
    }

    #[test]
    fn test_saved_model_loads_identically() {
        let model = square_model();
        let records = model.to_records();
        assert_eq!(records.len(), 9);
        assert_eq!(records[0].kind, 1);
        assert_eq!(records[4].get(DataField::Topological), Some(&FieldValue::Bool(true)));

        let loaded = load(&records, model.config()).unwrap();
        assert_eq!(loaded.snapshot(), model.snapshot());
        assert_eq!(loaded.to_records(), records);
        for feature in model.features().iter() {
            assert_eq!(loaded.features().position(feature.id), model.features().position(feature.id));
        }
    }

    #[test]
    fn test_forward_reference_is_deferred_then_bound() {
        let mut resolver = ForwardRefResolver::new();
        resolver
            .define(
                OperationId(3),
                OperationKind::NewLine {
                    start: FeatureId::NULL,
                    end: FeatureId::NULL,
                    topological: true,
                },
                vec![FeatureId(30)],
            )
            .unwrap();
        assert_eq!(
            resolver.resolve(OperationId(3), DataField::From, FeatureId(10)).unwrap(),
            Resolution::Deferred
        );

        resolver
            .define(
                OperationId(1),
                OperationKind::ControlPoint { x: 0.0, y: 0.0, z: None },
                vec![FeatureId(10)],
            )
            .unwrap();
        resolver
            .define(
                OperationId(2),
                OperationKind::ControlPoint { x: 1.0, y: 0.0, z: None },
                vec![FeatureId(20)],
            )
            .unwrap();
        assert_eq!(
            resolver.resolve(OperationId(3), DataField::To, FeatureId(20)).unwrap(),
            Resolution::Handled
        );

        let operations = resolver.finish().unwrap();
        let ids: Vec<OperationId> = operations.iter().map(|(id, _, _)| *id).collect();
        assert_eq!(ids, vec![OperationId(1), OperationId(2), OperationId(3)]);
        assert_eq!(
            operations[2].1,
            OperationKind::NewLine {
                start: FeatureId(10),
                end: FeatureId(20),
                topological: true,
            }
        );
    }

    #[test]
    fn test_stream_out_of_record_order_loads() {
        let records = vec![
            line(3, 30, 10, 20),
            point(2, 20, 10.0, 0.0),
            point(1, 10, 0.0, 0.0),
        ];
        let model = load(&records, &EngineConfig::default()).unwrap();
        assert_eq!(model.operations().len(), 3);
        assert_eq!(model.features().line_ends(FeatureId(30)), Some((FeatureId(10), FeatureId(20))));
        assert_eq!(model.operations().next_id(), OperationId(4));
    }

    #[test]
    fn test_deletion_record_binds_feature_array() {
        let deletion = record(
            8,
            9,
            vec![(
                DataField::Features,
                FieldValue::FeatureRefArray(vec![FeatureId(50), FeatureId(10)]),
            )],
        );
        // 删除记录排在最前，引用的要素都还没有定义
        let mut records = vec![deletion];
        for (i, (x, y)) in [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)].iter().enumerate() {
            records.push(point(i as u32 + 1, (i as u32 + 1) * 10, *x, *y));
        }
        for i in 0..4u32 {
            records.push(line(i + 5, (i + 5) * 10, (i + 1) * 10, ((i + 1) % 4 + 1) * 10));
        }

        let model = load(&records, &EngineConfig::default()).unwrap();

        assert!(!model.features().get(FeatureId(50)).unwrap().is_active());
        assert!(!model.features().get(FeatureId(10)).unwrap().is_active());
        assert!(model.topology().dividers_of(FeatureId(50)).is_empty());
        assert!(model.snapshot().polygons.is_empty());
        assert_eq!(
            model.operations().get(OperationId(9)).unwrap().kind,
            OperationKind::Deletion {
                features: vec![FeatureId(50), FeatureId(10)],
            }
        );
    }

    #[test]
    fn test_consuming_deleted_feature_fails() {
        let records = vec![
            point(1, 10, 0.0, 0.0),
            record(
                8,
                2,
                vec![(DataField::Features, FieldValue::FeatureRefArray(vec![FeatureId(10)]))],
            ),
            record(
                2,
                3,
                vec![
                    (DataField::From, FieldValue::FeatureRef(FeatureId(10))),
                    (DataField::Bearing, FieldValue::Float(0.0)),
                    (DataField::Distance, FieldValue::Float(5.0)),
                    (DataField::Ids, FieldValue::FeatureRefArray(vec![FeatureId(20)])),
                ],
            ),
        ];

        let err = load(&records, &EngineConfig::default()).unwrap_err();
        assert_eq!(
            err,
            LoadError::Edit(EditError::InactiveFeature {
                operation: OperationId(3),
                feature: FeatureId(10),
            })
        );
    }

    #[test]
    fn test_reference_to_later_operation_fails() {
        let records = vec![
            point(1, 10, 0.0, 0.0),
            line(7, 70, 10, 90),
            point(9, 90, 5.0, 5.0),
        ];
        let err = load(&records, &EngineConfig::default()).unwrap_err();
        assert_eq!(
            err,
            LoadError::OutOfOrderReference {
                operation: OperationId(7),
                feature: FeatureId(90),
                creator: OperationId(9),
            }
        );
    }

    #[test]
    fn test_unresolved_reference_fails() {
        let records = vec![point(1, 10, 0.0, 0.0), line(2, 20, 10, 99)];
        let err = load(&records, &EngineConfig::default()).unwrap_err();
        assert_eq!(
            err,
            LoadError::UnresolvedReference {
                operation: OperationId(2),
                feature: FeatureId(99),
            }
        );
    }

    #[test]
    fn test_reference_of_wrong_kind_fails() {
        let records = vec![
            point(1, 10, 0.0, 0.0),
            point(2, 20, 10.0, 0.0),
            line(3, 30, 10, 20),
            line(4, 40, 10, 30),
        ];
        let err = load(&records, &EngineConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            LoadError::WrongReferenceKind {
                operation: OperationId(4),
                expected: FeatureKind::Point,
                found: FeatureKind::Line,
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_records() {
        let missing = record(1, 1, vec![(DataField::X, FieldValue::Float(1.0))]);
        assert_eq!(
            RecordReader::new(&missing).parse().unwrap_err(),
            LoadError::MissingField {
                operation: OperationId(1),
                field: DataField::Y,
            }
        );

        let unknown = record(42, 1, vec![]);
        assert_eq!(
            RecordReader::new(&unknown).parse().unwrap_err(),
            LoadError::UnknownKind(42)
        );

        let wrong_type = record(
            1,
            1,
            vec![
                (DataField::X, FieldValue::Text("1".into())),
                (DataField::Y, FieldValue::Float(1.0)),
            ],
        );
        assert!(matches!(
            RecordReader::new(&wrong_type).parse().unwrap_err(),
            LoadError::MalformedField { tag: 1, .. }
        ));

        let no_ids = record(
            1,
            1,
            vec![
                (DataField::X, FieldValue::Float(1.0)),
                (DataField::Y, FieldValue::Float(1.0)),
            ],
        );
        assert!(matches!(
            RecordReader::new(&no_ids).parse().unwrap_err(),
            LoadError::OutputCount { expected: 1, found: 0, .. }
        ));
    }

    #[test]
    fn test_duplicate_sequence_and_feature() {
        let err = load(&[point(1, 10, 0.0, 0.0), point(1, 11, 1.0, 0.0)], &EngineConfig::default())
            .unwrap_err();
        assert_eq!(err, LoadError::DuplicateSequence(OperationId(1)));

        let err = load(&[point(1, 10, 0.0, 0.0), point(2, 10, 1.0, 0.0)], &EngineConfig::default())
            .unwrap_err();
        assert_eq!(err, LoadError::DuplicateFeature(FeatureId(10)));
    }
}

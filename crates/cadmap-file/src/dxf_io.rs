//! DXF导出
//!
//! 把有效的点、线、文本和多边形环写成 AutoCAD DXF，每类放在单独的图层上。

use crate::error::FileError;
use cadmap_core::feature::{FeatureKind, FeatureGeometry};
use cadmap_core::math::Point2;
use cadmap_core::model::MapModel;
use std::path::Path;

pub const POINT_LAYER: &str = "POINTS";
pub const LINE_LAYER: &str = "LINES";
pub const TEXT_LAYER: &str = "TEXT";
pub const POLYGON_LAYER: &str = "POLYGONS";

/// 各图层写出的实体数量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub points: usize,
    pub lines: usize,
    pub texts: usize,
    pub polygons: usize,
}

/// 导出到DXF文件
pub fn export(model: &MapModel, path: &Path) -> Result<ExportSummary, FileError> {
    let mut drawing = dxf::Drawing::new();
    // LWPOLYLINE 需要 R14 以上
    drawing.header.version = dxf::enums::AcadVersion::R2000;

    // 图层颜色为 ACI 索引
    for (name, aci) in [
        (POINT_LAYER, 3u8),
        (LINE_LAYER, 7),
        (TEXT_LAYER, 2),
        (POLYGON_LAYER, 5),
    ] {
        let mut layer = dxf::tables::Layer::default();
        layer.name = name.to_string();
        layer.color = dxf::Color::from_index(aci);
        drawing.add_layer(layer);
    }

    let mut summary = ExportSummary::default();
    let features = model.features();

    for feature in features.iter().filter(|f| f.is_active()) {
        let specific = match feature.kind() {
            FeatureKind::Point => {
                let Some(position) = features.position(feature.id) else {
                    continue;
                };
                let z = features.z(feature.id).unwrap_or(0.0);
                let mut point = dxf::entities::ModelPoint::default();
                point.location = dxf::Point::new(position.x, position.y, z);
                summary.points += 1;
                dxf::entities::EntityType::ModelPoint(point)
            }
            FeatureKind::Line => {
                let segment = features.segment(feature.id).map_err(|e| {
                    FileError::Dxf(format!("Line {} cannot be exported: {e}", feature.id))
                })?;
                let mut line = dxf::entities::Line::default();
                line.p1 = dxf::Point::new(segment.start.x, segment.start.y, 0.0);
                line.p2 = dxf::Point::new(segment.end.x, segment.end.y, 0.0);
                summary.lines += 1;
                dxf::entities::EntityType::Line(line)
            }
            FeatureKind::Text => {
                let FeatureGeometry::Text(text) = &feature.geometry else {
                    continue;
                };
                let mut dxf_text = dxf::entities::Text::default();
                dxf_text.location = dxf::Point::new(text.position.x, text.position.y, 0.0);
                dxf_text.text_height = text.height;
                dxf_text.value = text.content.clone();
                dxf_text.rotation = text.rotation.to_degrees();
                summary.texts += 1;
                dxf::entities::EntityType::Text(dxf_text)
            }
        };
        let layer = match feature.kind() {
            FeatureKind::Point => POINT_LAYER,
            FeatureKind::Line => LINE_LAYER,
            FeatureKind::Text => TEXT_LAYER,
        };
        drawing.add_entity(on_layer(specific, layer));
    }

    for (_, ring) in model.topology().polygons() {
        drawing.add_entity(on_layer(closed_polyline(&ring.outline), POLYGON_LAYER));
        summary.polygons += 1;
    }

    drawing
        .save_file(path)
        .map_err(|e| FileError::Dxf(e.to_string()))?;

    tracing::info!(
        points = summary.points,
        lines = summary.lines,
        texts = summary.texts,
        polygons = summary.polygons,
        "Exported DXF to {}",
        path.display()
    );

    Ok(summary)
}

fn on_layer(specific: dxf::entities::EntityType, layer: &str) -> dxf::entities::Entity {
    let mut entity = dxf::entities::Entity::new(specific);
    entity.common.layer = layer.to_string();
    entity
}

fn closed_polyline(outline: &[Point2]) -> dxf::entities::EntityType {
    let mut lwpoly = dxf::entities::LwPolyline::default();
    lwpoly.set_is_closed(true);
    lwpoly.vertices = outline
        .iter()
        .map(|p| {
            let mut vertex = dxf::LwPolylineVertex::default();
            vertex.x = p.x;
            vertex.y = p.y;
            vertex
        })
        .collect();
    dxf::entities::EntityType::LwPolyline(lwpoly)
}

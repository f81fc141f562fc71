//! 空间索引
//!
//! 基于均匀网格的包围盒索引，用于：
//! - 查找与某条线范围重叠的线（拓扑修复的影响范围）
//! - 查找包含某点的环（岛的归属）
//! - 查找重合的点要素（共享节点）

use crate::math::{BoundingBox2, Point2};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// 简单的空间索引（基于网格）
#[derive(Debug, Clone)]
pub struct SpatialIndex<K> {
    /// 网格单元大小
    cell_size: f64,

    /// 网格映射：网格坐标 -> 条目列表
    grid: HashMap<(i64, i64), Vec<K>>,

    /// 条目的包围盒缓存
    bboxes: HashMap<K, BoundingBox2>,
}

impl<K: Copy + Eq + Hash> SpatialIndex<K> {
    /// 创建新的空间索引
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size: cell_size.max(f64::MIN_POSITIVE),
            grid: HashMap::new(),
            bboxes: HashMap::new(),
        }
    }

    /// 将世界坐标转换为网格坐标
    fn to_grid_coord(&self, x: f64, y: f64) -> (i64, i64) {
        (
            (x / self.cell_size).floor() as i64,
            (y / self.cell_size).floor() as i64,
        )
    }

    /// 获取包围盒覆盖的所有网格单元
    fn cells_for_bbox(&self, bbox: &BoundingBox2) -> Vec<(i64, i64)> {
        let (min_gx, min_gy) = self.to_grid_coord(bbox.min.x, bbox.min.y);
        let (max_gx, max_gy) = self.to_grid_coord(bbox.max.x, bbox.max.y);

        let mut cells = Vec::new();
        for gx in min_gx..=max_gx {
            for gy in min_gy..=max_gy {
                cells.push((gx, gy));
            }
        }
        cells
    }

    /// 插入条目（已存在则替换）
    pub fn insert(&mut self, key: K, bbox: BoundingBox2) {
        self.remove(&key);

        for cell in self.cells_for_bbox(&bbox) {
            self.grid.entry(cell).or_default().push(key);
        }
        self.bboxes.insert(key, bbox);
    }

    /// 移除条目
    pub fn remove(&mut self, key: &K) -> bool {
        if let Some(bbox) = self.bboxes.remove(key) {
            for cell in self.cells_for_bbox(&bbox) {
                if let Some(keys) = self.grid.get_mut(&cell) {
                    keys.retain(|k| k != key);
                    if keys.is_empty() {
                        self.grid.remove(&cell);
                    }
                }
            }
            true
        } else {
            false
        }
    }

    /// 范围查询：查找与指定矩形相交的所有条目
    pub fn query_rect(&self, rect: &BoundingBox2) -> Vec<K> {
        let mut result = Vec::new();
        let mut seen = HashSet::new();

        for cell in self.cells_for_bbox(rect) {
            if let Some(keys) = self.grid.get(&cell) {
                for key in keys {
                    if seen.insert(*key) {
                        if let Some(bbox) = self.bboxes.get(key) {
                            if bbox.intersects(rect) {
                                result.push(*key);
                            }
                        }
                    }
                }
            }
        }

        result
    }

    /// 点击测试：查找包围盒包含指定点的所有条目
    pub fn query_point(&self, point: &Point2) -> Vec<K> {
        let cell = self.to_grid_coord(point.x, point.y);

        let mut result = Vec::new();
        if let Some(keys) = self.grid.get(&cell) {
            for key in keys {
                if let Some(bbox) = self.bboxes.get(key) {
                    if bbox.contains(point) {
                        result.push(*key);
                    }
                }
            }
        }
        result
    }

    /// 清空索引
    pub fn clear(&mut self) {
        self.grid.clear();
        self.bboxes.clear();
    }

    pub fn len(&self) -> usize {
        self.bboxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bboxes.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.bboxes.contains_key(key)
    }

    /// 获取条目的包围盒
    pub fn get_bbox(&self, key: &K) -> Option<&BoundingBox2> {
        self.bboxes.get(key)
    }
}

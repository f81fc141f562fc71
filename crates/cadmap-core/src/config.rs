//! 引擎配置

use serde::{Deserialize, Serialize};

/// 拓扑构建参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// 坐标容差（米），距离小于该值的两点视为同一点
    pub tolerance: f64,

    /// 空间索引网格大小（米）
    pub grid_cell_size: f64,

    /// 短线检查阈值（米）
    pub small_line_length: f64,

    /// 小多边形检查阈值（平方米）
    pub small_polygon_area: f64,

    /// 全量重建时使用 rayon 并行计算交点
    pub parallel_rebuild: bool,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            grid_cell_size: 100.0,
            small_line_length: 0.001, // 1毫米
            small_polygon_area: 1e-4,
            parallel_rebuild: true,
        }
    }
}

/// 引擎配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub topology: TopologyConfig,
}

impl EngineConfig {
    /// 坐标容差的便捷访问
    pub fn tolerance(&self) -> f64 {
        self.topology.tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "topology": { "tolerance": 0.001 } }"#).unwrap();
        assert_eq!(config.tolerance(), 0.001);
        assert_eq!(config.topology.grid_cell_size, 100.0);
        assert!(config.topology.parallel_rebuild);
    }
}

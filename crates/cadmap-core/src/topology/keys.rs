//! 拓扑实体的 slotmap 键
//!
//! 分界线与环之间的双向引用都保存键，通过 [`Topology`](super::Topology) 中的表解析。

use slotmap::new_key_type;

new_key_type! {
    /// 分界线键
    pub struct DividerKey;

    /// 多边形环键
    pub struct RingKey;
}

//! 元数据表缓存常量定义

//=============================================================================
// 槽位相关
//=============================================================================

/// 未分配槽位的偏移哨兵值
///
/// 偏移为 0 的槽位不映射任何存储位置，也永远不是脏的。
pub const UNASSIGNED_OFFSET: u64 = 0;

/// 新载入表的初始命中分数
///
/// 新载入的表带着这个分数开始，避免下一次驱逐扫描就把它换出。
pub const WARM_START_HITS: u32 = 32;

//=============================================================================
// 存储相关
//=============================================================================

/// 默认缓冲区对齐（字节），满足绝大多数直通 I/O 设备的扇区对齐
pub const DEFAULT_ALIGNMENT: usize = 512;

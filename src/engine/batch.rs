//! 批次规划器 (Batch Planner)
//!
//! 将描述符切分为定长批次；批内槽位按下标绑定本地端口，
//! 批次严格串行执行，端口跨批次复用。

use crate::core::model::LinkedDescriptor;

/// 批内槽位：探测方仅凭下标即可推算目标端口，无需发现协议
#[derive(Debug)]
pub struct BatchSlot<'a> {
    pub index: usize,
    pub port: u16,
    pub entry: &'a LinkedDescriptor,
}

/// 为一个批次分配槽位端口
pub fn slots(batch: &[LinkedDescriptor], base_port: u16) -> Vec<BatchSlot<'_>> {
    batch
        .iter()
        .enumerate()
        .map(|(index, entry)| BatchSlot {
            index,
            port: base_port + index as u16,
            entry,
        })
        .collect()
}

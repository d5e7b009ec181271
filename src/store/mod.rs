//! 存储适配层 / Store adapter layer
//!
//! 会话元数据、确认去重集合、消息计数器和离线队列都放在一个共享的
//! 键值存储里，这里只抽象用到的哈希/集合/列表原子操作，不含业务逻辑。
//! Session metadata, ack dedup sets, message counters and offline queues all
//! live in one shared key-value store; this layer abstracts only the atomic
//! hash/set/list operations used, with no business logic.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

pub mod memory;

pub use memory::MemoryStore;

/// 外部键值存储接口 / External key-value store interface
///
/// 每个方法对应存储端的一条原子命令 / Each method maps to one atomic command on the store side
#[async_trait]
pub trait Store: Send + Sync {
    /// 键是否存在 / Whether the key exists
    async fn exists(&self, key: &str) -> Result<bool>;

    /// 写入哈希的多个字段（upsert）/ Write multiple hash fields (upsert)
    async fn hset_all(&self, key: &str, fields: &[(String, String)]) -> Result<()>;

    /// 读取哈希的指定字段，键或字段缺失返回 None 占位
    /// Read selected hash fields, missing key or field yields a None slot
    async fn hget_multi(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<String>>>;

    /// 一次原子批量读取多个哈希 / Atomically read multiple hashes in one batch
    async fn hgetall_batch(&self, keys: &[String]) -> Result<Vec<Option<HashMap<String, String>>>>;

    /// 哈希字段原子自增 / Atomically increment a hash field
    async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64>;

    /// 集合添加成员，返回成员是否为新增
    /// Add a member to a set, returns whether membership actually changed
    async fn sadd(&self, key: &str, member: &str) -> Result<bool>;

    /// 按插入顺序读取列表区间，start/stop 为闭区间下标
    /// Read a list range in insertion order, start/stop are inclusive indices
    async fn lrange(&self, key: &str, start: usize, stop: usize) -> Result<Vec<String>>;

    /// 列表尾部追加 / Append to the tail of a list
    async fn rpush(&self, key: &str, value: &str) -> Result<usize>;

    /// 删除整个键 / Delete the whole key
    async fn del(&self, key: &str) -> Result<()>;
}

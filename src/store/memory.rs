//! 内存存储实现 / In-memory store implementation
//!
//! 默认二进制与单元测试使用。全表一把读写锁，单条命令和批量读取
//! 都在持锁期间完成，满足单命令原子性契约。
//! Used by the default binary and unit tests. One table-wide RwLock; single
//! commands and batch reads complete under the lock, satisfying the
//! per-command atomicity contract.

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

use super::Store;

enum Entry {
    Hash(HashMap<String, String>),
    Set(HashSet<String>),
    List(Vec<String>),
}

impl Entry {
    fn type_name(&self) -> &'static str {
        match self {
            Entry::Hash(_) => "hash",
            Entry::Set(_) => "set",
            Entry::List(_) => "list",
        }
    }
}

/// 基于 HashMap 的存储 / HashMap-backed store
#[derive(Default)]
pub struct MemoryStore {
    table: RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.table.read().contains_key(key))
    }

    async fn hset_all(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        let mut table = self.table.write();
        let entry = table.entry(key.to_string()).or_insert_with(|| Entry::Hash(HashMap::new()));
        match entry {
            Entry::Hash(hash) => {
                for (field, value) in fields {
                    hash.insert(field.clone(), value.clone());
                }
                Ok(())
            }
            other => bail!("WRONGTYPE key {} holds a {}", key, other.type_name()),
        }
    }

    async fn hget_multi(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<String>>> {
        let table = self.table.read();
        match table.get(key) {
            Some(Entry::Hash(hash)) => {
                Ok(fields.iter().map(|f| hash.get(*f).cloned()).collect())
            }
            Some(other) => bail!("WRONGTYPE key {} holds a {}", key, other.type_name()),
            None => Ok(fields.iter().map(|_| None).collect()),
        }
    }

    async fn hgetall_batch(&self, keys: &[String]) -> Result<Vec<Option<HashMap<String, String>>>> {
        let table = self.table.read();
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            match table.get(key) {
                Some(Entry::Hash(hash)) => out.push(Some(hash.clone())),
                Some(other) => bail!("WRONGTYPE key {} holds a {}", key, other.type_name()),
                None => out.push(None),
            }
        }
        Ok(out)
    }

    async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let mut table = self.table.write();
        let entry = table.entry(key.to_string()).or_insert_with(|| Entry::Hash(HashMap::new()));
        match entry {
            Entry::Hash(hash) => {
                let slot = hash.entry(field.to_string()).or_insert_with(|| "0".to_string());
                let next = slot.parse::<i64>().unwrap_or(0) + delta;
                *slot = next.to_string();
                Ok(next)
            }
            other => bail!("WRONGTYPE key {} holds a {}", key, other.type_name()),
        }
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool> {
        let mut table = self.table.write();
        let entry = table.entry(key.to_string()).or_insert_with(|| Entry::Set(HashSet::new()));
        match entry {
            Entry::Set(set) => Ok(set.insert(member.to_string())),
            other => bail!("WRONGTYPE key {} holds a {}", key, other.type_name()),
        }
    }

    async fn lrange(&self, key: &str, start: usize, stop: usize) -> Result<Vec<String>> {
        let table = self.table.read();
        match table.get(key) {
            Some(Entry::List(list)) => {
                let end = (stop + 1).min(list.len());
                if start >= end {
                    return Ok(Vec::new());
                }
                Ok(list[start..end].to_vec())
            }
            Some(other) => bail!("WRONGTYPE key {} holds a {}", key, other.type_name()),
            None => Ok(Vec::new()),
        }
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<usize> {
        let mut table = self.table.write();
        let entry = table.entry(key.to_string()).or_insert_with(|| Entry::List(Vec::new()));
        match entry {
            Entry::List(list) => {
                list.push(value.to_string());
                Ok(list.len())
            }
            other => bail!("WRONGTYPE key {} holds a {}", key, other.type_name()),
        }
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.table.write().remove(key);
        Ok(())
    }
}

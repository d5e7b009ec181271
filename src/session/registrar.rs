//! 命名空间注册器 / Namespace registrar
//!
//! 显式登记每个逻辑命名空间上绑定的连接处理器，保证同一命名空间
//! 只绑定一次，配置热加载重复注册时不会产生重复绑定。
//! Explicit registry of the lifecycle listener bound to each logical
//! namespace; a namespace is bound at most once, so re-registration during a
//! hot configuration reload never double-binds.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::server::GatewayServer;

/// 连接成功事件处理器 / Connection event listener
#[async_trait]
pub trait ConnectionListener: Send + Sync {
    async fn on_connection(&self, server: &GatewayServer, client_id: &str);
}

/// 命名空间到已安装处理器的注册表 / Registry of installed listeners per namespace
#[derive(Default)]
pub struct NamespaceRegistrar {
    bindings: DashMap<String, Arc<dyn ConnectionListener>>,
}

impl NamespaceRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// 绑定处理器，已绑定时为空操作。entry API 保证并发注册下的
    /// 原子检查加设置。
    /// Bind a listener, no-op when already bound. The entry API gives an
    /// atomic check-and-set under concurrent registration.
    pub fn register(&self, namespace: &str, listener: Arc<dyn ConnectionListener>) -> bool {
        match self.bindings.entry(namespace.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(listener);
                true
            }
        }
    }

    /// 仅当当前绑定的就是传入的处理器时才移除，未绑定时为空操作
    /// Remove only when the bound listener is the given one, no-op when unbound
    pub fn unregister(&self, namespace: &str, listener: &Arc<dyn ConnectionListener>) -> bool {
        self.bindings
            .remove_if(namespace, |_, bound| Arc::ptr_eq(bound, listener))
            .is_some()
    }

    /// 查询命名空间上绑定的处理器 / Look up the listener bound to a namespace
    pub fn lookup(&self, namespace: &str) -> Option<Arc<dyn ConnectionListener>> {
        self.bindings.get(namespace).map(|entry| entry.value().clone())
    }

    pub fn is_bound(&self, namespace: &str) -> bool {
        self.bindings.contains_key(namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingListener {
        hits: AtomicUsize,
    }

    #[async_trait]
    impl ConnectionListener for CountingListener {
        async fn on_connection(&self, _server: &GatewayServer, _client_id: &str) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn register_twice_binds_once() {
        let registrar = NamespaceRegistrar::new();
        let listener = Arc::new(CountingListener { hits: AtomicUsize::new(0) });
        let first: Arc<dyn ConnectionListener> = listener.clone();
        let second: Arc<dyn ConnectionListener> = Arc::new(CountingListener { hits: AtomicUsize::new(0) });

        assert!(registrar.register("/push", first));
        // 第二次注册被忽略，原处理器保持绑定 / Second registration ignored, original stays bound
        assert!(!registrar.register("/push", second));

        let server = GatewayServer::new(crate::config::GatewayConfig::default());
        let bound = registrar.lookup("/push").unwrap();
        bound.on_connection(&server, "c1").await;
        assert_eq!(listener.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unregister_is_idempotent_and_identity_checked() {
        let registrar = NamespaceRegistrar::new();
        let installed: Arc<dyn ConnectionListener> =
            Arc::new(CountingListener { hits: AtomicUsize::new(0) });
        let foreign: Arc<dyn ConnectionListener> =
            Arc::new(CountingListener { hits: AtomicUsize::new(0) });

        // 未绑定时解绑为空操作 / Unregister while unbound is a no-op
        assert!(!registrar.unregister("/push", &installed));

        registrar.register("/push", installed.clone());
        // 非本组件安装的处理器不会被移除 / A listener we did not install is not removed
        assert!(!registrar.unregister("/push", &foreign));
        assert!(registrar.is_bound("/push"));

        assert!(registrar.unregister("/push", &installed));
        assert!(!registrar.is_bound("/push"));
        assert!(!registrar.unregister("/push", &installed));
    }

    #[tokio::test]
    async fn rebind_after_unregister_works() {
        let registrar = NamespaceRegistrar::new();
        let listener: Arc<dyn ConnectionListener> =
            Arc::new(CountingListener { hits: AtomicUsize::new(0) });
        registrar.register("/push", listener.clone());
        registrar.unregister("/push", &listener);
        assert!(registrar.register("/push", listener));
    }
}

//! 服务端全局状态 / Server global state

use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::config::GatewayConfig;
use crate::domain::session::{Platform, SessionState};
use crate::service::client::{ClientService, DefaultClientService};
use crate::session::lifecycle::LifecycleListener;
use crate::session::registrar::{ConnectionListener, NamespaceRegistrar};
use crate::store::{MemoryStore, Store};

/// 客户端连接信息 / Client connection information
#[derive(Clone)]
pub struct Connection {
    pub client_id: String,                      // 连接唯一ID / Connection unique ID
    pub namespace: String,                      // 所属命名空间 / Owning namespace
    pub uid: Option<String>,                    // 用户ID，握手后可用 / User ID, set after handshake
    pub platform: Platform,                     // 客户端平台 / Client platform
    pub addr: SocketAddr,                       // 客户端地址 / Client address
    pub sender: mpsc::UnboundedSender<Message>, // 消息发送器 / Message sender
    pub state: Arc<Mutex<SessionState>>,        // 会话状态机 / Session state machine
    /// 握手携带的初始房间列表，开通时一次性取走
    /// Initial room list carried by the handshake, taken once during provisioning
    pub handshake_rooms: Arc<Mutex<Option<Vec<String>>>>,
}

impl Connection {
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn set_state(&self, next: SessionState) {
        *self.state.lock() = next;
    }
}

/// 推送网关服务端 / Push gateway server
pub struct GatewayServer {
    pub connections: Arc<DashMap<String, Connection>>, // 客户端连接 / Client connections
    pub rooms: Arc<DashMap<String, DashSet<String>>>,  // 传输层房间到连接集合 / Transport room -> client ids
    pub registrar: Arc<NamespaceRegistrar>,            // 命名空间注册器 / Namespace registrar
    pub store: Arc<dyn Store>,                         // 外部存储 / External store
    pub client_service: Arc<dyn ClientService>,        // 客户端服务协作方 / Client service collaborator
    pub config: Arc<GatewayConfig>,                    // 网关配置 / Gateway configuration
    pub hostname: String,                              // 本机主机名 / Local hostname
    lifecycle: Arc<dyn ConnectionListener>,            // 标准连接处理器 / Standard lifecycle listener
}

impl GatewayServer {
    /// 构建默认服务端实例 / Build default server instance
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
            rooms: Arc::new(DashMap::new()),
            registrar: Arc::new(NamespaceRegistrar::new()),
            store: Arc::new(MemoryStore::new()),
            client_service: Arc::new(DefaultClientService),
            config: Arc::new(config),
            hostname: sys_info::hostname().unwrap_or_else(|_| "unknown".to_string()),
            lifecycle: Arc::new(LifecycleListener),
        }
    }

    /// 配置存储后端 / Configure store backend
    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = store;
        self
    }

    /// 配置客户端服务协作方 / Configure client service collaborator
    pub fn with_client_service(mut self, service: Arc<dyn ClientService>) -> Self {
        self.client_service = service;
        self
    }

    /// 为命名空间绑定标准连接处理器，重复调用为空操作
    /// Bind the standard lifecycle listener to a namespace, repeated calls are no-ops
    pub fn register_namespace(&self, namespace: &str) -> bool {
        self.registrar.register(namespace, self.lifecycle.clone())
    }

    /// 解绑本组件安装的连接处理器 / Unbind the listener this component installed
    pub fn unregister_namespace(&self, namespace: &str) -> bool {
        self.registrar.unregister(namespace, &self.lifecycle)
    }

    /// 连接终止时隐式释放所有房间成员关系
    /// Room memberships are released implicitly when the connection terminates
    pub fn release_rooms(&self, client_id: &str) {
        self.rooms.retain(|_, members| {
            members.remove(client_id);
            !members.is_empty()
        });
    }

    /// 房间当前成员 / Current members of a transport room
    pub fn room_members(&self, room: &str) -> Vec<String> {
        self.rooms
            .get(room)
            .map(|set| set.iter().map(|m| m.key().clone()).collect())
            .unwrap_or_default()
    }
}

impl Clone for GatewayServer {
    fn clone(&self) -> Self {
        Self {
            connections: self.connections.clone(),
            rooms: self.rooms.clone(),
            registrar: self.registrar.clone(),
            store: self.store.clone(),
            client_service: self.client_service.clone(),
            config: self.config.clone(),
            hostname: self.hostname.clone(),
            lifecycle: self.lifecycle.clone(),
        }
    }
}

use std::sync::Arc;

use log::info;
use serde_json::Value;
use uuid::Uuid;

use crate::host::context::{DispatchTarget, EntityId, HostContext};
use crate::host::lifecycle::LifecycleRegistry;
use crate::host::navigation::{
    NavigationStack, ResultCallback, RouteBack, Screen, ScreenResult,
};

/// Identity of one player session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Invoked exactly once when the session shuts down with notification
/// enabled, however the shutdown was reached.
pub type ShutdownNotifier = Box<dyn FnOnce(SessionId) + Send>;

/// One player's interactive session: a navigation stack root, the lifecycle
/// registry every subscription of its screens lands in, a deeplink, an
/// optional origin token, and a shared-chrome flag.
///
/// Created on player entry, destroyed on player exit or explicit shutdown;
/// at that point the lifecycle registry is cleared unconditionally, so no
/// registered task or subscription survives the session.
pub struct Session {
    id: SessionId,
    ctx: Arc<HostContext>,
    player: EntityId,
    deeplink: String,
    origin: Option<Value>,
    use_shared_chrome: bool,
    stack: NavigationStack,
    scope: LifecycleRegistry,
    on_shutdown: Option<ShutdownNotifier>,
    closed: bool,
}

impl Session {
    pub fn open(
        ctx: Arc<HostContext>,
        player: EntityId,
        deeplink: impl Into<String>,
        root: Box<dyn Screen>,
    ) -> Self {
        let session = Self {
            id: SessionId::new(),
            ctx,
            player,
            deeplink: deeplink.into(),
            origin: None,
            use_shared_chrome: false,
            stack: NavigationStack::create(root),
            scope: LifecycleRegistry::new(),
            on_shutdown: None,
            closed: false,
        };
        info!(
            "session {:?} opened for player {:?} (deeplink '{}')",
            session.id, session.player, session.deeplink
        );
        session
    }

    pub fn with_origin(mut self, origin: Value) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_shared_chrome(mut self, use_shared_chrome: bool) -> Self {
        self.use_shared_chrome = use_shared_chrome;
        self
    }

    pub fn with_shutdown_notifier(mut self, notifier: ShutdownNotifier) -> Self {
        self.on_shutdown = Some(notifier);
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn player(&self) -> EntityId {
        self.player
    }

    pub fn deeplink(&self) -> &str {
        &self.deeplink
    }

    pub fn origin(&self) -> Option<&Value> {
        self.origin.as_ref()
    }

    pub fn use_shared_chrome(&self) -> bool {
        self.use_shared_chrome
    }

    pub fn ctx(&self) -> &Arc<HostContext> {
        &self.ctx
    }

    /// Dispatch target for work that must run on whichever context owns
    /// this session's player.
    pub fn target(&self) -> DispatchTarget {
        DispatchTarget::Entity(self.player)
    }

    pub fn scope(&self) -> &LifecycleRegistry {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut LifecycleRegistry {
        &mut self.scope
    }

    pub fn stack(&self) -> &NavigationStack {
        &self.stack
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn route_to(&mut self, screen: Box<dyn Screen>, on_result: Option<ResultCallback>) {
        if !self.closed {
            self.stack.route_to(screen, on_result);
        }
    }

    /// Route back one screen; at the root this closes the whole session.
    pub fn route_back(&mut self) {
        self.route_back_with(None)
    }

    pub fn route_back_with(&mut self, result: Option<ScreenResult>) {
        if self.closed {
            return;
        }
        if let RouteBack::SessionEnd = self.stack.route_back_with(result) {
            self.shutdown(true);
        }
    }

    /// Hide the session without discarding its navigation state.
    pub fn minimize(&mut self) {
        self.stack.minimize();
    }

    pub fn maximize(&mut self) {
        self.stack.maximize();
    }

    /// Close the head screen and tear the session down. `notify` controls
    /// whether the parent session (shutdown notifier) hears about it.
    pub fn close(&mut self, notify: bool) {
        if self.closed {
            return;
        }
        self.stack.close();
        self.shutdown(notify);
    }

    fn shutdown(&mut self, notify: bool) {
        if self.closed {
            return;
        }
        self.closed = true;
        // Nothing registered by this session's screens may outlive it.
        self.scope.clear_all();
        info!("session {:?} for player {:?} closed", self.id, self.player);
        if notify {
            if let Some(notifier) = self.on_shutdown.take() {
                notifier(self.id);
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Player exit without an explicit close still clears the scope.
        self.shutdown(false);
    }
}

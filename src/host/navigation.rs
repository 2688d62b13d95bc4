use std::any::Any;

use log::{debug, info};
use uuid::Uuid;

/// Identity of one screen on a session's stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScreenId(Uuid);

impl ScreenId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Lifecycle status of a screen, driven only by the stack, never by the
/// screen itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenStatus {
    Created,
    Paused,
    Closed,
}

/// Result a popping screen hands back to the callback registered when it
/// was pushed.
pub type ScreenResult = Box<dyn Any + Send>;
pub type ResultCallback = Box<dyn FnOnce(ScreenResult) + Send>;

/// One navigable unit of interactive state (the "Block" abstraction).
///
/// Hooks fire in stack order only: `on_create` on first push and on every
/// resume after a child pops, `on_pause`/`on_resume` when the whole session
/// is hidden and shown again, `on_close` when the screen leaves the head
/// position or the session ends.
pub trait Screen: Send {
    fn title(&self) -> &str;

    fn on_create(&mut self) {}
    fn on_pause(&mut self) {}
    fn on_resume(&mut self) {}
    fn on_close(&mut self) {}
}

struct ScreenEntry {
    id: ScreenId,
    screen: Box<dyn Screen>,
    /// Set once at push time, immutable thereafter. Owned by the stack.
    parent: Option<ScreenId>,
    status: ScreenStatus,
    on_result: Option<ResultCallback>,
}

/// Outcome of routing back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteBack {
    /// The parent screen is the new head.
    Resumed(ScreenId),
    /// There was no parent; the whole session closes. Not an error.
    SessionEnd,
}

/// Per-session stack of screens with push/pop, pause/resume, and
/// result-callback semantics. Exactly one screen is head at any instant.
pub struct NavigationStack {
    entries: Vec<ScreenEntry>,
    closed: bool,
}

impl NavigationStack {
    /// Create a stack with its root screen; the root has no parent.
    pub fn create(root: Box<dyn Screen>) -> Self {
        let entry = ScreenEntry {
            id: ScreenId::new(),
            screen: root,
            parent: None,
            status: ScreenStatus::Created,
            on_result: None,
        };
        let mut stack = Self {
            entries: vec![entry],
            closed: false,
        };
        let head = stack.entries.last_mut().expect("root just pushed");
        info!("navigation root '{}' created", head.screen.title());
        head.screen.on_create();
        stack
    }

    pub fn head(&self) -> Option<ScreenId> {
        self.entries.last().map(|entry| entry.id)
    }

    pub fn head_status(&self) -> Option<ScreenStatus> {
        self.entries.last().map(|entry| entry.status)
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Parent of a screen on the stack, if it has one.
    pub fn parent_of(&self, id: ScreenId) -> Option<ScreenId> {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .and_then(|entry| entry.parent)
    }

    /// Push a screen: the outgoing head is fully closed (no intermediate
    /// pause), then the new screen becomes head and is created. The entry is
    /// on the stack before its hook fires, so there is exactly one active
    /// head at every observation point.
    pub fn route_to(
        &mut self,
        screen: Box<dyn Screen>,
        on_result: Option<ResultCallback>,
    ) -> ScreenId {
        let parent = match self.entries.last_mut() {
            Some(head) => {
                head.status = ScreenStatus::Closed;
                head.screen.on_close();
                Some(head.id)
            }
            None => None,
        };
        let entry = ScreenEntry {
            id: ScreenId::new(),
            screen,
            parent,
            status: ScreenStatus::Created,
            on_result,
        };
        let id = entry.id;
        self.entries.push(entry);
        let depth = self.entries.len();
        let head = self.entries.last_mut().expect("entry just pushed");
        debug!("route_to '{}' (depth {})", head.screen.title(), depth);
        head.screen.on_create();
        id
    }

    /// Pop the head. With a parent: the parent is recreated, then the head
    /// closes. Without one: the session ends, which is defined behavior and
    /// not an error.
    pub fn route_back(&mut self) -> RouteBack {
        self.route_back_with(None)
    }

    /// Pop the head, delivering a result to the callback registered when it
    /// was pushed (before the parent resumes).
    pub fn route_back_with(&mut self, result: Option<ScreenResult>) -> RouteBack {
        if self.entries.len() <= 1 {
            if let Some(mut head) = self.entries.pop() {
                debug!("route_back past root '{}': session end", head.screen.title());
                head.status = ScreenStatus::Closed;
                head.screen.on_close();
            }
            self.closed = true;
            return RouteBack::SessionEnd;
        }

        let mut head = self.entries.pop().expect("checked non-empty");
        if let (Some(callback), Some(result)) = (head.on_result.take(), result) {
            callback(result);
        }
        let parent_id = {
            let parent = self.entries.last_mut().expect("checked depth > 1");
            parent.status = ScreenStatus::Created;
            parent.screen.on_create();
            parent.id
        };
        head.status = ScreenStatus::Closed;
        head.screen.on_close();
        debug!("routed back (depth {})", self.entries.len());
        RouteBack::Resumed(parent_id)
    }

    /// Pause the head without altering stack shape, for when the whole
    /// session is temporarily hidden.
    pub fn minimize(&mut self) {
        if let Some(head) = self.entries.last_mut() {
            if head.status == ScreenStatus::Created {
                head.status = ScreenStatus::Paused;
                head.screen.on_pause();
            }
        }
    }

    /// Resume a minimized head.
    pub fn maximize(&mut self) {
        if let Some(head) = self.entries.last_mut() {
            if head.status == ScreenStatus::Paused {
                head.status = ScreenStatus::Created;
                head.screen.on_resume();
            }
        }
    }

    /// Close the head and mark the stack finished. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        if let Some(head) = self.entries.last_mut() {
            head.status = ScreenStatus::Closed;
            head.screen.on_close();
        }
        self.closed = true;
    }
}

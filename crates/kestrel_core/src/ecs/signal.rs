//! # Signals
//!
//! Synchronous publish/subscribe used by component pools.
//!
//! Listeners are kept in a slot table and addressed by [`Connection`]
//! tokens (slot + generation), so disconnecting a stale token is a no-op
//! instead of removing someone else's listener.
//!
//! Publication runs over a snapshot of the listener list. A listener that
//! connects or disconnects others only affects the next publication.

use std::fmt;
use std::sync::Arc;

use super::entity::Entity;
use super::registry::Registry;

/// Callback invoked with the registry and the affected entity.
pub type Listener = Arc<dyn Fn(&mut Registry, Entity) + Send + Sync>;

/// Token identifying one connected listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Connection {
    slot: u32,
    generation: u32,
}

struct Slot {
    listener: Option<Listener>,
    generation: u32,
}

/// Ordered list of listeners for one event of one component type.
pub struct Signal {
    slots: Vec<Slot>,
    vacant: Vec<u32>,
    /// Connected listeners in call order.
    order: Vec<Connection>,
    /// Leading entries of `order` owned by group maintenance.
    internal: usize,
    snapshot: Arc<[Listener]>,
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.order.len())
            .field("internal", &self.internal)
            .finish()
    }
}

impl Signal {
    /// Creates a signal without listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            vacant: Vec::new(),
            order: Vec::new(),
            internal: 0,
            snapshot: Arc::from(Vec::new()),
        }
    }

    /// Returns the number of connected listeners.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Checks if no listener is connected.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Checks if `connection` still refers to a connected listener.
    #[must_use]
    pub fn is_connected(&self, connection: Connection) -> bool {
        self.slots
            .get(connection.slot as usize)
            .is_some_and(|slot| slot.generation == connection.generation && slot.listener.is_some())
    }

    /// Appends `listener` after every connected listener.
    pub fn connect(&mut self, listener: Listener) -> Connection {
        let connection = self.allocate(listener);
        self.order.push(connection);
        self.refresh();
        connection
    }

    /// Inserts `listener` right before `anchor`.
    ///
    /// Falls back to [`Signal::connect`] if `anchor` is not connected.
    pub fn connect_before(&mut self, anchor: Connection, listener: Listener) -> Connection {
        let at = self
            .order
            .iter()
            .position(|&c| c == anchor)
            .map(|pos| pos.max(self.internal));
        let connection = self.allocate(listener);
        match at {
            Some(pos) => self.order.insert(pos, connection),
            None => self.order.push(connection),
        }
        self.refresh();
        connection
    }

    /// Inserts a group maintenance listener ahead of all user listeners.
    pub(crate) fn connect_internal(&mut self, listener: Listener) -> Connection {
        let connection = self.allocate(listener);
        self.order.insert(self.internal, connection);
        self.internal += 1;
        self.refresh();
        connection
    }

    /// Removes the listener behind `connection`.
    ///
    /// # Returns
    ///
    /// `false` if the token was stale or already disconnected.
    pub fn disconnect(&mut self, connection: Connection) -> bool {
        if !self.is_connected(connection) {
            return false;
        }

        let slot = &mut self.slots[connection.slot as usize];
        slot.listener = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.vacant.push(connection.slot);

        if let Some(pos) = self.order.iter().position(|&c| c == connection) {
            self.order.remove(pos);
            if pos < self.internal {
                self.internal -= 1;
            }
        }
        self.refresh();
        true
    }

    /// Disconnects every user listener. Group maintenance stays connected.
    pub fn clear(&mut self) {
        let user: Vec<Connection> = self.order[self.internal..].to_vec();
        for connection in user {
            self.disconnect(connection);
        }
    }

    /// Returns the listeners in call order.
    #[inline]
    pub(crate) fn listeners(&self) -> Arc<[Listener]> {
        Arc::clone(&self.snapshot)
    }

    fn allocate(&mut self, listener: Listener) -> Connection {
        if let Some(index) = self.vacant.pop() {
            let slot = &mut self.slots[index as usize];
            slot.listener = Some(listener);
            return Connection {
                slot: index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            listener: Some(listener),
            generation: 0,
        });
        Connection {
            slot: index,
            generation: 0,
        }
    }

    fn refresh(&mut self) {
        let listeners: Vec<Listener> = self
            .order
            .iter()
            .filter_map(|c| self.slots[c.slot as usize].listener.clone())
            .collect();
        self.snapshot = Arc::from(listeners);
    }
}

/// Connection point for listeners of one event of one component type.
///
/// Obtained from [`Registry::on_construct`], [`Registry::on_update`] and
/// [`Registry::on_destroy`].
pub struct Sink<'a> {
    signal: &'a mut Signal,
}

impl<'a> Sink<'a> {
    pub(crate) fn new(signal: &'a mut Signal) -> Self {
        Self { signal }
    }

    /// Connects `listener` after all current listeners.
    pub fn connect<F>(&mut self, listener: F) -> Connection
    where
        F: Fn(&mut Registry, Entity) + Send + Sync + 'static,
    {
        self.signal.connect(Arc::new(listener))
    }

    /// Connects `listener` so that it runs right before `anchor`.
    pub fn connect_before<F>(&mut self, anchor: Connection, listener: F) -> Connection
    where
        F: Fn(&mut Registry, Entity) + Send + Sync + 'static,
    {
        self.signal.connect_before(anchor, Arc::new(listener))
    }

    /// Disconnects a listener. Returns `false` for stale tokens.
    pub fn disconnect(&mut self, connection: Connection) -> bool {
        self.signal.disconnect(connection)
    }

    /// Checks if `connection` is still connected.
    #[must_use]
    pub fn is_connected(&self, connection: Connection) -> bool {
        self.signal.is_connected(connection)
    }

    /// Disconnects every user listener.
    pub fn clear(&mut self) {
        self.signal.clear();
    }

    /// Returns the number of connected listeners, group maintenance included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.signal.len()
    }

    /// Checks if no listener is connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signal.is_empty()
    }
}

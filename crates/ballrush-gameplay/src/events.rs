//! Event bus for talking to the UI and gameplay layers.
//!
//! Outward [`GameEvent`]s are queued on a bounded channel while the core
//! runs and delivered to subscribers in one batch by [`EventBus::dispatch`],
//! once per tick. Inputs from the outside arrive as [`InputEvent`]s.
//!
//! Subscribers are removed explicitly with [`EventBus::unsubscribe`] or by
//! dropping the [`Subscription`] guard; a removed subscriber never sees
//! another event.

use std::sync::{Arc, Weak};

use ahash::{AHashMap, AHashSet};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::mode::GameMode;
use crate::session::SceneRequest;

/// Events raised toward the UI and gameplay layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    /// Lives count changed.
    LivesChanged {
        /// New count
        lives: u32,
    },
    /// A level was won.
    LevelComplete {
        /// Mode of the level
        mode: GameMode,
        /// Level number
        level: u32,
    },
    /// Pickup counter changed.
    CountChanged {
        /// Pickups collected
        current: u32,
        /// Pickups in the level
        total: u32,
    },
    /// The set of modes shown in menus changed.
    UnlocksChanged {
        /// Visible modes in unlock order
        unlocked: Vec<GameMode>,
    },
    /// The engine should change scenes.
    SceneRequested(SceneRequest),
    /// A level was refused because no lives are left.
    OutOfLives,
    /// An existing cloud record was loaded for the account.
    AccountLoaded,
    /// A new cloud record was created for the account.
    AccountCreated,
    /// Sign-in failed; the game continues local-only.
    AuthFailed {
        /// Reason reported by the platform
        reason: String,
    },
    /// The local save could not be written.
    SaveFailed {
        /// Error text
        reason: String,
    },
}

/// Events fed into the core by the UI and gameplay layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEvent {
    /// A level scene finished loading and counted its pickups.
    LevelReady {
        /// Pickups placed in the level
        pickups: u32,
    },
    /// The ball rolled over a pickup.
    PickupCollected {
        /// Pickup identifier, unique within the level
        id: u32,
    },
    /// The ball fell off, hit a hazard, or ran out of time.
    PlayerDied,
    /// The ball entered a level-start trigger on the main menu.
    LevelStartTriggerEntered {
        /// Mode of the trigger
        mode: GameMode,
    },
    /// The player confirmed the reset dialog.
    ResetConfirmed,
    /// A rewarded ad finished.
    AdRewardGranted {
        /// Lives granted
        lives: u32,
    },
    /// Pause hotkey or button.
    PauseToggled,
    /// The level's win condition was met.
    WinReached,
    /// "Next level" on the win screen.
    NextLevelChosen,
    /// "Main menu" on the win or game-over screen.
    MainMenuChosen,
    /// "Retry" on the game-over screen.
    RetryChosen,
    /// A life icon was tapped.
    LifeSlotTapped {
        /// Slot index
        slot: u32,
    },
    /// The level picker was opened from the main menu.
    LevelSelectOpened,
    /// The level picker was closed without choosing.
    LevelSelectClosed,
    /// A level was chosen in the level picker.
    LevelSelected {
        /// Mode of the level
        mode: GameMode,
        /// Level number
        level: u32,
    },
}

/// Identifies a subscriber.
pub type SubscriptionId = u64;

/// Receives dispatched events.
pub trait EventHandler: Send {
    /// Handles an event.
    fn handle(&mut self, event: &GameEvent);
}

impl<F> EventHandler for F
where
    F: FnMut(&GameEvent) + Send,
{
    fn handle(&mut self, event: &GameEvent) {
        self(event);
    }
}

/// Registered handlers.
///
/// While `dispatch` runs, the handlers are moved out of the map so the lock is
/// not held across calls into them. Removals of those handlers are recorded in
/// `removed` and applied when dispatch puts them back.
#[derive(Default)]
struct Registry {
    handlers: AHashMap<SubscriptionId, Box<dyn EventHandler>>,
    dispatching: AHashSet<SubscriptionId>,
    removed: AHashSet<SubscriptionId>,
}

impl Registry {
    fn remove(&mut self, id: SubscriptionId) -> bool {
        if self.handlers.remove(&id).is_some() {
            return true;
        }
        self.dispatching.contains(&id) && self.removed.insert(id)
    }

    fn len(&self) -> usize {
        self.handlers.len() + self.dispatching.len() - self.removed.len()
    }
}

type Subscribers = Mutex<Registry>;

/// Queue of outward events plus the subscribers they are delivered to.
pub struct EventBus {
    /// Sender for queuing events
    sender: Sender<GameEvent>,
    /// Receiver drained on dispatch
    receiver: Receiver<GameEvent>,
    /// Channel capacity
    capacity: usize,
    subscribers: Arc<Subscribers>,
    next_id: SubscriptionId,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("pending", &self.receiver.len())
            .field("capacity", &self.capacity)
            .field("subscribers", &self.subscribers.lock().len())
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
            subscribers: Arc::new(Mutex::new(Registry::default())),
            next_id: 1,
        }
    }

    /// Queues an event. Returns `false` if the queue was full and the event dropped.
    pub fn publish(&self, event: GameEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(e) => {
                warn!("Event queue full, dropping {:?}", e.into_inner());
                false
            }
        }
    }

    /// Queues several events in order.
    pub fn publish_all(&self, events: impl IntoIterator<Item = GameEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    /// Registers a handler.
    pub fn subscribe(&mut self, handler: impl EventHandler + 'static) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.lock().handlers.insert(id, Box::new(handler));
        debug!(id, "Event subscriber added");
        id
    }

    /// Registers a handler that is removed when the returned guard drops.
    #[must_use = "dropping the guard unsubscribes immediately"]
    pub fn subscribe_scoped(&mut self, handler: impl EventHandler + 'static) -> Subscription {
        let id = self.subscribe(handler);
        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    /// Removes a handler. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.subscribers.lock().remove(id);
        if removed {
            debug!(id, "Event subscriber removed");
        }
        removed
    }

    /// Delivers every queued event to every subscriber. Returns events delivered.
    ///
    /// A handler may drop a [`Subscription`] or call [`unsubscribe`](Self::unsubscribe)
    /// while handling; the removed handler sees no further events.
    pub fn dispatch(&self) -> usize {
        let events: Vec<GameEvent> = self.receiver.try_iter().collect();
        if events.is_empty() {
            return 0;
        }

        let mut active = {
            let mut registry = self.subscribers.lock();
            let active = std::mem::take(&mut registry.handlers);
            registry.dispatching = active.keys().copied().collect();
            active
        };

        for event in &events {
            for (id, handler) in &mut active {
                if self.subscribers.lock().removed.contains(id) {
                    continue;
                }
                handler.handle(event);
            }
        }

        // Dropped outside the lock: a removed handler may own a Subscription
        let removed: Vec<Box<dyn EventHandler>> = {
            let mut registry = self.subscribers.lock();
            let removed = std::mem::take(&mut registry.removed)
                .into_iter()
                .filter_map(|id| active.remove(&id))
                .collect();
            registry.dispatching.clear();
            registry.handlers.extend(active);
            removed
        };
        drop(removed);
        events.len()
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

/// Unsubscribes its handler when dropped.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    subscribers: Weak<Subscribers>,
}

impl Subscription {
    /// Subscriber id.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Bus already gone: nothing to remove from.
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.lock().remove(self.id);
        }
    }
}

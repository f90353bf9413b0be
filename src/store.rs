//! In-process key-value + pub/sub store behind a cloneable handle.
//!
//! The store keeps four kinds of data: user profiles (hash-like records keyed
//! by username), the weather table, the fun-fact set, and per-channel message
//! sequences. On top of that it provides pub/sub: [`Store::publish`] fans a
//! message out to every live [`Subscription`] on the channel via a Tokio
//! `broadcast` channel.
//!
//! All plain-state operations are synchronous and guarded by a single `Mutex`
//! that is never held across an `.await`. Receiving is the only async
//! operation and lives on [`Subscription`], so listener tasks and the command
//! loop can share one `Store` handle freely.
//!
//! Every operation fails with [`StoreError::Unavailable`] once the store has
//! been closed (or its lock poisoned); there is no reconnect.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rand::seq::SliceRandom;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Messages buffered per channel before slow subscribers start lagging.
const CHANNEL_BUFFER: usize = 128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The backend is gone: the store was closed or its state poisoned.
    #[error("store backend is unavailable")]
    Unavailable,
}

/// Persisted user identity record. Every field is kept exactly as entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub username: String,
    pub age: String,
    pub gender: String,
    pub location: String,
}

/// A message delivered through a channel subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub channel: String,
    pub text: String,
}

/// Cloneable handle to the in-process store.
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<Mutex<StoreState>>,
}

#[derive(Default)]
struct StoreState {
    closed: bool,
    profiles: HashMap<String, UserProfile>,
    // BTreeMap keeps the known-city list in a stable order for display.
    weather: BTreeMap<String, String>,
    facts: Vec<String>,
    messages: HashMap<String, Vec<String>>,
    channels: HashMap<String, broadcast::Sender<Published>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        let guard = self.inner.lock().map_err(|_| StoreError::Unavailable)?;
        if guard.closed {
            return Err(StoreError::Unavailable);
        }
        Ok(guard)
    }

    /// Stores a profile under its username, overwriting any existing record.
    pub fn set_profile(&self, profile: UserProfile) -> Result<(), StoreError> {
        let mut state = self.state()?;
        state.profiles.insert(profile.username.clone(), profile);
        Ok(())
    }

    pub fn get_profile(&self, username: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.state()?.profiles.get(username).cloned())
    }

    /// Seeds one weather entry. City keys are stored lowercased.
    pub fn put_weather(&self, city: &str, description: &str) -> Result<(), StoreError> {
        let mut state = self.state()?;
        state
            .weather
            .insert(city.to_lowercase(), description.to_string());
        Ok(())
    }

    /// Case-insensitive weather lookup.
    pub fn lookup_weather(&self, city: &str) -> Result<Option<String>, StoreError> {
        Ok(self.state()?.weather.get(&city.to_lowercase()).cloned())
    }

    /// Cities with seeded weather data, in alphabetical order.
    pub fn known_cities(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.state()?.weather.keys().cloned().collect())
    }

    /// Adds a fact to the set; duplicates are ignored.
    pub fn add_fact(&self, fact: &str) -> Result<(), StoreError> {
        let mut state = self.state()?;
        if !state.facts.iter().any(|existing| existing == fact) {
            state.facts.push(fact.to_string());
        }
        Ok(())
    }

    /// Uniform random pick among the seeded facts; `None` until seeded.
    pub fn random_fact(&self) -> Result<Option<String>, StoreError> {
        let state = self.state()?;
        Ok(state.facts.choose(&mut rand::thread_rng()).cloned())
    }

    /// Records `[author]: text` at the head of the channel's history.
    pub fn append_message(&self, channel: &str, author: &str, text: &str) -> Result<(), StoreError> {
        let entry = format!("[{author}]: {text}");
        let mut state = self.state()?;
        state
            .messages
            .entry(channel.to_string())
            .or_default()
            .push(entry);
        Ok(())
    }

    /// All persisted messages for a channel, most recent first.
    pub fn list_messages(&self, channel: &str) -> Result<Vec<String>, StoreError> {
        let state = self.state()?;
        Ok(state
            .messages
            .get(channel)
            .map(|entries| entries.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    /// Publishes to a channel, returning how many subscribers received it.
    /// Publishing to a channel nobody listens to succeeds and delivers to
    /// no one.
    pub fn publish(&self, channel: &str, text: &str) -> Result<usize, StoreError> {
        let state = self.state()?;
        let Some(sender) = state.channels.get(channel) else {
            return Ok(0);
        };
        let published = Published {
            channel: channel.to_string(),
            text: text.to_string(),
        };
        match sender.send(published) {
            Ok(receivers) => Ok(receivers),
            Err(_) => {
                debug!(channel, "published with no live subscribers");
                Ok(0)
            }
        }
    }

    /// Opens a subscription on a channel. Dropping the handle unsubscribes.
    pub fn subscribe(&self, channel: &str) -> Result<Subscription, StoreError> {
        let mut state = self.state()?;
        let sender = state
            .channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_BUFFER).0);
        Ok(Subscription {
            channel: channel.to_string(),
            receiver: sender.subscribe(),
        })
    }

    /// Marks the store unavailable and disconnects every live subscription.
    pub fn close(&self) {
        if let Ok(mut state) = self.inner.lock() {
            state.closed = true;
            state.channels.clear();
        }
    }
}

/// Receiving end of one channel subscription.
pub struct Subscription {
    channel: String,
    receiver: broadcast::Receiver<Published>,
}

impl Subscription {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Waits for the next message on the channel.
    ///
    /// Returns `Ok(None)` when `wait` elapses first, so callers can re-check
    /// their own stop conditions, and `Err(Unavailable)` once the store has
    /// torn the channel down. A lagged receiver skips the missed messages
    /// rather than failing.
    pub async fn next(&mut self, wait: Duration) -> Result<Option<Published>, StoreError> {
        loop {
            match timeout(wait, self.receiver.recv()).await {
                Err(_) => return Ok(None),
                Ok(Ok(published)) => return Ok(Some(published)),
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    warn!(channel = %self.channel, skipped, "subscription lagging; dropping missed messages");
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => return Err(StoreError::Unavailable),
            }
        }
    }
}

//! Transient per-run session state.
//!
//! Tracks who the user is and which channels currently have live listeners.
//! A single interactive user drives the loop, so plain fields with accessors
//! are enough; persistence stays in [`crate::store`].

use std::collections::HashMap;

use thiserror::Error;

use crate::listener::ChannelListener;
use crate::store::{Store, StoreError, UserProfile};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("you have not identified yourself yet")]
    NotIdentified,
    /// The session knows a username but the store has no record for it.
    /// Nothing deletes profiles, so this should never be seen in practice.
    #[error("no profile stored for '{0}'")]
    ProfileNotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Default)]
pub struct Session {
    current_username: Option<String>,
    listeners: HashMap<String, ChannelListener>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persists the profile and makes it the session identity. Any existing
    /// record under the same username is overwritten (last writer wins).
    pub fn identify(&mut self, store: &Store, profile: UserProfile) -> Result<(), StoreError> {
        let username = profile.username.clone();
        store.set_profile(profile)?;
        self.current_username = Some(username);
        Ok(())
    }

    pub fn username(&self) -> Result<&str, SessionError> {
        self.current_username
            .as_deref()
            .ok_or(SessionError::NotIdentified)
    }

    /// Fetches the identified user's profile from the store.
    pub fn who_am_i(&self, store: &Store) -> Result<UserProfile, SessionError> {
        let username = self.username()?;
        store
            .get_profile(username)?
            .ok_or_else(|| SessionError::ProfileNotFound(username.to_string()))
    }

    pub fn is_listening(&self, channel: &str) -> bool {
        self.listeners.contains_key(channel)
    }

    pub fn add_listener(&mut self, listener: ChannelListener) {
        self.listeners
            .insert(listener.channel().to_string(), listener);
    }

    /// Detaches the channel's listener; `None` when it was never joined.
    pub fn remove_listener(&mut self, channel: &str) -> Option<ChannelListener> {
        self.listeners.remove(channel)
    }

    pub fn subscribed_channels(&self) -> Vec<&str> {
        self.listeners.keys().map(String::as_str).collect()
    }

    /// Stops every live listener; used on the way out.
    pub async fn stop_all(&mut self) {
        for (_, listener) in self.listeners.drain() {
            listener.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> UserProfile {
        UserProfile {
            username: "alice".to_string(),
            age: "30".to_string(),
            gender: "f".to_string(),
            location: "NYC".to_string(),
        }
    }

    #[test]
    fn who_am_i_requires_identification() {
        let store = Store::new();
        let session = Session::new();

        assert!(matches!(
            session.who_am_i(&store),
            Err(SessionError::NotIdentified)
        ));
    }

    #[test]
    fn identify_then_who_am_i_round_trips_all_fields() {
        let store = Store::new();
        let mut session = Session::new();

        session.identify(&store, alice()).expect("identify");
        let profile = session.who_am_i(&store).expect("who am i");

        assert_eq!(profile, alice());
    }

    #[test]
    fn vanished_profile_is_reported_not_fatal() {
        let populated = Store::new();
        let empty = Store::new();
        let mut session = Session::new();
        session.identify(&populated, alice()).expect("identify");

        assert!(matches!(
            session.who_am_i(&empty),
            Err(SessionError::ProfileNotFound(username)) if username == "alice"
        ));
    }

    #[test]
    fn leaving_an_unjoined_channel_is_a_no_op() {
        let mut session = Session::new();

        assert!(session.remove_listener("general").is_none());
        assert!(session.subscribed_channels().is_empty());
    }
}

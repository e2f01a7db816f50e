use tokio::sync::watch;

/// Holder of the current access token.
///
/// Reads are synchronous. Changes are published on a watch channel so the
/// push channel can re-authenticate after a refresh.
pub trait TokenStore: Send + Sync + 'static {
    fn access_token(&self) -> Option<String>;
    fn set_access_token(&self, token: String);
    fn clear(&self);
    fn subscribe(&self) -> watch::Receiver<Option<String>>;
}

pub struct MemoryTokenStore {
    current: watch::Sender<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new(initial: Option<String>) -> Self {
        let (current, _) = watch::channel(initial);
        Self { current }
    }
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl TokenStore for MemoryTokenStore {
    fn access_token(&self) -> Option<String> {
        self.current.borrow().clone()
    }

    fn set_access_token(&self, token: String) {
        self.current.send_replace(Some(token));
    }

    fn clear(&self) {
        self.current.send_if_modified(|current| current.take().is_some());
    }

    fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.current.subscribe()
    }
}

/// Source of the caller's current location, carried by redirect errors.
pub trait Navigator: Send + Sync + 'static {
    fn current_location(&self) -> String;
}

pub struct StaticNavigator(String);

impl StaticNavigator {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }
}

impl Navigator for StaticNavigator {
    fn current_location(&self) -> String {
        self.0.clone()
    }
}

/// Login route carrying `redirectTo`.
pub fn login_path(redirect_to: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(redirect_to.as_bytes()).collect();
    format!("/login?redirectTo={encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_only_notifies_when_a_token_was_held() {
        let store = MemoryTokenStore::default();
        let mut rx = store.subscribe();
        store.clear();
        assert!(!rx.has_changed().unwrap());
        store.set_access_token("abc".into());
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_deref(), Some("abc"));
        store.clear();
        assert!(rx.has_changed().unwrap());
        assert_eq!(store.access_token(), None);
    }

    #[test]
    fn login_path_encodes_location() {
        assert_eq!(login_path("/tweets/1?tab=likes"), "/login?redirectTo=%2Ftweets%2F1%3Ftab%3Dlikes");
    }
}

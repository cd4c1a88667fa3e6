use crate::application::ports::AuthProvider;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// プロセス内で保持するログイン状態。
#[derive(Debug, Default)]
pub struct SessionAuth {
    authenticated: AtomicBool,
}

impl SessionAuth {
    pub fn new(authenticated: bool) -> Self {
        Self {
            authenticated: AtomicBool::new(authenticated),
        }
    }

    pub fn sign_in(&self) {
        if !self.authenticated.swap(true, Ordering::SeqCst) {
            info!(target: "sync::service", "Session authenticated");
        }
    }

    pub fn sign_out(&self) {
        if self.authenticated.swap(false, Ordering::SeqCst) {
            info!(target: "sync::service", "Session signed out");
        }
    }
}

impl AuthProvider for SessionAuth {
    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggles_authentication() {
        let auth = SessionAuth::default();
        assert!(!auth.is_authenticated());
        auth.sign_in();
        assert!(auth.is_authenticated());
        auth.sign_out();
        assert!(!auth.is_authenticated());
    }
}

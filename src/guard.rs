use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Liveness of a consumer (a view, a CLI session) that issues requests.
///
/// Each request captures a [`LiveToken`] before awaiting; the result is
/// applied only if the token is still live once the call resolves.
#[derive(Debug)]
pub struct LiveFlag {
    live: Arc<AtomicBool>,
}

#[derive(Debug, Clone)]
pub struct LiveToken {
    live: Arc<AtomicBool>,
}

impl LiveFlag {
    pub fn new() -> Self {
        Self {
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn token(&self) -> LiveToken {
        LiveToken {
            live: Arc::clone(&self.live),
        }
    }

    pub fn revoke(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

impl Default for LiveFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LiveFlag {
    fn drop(&mut self) {
        self.revoke();
    }
}

impl LiveToken {
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Run `apply` with `value` only while the owner is still live.
    /// Returns whether it ran.
    pub fn commit_if_live<V>(&self, value: V, apply: impl FnOnce(V)) -> bool {
        if self.is_live() {
            apply(value);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_while_live() {
        let flag = LiveFlag::new();
        let token = flag.token();
        let mut slot = None;
        assert!(token.commit_if_live(7, |v| slot = Some(v)));
        assert_eq!(slot, Some(7));
    }

    #[test]
    fn test_revoked_token_never_commits() {
        let flag = LiveFlag::new();
        let token = flag.token();
        flag.revoke();
        let mut slot = None;
        assert!(!token.commit_if_live(7, |v| slot = Some(v)));
        assert_eq!(slot, None);
    }

    #[test]
    fn test_drop_revokes() {
        let token = {
            let flag = LiveFlag::new();
            flag.token()
        };
        assert!(!token.is_live());
    }

    #[tokio::test]
    async fn test_stale_response_after_unmount() {
        let flag = LiveFlag::new();
        let token = flag.token();
        let pending = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            let mut applied = false;
            token.commit_if_live((), |_| applied = true);
            applied
        });
        drop(flag);
        assert!(!pending.await.unwrap());
    }
}

use std::sync::Arc;
use tokio::sync::watch;

/// Cooperative shutdown flag shared between the signal handler, the API
/// and the supervisor loop.
#[derive(Clone)]
pub struct CancellationToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            sender: Arc::new(tx),
            receiver: rx,
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    pub async fn cancelled(&mut self) {
        while !*self.receiver.borrow() {
            if self.receiver.changed().await.is_err() {
                break;
            }
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_wakes_all_clones() {
        let token = CancellationToken::new();
        let mut waiter = token.clone();
        assert!(!waiter.is_cancelled());

        let task = tokio::spawn(async move {
            waiter.cancelled().await;
            waiter.is_cancelled()
        });

        token.cancel();
        let woke = tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
        assert!(woke);
    }

    #[tokio::test]
    async fn test_cancelled_returns_immediately_once_set() {
        let mut token = CancellationToken::new();
        token.cancel();
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .unwrap();
    }
}

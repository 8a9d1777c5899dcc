//! Hierarchical cancellation tokens.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::watch;

#[derive(Debug)]
struct Node {
    flag: watch::Sender<bool>,
    children: Mutex<Vec<Weak<Node>>>,
}

impl Node {
    fn new(cancelled: bool) -> Self {
        let (flag, _) = watch::channel(cancelled);
        Self {
            flag,
            children: Mutex::new(Vec::new()),
        }
    }

    fn cancel(&self) {
        if self.flag.send_replace(true) {
            return;
        }
        let children = std::mem::take(
            &mut *self.children.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }
}

/// A cancellation flag. Cancelling a token cancels every token derived
/// from it with [`CancelToken::child`], but not its parent.
#[derive(Debug, Clone)]
pub struct CancelToken {
    node: Arc<Node>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            node: Arc::new(Node::new(false)),
        }
    }

    /// A token cancelled whenever this one is.
    pub fn child(&self) -> Self {
        let child = Arc::new(Node::new(self.is_cancelled()));
        let mut children = self
            .node
            .children
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        children.retain(|weak| weak.strong_count() > 0);
        children.push(Arc::downgrade(&child));
        drop(children);
        // The parent may have been cancelled while the child registered.
        if self.is_cancelled() {
            child.cancel();
        }
        Self { node: child }
    }

    pub fn cancel(&self) {
        self.node.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.node.flag.borrow()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.node.flag.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

//! Session bootstrap: connect to the actor runtime with bounded retries.
//!
//! A caller outside the actor system (the gateway, the demo binary) opens a
//! [`ClientSession`] before issuing any actor call. The runtime may still be
//! starting when the caller comes up, so [`connect_with_retries`] retries the
//! transient [`ConnectError::Unavailable`] failure at a fixed interval up to
//! an attempt ceiling. Any other failure aborts at once.
//!
//! Sessions are released explicitly with [`ClientSession::close`];
//! [`with_session`] closes on every exit path of the wrapped work.

use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use crate::actors::{ActorNode, ActorRef, ActorRouter, JsonCodec, MessageCodec, NodeLifecycle};

/// Failure of a single connection attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    /// The runtime is not serving yet; worth retrying.
    #[error("runtime unavailable: {0}")]
    Unavailable(String),

    /// Anything else; never retried.
    #[error("unexpected runtime error: {0}")]
    Unexpected(String),
}

/// Failure to establish a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Every allowed attempt found the runtime unavailable.
    #[error("runtime still unavailable after {attempts} attempts")]
    RetryExhausted {
        /// Attempts made.
        attempts: u32,
    },

    /// A non-transient connection failure.
    #[error("unexpected runtime error: {0}")]
    Unexpected(String),
}

/// Connection retry policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total connection attempts before giving up (at least one is made).
    pub max_attempts: u32,

    /// Fixed wait between attempts.
    pub retry_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay: Duration::from_secs(4),
        }
    }
}

impl RetryConfig {
    /// Create a retry policy.
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            max_attempts,
            retry_delay,
        }
    }

}

/// Something that can open a session against the actor runtime.
#[async_trait::async_trait(?Send)]
pub trait RuntimeConnector<C: MessageCodec = JsonCodec> {
    /// Make one connection attempt.
    async fn connect(&self) -> Result<ClientSession<C>, ConnectError>;
}

/// Connects to an [`ActorNode`] in the same process.
///
/// A node that has not started yet is [`ConnectError::Unavailable`]; one
/// that is stopping or stopped will not come back, so it is
/// [`ConnectError::Unexpected`].
#[derive(Debug, Clone)]
pub struct LocalConnector<C: MessageCodec = JsonCodec> {
    node: Rc<ActorNode<C>>,
}

impl<C: MessageCodec> LocalConnector<C> {
    /// Connector for `node`.
    pub fn new(node: Rc<ActorNode<C>>) -> Self {
        Self { node }
    }
}

#[async_trait::async_trait(?Send)]
impl<C: MessageCodec> RuntimeConnector<C> for LocalConnector<C> {
    async fn connect(&self) -> Result<ClientSession<C>, ConnectError> {
        match self.node.status() {
            NodeLifecycle::Active => Ok(ClientSession::open(self.node.clone())),
            status @ NodeLifecycle::Initializing => Err(ConnectError::Unavailable(format!(
                "node {} is {status}",
                self.node.name()
            ))),
            status @ (NodeLifecycle::Stopping | NodeLifecycle::Stopped) => {
                Err(ConnectError::Unexpected(format!(
                    "node {} is {status}",
                    self.node.name()
                )))
            }
        }
    }
}

/// Cheap handle for building actor references within a session.
#[derive(Debug, Clone)]
pub struct ActorClient<C: MessageCodec = JsonCodec> {
    router: Rc<ActorRouter<C>>,
}

impl<C: MessageCodec> ActorClient<C> {
    /// Typed reference to the actor with `identity`.
    pub fn actor_ref<R: ActorRef<C>>(&self, identity: impl Into<String>) -> R {
        R::from_router(identity, &self.router, None)
    }
}

/// An open connection to the actor runtime.
///
/// Counts as a connected client on the node until closed.
#[derive(Debug)]
pub struct ClientSession<C: MessageCodec = JsonCodec> {
    node: Rc<ActorNode<C>>,
    open: bool,
}

impl<C: MessageCodec> ClientSession<C> {
    fn open(node: Rc<ActorNode<C>>) -> Self {
        node.client_connected();
        tracing::info!(node = %node.name(), clients = node.connected_clients(), "client session opened");
        Self { node, open: true }
    }

    /// Typed reference to the actor with `identity`.
    pub fn actor_ref<R: ActorRef<C>>(&self, identity: impl Into<String>) -> R {
        R::from_router(identity, self.node.router(), None)
    }

    /// A handle that can outlive borrows of the session.
    pub fn client(&self) -> ActorClient<C> {
        ActorClient {
            router: self.node.router().clone(),
        }
    }

    /// Name of the node this session talks to.
    pub fn node_name(&self) -> &str {
        self.node.name()
    }

    /// Release the session.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.open {
            self.open = false;
            self.node.client_disconnected();
            tracing::info!(node = %self.node.name(), clients = self.node.connected_clients(), "client session closed");
        }
    }
}

impl<C: MessageCodec> Drop for ClientSession<C> {
    fn drop(&mut self) {
        if self.open {
            tracing::debug!(node = %self.node.name(), "client session dropped without close");
            self.release();
        }
    }
}

/// Connect, retrying only while the runtime reports itself unavailable.
pub async fn connect_with_retries<C, K>(
    connector: &K,
    retry: &RetryConfig,
) -> Result<ClientSession<C>, SessionError>
where
    C: MessageCodec,
    K: RuntimeConnector<C> + ?Sized,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match connector.connect().await {
            Ok(session) => {
                tracing::info!(attempt, node = %session.node_name(), "connected to actor runtime");
                return Ok(session);
            }
            Err(ConnectError::Unavailable(reason)) => {
                tracing::warn!(
                    attempt,
                    max_attempts = retry.max_attempts,
                    %reason,
                    "actor runtime unavailable"
                );
                if attempt >= retry.max_attempts {
                    tracing::error!(attempts = attempt, "giving up on actor runtime");
                    return Err(SessionError::RetryExhausted { attempts: attempt });
                }
                tokio::time::sleep(retry.retry_delay).await;
            }
            Err(ConnectError::Unexpected(reason)) => {
                tracing::error!(attempt, %reason, "unexpected error connecting to actor runtime");
                return Err(SessionError::Unexpected(reason));
            }
        }
    }
}

/// Run `work` inside a session that is closed whatever `work` returns.
pub async fn with_session<C, K, F, Fut, T, E>(
    connector: &K,
    retry: &RetryConfig,
    work: F,
) -> Result<T, E>
where
    C: MessageCodec,
    K: RuntimeConnector<C> + ?Sized,
    F: FnOnce(ActorClient<C>) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<SessionError>,
{
    let session = connect_with_retries(connector, retry).await?;
    let result = work(session.client()).await;
    session.close();
    result
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::actors::NodeConfig;
    use crate::testing::run_local_test;

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig::new(max_attempts, Duration::from_millis(5))
    }

    fn idle_node() -> Rc<ActorNode> {
        Rc::new(
            ActorNode::builder(NodeConfig::default())
                .build()
                .expect("build node"),
        )
    }

    /// Fails with a scripted error a number of times, then delegates.
    struct ScriptedConnector {
        inner: LocalConnector,
        failures: Cell<u32>,
        error: ConnectError,
        attempts: Cell<u32>,
    }

    impl ScriptedConnector {
        fn new(node: &Rc<ActorNode>, failures: u32, error: ConnectError) -> Self {
            Self {
                inner: LocalConnector::new(node.clone()),
                failures: Cell::new(failures),
                error,
                attempts: Cell::new(0),
            }
        }
    }

    #[async_trait::async_trait(?Send)]
    impl RuntimeConnector for ScriptedConnector {
        async fn connect(&self) -> Result<ClientSession, ConnectError> {
            self.attempts.set(self.attempts.get() + 1);
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                return Err(self.error.clone());
            }
            self.inner.connect().await
        }
    }

    #[test]
    fn test_default_retry_policy() {
        let retry = RetryConfig::default();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.retry_delay, Duration::from_secs(4));
    }

    #[test]
    fn test_connects_once_node_is_active() {
        run_local_test(async {
            let node = idle_node();
            node.start().expect("start");
            let connector = ScriptedConnector::new(
                &node,
                2,
                ConnectError::Unavailable("warming up".to_string()),
            );

            let session = connect_with_retries(&connector, &fast_retry(5))
                .await
                .expect("connect");
            assert_eq!(connector.attempts.get(), 3);
            assert_eq!(node.connected_clients(), 1);

            session.close();
            assert_eq!(node.connected_clients(), 0);
            node.shutdown().await.expect("shutdown");
        });
    }

    #[test]
    fn test_retry_ceiling() {
        run_local_test(async {
            let node = idle_node();
            let connector = LocalConnector::new(node.clone());

            let result = connect_with_retries(&connector, &fast_retry(3)).await;
            assert_eq!(result.err(), Some(SessionError::RetryExhausted { attempts: 3 }));
            assert_eq!(node.connected_clients(), 0);
        });
    }

    #[test]
    fn test_unexpected_error_is_not_retried() {
        run_local_test(async {
            let node = idle_node();
            node.start().expect("start");
            let connector =
                ScriptedConnector::new(&node, 1, ConnectError::Unexpected("bad auth".to_string()));

            let result = connect_with_retries(&connector, &fast_retry(5)).await;
            assert_eq!(
                result.err(),
                Some(SessionError::Unexpected("bad auth".to_string()))
            );
            assert_eq!(connector.attempts.get(), 1);
            node.shutdown().await.expect("shutdown");
        });
    }

    #[test]
    fn test_stopped_node_fails_without_retrying() {
        run_local_test(async {
            let node = idle_node();
            node.start().expect("start");
            node.shutdown().await.expect("shutdown");

            let connector = ScriptedConnector::new(&node, 0, ConnectError::Unavailable(String::new()));
            let result = connect_with_retries(&connector, &fast_retry(5)).await;
            assert!(matches!(result, Err(SessionError::Unexpected(_))));
            assert_eq!(connector.attempts.get(), 1);
        });
    }

    #[test]
    fn test_node_started_later_is_reached() {
        run_local_test(async {
            let node = idle_node();
            let starter = node.clone();
            tokio::task::spawn_local(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                starter.start().expect("start");
            });

            let session = connect_with_retries(&LocalConnector::new(node.clone()), &fast_retry(50))
                .await
                .expect("connect");
            session.close();
            node.shutdown().await.expect("shutdown");
        });
    }

    #[test]
    fn test_with_session_closes_on_error() {
        run_local_test(async {
            let node = idle_node();
            node.start().expect("start");
            let connector = LocalConnector::new(node.clone());

            #[derive(Debug, PartialEq)]
            enum WorkError {
                Session(SessionError),
                Failed,
            }
            impl From<SessionError> for WorkError {
                fn from(err: SessionError) -> Self {
                    WorkError::Session(err)
                }
            }

            let seen = Rc::new(Cell::new(0));
            let seen_in_work = seen.clone();
            let node_in_work = node.clone();
            let result: Result<(), WorkError> =
                with_session(&connector, &fast_retry(1), |_client| async move {
                    seen_in_work.set(node_in_work.connected_clients());
                    Err(WorkError::Failed)
                })
                .await;

            assert_eq!(result, Err(WorkError::Failed));
            assert_eq!(seen.get(), 1);
            assert_eq!(node.connected_clients(), 0);
            node.shutdown().await.expect("shutdown");
        });
    }

    #[test]
    fn test_dropped_session_is_released() {
        run_local_test(async {
            let node = idle_node();
            node.start().expect("start");
            let session = LocalConnector::new(node.clone())
                .connect()
                .await
                .expect("connect");
            assert_eq!(node.connected_clients(), 1);
            drop(session);
            assert_eq!(node.connected_clients(), 0);
            node.shutdown().await.expect("shutdown");
        });
    }
}

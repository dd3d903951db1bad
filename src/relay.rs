//! Message relay between the control panel and the page.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

use crate::agent::AgentHandle;
use crate::messages::{Command, RecorderEvent, Response};
use crate::recorder::types::Step;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// Nothing is listening in the page, e.g. the agent was never injected.
    #[error("no receiver in the page")]
    NoReceiver,
    #[error("the page did not answer")]
    NoResponse,
    #[error("injection failed: {0}")]
    Injection(String),
}

/// The control panel's view of one tab.
#[async_trait]
pub trait TabConnector: Send + Sync {
    async fn send(&self, command: Command) -> Result<Response, RelayError>;
    /// Installs the capture agent into the tab.
    async fn inject(&self) -> Result<(), RelayError>;
}

/// Best-effort delivery of recorder events to other tabs.
pub trait TabNotifier: Send + Sync {
    fn notify(&self, event: &RecorderEvent) -> Result<(), RelayError>;
}

impl TabNotifier for broadcast::Sender<RecorderEvent> {
    fn notify(&self, event: &RecorderEvent) -> Result<(), RelayError> {
        self.send(event.clone())
            .map(|_| ())
            .map_err(|_| RelayError::NoReceiver)
    }
}

impl TabNotifier for AgentHandle {
    fn notify(&self, event: &RecorderEvent) -> Result<(), RelayError> {
        self.publish(event.clone())
    }
}

/// Sends `stepsUpdated` to every tab. Tabs without a listener are skipped.
/// Returns how many tabs received it.
pub fn broadcast_steps(tabs: &[Arc<dyn TabNotifier>], steps: &[Step]) -> usize {
    let event = RecorderEvent::StepsUpdated {
        steps: steps.to_vec(),
    };
    tabs.iter()
        .filter(|tab| match tab.notify(&event) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "tab has no listener, skipping");
                false
            }
        })
        .count()
}

/// Forwards every persisted step-list change to all tabs until the store
/// goes away.
pub async fn relay_store_changes(
    mut changes: broadcast::Receiver<Vec<Step>>,
    tabs: Vec<Arc<dyn TabNotifier>>,
) {
    loop {
        match changes.recv().await {
            Ok(steps) => {
                broadcast_steps(&tabs, &steps);
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "store change relay lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

type Injector = Box<dyn Fn() -> Result<AgentHandle, RelayError> + Send + Sync>;

/// A tab whose capture agent is only present after injection.
pub struct InjectableTab {
    agent: Mutex<Option<AgentHandle>>,
    injector: Injector,
}

impl InjectableTab {
    pub fn new(injector: impl Fn() -> Result<AgentHandle, RelayError> + Send + Sync + 'static) -> Self {
        Self {
            agent: Mutex::new(None),
            injector: Box::new(injector),
        }
    }

    /// A tab where the agent is already running.
    pub fn injected(
        agent: AgentHandle,
        injector: impl Fn() -> Result<AgentHandle, RelayError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            agent: Mutex::new(Some(agent)),
            injector: Box::new(injector),
        }
    }

    pub async fn agent(&self) -> Option<AgentHandle> {
        self.agent.lock().await.clone()
    }
}

#[async_trait]
impl TabConnector for InjectableTab {
    async fn send(&self, command: Command) -> Result<Response, RelayError> {
        let agent = self.agent.lock().await.clone();
        match agent {
            Some(agent) => agent.request(command).await,
            None => Err(RelayError::NoReceiver),
        }
    }

    async fn inject(&self) -> Result<(), RelayError> {
        let agent = (self.injector)()?;
        tracing::info!("capture agent injected");
        *self.agent.lock().await = Some(agent);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_skips_tabs_without_listener() {
        let (listening, mut rx) = broadcast::channel::<RecorderEvent>(4);
        let (silent, _) = broadcast::channel::<RecorderEvent>(4);
        let tabs: Vec<Arc<dyn TabNotifier>> = vec![Arc::new(listening), Arc::new(silent)];

        assert_eq!(broadcast_steps(&tabs, &[Step::sample()]), 1);
        match rx.try_recv().unwrap() {
            RecorderEvent::StepsUpdated { steps } => assert_eq!(steps.len(), 1),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn relay_forwards_until_closed() {
        let (changes, changes_rx) = broadcast::channel::<Vec<Step>>(4);
        let (tab, mut tab_rx) = broadcast::channel::<RecorderEvent>(4);
        let relay = tokio::spawn(relay_store_changes(changes_rx, vec![Arc::new(tab)]));

        changes.send(vec![Step::sample(), Step::sample()]).unwrap();
        match tab_rx.recv().await.unwrap() {
            RecorderEvent::StepsUpdated { steps } => assert_eq!(steps.len(), 2),
            other => panic!("unexpected event {other:?}"),
        }
        drop(changes);
        relay.await.unwrap();
    }

    #[tokio::test]
    async fn uninjected_tab_has_no_receiver() {
        let tab = InjectableTab::new(|| Err(RelayError::Injection("blocked page".into())));
        assert_eq!(tab.send(Command::GetSteps).await, Err(RelayError::NoReceiver));
        assert_eq!(
            tab.inject().await,
            Err(RelayError::Injection("blocked page".into()))
        );
        assert!(tab.agent().await.is_none());
    }
}

//! Bridge to an embedded player running in a client page
//!
//! Commands are broadcast to the connected embed page (streamed over SSE by
//! the API layer). The page reports state changes and its position back
//! through `POST /embed/report`, which lands in [`BridgeEngine::report`].

use super::{EngineCommand, EngineEvent, EngineEventSender, PlaybackEngine, PositionAnchor};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// State change carried by a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportedEvent {
    Playing,
    Paused,
    Ended,
    Error,
    /// Position-only report
    Position,
}

/// Report posted by the embed page
#[derive(Debug, Clone, Deserialize)]
pub struct EngineReport {
    pub event: ReportedEvent,
    #[serde(default)]
    pub position: Option<f64>,
    #[serde(default)]
    pub code: Option<i64>,
}

#[derive(Debug, Default)]
struct BridgeState {
    anchor: Option<PositionAnchor>,
}

/// Engine whose real player lives in a client page
pub struct BridgeEngine {
    commands: broadcast::Sender<EngineCommand>,
    events: EngineEventSender,
    state: Mutex<BridgeState>,
}

impl BridgeEngine {
    pub fn new(events: EngineEventSender, capacity: usize) -> Self {
        let (commands, _) = broadcast::channel(capacity);
        Self {
            commands,
            events,
            state: Mutex::new(BridgeState::default()),
        }
    }

    /// Command stream for an embed page
    pub fn subscribe_commands(&self) -> broadcast::Receiver<EngineCommand> {
        self.commands.subscribe()
    }

    pub fn connected_clients(&self) -> usize {
        self.commands.receiver_count()
    }

    /// Apply a report from the embed page
    pub fn report(&self, report: EngineReport) {
        {
            let mut st = self.lock();
            let mut anchor = st.anchor.unwrap_or_default();
            if let Some(position) = report.position {
                anchor.rebase(position);
            }
            match report.event {
                ReportedEvent::Playing => anchor.resume(),
                ReportedEvent::Paused | ReportedEvent::Ended => anchor.freeze(),
                ReportedEvent::Error | ReportedEvent::Position => {}
            }
            st.anchor = Some(anchor);
        }

        let event = match report.event {
            ReportedEvent::Playing => Some(EngineEvent::Playing),
            ReportedEvent::Paused => Some(EngineEvent::Paused),
            ReportedEvent::Ended => Some(EngineEvent::Ended),
            ReportedEvent::Error => Some(EngineEvent::Error {
                code: report.code.unwrap_or(-1),
            }),
            ReportedEvent::Position => None,
        };

        if let Some(event) = event {
            debug!("Embed reported {:?}", event);
            if self.events.send(event).is_err() {
                warn!("Embed report dropped: scheduler is not listening");
            }
        }
    }

    fn send(&self, command: EngineCommand) -> Result<()> {
        self.commands
            .send(command)
            .map(|_| ())
            .map_err(|_| Error::Engine("no embed client connected".to_string()))
    }

    fn lock(&self) -> MutexGuard<'_, BridgeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PlaybackEngine for BridgeEngine {
    fn load(&self, source_id: &str, start_seconds: f64) -> Result<()> {
        self.lock().anchor = Some(PositionAnchor::paused_at(start_seconds));
        self.send(EngineCommand::Load {
            source_id: source_id.to_string(),
            start_seconds,
        })
    }

    fn play(&self) -> Result<()> {
        self.send(EngineCommand::Play)
    }

    fn pause(&self) -> Result<()> {
        self.send(EngineCommand::Pause)
    }

    fn seek(&self, seconds: f64, exact: bool) -> Result<()> {
        if let Some(anchor) = self.lock().anchor.as_mut() {
            anchor.rebase(seconds);
        }
        self.send(EngineCommand::Seek { seconds, exact })
    }

    fn current_position(&self) -> Result<f64> {
        self.lock()
            .anchor
            .map(|a| a.estimate())
            .ok_or_else(|| Error::Engine("no position reported yet".to_string()))
    }

    fn name(&self) -> &'static str {
        "bridge"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_commands_fail_without_client() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let engine = BridgeEngine::new(tx, 16);
        assert!(engine.play().is_err());
        assert!(engine.current_position().is_err());
    }

    #[tokio::test]
    async fn test_commands_reach_subscriber() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let engine = BridgeEngine::new(tx, 16);
        let mut commands = engine.subscribe_commands();
        assert_eq!(engine.connected_clients(), 1);

        engine.load("vid", 12.0).unwrap();
        engine.seek(15.0, true).unwrap();

        assert_eq!(
            commands.recv().await.unwrap(),
            EngineCommand::Load {
                source_id: "vid".to_string(),
                start_seconds: 12.0
            }
        );
        assert_eq!(
            commands.recv().await.unwrap(),
            EngineCommand::Seek {
                seconds: 15.0,
                exact: true
            }
        );
        assert_eq!(engine.current_position().unwrap(), 15.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_forward_events_and_extrapolate() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let engine = BridgeEngine::new(tx, 16);

        engine.report(EngineReport {
            event: ReportedEvent::Playing,
            position: Some(5.0),
            code: None,
        });
        assert_eq!(rx.recv().await, Some(EngineEvent::Playing));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!((engine.current_position().unwrap() - 7.0).abs() < 1e-6);

        engine.report(EngineReport {
            event: ReportedEvent::Position,
            position: Some(9.5),
            code: None,
        });
        assert!(rx.try_recv().is_err());
        assert!((engine.current_position().unwrap() - 9.5).abs() < 1e-6);

        engine.report(EngineReport {
            event: ReportedEvent::Error,
            position: None,
            code: Some(101),
        });
        assert_eq!(rx.recv().await, Some(EngineEvent::Error { code: 101 }));
    }
}

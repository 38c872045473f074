//! Broadcasting preview views to connected browsers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

use crate::error::ErrorKind;
use crate::host::{PreviewView, Ticket};
use crate::panel::Templates;

/// Coarse state of the preview, mirrored in the page status badge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewStatus {
    #[default]
    Empty,
    Loading,
    Ready,
    PreviewError,
    RuntimeError,
}

/// A displayed error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

/// Everything a browser needs to draw the current preview.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewSnapshot {
    /// Generation this snapshot belongs to
    pub ticket: Ticket,
    pub status: PreviewStatus,
    /// Rendered display region
    pub html: String,
    pub error: Option<ErrorInfo>,
    /// Source text shown in the code view
    pub source: String,
}

impl PreviewSnapshot {
    /// Build a snapshot by rendering `view` into its panel.
    pub fn from_view(
        templates: &Templates,
        ticket: Ticket,
        view: &PreviewView,
        source: impl Into<String>,
    ) -> Result<Self, minijinja::Error> {
        let html = templates.render_panel(view)?;

        let (status, error) = match view {
            PreviewView::Empty => (PreviewStatus::Empty, None),
            PreviewView::Loading => (PreviewStatus::Loading, None),
            PreviewView::Mounted(_) => (PreviewStatus::Ready, None),
            PreviewView::PreviewError(err) => (
                PreviewStatus::PreviewError,
                Some(ErrorInfo {
                    kind: err.kind(),
                    message: err.message().to_string(),
                }),
            ),
            PreviewView::RuntimeError(message) => (
                PreviewStatus::RuntimeError,
                Some(ErrorInfo {
                    kind: ErrorKind::RuntimeRender,
                    message: message.clone(),
                }),
            ),
        };

        Ok(Self {
            ticket,
            status,
            html,
            error,
            source: source.into(),
        })
    }
}

/// Messages sent to preview clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PreviewMessage {
    /// Connection established
    Connected,

    /// New view for the display region
    UpdatePreview {
        snapshot: PreviewSnapshot,
    },

    /// Full page reload
    Reload,
}

/// Hub for broadcasting preview updates to all connected clients.
///
/// The newest snapshot is also kept so late joiners can catch up.
#[derive(Debug, Clone)]
pub struct PreviewHub {
    sender: broadcast::Sender<PreviewMessage>,
    latest: Arc<watch::Sender<PreviewSnapshot>>,
}

impl PreviewHub {
    /// Create a new preview hub.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        let (latest, _) = watch::channel(PreviewSnapshot::default());
        Self {
            sender,
            latest: Arc::new(latest),
        }
    }

    /// Record `snapshot` as current and push it to every client.
    ///
    /// Snapshots of a generation older than the current one are dropped.
    pub fn publish(&self, snapshot: PreviewSnapshot) -> bool {
        let accepted = self.latest.send_if_modified(|current| {
            if snapshot.ticket < current.ticket {
                return false;
            }
            *current = snapshot.clone();
            true
        });

        if accepted {
            self.send(PreviewMessage::UpdatePreview { snapshot });
        } else {
            tracing::debug!("Dropping snapshot for stale generation {}", snapshot.ticket);
        }
        accepted
    }

    /// Send a message to all connected clients.
    pub fn send(&self, msg: PreviewMessage) {
        // No receivers is fine
        let _ = self.sender.send(msg);
    }

    /// Subscribe to preview messages.
    pub fn subscribe(&self) -> broadcast::Receiver<PreviewMessage> {
        self.sender.subscribe()
    }

    /// Watch the current snapshot.
    pub fn watch(&self) -> watch::Receiver<PreviewSnapshot> {
        self.latest.subscribe()
    }

    /// The current snapshot.
    pub fn latest(&self) -> PreviewSnapshot {
        self.latest.borrow().clone()
    }
}

impl Default for PreviewHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate the browser script that keeps the shell page in sync.
///
/// The preview frame is sandboxed without same-origin access, so each update
/// replaces its whole `srcdoc`.
pub fn preview_client_script(ws_path: &str) -> String {
    format!(
        r#"
(function() {{
  'use strict';

  const frame = document.getElementById('capsule-frame');
  const code = document.getElementById('capsule-code');
  const status = document.getElementById('capsule-status');
  const frameHead = document.getElementById('capsule-frame-head');
  let ticket = 0;
  let reconnectAttempts = 0;
  const maxReconnectAttempts = 10;

  document.querySelectorAll('[data-capsule-tab]').forEach(function(tab) {{
    tab.addEventListener('click', function() {{
      const target = tab.getAttribute('data-capsule-tab');
      document.querySelectorAll('[data-capsule-tab]').forEach(function(other) {{
        other.classList.toggle('active', other === tab);
      }});
      document.querySelectorAll('[data-capsule-view]').forEach(function(view) {{
        view.hidden = view.getAttribute('data-capsule-view') !== target;
      }});
    }});
  }});

  function apply(snapshot) {{
    if (snapshot.ticket < ticket || snapshot.status === 'empty') {{
      return;
    }}
    ticket = snapshot.ticket;

    const head = frameHead ? frameHead.innerHTML : '';
    frame.srcdoc = '<!DOCTYPE html><html lang="en"><head>' + head + '</head><body>' + snapshot.html + '</body></html>';
    code.firstElementChild.textContent = snapshot.source;
    status.setAttribute('data-status', snapshot.status);
    status.textContent = snapshot.status.replace('_', ' ');
    if (snapshot.error) {{
      console.warn('[capsule]', snapshot.error.kind, snapshot.error.message);
    }}
  }}

  function connect() {{
    const scheme = location.protocol === 'https:' ? 'wss://' : 'ws://';
    const ws = new WebSocket(scheme + location.host + '{}');

    ws.onopen = function() {{
      reconnectAttempts = 0;
    }};

    ws.onmessage = function(event) {{
      const msg = JSON.parse(event.data);

      switch (msg.type) {{
        case 'update_preview':
          apply(msg.snapshot);
          break;

        case 'reload':
          location.reload();
          break;

        case 'connected':
          console.log('[capsule] Connected');
          break;
      }}
    }};

    ws.onclose = function() {{
      if (reconnectAttempts < maxReconnectAttempts) {{
        reconnectAttempts++;
        setTimeout(connect, 1000 * reconnectAttempts);
      }}
    }};

    ws.onerror = function(e) {{
      console.error('[capsule] WebSocket error:', e);
    }};
  }}

  connect();
}})();
"#,
        ws_path
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use pretty_assertions::assert_eq;

    fn snapshot(ticket: u64) -> PreviewSnapshot {
        PreviewSnapshot {
            ticket: Ticket(ticket),
            status: PreviewStatus::Ready,
            html: format!("<p>{ticket}</p>"),
            ..PreviewSnapshot::default()
        }
    }

    #[test]
    fn hub_broadcasts_updates() {
        let hub = PreviewHub::new();
        let mut rx = hub.subscribe();

        assert!(hub.publish(snapshot(1)));

        match rx.try_recv() {
            Ok(PreviewMessage::UpdatePreview { snapshot }) => assert_eq!(snapshot.ticket, Ticket(1)),
            other => panic!("Expected UpdatePreview, got {other:?}"),
        }
        assert_eq!(hub.latest().html, "<p>1</p>");
    }

    #[test]
    fn stale_snapshots_are_dropped() {
        let hub = PreviewHub::new();
        hub.publish(snapshot(3));
        let mut rx = hub.subscribe();

        assert!(!hub.publish(snapshot(2)));

        assert!(rx.try_recv().is_err());
        assert_eq!(hub.latest().ticket, Ticket(3));
    }

    #[test]
    fn watchers_see_latest_snapshot() {
        let hub = PreviewHub::new();
        let mut watch = hub.watch();

        hub.publish(snapshot(1));
        hub.publish(snapshot(2));

        tokio_test::block_on(watch.changed()).unwrap();
        assert_eq!(watch.borrow_and_update().ticket, Ticket(2));
    }

    #[test]
    fn snapshot_from_error_view() {
        let templates = Templates::new();
        let view = PreviewView::PreviewError(PipelineError::Load("boom".into()));

        let snap = PreviewSnapshot::from_view(&templates, Ticket(4), &view, "src").unwrap();

        assert_eq!(snap.status, PreviewStatus::PreviewError);
        assert_eq!(
            snap.error,
            Some(ErrorInfo {
                kind: ErrorKind::Load,
                message: "boom".into()
            })
        );
        assert!(snap.html.contains("Preview Error"));
        assert_eq!(snap.source, "src");
    }

    #[test]
    fn serializes_messages() {
        let msg = PreviewMessage::UpdatePreview {
            snapshot: snapshot(7),
        };

        let json = serde_json::to_string(&msg).unwrap();

        assert!(json.contains(r#""type":"update_preview""#));
        assert!(json.contains(r#""ticket":7"#));
        assert!(json.contains(r#""status":"ready""#));
    }

    #[test]
    fn client_script_targets_ws_path() {
        let script = preview_client_script("/__ws");

        assert!(script.contains("location.host + '/__ws'"));
        assert!(script.contains("case 'update_preview'"));
    }
}

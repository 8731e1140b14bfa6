//! Connectivity probe and online/offline event watcher.

use color_eyre::{eyre::eyre, Result};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

/// Connectivity as observed by one probe attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
  Online,
  Offline,
}

impl Connectivity {
  pub fn is_online(self) -> bool {
    matches!(self, Connectivity::Online)
  }
}

/// Watcher events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
  /// Connectivity restored: an offline to online transition.
  Online,
  /// Connectivity lost: an online to offline transition.
  Offline,
  /// Probe completed without a transition.
  Tick,
}

/// Probe that asks the exam server whether the network is reachable.
///
/// Stands in for the browser's connectivity flag: a HEAD request to the
/// server root that answers at all means online, any transport failure
/// means offline.
#[derive(Clone)]
pub struct ConnectivityProbe {
  http: reqwest::Client,
  root: Url,
}

/// Bound on a single probe attempt. Applies to the probe only; upload
/// requests carry no timeout.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

impl ConnectivityProbe {
  pub fn new(base_url: &str) -> Result<Self> {
    let root: Url = base_url
      .parse()
      .map_err(|e| eyre!("Invalid server URL {}: {}", base_url, e))?;

    Ok(Self {
      http: reqwest::Client::new(),
      root,
    })
  }

  pub async fn check(&self) -> Connectivity {
    let result = self
      .http
      .head(self.root.clone())
      .timeout(PROBE_TIMEOUT)
      .send()
      .await;

    match result {
      Ok(_) => Connectivity::Online,
      Err(_) => Connectivity::Offline,
    }
  }
}

/// Event handler that turns periodic probes into edge-triggered events.
///
/// `Online` fires exactly once per offline to online transition.
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler polling the given probe at a fixed interval.
  pub fn new<P, Fut>(interval: Duration, probe: P) -> Self
  where
    P: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Connectivity> + Send + 'static,
  {
    let (tx, rx) = mpsc::unbounded_channel();

    // Spawn the probe loop
    tokio::spawn(async move {
      let mut last: Option<Connectivity> = None;

      loop {
        let now = probe().await;

        let event = match (last, now) {
          (Some(Connectivity::Offline), Connectivity::Online) => Event::Online,
          (Some(Connectivity::Online), Connectivity::Offline) => Event::Offline,
          _ => Event::Tick,
        };
        last = Some(now);

        if tx.send(event).is_err() {
          break;
        }

        tokio::time::sleep(interval).await;
      }
    });

    Self { rx }
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}

//! The watch loop: react to connectivity transitions with sync cycles.

use color_eyre::Result;
use std::time::Duration;
use tracing::info;

use crate::client::ExamClient;
use crate::config::Config;
use crate::net::{ConnectivityProbe, Event, EventHandler};

/// Long-running agent mode.
///
/// Probes the server on an interval and runs one sync cycle on each
/// offline to online transition.
pub struct App {
  client: ExamClient,
  events: EventHandler,
}

impl App {
  pub fn new(config: &Config) -> Result<Self> {
    let client = ExamClient::new(config)?;

    let probe = ConnectivityProbe::new(&config.server.url)?;
    let interval = Duration::from_secs(config.watch.probe_interval_secs);
    let events = EventHandler::new(interval, move || {
      let probe = probe.clone();
      async move { probe.check().await }
    });

    Ok(Self { client, events })
  }

  pub async fn run(&mut self) -> Result<()> {
    info!("watching connectivity");

    while let Some(event) = self.events.next().await {
      match event {
        Event::Online => {
          info!("connectivity restored, starting sync cycle");
          let report = self.client.sync_pending().await?;
          info!(
            attempted = report.attempted,
            delivered = report.delivered,
            retained = report.retained,
            "sync cycle finished"
          );
        }
        Event::Offline => {
          info!("connectivity lost, submissions will buffer locally");
        }
        Event::Tick => {}
      }
    }

    Ok(())
  }
}

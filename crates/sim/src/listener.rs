//! Command listener: the server-pushed instruction stream.
//!
//! One listener serves either a single bike (identifying itself with a
//! `bike_id` header) or the whole fleet over a shared stream. Connection
//! failures back off and reconnect forever; only the shutdown signal ends
//! the loop. A bad event is logged and dropped, never fatal.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::command::{Command, InstructionEvent};
use crate::runner::SimBike;
use crate::simulator;
use crate::sse::{FrameOverflow, FrameParser};

#[derive(Debug, thiserror::Error)]
enum StreamError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Framing(#[from] FrameOverflow),
}

/// Which bikes a listener speaks for.
#[derive(Debug, Clone, Copy)]
pub enum ListenerScope {
    /// One bike; the stream is scoped server-side via the `bike_id` header.
    Bike(i64),
    /// The whole fleet on one shared stream, routing by embedded bike id.
    Fleet,
}

pub struct CommandListener {
    client: ApiClient,
    scope: ListenerScope,
    bikes: Arc<HashMap<i64, Arc<SimBike>>>,
    backoff: Duration,
}

impl CommandListener {
    /// Listener wrapping a single bike.
    pub fn for_bike(bike: Arc<SimBike>) -> Self {
        let client = bike.client.clone();
        let backoff = bike.config.listener_backoff;
        let scope = ListenerScope::Bike(bike.id());

        let mut bikes = HashMap::new();
        bikes.insert(bike.id(), bike);

        Self {
            client,
            scope,
            bikes: Arc::new(bikes),
            backoff,
        }
    }

    /// Shared listener dispatching to the whole fleet. The map is
    /// read-only after assembly.
    pub fn for_fleet(
        client: ApiClient,
        bikes: Arc<HashMap<i64, Arc<SimBike>>>,
        backoff: Duration,
    ) -> Self {
        Self {
            client,
            scope: ListenerScope::Fleet,
            bikes,
            backoff,
        }
    }

    /// Consume the stream until told to stop. Transient failures are
    /// logged and retried after the backoff delay; the shutdown signal
    /// ends the loop cleanly, also mid-backoff, with no reconnect.
    pub async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(scope = ?self.scope, "command listener stopped");
                    return;
                }
                result = self.consume_stream() => match result {
                    Ok(()) => debug!(scope = ?self.scope, "instruction stream closed, reconnecting"),
                    Err(e) => warn!(scope = ?self.scope, error = %e, "instruction stream failed, reconnecting"),
                }
            }

            tokio::select! {
                _ = &mut shutdown => {
                    info!(scope = ?self.scope, "command listener stopped");
                    return;
                }
                _ = tokio::time::sleep(self.backoff) => {}
            }
        }
    }

    async fn consume_stream(&self) -> Result<(), StreamError> {
        let bike_id = match self.scope {
            ListenerScope::Bike(id) => Some(id),
            ListenerScope::Fleet => None,
        };

        let response = self.client.open_instruction_stream(bike_id).await?;
        let mut stream = response.bytes_stream();
        let mut parser = FrameParser::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(ApiError::from)?;
            for event in parser.feed(&chunk)? {
                self.handle_event(&event.data);
            }
        }
        Ok(())
    }

    fn handle_event(&self, data: &str) {
        let event: InstructionEvent = match serde_json::from_str(data) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "dropping malformed instruction event");
                return;
            }
        };

        if let Some(name) = &event.instruction_all {
            match Command::parse(name, &event.args) {
                Ok(command) => {
                    for bike in self.bikes.values() {
                        self.apply(bike.clone(), command);
                    }
                }
                Err(e) => warn!(error = %e, "dropping broadcast instruction"),
            }
        } else if let (Some(id), Some(name)) = (event.target_bike_id(), &event.instruction) {
            let Some(bike) = self.bikes.get(&id) else {
                debug!(bike_id = id, "instruction for a bike this listener does not own");
                return;
            };
            match Command::parse(name, &event.args) {
                Ok(command) => self.apply(bike.clone(), command),
                Err(e) => warn!(bike_id = id, error = %e, "dropping instruction"),
            }
        } else {
            warn!("dropping unroutable instruction event");
        }
    }

    /// Long-running commands get their own task so the listener keeps
    /// reading; the rest run inline.
    fn apply(&self, bike: Arc<SimBike>, command: Command) {
        debug!(bike_id = bike.id(), ?command, "applying command");
        match command {
            Command::RunSimulation => {
                tokio::spawn(simulator::run(bike));
            }
            Command::RecacheZones => {
                tokio::spawn(async move { bike.recache_zones().await });
            }
            Command::Lock => {
                bike.lock();
            }
            Command::Unlock => {
                bike.unlock();
            }
            Command::SetStatus(status) => {
                bike.set_status(status);
            }
        }
    }
}

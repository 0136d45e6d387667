//! Channel-based data source.
//!
//! Receives metrics payloads via a tokio watch channel, for embedding the
//! dashboard in a process that already collects telemetry.

use tokio::sync::watch;

use super::{DataSource, MetricsPayload};

/// A data source that receives payloads pushed through a watch channel.
///
/// # Example
///
/// ```
/// use ledgerwatch::ChannelSource;
///
/// let (tx, source) = ChannelSource::create("collector");
/// ```
#[derive(Debug)]
pub struct ChannelSource {
    receiver: watch::Receiver<MetricsPayload>,
    description: String,
    /// Track if we've returned the initial value yet
    initial_returned: bool,
}

impl ChannelSource {
    /// Create a new channel source from the receiving end of a watch channel.
    pub fn new(receiver: watch::Receiver<MetricsPayload>, source_description: &str) -> Self {
        Self {
            receiver,
            description: format!("channel: {}", source_description),
            initial_returned: false,
        }
    }

    /// Create a channel pair; the sender pushes payloads to the returned source.
    pub fn create(source_description: &str) -> (watch::Sender<MetricsPayload>, Self) {
        let (tx, rx) = watch::channel(MetricsPayload::default());
        (tx, Self::new(rx, source_description))
    }
}

impl DataSource for ChannelSource {
    fn poll(&mut self) -> Option<MetricsPayload> {
        if !self.initial_returned {
            self.initial_returned = true;
            self.receiver.mark_changed();
        }

        if self.receiver.has_changed().unwrap_or(false) {
            Some(self.receiver.borrow_and_update().clone())
        } else {
            None
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<&str> {
        None
    }
}

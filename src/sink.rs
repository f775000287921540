//! Consumers of the computed brightness.

use std::future::Future;

use tracing::{debug, info};

use crate::Result;

/// Something that can show a brightness level.
///
/// `percent` is always within 0-100; hardware specific scaling belongs to
/// the implementation.
pub trait BrightnessSink {
    fn set(&mut self, percent: u8) -> impl Future<Output = Result<()>> + Send;
}

/// A sink without hardware that only reports brightness changes
#[derive(Debug, Default)]
pub struct LogSink {
    current: Option<u8>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last level received
    pub fn current(&self) -> Option<u8> {
        self.current
    }
}

impl BrightnessSink for LogSink {
    async fn set(&mut self, percent: u8) -> Result<()> {
        if self.current != Some(percent) {
            info!("Brightness set to {}%", percent);
            self.current = Some(percent);
        } else {
            debug!("Brightness unchanged at {}%", percent);
        }
        Ok(())
    }
}

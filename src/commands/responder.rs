//! Reply handles for invocations.
//!
//! Direct forwards replies to the transport's channel; Capturing buffers them
//! for callers that collect output (tests, the demo REPL, batching).

use crate::directory::Snowflake;
use crate::error::ReplyError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};

/// Timeout for a slow transport before a reply is given up.
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// An outbound reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub channel_id: Snowflake,
    pub content: String,
}

/// Where replies for one invocation go.
#[derive(Debug, Clone)]
pub enum Responder {
    Direct(mpsc::Sender<Reply>),
    Capturing(Arc<Mutex<Vec<Reply>>>),
    /// Replies are dropped.
    Discard,
}

impl Responder {
    /// A capturing responder and the buffer it fills.
    pub fn capturing() -> (Self, Arc<Mutex<Vec<Reply>>>) {
        let buf = Arc::new(Mutex::new(Vec::new()));
        (Self::Capturing(Arc::clone(&buf)), buf)
    }

    /// Send or buffer a reply depending on mode.
    pub async fn send(&self, reply: Reply) -> Result<(), ReplyError> {
        match self {
            Self::Direct(tx) => match tokio::time::timeout(SEND_TIMEOUT, tx.send(reply)).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(_)) => Err(ReplyError::Closed),
                Err(_timeout) => {
                    tracing::warn!("reply dropped: transport not reading (timeout after {:?})", SEND_TIMEOUT);
                    Err(ReplyError::Timeout(SEND_TIMEOUT))
                }
            },
            Self::Capturing(buf) => {
                buf.lock().await.push(reply);
                Ok(())
            }
            Self::Discard => Ok(()),
        }
    }
}

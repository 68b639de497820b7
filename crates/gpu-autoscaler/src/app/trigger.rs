use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Requests an out-of-schedule scaling cycle.
///
/// The channel holds a single pending request: requests made while one is
/// already queued are absorbed, so an event burst causes one extra cycle.
#[derive(Debug, Clone)]
pub struct CycleTrigger {
    sender: mpsc::Sender<()>,
}

impl CycleTrigger {
    pub fn channel() -> (Self, mpsc::Receiver<()>) {
        let (sender, receiver) = mpsc::channel(1);
        (Self { sender }, receiver)
    }

    /// Returns `false` once the control loop is gone.
    pub fn request(&self) -> bool {
        match self.sender.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => true,
            Err(TrySendError::Closed(())) => false,
        }
    }
}

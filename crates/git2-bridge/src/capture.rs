use git2_bridge_core::{trap, BridgeFault};

/// One callback invocation's error slot. It lives on the trampoline's stack
/// and is threaded through the dispatcher by reference.
#[derive(Debug, Default)]
pub struct ErrorCapture {
    message: Option<String>,
}

impl ErrorCapture {
    pub fn new() -> ErrorCapture {
        ErrorCapture::default()
    }

    /// Records the failure of this invocation. A second record within the
    /// same invocation is a bridge fault.
    pub fn set(&mut self, message: impl Into<String>) {
        if self.message.is_some() {
            trap(BridgeFault::DoubleCapture);
        }
        self.message = Some(message.into());
    }

    pub fn is_set(&self) -> bool {
        self.message.is_some()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn take(&mut self) -> Option<String> {
        self.message.take()
    }
}

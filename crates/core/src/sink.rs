use crate::model::RecoveryEvent;

/// Receives every per-file event of a recovery pass, in order.
///
/// The engine never renders anything itself; a console, a log file or a GUI
/// pane is just another sink.
pub trait RecoverySink {
    fn record(&mut self, event: &RecoveryEvent);
}

impl<F> RecoverySink for F
where
    F: FnMut(&RecoveryEvent),
{
    fn record(&mut self, event: &RecoveryEvent) {
        self(event)
    }
}

//! Event log port — operator-visible internal events.
//!
//! Logging an event must never fail the operation that raised it, so the
//! port is infallible; implementations swallow and trace their own errors.

use std::future::Future;

use homestead_domain::event::EventLevel;

/// Appends entries to the internal event log.
pub trait EventLog {
    fn log(
        &self,
        level: EventLevel,
        title: &str,
        body: &str,
    ) -> impl Future<Output = ()> + Send;

    fn debug(&self, title: &str, body: &str) -> impl Future<Output = ()> + Send {
        self.log(EventLevel::Debug, title, body)
    }

    fn info(&self, title: &str, body: &str) -> impl Future<Output = ()> + Send {
        self.log(EventLevel::Info, title, body)
    }

    fn warn(&self, title: &str, body: &str) -> impl Future<Output = ()> + Send {
        self.log(EventLevel::Warn, title, body)
    }

    fn error(&self, title: &str, body: &str) -> impl Future<Output = ()> + Send {
        self.log(EventLevel::Error, title, body)
    }
}

impl<T: EventLog + Send + Sync> EventLog for std::sync::Arc<T> {
    fn log(&self, level: EventLevel, title: &str, body: &str) -> impl Future<Output = ()> + Send {
        (**self).log(level, title, body)
    }
}

//! Buffering log router

use super::{LogLevel, LogRecord, LogSink};
use std::sync::{Arc, Mutex};

/// A message whose rendering is deferred until a sink consumes it
struct QueuedMessage {
    level: LogLevel,
    source: String,
    render: Box<dyn FnOnce() -> String + Send>,
}

struct Inner {
    sink: Option<Arc<dyn LogSink>>,
    queue: Vec<QueuedMessage>,
    min_level: LogLevel,
}

/// Cheaply cloneable handle to the shared log route.
///
/// Messages below `min_level` are dropped without rendering. With no sink
/// attached, surviving messages queue unrendered; `attach` and `replace_sink`
/// drain the queue into the incoming sink before accepting new traffic.
#[derive(Clone)]
pub struct HostLog {
    inner: Arc<Mutex<Inner>>,
}

impl HostLog {
    /// A detached router; messages queue until a sink attaches
    pub fn detached() -> Self {
        Self::with_min_level(LogLevel::Trace)
    }

    pub fn with_min_level(min_level: LogLevel) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                sink: None,
                queue: Vec::new(),
                min_level,
            })),
        }
    }

    /// A router already attached to the given sink
    pub fn with_sink(sink: Arc<dyn LogSink>) -> Self {
        let log = Self::detached();
        log.attach(sink);
        log
    }

    /// Emit a message; `render` runs only if the message survives filtering
    /// and a sink eventually consumes it.
    pub fn emit<F>(&self, level: LogLevel, source: &str, render: F)
    where
        F: FnOnce() -> String + Send + 'static,
    {
        let mut inner = self.inner.lock().unwrap();
        if level < inner.min_level {
            return;
        }

        match &inner.sink {
            Some(sink) => {
                let sink = sink.clone();
                drop(inner);
                // render outside the lock so a sink or closure that logs
                // again cannot deadlock the router
                let record = LogRecord {
                    level,
                    source: source.to_string(),
                    message: render(),
                };
                sink.write(&record);
            }
            None => {
                inner.queue.push(QueuedMessage {
                    level,
                    source: source.to_string(),
                    render: Box::new(render),
                });
            }
        }
    }

    /// Attach a sink, flushing any queued messages into it in emit order
    pub fn attach(&self, sink: Arc<dyn LogSink>) {
        let queued = {
            let mut inner = self.inner.lock().unwrap();
            let queued = std::mem::take(&mut inner.queue);
            inner.sink = Some(sink.clone());
            queued
        };

        for msg in queued {
            sink.write(&LogRecord {
                level: msg.level,
                source: msg.source,
                message: (msg.render)(),
            });
        }
    }

    /// Replace the current sink. Queued messages (from a detached window) go
    /// to the new sink, never lost.
    pub fn replace_sink(&self, sink: Arc<dyn LogSink>) {
        self.attach(sink);
    }

    /// Detach the sink; subsequent messages queue again
    pub fn detach(&self) {
        self.inner.lock().unwrap().sink = None;
    }

    /// Number of messages currently queued
    pub fn queued_len(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    pub fn trace(&self, source: &str, render: impl FnOnce() -> String + Send + 'static) {
        self.emit(LogLevel::Trace, source, render);
    }

    pub fn debug(&self, source: &str, render: impl FnOnce() -> String + Send + 'static) {
        self.emit(LogLevel::Debug, source, render);
    }

    pub fn info(&self, source: &str, render: impl FnOnce() -> String + Send + 'static) {
        self.emit(LogLevel::Info, source, render);
    }

    pub fn warn(&self, source: &str, render: impl FnOnce() -> String + Send + 'static) {
        self.emit(LogLevel::Warn, source, render);
    }

    pub fn error(&self, source: &str, render: impl FnOnce() -> String + Send + 'static) {
        self.emit(LogLevel::Error, source, render);
    }
}

impl Default for HostLog {
    fn default() -> Self {
        Self::detached()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    struct RecordingSink {
        records: StdMutex<Vec<LogRecord>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                records: StdMutex::new(Vec::new()),
            })
        }

        fn messages(&self) -> Vec<String> {
            self.records
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.message.clone())
                .collect()
        }
    }

    impl LogSink for RecordingSink {
        fn write(&self, record: &LogRecord) {
            self.records.lock().unwrap().push(record.clone());
        }
    }

    #[test]
    fn test_messages_queue_while_detached() {
        let log = HostLog::detached();
        log.info("base", || "first".to_string());
        log.warn("base", || "second".to_string());

        assert_eq!(log.queued_len(), 2);
    }

    #[test]
    fn test_attach_flushes_queue_in_order() {
        let log = HostLog::detached();
        log.info("base", || "first".to_string());
        log.warn("other", || "second".to_string());

        let sink = RecordingSink::new();
        log.attach(sink.clone());

        assert_eq!(sink.messages(), vec!["first", "second"]);
        assert_eq!(log.queued_len(), 0);

        log.info("base", || "third".to_string());
        assert_eq!(sink.messages(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_replace_sink_keeps_queued_messages() {
        let log = HostLog::detached();
        log.info("base", || "queued".to_string());

        let first = RecordingSink::new();
        log.attach(first.clone());
        assert_eq!(first.messages(), vec!["queued"]);

        log.detach();
        log.info("base", || "while detached".to_string());

        let second = RecordingSink::new();
        log.replace_sink(second.clone());

        assert_eq!(second.messages(), vec!["while detached"]);
        assert_eq!(first.messages(), vec!["queued"]);
    }

    #[test]
    fn test_lazy_rendering_skipped_below_min_level() {
        let rendered = Arc::new(AtomicUsize::new(0));
        let log = HostLog::with_min_level(LogLevel::Warn);

        let counter = rendered.clone();
        log.debug("base", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            "dropped".to_string()
        });

        assert_eq!(rendered.load(Ordering::SeqCst), 0);
        assert_eq!(log.queued_len(), 0);
    }

    #[test]
    fn test_queued_message_rendered_once_on_flush() {
        let rendered = Arc::new(AtomicUsize::new(0));
        let log = HostLog::detached();

        let counter = rendered.clone();
        log.info("base", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            "deferred".to_string()
        });
        assert_eq!(rendered.load(Ordering::SeqCst), 0);

        let sink = RecordingSink::new();
        log.attach(sink.clone());
        assert_eq!(rendered.load(Ordering::SeqCst), 1);
        assert_eq!(sink.messages(), vec!["deferred"]);
    }

    #[test]
    fn test_record_source() {
        let log = HostLog::detached();
        let sink = RecordingSink::new();
        log.attach(sink.clone());

        log.error("broken-mod", || "boom".to_string());

        let records = sink.records.lock().unwrap();
        assert_eq!(records[0].source, "broken-mod");
        assert_eq!(records[0].level, LogLevel::Error);
    }
}

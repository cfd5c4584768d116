use crate::thread::display_thread_name;
use chrono::Local;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use std::fmt::Arguments;
use std::io::Write;
use std::sync::{Arc, Weak};
use std::{fmt, thread};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

#[derive(Copy, Clone, Debug, Ord, PartialOrd, Eq, PartialEq)]
pub enum Severity {
    Verbose,
    Info,
    Warn,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Verbose => write!(f, "verbose"),
            Severity::Info => write!(f, "info"),
            Severity::Warn => write!(f, "warn"),
            Severity::Error => write!(f, "error"),
            Severity::Fatal => write!(f, "fatal"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Message {
    pub severity: Severity,
    pub crate_name: String,
    pub message: String,
    pub time: chrono::DateTime<Local>,
    pub thread: thread::ThreadId,
}

/// Implement a "sink". This receives log messages from the global logger and process them.
/// E.g: print to a file
pub trait Sink: Send + Sync {
    fn log(&self, message: &Message);
}

enum SinkEntry {
    Arc(Arc<dyn Sink>),
    Weak(Weak<dyn Sink>),
}

impl SinkEntry {
    fn log(&self, message: &Message) {
        match self {
            SinkEntry::Arc(arc) => arc.log(message),
            SinkEntry::Weak(weak) => {
                if let Some(arc) = weak.upgrade() {
                    arc.log(message);
                }
            }
        }
    }

    fn is_alive(&self) -> bool {
        match self {
            SinkEntry::Arc(_) => true,
            SinkEntry::Weak(weak) => weak.strong_count() > 0,
        }
    }
}

static SINKS: Lazy<RwLock<Vec<SinkEntry>>> = Lazy::new(RwLock::default);

#[doc(hidden)]
pub fn internal_log(severity: Severity, crate_name: &str, args: Arguments) {
    let message = Message {
        severity,
        crate_name: crate_name.to_string(),
        message: args.to_string(),
        time: Local::now(),
        thread: thread::current().id(),
    };

    for sink in SINKS.read().iter() {
        sink.log(&message);
    }

    if matches!(message.severity, Severity::Fatal) {
        panic!("{}", message.message);
    }
}

/** Sink API */

pub fn register_sink(sink: Arc<dyn Sink>) {
    SINKS.write().push(SinkEntry::Arc(sink));
}

pub fn register_sink_weak<T: Sink + 'static>(sink: Weak<T>) {
    let mut sinks = SINKS.write();
    sinks.retain(SinkEntry::is_alive);
    sinks.push(SinkEntry::Weak(sink));
}

/** Default logging macros */
#[macro_export]
macro_rules! ze_verbose {
    ($($arg:tt)*) => ({
        $crate::logger::internal_log($crate::logger::Severity::Verbose, env!("CARGO_PKG_NAME"), format_args!($($arg)*));
    })
}

#[macro_export]
macro_rules! ze_info {
    ($($arg:tt)*) => ({
        $crate::logger::internal_log($crate::logger::Severity::Info, env!("CARGO_PKG_NAME"), format_args!($($arg)*));
    })
}

#[macro_export]
macro_rules! ze_warn {
    ($($arg:tt)*) => ({
        $crate::logger::internal_log($crate::logger::Severity::Warn, env!("CARGO_PKG_NAME"), format_args!($($arg)*));
    })
}

#[macro_export]
macro_rules! ze_error {
    ($($arg:tt)*) => ({
        $crate::logger::internal_log($crate::logger::Severity::Error, env!("CARGO_PKG_NAME"), format_args!($($arg)*));
    })
}

#[macro_export]
macro_rules! ze_fatal {
    ($($arg:tt)*) => ({
        $crate::logger::internal_log($crate::logger::Severity::Fatal, env!("CARGO_PKG_NAME"), format_args!($($arg)*));
        unreachable!();
    })
}

/** Default sinks */
pub struct StdoutSink;

impl StdoutSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {})
    }

    fn write(message: &Message) -> std::io::Result<()> {
        let mut stdout = StandardStream::stdout(ColorChoice::Auto);
        stdout.set_color(ColorSpec::new().set_fg(Some(match message.severity {
            Severity::Verbose => Color::Cyan,
            Severity::Info => Color::White,
            Severity::Warn => Color::Yellow,
            Severity::Error => Color::Red,
            Severity::Fatal => Color::Rgb(255, 15, 15),
        })))?;

        writeln!(
            &mut stdout,
            "[{}] [{}/{}] ({}) {}",
            message.time.format("%H:%M:%S"),
            message.severity,
            display_thread_name(message.thread),
            message.crate_name,
            message.message
        )?;
        stdout.reset()?;
        stdout.flush()
    }
}

impl Sink for StdoutSink {
    fn log(&self, message: &Message) {
        // A closed stdout must not take the logger down
        let _ = Self::write(message);
    }
}

/// Keeps messages in memory, filtered by a minimum severity
pub struct MemorySink {
    minimum_severity: Severity,
    messages: Mutex<Vec<Message>>,
}

impl MemorySink {
    pub fn new(minimum_severity: Severity) -> Arc<Self> {
        Arc::new(Self {
            minimum_severity,
            messages: Mutex::default(),
        })
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    pub fn contains(&self, severity: Severity, text: &str) -> bool {
        self.messages
            .lock()
            .iter()
            .any(|message| message.severity == severity && message.message.contains(text))
    }

    pub fn clear(&self) {
        self.messages.lock().clear();
    }
}

impl Sink for MemorySink {
    fn log(&self, message: &Message) {
        if message.severity >= self.minimum_severity {
            self.messages.lock().push(message.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::logger::{register_sink_weak, MemorySink, Severity};
    use std::sync::Arc;

    #[test]
    fn memory_sink_receives_messages_above_minimum_severity() {
        let sink = MemorySink::new(Severity::Info);
        register_sink_weak(Arc::downgrade(&sink));

        ze_verbose!("memory_sink_receives verbose {}", 1);
        ze_warn!("memory_sink_receives warning {}", 2);

        assert!(!sink.contains(Severity::Verbose, "memory_sink_receives verbose 1"));
        assert!(sink.contains(Severity::Warn, "memory_sink_receives warning 2"));

        let message = sink
            .messages()
            .into_iter()
            .find(|message| message.message.contains("memory_sink_receives warning"))
            .unwrap();
        assert_eq!(message.crate_name, "ze-core");
    }

    #[test]
    fn dropped_weak_sink_is_skipped() {
        let sink = MemorySink::new(Severity::Verbose);
        register_sink_weak(Arc::downgrade(&sink));
        drop(sink);

        ze_info!("nobody listens");
    }

    #[test]
    #[should_panic(expected = "unrecoverable")]
    fn fatal_panics() {
        ze_fatal!("unrecoverable");
    }
}

use std::sync::{Arc, Mutex};

/// ConsoleUi
///
/// The presentation hooks the guard drives: error notices, the navigation
/// progress bar and the document title. Rendering itself lives elsewhere.
pub trait ConsoleUi: Send + Sync {
    fn notify_error(&self, message: &str);
    fn progress_start(&self);
    fn progress_done(&self);
    fn set_title(&self, title: &str);
}

pub type UiState = Arc<dyn ConsoleUi>;

/// TracingUi
///
/// Headless UI that reports everything through the log.
#[derive(Default, Clone)]
pub struct TracingUi;

impl ConsoleUi for TracingUi {
    fn notify_error(&self, message: &str) {
        tracing::warn!(notice = %message, "user notice");
    }

    fn progress_start(&self) {
        tracing::trace!("progress start");
    }

    fn progress_done(&self) {
        tracing::trace!("progress done");
    }

    fn set_title(&self, title: &str) {
        tracing::debug!(title = %title, "page title");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Notice(String),
    ProgressStart,
    ProgressDone,
    Title(String),
}

/// RecordingUi
///
/// Keeps every call in order so tests can assert on what the user saw.
#[derive(Default)]
pub struct RecordingUi {
    events: Mutex<Vec<UiEvent>>,
}

impl RecordingUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn notices(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::Notice(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }

    /// Count of starts minus count of dones. Zero once every navigation has
    /// completed its progress bar.
    pub fn open_progress(&self) -> isize {
        self.events().iter().fold(0, |open, e| match e {
            UiEvent::ProgressStart => open + 1,
            UiEvent::ProgressDone => open - 1,
            _ => open,
        })
    }

    pub fn last_title(&self) -> Option<String> {
        self.events().into_iter().rev().find_map(|e| match e {
            UiEvent::Title(t) => Some(t),
            _ => None,
        })
    }

    fn push(&self, event: UiEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl ConsoleUi for RecordingUi {
    fn notify_error(&self, message: &str) {
        self.push(UiEvent::Notice(message.to_string()));
    }

    fn progress_start(&self) {
        self.push(UiEvent::ProgressStart);
    }

    fn progress_done(&self) {
        self.push(UiEvent::ProgressDone);
    }

    fn set_title(&self, title: &str) {
        self.push(UiEvent::Title(title.to_string()));
    }
}

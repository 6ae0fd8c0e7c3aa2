//! ScriptedUi: a [`FormUi`] that answers from a script and records every call.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::ui::{FocusTarget, FormUi, MessageKey, Notice};

/// One recorded UI call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Confirm(MessageKey),
    ShowWait(String),
    HideWait,
    Choice { title: MessageKey, options: Vec<String> },
    Focus(FocusTarget),
    Notice(Notice),
}

#[derive(Debug, Default)]
struct Script {
    confirms: VecDeque<bool>,
    choices: VecDeque<Option<usize>>,
    events: Vec<UiEvent>,
}

/// Headless UI for tests.
///
/// Confirmations answer `true` and choices are cancelled unless answers were
/// queued with [`push_confirm`](Self::push_confirm) and
/// [`push_choice`](Self::push_choice).
#[derive(Debug, Default)]
pub struct ScriptedUi {
    script: Mutex<Script>,
}

impl ScriptedUi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the answer to the next confirmation.
    pub fn push_confirm(&self, answer: bool) {
        self.lock().confirms.push_back(answer);
    }

    /// Queue the answer to the next choice (`None` cancels).
    pub fn push_choice(&self, answer: Option<usize>) {
        self.lock().choices.push_back(answer);
    }

    /// Every call so far, in order.
    pub fn events(&self) -> Vec<UiEvent> {
        self.lock().events.clone()
    }

    /// Prompts of every confirmation asked.
    pub fn confirms(&self) -> Vec<MessageKey> {
        self.filter(|e| match e {
            UiEvent::Confirm(key) => Some(*key),
            _ => None,
        })
    }

    /// Title and options of every choice presented.
    pub fn choices(&self) -> Vec<(MessageKey, Vec<String>)> {
        self.filter(|e| match e {
            UiEvent::Choice { title, options } => Some((*title, options.clone())),
            _ => None,
        })
    }

    pub fn focus_requests(&self) -> Vec<FocusTarget> {
        self.filter(|e| match e {
            UiEvent::Focus(target) => Some(target.clone()),
            _ => None,
        })
    }

    pub fn last_focus(&self) -> Option<FocusTarget> {
        self.focus_requests().pop()
    }

    /// Messages the waiting indicator was shown with.
    pub fn shown_messages(&self) -> Vec<String> {
        self.filter(|e| match e {
            UiEvent::ShowWait(message) => Some(message.clone()),
            _ => None,
        })
    }

    pub fn show_count(&self) -> usize {
        self.shown_messages().len()
    }

    pub fn hide_count(&self) -> usize {
        self.lock()
            .events
            .iter()
            .filter(|e| matches!(e, UiEvent::HideWait))
            .count()
    }

    fn filter<T>(&self, f: impl FnMut(&UiEvent) -> Option<T>) -> Vec<T> {
        self.lock().events.iter().filter_map(f).collect()
    }

    fn record(&self, event: UiEvent) {
        self.lock().events.push(event);
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FormUi for ScriptedUi {
    fn confirm(&self, prompt: MessageKey) -> bool {
        let mut script = self.lock();
        script.events.push(UiEvent::Confirm(prompt));
        script.confirms.pop_front().unwrap_or(true)
    }

    fn show_wait_indicator(&self, message: &str) {
        self.record(UiEvent::ShowWait(message.to_owned()));
    }

    fn hide_wait_indicator(&self) {
        self.record(UiEvent::HideWait);
    }

    fn present_choice(&self, title: MessageKey, options: &[String]) -> Option<usize> {
        let mut script = self.lock();
        script.events.push(UiEvent::Choice {
            title,
            options: options.to_vec(),
        });
        script.choices.pop_front().flatten()
    }

    fn request_focus(&self, target: FocusTarget) {
        self.record(UiEvent::Focus(target));
    }

    fn notify(&self, notice: Notice) {
        self.record(UiEvent::Notice(notice));
    }
}

//! Interactive session navigation: Home, Upload and Results views

use crate::error::{RelativityError, Result};
use crate::processing::comparator::{ResultWindow, DEFAULT_TOP_K};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Home,
    Upload,
    Results,
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            View::Home => "home",
            View::Upload => "upload",
            View::Results => "results",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    OpenUpload,
    ResultsReady(ResultWindow),
    ExtractionFailed(String),
    ShowMore,
    NewSearch,
    ReturnHome,
}

impl SessionEvent {
    fn name(&self) -> &'static str {
        match self {
            SessionEvent::OpenUpload => "open upload",
            SessionEvent::ResultsReady(_) => "results ready",
            SessionEvent::ExtractionFailed(_) => "extraction failed",
            SessionEvent::ShowMore => "show more",
            SessionEvent::NewSearch => "new search",
            SessionEvent::ReturnHome => "return home",
        }
    }
}

/// Per-session state, owned by whoever drives the session
#[derive(Debug, Clone)]
pub struct SessionContext {
    view: View,
    results: Option<ResultWindow>,
    last_error: Option<String>,
    initial_display: usize,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        Self::with_initial_display(DEFAULT_TOP_K)
    }

    /// Result windows are reset to `initial_display` rows when they arrive
    pub fn with_initial_display(initial_display: usize) -> Self {
        Self {
            view: View::Home,
            results: None,
            last_error: None,
            initial_display,
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn results(&self) -> Option<&ResultWindow> {
        self.results.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Apply an event. Invalid transitions leave the context unchanged.
    pub fn handle(&mut self, event: SessionEvent) -> Result<View> {
        match (self.view, event) {
            (_, SessionEvent::ReturnHome) => {
                self.view = View::Home;
                self.results = None;
                self.last_error = None;
            }
            (View::Home, SessionEvent::OpenUpload) => {
                self.view = View::Upload;
            }
            (View::Upload, SessionEvent::ResultsReady(mut window)) => {
                window.reset_display(self.initial_display);
                self.results = Some(window);
                self.last_error = None;
                self.view = View::Results;
            }
            (View::Upload, SessionEvent::ExtractionFailed(message)) => {
                log::debug!("Extraction failed in session: {}", message);
                self.last_error = Some(message);
            }
            (View::Results, SessionEvent::ShowMore) => {
                if let Some(window) = self.results.as_mut() {
                    window.show_more();
                }
            }
            (View::Results, SessionEvent::NewSearch) => {
                self.results = None;
                self.view = View::Upload;
            }
            (view, event) => {
                return Err(RelativityError::InvalidTransition(format!(
                    "cannot {} from {}",
                    event.name(),
                    view
                )));
            }
        }
        Ok(self.view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::comparator::ComparisonResult;
    use crate::processing::element::PerElement;
    use crate::processing::match_quality::MatchQuality;

    fn window(count: usize) -> ResultWindow {
        ResultWindow::new(
            (0..count)
                .map(|i| ComparisonResult {
                    rank: i + 1,
                    job_title: format!("Job {}", i),
                    ec_level: "EC-03".to_string(),
                    department: "Health".to_string(),
                    final_score: 0.5,
                    match_quality: MatchQuality::VeryWeak,
                    explanation: String::new(),
                    element_scores: PerElement::from_fn(|_| 0.0),
                })
                .collect(),
        )
    }

    #[test]
    fn test_search_flow() {
        let mut session = SessionContext::new();
        assert_eq!(session.handle(SessionEvent::OpenUpload).unwrap(), View::Upload);

        session
            .handle(SessionEvent::ExtractionFailed("could not parse".to_string()))
            .unwrap();
        assert_eq!(session.view(), View::Upload);
        assert_eq!(session.last_error(), Some("could not parse"));

        assert_eq!(session.handle(SessionEvent::ResultsReady(window(12))).unwrap(), View::Results);
        assert_eq!(session.last_error(), None);
        assert_eq!(session.results().unwrap().visible().len(), 5);

        session.handle(SessionEvent::ShowMore).unwrap();
        session.handle(SessionEvent::ShowMore).unwrap();
        session.handle(SessionEvent::ShowMore).unwrap();
        assert_eq!(session.results().unwrap().visible().len(), 12);

        assert_eq!(session.handle(SessionEvent::NewSearch).unwrap(), View::Upload);
        assert!(session.results().is_none());
    }

    #[test]
    fn test_invalid_transition_leaves_state() {
        let mut session = SessionContext::new();
        let err = session.handle(SessionEvent::ShowMore).unwrap_err();
        assert!(matches!(err, RelativityError::InvalidTransition(_)));
        assert_eq!(session.view(), View::Home);

        session.handle(SessionEvent::OpenUpload).unwrap();
        assert!(session.handle(SessionEvent::NewSearch).is_err());
        assert_eq!(session.view(), View::Upload);
    }

    #[test]
    fn test_return_home_clears_results() {
        let mut session = SessionContext::new();
        session.handle(SessionEvent::OpenUpload).unwrap();
        session.handle(SessionEvent::ResultsReady(window(3))).unwrap();
        assert_eq!(session.handle(SessionEvent::ReturnHome).unwrap(), View::Home);
        assert!(session.results().is_none());
        assert_eq!(session.handle(SessionEvent::ReturnHome).unwrap(), View::Home);
    }
}

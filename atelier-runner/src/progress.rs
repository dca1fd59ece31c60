//! Progress reporting
//!
//! The inference executable has no structured progress protocol, so progress
//! is inferred from its output. Parsing sits behind [`ProgressParser`] so a
//! different source (e.g. a side-channel progress file) can replace the
//! keyword heuristic without touching process management.

use std::sync::Arc;

/// Progress at which the inference process phase starts
pub const RUNNER_START_PROGRESS: u8 = 30;

/// Highest progress the inference process phase may report
pub const RUNNER_PROGRESS_CEILING: u8 = 85;

/// Increment applied per progress-indicating output line
pub const RUNNER_PROGRESS_STEP: u8 = 2;

/// Receives coarse completion percentages during a job
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: u8);
}

impl<F> ProgressSink for F
where
    F: Fn(u8) + Send + Sync,
{
    fn report(&self, progress: u8) {
        self(progress)
    }
}

/// Sink that drops every report
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn report(&self, _progress: u8) {}
}

/// Turns process output lines into progress values
pub trait ProgressParser: Send {
    /// Inspects one output line; returns a new progress value if it moved
    fn observe(&mut self, line: &str) -> Option<u8>;

    /// Current progress value
    fn current(&self) -> u8;
}

/// Builds a parser for one process run, given the starting progress
pub type ParserFactory = Arc<dyn Fn(u8) -> Box<dyn ProgressParser> + Send + Sync>;

/// Keywords that mark a line as progress-bearing
pub const PROGRESS_KEYWORDS: [&str; 3] = ["step", "sampling", "inference"];

/// Keyword heuristic: each matching line advances progress by a fixed step
#[derive(Debug, Clone)]
pub struct KeywordProgressParser {
    current: u8,
    step: u8,
    ceiling: u8,
}

impl KeywordProgressParser {
    /// Creates a parser starting at `start`, stepping by 2 up to 85
    pub fn starting_at(start: u8) -> Self {
        Self {
            current: start,
            step: RUNNER_PROGRESS_STEP,
            ceiling: RUNNER_PROGRESS_CEILING.max(start),
        }
    }

    /// Factory producing keyword parsers
    pub fn factory() -> ParserFactory {
        Arc::new(|start| Box::new(KeywordProgressParser::starting_at(start)))
    }

    fn matches(line: &str) -> bool {
        let line = line.to_lowercase();
        PROGRESS_KEYWORDS.iter().any(|keyword| line.contains(keyword))
    }
}

impl ProgressParser for KeywordProgressParser {
    fn observe(&mut self, line: &str) -> Option<u8> {
        if !Self::matches(line) {
            return None;
        }

        self.current = self.current.saturating_add(self.step).min(self.ceiling);
        Some(self.current)
    }

    fn current(&self) -> u8 {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_keyword_lines_advance_progress() {
        let mut parser = KeywordProgressParser::starting_at(RUNNER_START_PROGRESS);

        assert_eq!(parser.observe("Loading weights"), None);
        assert_eq!(parser.observe("step 1/30"), Some(32));
        assert_eq!(parser.observe("SAMPLING timestep 999"), Some(34));
        assert_eq!(parser.observe("Inference done"), Some(36));
        assert_eq!(parser.current(), 36);
    }

    #[test]
    fn test_progress_is_clamped() {
        let mut parser = KeywordProgressParser::starting_at(RUNNER_START_PROGRESS);

        let mut last = RUNNER_START_PROGRESS;
        for _ in 0..100 {
            let value = parser.observe("step").unwrap();
            assert!(value >= last);
            assert!(value <= RUNNER_PROGRESS_CEILING);
            last = value;
        }
        assert_eq!(parser.current(), RUNNER_PROGRESS_CEILING);
    }

    #[test]
    fn test_factory_uses_start_value() {
        let factory = KeywordProgressParser::factory();
        let mut parser = factory(50);
        assert_eq!(parser.current(), 50);
        assert_eq!(parser.observe("step"), Some(52));
    }

    #[test]
    fn test_closure_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let sink: Arc<dyn ProgressSink> = Arc::new(move |p: u8| recorder.lock().unwrap().push(p));

        sink.report(40);
        sink.report(42);
        assert_eq!(*seen.lock().unwrap(), vec![40, 42]);
    }
}

//! Multi-namespace result aggregation.
//!
//! A `ResultsHandler` drives one operation across an ordered list of
//! namespaces and decides, once every namespace has an outcome, whether the
//! command partially succeeded (render successes, report failures as
//! warnings) or failed as a whole.
//!
//! ```text
//! Idle --begin--> Iterating --finish--> Closed
//!                    |  \
//!                    |   `--every ns recoverable failure--> AllFailed (report, raise)
//!                    `--non-recoverable failure-----------> Aborted (raise)
//! ```
//!
//! Recoverable failures are the CIM status codes NotFound, InvalidClass,
//! InvalidNamespace and InvalidParameter. Anything else aborts the remaining
//! namespaces immediately. Successes recorded before such an abort are not
//! rendered.

use std::io;
use thiserror::Error;

use super::filters::FilterError;
use crate::cim::WbemError;

/// Failure of the per-namespace operation run inside a session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OpError {
    #[error(transparent)]
    Wbem(#[from] WbemError),

    /// Invalid filter options; always fatal.
    #[error(transparent)]
    Filter(#[from] FilterError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome<T> {
    Success(T),
    Recoverable(WbemError),
    Fatal(OpError),
}

impl<T> OperationOutcome<T> {
    pub fn classify(result: Result<T, OpError>) -> Self {
        match result {
            Ok(payload) => OperationOutcome::Success(payload),
            Err(OpError::Wbem(e)) if e.is_recoverable() => OperationOutcome::Recoverable(e),
            Err(e) => OperationOutcome::Fatal(e),
        }
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            OperationOutcome::Success(payload) => Some(payload),
            _ => None,
        }
    }
}

/// Errors raised by a session. The source error is kept in the chain and is
/// not repeated in the message.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("{object_type} operation aborted in namespace '{namespace}'")]
    Escalated {
        object_type: String,
        namespace: String,
        #[source]
        source: OpError,
    },

    #[error(
        "{object_type} operation for '{target}' failed in all namespaces; last failure in '{namespace}'"
    )]
    AllFailed {
        object_type: String,
        target: String,
        namespace: String,
        #[source]
        source: WbemError,
    },

    #[error("failed to write output")]
    Render(#[from] io::Error),

    #[error("result session misuse: {0}")]
    Misuse(String),
}

/// Presentation of aggregated results.
pub trait ResultRenderer<T> {
    /// Render the outcome of every namespace in session order. `None` marks a
    /// namespace whose operation failed.
    fn render_results(&mut self, object_type: &str, results: &[(&str, Option<&T>)])
    -> io::Result<()>;

    /// Report recoverable failures, in the order they were recorded.
    fn report_errors(
        &mut self,
        object_type: &str,
        target: &str,
        failures: &[(&str, &WbemError)],
    ) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Iterating,
    AllFailed,
    Aborted,
    Closed,
}

fn recoverable_failures<'a, T>(
    namespaces: &'a [String],
    outcomes: &'a [Option<OperationOutcome<T>>],
) -> Vec<(&'a str, &'a WbemError)> {
    namespaces
        .iter()
        .zip(outcomes)
        .filter_map(|(ns, outcome)| match outcome {
            Some(OperationOutcome::Recoverable(e)) => Some((ns.as_str(), e)),
            _ => None,
        })
        .collect()
}

pub struct ResultsHandler<'r, T> {
    namespaces: Vec<String>,
    object_type: String,
    target: String,
    outcomes: Vec<Option<OperationOutcome<T>>>,
    completed: usize,
    state: SessionState,
    renderer: &'r mut dyn ResultRenderer<T>,
}

impl<'r, T> ResultsHandler<'r, T> {
    pub fn new(
        namespaces: Vec<String>,
        object_type: impl Into<String>,
        target: impl Into<String>,
        renderer: &'r mut dyn ResultRenderer<T>,
    ) -> Self {
        let outcomes = namespaces.iter().map(|_| None).collect();
        ResultsHandler {
            namespaces,
            object_type: object_type.into(),
            target: target.into(),
            outcomes,
            completed: 0,
            state: SessionState::Idle,
            renderer,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Namespaces to process, in order. Only available once per session.
    pub fn begin(&mut self) -> Result<std::vec::IntoIter<String>, AggregateError> {
        if self.state != SessionState::Idle {
            return Err(AggregateError::Misuse("begin() called twice".into()));
        }
        self.state = SessionState::Iterating;
        Ok(self.namespaces.clone().into_iter())
    }

    /// Index of the first namespace entry named `namespace` without an outcome.
    fn slot(&self, namespace: &str) -> Result<usize, AggregateError> {
        if self.state != SessionState::Iterating {
            return Err(AggregateError::Misuse(format!(
                "outcome for '{namespace}' recorded in state {:?}",
                self.state
            )));
        }
        self.namespaces
            .iter()
            .zip(&self.outcomes)
            .position(|(ns, outcome)| outcome.is_none() && ns.eq_ignore_ascii_case(namespace))
            .ok_or_else(|| {
                AggregateError::Misuse(format!("no pending namespace '{namespace}' in session"))
            })
    }

    fn has_success(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(o, Some(OperationOutcome::Success(_))))
    }

    pub fn record(&mut self, namespace: &str, payload: T) -> Result<(), AggregateError> {
        let idx = self.slot(namespace)?;
        self.outcomes[idx] = Some(OperationOutcome::Success(payload));
        self.completed += 1;
        Ok(())
    }

    /// Record a failed namespace.
    ///
    /// Non-recoverable errors abort the session and are returned as
    /// `Escalated`. When the last namespace fails and nothing succeeded, the
    /// collected failures are reported and `AllFailed` is returned.
    pub fn record_failure(&mut self, namespace: &str, error: OpError) -> Result<(), AggregateError> {
        let idx = self.slot(namespace)?;
        let error = match error {
            OpError::Wbem(e) if e.is_recoverable() => e,
            fatal => {
                tracing::debug!(namespace, error = %fatal, "non-recoverable failure, aborting");
                self.outcomes[idx] = Some(OperationOutcome::Fatal(fatal.clone()));
                self.state = SessionState::Aborted;
                return Err(AggregateError::Escalated {
                    object_type: self.object_type.clone(),
                    namespace: namespace.to_string(),
                    source: fatal,
                });
            }
        };

        tracing::debug!(namespace, error = %error, "{} operation failed in namespace", self.object_type);
        self.outcomes[idx] = Some(OperationOutcome::Recoverable(error.clone()));
        self.completed += 1;

        if self.completed == self.namespaces.len() && !self.has_success() {
            self.state = SessionState::AllFailed;
            let failures = recoverable_failures(&self.namespaces, &self.outcomes);
            self.renderer
                .report_errors(&self.object_type, &self.target, &failures)?;
            return Err(AggregateError::AllFailed {
                object_type: self.object_type.clone(),
                target: self.target.clone(),
                namespace: namespace.to_string(),
                source: error,
            });
        }
        Ok(())
    }

    /// Render successes, then report recoverable failures. Does nothing after
    /// a fatal exit or when the session is already closed.
    pub fn finish(&mut self) -> Result<(), AggregateError> {
        match self.state {
            SessionState::Aborted | SessionState::AllFailed | SessionState::Closed => {
                return Ok(());
            }
            SessionState::Idle | SessionState::Iterating => {}
        }
        self.state = SessionState::Closed;

        let results: Vec<(&str, Option<&T>)> = self
            .namespaces
            .iter()
            .zip(&self.outcomes)
            .map(|(ns, outcome)| (ns.as_str(), outcome.as_ref().and_then(OperationOutcome::success)))
            .collect();
        self.renderer.render_results(&self.object_type, &results)?;

        let failures = recoverable_failures(&self.namespaces, &self.outcomes);
        if !failures.is_empty() {
            self.renderer
                .report_errors(&self.object_type, &self.target, &failures)?;
        }
        Ok(())
    }

    /// Run `op` for every namespace in order and close the session.
    pub fn run<F>(mut self, mut op: F) -> Result<(), AggregateError>
    where
        F: FnMut(&str) -> Result<T, OpError>,
    {
        for namespace in self.begin()? {
            match OperationOutcome::classify(op(&namespace)) {
                OperationOutcome::Success(payload) => self.record(&namespace, payload)?,
                OperationOutcome::Recoverable(e) => self.record_failure(&namespace, e.into())?,
                OperationOutcome::Fatal(e) => self.record_failure(&namespace, e)?,
            }
        }
        self.finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cim::StatusCode;
    use std::cell::Cell;

    /// Renderer that keeps what it was asked to show.
    #[derive(Default)]
    pub(crate) struct RecordingRenderer<T: Clone> {
        pub rendered: Vec<(String, Option<T>)>,
        pub reported: Vec<(String, WbemError)>,
        pub render_calls: usize,
        pub report_calls: usize,
    }

    impl<T: Clone> ResultRenderer<T> for RecordingRenderer<T> {
        fn render_results(
            &mut self,
            _object_type: &str,
            results: &[(&str, Option<&T>)],
        ) -> io::Result<()> {
            self.render_calls += 1;
            self.rendered = results
                .iter()
                .map(|(ns, r)| (ns.to_string(), r.cloned()))
                .collect();
            Ok(())
        }

        fn report_errors(
            &mut self,
            _object_type: &str,
            _target: &str,
            failures: &[(&str, &WbemError)],
        ) -> io::Result<()> {
            self.report_calls += 1;
            self.reported = failures
                .iter()
                .map(|(ns, e)| (ns.to_string(), (*e).clone()))
                .collect();
            Ok(())
        }
    }

    fn namespaces(k: usize) -> Vec<String> {
        (1..=k).map(|i| format!("root/ns{i}")).collect()
    }

    fn not_found(ns: &str) -> OpError {
        WbemError::cim(StatusCode::NotFound, format!("CIM_Foo not in {ns}")).into()
    }

    #[test]
    fn successes_render_in_namespace_order() {
        for k in 1..=6 {
            let mut renderer = RecordingRenderer::<String>::default();
            let handler = ResultsHandler::new(namespaces(k), "class", "CIM_Foo", &mut renderer);
            handler.run(|ns| Ok(format!("result-{ns}"))).unwrap();
            let order: Vec<&str> = renderer.rendered.iter().map(|(ns, _)| ns.as_str()).collect();
            let expected = namespaces(k);
            assert_eq!(order, expected.iter().map(String::as_str).collect::<Vec<_>>());
            assert!(
                renderer
                    .rendered
                    .iter()
                    .all(|(ns, r)| r.as_ref() == Some(&format!("result-{ns}")))
            );
            assert_eq!(renderer.report_calls, 0);
        }
    }

    #[test]
    fn all_recoverable_failures_report_then_raise_last() {
        let k = 4;
        let mut renderer = RecordingRenderer::<String>::default();
        let handler = ResultsHandler::new(namespaces(k), "instance", "CIM_Foo", &mut renderer);
        let err = handler.run(|ns| Err(not_found(ns))).unwrap_err();
        match err {
            AggregateError::AllFailed {
                namespace, source, ..
            } => {
                assert_eq!(namespace, "root/ns4");
                assert!(source.to_string().contains("root/ns4"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(renderer.reported.len(), k);
        assert_eq!(renderer.render_calls, 0);
    }

    #[test]
    fn partial_success_renders_and_reports_without_raising() {
        let mut renderer = RecordingRenderer::<u32>::default();
        let handler = ResultsHandler::new(namespaces(3), "class", "CIM_Foo", &mut renderer);
        handler
            .run(|ns| if ns == "root/ns2" { Err(not_found(ns)) } else { Ok(7) })
            .unwrap();
        let successes: Vec<&str> = renderer
            .rendered
            .iter()
            .filter(|(_, r)| r.is_some())
            .map(|(ns, _)| ns.as_str())
            .collect();
        assert_eq!(successes, vec!["root/ns1", "root/ns3"]);
        assert_eq!(renderer.reported.len(), 1);
        assert_eq!(renderer.reported[0].0, "root/ns2");
    }

    #[test]
    fn non_recoverable_failure_stops_iteration() {
        let calls = Cell::new(0);
        let mut renderer = RecordingRenderer::<u32>::default();
        let handler = ResultsHandler::new(namespaces(5), "class", "CIM_Foo", &mut renderer);
        let err = handler
            .run(|ns| {
                calls.set(calls.get() + 1);
                if ns == "root/ns2" {
                    Err(WbemError::Connection("connection reset".into()).into())
                } else {
                    Ok(1)
                }
            })
            .unwrap_err();
        assert_eq!(calls.get(), 2);
        assert!(matches!(err, AggregateError::Escalated { ref namespace, .. } if namespace == "root/ns2"));
        assert_eq!(renderer.render_calls, 0, "prior successes are not rendered");
        assert_eq!(renderer.report_calls, 0);
    }

    #[test]
    fn filter_errors_are_fatal() {
        let mut renderer = RecordingRenderer::<u32>::default();
        let handler = ResultsHandler::new(namespaces(2), "class", "CIM_Foo", &mut renderer);
        let err = handler
            .run(|_| Err(FilterError::InvalidVersion("2.x".into()).into()))
            .unwrap_err();
        assert!(matches!(
            err,
            AggregateError::Escalated { source: OpError::Filter(_), .. }
        ));
    }

    #[test]
    fn manual_protocol_and_finish_after_fatal_is_noop() {
        let mut renderer = RecordingRenderer::<u32>::default();
        let mut handler = ResultsHandler::new(namespaces(2), "qualifier", "Key", &mut renderer);
        let mut iter = handler.begin().unwrap();
        assert!(matches!(handler.begin(), Err(AggregateError::Misuse(_))));
        let first = iter.next().unwrap();
        handler.record(&first, 1).unwrap();
        let second = iter.next().unwrap();
        let err = WbemError::cim(StatusCode::AccessDenied, "denied");
        assert!(handler.record_failure(&second, err.into()).is_err());
        assert_eq!(handler.state(), SessionState::Aborted);
        handler.finish().unwrap();
        assert_eq!(renderer.render_calls, 0);
    }

    #[test]
    fn duplicate_namespaces_each_get_an_outcome() {
        let mut renderer = RecordingRenderer::<usize>::default();
        let ns = vec!["root/a".to_string(), "root/a".to_string()];
        let handler = ResultsHandler::new(ns, "class", "CIM_Foo", &mut renderer);
        let mut n = 0;
        handler
            .run(|_| {
                n += 1;
                Ok(n)
            })
            .unwrap();
        assert_eq!(
            renderer.rendered,
            vec![("root/a".to_string(), Some(1)), ("root/a".to_string(), Some(2))]
        );
    }

    #[test]
    fn classify_splits_recoverable_from_fatal() {
        let ok: OperationOutcome<u8> = OperationOutcome::classify(Ok(1));
        assert_eq!(ok.success(), Some(&1));
        let rec: OperationOutcome<u8> = OperationOutcome::classify(Err(not_found("x")));
        assert!(matches!(rec, OperationOutcome::Recoverable(_)));
        let fatal: OperationOutcome<u8> = OperationOutcome::classify(Err(
            WbemError::cim(StatusCode::Failed, "boom").into(),
        ));
        assert!(matches!(fatal, OperationOutcome::Fatal(_)));
    }
}

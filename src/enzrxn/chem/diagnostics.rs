//! Capturing the warnings emitted while parsing chemical structures.
//!
//! Parsers write their warnings to a [`DiagnosticLog`].  Outside a capture
//! the warnings are logged, inside a capture they are buffered so that the
//! caller can decide whether the structure is usable.  Only one capture can
//! be active on a log at a time.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Display, Formatter};

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCategory {
    AmbiguousStereochemistry,
    #[serde(rename = "tagged_3d_but_flat")]
    Tagged3DButFlat,
    ProtonsAddedOrRemoved,
    MetalDisconnected,
    OmittedUndefinedStereo,
    ChargesRearranged,
    HydrogenWithoutNeighbors,
    HydrogenWithDummyNeighbors,
}

const CATEGORY_MESSAGES: [(DiagnosticCategory, &str); 8] = [
    (DiagnosticCategory::AmbiguousStereochemistry, "ambiguous stereochemistry"),
    (DiagnosticCategory::Tagged3DButFlat,
     "molecule is tagged as 3D, but all Z coords are zero and 2D stereo markers have been found, marking the mol as 2D"),
    (DiagnosticCategory::ProtonsAddedOrRemoved, "Proton(s) added/removed"),
    (DiagnosticCategory::MetalDisconnected, "Metal was disconnected"),
    (DiagnosticCategory::OmittedUndefinedStereo, "Omitted undefined stereo"),
    (DiagnosticCategory::ChargesRearranged, "Charges were rearranged"),
    (DiagnosticCategory::HydrogenWithoutNeighbors,
     "not removing hydrogen atom without neighbors"),
    (DiagnosticCategory::HydrogenWithDummyNeighbors,
     "not removing hydrogen atom with dummy atom neighbors"),
];

impl DiagnosticCategory {
    // the text that identifies a diagnostic of this category
    pub fn message(&self) -> &'static str {
        CATEGORY_MESSAGES.iter()
            .find(|(category, _)| category == self)
            .map(|(_, message)| *message)
            .unwrap_or_default()
    }

    pub fn classify(line: &str) -> Option<DiagnosticCategory> {
        if !line.contains("Warning") && !line.contains("WARNING") {
            return None;
        }

        CATEGORY_MESSAGES.iter()
            .find(|(_, message)| line.contains(message))
            .map(|(category, _)| *category)
    }
}

impl Display for DiagnosticCategory {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

#[derive(Debug, Error)]
pub enum DiagnosticError {
    #[error("a diagnostic capture is already active")]
    AlreadyCapturing,

    #[error("disallowed chemistry diagnostic ({category}): {text}")]
    Disallowed { category: DiagnosticCategory, text: String },

    /// Diagnostic text that matches no known category, this needs explicit
    /// handling before the run can continue
    #[error("unrecognized chemistry diagnostic: {0}")]
    Unrecognized(String),
}

impl DiagnosticError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DiagnosticError::Disallowed { .. })
    }
}

#[derive(Debug, Default)]
pub struct DiagnosticLog {
    capturing: Cell<bool>,
    buffer: RefCell<Vec<String>>,
}

impl DiagnosticLog {
    pub fn new() -> DiagnosticLog {
        DiagnosticLog::default()
    }

    pub fn emit(&self, message: impl Into<String>) {
        let message = message.into();
        if self.capturing.get() {
            self.buffer.borrow_mut().push(message);
        } else {
            warn!("{}", message);
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.get()
    }

    pub fn begin_capture(&self) -> Result<DiagnosticCapture<'_>, DiagnosticError> {
        if self.capturing.replace(true) {
            return Err(DiagnosticError::AlreadyCapturing);
        }
        self.buffer.borrow_mut().clear();
        Ok(DiagnosticCapture { log: self })
    }
}

// Ends the capture when dropped, discarding anything still buffered
pub struct DiagnosticCapture<'a> {
    log: &'a DiagnosticLog,
}

impl DiagnosticCapture<'_> {
    pub fn messages(&self) -> Vec<String> {
        self.log.buffer.borrow().clone()
    }

    // Classify every captured line.  Unrecognized text is reported before
    // any disallowed category, tolerated categories are only logged.
    pub fn finish(self, tolerated: &[DiagnosticCategory]) -> Result<(), DiagnosticError> {
        let messages = self.log.buffer.take();
        drop(self);

        let mut disallowed = None;

        for line in messages.iter().flat_map(|message| message.lines()) {
            if line.trim().is_empty() {
                continue;
            }
            let Some(category) = DiagnosticCategory::classify(line)
            else {
                return Err(DiagnosticError::Unrecognized(line.to_owned()));
            };

            if tolerated.contains(&category) {
                warn!("ignoring chemistry diagnostic: {}", line);
            } else if disallowed.is_none() {
                disallowed = Some(DiagnosticError::Disallowed {
                    category,
                    text: line.to_owned(),
                });
            }
        }

        match disallowed {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for DiagnosticCapture<'_> {
    fn drop(&mut self) {
        self.log.buffer.borrow_mut().clear();
        self.log.capturing.set(false);
    }
}

#[test]
fn test_classify() {
    assert_eq!(DiagnosticCategory::classify("Warning: ambiguous stereochemistry - linear bond arrangement"),
               Some(DiagnosticCategory::AmbiguousStereochemistry));
    assert_eq!(DiagnosticCategory::classify("WARNING: not removing hydrogen atom without neighbors"),
               Some(DiagnosticCategory::HydrogenWithoutNeighbors));
    assert_eq!(DiagnosticCategory::classify("WARNING: not removing hydrogen atom with dummy atom neighbors"),
               Some(DiagnosticCategory::HydrogenWithDummyNeighbors));
    // the "Warning" marker is required
    assert_eq!(DiagnosticCategory::classify("ambiguous stereochemistry"), None);
    assert_eq!(DiagnosticCategory::classify("Warning: something new"), None);
}

#[test]
fn test_capture_is_exclusive() {
    let log = DiagnosticLog::new();
    {
        let _capture = log.begin_capture().unwrap();
        assert!(log.is_capturing());
        assert!(matches!(log.begin_capture(), Err(DiagnosticError::AlreadyCapturing)));
    }
    assert!(!log.is_capturing());
    assert!(log.begin_capture().is_ok());
}

#[test]
fn test_capture_finish() {
    let log = DiagnosticLog::new();
    let tolerated = [DiagnosticCategory::AmbiguousStereochemistry];

    let capture = log.begin_capture().unwrap();
    log.emit("Warning: ambiguous stereochemistry - linear bond arrangement");
    assert_eq!(capture.messages().len(), 1);
    assert!(capture.finish(&tolerated).is_ok());
    assert!(!log.is_capturing());

    let capture = log.begin_capture().unwrap();
    log.emit("WARNING: Omitted undefined stereo");
    let err = capture.finish(&tolerated).unwrap_err();
    assert!(matches!(err, DiagnosticError::Disallowed {
        category: DiagnosticCategory::OmittedUndefinedStereo, ..
    }));
    assert!(err.is_recoverable());

    let capture = log.begin_capture().unwrap();
    log.emit("WARNING: Omitted undefined stereo");
    log.emit("something unexpected");
    let err = capture.finish(&tolerated).unwrap_err();
    assert!(matches!(err, DiagnosticError::Unrecognized(_)));
    assert!(!err.is_recoverable());
}

#[test]
fn test_capture_released_on_error_path() {
    fn failing_parse(log: &DiagnosticLog) -> Result<(), DiagnosticError> {
        let _capture = log.begin_capture()?;
        log.emit("Warning: ambiguous stereochemistry");
        Err(DiagnosticError::Unrecognized("parse failed".into()))
    }

    let log = DiagnosticLog::new();
    assert!(failing_parse(&log).is_err());
    assert!(!log.is_capturing());
    assert!(log.begin_capture().is_ok());
}

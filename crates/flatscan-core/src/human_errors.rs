// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the command-line front end.
//
// Every technical error is mapped to a plain sentence and a suggestion.

use crate::error::ScanError;

/// A human-readable error with a plain summary and an actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// One-line summary.
    pub message: String,
    /// What the user should try next.
    pub suggestion: String,
}

/// Convert a `ScanError` into a `HumanError`.
pub fn humanize_error(err: &ScanError) -> HumanError {
    match err {
        ScanError::InvalidArgument(detail) => HumanError {
            message: "The scanner was called with an invalid request.".into(),
            suggestion: format!("Check the requested sizes and kernel settings. ({detail})"),
        },

        // Normally recovered internally; only reachable through direct use of
        // the camera-model solver.
        ScanError::NumericalInstability(detail) => HumanError {
            message: "The page outline could not be measured precisely.".into(),
            suggestion: format!(
                "Retake the photo with the whole page visible and less tilt. ({detail})"
            ),
        },

        ScanError::Image(detail) => HumanError {
            message: "The picture could not be read or written.".into(),
            suggestion: format!("Make sure the file is a JPEG, PNG or TIFF image. ({detail})"),
        },

        ScanError::Config(detail) => HumanError {
            message: "The configuration file has an invalid setting.".into(),
            suggestion: format!("Fix the setting or remove it to use the default. ({detail})"),
        },

        ScanError::Io(io) => HumanError {
            message: "A file could not be opened or saved.".into(),
            suggestion: format!("Check that the path exists and is writable. ({io})"),
        },

        ScanError::Serialization(json) => HumanError {
            message: "The configuration file is not valid JSON.".into(),
            suggestion: format!("Check the file near line {}. ({json})", json.line()),
        },
    }
}

impl std::fmt::Display for HumanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\n  {}", self.message, self.suggestion)
    }
}

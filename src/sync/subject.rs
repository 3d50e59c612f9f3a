// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/// Longest reply/forward label we strip, colon excluded (`Fwd`, `Antw`).
const MAX_LABEL_LEN: usize = 4;

/// Strips leading reply/forward labels such as `Re:` and `Fwd:`.
///
/// A label is a short alphabetic word followed by a colon. Stripping never
/// yields an empty subject.
pub fn strip_labels(subject: &str) -> String {
    let mut rest = subject.trim();
    while let Some(colon) = rest.find(':') {
        let label = &rest[..colon];
        if label.is_empty() || label.len() > MAX_LABEL_LEN || !label.chars().all(char::is_alphabetic) {
            break;
        }
        let stripped = rest[colon + 1..].trim_start();
        if stripped.is_empty() {
            break;
        }
        rest = stripped;
    }
    rest.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_stacked_labels() {
        assert_eq!(strip_labels("Re: Fwd: Project Update"), "Project Update");
        assert_eq!(strip_labels("RE:FW: budget"), "budget");
        assert_eq!(strip_labels("AW: Termin"), "Termin");
    }

    #[test]
    fn test_leaves_plain_subjects_alone() {
        assert_eq!(strip_labels("Hi there"), "Hi there");
        assert_eq!(strip_labels("Meeting at 10:30"), "Meeting at 10:30");
        assert_eq!(strip_labels("Reminder: dentist"), "Reminder: dentist");
        assert_eq!(strip_labels(""), "");
    }

    #[test]
    fn test_never_empties_subject() {
        assert_eq!(strip_labels("Re:"), "Re:");
        assert_eq!(strip_labels("Re: Fwd:"), "Fwd:");
    }
}

// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fmt;

use crate::imap::HeaderQuery;

/// Inclusive sequence range of the newest messages in a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub from: u32,
    pub to: u32,
}

impl SyncWindow {
    /// The newest `page_size` messages of a folder holding `count`.
    pub fn newest(count: u32, page_size: u32) -> Self {
        let span = count.min(page_size);
        Self {
            from: (count - span + 1).max(1),
            to: count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to < self.from
    }

    pub fn len(&self) -> u32 {
        if self.is_empty() {
            0
        } else {
            self.to - self.from + 1
        }
    }

    pub fn query(&self) -> HeaderQuery {
        HeaderQuery::Sequence {
            from: self.from,
            to: self.to,
        }
    }
}

impl fmt::Display for SyncWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.from, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_takes_newest_page() {
        assert_eq!(SyncWindow::newest(100, 40), SyncWindow { from: 61, to: 100 });
        assert_eq!(SyncWindow::newest(100, 40).len(), 40);
    }

    #[test]
    fn test_small_folder_fits_in_one_page() {
        assert_eq!(SyncWindow::newest(10, 40), SyncWindow { from: 1, to: 10 });
        assert_eq!(SyncWindow::newest(40, 40), SyncWindow { from: 1, to: 40 });
    }

    #[test]
    fn test_empty_folder() {
        let window = SyncWindow::newest(0, 40);
        assert!(window.is_empty());
        assert_eq!(window.len(), 0);
    }
}

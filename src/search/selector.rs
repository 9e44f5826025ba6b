//! Candidate file selection from modification times
//!
//! A file's mtime is the time of its last write. For the active file that is
//! later than most of the lines in it, and for a freshly rotated file it sits
//! close to, but not exactly on, the moment the next file took over. Selection
//! therefore keeps every file modified inside the window plus slack files on
//! both sides of that run.
use super::{LogFile, TimeWindow};

/// Number of extra files kept on each side of the in-window run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlackPolicy {
    pub before: usize,
    pub after: usize,
}

impl Default for SlackPolicy {
    fn default() -> Self {
        Self {
            before: 1,
            after: 1,
        }
    }
}

/// Select the files whose content may overlap `window`.
///
/// Returns the selection in mtime order. When every file was modified before
/// the window start, only the left slack files are kept.
pub fn select_files(mut files: Vec<LogFile>, window: TimeWindow, slack: SlackPolicy) -> Vec<LogFile> {
    files.sort_by(|a, b| {
        a.modified_ms
            .cmp(&b.modified_ms)
            .then_with(|| a.path.cmp(&b.path))
    });

    let first = files.partition_point(|f| f.modified_ms < window.start_ms());
    let in_window = files[first..].partition_point(|f| f.modified_ms <= window.end_ms());
    let lo = first.saturating_sub(slack.before);
    let hi = (first + in_window).saturating_add(slack.after).min(files.len());

    files.truncate(hi);
    files.drain(..lo);
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn file(name: &str, modified_ms: i64) -> LogFile {
        LogFile::new(name, modified_ms)
    }

    fn names(files: &[LogFile]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.path.display().to_string())
            .collect()
    }

    fn window(start: i64, end: i64) -> TimeWindow {
        TimeWindow::new(start, end).unwrap()
    }

    #[test]
    fn test_empty_input() {
        assert!(select_files(vec![], window(0, 10), SlackPolicy::default()).is_empty());
    }

    #[test]
    fn test_window_between_files() {
        let files = vec![file("a.log", 100), file("b.log", 200), file("c.log", 300)];
        let selected = select_files(files, window(150, 250), SlackPolicy::default());
        assert_eq!(names(&selected), vec!["a.log", "b.log", "c.log"]);
    }

    #[test]
    fn test_run_with_slack_on_both_sides() {
        let files = vec![
            file("a.log", 100),
            file("b.log", 200),
            file("c.log", 250),
            file("d.log", 300),
            file("e.log", 350),
            file("f.log", 400),
        ];
        let selected = select_files(files, window(220, 300), SlackPolicy::default());
        assert_eq!(names(&selected), vec!["b.log", "c.log", "d.log", "e.log"]);
    }

    #[test]
    fn test_every_file_older_than_window_keeps_left_slack() {
        let files = vec![file("a.log", 100), file("b.log", 200)];
        let selected = select_files(files.clone(), window(300, 400), SlackPolicy::default());
        assert_eq!(names(&selected), vec!["b.log"]);

        let wide = SlackPolicy {
            before: 2,
            after: 1,
        };
        let selected = select_files(files.clone(), window(300, 400), wide);
        assert_eq!(names(&selected), vec!["a.log", "b.log"]);

        let none = SlackPolicy {
            before: 0,
            after: 1,
        };
        assert!(select_files(files, window(300, 400), none).is_empty());
    }

    #[test]
    fn test_every_file_newer_than_window() {
        let files = vec![file("a.log", 500), file("b.log", 600)];
        let selected = select_files(files, window(300, 400), SlackPolicy::default());
        assert_eq!(names(&selected), vec!["a.log"]);
    }

    #[test]
    fn test_unsorted_input_and_ties_broken_by_path() {
        let files = vec![file("z.log", 200), file("c.log", 100), file("a.log", 200)];
        let selected = select_files(files, window(150, 250), SlackPolicy::default());
        assert_eq!(names(&selected), vec!["c.log", "a.log", "z.log"]);
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let files = vec![file("a.log", 100), file("b.log", 200), file("c.log", 300)];
        let strict = SlackPolicy {
            before: 0,
            after: 0,
        };
        let selected = select_files(files, window(100, 300), strict);
        assert_eq!(names(&selected), vec!["a.log", "b.log", "c.log"]);
    }

    #[test]
    fn test_wider_slack() {
        let files = (0..10).map(|i| file(&format!("{i}.log"), i * 100)).collect();
        let slack = SlackPolicy {
            before: 2,
            after: 3,
        };
        let selected = select_files(files, window(450, 550), slack);
        assert_eq!(
            names(&selected),
            vec!["3.log", "4.log", "5.log", "6.log", "7.log", "8.log"]
        );
    }

    proptest! {
        // Files are consecutive rotations: file k holds lines timestamped in
        // (mtime[k-1], mtime[k]], and the first file starts at `origin`.
        #[test]
        fn prop_selection_covers_every_overlapping_file(
            origin in 0i64..1_000,
            gaps in prop::collection::vec(1i64..500, 0..40),
            start_offset in 0i64..25_000,
            len in 0i64..5_000,
        ) {
            let mut mtimes = Vec::with_capacity(gaps.len());
            let mut t = origin;
            for gap in &gaps {
                t += gap;
                mtimes.push(t);
            }
            let files: Vec<LogFile> = mtimes
                .iter()
                .enumerate()
                .map(|(i, &m)| file(&format!("{i:03}.log"), m))
                .collect();
            let w = window(start_offset, start_offset + len);

            let selected = names(&select_files(files, w, SlackPolicy::default()));

            let mut overlapping = Vec::new();
            for (i, &m) in mtimes.iter().enumerate() {
                let first_line = if i == 0 { origin } else { mtimes[i - 1] + 1 };
                if first_line <= w.end_ms() && m >= w.start_ms() {
                    overlapping.push(format!("{i:03}.log"));
                }
            }

            for name in &overlapping {
                prop_assert!(selected.contains(name), "missing {name}");
            }

            let strict: Vec<usize> = mtimes
                .iter()
                .enumerate()
                .filter(|(_, m)| w.contains(**m))
                .map(|(i, _)| i)
                .collect();
            prop_assert!(selected.len() <= strict.len() + 2);
        }

        #[test]
        fn prop_selection_is_contiguous_in_mtime_order(
            mtimes in prop::collection::vec(0i64..10_000, 0..30),
            start in 0i64..10_000,
            len in 0i64..3_000,
        ) {
            let files: Vec<LogFile> = mtimes
                .iter()
                .enumerate()
                .map(|(i, &m)| file(&format!("{i:03}.log"), m))
                .collect();
            let w = window(start, start + len);

            let selected = select_files(files.clone(), w, SlackPolicy::default());
            let all = select_files(files, window(i64::MIN, i64::MAX), SlackPolicy::default());

            let positions: Vec<usize> = selected
                .iter()
                .filter_map(|s| all.iter().position(|f| f == s))
                .collect();
            prop_assert_eq!(positions.len(), selected.len());
            prop_assert!(positions.windows(2).all(|p| p[1] == p[0] + 1));
        }
    }
}

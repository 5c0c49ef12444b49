//! Choosing a log entry from history.
//!
//! The history is shown a page at a time, newest first. "View more" pages
//! further back and "Cancel" returns to listening.

use colored::Colorize;

/// How many entries one page offers.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// One line of the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// Show the next page of older entries.
    ViewMore,
    /// A history entry, by index.
    Entry(usize),
    /// Go back to listening.
    Cancel,
}

/// The choices for one page.
///
/// `end` is how many history entries take part, `offset` how many of the
/// newest of them earlier pages already covered, and `page_size` the most
/// entries shown at once.
pub fn page_choices(end: usize, offset: usize, page_size: usize) -> Vec<Choice> {
    let visible = end.saturating_sub(offset);
    let start = visible.saturating_sub(page_size);

    let mut choices = Vec::with_capacity(visible - start + 2);
    if start > 0 {
        choices.push(Choice::ViewMore);
    }
    choices.extend((start..visible).rev().map(Choice::Entry));
    choices.push(Choice::Cancel);
    choices
}

/// A single-choice list with a movable pointer.
pub struct HistoryPrompt {
    choices: Vec<Choice>,
    selected: usize,
}

impl HistoryPrompt {
    /// Starts with the pointer on the newest entry.
    pub fn new(choices: Vec<Choice>) -> Self {
        let selected = choices
            .iter()
            .position(|c| matches!(c, Choice::Entry(_)))
            .unwrap_or(0);
        Self { choices, selected }
    }

    pub fn move_up(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
        }
    }

    pub fn move_down(&mut self) {
        if self.selected + 1 < self.choices.len() {
            self.selected += 1;
        }
    }

    pub fn selected(&self) -> Choice {
        self.choices[self.selected]
    }

    /// The prompt as text. `label` renders the summary of a history entry.
    pub fn render(&self, label: impl Fn(usize) -> String) -> String {
        let mut lines = vec![format!(
            "{} {}",
            "?".green(),
            "Choose an entry to view:".bold()
        )];

        for (i, choice) in self.choices.iter().enumerate() {
            let text = match choice {
                Choice::ViewMore => "View more...".to_string(),
                Choice::Entry(index) => label(*index),
                Choice::Cancel => "Cancel".to_string(),
            };
            if i == self.selected {
                lines.push(format!("{} {text}", "›".cyan()));
            } else {
                lines.push(format!("  {text}"));
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_of_fifteen_offers_view_more() {
        let choices = page_choices(15, 0, 10);

        assert_eq!(choices.len(), 12);
        assert_eq!(choices[0], Choice::ViewMore);
        assert_eq!(choices[1], Choice::Entry(14));
        assert_eq!(choices[10], Choice::Entry(5));
        assert_eq!(choices[11], Choice::Cancel);
    }

    #[test]
    fn second_page_holds_the_rest() {
        let choices = page_choices(15, 10, 10);

        assert_eq!(
            choices,
            vec![
                Choice::Entry(4),
                Choice::Entry(3),
                Choice::Entry(2),
                Choice::Entry(1),
                Choice::Entry(0),
                Choice::Cancel,
            ]
        );
    }

    #[test]
    fn short_history_fits_one_page() {
        assert_eq!(
            page_choices(2, 0, 10),
            vec![Choice::Entry(1), Choice::Entry(0), Choice::Cancel]
        );
    }

    #[test]
    fn paging_never_goes_past_the_head() {
        assert_eq!(page_choices(5, 10, 10), vec![Choice::Cancel]);
    }

    #[test]
    fn pointer_starts_on_newest_entry() {
        let prompt = HistoryPrompt::new(page_choices(15, 0, 10));
        assert_eq!(prompt.selected(), Choice::Entry(14));
    }

    #[test]
    fn pointer_stays_in_bounds() {
        let mut prompt = HistoryPrompt::new(page_choices(2, 0, 10));
        prompt.move_up();
        prompt.move_up();
        assert_eq!(prompt.selected(), Choice::Entry(1));

        for _ in 0..5 {
            prompt.move_down();
        }
        assert_eq!(prompt.selected(), Choice::Cancel);
    }

    #[test]
    fn view_more_is_reachable_above_entries() {
        let mut prompt = HistoryPrompt::new(page_choices(15, 0, 10));
        prompt.move_up();
        assert_eq!(prompt.selected(), Choice::ViewMore);
    }

    #[test]
    fn render_marks_selection() {
        colored::control::set_override(false);
        let prompt = HistoryPrompt::new(page_choices(2, 0, 10));

        let text = prompt.render(|i| format!("entry {i}"));

        assert_eq!(
            text,
            "? Choose an entry to view:\n› entry 1\n  entry 0\n  Cancel"
        );
    }
}

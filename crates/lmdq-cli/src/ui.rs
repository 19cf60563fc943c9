//! Terminal output.
//!
//! Progress goes to stderr so that `update` can print the published
//! snapshot path alone on stdout.

use crossterm::style::{Color, Stylize};

use lmdq_core::{IndexSummary, Reporter, Stage};
use lmdq_schema::{FeedName, KeyFingerprint};

#[derive(Debug, Clone)]
pub struct Theme {
    pub feed_name: Color,
    pub secondary: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    /// Width of the feed name column.
    pub name_width: usize,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            feed_name: Color::Cyan,
            secondary: Color::DarkGrey,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            name_width: 16,
        }
    }
}

/// Reports pipeline progress on the terminal.
#[derive(Debug, Clone, Default)]
pub struct ConsoleReporter {
    theme: Theme,
    quiet: bool,
}

impl ConsoleReporter {
    pub fn new(quiet: bool) -> Self {
        Self {
            theme: Theme::default(),
            quiet,
        }
    }

    fn feed_column(&self, feed: &FeedName) -> String {
        format!("{:<width$}", feed.as_str(), width = self.theme.name_width)
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Fetch => "fetching",
        Stage::Validate => "validating",
        Stage::Index => "indexing",
    }
}

impl Reporter for ConsoleReporter {
    fn section(&self, title: &str) {
        if self.quiet {
            return;
        }
        eprintln!();
        eprintln!("{}", title.dark_grey());
    }

    fn feed_stage(&self, feed: &FeedName, stage: Stage) {
        if self.quiet {
            return;
        }
        eprintln!(
            "  {} {}",
            self.feed_column(feed).with(self.theme.feed_name),
            stage_label(stage).with(self.theme.secondary)
        );
    }

    fn feed_done(&self, feed: &FeedName, signer: &KeyFingerprint, summary: &IndexSummary) {
        if self.quiet {
            return;
        }
        eprintln!(
            "  {} {} {}",
            self.feed_column(feed).with(self.theme.feed_name),
            format!(
                "{} entities, {} endpoint keys",
                summary.entities, summary.secondary_keys
            )
            .with(self.theme.success),
            format!("signed by {signer}").with(self.theme.secondary)
        );
    }

    fn feed_failed(&self, feed: &FeedName, stage: Stage, reason: &str) {
        // Failures are shown even in quiet mode.
        eprintln!(
            "  {} {} {}",
            self.feed_column(feed).with(self.theme.feed_name),
            format!("{stage} failed:").with(self.theme.error),
            reason
        );
    }

    fn info(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{msg}");
        }
    }

    fn success(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{}", msg.with(self.theme.success));
        }
    }

    fn warning(&self, msg: &str) {
        eprintln!("{}", msg.with(self.theme.warning));
    }

    fn error(&self, msg: &str) {
        eprintln!("{}", msg.with(self.theme.error));
    }
}

//! Reporter trait for dependency injection
//!
//! Lets the pipeline report per-feed progress without being coupled to a
//! terminal. Structured logs go through `tracing` independently of this.

use lmdq_schema::{FeedName, KeyFingerprint};

use crate::error::Stage;
use crate::indexer::IndexSummary;

pub trait Reporter: Send + Sync {
    /// A new phase of the run has started (e.g. "Fetching feeds").
    fn section(&self, title: &str);

    /// A feed moved into `stage`.
    fn feed_stage(&self, feed: &FeedName, stage: Stage);

    /// A feed was fully written into the snapshot.
    fn feed_done(&self, feed: &FeedName, signer: &KeyFingerprint, summary: &IndexSummary);

    /// A feed failed; the run will not promote.
    fn feed_failed(&self, feed: &FeedName, stage: Stage, reason: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a success message.
    fn success(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Log an error message.
    fn error(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn section(&self, title: &str) {
        (**self).section(title);
    }
    fn feed_stage(&self, feed: &FeedName, stage: Stage) {
        (**self).feed_stage(feed, stage);
    }
    fn feed_done(&self, feed: &FeedName, signer: &KeyFingerprint, summary: &IndexSummary) {
        (**self).feed_done(feed, signer, summary);
    }
    fn feed_failed(&self, feed: &FeedName, stage: Stage, reason: &str) {
        (**self).feed_failed(feed, stage, reason);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn success(&self, msg: &str) {
        (**self).success(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
    fn error(&self, msg: &str) {
        (**self).error(msg);
    }
}

/// A no-op reporter for silent operations (e.g., cron runs, testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn feed_stage(&self, _: &FeedName, _: Stage) {}
    fn feed_done(&self, _: &FeedName, _: &KeyFingerprint, _: &IndexSummary) {}
    fn feed_failed(&self, _: &FeedName, _: Stage, _: &str) {}
    fn info(&self, _: &str) {}
    fn success(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn error(&self, _: &str) {}
}

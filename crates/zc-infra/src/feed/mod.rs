//! Store change feed.

pub mod event_stream;

pub use event_stream::EventStreamFeed;

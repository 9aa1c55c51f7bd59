use slog::{o, Drain, LevelFilter, Logger};
use slog_async::{Async, OverflowStrategy};
use slog_term::{CompactFormat, TermDecorator};

pub use slog::Level;

const CHANNEL_SIZE: usize = 1024;

/// Stderr logger for one pipeline module. Records below `level` are dropped
/// before they reach the async channel; a full channel drops records and
/// reports how many were lost instead of blocking extraction.
pub fn create_logger(module: &'static str, level: Level) -> Logger {
    let decorator = TermDecorator::new().stderr().build();
    let format = CompactFormat::new(decorator).build().fuse();
    let drain = Async::new(format)
        .chan_size(CHANNEL_SIZE)
        .overflow_strategy(OverflowStrategy::DropAndReport)
        .build()
        .fuse();
    Logger::root(
        LevelFilter::new(drain, level).fuse(),
        o!("crate" => "ppgcore", "module" => module),
    )
}

/// Logger that drops every record, for callers that do not want output.
pub fn silent_logger() -> Logger {
    Logger::root(slog::Discard, o!())
}

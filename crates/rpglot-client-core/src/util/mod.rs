//! Utility modules.

mod time_parser;

pub use time_parser::{TimeParseError, format_timestamp, parse_time_with_base};

pub mod logging;

pub use logging::{head_chars, tail_chars, truncate_text};

pub mod daily_polls;
pub mod posts;

pub mod catalog;
mod route;

pub use route::{run_match, MatchRequest};

pub mod constants;
pub mod retry;
pub mod test_helpers;
pub mod types;

pub mod org;
pub mod sale;

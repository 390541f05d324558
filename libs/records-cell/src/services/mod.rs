pub mod prescription;
pub mod rating;

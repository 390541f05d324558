pub mod consultation;
pub mod lifecycle;

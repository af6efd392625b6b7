pub mod inspect;
pub mod ops;

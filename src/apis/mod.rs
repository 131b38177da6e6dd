pub mod fatsoma;
pub mod fixr;

mod property;

pub use property::*;

pub mod intake;
pub mod poll;
pub mod processor;
pub mod source;

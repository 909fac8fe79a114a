pub mod redact;
pub mod suggest;
pub mod text;

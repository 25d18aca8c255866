pub mod checker;
pub mod http;

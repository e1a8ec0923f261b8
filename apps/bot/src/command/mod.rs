mod dispatcher;
pub mod format;
mod parse;
pub mod stock;

pub use dispatcher::Dispatcher;
pub use parse::Command;

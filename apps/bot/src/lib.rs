use std::sync::Arc;

use command::Dispatcher;

pub mod chat;
pub mod command;
pub mod config;
pub mod connectivity;
pub mod desk;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod scheduler;

pub struct Data {
    pub dispatcher: Arc<Dispatcher>,
    /// Guild channel whose plain messages are read as commands; DMs always are.
    pub listen_channel: u64,
}

pub type Error = anyhow::Error;
pub type Context<'a> = poise::Context<'a, Data, Error>;

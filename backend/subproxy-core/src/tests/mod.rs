mod channel;
mod config;
mod dispatch;
mod info;
mod registry;
mod spawn;

mod asynchronous;
mod concurrency;
mod errors;
mod helpers;
mod lifecycle;
mod proxy;

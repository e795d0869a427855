mod demo;
mod exec;
mod helpers;

pub mod audio;
pub mod config;
pub mod pipeline;
pub mod server;
pub mod stream;
pub mod synth;
pub mod translate;

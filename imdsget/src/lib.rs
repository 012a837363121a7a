pub mod cli;
pub mod imds;
pub mod output;

pub use cli::Cli;
pub use imds::Client;

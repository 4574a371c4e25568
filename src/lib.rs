pub mod config;
pub mod credentials;
pub mod github;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod review_log;

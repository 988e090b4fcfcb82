pub mod audit;
pub mod config;
pub mod driver;
pub mod lock;
pub mod paths;
pub mod state;
pub mod subject;
pub mod tracker;
pub mod util;

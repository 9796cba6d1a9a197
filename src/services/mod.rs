pub mod sweeper_service;

pub use sweeper_service::SweeperService;

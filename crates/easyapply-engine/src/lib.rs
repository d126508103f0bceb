pub mod answers;
pub mod apply;
pub mod backend;
pub mod blacklist;
pub mod bot;
pub mod config;
pub mod form;
pub mod records;
pub mod screenshots;
pub mod search;
pub mod selectors;
pub mod session;
pub mod wait;

pub use easyapply_common::error;
pub use easyapply_common::protocol;

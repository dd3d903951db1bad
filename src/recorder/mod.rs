pub mod capture;
pub mod describe;
pub mod element;
pub mod event;
pub mod listener;
pub mod manual;
pub mod page;
pub mod pipeline;
pub mod session;
pub mod state;
pub mod storage;
pub mod types;
pub mod video;

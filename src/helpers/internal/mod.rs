//! Internal building blocks shared by task handlers (not task handlers themselves).

pub mod extract;
pub mod fs_utils;
pub mod http;
pub mod progress;

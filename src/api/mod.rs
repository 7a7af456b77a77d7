//! 对外 HTTP 接口

pub mod ingress;

pub use ingress::{router, AppState, ProcessRequest};

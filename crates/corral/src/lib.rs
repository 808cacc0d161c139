#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod counter;
mod error;
mod mutex;
mod pool;

pub use crate::counter::*;
pub use crate::error::*;
pub use crate::pool::*;

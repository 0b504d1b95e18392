#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use strand_graph as graph;
pub use strand_utils as utils;

pub use strand_graph::{Error, GraphSerializer, Result};

//! Wire protocol shared by the coordinator and worker nodes.
//!
//! Messages are newline-terminated text. A shard travels from the
//! coordinator to a worker as a `UserID:` header, one rating per line and an
//! `END` sentinel; partial scores travel back as `<movieID> <score>` lines
//! terminated by the same sentinel.

pub mod codec;
pub mod error;
pub mod shard;

pub use codec::{
    encode_shard_lines, parse_rating_line, parse_result_line, read_shard, write_results,
    write_shard, HEADER_PREFIX, SENTINEL,
};
pub use error::{ProtocolError, Result};
pub use shard::Shard;

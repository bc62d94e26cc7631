// SPDX-License-Identifier: Apache-2.0

//! Statement codec and transactional apply engine for network devices
//! configured through flat `set`/`delete` statements.
//!
//! A [FeatureModel] describes one manageable feature. Its options tree
//! ([OptionsBlock]) is compiled into statements by [compile()], read back by
//! [decompile()], and applied through an [Engine] holding a
//! [DeviceSession].
//!
//! ```
//! use devconf::{
//!     compile, decompile, BlockModel, CodecContext, FieldModel,
//! };
//!
//! let model = BlockModel::new(vec![
//!     FieldModel::string("host_name"),
//!     FieldModel::int("idle_timeout").default_value(-1),
//! ]);
//! let mut tree = model.new_block();
//! tree.set("host_name", "my server").set("idle_timeout", 30);
//!
//! let ctx = CodecContext::new();
//! let statements = compile(&tree, &model, &ctx).unwrap();
//! assert_eq!(statements[0].to_string(), "host_name \"my server\"");
//! assert_eq!(decompile(&statements, &model, &ctx).unwrap(), tree);
//! ```

mod compile;
mod context;
mod decompile;
mod diff;
mod engine;
mod error;
mod model;
mod session;
mod statement;
mod value;


pub use crate::compile::{compile, compile_batch};
pub use crate::context::CodecContext;
pub use crate::decompile::{decompile, decompile_text};
pub use crate::diff::{gen_diff, StatementDiff};
pub use crate::engine::{ApplyMode, ApplyOutcome, Engine, Operation};
pub use crate::error::{DevConfError, ErrorKind};
pub use crate::model::{
    BlockModel, FeatureModel, FieldKind, FieldModel, ScalarType, VariantGuard,
};
pub use crate::session::{DeviceSession, OfflineSession};
pub use crate::statement::{
    escape_token, unescape_token, BatchEntry, Statement, StatementBatch,
};
pub use crate::value::{OptionsBlock, OptionsValue, ScalarValue};

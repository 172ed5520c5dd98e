pub mod decode;
pub mod encode;
pub mod op;
pub mod text;
pub mod var;

pub use decode::decode_script;
pub use encode::{encode_instr, encode_script};
pub use op::{nop, Instr, Op, Operand, Script};
pub use text::TextToken;
pub use var::VarRef;

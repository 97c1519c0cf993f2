//! Wire encodings. The canonical text forms are implemented through `Display`/`FromStr` on
//! each value type with the help of [`text`]; the structured form goes through [`SExpr`].
pub mod sexpr;
pub mod text;

pub use sexpr::{FromSExpr, SExpr, ToSExpr};

//! Runtime type reflection.
//!
//! Types register themselves (usually through [`impl_class!`](crate::impl_class)
//! and [`impl_enum!`](crate::impl_enum)) and get an interned
//! [`Type`] description: kind, size, members, inheritance links, and a
//! default constructor. On top of that sit two serialization drivers:
//!
//! - the config-tree driver ([`Reflected::serialize`] /
//!   [`Reflected::deserialize`]), producing editable text, and
//! - the binary driver ([`serializer`]), a compact two-pass format with a
//!   shared string table and a deduplicating object table.
//!
//! Both drivers tolerate schema drift: members present in the data but
//! missing from the runtime type are skipped with a warning, and the binary
//! driver records the old value of members whose type changed.

pub mod macros;
pub mod serializer;

mod class;
mod containers;
mod context;
mod error;
mod fundamental;
mod kind;
mod path;
mod reflected;
mod registry;
mod stream;
mod type_desc;

pub use class::{
    ClassType, ClassTypeInfo, Getter, GetterMut, Member, MemberFlags, ParentLink, TYPE_MARKER,
};
pub use context::{
    ContextError, MAX_MAPPED_STRING_LENGTH, MemberTypeMismatch, MismatchedValue,
    SerializationContext, Stage,
};
pub use error::{DeserializeError, SerializeError};
pub use kind::TypeKind;
pub use path::{MAX_PATH_DEPTH, MemberPath, PathError, PathStep};
pub use reflected::{Reflected, Typed, member_type};
pub use registry::{TypeRegistration, TypeRegistry};
pub use serializer::{CURRENT_VERSION, Deserialized};
pub use stream::{ByteReader, write_uint};
pub use type_desc::{Type, TypeInfo};

use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use bitflags::bitflags;

use crate::config::{Config, ConfigObject, ConfigValue};
use crate::reflect::context::{MemberTypeMismatch, MismatchedValue, SerializationContext};
use crate::reflect::error::{DeserializeError, SerializeError};
use crate::reflect::kind::TypeKind;
use crate::reflect::reflected::Reflected;
use crate::reflect::registry::TypeRegistry;
use crate::reflect::stream::{ByteReader, write_uint};
use crate::reflect::type_desc::Type;

/// Reserved member name carrying the dynamic type of a polymorphic object
/// in the config format.
pub const TYPE_MARKER: &str = "__type";

bitflags! {
    /// Metadata flags of a class member.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MemberFlags: u8 {
        /// Pointer member that must never be empty. Checked against the
        /// default instance at registration (debug builds).
        const NON_NULL = 1 << 0;
    }
}

/// Borrows the member value out of an object of the owning class.
pub type Getter = fn(&dyn Reflected) -> &dyn Reflected;
pub type GetterMut = fn(&mut dyn Reflected) -> &mut dyn Reflected;

// -----------------------------------------------------------------------------
// Member

/// One serializable field of a class.
pub struct Member {
    name: &'static str,
    ty: &'static Type,
    flags: MemberFlags,
    getter: Getter,
    getter_mut: GetterMut,
}

impl Member {
    pub fn new(
        name: &'static str,
        ty: &'static Type,
        getter: Getter,
        getter_mut: GetterMut,
    ) -> Self {
        Self {
            name,
            ty,
            flags: MemberFlags::empty(),
            getter,
            getter_mut,
        }
    }

    pub fn with_flags(mut self, flags: MemberFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ty(&self) -> &'static Type {
        self.ty
    }

    pub fn flags(&self) -> MemberFlags {
        self.flags
    }

    /// # Panics
    ///
    /// The accessor panics when `object` is not of the owning class.
    pub fn get<'a>(&self, object: &'a dyn Reflected) -> &'a dyn Reflected {
        (self.getter)(object)
    }

    pub fn get_mut<'a>(&self, object: &'a mut dyn Reflected) -> &'a mut dyn Reflected {
        (self.getter_mut)(object)
    }
}

impl core::fmt::Debug for Member {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Member")
            .field("name", &self.name)
            .field("type", &self.ty.name())
            .field("flags", &self.flags)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// ParentLink

/// Connection from a class to its base class, embedded as a field.
///
/// The upcast accessors borrow that embedded base out of a derived object,
/// which is how inherited members are reached without pointer arithmetic.
pub struct ParentLink {
    ty: &'static Type,
    upcast: Getter,
    upcast_mut: GetterMut,
}

impl ParentLink {
    pub fn new(ty: &'static Type, upcast: Getter, upcast_mut: GetterMut) -> Self {
        Self {
            ty,
            upcast,
            upcast_mut,
        }
    }

    pub fn ty(&self) -> &'static Type {
        self.ty
    }

    pub fn upcast<'a>(&self, object: &'a dyn Reflected) -> &'a dyn Reflected {
        (self.upcast)(object)
    }

    pub fn upcast_mut<'a>(&self, object: &'a mut dyn Reflected) -> &'a mut dyn Reflected {
        (self.upcast_mut)(object)
    }
}

// -----------------------------------------------------------------------------
// ClassType

/// Class payload of a [`TypeInfo`](crate::reflect::TypeInfo).
pub struct ClassTypeInfo {
    pub parent: Option<ParentLink>,
    pub members: Vec<Member>,
}

/// Class metadata of a registered [`Type`].
pub struct ClassType {
    parent: Option<ParentLink>,
    members: Vec<Member>,
    children: RwLock<Vec<&'static Type>>,
}

impl ClassType {
    pub(crate) fn from_info(info: ClassTypeInfo) -> Self {
        Self {
            parent: info.parent,
            members: info.members,
            children: RwLock::new(Vec::new()),
        }
    }

    pub fn parent(&self) -> Option<&ParentLink> {
        self.parent.as_ref()
    }

    /// Members declared directly on this class, in declaration order.
    /// Inherited members are reached through [`Type::list_members`].
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Classes registered so far that name this class as their parent.
    pub fn children(&self) -> RwLockReadGuard<'_, Vec<&'static Type>> {
        self.children.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn add_child(&self, child: &'static Type) {
        self.children
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(child);
    }
}

/// Finds `name` on `ty` or any ancestor, yielding the member and `object`
/// upcast to the level that declares it.
pub(crate) fn resolve_member<'t, 'a>(
    ty: &'t Type,
    object: &'a dyn Reflected,
    name: &str,
) -> Option<(&'t Member, &'a dyn Reflected)> {
    let class = ty.as_class()?;
    if let Some(member) = class.members().iter().find(|m| m.name() == name) {
        return Some((member, object));
    }
    let parent = class.parent()?;
    resolve_member(parent.ty(), parent.upcast(object), name)
}

pub(crate) fn resolve_member_mut<'t, 'a>(
    ty: &'t Type,
    object: &'a mut dyn Reflected,
    name: &str,
) -> Option<(&'t Member, &'a mut dyn Reflected)> {
    let class = ty.as_class()?;
    if let Some(member) = class.members().iter().find(|m| m.name() == name) {
        return Some((member, object));
    }
    let parent = class.parent()?;
    resolve_member_mut(parent.ty(), parent.upcast_mut(object), name)
}

// -----------------------------------------------------------------------------
// Class algorithms
//
// Entry points dispatch on kind: class kinds run the recursive algorithms
// below, every other kind defers to the value's own trait implementation.
// The macro-generated trait impls of classes call back into these, so both
// call directions agree.

impl Type {
    /// Serializes `object` (of this type) into a config tree.
    pub fn serialize(
        &self,
        object: &dyn Reflected,
        config: &mut Config,
    ) -> Result<ConfigValue, SerializeError> {
        if self.as_class().is_none() {
            return object.serialize(config);
        }
        if self.kind() == TypeKind::AbstractClass {
            return Err(SerializeError::AbstractType {
                name: self.name().to_owned(),
            });
        }
        let mut root = ConfigObject::new();
        if self.kind() == TypeKind::PolymorphicClass {
            config.add_value(&mut root, TYPE_MARKER, ConfigValue::from(self.name()));
        }
        self.serialize_members(object, config, &mut root)?;
        Ok(ConfigValue::from(root))
    }

    /// Writes inherited members first (whole ancestor chain, root base
    /// down), then this class's own, so member order is stable across the
    /// hierarchy.
    fn serialize_members(
        &self,
        object: &dyn Reflected,
        config: &mut Config,
        node: &mut ConfigObject,
    ) -> Result<(), SerializeError> {
        let Some(class) = self.as_class() else {
            return Ok(());
        };
        if let Some(parent) = class.parent() {
            parent
                .ty()
                .serialize_members(parent.upcast(object), config, node)?;
        }
        for member in class.members() {
            let value = member
                .ty()
                .serialize(member.get(object), config)
                .map_err(|source| SerializeError::Member {
                    class: self.name().to_owned(),
                    member: member.name(),
                    source: Box::new(source),
                })?;
            config.add_value(node, member.name(), value);
        }
        Ok(())
    }

    /// Deserializes `object` from a config value.
    ///
    /// Stored members the runtime type does not know are logged and
    /// skipped. A polymorphic type marker naming a different type fails.
    pub fn deserialize(
        &self,
        object: &mut dyn Reflected,
        config: &Config,
        value: &ConfigValue,
    ) -> Result<(), DeserializeError> {
        if self.as_class().is_none() {
            return object.deserialize(config, value);
        }
        if self.kind() == TypeKind::AbstractClass {
            return Err(DeserializeError::AbstractType {
                name: self.name().to_owned(),
            });
        }
        let Some(head) = value.as_object() else {
            return Err(DeserializeError::NotAnObject {
                found: value.kind_name(),
            });
        };

        let mut failure = None;
        config.iterate(head, |key, member_value| {
            if key == TYPE_MARKER {
                return match member_value.as_str() {
                    Some(found) if found == self.name() => true,
                    Some(found) => {
                        failure = Some(DeserializeError::TypeMarkerMismatch {
                            expected: self.name().to_owned(),
                            found: found.to_owned(),
                        });
                        false
                    }
                    None => {
                        failure = Some(DeserializeError::MarkerNotString);
                        false
                    }
                };
            }
            match self.deserialize_member(object, key, config, member_value) {
                Ok(()) => true,
                Err(error) => {
                    failure = Some(error);
                    false
                }
            }
        });
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn deserialize_member(
        &self,
        object: &mut dyn Reflected,
        key: &str,
        config: &Config,
        value: &ConfigValue,
    ) -> Result<(), DeserializeError> {
        let Some(class) = self.as_class() else {
            return Ok(());
        };
        if let Some(member) = class.members().iter().find(|m| m.name() == key) {
            return member
                .ty()
                .deserialize(member.get_mut(object), config, value)
                .map_err(|source| DeserializeError::Member {
                    member: key.to_owned(),
                    source: Box::new(source),
                });
        }
        if let Some(parent) = class.parent() {
            return parent
                .ty()
                .deserialize_member(parent.upcast_mut(object), key, config, value);
        }
        log::warn!(
            "member '{key}' not found in type '{}', ignoring",
            self.name()
        );
        Ok(())
    }

    /// Deep equality of two objects of this type. Short-circuits on the
    /// first difference.
    pub fn compare(&self, a: &dyn Reflected, b: &dyn Reflected) -> bool {
        let Some(class) = self.as_class() else {
            return a.reflect_eq(b);
        };
        if let Some(parent) = class.parent()
            && !parent.ty().compare(parent.upcast(a), parent.upcast(b))
        {
            return false;
        }
        class
            .members()
            .iter()
            .all(|m| m.ty().compare(m.get(a), m.get(b)))
    }

    /// Deep copy of `source` into `dest`, both of this type. Visits every
    /// member even after a failure and reports overall success.
    pub fn clone_object(&self, dest: &mut dyn Reflected, source: &dyn Reflected) -> bool {
        let Some(class) = self.as_class() else {
            return dest.clone_from_reflected(source);
        };
        let mut success = true;
        if let Some(parent) = class.parent() {
            success &= parent
                .ty()
                .clone_object(parent.upcast_mut(dest), parent.upcast(source));
        }
        for member in class.members() {
            success &= member
                .ty()
                .clone_object(member.get_mut(dest), member.get(source));
        }
        success
    }

    /// Mapping pass over `object`: interns member names, member type
    /// names, and whatever the member values themselves need.
    pub fn map_refs(
        &self,
        object: &dyn Reflected,
        context: &mut SerializationContext,
    ) -> Result<(), SerializeError> {
        let Some(class) = self.as_class() else {
            return object.map_refs(context);
        };
        if let Some(parent) = class.parent() {
            parent.ty().map_refs(parent.upcast(object), context)?;
        }
        for member in class.members() {
            context.map_string(member.name())?;
            context.map_string(member.ty().name())?;
            member.ty().map_refs(member.get(object), context)?;
        }
        Ok(())
    }

    /// Emits `object` in the binary format.
    ///
    /// Class payloads are self-describing: a member count, then one record
    /// per member of `(name index, type-name index, payload length,
    /// payload)`. The length framing is what lets a reader skip unknown
    /// members and capture mismatched ones.
    pub fn serialize_binary(
        &self,
        object: &dyn Reflected,
        out: &mut Vec<u8>,
        context: &mut SerializationContext,
    ) -> Result<(), SerializeError> {
        if self.as_class().is_none() {
            return object.serialize_binary(out, context);
        }
        if self.kind() == TypeKind::AbstractClass {
            return Err(SerializeError::AbstractType {
                name: self.name().to_owned(),
            });
        }
        write_uint(out, self.transitive_member_count() as u64);
        self.write_member_records(object, out, context)
    }

    fn write_member_records(
        &self,
        object: &dyn Reflected,
        out: &mut Vec<u8>,
        context: &mut SerializationContext,
    ) -> Result<(), SerializeError> {
        let Some(class) = self.as_class() else {
            return Ok(());
        };
        if let Some(parent) = class.parent() {
            parent
                .ty()
                .write_member_records(parent.upcast(object), out, context)?;
        }
        for member in class.members() {
            let name_index = context.map_string(member.name())?;
            let type_index = context.map_string(member.ty().name())?;
            let mut payload = Vec::new();
            member
                .ty()
                .serialize_binary(member.get(object), &mut payload, context)
                .map_err(|source| SerializeError::Member {
                    class: self.name().to_owned(),
                    member: member.name(),
                    source: Box::new(source),
                })?;
            write_uint(out, u64::from(name_index));
            write_uint(out, u64::from(type_index));
            write_uint(out, payload.len() as u64);
            out.extend_from_slice(&payload);
        }
        Ok(())
    }

    /// Decodes `object` from the binary format.
    ///
    /// Unknown stored members are skipped with a warning. A stored member
    /// whose type name differs from the runtime member type is not applied;
    /// its old value is decoded (when the stored type is still registered)
    /// and recorded on the context as a
    /// [`MemberTypeMismatch`](crate::reflect::MemberTypeMismatch).
    pub fn deserialize_binary(
        &self,
        object: &mut dyn Reflected,
        reader: &mut ByteReader<'_>,
        context: &mut SerializationContext,
    ) -> Result<(), DeserializeError> {
        if self.as_class().is_none() {
            return object.deserialize_binary(reader, context);
        }
        if self.kind() == TypeKind::AbstractClass {
            return Err(DeserializeError::AbstractType {
                name: self.name().to_owned(),
            });
        }

        let count = reader.read_len()?;
        for _ in 0..count {
            let name_index = read_index(reader)?;
            let type_index = read_index(reader)?;
            let payload_len = reader.read_len()?;
            let payload = reader.take(payload_len)?;
            let name = context.unmap_string(name_index)?.to_owned();
            let stored_type = context.unmap_string(type_index)?.to_owned();

            let Some((member, level)) = resolve_member_mut(self, object, &name) else {
                log::warn!(
                    "member '{name}' not present in type '{}', skipping",
                    self.name()
                );
                continue;
            };

            if member.ty().name() != stored_type {
                context.push_path_name(&name)?;
                let value = decode_mismatched_value(&stored_type, payload, context);
                let record = MemberTypeMismatch {
                    path: context.current_path().clone(),
                    stored_type,
                    value,
                };
                context.push_member_type_mismatch(record);
                context.pop_path();
                continue;
            }

            context.push_path_name(&name)?;
            let result = member.ty().deserialize_binary(
                member.get_mut(level),
                &mut ByteReader::new(payload),
                context,
            );
            context.pop_path();
            result.map_err(|source| DeserializeError::Member {
                member: name,
                source: Box::new(source),
            })?;
        }
        Ok(())
    }

    /// The member named `name`, searching this class and its ancestors.
    pub fn find_member(&self, name: &str) -> Option<&Member> {
        let class = self.as_class()?;
        class
            .members()
            .iter()
            .find(|m| m.name() == name)
            .or_else(|| class.parent().and_then(|p| p.ty().find_member(name)))
    }

    /// All members in serialization order: whole ancestor chain first.
    pub fn list_members(&self) -> Vec<&Member> {
        let mut out = Vec::new();
        self.collect_members(&mut out);
        out
    }

    fn collect_members<'a>(&'a self, out: &mut Vec<&'a Member>) {
        let Some(class) = self.as_class() else {
            return;
        };
        if let Some(parent) = class.parent() {
            parent.ty().collect_members(out);
        }
        out.extend(class.members().iter());
    }

    fn transitive_member_count(&self) -> usize {
        let Some(class) = self.as_class() else {
            return 0;
        };
        let inherited = class
            .parent()
            .map_or(0, |p| p.ty().transitive_member_count());
        inherited + class.members().len()
    }
}

fn read_index(reader: &mut ByteReader<'_>) -> Result<u32, DeserializeError> {
    let value = reader.read_uint()?;
    u32::try_from(value).map_err(|_| DeserializeError::Corrupted {
        reason: "string index overflows u32",
    })
}

/// Best effort at preserving a mismatched member's old value.
fn decode_mismatched_value(
    stored_type: &str,
    payload: &[u8],
    context: &mut SerializationContext,
) -> MismatchedValue {
    if let Some(ty) = TypeRegistry::find_by_name(stored_type)
        && let Some(mut object) = ty.try_create_object()
    {
        let mut reader = ByteReader::new(payload);
        if ty
            .deserialize_binary(object.as_mut(), &mut reader, context)
            .is_ok()
        {
            return MismatchedValue::Decoded(object);
        }
    }
    MismatchedValue::Raw(payload.into())
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::ConfigFormat;
    use crate::impl_class;
    use crate::reflect::path::MemberPath;
    use crate::reflect::reflected::Typed;
    use crate::reflect::type_desc::TypeInfo;

    #[derive(Default, Debug, PartialEq)]
    struct PlainVec2 {
        x: f32,
        y: f32,
    }
    impl_class!(PlainVec2 { members: [x, y] });

    #[derive(Default)]
    struct UnitStats {
        health: i32,
    }
    impl_class!(UnitStats { members: [health] });

    #[derive(Default)]
    struct ArmoredStats {
        stats: UnitStats,
        armor: i32,
    }
    impl_class!(ArmoredStats {
        parent: UnitStats via stats,
        members: [armor],
    });

    #[derive(Default)]
    struct HeroStats {
        armored: ArmoredStats,
        title: String,
    }
    impl_class!(HeroStats {
        parent: ArmoredStats via armored,
        members: [title],
    });

    #[derive(Default, Debug)]
    struct CanvasShape {
        sides: i32,
    }
    impl_class!(CanvasShape {
        kind: polymorphic,
        members: [sides],
    });

    #[derive(Default)]
    struct MediaSource {
        uri: String,
    }
    impl_class!(MediaSource {
        kind: abstract,
        members: [uri],
    });

    #[derive(Default)]
    struct FileMediaSource {
        source: MediaSource,
        offset: i64,
    }
    impl_class!(FileMediaSource {
        parent: MediaSource via source,
        members: [offset],
    });

    #[derive(Default)]
    struct StageSet {
        points: Vec<PlainVec2>,
    }
    impl_class!(StageSet { members: [points] });

    fn to_text(object: &dyn Reflected, format: ConfigFormat) -> String {
        let mut config = Config::new();
        let value = object.type_desc().serialize(object, &mut config).unwrap();
        assert!(config.set_root_value(&value));
        config.to_string(format)
    }

    fn from_text<T: Typed + Default>(text: &str) -> Result<T, DeserializeError> {
        let config = Config::parse(text).unwrap();
        let root = ConfigValue::Object(config.root());
        let mut out = T::default();
        T::static_type().deserialize(&mut out, &config, &root)?;
        Ok(out)
    }

    #[test]
    fn simple_class_config_round_trip() {
        let source = PlainVec2 { x: 1.0, y: 2.5 };
        let text = to_text(&source, ConfigFormat::Compact);
        assert_eq!(text, "x=1 y=2.5");

        let decoded: PlainVec2 = from_text(&text).unwrap();
        assert_eq!(decoded, source);
    }

    #[test]
    fn inherited_members_serialize_root_base_first() {
        let hero = HeroStats {
            armored: ArmoredStats {
                stats: UnitStats { health: 40 },
                armor: 7,
            },
            title: String::from("scout"),
        };
        let text = to_text(&hero, ConfigFormat::Compact);
        assert_eq!(text, "health=40 armor=7 title=\"scout\"");

        let decoded: HeroStats = from_text(&text).unwrap();
        assert!(hero.reflect_eq(&decoded));
    }

    #[test]
    fn deserialize_reaches_grandparent_members() {
        let decoded: HeroStats = from_text("health = 9 title = \"t\"").unwrap();
        assert_eq!(decoded.armored.stats.health, 9);
        assert_eq!(decoded.title, "t");
    }

    #[test]
    fn unknown_config_members_are_skipped() {
        let decoded: PlainVec2 = from_text("x = 3 ghost = 1 y = 4").unwrap();
        assert_eq!(decoded, PlainVec2 { x: 3.0, y: 4.0 });
    }

    #[test]
    fn polymorphic_class_writes_type_marker() {
        let shape = CanvasShape { sides: 6 };
        let text = to_text(&shape, ConfigFormat::Compact);
        assert_eq!(text, "__type=\"CanvasShape\" sides=6");

        let decoded: CanvasShape = from_text(&text).unwrap();
        assert_eq!(decoded.sides, 6);
    }

    #[test]
    fn type_marker_mismatch_fails() {
        let err = from_text::<CanvasShape>("__type = \"OtherShape\" sides = 3").unwrap_err();
        assert!(matches!(
            err,
            DeserializeError::TypeMarkerMismatch { expected, found }
                if expected == "CanvasShape" && found == "OtherShape"
        ));

        let err = from_text::<CanvasShape>("__type = 12").unwrap_err();
        assert!(matches!(err, DeserializeError::MarkerNotString));
    }

    #[test]
    fn abstract_class_refuses_both_directions() {
        let ty = MediaSource::static_type();
        assert!(!ty.is_constructible());

        let value = MediaSource::default();
        let mut config = Config::new();
        let err = ty.serialize(&value, &mut config).unwrap_err();
        assert!(matches!(err, SerializeError::AbstractType { .. }));

        let mut out = MediaSource::default();
        let root = ConfigValue::Object(None);
        let err = ty.deserialize(&mut out, &config, &root).unwrap_err();
        assert!(matches!(err, DeserializeError::AbstractType { .. }));
    }

    #[test]
    fn abstract_parent_members_still_serialize_through_derived() {
        let file = FileMediaSource {
            source: MediaSource {
                uri: String::from("a.bin"),
            },
            offset: 16,
        };
        let text = to_text(&file, ConfigFormat::Compact);
        assert_eq!(text, "uri=\"a.bin\" offset=16");
    }

    #[test]
    fn member_lookup_walks_ancestors() {
        let ty = HeroStats::static_type();
        let names: Vec<&str> = ty.list_members().iter().map(|m| m.name()).collect();
        assert_eq!(names, ["health", "armor", "title"]);

        assert_eq!(ty.find_member("health").unwrap().ty().name(), "i32");
        assert!(ty.find_member("absent").is_none());
    }

    #[test]
    fn is_a_and_subtypes() {
        // Touch the whole hierarchy so the child links exist.
        let base = UnitStats::static_type();
        let mid = ArmoredStats::static_type();
        let leaf = HeroStats::static_type();

        assert!(leaf.is_a(base));
        assert!(leaf.is_a(leaf));
        assert!(!base.is_a(leaf));
        assert!(!leaf.is_a(CanvasShape::static_type()));

        let contains = |types: &[&'static Type], ty: &'static Type| {
            types.iter().any(|t| core::ptr::eq(*t, ty))
        };
        let subtypes = base.list_subtypes(true);
        assert!(contains(&subtypes, base));
        assert!(contains(&subtypes, mid));
        assert!(contains(&subtypes, leaf));

        let concrete = MediaSource::static_type().list_subtypes(false);
        assert!(!contains(&concrete, MediaSource::static_type()));
        assert!(contains(&concrete, FileMediaSource::static_type()));
    }

    #[test]
    fn compare_and_clone_are_deep() {
        let ty = HeroStats::static_type();
        let a = HeroStats {
            armored: ArmoredStats {
                stats: UnitStats { health: 1 },
                armor: 2,
            },
            title: String::from("x"),
        };
        let mut b = HeroStats::default();
        assert!(!ty.compare(&a, &b));
        assert!(ty.clone_object(&mut b, &a));
        assert!(ty.compare(&a, &b));
        assert_eq!(b.armored.armor, 2);

        // Cross-type cloning is refused at the trait level.
        let mut other = PlainVec2::default();
        assert!(!other.clone_from_reflected(&a));
        assert!(!a.reflect_eq(&other));
    }

    #[test]
    fn resolve_path_walks_members_and_elements() {
        let set = StageSet {
            points: vec![
                PlainVec2 { x: 1.0, y: 2.0 },
                PlainVec2 { x: 3.0, y: 4.0 },
            ],
        };
        let ty = StageSet::static_type();

        let mut path = MemberPath::from_name("points");
        path.push_index(1).unwrap();
        path.push_name("y").unwrap();
        let leaf = ty.resolve_path(&set, &path).unwrap();
        assert_eq!(leaf.as_any().downcast_ref::<f32>(), Some(&4.0));

        let mut missing = MemberPath::from_name("points");
        missing.push_index(5).unwrap();
        assert!(ty.resolve_path(&set, &missing).is_none());

        assert!(
            ty.resolve_path(&set, &MemberPath::new())
                .unwrap()
                .as_any()
                .is::<StageSet>()
        );
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "flagged non-null")]
    fn non_null_members_validated_against_default() {
        fn get(object: &dyn Reflected) -> &dyn Reflected {
            object
        }
        fn get_mut(object: &mut dyn Reflected) -> &mut dyn Reflected {
            object
        }
        let member = Member::new(
            "target",
            TypeRegistry::of::<Option<Box<String>>>(),
            get,
            get_mut,
        )
        .with_flags(MemberFlags::NON_NULL);

        // Never registered, only initialized, so the name cannot clash.
        let info = TypeInfo {
            name: Cow::Borrowed("NullLinkHolder"),
            kind: TypeKind::SimpleClass,
            size: size_of::<Option<Box<String>>>(),
            alignment: align_of::<Option<Box<String>>>(),
            construct: Some(|| Box::new(None::<Box<String>>) as Box<dyn Reflected>),
            can_be_memcopied: false,
            class: Some(ClassTypeInfo {
                parent: None,
                members: vec![member],
            }),
        };
        let _ = Type::initialize(info);
    }
}

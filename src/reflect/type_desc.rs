use std::borrow::Cow;

use crate::reflect::class::{ClassType, ClassTypeInfo, resolve_member};
use crate::reflect::kind::TypeKind;
use crate::reflect::path::{MemberPath, PathStep};
use crate::reflect::reflected::Reflected;

// -----------------------------------------------------------------------------
// TypeInfo

/// Everything needed to register a [`Type`].
///
/// Normally produced by [`Typed::type_info`](crate::reflect::Typed::type_info)
/// implementations, hand-written only for custom registrations.
pub struct TypeInfo {
    pub name: Cow<'static, str>,
    pub kind: TypeKind,
    /// Size of a value in bytes. Must be non-zero and fit in `u32`.
    pub size: usize,
    /// Alignment of a value in bytes. Must be non-zero and fit in `u32`.
    pub alignment: usize,
    /// Creates a default-initialized boxed value. `None` makes the type
    /// non-constructible (abstract classes).
    pub construct: Option<fn() -> Box<dyn Reflected>>,
    /// Whether a value is plain bytes with no owned resources.
    pub can_be_memcopied: bool,
    /// Class metadata. Required for class kinds, forbidden otherwise.
    pub class: Option<ClassTypeInfo>,
}

// -----------------------------------------------------------------------------
// Type

/// Interned description of a registered type.
///
/// Instances live for the whole program and are compared by address; two
/// `&'static Type` are the same type exactly when the references are equal.
pub struct Type {
    name: Cow<'static, str>,
    kind: TypeKind,
    size: u32,
    alignment: u32,
    construct: Option<fn() -> Box<dyn Reflected>>,
    can_be_memcopied: bool,
    default_instance: Option<Box<dyn Reflected>>,
    class: Option<ClassType>,
}

impl Type {
    /// Builds a type from its registration info.
    ///
    /// # Panics
    ///
    /// Panics on a malformed description: empty name, zero or
    /// `u32`-overflowing size or alignment, class metadata missing for a
    /// class kind (or present for a non-class kind), or a parent that is
    /// not itself a class. With debug assertions, also validates member
    /// names and that members flagged non-null are non-null in the default
    /// instance.
    pub fn initialize(info: TypeInfo) -> Type {
        assert!(!info.name.is_empty(), "type name must not be empty");
        assert!(
            info.size > 0 && info.size <= u32::MAX as usize,
            "type `{}` has invalid size {}",
            info.name,
            info.size
        );
        assert!(
            info.alignment > 0 && info.alignment <= u32::MAX as usize,
            "type `{}` has invalid alignment {}",
            info.name,
            info.alignment
        );
        assert!(
            info.kind.is_class() == info.class.is_some(),
            "type `{}`: class metadata does not match kind {}",
            info.name,
            info.kind
        );

        let class = info.class.map(|class_info| {
            if let Some(parent) = &class_info.parent {
                assert!(
                    parent.ty().kind().is_class(),
                    "type `{}`: parent `{}` is not a class",
                    info.name,
                    parent.ty().name()
                );
            }
            ClassType::from_info(class_info)
        });

        let default_instance = info.construct.map(|construct| construct());

        let ty = Type {
            name: info.name,
            kind: info.kind,
            size: info.size as u32,
            alignment: info.alignment as u32,
            construct: info.construct,
            can_be_memcopied: info.can_be_memcopied,
            default_instance,
            class,
        };

        #[cfg(debug_assertions)]
        ty.validate_members();

        ty
    }

    #[cfg(debug_assertions)]
    fn validate_members(&self) {
        let Some(class) = &self.class else {
            return;
        };
        for (i, member) in class.members().iter().enumerate() {
            assert!(
                !member.name().is_empty(),
                "type `{}`: member name must not be empty",
                self.name
            );
            assert!(
                member.name() != crate::reflect::class::TYPE_MARKER,
                "type `{}`: member name `{}` is reserved",
                self.name,
                member.name()
            );
            for other in &class.members()[..i] {
                assert!(
                    other.name() != member.name(),
                    "type `{}`: duplicate member `{}`",
                    self.name,
                    member.name()
                );
            }
        }
        if let Some(default) = &self.default_instance {
            for member in class.members() {
                if member.flags().contains(crate::reflect::class::MemberFlags::NON_NULL) {
                    assert!(
                        !member.get(default.as_ref()).is_null(),
                        "type `{}`: member `{}` is flagged non-null but defaults to null",
                        self.name,
                        member.name()
                    );
                }
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn alignment(&self) -> u32 {
        self.alignment
    }

    pub fn can_be_memcopied(&self) -> bool {
        self.can_be_memcopied
    }

    pub fn is_constructible(&self) -> bool {
        self.construct.is_some()
    }

    /// Class metadata, for class kinds.
    pub fn as_class(&self) -> Option<&ClassType> {
        self.class.as_ref()
    }

    /// The eagerly constructed default value, absent for non-constructible
    /// types.
    pub fn default_instance(&self) -> Option<&dyn Reflected> {
        self.default_instance.as_deref()
    }

    /// Creates a default-initialized value.
    ///
    /// # Panics
    ///
    /// Panics when the type is not constructible. Use
    /// [`try_create_object`](Self::try_create_object) for data-driven
    /// construction.
    pub fn create_object(&self) -> Box<dyn Reflected> {
        match self.try_create_object() {
            Some(object) => object,
            None => panic!("type `{}` is not constructible", self.name),
        }
    }

    pub fn try_create_object(&self) -> Option<Box<dyn Reflected>> {
        self.construct.map(|construct| construct())
    }

    /// Whether this type is `other` or transitively derives from it.
    pub fn is_a(&self, other: &Type) -> bool {
        let mut current = self;
        loop {
            if core::ptr::eq(current, other) {
                return true;
            }
            match current.class.as_ref().and_then(|c| c.parent()) {
                Some(parent) => current = parent.ty(),
                None => return false,
            }
        }
    }

    /// All types registered so far that derive from this one, this type
    /// included. `include_abstract` keeps non-constructible classes in.
    pub fn list_subtypes(&'static self, include_abstract: bool) -> Vec<&'static Type> {
        let mut out = Vec::new();
        self.collect_subtypes(include_abstract, &mut out);
        out
    }

    fn collect_subtypes(&'static self, include_abstract: bool, out: &mut Vec<&'static Type>) {
        if include_abstract || self.kind != TypeKind::AbstractClass {
            out.push(self);
        }
        if let Some(class) = &self.class {
            for child in class.children().iter() {
                child.collect_subtypes(include_abstract, out);
            }
        }
    }

    /// Follows `path` from `object` down to a leaf value. `None` when any
    /// step does not resolve.
    ///
    /// An empty path yields `object` itself; name steps walk class members
    /// (inherited ones included), index steps walk array elements.
    pub fn resolve_path<'a>(
        &self,
        object: &'a dyn Reflected,
        path: &MemberPath,
    ) -> Option<&'a dyn Reflected> {
        let mut current: &'a dyn Reflected = object;
        for step in path.steps() {
            match step {
                PathStep::Name(name) => {
                    let ty = current.type_desc();
                    let (member, level) = resolve_member(ty, current, name)?;
                    current = member.get(level);
                }
                PathStep::Index(index) => {
                    current = current.element(*index as usize)?;
                }
            }
        }
        Some(current)
    }
}

impl core::fmt::Debug for Type {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Type")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("size", &self.size)
            .field("alignment", &self.alignment)
            .finish_non_exhaustive()
    }
}

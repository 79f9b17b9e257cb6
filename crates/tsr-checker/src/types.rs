//! Semantic types: interned, structurally hash-consed variants.
//!
//! Types are immutable values stored once in a `TypeTable` and addressed
//! by `TypeId`; structural equality is id equality for everything except
//! class/interface/enum types, which are nominal identities under their
//! declaring module (two same-named classes in different modules are
//! distinct definitions, hence distinct ids).
//!
//! Normalization happens at construction:
//! - unions flatten nested unions and deduplicate element-wise;
//! - `promise<promise<T>>` collapses to `promise<T>`;
//! - single-element unions collapse to the element.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

/// Handle to an interned type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to a class definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassDefId(pub u32);

/// Handle to an interface definition (post-merging).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceDefId(pub u32);

/// Handle to an enum definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumDefId(pub u32);

/// Handle to a type parameter definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeParamId(pub u32);

/// A property of a record/interface/class instance shape.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PropInfo {
    pub ty: TypeId,
    pub optional: bool,
    pub readonly: bool,
}

/// Function/method parameter.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParamInfo {
    pub name: Box<str>,
    pub ty: TypeId,
    pub optional: bool,
}

/// A function type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub type_params: Vec<TypeParamId>,
    pub params: Vec<ParamInfo>,
    pub rest: Option<TypeId>,
    pub return_ty: TypeId,
    /// Parameters required at a call site (non-optional, no default).
    pub min_args: usize,
    /// `Some` when the return type is a predicate `param is T`.
    pub predicate: Option<(Box<str>, TypeId)>,
}

/// An anonymous record type (object literal shape or type literal).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecordType {
    /// Insertion-ordered member table.
    pub props: Vec<(Box<str>, PropInfo)>,
    pub string_index: Option<TypeId>,
    pub number_index: Option<TypeId>,
}

impl RecordType {
    pub fn prop(&self, name: &str) -> Option<&PropInfo> {
        self.props.iter().find(|(n, _)| &**n == name).map(|(_, p)| p)
    }
}

/// Deferred mapped type `{ [K in C as R]?: V }`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MappedType {
    pub param: TypeParamId,
    pub constraint: TypeId,
    pub value: TypeId,
    /// `Some(true)` adds `?`, `Some(false)` removes it.
    pub optional: Option<bool>,
    pub as_clause: Option<TypeId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Any,
    Unknown,
    Never,
    Void,
    Number,
    String,
    Boolean,
    Null,
    Undefined,
    Symbol,
    /// Numeric literal type; f64 bits for hashing.
    NumberLit(u64),
    StringLit(Box<str>),
    BoolLit(bool),
    Array(TypeId),
    Tuple {
        elements: Vec<TypeId>,
        /// Elements at index >= required are optional.
        required: usize,
        rest: Option<TypeId>,
    },
    /// Flattened, deduplicated, id-sorted members.
    Union(Vec<TypeId>),
    Intersection(Vec<TypeId>),
    Record(RecordType),
    /// Nominal interface reference, optionally instantiated.
    Interface(InterfaceDefId, Vec<TypeId>),
    /// The constructor-side type of a class.
    Class(ClassDefId),
    /// Instance-side type of a class, optionally instantiated.
    Instance(ClassDefId, Vec<TypeId>),
    Function(FunctionType),
    Promise(TypeId),
    Generator(TypeId),
    Enum(EnumDefId),
    /// Reference to an in-scope type parameter.
    Param(TypeParamId),
    /// `keyof T`, deferred while `T` mentions type parameters.
    Keyof(TypeId),
    /// Deferred mapped type.
    Mapped(MappedType),
    /// `T[K]`, deferred while either side mentions type parameters.
    IndexedAccess(TypeId, TypeId),
    /// `Uppercase<S>` and friends, deferred while `S` is not a literal.
    StringIntrinsic(StringIntrinsicKind, TypeId),
}

/// The built-in string-manipulation type operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StringIntrinsicKind {
    Uppercase,
    Lowercase,
    Capitalize,
    Uncapitalize,
}

/// A class definition: name, heritage, and member shapes.
#[derive(Clone, Debug, Default)]
pub struct ClassDef {
    pub name: String,
    pub module: String,
    pub type_params: Vec<TypeParamId>,
    /// Superclass instance type (possibly instantiated), if any.
    pub superclass: Option<TypeId>,
    pub implements: Vec<TypeId>,
    pub instance_props: IndexMap<String, PropInfo>,
    pub instance_methods: IndexMap<String, TypeId>,
    pub getters: IndexMap<String, TypeId>,
    pub setters: IndexMap<String, TypeId>,
    pub static_props: IndexMap<String, PropInfo>,
    pub static_methods: IndexMap<String, TypeId>,
    /// Constructor signature, as a function type.
    pub ctor: Option<TypeId>,
    pub is_abstract: bool,
    pub abstract_members: Vec<String>,
    /// Member name → declared private/protected.
    pub private_members: Vec<String>,
    pub protected_members: Vec<String>,
    pub readonly_fields: Vec<String>,
}

/// An interface definition; declarations in one module merge additively.
#[derive(Clone, Debug, Default)]
pub struct InterfaceDef {
    pub name: String,
    pub module: String,
    pub type_params: Vec<TypeParamId>,
    pub extends: Vec<TypeId>,
    pub props: IndexMap<String, PropInfo>,
    pub string_index: Option<TypeId>,
    pub number_index: Option<TypeId>,
}

#[derive(Clone, Debug, Default)]
pub struct EnumDef {
    pub name: String,
    pub module: String,
    /// Member name → literal type of its value.
    pub members: IndexMap<String, TypeId>,
}

#[derive(Clone, Debug)]
pub struct TypeParamDef {
    pub name: String,
    pub constraint: Option<TypeId>,
    pub default: Option<TypeId>,
}

/// The interner and definition tables.
#[derive(Debug, Default)]
pub struct TypeTable {
    kinds: Vec<TypeKind>,
    intern: FxHashMap<TypeKind, TypeId>,
    pub classes: Vec<ClassDef>,
    pub interfaces: Vec<InterfaceDef>,
    pub enums: Vec<EnumDef>,
    pub type_params: Vec<TypeParamDef>,
}

impl TypeTable {
    pub fn new() -> Self {
        TypeTable::default()
    }

    /// Intern a type kind, normalizing at construction.
    pub fn intern(&mut self, kind: TypeKind) -> TypeId {
        let kind = match kind {
            TypeKind::Union(members) => return self.union(members),
            TypeKind::Promise(inner) => TypeKind::Promise(self.unwrap_promise(inner)),
            other => other,
        };
        self.intern_raw(kind)
    }

    fn intern_raw(&mut self, kind: TypeKind) -> TypeId {
        if let Some(&id) = self.intern.get(&kind) {
            return id;
        }
        let id = TypeId(self.kinds.len() as u32);
        self.kinds.push(kind.clone());
        self.intern.insert(kind, id);
        id
    }

    #[inline]
    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.kinds[id.index()]
    }

    // =========================================================================
    // Primitive accessors
    // =========================================================================

    pub fn any(&mut self) -> TypeId {
        self.intern_raw(TypeKind::Any)
    }
    pub fn unknown(&mut self) -> TypeId {
        self.intern_raw(TypeKind::Unknown)
    }
    pub fn never(&mut self) -> TypeId {
        self.intern_raw(TypeKind::Never)
    }
    pub fn void(&mut self) -> TypeId {
        self.intern_raw(TypeKind::Void)
    }
    pub fn number(&mut self) -> TypeId {
        self.intern_raw(TypeKind::Number)
    }
    pub fn string(&mut self) -> TypeId {
        self.intern_raw(TypeKind::String)
    }
    pub fn boolean(&mut self) -> TypeId {
        self.intern_raw(TypeKind::Boolean)
    }
    pub fn null(&mut self) -> TypeId {
        self.intern_raw(TypeKind::Null)
    }
    pub fn undefined(&mut self) -> TypeId {
        self.intern_raw(TypeKind::Undefined)
    }
    pub fn symbol(&mut self) -> TypeId {
        self.intern_raw(TypeKind::Symbol)
    }

    pub fn number_lit(&mut self, value: f64) -> TypeId {
        self.intern_raw(TypeKind::NumberLit(value.to_bits()))
    }

    pub fn string_lit(&mut self, value: &str) -> TypeId {
        self.intern_raw(TypeKind::StringLit(value.into()))
    }

    pub fn bool_lit(&mut self, value: bool) -> TypeId {
        self.intern_raw(TypeKind::BoolLit(value))
    }

    pub fn array(&mut self, element: TypeId) -> TypeId {
        self.intern_raw(TypeKind::Array(element))
    }

    /// Promise construction never nests: `promise<promise<T>>` is
    /// `promise<T>`.
    pub fn promise(&mut self, inner: TypeId) -> TypeId {
        let inner = self.unwrap_promise(inner);
        self.intern_raw(TypeKind::Promise(inner))
    }

    fn unwrap_promise(&self, mut inner: TypeId) -> TypeId {
        while let TypeKind::Promise(next) = self.kind(inner) {
            inner = *next;
        }
        inner
    }

    pub fn generator(&mut self, yield_ty: TypeId) -> TypeId {
        self.intern_raw(TypeKind::Generator(yield_ty))
    }

    /// Construct a union: flatten nested unions, drop `never`,
    /// deduplicate, collapse singletons. `any` absorbs everything.
    pub fn union(&mut self, members: Vec<TypeId>) -> TypeId {
        let mut flat = Vec::new();
        let mut stack: Vec<TypeId> = members;
        stack.reverse();
        while let Some(id) = stack.pop() {
            match self.kind(id) {
                TypeKind::Union(inner) => {
                    for &m in inner.iter().rev() {
                        stack.push(m);
                    }
                }
                TypeKind::Never => {}
                TypeKind::Any => return self.any(),
                _ => flat.push(id),
            }
        }
        flat.sort();
        flat.dedup();
        match flat.len() {
            0 => self.never(),
            1 => flat[0],
            _ => self.intern_raw(TypeKind::Union(flat)),
        }
    }

    pub fn intersection(&mut self, members: Vec<TypeId>) -> TypeId {
        let mut flat = Vec::new();
        for id in members {
            match self.kind(id) {
                TypeKind::Intersection(inner) => flat.extend(inner.iter().copied()),
                TypeKind::Never => return self.never(),
                _ => flat.push(id),
            }
        }
        flat.sort();
        flat.dedup();
        match flat.len() {
            0 => self.unknown(),
            1 => flat[0],
            _ => self.intern_raw(TypeKind::Intersection(flat)),
        }
    }

    // =========================================================================
    // Definitions
    // =========================================================================

    pub fn add_class(&mut self, def: ClassDef) -> ClassDefId {
        let id = ClassDefId(self.classes.len() as u32);
        self.classes.push(def);
        id
    }

    pub fn class_def(&self, id: ClassDefId) -> &ClassDef {
        &self.classes[id.0 as usize]
    }

    pub fn class_def_mut(&mut self, id: ClassDefId) -> &mut ClassDef {
        &mut self.classes[id.0 as usize]
    }

    pub fn add_interface(&mut self, def: InterfaceDef) -> InterfaceDefId {
        let id = InterfaceDefId(self.interfaces.len() as u32);
        self.interfaces.push(def);
        id
    }

    pub fn interface_def(&self, id: InterfaceDefId) -> &InterfaceDef {
        &self.interfaces[id.0 as usize]
    }

    pub fn interface_def_mut(&mut self, id: InterfaceDefId) -> &mut InterfaceDef {
        &mut self.interfaces[id.0 as usize]
    }

    pub fn add_enum(&mut self, def: EnumDef) -> EnumDefId {
        let id = EnumDefId(self.enums.len() as u32);
        self.enums.push(def);
        id
    }

    pub fn enum_def(&self, id: EnumDefId) -> &EnumDef {
        &self.enums[id.0 as usize]
    }

    pub fn add_type_param(&mut self, def: TypeParamDef) -> TypeParamId {
        let id = TypeParamId(self.type_params.len() as u32);
        self.type_params.push(def);
        id
    }

    pub fn type_param_def(&self, id: TypeParamId) -> &TypeParamDef {
        &self.type_params[id.0 as usize]
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Whether a type (transitively) mentions any type parameter, which
    /// keeps keyof/mapped/indexed types deferred.
    pub fn mentions_params(&self, id: TypeId) -> bool {
        match self.kind(id) {
            TypeKind::Param(_) => true,
            TypeKind::Array(t) | TypeKind::Promise(t) | TypeKind::Generator(t)
            | TypeKind::Keyof(t) => self.mentions_params(*t),
            TypeKind::Tuple { elements, rest, .. } => {
                elements.iter().any(|&t| self.mentions_params(t))
                    || rest.is_some_and(|t| self.mentions_params(t))
            }
            TypeKind::Union(members) | TypeKind::Intersection(members) => {
                members.iter().any(|&t| self.mentions_params(t))
            }
            TypeKind::Record(record) => {
                record.props.iter().any(|(_, p)| self.mentions_params(p.ty))
                    || record.string_index.is_some_and(|t| self.mentions_params(t))
                    || record.number_index.is_some_and(|t| self.mentions_params(t))
            }
            TypeKind::Function(f) => {
                f.params.iter().any(|p| self.mentions_params(p.ty))
                    || f.rest.is_some_and(|t| self.mentions_params(t))
                    || self.mentions_params(f.return_ty)
            }
            TypeKind::Interface(_, args) | TypeKind::Instance(_, args) => {
                args.iter().any(|&t| self.mentions_params(t))
            }
            TypeKind::Mapped(m) => {
                self.mentions_params(m.constraint)
            }
            TypeKind::IndexedAccess(obj, index) => {
                self.mentions_params(*obj) || self.mentions_params(*index)
            }
            TypeKind::StringIntrinsic(_, t) => self.mentions_params(*t),
            _ => false,
        }
    }

    /// Widen a literal type to its primitive.
    pub fn widen(&mut self, id: TypeId) -> TypeId {
        match self.kind(id).clone() {
            TypeKind::NumberLit(_) => self.number(),
            TypeKind::StringLit(_) => self.string(),
            TypeKind::BoolLit(_) => self.boolean(),
            TypeKind::Union(members) => {
                let widened: Vec<TypeId> = members.iter().map(|&m| self.widen(m)).collect();
                self.union(widened)
            }
            _ => id,
        }
    }

    // =========================================================================
    // Display
    // =========================================================================

    /// Human-readable form for diagnostics.
    pub fn display(&self, id: TypeId) -> String {
        match self.kind(id) {
            TypeKind::Any => "any".into(),
            TypeKind::Unknown => "unknown".into(),
            TypeKind::Never => "never".into(),
            TypeKind::Void => "void".into(),
            TypeKind::Number => "number".into(),
            TypeKind::String => "string".into(),
            TypeKind::Boolean => "boolean".into(),
            TypeKind::Null => "null".into(),
            TypeKind::Undefined => "undefined".into(),
            TypeKind::Symbol => "symbol".into(),
            TypeKind::NumberLit(bits) => {
                let n = f64::from_bits(*bits);
                if n.fract() == 0.0 && n.is_finite() {
                    format!("{}", n as i64)
                } else {
                    format!("{n}")
                }
            }
            TypeKind::StringLit(s) => format!("\"{s}\""),
            TypeKind::BoolLit(b) => format!("{b}"),
            TypeKind::Array(t) => format!("{}[]", self.display_nested(*t)),
            TypeKind::Tuple { elements, required, rest } => {
                let mut parts: Vec<String> = elements
                    .iter()
                    .enumerate()
                    .map(|(i, &t)| {
                        if i >= *required {
                            format!("{}?", self.display(t))
                        } else {
                            self.display(t)
                        }
                    })
                    .collect();
                if let Some(rest) = rest {
                    parts.push(format!("...{}[]", self.display_nested(*rest)));
                }
                format!("[{}]", parts.join(", "))
            }
            TypeKind::Union(members) => members
                .iter()
                .map(|&m| self.display_nested(m))
                .collect::<Vec<_>>()
                .join(" | "),
            TypeKind::Intersection(members) => members
                .iter()
                .map(|&m| self.display_nested(m))
                .collect::<Vec<_>>()
                .join(" & "),
            TypeKind::Record(record) => {
                let mut parts: Vec<String> = record
                    .props
                    .iter()
                    .map(|(name, p)| {
                        format!(
                            "{name}{}: {}",
                            if p.optional { "?" } else { "" },
                            self.display(p.ty)
                        )
                    })
                    .collect();
                if let Some(t) = record.string_index {
                    parts.push(format!("[key: string]: {}", self.display(t)));
                }
                if let Some(t) = record.number_index {
                    parts.push(format!("[key: number]: {}", self.display(t)));
                }
                format!("{{ {} }}", parts.join("; "))
            }
            TypeKind::Interface(def, args) => {
                self.display_named(&self.interface_def(*def).name, args)
            }
            TypeKind::Class(def) => format!("typeof {}", self.class_def(*def).name),
            TypeKind::Instance(def, args) => {
                self.display_named(&self.class_def(*def).name, args)
            }
            TypeKind::Function(f) => {
                let params: Vec<String> = f
                    .params
                    .iter()
                    .map(|p| {
                        format!(
                            "{}{}: {}",
                            p.name,
                            if p.optional { "?" } else { "" },
                            self.display(p.ty)
                        )
                    })
                    .collect();
                format!("({}) => {}", params.join(", "), self.display(f.return_ty))
            }
            TypeKind::Promise(t) => format!("Promise<{}>", self.display(*t)),
            TypeKind::Generator(t) => format!("Generator<{}>", self.display(*t)),
            TypeKind::Enum(def) => self.enum_def(*def).name.clone(),
            TypeKind::Param(p) => self.type_param_def(*p).name.clone(),
            TypeKind::Keyof(t) => format!("keyof {}", self.display_nested(*t)),
            TypeKind::Mapped(m) => format!(
                "{{ [{} in {}]: {} }}",
                self.type_param_def(m.param).name,
                self.display(m.constraint),
                self.display(m.value)
            ),
            TypeKind::IndexedAccess(obj, index) => {
                format!("{}[{}]", self.display_nested(*obj), self.display(*index))
            }
            TypeKind::StringIntrinsic(kind, t) => {
                let name = match kind {
                    StringIntrinsicKind::Uppercase => "Uppercase",
                    StringIntrinsicKind::Lowercase => "Lowercase",
                    StringIntrinsicKind::Capitalize => "Capitalize",
                    StringIntrinsicKind::Uncapitalize => "Uncapitalize",
                };
                format!("{name}<{}>", self.display(*t))
            }
        }
    }

    fn display_nested(&self, id: TypeId) -> String {
        match self.kind(id) {
            TypeKind::Union(_) | TypeKind::Intersection(_) | TypeKind::Function(_) => {
                format!("({})", self.display(id))
            }
            _ => self.display(id),
        }
    }

    fn display_named(&self, name: &str, args: &[TypeId]) -> String {
        if args.is_empty() {
            name.to_string()
        } else {
            let args: Vec<String> = args.iter().map(|&a| self.display(a)).collect();
            format!("{name}<{}>", args.join(", "))
        }
    }
}

#[cfg(test)]
#[path = "tests/types_tests.rs"]
mod tests;

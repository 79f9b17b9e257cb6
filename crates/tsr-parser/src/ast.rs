//! Algebraic AST definitions.
//!
//! All nodes are stored in typed arena vectors and addressed by `u32`
//! newtype ids. Every node carries its source span. The tree is built
//! once by the parser and read-only thereafter; the checker keys its
//! type table on these ids.

use bitflags::bitflags;
use serde::Serialize;
use tsr_common::Span;

// =============================================================================
// Ids
// =============================================================================

macro_rules! arena_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

arena_id!(
    /// Handle to an expression node.
    ExprId
);
arena_id!(
    /// Handle to a statement node.
    StmtId
);
arena_id!(
    /// Handle to a type-annotation node.
    TypeNodeId
);
arena_id!(
    /// Handle to a function definition (declaration, expression, arrow,
    /// or method body).
    FuncId
);
arena_id!(
    /// Handle to a class definition.
    ClassId
);
arena_id!(
    /// Handle to an interface definition.
    InterfaceId
);

// =============================================================================
// Expressions
// =============================================================================

#[derive(Clone, Debug, Serialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
    BitNot,
    Typeof,
    Void,
    Delete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Exp,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,
    Lt,
    Gt,
    Le,
    Ge,
    LooseEq,
    LooseNe,
    StrictEq,
    StrictNe,
    In,
    InstanceOf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

/// Assignment operator: `=` or a compound form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Exp,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
    Nullish,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

/// Property key in object literals, class members, and interface members.
#[derive(Clone, Debug, Serialize)]
pub enum PropKey {
    Ident(Box<str>),
    String(Box<str>),
    Number(f64),
    Computed(ExprId),
}

impl PropKey {
    /// Static name, when the key is not computed.
    pub fn static_name(&self) -> Option<String> {
        match self {
            PropKey::Ident(s) | PropKey::String(s) => Some(s.to_string()),
            PropKey::Number(n) => Some(crate::ast::format_number_key(*n)),
            PropKey::Computed(_) => None,
        }
    }
}

/// Format a numeric property key the way the runtime does.
pub fn format_number_key(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[derive(Clone, Debug, Serialize)]
pub enum ObjectPropKind {
    /// `{ x }`
    Shorthand,
    /// `{ key: value }`
    KeyValue(ExprId),
    /// `{ m() {} }`
    Method(FuncId),
    /// `{ get x() {} }`
    Getter(FuncId),
    /// `{ set x(v) {} }`
    Setter(FuncId),
    /// `{ ...expr }`
    Spread(ExprId),
}

#[derive(Clone, Debug, Serialize)]
pub struct ObjectProp {
    pub key: PropKey,
    pub kind: ObjectPropKind,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize)]
pub enum ExprKind {
    NullLit,
    UndefinedLit,
    BoolLit(bool),
    NumberLit(f64),
    StringLit(Box<str>),
    BigIntLit(Box<str>),
    /// Template literal: `quasis.len() == exprs.len() + 1`.
    Template {
        quasis: Vec<Box<str>>,
        exprs: Vec<ExprId>,
    },
    Ident(Box<str>),
    This,
    Super,
    Unary {
        op: UnaryOp,
        operand: ExprId,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        target: ExprId,
    },
    Binary {
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
    },
    Logical {
        op: LogicalOp,
        left: ExprId,
        right: ExprId,
    },
    Conditional {
        cond: ExprId,
        when_true: ExprId,
        when_false: ExprId,
    },
    Assign {
        op: AssignOp,
        target: ExprId,
        value: ExprId,
    },
    /// Dot access: `object.property`.
    Member {
        object: ExprId,
        property: Box<str>,
    },
    /// Bracket access: `object[index]`.
    Index {
        object: ExprId,
        index: ExprId,
    },
    Call {
        callee: ExprId,
        type_args: Vec<TypeNodeId>,
        args: Vec<ExprId>,
    },
    New {
        callee: ExprId,
        type_args: Vec<TypeNodeId>,
        args: Vec<ExprId>,
    },
    ObjectLit {
        props: Vec<ObjectProp>,
    },
    ArrayLit {
        elements: Vec<ExprId>,
    },
    Arrow(FuncId),
    Function(FuncId),
    Yield {
        arg: Option<ExprId>,
        delegate: bool,
    },
    Await(ExprId),
    Spread(ExprId),
    /// `expr as T` or `<T>expr`.
    Assertion {
        expr: ExprId,
        ty: TypeNodeId,
    },
}

// =============================================================================
// Functions and parameters
// =============================================================================

bitflags! {
    /// Member and parameter modifiers.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
    pub struct Modifiers: u16 {
        const PUBLIC = 1 << 0;
        const PRIVATE = 1 << 1;
        const PROTECTED = 1 << 2;
        const STATIC = 1 << 3;
        const READONLY = 1 << 4;
        const ABSTRACT = 1 << 5;
        const OVERRIDE = 1 << 6;
        const ASYNC = 1 << 7;
        const DECLARE = 1 << 8;
    }
}

impl Modifiers {
    /// True if any of public/private/protected is present (parameter
    /// properties in constructors).
    pub fn has_access_modifier(self) -> bool {
        self.intersects(Modifiers::PUBLIC | Modifiers::PRIVATE | Modifiers::PROTECTED)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Param {
    pub name: Box<str>,
    pub ty: Option<TypeNodeId>,
    pub optional: bool,
    pub default: Option<ExprId>,
    pub rest: bool,
    /// Access/readonly modifiers make a constructor parameter a
    /// parameter property.
    pub modifiers: Modifiers,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize)]
pub enum FuncBody {
    Block(Vec<StmtId>),
    /// Arrow with expression body.
    Expr(ExprId),
}

#[derive(Clone, Debug, Serialize)]
pub struct TypeParam {
    pub name: Box<str>,
    pub constraint: Option<TypeNodeId>,
    pub default: Option<TypeNodeId>,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize)]
pub struct Function {
    pub name: Option<Box<str>>,
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    pub return_type: Option<TypeNodeId>,
    /// `None` for abstract methods and interface signatures.
    pub body: Option<FuncBody>,
    pub is_async: bool,
    pub is_generator: bool,
    pub is_arrow: bool,
    pub span: Span,
}

// =============================================================================
// Classes and interfaces
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum MethodKind {
    Method,
    Getter,
    Setter,
    Constructor,
}

#[derive(Clone, Debug, Serialize)]
pub enum ClassMemberKind {
    Field {
        key: PropKey,
        ty: Option<TypeNodeId>,
        init: Option<ExprId>,
    },
    Method {
        key: PropKey,
        kind: MethodKind,
        func: FuncId,
    },
    IndexSignature {
        param_name: Box<str>,
        key_ty: TypeNodeId,
        value_ty: TypeNodeId,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct ClassMember {
    pub kind: ClassMemberKind,
    pub modifiers: Modifiers,
    pub decorators: Vec<ExprId>,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize)]
pub struct Class {
    pub name: Box<str>,
    pub type_params: Vec<TypeParam>,
    pub superclass: Option<ExprId>,
    pub super_type_args: Vec<TypeNodeId>,
    pub implements: Vec<TypeNodeId>,
    pub members: Vec<ClassMember>,
    pub is_abstract: bool,
    pub decorators: Vec<ExprId>,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize)]
pub enum InterfaceMember {
    Property {
        name: Box<str>,
        ty: TypeNodeId,
        optional: bool,
        readonly: bool,
        span: Span,
    },
    IndexSignature {
        param_name: Box<str>,
        key_ty: TypeNodeId,
        value_ty: TypeNodeId,
        span: Span,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct Interface {
    pub name: Box<str>,
    pub type_params: Vec<TypeParam>,
    pub extends: Vec<TypeNodeId>,
    pub members: Vec<InterfaceMember>,
    pub span: Span,
}

// =============================================================================
// Statements
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

#[derive(Clone, Debug, Serialize)]
pub struct VarDeclarator {
    pub name: Box<str>,
    pub ty: Option<TypeNodeId>,
    pub init: Option<ExprId>,
    pub span: Span,
}

/// Loop-head binding for `for-in` / `for-of`.
#[derive(Clone, Debug, Serialize)]
pub struct ForHead {
    /// `Some` when the head declares (`for (let x of ...)`), `None` when
    /// it references an existing binding (`for (x of ...)`).
    pub var_kind: Option<VarKind>,
    pub name: Box<str>,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize)]
pub struct SwitchCase {
    /// `None` for the `default` clause.
    pub test: Option<ExprId>,
    pub body: Vec<StmtId>,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize)]
pub struct CatchClause {
    pub param: Option<Box<str>>,
    pub param_ty: Option<TypeNodeId>,
    pub body: Vec<StmtId>,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize)]
pub struct EnumMember {
    pub name: Box<str>,
    pub init: Option<ExprId>,
    pub span: Span,
}

/// One named import: `imported as local` (`local == imported` without
/// an alias).
#[derive(Clone, Debug, Serialize)]
pub struct ImportSpecifier {
    pub imported: Box<str>,
    pub local: Box<str>,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize)]
pub enum ImportKind {
    /// `import "m";`
    SideEffect,
    /// `import d from "m"; import d, {a as b} from "m"; import {a} from "m";`
    Clause {
        default: Option<Box<str>>,
        namespace: Option<Box<str>>,
        named: Vec<ImportSpecifier>,
    },
    /// `import x = require("m");`
    EqualsRequire { local: Box<str> },
}

#[derive(Clone, Debug, Serialize)]
pub struct ExportSpecifier {
    pub local: Box<str>,
    pub exported: Box<str>,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize)]
pub enum StmtKind {
    Empty,
    Expr(ExprId),
    VarDecl {
        kind: VarKind,
        declarations: Vec<VarDeclarator>,
    },
    Block(Vec<StmtId>),
    If {
        cond: ExprId,
        then_branch: StmtId,
        else_branch: Option<StmtId>,
    },
    While {
        cond: ExprId,
        body: StmtId,
    },
    DoWhile {
        body: StmtId,
        cond: ExprId,
    },
    For {
        init: Option<StmtId>,
        test: Option<ExprId>,
        update: Option<ExprId>,
        body: StmtId,
    },
    ForIn {
        head: ForHead,
        object: ExprId,
        body: StmtId,
    },
    ForOf {
        head: ForHead,
        iterable: ExprId,
        body: StmtId,
        is_await: bool,
    },
    Switch {
        discriminant: ExprId,
        cases: Vec<SwitchCase>,
    },
    Labeled {
        label: Box<str>,
        body: StmtId,
    },
    Break(Option<Box<str>>),
    Continue(Option<Box<str>>),
    Return(Option<ExprId>),
    Throw(ExprId),
    Try {
        block: Vec<StmtId>,
        catch: Option<CatchClause>,
        finally: Option<Vec<StmtId>>,
    },
    FunctionDecl {
        name: Box<str>,
        func: FuncId,
    },
    ClassDecl(ClassId),
    InterfaceDecl(InterfaceId),
    TypeAlias {
        name: Box<str>,
        type_params: Vec<TypeParam>,
        ty: TypeNodeId,
    },
    EnumDecl {
        name: Box<str>,
        members: Vec<EnumMember>,
    },
    Import {
        kind: ImportKind,
        specifier: Box<str>,
    },
    /// `export {a, b as c};` or `export {a} from "m";`
    ExportNamed {
        specifiers: Vec<ExportSpecifier>,
        from: Option<Box<str>>,
    },
    /// `export * from "m";`
    ExportStar { from: Box<str> },
    /// `export default expr;`
    ExportDefault(ExprId),
    /// `export <declaration>`: the inner statement is also exported.
    ExportDecl(StmtId),
    /// `export = expr;`
    ExportAssignment(ExprId),
}

#[derive(Clone, Debug, Serialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

// =============================================================================
// Type annotations
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TypeKeyword {
    Number,
    String,
    Boolean,
    Any,
    Unknown,
    Void,
    Never,
    Null,
    Undefined,
    Symbol,
}

#[derive(Clone, Debug, Serialize)]
pub enum TypeLit {
    String(Box<str>),
    Number(f64),
    Boolean(bool),
}

#[derive(Clone, Debug, Serialize)]
pub struct ParamTypeNode {
    pub name: Box<str>,
    pub ty: TypeNodeId,
    pub optional: bool,
    pub rest: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct TupleElem {
    pub ty: TypeNodeId,
    pub optional: bool,
}

/// Member of an inline object type `{ a: number; [k: string]: V }`.
#[derive(Clone, Debug, Serialize)]
pub enum TypeLiteralMember {
    Property {
        name: Box<str>,
        ty: TypeNodeId,
        optional: bool,
        readonly: bool,
    },
    IndexSignature {
        param_name: Box<str>,
        key_ty: TypeNodeId,
        value_ty: TypeNodeId,
    },
}

/// Mapped-type optional modifier: `+?` adds, `-?` removes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum MappedModifier {
    Add,
    Remove,
}

#[derive(Clone, Debug, Serialize)]
pub enum TypeNodeKind {
    Keyword(TypeKeyword),
    Literal(TypeLit),
    /// A named reference, possibly generic: `Foo`, `Array<T>`, `P<A, B>`.
    Ref {
        name: Box<str>,
        type_args: Vec<TypeNodeId>,
    },
    /// `T[]`
    Array(TypeNodeId),
    Tuple {
        elements: Vec<TupleElem>,
        rest: Option<TypeNodeId>,
    },
    Union(Vec<TypeNodeId>),
    Intersection(Vec<TypeNodeId>),
    Function {
        type_params: Vec<TypeParam>,
        params: Vec<ParamTypeNode>,
        return_ty: TypeNodeId,
    },
    TypeLiteral(Vec<TypeLiteralMember>),
    Keyof(TypeNodeId),
    IndexedAccess {
        object: TypeNodeId,
        index: TypeNodeId,
    },
    /// `{ [K in C as R]?: V }`
    Mapped {
        param_name: Box<str>,
        constraint: TypeNodeId,
        as_clause: Option<TypeNodeId>,
        value: TypeNodeId,
        optional: Option<MappedModifier>,
    },
    /// `x is T`
    Predicate {
        param_name: Box<str>,
        ty: TypeNodeId,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct TypeNode {
    pub kind: TypeNodeKind,
    pub span: Span,
}

// =============================================================================
// Arena
// =============================================================================

/// Typed arena for one module's AST.
#[derive(Debug, Default, Serialize)]
pub struct Arena {
    exprs: Vec<Expr>,
    stmts: Vec<Stmt>,
    type_nodes: Vec<TypeNode>,
    funcs: Vec<Function>,
    classes: Vec<Class>,
    interfaces: Vec<Interface>,
}

impl Arena {
    pub fn new() -> Self {
        Arena::default()
    }

    pub fn alloc_expr(&mut self, kind: ExprKind, span: Span) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(Expr { kind, span });
        id
    }

    pub fn alloc_stmt(&mut self, kind: StmtKind, span: Span) -> StmtId {
        let id = StmtId(self.stmts.len() as u32);
        self.stmts.push(Stmt { kind, span });
        id
    }

    pub fn alloc_type_node(&mut self, kind: TypeNodeKind, span: Span) -> TypeNodeId {
        let id = TypeNodeId(self.type_nodes.len() as u32);
        self.type_nodes.push(TypeNode { kind, span });
        id
    }

    pub fn alloc_func(&mut self, func: Function) -> FuncId {
        let id = FuncId(self.funcs.len() as u32);
        self.funcs.push(func);
        id
    }

    pub fn alloc_class(&mut self, class: Class) -> ClassId {
        let id = ClassId(self.classes.len() as u32);
        self.classes.push(class);
        id
    }

    pub fn alloc_interface(&mut self, interface: Interface) -> InterfaceId {
        let id = InterfaceId(self.interfaces.len() as u32);
        self.interfaces.push(interface);
        id
    }

    #[inline]
    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    #[inline]
    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.index()]
    }

    #[inline]
    pub fn type_node(&self, id: TypeNodeId) -> &TypeNode {
        &self.type_nodes[id.index()]
    }

    #[inline]
    pub fn func(&self, id: FuncId) -> &Function {
        &self.funcs[id.index()]
    }

    #[inline]
    pub fn class(&self, id: ClassId) -> &Class {
        &self.classes[id.index()]
    }

    #[inline]
    pub fn interface(&self, id: InterfaceId) -> &Interface {
        &self.interfaces[id.index()]
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    pub fn stmt_count(&self) -> usize {
        self.stmts.len()
    }
}

/// One parsed module: its arena plus top-level statement list.
#[derive(Debug, Serialize)]
pub struct SourceModule {
    /// Resolved specifier this module is known by.
    pub specifier: String,
    pub arena: Arena,
    pub statements: Vec<StmtId>,
}

impl SourceModule {
    pub fn new(specifier: impl Into<String>) -> Self {
        SourceModule {
            specifier: specifier.into(),
            arena: Arena::new(),
            statements: Vec::new(),
        }
    }
}

//! The tagged runtime value model shared by both executors.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ctx::RuntimeCtx;
use crate::promise::PromiseCell;

/// A native (host-provided) callable.
///
/// Receives the runtime context, the `this` receiver, and the argument
/// list; an `Err` is a thrown language-level exception value.
pub type NativeFn = Rc<dyn Fn(&RuntimeCtx, &Value, &[Value]) -> Result<Value, Value>>;

/// Callable payload: host-native or executor-specific.
#[derive(Clone)]
pub enum FunctionPayload {
    Native(NativeFn),
    /// Interpreter closures, VM method handles. Each executor downcasts
    /// only payloads it created.
    Foreign(Rc<dyn Any>),
}

pub struct FunctionValue {
    pub name: RefCell<String>,
    pub payload: FunctionPayload,
    /// Bound `this`, when the function was extracted as a method.
    pub bound_this: Option<Value>,
}

impl FunctionValue {
    pub fn native(name: &str, f: NativeFn) -> Rc<Self> {
        Rc::new(FunctionValue {
            name: RefCell::new(name.to_string()),
            payload: FunctionPayload::Native(f),
            bound_this: None,
        })
    }

    pub fn foreign(name: &str, payload: Rc<dyn Any>) -> Rc<Self> {
        Rc::new(FunctionValue {
            name: RefCell::new(name.to_string()),
            payload: FunctionPayload::Foreign(payload),
            bound_this: None,
        })
    }

    /// A copy of this function with `this` pre-bound.
    pub fn bind(self: &Rc<Self>, this: Value) -> Rc<Self> {
        Rc::new(FunctionValue {
            name: RefCell::new(self.name.borrow().clone()),
            payload: self.payload.clone(),
            bound_this: Some(this),
        })
    }
}

impl std::fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[Function: {}]", self.name.borrow())
    }
}

/// A class value: runtime-visible name and statics, with the method
/// table living in the executor-specific payload.
pub struct ClassValue {
    pub name: String,
    pub parent: Option<Rc<ClassValue>>,
    pub statics: RefCell<IndexMap<String, Value>>,
    pub payload: Rc<dyn Any>,
    pub is_abstract: bool,
}

impl std::fmt::Debug for ClassValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[class {}]", self.name)
    }
}

impl ClassValue {
    /// Whether `self` is `other` or inherits from it.
    pub fn extends(self: &Rc<Self>, other: &Rc<ClassValue>) -> bool {
        let mut current = Some(self.clone());
        while let Some(class) = current {
            if Rc::ptr_eq(&class, other) {
                return true;
            }
            current = class.parent.clone();
        }
        false
    }
}

/// A class instance: class reference plus own fields in insertion order.
#[derive(Debug)]
pub struct InstanceValue {
    pub class: Rc<ClassValue>,
    pub fields: RefCell<IndexMap<String, Value>>,
    /// Names of fields frozen after construction.
    pub readonly_fields: RefCell<Vec<String>>,
}

/// A plain object: insertion-ordered string-keyed properties.
#[derive(Debug, Default)]
pub struct ObjectValue {
    pub props: RefCell<IndexMap<String, Value>>,
}

impl ObjectValue {
    pub fn new() -> Rc<Self> {
        Rc::new(ObjectValue::default())
    }

    pub fn from_props(props: IndexMap<String, Value>) -> Rc<Self> {
        Rc::new(ObjectValue {
            props: RefCell::new(props),
        })
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.props.borrow().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: Value) {
        self.props.borrow_mut().insert(key.to_string(), value);
    }
}

/// An opaque host resource (file handle, hasher, stream).
pub struct HostHandle {
    pub kind: &'static str,
    pub data: Rc<dyn Any>,
}

impl std::fmt::Debug for HostHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} handle]", self.kind)
    }
}

/// The runtime value.
#[derive(Clone, Debug)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<ObjectValue>),
    Function(Rc<FunctionValue>),
    Class(Rc<ClassValue>),
    Instance(Rc<InstanceValue>),
    Promise(Rc<PromiseCell>),
    Handle(Rc<HostHandle>),
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Value {
        Value::String(Rc::from(s.as_ref()))
    }

    pub fn array(values: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(values)))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Rc<FunctionValue>> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Property lookup that both executors share for non-class values:
    /// object props, array/string length and indices, instance fields,
    /// class statics, promise/function names.
    pub fn get_shared_property(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(object) => object.get(key),
            Value::Array(items) => match key {
                "length" => Some(Value::Number(items.borrow().len() as f64)),
                _ => key
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.borrow().get(i).cloned()),
            },
            Value::String(s) => match key {
                "length" => Some(Value::Number(s.chars().count() as f64)),
                _ => key.parse::<usize>().ok().and_then(|i| {
                    s.chars().nth(i).map(|c| Value::string(c.to_string()))
                }),
            },
            Value::Instance(instance) => instance.fields.borrow().get(key).cloned(),
            Value::Class(class) => class.statics.borrow().get(key).cloned(),
            Value::Function(f) => match key {
                "name" => Some(Value::string(f.name.borrow().clone())),
                _ => None,
            },
            _ => None,
        }
    }
}

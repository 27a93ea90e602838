//! Downcasting an [`Object`] to the wrapper matching its runtime class name.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use crate::errors::{BridgeError, Result};
use crate::object::Object;
use crate::wrapper::ObjectType;

/// A wrapper of any registered class.
pub trait AnyObject: Any + fmt::Debug + Send + Sync {
    fn class_name(&self) -> &'static str;

    fn object(&self) -> &Object;

    fn as_any(&self) -> &dyn Any;
}

impl<T: ObjectType + fmt::Debug> AnyObject for T {
    fn class_name(&self) -> &'static str {
        T::CLASS_NAME
    }

    fn object(&self) -> &Object {
        self.as_object()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn AnyObject {
    pub fn downcast_ref<T: AnyObject>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is<T: AnyObject>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

type Constructor = fn(Object) -> Box<dyn AnyObject>;

fn construct<T: ObjectType + fmt::Debug>(object: Object) -> Box<dyn AnyObject> {
    Box::new(T::from_object_unchecked(object))
}

/// Class name -> wrapper constructor.
///
/// Lookups use the object's exact runtime class name. A class the table
/// has not been taught about is an error naming that class.
#[derive(Default)]
pub struct ClassTable {
    constructors: HashMap<&'static str, Constructor>,
}

impl ClassTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: ObjectType + fmt::Debug>(&mut self) -> &mut Self {
        self.constructors.insert(T::CLASS_NAME, construct::<T>);
        self
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.constructors.contains_key(class_name)
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    pub fn cast(&self, object: Object) -> Result<Box<dyn AnyObject>> {
        let class_name = object.type_name();
        match self.constructors.get(class_name.as_str()) {
            Some(construct) => Ok(construct(object)),
            None => Err(BridgeError::UnknownClass(class_name)),
        }
    }
}

impl fmt::Debug for ClassTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.constructors.keys().collect();
        names.sort();
        f.debug_struct("ClassTable").field("classes", &names).finish()
    }
}

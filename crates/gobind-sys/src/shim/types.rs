use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::mem::size_of;
use std::os::raw::{c_char, c_uint};
use std::ptr;

use lazy_static::lazy_static;
use parking_lot::{ReentrantMutex, RwLock};

use super::{alloc_block, return_if_fail};
use crate::*;

/// Derived ids start above the fundamental range, as in GLib.
const FIRST_DERIVED_TYPE: GType = G_TYPE_FUNDAMENTAL_MAX + (1 << G_TYPE_FUNDAMENTAL_SHIFT);

const FUNDAMENTALS: &[(GType, &str)] = &[
    (G_TYPE_NONE, "void"),
    (G_TYPE_INTERFACE, "GInterface"),
    (G_TYPE_CHAR, "gchar"),
    (G_TYPE_UCHAR, "guchar"),
    (G_TYPE_BOOLEAN, "gboolean"),
    (G_TYPE_INT, "gint"),
    (G_TYPE_UINT, "guint"),
    (G_TYPE_LONG, "glong"),
    (G_TYPE_ULONG, "gulong"),
    (G_TYPE_INT64, "gint64"),
    (G_TYPE_UINT64, "guint64"),
    (G_TYPE_ENUM, "GEnum"),
    (G_TYPE_FLAGS, "GFlags"),
    (G_TYPE_FLOAT, "gfloat"),
    (G_TYPE_DOUBLE, "gdouble"),
    (G_TYPE_STRING, "gchararray"),
    (G_TYPE_POINTER, "gpointer"),
    (G_TYPE_BOXED, "GBoxed"),
    (G_TYPE_PARAM, "GParam"),
    (G_TYPE_OBJECT, "GObject"),
    (G_TYPE_VARIANT, "GVariant"),
];

struct TypeNode {
    name: CString,
    parent: GType,
    depth: c_uint,
    class_size: usize,
    instance_size: usize,
    class_init: GClassInitFunc,
    instance_init: GInstanceInitFunc,
    /// Address of the class structure; 0 until the first `class_ref`.
    class: usize,
}

struct TypeRegistry {
    nodes: HashMap<GType, TypeNode>,
    by_name: HashMap<CString, GType>,
    next_id: GType,
    initially_unowned: GType,
}

impl TypeRegistry {
    fn new() -> Self {
        let mut registry = TypeRegistry {
            nodes: HashMap::new(),
            by_name: HashMap::new(),
            next_id: FIRST_DERIVED_TYPE,
            initially_unowned: G_TYPE_INVALID,
        };

        for &(id, name) in FUNDAMENTALS {
            let (class_size, instance_size) = if id == G_TYPE_OBJECT {
                (size_of::<GObjectClass>(), size_of::<GObject>())
            } else {
                (0, 0)
            };
            registry.insert(id, TypeNode {
                name: CString::new(name).unwrap_or_default(),
                parent: G_TYPE_INVALID,
                depth: 1,
                class_size,
                instance_size,
                class_init: None,
                instance_init: None,
                class: 0,
            });
        }

        let id = registry.allocate_id();
        registry.insert(id, TypeNode {
            name: CString::new("GInitiallyUnowned").unwrap_or_default(),
            parent: G_TYPE_OBJECT,
            depth: 2,
            class_size: size_of::<GInitiallyUnownedClass>(),
            instance_size: size_of::<GInitiallyUnowned>(),
            class_init: None,
            instance_init: None,
            class: 0,
        });
        registry.initially_unowned = id;

        registry
    }

    fn allocate_id(&mut self) -> GType {
        let id = self.next_id;
        self.next_id += 1 << G_TYPE_FUNDAMENTAL_SHIFT;
        id
    }

    fn insert(&mut self, id: GType, node: TypeNode) {
        self.by_name.insert(node.name.clone(), id);
        self.nodes.insert(id, node);
    }

    fn is_a(&self, mut type_: GType, ancestor: GType) -> bool {
        loop {
            if type_ == ancestor {
                return true;
            }
            match self.nodes.get(&type_) {
                Some(node) if node.parent != G_TYPE_INVALID => type_ = node.parent,
                _ => return false,
            }
        }
    }

    fn fundamental(&self, mut type_: GType) -> GType {
        loop {
            match self.nodes.get(&type_) {
                Some(node) if node.parent == G_TYPE_INVALID => return type_,
                Some(node) => type_ = node.parent,
                None => return G_TYPE_INVALID,
            }
        }
    }
}

lazy_static! {
    static ref TYPES: RwLock<TypeRegistry> = RwLock::new(TypeRegistry::new());
    /// Serializes class creation; reentrant because class_init may touch
    /// other types.
    static ref CLASS_INIT: ReentrantMutex<()> = ReentrantMutex::new(());
}

pub(crate) fn type_is_a(type_: GType, ancestor: GType) -> bool {
    TYPES.read().is_a(type_, ancestor)
}

pub(crate) fn type_fundamental(type_: GType) -> GType {
    TYPES.read().fundamental(type_)
}

pub(crate) fn initially_unowned_type() -> GType {
    TYPES.read().initially_unowned
}

pub(crate) fn instance_size(type_: GType) -> usize {
    TYPES.read().nodes.get(&type_).map_or(0, |node| node.instance_size)
}

/// Instance initializers from the root type down to `type_`.
pub(crate) fn instance_inits(type_: GType) -> Vec<GInstanceInitFunc> {
    let types = TYPES.read();
    let mut inits = Vec::new();
    let mut current = type_;
    while let Some(node) = types.nodes.get(&current) {
        inits.push(node.instance_init);
        current = node.parent;
    }
    inits.reverse();
    inits
}

pub(crate) fn type_name_lossy(type_: GType) -> String {
    TYPES
        .read()
        .nodes
        .get(&type_)
        .map_or_else(|| format!("<type {}>", type_), |node| node.name.to_string_lossy().into_owned())
}

/// Returns the class structure for `type_`, creating it on first use: the
/// parent class is copied in, the type id stamped, then `class_init` runs.
pub(crate) fn class_ref(type_: GType) -> *mut GTypeClass {
    let _guard = CLASS_INIT.lock();

    let (existing, parent, class_size, class_init) = {
        let types = TYPES.read();
        match types.nodes.get(&type_) {
            Some(node) => (node.class, node.parent, node.class_size, node.class_init),
            None => return ptr::null_mut(),
        }
    };
    if existing != 0 {
        return existing as *mut GTypeClass;
    }
    if class_size < size_of::<GTypeClass>() {
        return ptr::null_mut();
    }

    let class = alloc_block(class_size);
    if parent != G_TYPE_INVALID {
        let parent_class = class_ref(parent);
        if !parent_class.is_null() {
            let parent_size = TYPES.read().nodes.get(&parent).map_or(0, |node| node.class_size);
            unsafe {
                ptr::copy_nonoverlapping(parent_class as *const u8, class, parent_size.min(class_size));
            }
        }
    }

    unsafe {
        (*(class as *mut GTypeClass)).g_type = type_;
        if let Some(init) = class_init {
            init(class as gpointer, ptr::null_mut());
        }
    }

    if let Some(node) = TYPES.write().nodes.get_mut(&type_) {
        node.class = class as usize;
    }
    class as *mut GTypeClass
}

pub unsafe extern "C" fn g_type_name(type_: GType) -> *const c_char {
    TYPES.read().nodes.get(&type_).map_or(ptr::null(), |node| node.name.as_ptr())
}

pub unsafe extern "C" fn g_type_from_name(name: *const c_char) -> GType {
    return_if_fail!(!name.is_null(), "g_type_from_name", G_TYPE_INVALID);
    let name = CStr::from_ptr(name);
    TYPES.read().by_name.get(name).copied().unwrap_or(G_TYPE_INVALID)
}

pub unsafe extern "C" fn g_type_parent(type_: GType) -> GType {
    TYPES.read().nodes.get(&type_).map_or(G_TYPE_INVALID, |node| node.parent)
}

pub unsafe extern "C" fn g_type_depth(type_: GType) -> c_uint {
    TYPES.read().nodes.get(&type_).map_or(0, |node| node.depth)
}

pub unsafe extern "C" fn g_type_fundamental(type_id: GType) -> GType {
    type_fundamental(type_id)
}

pub unsafe extern "C" fn g_type_is_a(type_: GType, is_a_type: GType) -> gboolean {
    type_is_a(type_, is_a_type) as gboolean
}

pub unsafe extern "C" fn g_type_register_static_simple(
    parent_type: GType,
    type_name: *const c_char,
    class_size: c_uint,
    class_init: GClassInitFunc,
    instance_size: c_uint,
    instance_init: GInstanceInitFunc,
    _flags: GTypeFlags,
) -> GType {
    return_if_fail!(!type_name.is_null(), "g_type_register_static_simple", G_TYPE_INVALID);
    let name = CStr::from_ptr(type_name).to_owned();

    let mut types = TYPES.write();
    if types.by_name.contains_key(&name) {
        log::warn!("cannot register existing type '{}'", name.to_string_lossy());
        return G_TYPE_INVALID;
    }
    let (parent_depth, parent_class_size, parent_instance_size) = match types.nodes.get(&parent_type) {
        Some(parent) if types.fundamental(parent_type) == G_TYPE_OBJECT => {
            (parent.depth, parent.class_size, parent.instance_size)
        }
        _ => {
            log::warn!(
                "cannot derive '{}' from non-object type {}",
                name.to_string_lossy(),
                parent_type
            );
            return G_TYPE_INVALID;
        }
    };
    if (class_size as usize) < parent_class_size || (instance_size as usize) < parent_instance_size {
        log::warn!(
            "specified class or instance size for '{}' is smaller than the parent's",
            name.to_string_lossy()
        );
        return G_TYPE_INVALID;
    }

    let id = types.allocate_id();
    types.insert(id, TypeNode {
        name,
        parent: parent_type,
        depth: parent_depth + 1,
        class_size: class_size as usize,
        instance_size: instance_size as usize,
        class_init,
        instance_init,
        class: 0,
    });
    id
}

/// Classes are never finalized, so the reference is not counted.
pub unsafe extern "C" fn g_type_class_ref(type_: GType) -> gpointer {
    let class = class_ref(type_);
    if class.is_null() {
        log::warn!("cannot retrieve class for invalid (unclassed) type '{}'", type_name_lossy(type_));
    }
    class as gpointer
}

pub unsafe extern "C" fn g_initially_unowned_get_type() -> GType {
    initially_unowned_type()
}

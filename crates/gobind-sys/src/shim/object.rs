use std::collections::HashMap;
use std::os::raw::{c_char, c_uint};
use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};

use lazy_static::lazy_static;
use parking_lot::Mutex;

use super::signal::disconnect_all;
use super::types::{class_ref, initially_unowned_type, instance_inits, instance_size, type_is_a};
use super::{alloc_block, free_block, return_if_fail};
use crate::*;

struct InstanceMeta {
    size: usize,
    floating: bool,
    weak_refs: Vec<(GWeakNotify, usize)>,
}

lazy_static! {
    static ref INSTANCES: Mutex<HashMap<usize, InstanceMeta>> = Mutex::new(HashMap::new());
}

/// The `ref_count` word of a live instance, viewed atomically.
unsafe fn ref_count<'a>(object: *mut GObject) -> &'a AtomicU32 {
    &*(ptr::addr_of_mut!((*object).ref_count) as *const AtomicU32)
}

pub(crate) fn is_live_instance(object: gpointer) -> bool {
    INSTANCES.lock().contains_key(&(object as usize))
}

/// Type of a live instance, `G_TYPE_INVALID` for anything else.
pub(crate) fn instance_type(object: gpointer) -> GType {
    if object.is_null() || !is_live_instance(object) {
        return G_TYPE_INVALID;
    }
    unsafe { g_type_from_instance(object as *const GTypeInstance) }
}

pub unsafe extern "C" fn g_object_new_with_properties(
    object_type: GType,
    n_properties: c_uint,
    names: *mut *const c_char,
    values: *const GValue,
) -> *mut GObject {
    return_if_fail!(type_is_a(object_type, G_TYPE_OBJECT), "g_object_new_with_properties", ptr::null_mut());
    return_if_fail!(
        n_properties == 0 || (!names.is_null() && !values.is_null()),
        "g_object_new_with_properties",
        ptr::null_mut()
    );

    let class = class_ref(object_type);
    if class.is_null() {
        return ptr::null_mut();
    }

    let size = instance_size(object_type);
    let object = alloc_block(size) as *mut GObject;
    (*object).g_type_instance.g_class = class;
    (*object).ref_count = 1;

    let floating = type_is_a(object_type, initially_unowned_type());
    INSTANCES.lock().insert(object as usize, InstanceMeta { size, floating, weak_refs: Vec::new() });

    for init in instance_inits(object_type).into_iter().flatten() {
        init(object as *mut GTypeInstance, class as gpointer);
    }
    for i in 0..n_properties as usize {
        g_object_set_property(object, *names.add(i), values.add(i));
    }

    object
}

pub unsafe extern "C" fn g_object_ref(object: *mut GObject) -> *mut GObject {
    return_if_fail!(is_live_instance(object as gpointer), "g_object_ref", object);
    ref_count(object).fetch_add(1, Ordering::AcqRel);
    object
}

pub unsafe extern "C" fn g_object_unref(object: *mut GObject) {
    return_if_fail!(is_live_instance(object as gpointer), "g_object_unref");
    if ref_count(object).fetch_sub(1, Ordering::AcqRel) != 1 {
        return;
    }

    // Last reference: handlers first, then weak notifies, then the memory.
    disconnect_all(object as gpointer);
    let meta = INSTANCES.lock().remove(&(object as usize));
    if let Some(meta) = meta {
        for (notify, data) in meta.weak_refs {
            if let Some(notify) = notify {
                notify(data as gpointer, object);
            }
        }
        free_block(object as *mut u8, meta.size);
    }
}

pub unsafe extern "C" fn g_object_ref_sink(object: *mut GObject) -> *mut GObject {
    return_if_fail!(is_live_instance(object as gpointer), "g_object_ref_sink", object);
    let was_floating = {
        let mut instances = INSTANCES.lock();
        match instances.get_mut(&(object as usize)) {
            Some(meta) => std::mem::replace(&mut meta.floating, false),
            None => false,
        }
    };
    // Sinking a floating reference adopts it; otherwise this is a plain ref.
    if !was_floating {
        ref_count(object).fetch_add(1, Ordering::AcqRel);
    }
    object
}

pub unsafe extern "C" fn g_object_is_floating(object: *mut GObject) -> gboolean {
    INSTANCES
        .lock()
        .get(&(object as usize))
        .map_or(GFALSE, |meta| meta.floating as gboolean)
}

pub unsafe extern "C" fn g_object_force_floating(object: *mut GObject) {
    if let Some(meta) = INSTANCES.lock().get_mut(&(object as usize)) {
        meta.floating = true;
    }
}

pub unsafe extern "C" fn g_object_weak_ref(object: *mut GObject, notify: GWeakNotify, data: gpointer) {
    match INSTANCES.lock().get_mut(&(object as usize)) {
        Some(meta) => meta.weak_refs.push((notify, data as usize)),
        None => log::error!("g_object_weak_ref: assertion 'G_IS_OBJECT (object)' failed"),
    }
}

pub unsafe extern "C" fn g_object_weak_unref(object: *mut GObject, notify: GWeakNotify, data: gpointer) {
    let mut instances = INSTANCES.lock();
    let Some(meta) = instances.get_mut(&(object as usize)) else {
        return;
    };
    let target = notify.map(|f| f as usize);
    if let Some(pos) = meta
        .weak_refs
        .iter()
        .position(|(n, d)| n.map(|f| f as usize) == target && *d == data as usize)
    {
        meta.weak_refs.remove(pos);
    } else {
        log::warn!("g_object_weak_unref: couldn't find weak ref");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    static FINALIZED: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn count_finalize(_data: gpointer, _object: *mut GObject) {
        FINALIZED.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn test_floating_lifecycle() {
        unsafe {
            let object = g_object_new_with_properties(initially_unowned_type(), 0, ptr::null_mut(), ptr::null());
            assert!(!object.is_null());
            assert_eq!(g_object_is_floating(object), GTRUE);
            assert_eq!((*object).ref_count, 1);

            g_object_ref_sink(object);
            assert_eq!(g_object_is_floating(object), GFALSE);
            assert_eq!((*object).ref_count, 1);

            // A second sink is an ordinary ref
            g_object_ref_sink(object);
            assert_eq!((*object).ref_count, 2);

            let before = FINALIZED.load(Ordering::SeqCst);
            g_object_weak_ref(object, Some(count_finalize), ptr::null_mut());
            g_object_unref(object);
            assert_eq!(FINALIZED.load(Ordering::SeqCst), before);
            g_object_unref(object);
            assert_eq!(FINALIZED.load(Ordering::SeqCst), before + 1);
        }
    }

    #[test]
    fn test_plain_objects_are_not_floating() {
        unsafe {
            let object = g_object_new_with_properties(G_TYPE_OBJECT, 0, ptr::null_mut(), ptr::null());
            assert_eq!(g_object_is_floating(object), GFALSE);
            assert_eq!(instance_type(object as gpointer), G_TYPE_OBJECT);
            g_object_unref(object);
            assert_eq!(instance_type(object as gpointer), G_TYPE_INVALID);
        }
    }
}

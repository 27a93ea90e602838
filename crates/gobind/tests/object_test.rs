use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use gobind::ffi;
use gobind::{Adopted, AnyObject, BridgeError, ClassTable, InitiallyUnowned, Object, ObjectType, Type};

gobind::object_wrapper! {
    /// Test widget deriving from `GInitiallyUnowned`.
    pub struct Gadget => "ObjectTestGadget";
}

gobind::object_wrapper! {
    pub struct Gizmo => "ObjectTestGizmo";
}

fn gadget_type() -> Type {
    static TYPE: OnceLock<Type> = OnceLock::new();
    *TYPE.get_or_init(|| Type::register_object("ObjectTestGadget", Type::initially_unowned()).unwrap())
}

fn gizmo_type() -> Type {
    static TYPE: OnceLock<Type> = OnceLock::new();
    *TYPE.get_or_init(|| Type::register_object("ObjectTestGizmo", Type::OBJECT).unwrap())
}

/// Raw construction, leaving a floating reference as native constructors do.
fn new_raw(type_: Type) -> *mut ffi::GObject {
    unsafe { ffi::g_object_new_with_properties(type_.into_glib(), 0, ptr::null_mut(), ptr::null()) }
}

unsafe extern "C" fn count_finalize(data: ffi::gpointer, _object: *mut ffi::GObject) {
    (*(data as *const AtomicUsize)).fetch_add(1, Ordering::SeqCst);
}

/// Counts how often `object` is finalized.
fn finalize_counter(object: &Object) -> &'static AtomicUsize {
    let counter: &'static AtomicUsize = Box::leak(Box::new(AtomicUsize::new(0)));
    unsafe { object.weak_ref(Some(count_finalize), counter as *const AtomicUsize as ffi::gpointer) };
    counter
}

#[test]
fn test_new_object_owns_one_reference() {
    let object = Object::new(gizmo_type()).unwrap();
    assert_eq!(object.ref_count(), 1);
    assert!(!object.is_floating());
    assert_eq!(object.type_name(), "ObjectTestGizmo");
}

#[test]
fn test_new_initially_unowned_is_sunk() {
    let object = Object::new(gadget_type()).unwrap();
    assert_eq!(object.ref_count(), 1);
    assert!(!object.is_floating());
    assert!(object.is_a(Type::initially_unowned()));
}

#[test]
fn test_new_rejects_non_object_types() {
    let err = Object::new(Type::I32).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"invalid type: gint is not a(n) GObject");
}

#[test]
fn test_clone_and_drop_balance() {
    let object = Object::new(gizmo_type()).unwrap();
    let finalized = finalize_counter(&object);

    let copies: Vec<Object> = (0..3).map(|_| object.clone()).collect();
    assert_eq!(object.ref_count(), 4);
    drop(copies);
    assert_eq!(object.ref_count(), 1);
    assert_eq!(finalized.load(Ordering::SeqCst), 0);

    drop(object);
    assert_eq!(finalized.load(Ordering::SeqCst), 1);
}

#[test]
fn test_floating_reference_is_sunk_exactly_once() {
    let raw = new_raw(gadget_type());
    assert_ne!(unsafe { ffi::g_object_is_floating(raw) }, ffi::GFALSE);

    let object = unsafe { Object::from_glib_floating(raw) }.unwrap();
    let finalized = finalize_counter(&object);
    assert!(!object.is_floating());
    assert_eq!(object.ref_count(), 1);

    // Adopting the same address again takes a plain reference
    let second = unsafe { Object::from_glib_floating(raw) }.unwrap();
    assert_eq!(object.ref_count(), 2);
    assert_eq!(second, object);

    drop(second);
    assert_eq!(finalized.load(Ordering::SeqCst), 0);
    drop(object);
    assert_eq!(finalized.load(Ordering::SeqCst), 1);
}

#[test]
fn test_adoption_disciplines() {
    let raw = new_raw(gizmo_type());
    let owned = unsafe { Adopted::new(raw) }.unwrap().assume_owned();
    assert_eq!(owned.ref_count(), 1);

    let borrowed = unsafe { Adopted::new(raw) }.unwrap().ref_();
    assert_eq!(owned.ref_count(), 2);
    drop(borrowed);

    let borrowed = unsafe { Object::from_glib_none(raw) }.unwrap();
    assert_eq!(owned.ref_count(), 2);
    drop(borrowed);
    assert_eq!(owned.ref_count(), 1);
}

#[test]
fn test_null_addresses() {
    assert!(matches!(unsafe { Adopted::new(ptr::null_mut()) }, Err(BridgeError::NullPointer)));
    assert!(unsafe { Object::from_glib_none(ptr::null_mut()) }.is_none());
    assert!(unsafe { Object::from_glib_full(ptr::null_mut()) }.is_none());
    assert!(unsafe { Object::from_glib_floating(ptr::null_mut()) }.is_none());
}

#[test]
fn test_force_floating() {
    let object = Object::new(gizmo_type()).unwrap();
    object.force_floating();
    assert!(object.is_floating());
    let sunk = unsafe { Object::from_glib_floating(object.as_ptr()) }.unwrap();
    assert!(!object.is_floating());
    // The floating reference was adopted, so `object` and `sunk` share it
    assert_eq!(object.ref_count(), 1);
    std::mem::forget(sunk);
}

#[test]
fn test_typecheck_names_both_types() {
    let object = Object::new(gizmo_type()).unwrap();
    assert!(object.typecheck(Type::OBJECT).is_ok());

    let err = object.typecheck(gadget_type()).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"invalid type: ObjectTestGizmo is not a(n) ObjectTestGadget");
}

#[test]
fn test_downcast_and_upcast() {
    gadget_type();
    let object = Object::new(gadget_type()).unwrap();
    let gadget: Gadget = object.clone().downcast().unwrap();
    assert_eq!(gadget.type_(), gadget_type());
    assert_eq!(gadget.clone().upcast(), object);

    let base: InitiallyUnowned = object.clone().downcast().unwrap();
    assert_eq!(base.as_object(), &object);

    gizmo_type();
    assert!(object.downcast::<Gizmo>().is_err());
}

#[test]
fn test_native_returns_pointer_on_mismatch_under_warn() {
    gadget_type();
    let object = Object::new(gizmo_type()).unwrap();
    let wrong = Gadget::from_object_unchecked(object.clone());
    assert_eq!(wrong.native(), object.as_ptr());
}

#[test]
fn test_class_table_picks_wrapper_by_runtime_class() {
    gizmo_type();
    gadget_type();
    let mut table = ClassTable::new();
    table.register::<Gadget>().register::<Gizmo>();

    let any = table.cast(Object::new(gizmo_type()).unwrap()).unwrap();
    assert!(any.is::<Gizmo>());
    assert!(!any.is::<Gadget>());
    assert_eq!(any.object().type_(), gizmo_type());

    let unknown = Type::register_object("ObjectTestUnlisted", Type::OBJECT).unwrap();
    let err = table.cast(Object::new(unknown).unwrap()).unwrap_err();
    assert!(matches!(err, BridgeError::UnknownClass(ref name) if name == "ObjectTestUnlisted"));
}

#[test]
fn test_display() {
    let object = Object::new(gizmo_type()).unwrap();
    let shown = object.to_string();
    assert!(shown.starts_with("<ObjectTestGizmo at 0x"), "{}", shown);
}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use gobind::signal::{self, SignalFlags};
use gobind::{BridgeError, Closure, Dynamic, Object, SignalHandlerId, Type, Value};

/// An object class with four signals: `bump(i32) -> i32`, `ping()`,
/// `triple(i32, string, bool)` and `take(SignalTestEmitter, string)`.
fn emitter_type() -> Type {
    static TYPE: OnceLock<Type> = OnceLock::new();
    *TYPE.get_or_init(|| {
        let emitter = Type::register_object("SignalTestEmitter", Type::OBJECT).unwrap();
        signal::new_signal("bump", emitter, SignalFlags::RUN_LAST, Type::I32, &[Type::I32]).unwrap();
        signal::new_signal("ping", emitter, SignalFlags::RUN_LAST, Type::NONE, &[]).unwrap();
        signal::new_signal(
            "triple",
            emitter,
            SignalFlags::RUN_LAST,
            Type::NONE,
            &[Type::I32, Type::STRING, Type::BOOL],
        )
        .unwrap();
        signal::new_signal("take", emitter, SignalFlags::RUN_LAST, Type::NONE, &[emitter, Type::STRING]).unwrap();
        emitter
    })
}

fn emitter() -> Object {
    Object::new(emitter_type()).unwrap()
}

fn int_value(i: i32) -> Value {
    Value::from_managed(&Dynamic::I32(i)).unwrap()
}

#[test]
fn test_query_signal() {
    let info = signal::query(emitter_type(), "triple").unwrap();
    assert_eq!(info.name, "triple");
    assert_eq!(info.itype, emitter_type());
    assert_eq!(info.return_type, Type::NONE);
    assert_eq!(info.param_types, vec![Type::I32, Type::STRING, Type::BOOL]);
    assert!(info.flags.contains(SignalFlags::RUN_LAST));
}

#[test]
fn test_signals_are_inherited() {
    let child = Type::register_object("SignalTestChild", emitter_type()).unwrap();
    let object = Object::new(child).unwrap();
    object.connect("bump", |_obj: Object, x: i32| x * 10).unwrap();
    assert_eq!(object.emit("bump", &[Dynamic::I32(4)]).unwrap(), Dynamic::I32(40));
}

#[test]
fn test_emit_returns_handler_result() {
    let object = emitter();
    object.connect("bump", |_obj: Object, x: i32| x + 1).unwrap();
    assert_eq!(object.emit("bump", &[Dynamic::I32(41)]).unwrap(), Dynamic::I32(42));
}

#[test]
fn test_handler_receives_the_instance() {
    let object = emitter();
    let seen = Arc::new(Mutex::new(None));
    let sink = seen.clone();
    object
        .connect("ping", move |obj: Object| {
            *sink.lock().unwrap() = Some(obj);
        })
        .unwrap();
    object.emit("ping", &[]).unwrap();
    // Taken out so the handler does not keep the object alive
    let received = seen.lock().unwrap().take();
    assert_eq!(received, Some(object));
}

#[test]
fn test_emit_without_handlers_leaves_default_return() {
    let object = emitter();
    assert_eq!(object.emit("bump", &[Dynamic::I32(1)]).unwrap(), Dynamic::I32(0));
    assert_eq!(object.emit("ping", &[]).unwrap(), Dynamic::None);
}

#[test]
fn test_arguments_are_coerced_to_parameter_types() {
    let object = emitter();
    object.connect("bump", |_obj: Object, x: i32| x + 1).unwrap();
    assert_eq!(object.emit("bump", &[Dynamic::I64(41)]).unwrap(), Dynamic::I32(42));
}

#[test]
fn test_multiple_arguments() {
    let object = emitter();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    object
        .connect("triple", move |_obj: Object, n: i32, s: String, b: bool| {
            sink.lock().unwrap().push(format!("{} {} {}", n, s, b));
        })
        .unwrap();
    object
        .emit("triple", &[Dynamic::I32(7), Dynamic::from("seven"), Dynamic::Bool(true)])
        .unwrap();
    assert_eq!(*seen.lock().unwrap(), vec!["7 seven true".to_string()]);
}

#[test]
fn test_handler_may_take_fewer_parameters() {
    let object = emitter();
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    object
        .connect("triple", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    object
        .emit("triple", &[Dynamic::I32(1), Dynamic::from("x"), Dynamic::Bool(false)])
        .unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unknown_signal() {
    let object = emitter();
    let err = object.connect("explode", || ()).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"signal 'explode' is not defined for type SignalTestEmitter");

    let err = object.emit("explode", &[]).unwrap_err();
    assert!(matches!(err, BridgeError::UnknownSignal { .. }));
}

#[test]
fn test_argument_count_mismatch() {
    let object = emitter();
    let err = object.emit("bump", &[]).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"signal 'bump' takes 1 arguments, 0 given");
}

#[test]
fn test_null_object_and_string_arguments() {
    let object = emitter();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    object
        .connect("take", move |_obj: Object, other: Option<Object>, label: Option<String>| {
            sink.lock().unwrap().push((other.is_none(), label));
        })
        .unwrap();

    object.emit("take", &[Dynamic::Object(None), Dynamic::None]).unwrap();
    object.emit("take", &[Dynamic::None, Dynamic::from("x")]).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![(true, None), (true, Some("x".to_string()))]);
}

#[test]
fn test_object_argument_of_the_wrong_class() {
    let object = emitter();
    let plain = Object::new(Type::OBJECT).unwrap();
    let err = object.emit("take", &[Dynamic::from(plain), Dynamic::None]).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"argument 0: invalid type: GObject is not a(n) SignalTestEmitter");

    let peer = emitter();
    assert!(object.emit("take", &[Dynamic::from(peer), Dynamic::from("peer")]).is_ok());
}

#[test]
fn test_argument_conversion_errors_name_the_position() {
    let object = emitter();
    let err = object.emit("bump", &[Dynamic::I16(1)]).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"argument 0: conversion not implemented for i16");

    let err = object
        .emit("triple", &[Dynamic::I32(1), Dynamic::I32(2), Dynamic::Bool(true)])
        .unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"argument 1: invalid type: gint is not a(n) gchararray");
}

#[test]
fn test_disconnect_unregisters_the_closure() {
    let object = emitter();
    let closure = Closure::new(|_obj: Object, x: i32| x * 2);
    let id = object.connect_closure("bump", &closure, false).unwrap();
    assert!(closure.is_registered());
    assert_eq!(object.emit("bump", &[Dynamic::I32(21)]).unwrap(), Dynamic::I32(42));

    object.handler_disconnect(id);
    assert!(!object.handler_is_connected(id));
    assert!(!closure.is_registered());
    assert_eq!(object.emit("bump", &[Dynamic::I32(21)]).unwrap(), Dynamic::I32(0));

    // A second disconnect is a no-op
    object.handler_disconnect(id);
}

#[test]
fn test_invalidating_a_closure_disconnects_its_handler() {
    let object = emitter();
    let closure = Closure::new(|_obj: Object, x: i32| x - 1);
    let id = object.connect_closure("bump", &closure, false).unwrap();

    assert_eq!(signal::handler_closure(id), Some(closure.as_ptr()));
    closure.invalidate();
    assert!(!closure.is_registered());
    assert!(!object.handler_is_connected(id));
    assert_eq!(signal::handler_closure(id), None);
    assert_eq!(object.emit("bump", &[Dynamic::I32(5)]).unwrap(), Dynamic::I32(0));
    object.handler_disconnect(id);
}

#[test]
fn test_dropping_the_last_reference_unregisters() {
    let closure = Closure::new(|| 1);
    let raw = closure.as_ptr();
    assert!(gobind::closure::is_registered(raw));
    drop(closure);
    assert!(!gobind::closure::is_registered(raw));
}

#[test]
fn test_dropping_the_object_releases_its_handlers() {
    let object = emitter();
    let closure = Closure::new(|_obj: Object| ());
    object.connect_closure("ping", &closure, false).unwrap();
    drop(object);
    assert!(!closure.is_registered());
}

#[test]
fn test_handler_entries_go_away_with_their_objects() {
    let ids: Vec<SignalHandlerId> = (0..100)
        .map(|_| {
            let object = emitter();
            let id = object.connect("ping", |_obj: Object| ()).unwrap();
            assert!(signal::handler_closure(id).is_some());
            id
        })
        .collect();
    assert!(ids.iter().all(|id| signal::handler_closure(*id).is_none()));

    let object = emitter();
    let id = object.connect("ping", |_obj: Object| ()).unwrap();
    object.handler_disconnect(id);
    assert_eq!(signal::handler_closure(id), None);
}

#[test]
fn test_block_and_unblock() {
    let object = emitter();
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    let id = object
        .connect("ping", move |_obj: Object| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    object.emit("ping", &[]).unwrap();
    object.handler_block(id);
    object.emit("ping", &[]).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);

    object.handler_unblock(id);
    object.emit("ping", &[]).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn test_after_handlers_run_last() {
    let object = emitter();
    let order = Arc::new(Mutex::new(Vec::new()));

    let log_after = order.clone();
    object
        .connect_after("ping", move |_obj: Object| log_after.lock().unwrap().push("after"))
        .unwrap();
    let log_first = order.clone();
    object
        .connect("ping", move |_obj: Object| log_first.lock().unwrap().push("first"))
        .unwrap();
    let log_second = order.clone();
    object
        .connect("ping", move |_obj: Object| log_second.lock().unwrap().push("second"))
        .unwrap();

    object.emit("ping", &[]).unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["first", "second", "after"]);
}

#[test]
fn test_stop_emission_skips_remaining_handlers() {
    let object = emitter();
    let count = Arc::new(AtomicUsize::new(0));

    object
        .connect("ping", |obj: Object| {
            obj.stop_emission("ping").unwrap();
        })
        .unwrap();
    let counter = count.clone();
    object
        .connect("ping", move |_obj: Object| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    object.emit("ping", &[]).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn test_nested_emission_from_a_handler() {
    let object = emitter();
    object.connect("bump", |_obj: Object, x: i32| x + 1).unwrap();
    let result = Arc::new(Mutex::new(None));
    let sink = result.clone();
    object
        .connect("ping", move |obj: Object| match obj.emit("bump", &[Dynamic::I32(1)]) {
            Ok(Dynamic::I32(inner)) => *sink.lock().unwrap() = Some(inner),
            _ => *sink.lock().unwrap() = Some(-1),
        })
        .unwrap();

    object.emit("ping", &[]).unwrap();
    assert_eq!(*result.lock().unwrap(), Some(2));
}

#[test]
fn test_dispatch_writes_the_return_slot() {
    let closure = Closure::new(|x: i32| x + 1);
    assert_eq!(closure.arity(), Some(1));

    let mut ret = Value::for_type(Type::I32);
    closure.dispatch(Some(&mut ret), &[int_value(41)]);
    assert_eq!(ret.get::<i32>(), 42);
}

#[test]
fn test_dispatch_initializes_an_empty_slot() {
    let closure = Closure::new(|s: String| format!("<{}>", s));
    let mut ret = Value::from_glib_full(gobind::ffi::GValue::uninit());
    closure.dispatch(Some(&mut ret), &[Value::from_managed(&Dynamic::from("a")).unwrap()]);
    assert_eq!(ret.get_string().unwrap(), "<a>");
}

#[test]
fn test_dispatch_converts_to_the_slot_type() {
    let closure = Closure::new(|x: i32| x * 2);
    let mut ret = Value::for_type(Type::F64);
    closure.dispatch(Some(&mut ret), &[int_value(4)]);
    assert_eq!(ret.get::<f64>(), 8.0);
}

#[test]
fn test_dispatch_ignores_extra_parameters() {
    let closure = Closure::new(|| 7u32);
    assert_eq!(closure.arity(), Some(0));

    let mut ret = Value::for_type(Type::U32);
    closure.dispatch(Some(&mut ret), &[int_value(1), int_value(2), int_value(3)]);
    assert_eq!(ret.get::<u32>(), 7);
}

#[test]
fn test_dispatch_without_return_slot_discards_result() {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    let closure = Closure::new(move |x: i32| {
        counter.fetch_add(x as usize, Ordering::SeqCst);
        x
    });
    closure.dispatch(None, &[int_value(3)]);
    assert_eq!(count.load(Ordering::SeqCst), 3);
}

#[test]
#[should_panic(expected = "not enough arguments")]
fn test_dispatch_with_too_few_parameters_panics() {
    let closure = Closure::new(|x: i32| x);
    closure.dispatch(None, &[]);
}

#[test]
#[should_panic(expected = "expected a string argument, got i32")]
fn test_dispatch_with_mismatched_argument_panics() {
    let closure = Closure::new(|s: String| s.len() as i32);
    closure.dispatch(None, &[int_value(1)]);
}

#[test]
#[should_panic(expected = "no callable registered")]
fn test_dispatch_after_invalidate_panics() {
    let closure = Closure::new(|| ());
    closure.invalidate();
    closure.dispatch(None, &[]);
}

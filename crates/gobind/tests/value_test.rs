use std::os::raw::{c_long, c_ulong};
use std::ptr;

use gobind::{BridgeError, Dynamic, Object, Type, Value};

fn round_trip(input: Dynamic) -> Dynamic {
    let value = Value::from_managed(&input).unwrap();
    value.to_managed().unwrap()
}

#[test]
fn test_scalar_round_trips_at_boundaries() {
    let cases = vec![
        Dynamic::Bool(true),
        Dynamic::Bool(false),
        Dynamic::I8(i8::MIN),
        Dynamic::I8(i8::MAX),
        Dynamic::U8(0),
        Dynamic::U8(u8::MAX),
        Dynamic::I32(i32::MIN),
        Dynamic::I32(i32::MAX),
        Dynamic::U32(u32::MAX),
        Dynamic::Long(c_long::MIN),
        Dynamic::Long(c_long::MAX),
        Dynamic::ULong(c_ulong::MAX),
        Dynamic::I64(i64::MIN),
        Dynamic::I64(i64::MAX),
        Dynamic::U64(u64::MAX),
        Dynamic::F32(-1.5),
        Dynamic::F32(f32::MAX),
        Dynamic::F64(std::f64::consts::PI),
        Dynamic::F64(f64::MIN_POSITIVE),
    ];
    for case in cases {
        assert_eq!(round_trip(case.clone()), case, "round trip of {:?}", case);
    }
}

#[test]
fn test_string_round_trips() {
    assert_eq!(round_trip(Dynamic::from("")), Dynamic::String(String::new()));
    assert_eq!(round_trip(Dynamic::from("héllo, wörld ✓")), Dynamic::from("héllo, wörld ✓"));
}

#[test]
fn test_pointer_round_trips() {
    assert_eq!(round_trip(Dynamic::Pointer(ptr::null_mut())), Dynamic::Pointer(ptr::null_mut()));
    let addr = 0x1000usize as gobind::ffi::gpointer;
    assert_eq!(round_trip(Dynamic::Pointer(addr)), Dynamic::Pointer(addr));
}

#[test]
fn test_none_travels_as_null_pointer() {
    let value = Value::from_managed(&Dynamic::None).unwrap();
    assert_eq!(value.value_type().0, Type::POINTER);
    assert_eq!(value.to_managed().unwrap(), Dynamic::Pointer(ptr::null_mut()));
}

#[test]
fn test_object_round_trip_keeps_identity() {
    assert_eq!(round_trip(Dynamic::Object(None)), Dynamic::Object(None));

    let object = Object::new(Type::OBJECT).unwrap();
    let before = object.ref_count();
    let value = Value::from_managed(&Dynamic::from(object.clone())).unwrap();
    // One reference held by the value
    assert_eq!(object.ref_count(), before + 1);

    match value.to_managed().unwrap() {
        Dynamic::Object(Some(back)) => assert_eq!(back, object),
        other => panic!("expected an object, got {:?}", other),
    }
    drop(value);
    assert_eq!(object.ref_count(), before);
}

#[test]
fn test_subclass_instance_keeps_its_type() {
    let widget = Type::register_object("ValueTestWidget", Type::OBJECT).unwrap();
    let object = Object::new(widget).unwrap();
    let value = Value::from_managed(&Dynamic::from(object)).unwrap();
    assert_eq!(value.value_type(), (widget, Type::OBJECT));
}

#[test]
fn test_native_width_is_preserved() {
    let expectations = [
        (Dynamic::I8(1), Type::CHAR),
        (Dynamic::U8(1), Type::UCHAR),
        (Dynamic::I32(1), Type::I32),
        (Dynamic::U32(1), Type::U32),
        (Dynamic::Long(1), Type::LONG),
        (Dynamic::ULong(1), Type::ULONG),
        (Dynamic::I64(1), Type::I64),
        (Dynamic::U64(1), Type::U64),
        (Dynamic::F32(1.0), Type::F32),
        (Dynamic::F64(1.0), Type::F64),
    ];
    for (input, expected) in expectations {
        let value = Value::from_managed(&input).unwrap();
        assert_eq!(value.value_type().0, expected, "native type of {:?}", input);
    }
}

#[test]
fn test_unsupported_managed_kinds() {
    for input in [Dynamic::I16(1), Dynamic::U16(1), Dynamic::List(vec![Dynamic::I32(1)])] {
        let err = Value::from_managed(&input).unwrap_err();
        match err {
            BridgeError::ConversionNotImplemented(kind) => assert_eq!(kind, input.kind()),
            other => panic!("unexpected error {:?}", other),
        }
    }
}

#[test]
fn test_unsupported_native_fundamentals() {
    for (type_, name) in [
        (Type::ENUM, "enum"),
        (Type::FLAGS, "flags"),
        (Type::BOXED, "boxed"),
        (Type::PARAM, "param"),
        (Type::VARIANT, "variant"),
    ] {
        let value = Value::for_type(type_);
        let err = value.to_managed().unwrap_err();
        assert_eq!(err.to_string(), format!("conversion not implemented for {}", name));
    }
}

#[test]
fn test_typed_access() {
    let mut value = Value::for_type(Type::I64);
    value.set(-7i64);
    assert_eq!(value.get::<i64>(), -7);

    let mut value = Value::for_type(Type::BOOL);
    value.set(true);
    assert!(value.get::<bool>());

    let mut value = Value::for_type(Type::LONG);
    unsafe { gobind::ffi::g_value_set_long(value.as_mut_ptr(), -3) };
    assert_eq!(value.get_long(), -3);
}

#[test]
#[should_panic(expected = "value of type gint cannot be accessed as gchararray")]
fn test_get_with_wrong_type_panics() {
    let value = Value::from_managed(&Dynamic::I32(3)).unwrap();
    let _ = value.get_string();
}

#[test]
#[should_panic(expected = "value of type gdouble cannot be accessed as gint")]
fn test_typed_get_with_wrong_type_panics() {
    let value = Value::from_managed(&Dynamic::F64(3.0)).unwrap();
    let _ = value.get::<i32>();
}

#[test]
fn test_null_string() {
    let value = Value::for_type(Type::STRING);
    assert!(matches!(value.get_string(), Err(BridgeError::NullPointer)));
    // The generic conversion reports a missing string as no value
    assert_eq!(value.to_managed().unwrap(), Dynamic::None);
}

#[test]
fn test_uninitialized_value() {
    let value = Value::from_glib_full(gobind::ffi::GValue::uninit());
    assert!(!value.is_initialized());
    assert_eq!(format!("{:?}", value), "Value(<uninitialized>)");
}

#[test]
fn test_transform_between_numbers() {
    let value = Value::from_managed(&Dynamic::I32(42)).unwrap();
    let wide = value.transform_to(Type::I64).unwrap();
    assert_eq!(wide.to_managed().unwrap(), Dynamic::I64(42));

    let as_double = value.transform_to(Type::F64).unwrap();
    assert_eq!(as_double.to_managed().unwrap(), Dynamic::F64(42.0));

    let same = value.transform_to(Type::I32).unwrap();
    assert_eq!(same.to_managed().unwrap(), Dynamic::I32(42));
}

#[test]
fn test_transform_to_unrelated_type_fails() {
    let value = Value::from_managed(&Dynamic::I32(42)).unwrap();
    let err = value.transform_to(Type::STRING).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"invalid type: gint is not a(n) gchararray");
}

#[test]
fn test_try_from_dynamic() {
    let value = Value::try_from(Dynamic::U32(9)).unwrap();
    assert_eq!(value.get::<u32>(), 9);
    assert!(Value::try_from(Dynamic::U16(9)).is_err());
}

#[cfg(test)]
mod tests {
    use crate::config::{self, BridgeConfig, TypecheckPolicy};
    use crate::{AnyObject, BridgeError, ClassTable, Dynamic, FromDynamic, Object, ObjectType, Type, Value};

    crate::object_wrapper! {
        pub struct UnitWidget => "UnitTestWidget";
    }

    fn widget_type() -> Type {
        Type::register_object("UnitTestWidget", Type::OBJECT).unwrap()
    }

    #[test]
    fn test_fundamental_type_ids() {
        assert_eq!(Type::INVALID.into_glib(), 0);
        assert_eq!(Type::NONE.into_glib(), 1 << 2);
        assert_eq!(Type::OBJECT.into_glib(), 20 << 2);
        assert_eq!(Type::VARIANT.into_glib(), 21 << 2);
        assert_eq!(Type::FUNDAMENTALS.len(), 21);

        assert_eq!(Type::I32.name(), "gint");
        assert_eq!(Type::STRING.to_string(), "gchararray");
        assert_eq!(Type::OBJECT.name(), "GObject");
        assert_eq!(Type::I32.parent(), None);
        assert_eq!(Type::F64.fundamental(), Type::F64);
    }

    #[test]
    fn test_type_registration_and_ancestry() {
        let widget = widget_type();
        assert!(widget.is_valid());
        assert_eq!(Type::from_name("UnitTestWidget").unwrap(), widget);
        assert_eq!(widget.parent(), Some(Type::OBJECT));
        assert_eq!(widget.fundamental(), Type::OBJECT);
        assert_eq!(widget.depth(), 2);
        assert!(widget.is_a(Type::OBJECT));
        assert!(!Type::OBJECT.is_a(widget));

        let chain: Vec<Type> = widget.ancestors().collect();
        assert_eq!(chain, vec![widget, Type::OBJECT]);

        // Same name, same parent: the existing type comes back
        assert_eq!(Type::register_object("UnitTestWidget", Type::OBJECT).unwrap(), widget);
    }

    #[test]
    fn test_unknown_type_name() {
        let err = Type::from_name("NoSuchClass").unwrap_err();
        assert!(matches!(err, BridgeError::UnknownType(ref name) if name == "NoSuchClass"));
        insta::assert_snapshot!(err.to_string(), @"unknown type name 'NoSuchClass'");
    }

    #[test]
    fn test_cannot_register_under_a_non_object_parent() {
        let err = Type::register_object("UnitTestBadParent", Type::I32).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"invalid type: gint is not a(n) GObject");
    }

    #[test]
    fn test_dynamic_conversions() {
        assert_eq!(Dynamic::from(true), Dynamic::Bool(true));
        assert_eq!(Dynamic::from(-3i8), Dynamic::I8(-3));
        assert_eq!(Dynamic::from(7u64), Dynamic::U64(7));
        assert_eq!(Dynamic::from(1.5f32), Dynamic::F32(1.5));
        assert_eq!(Dynamic::from("hi"), Dynamic::String("hi".to_string()));
        assert_eq!(Dynamic::from(()), Dynamic::None);
        assert_eq!(Dynamic::from(None::<Object>), Dynamic::Object(None));
        assert_eq!(Dynamic::from(vec![Dynamic::I32(1)]), Dynamic::List(vec![Dynamic::I32(1)]));
    }

    #[test]
    fn test_dynamic_display() {
        assert_eq!(Dynamic::None.to_string(), "none");
        assert_eq!(Dynamic::I32(-42).to_string(), "-42");
        assert_eq!(Dynamic::String("text".to_string()).to_string(), "text");
        assert_eq!(Dynamic::Object(None).to_string(), "<null object>");
        assert_eq!(
            Dynamic::List(vec![Dynamic::Bool(true), Dynamic::U8(9)]).to_string(),
            "[true, 9]"
        );
    }

    #[test]
    fn test_from_dynamic_accepts_matching_variants() {
        assert_eq!(i32::from_dynamic(Dynamic::I32(5)), 5);
        assert_eq!(i64::from_dynamic(Dynamic::Long(-5)), -5);
        assert_eq!(u64::from_dynamic(Dynamic::ULong(5)), 5);
        assert_eq!(Option::<String>::from_dynamic(Dynamic::None), None);
        assert_eq!(String::from_dynamic(Dynamic::String("a".into())), "a");
        assert_eq!(Dynamic::from_dynamic(Dynamic::F64(0.25)), Dynamic::F64(0.25));
    }

    #[test]
    #[should_panic(expected = "expected a i32 argument, got string")]
    fn test_from_dynamic_panics_on_mismatch() {
        i32::from_dynamic(Dynamic::String("42".to_string()));
    }

    #[test]
    fn test_typecheck_policy_parsing() {
        assert_eq!(TypecheckPolicy::parse("warn"), Some(TypecheckPolicy::Warn));
        assert_eq!(TypecheckPolicy::parse(" STRICT "), Some(TypecheckPolicy::Strict));
        assert_eq!(TypecheckPolicy::parse("loud"), None);

        let config = BridgeConfig::default();
        assert_eq!(config.typecheck, TypecheckPolicy::Warn);
        assert!(!config.trace_dispatch);
    }

    #[test]
    fn test_error_messages() {
        insta::assert_snapshot!(BridgeError::NullPointer.to_string(), @"unexpected nil pointer");
        insta::assert_snapshot!(
            BridgeError::ConversionNotImplemented("i16".to_string()).to_string(),
            @"conversion not implemented for i16"
        );
        insta::assert_snapshot!(
            BridgeError::UnknownClass("GtkFancyWidget".to_string()).to_string(),
            @"unrecognized class name 'GtkFancyWidget'"
        );
        let nested = BridgeError::Argument {
            index: 2,
            source: Box::new(BridgeError::ConversionNotImplemented("list".to_string())),
        };
        insta::assert_snapshot!(nested.to_string(), @"argument 2: conversion not implemented for list");
    }

    #[test]
    fn test_value_clone_is_independent() {
        let mut original = Value::for_type(Type::STRING);
        original.set_string("first").unwrap();
        let copy = original.clone();
        original.set_string("second").unwrap();

        assert_eq!(copy.get_string().unwrap(), "first");
        assert_eq!(original.get_string().unwrap(), "second");
    }

    #[test]
    fn test_interior_nul_is_an_error() {
        let err = Value::from_managed(&Dynamic::String("a\0b".to_string())).unwrap_err();
        assert!(matches!(err, BridgeError::InteriorNul(_)));
    }

    #[test]
    fn test_wrapper_static_type_and_downcast() {
        let widget = widget_type();
        assert_eq!(UnitWidget::static_type(), widget);
        assert_eq!(UnitWidget::CLASS_NAME, "UnitTestWidget");

        let object = Object::new(widget).unwrap();
        assert!(object.is::<UnitWidget>());
        let wrapped: UnitWidget = object.downcast().unwrap();
        assert_eq!(wrapped.native(), wrapped.as_ptr());

        let plain = Object::new(Type::OBJECT).unwrap();
        let back = plain.downcast::<UnitWidget>().unwrap_err();
        assert_eq!(back.type_(), Type::OBJECT);
    }

    /// Reinstalls the saved config when the test unwinds.
    struct RestoreConfig(BridgeConfig);

    impl Drop for RestoreConfig {
        fn drop(&mut self) {
            config::init(self.0.clone());
        }
    }

    #[test]
    #[should_panic(expected = "UnitTestWidget: invalid type: GObject is not a(n) UnitTestWidget")]
    fn test_strict_policy_panics_on_mismatch() {
        widget_type();
        let saved = config::current();
        let _restore = RestoreConfig(saved.clone());
        config::init(BridgeConfig { typecheck: TypecheckPolicy::Strict, ..saved });

        let wrong = UnitWidget::from_object_unchecked(Object::new(Type::OBJECT).unwrap());
        wrong.native();
    }

    #[test]
    fn test_class_table_cast() {
        let widget = widget_type();
        let mut table = ClassTable::new();
        table.register::<UnitWidget>().register::<Object>();
        assert_eq!(table.len(), 2);
        assert!(table.contains("UnitTestWidget"));

        let cast = table.cast(Object::new(widget).unwrap()).unwrap();
        assert_eq!(cast.class_name(), "UnitTestWidget");
        assert!(cast.downcast_ref::<UnitWidget>().is_some());

        let other = Type::register_object("UnitTestUnlisted", Type::OBJECT).unwrap();
        let err = table.cast(Object::new(other).unwrap()).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"unrecognized class name 'UnitTestUnlisted'");
    }
}

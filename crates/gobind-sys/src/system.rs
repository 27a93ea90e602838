use std::os::raw::{c_char, c_double, c_float, c_int, c_long, c_uint, c_ulong};

use crate::*;

// GObject type system, objects, values, closures and signals
#[link(name = "gobject-2.0")]
extern "C" {
    pub fn g_type_name(type_: GType) -> *const c_char;
    pub fn g_type_from_name(name: *const c_char) -> GType;
    pub fn g_type_parent(type_: GType) -> GType;
    pub fn g_type_depth(type_: GType) -> c_uint;
    pub fn g_type_fundamental(type_id: GType) -> GType;
    pub fn g_type_is_a(type_: GType, is_a_type: GType) -> gboolean;
    pub fn g_type_register_static_simple(
        parent_type: GType,
        type_name: *const c_char,
        class_size: c_uint,
        class_init: GClassInitFunc,
        instance_size: c_uint,
        instance_init: GInstanceInitFunc,
        flags: GTypeFlags,
    ) -> GType;
    pub fn g_initially_unowned_get_type() -> GType;
    pub fn g_type_class_ref(type_: GType) -> gpointer;

    pub fn g_param_spec_boolean(
        name: *const c_char,
        nick: *const c_char,
        blurb: *const c_char,
        default_value: gboolean,
        flags: GParamFlags,
    ) -> *mut GParamSpec;
    pub fn g_param_spec_char(
        name: *const c_char,
        nick: *const c_char,
        blurb: *const c_char,
        minimum: i8,
        maximum: i8,
        default_value: i8,
        flags: GParamFlags,
    ) -> *mut GParamSpec;
    pub fn g_param_spec_uchar(
        name: *const c_char,
        nick: *const c_char,
        blurb: *const c_char,
        minimum: u8,
        maximum: u8,
        default_value: u8,
        flags: GParamFlags,
    ) -> *mut GParamSpec;
    pub fn g_param_spec_int(
        name: *const c_char,
        nick: *const c_char,
        blurb: *const c_char,
        minimum: c_int,
        maximum: c_int,
        default_value: c_int,
        flags: GParamFlags,
    ) -> *mut GParamSpec;
    pub fn g_param_spec_uint(
        name: *const c_char,
        nick: *const c_char,
        blurb: *const c_char,
        minimum: c_uint,
        maximum: c_uint,
        default_value: c_uint,
        flags: GParamFlags,
    ) -> *mut GParamSpec;
    pub fn g_param_spec_long(
        name: *const c_char,
        nick: *const c_char,
        blurb: *const c_char,
        minimum: c_long,
        maximum: c_long,
        default_value: c_long,
        flags: GParamFlags,
    ) -> *mut GParamSpec;
    pub fn g_param_spec_ulong(
        name: *const c_char,
        nick: *const c_char,
        blurb: *const c_char,
        minimum: c_ulong,
        maximum: c_ulong,
        default_value: c_ulong,
        flags: GParamFlags,
    ) -> *mut GParamSpec;
    pub fn g_param_spec_int64(
        name: *const c_char,
        nick: *const c_char,
        blurb: *const c_char,
        minimum: i64,
        maximum: i64,
        default_value: i64,
        flags: GParamFlags,
    ) -> *mut GParamSpec;
    pub fn g_param_spec_uint64(
        name: *const c_char,
        nick: *const c_char,
        blurb: *const c_char,
        minimum: u64,
        maximum: u64,
        default_value: u64,
        flags: GParamFlags,
    ) -> *mut GParamSpec;
    pub fn g_param_spec_float(
        name: *const c_char,
        nick: *const c_char,
        blurb: *const c_char,
        minimum: c_float,
        maximum: c_float,
        default_value: c_float,
        flags: GParamFlags,
    ) -> *mut GParamSpec;
    pub fn g_param_spec_double(
        name: *const c_char,
        nick: *const c_char,
        blurb: *const c_char,
        minimum: c_double,
        maximum: c_double,
        default_value: c_double,
        flags: GParamFlags,
    ) -> *mut GParamSpec;
    pub fn g_param_spec_string(
        name: *const c_char,
        nick: *const c_char,
        blurb: *const c_char,
        default_value: *const c_char,
        flags: GParamFlags,
    ) -> *mut GParamSpec;
    pub fn g_param_spec_pointer(
        name: *const c_char,
        nick: *const c_char,
        blurb: *const c_char,
        flags: GParamFlags,
    ) -> *mut GParamSpec;
    pub fn g_param_spec_object(
        name: *const c_char,
        nick: *const c_char,
        blurb: *const c_char,
        object_type: GType,
        flags: GParamFlags,
    ) -> *mut GParamSpec;
    pub fn g_param_spec_get_default_value(pspec: *mut GParamSpec) -> *const GValue;
    pub fn g_object_class_install_property(
        oclass: *mut GObjectClass,
        property_id: c_uint,
        pspec: *mut GParamSpec,
    );
    pub fn g_object_class_find_property(
        oclass: *mut GObjectClass,
        property_name: *const c_char,
    ) -> *mut GParamSpec;
    pub fn g_object_set_property(object: *mut GObject, property_name: *const c_char, value: *const GValue);
    pub fn g_object_get_property(object: *mut GObject, property_name: *const c_char, value: *mut GValue);

    pub fn g_object_new_with_properties(
        object_type: GType,
        n_properties: c_uint,
        names: *mut *const c_char,
        values: *const GValue,
    ) -> *mut GObject;
    pub fn g_object_ref(object: *mut GObject) -> *mut GObject;
    pub fn g_object_unref(object: *mut GObject);
    pub fn g_object_ref_sink(object: *mut GObject) -> *mut GObject;
    pub fn g_object_is_floating(object: *mut GObject) -> gboolean;
    pub fn g_object_force_floating(object: *mut GObject);
    pub fn g_object_weak_ref(object: *mut GObject, notify: GWeakNotify, data: gpointer);
    pub fn g_object_weak_unref(object: *mut GObject, notify: GWeakNotify, data: gpointer);

    pub fn g_value_init(value: *mut GValue, g_type: GType) -> *mut GValue;
    pub fn g_value_unset(value: *mut GValue);
    pub fn g_value_copy(src_value: *const GValue, dest_value: *mut GValue);
    pub fn g_value_type_compatible(src_type: GType, dest_type: GType) -> gboolean;
    pub fn g_value_type_transformable(src_type: GType, dest_type: GType) -> gboolean;
    pub fn g_value_transform(src_value: *const GValue, dest_value: *mut GValue) -> gboolean;
    pub fn g_value_set_boolean(value: *mut GValue, v_boolean: gboolean);
    pub fn g_value_get_boolean(value: *const GValue) -> gboolean;
    pub fn g_value_set_schar(value: *mut GValue, v_char: i8);
    pub fn g_value_get_schar(value: *const GValue) -> i8;
    pub fn g_value_set_uchar(value: *mut GValue, v_uchar: u8);
    pub fn g_value_get_uchar(value: *const GValue) -> u8;
    pub fn g_value_set_int(value: *mut GValue, v_int: c_int);
    pub fn g_value_get_int(value: *const GValue) -> c_int;
    pub fn g_value_set_uint(value: *mut GValue, v_uint: c_uint);
    pub fn g_value_get_uint(value: *const GValue) -> c_uint;
    pub fn g_value_set_long(value: *mut GValue, v_long: c_long);
    pub fn g_value_get_long(value: *const GValue) -> c_long;
    pub fn g_value_set_ulong(value: *mut GValue, v_ulong: c_ulong);
    pub fn g_value_get_ulong(value: *const GValue) -> c_ulong;
    pub fn g_value_set_int64(value: *mut GValue, v_int64: i64);
    pub fn g_value_get_int64(value: *const GValue) -> i64;
    pub fn g_value_set_uint64(value: *mut GValue, v_uint64: u64);
    pub fn g_value_get_uint64(value: *const GValue) -> u64;
    pub fn g_value_set_float(value: *mut GValue, v_float: c_float);
    pub fn g_value_get_float(value: *const GValue) -> c_float;
    pub fn g_value_set_double(value: *mut GValue, v_double: c_double);
    pub fn g_value_get_double(value: *const GValue) -> c_double;
    pub fn g_value_set_string(value: *mut GValue, v_string: *const c_char);
    pub fn g_value_get_string(value: *const GValue) -> *const c_char;
    pub fn g_value_set_pointer(value: *mut GValue, v_pointer: gpointer);
    pub fn g_value_get_pointer(value: *const GValue) -> gpointer;
    pub fn g_value_set_object(value: *mut GValue, v_object: gpointer);
    pub fn g_value_get_object(value: *const GValue) -> *mut GObject;

    pub fn g_closure_new_simple(sizeof_closure: c_uint, data: gpointer) -> *mut GClosure;
    pub fn g_closure_set_marshal(closure: *mut GClosure, marshal: GClosureMarshal);
    pub fn g_closure_ref(closure: *mut GClosure) -> *mut GClosure;
    pub fn g_closure_sink(closure: *mut GClosure);
    pub fn g_closure_unref(closure: *mut GClosure);
    pub fn g_closure_invalidate(closure: *mut GClosure);
    pub fn g_closure_invoke(
        closure: *mut GClosure,
        return_value: *mut GValue,
        n_param_values: c_uint,
        param_values: *const GValue,
        invocation_hint: gpointer,
    );
    pub fn g_closure_add_finalize_notifier(
        closure: *mut GClosure,
        notify_data: gpointer,
        notify_func: GClosureNotify,
    );
    pub fn g_closure_add_invalidate_notifier(
        closure: *mut GClosure,
        notify_data: gpointer,
        notify_func: GClosureNotify,
    );

    pub fn g_signal_newv(
        signal_name: *const c_char,
        itype: GType,
        signal_flags: GSignalFlags,
        class_closure: *mut GClosure,
        accumulator: GSignalAccumulator,
        accu_data: gpointer,
        c_marshaller: GClosureMarshal,
        return_type: GType,
        n_params: c_uint,
        param_types: *mut GType,
    ) -> c_uint;
    pub fn g_signal_lookup(name: *const c_char, itype: GType) -> c_uint;
    pub fn g_signal_query(signal_id: c_uint, query: *mut GSignalQuery);
    pub fn g_signal_connect_closure(
        instance: gpointer,
        detailed_signal: *const c_char,
        closure: *mut GClosure,
        after: gboolean,
    ) -> c_ulong;
    pub fn g_signal_handler_disconnect(instance: gpointer, handler_id: c_ulong);
    pub fn g_signal_handler_block(instance: gpointer, handler_id: c_ulong);
    pub fn g_signal_handler_unblock(instance: gpointer, handler_id: c_ulong);
    pub fn g_signal_handler_is_connected(instance: gpointer, handler_id: c_ulong) -> gboolean;
    pub fn g_signal_emitv(
        instance_and_params: *const GValue,
        signal_id: c_uint,
        detail: GQuark,
        return_value: *mut GValue,
    );
    pub fn g_signal_stop_emission_by_name(instance: gpointer, detailed_signal: *const c_char);

    pub fn g_source_set_closure(source: *mut GSource, closure: *mut GClosure);
}

// GLib main loop
#[link(name = "glib-2.0")]
extern "C" {
    pub fn g_main_context_new() -> *mut GMainContext;
    pub fn g_main_context_default() -> *mut GMainContext;
    pub fn g_main_context_ref(context: *mut GMainContext) -> *mut GMainContext;
    pub fn g_main_context_unref(context: *mut GMainContext);
    pub fn g_main_context_iteration(context: *mut GMainContext, may_block: gboolean) -> gboolean;
    pub fn g_main_context_pending(context: *mut GMainContext) -> gboolean;
    pub fn g_main_context_wakeup(context: *mut GMainContext);
    pub fn g_main_context_find_source_by_id(
        context: *mut GMainContext,
        source_id: c_uint,
    ) -> *mut GSource;

    pub fn g_idle_source_new() -> *mut GSource;
    pub fn g_timeout_source_new(interval: c_uint) -> *mut GSource;
    pub fn g_source_attach(source: *mut GSource, context: *mut GMainContext) -> c_uint;
    pub fn g_source_destroy(source: *mut GSource);
    pub fn g_source_unref(source: *mut GSource);
    pub fn g_source_remove(tag: c_uint) -> gboolean;

    pub fn g_main_loop_new(context: *mut GMainContext, is_running: gboolean) -> *mut GMainLoop;
    pub fn g_main_loop_run(loop_: *mut GMainLoop);
    pub fn g_main_loop_quit(loop_: *mut GMainLoop);
    pub fn g_main_loop_is_running(loop_: *mut GMainLoop) -> gboolean;
    pub fn g_main_loop_get_context(loop_: *mut GMainLoop) -> *mut GMainContext;
    pub fn g_main_loop_unref(loop_: *mut GMainLoop);
}

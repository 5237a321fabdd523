//! Property tests for the entity facade

use mgmt_core::{DynamicMap, Entity, ErrorContext, NativeRuntime, Value};
use proptest::prelude::*;

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        "[a-z0-9.:]{0,12}".prop_map(Value::String),
        any::<i64>().prop_map(Value::Integer),
        any::<bool>().prop_map(Value::Boolean),
    ]
}

fn attribute_name() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9]{0,15}"
}

fn fresh_entity() -> Entity {
    Entity::from_map(NativeRuntime::new().new_map())
}

proptest! {
    #[test]
    fn has_tracks_set_and_clear(name in attribute_name(), value in scalar()) {
        let entity = fresh_entity();
        let mut ctx = ErrorContext::new();

        prop_assert!(entity.set(&mut ctx, &name, Some(value)).is_none());
        prop_assert!(entity.has(&name));

        prop_assert!(entity.clear(&mut ctx, &name).is_none());
        prop_assert!(!entity.has(&name));
        prop_assert!(ctx.code().is_none());
    }

    #[test]
    fn absent_attribute_yields_default(
        name in attribute_name(),
        default in proptest::option::of("[a-z]{0,8}"),
    ) {
        let entity = fresh_entity();
        let mut ctx = ErrorContext::new();

        let got = entity.get_opt_string(&mut ctx, &name, default.as_deref());
        prop_assert_eq!(got, default);
        prop_assert!(ctx.code().is_none());
    }

    #[test]
    fn list_collects_values_in_order(
        name in attribute_name(),
        values in proptest::collection::vec(scalar(), 0..8),
    ) {
        let entity = fresh_entity();
        let mut ctx = ErrorContext::new();

        prop_assert!(entity.set_list(&mut ctx, &name).is_none());
        for value in &values {
            prop_assert!(entity.set(&mut ctx, &name, Some(value.clone())).is_none());
        }

        prop_assert_eq!(entity.object().get(&name).unwrap(), Value::List(values));
    }

    #[test]
    fn clearing_twice_never_errors(name in attribute_name()) {
        let entity = fresh_entity();
        let mut ctx = ErrorContext::new();

        prop_assert!(entity.set(&mut ctx, &name, None).is_none());
        prop_assert!(entity.clear(&mut ctx, &name).is_none());
        prop_assert!(ctx.code().is_none());
    }

    #[test]
    fn integers_round_trip(name in attribute_name(), num in any::<i64>()) {
        let entity = fresh_entity();
        let mut ctx = ErrorContext::new();

        entity.set_integer(&mut ctx, &name, Some(num));
        prop_assert_eq!(entity.get_integer(&mut ctx, &name), num);
        prop_assert_eq!(entity.get_string(&mut ctx, &name), Some(num.to_string()));
        prop_assert!(ctx.code().is_none());
    }
}

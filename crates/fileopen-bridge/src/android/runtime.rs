// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `HostRuntime` over `java.lang.reflect` through JNI.
//
// Every handle is a `GlobalRef`, so values survive across the many JNI
// calls one patch makes. A Java exception raised by any call is cleared
// before the error is returned; the caller sees a `FileOpenError`, the VM
// sees nothing pending.

use jni::JNIEnv;
use jni::objects::{GlobalRef, JObject, JObjectArray, JString, JValue};

use fileopen_core::error::{FileOpenError, Result};

use super::jni_err;
use crate::traits::HostRuntime;

/// Reflection on the ART runtime through a borrowed [`JNIEnv`].
pub struct JniRuntime<'a, 'local> {
    env: &'a mut JNIEnv<'local>,
}

impl<'a, 'local> JniRuntime<'a, 'local> {
    pub fn new(env: &'a mut JNIEnv<'local>) -> Self {
        Self { env }
    }

    fn fault(&mut self, context: &str, e: jni::errors::Error) -> FileOpenError {
        jni_err(self.env, context, e)
    }

    fn global(&mut self, object: &JObject<'_>) -> Result<GlobalRef> {
        self.env
            .new_global_ref(object)
            .map_err(|e| self.fault("new_global_ref", e))
    }

    /// Call a method returning an object; `None` for a null result.
    fn call_object(
        &mut self,
        target: &GlobalRef,
        name: &str,
        sig: &str,
        args: &[JValue<'_, '_>],
    ) -> Result<Option<GlobalRef>> {
        let value = self
            .env
            .call_method(target.as_obj(), name, sig, args)
            .and_then(|v| v.l())
            .map_err(|e| self.fault(name, e))?;
        if value.is_null() {
            return Ok(None);
        }
        self.global(&value).map(Some)
    }

    fn call_string(&mut self, target: &GlobalRef, name: &str) -> Result<String> {
        let value = self
            .env
            .call_method(target.as_obj(), name, "()Ljava/lang/String;", &[])
            .and_then(|v| v.l())
            .map_err(|e| self.fault(name, e))?;
        if value.is_null() {
            return Err(FileOpenError::Bridge(format!("{name} returned null")));
        }
        let value = JString::from(value);
        let text = self
            .env
            .get_string(&value)
            .map_err(|e| self.fault("get_string", e))?;
        Ok(text.into())
    }
}

impl HostRuntime for JniRuntime<'_, '_> {
    type Handle = GlobalRef;

    fn find_class(&mut self, name: &str) -> Result<GlobalRef> {
        let class = self
            .env
            .find_class(name)
            .map_err(|e| self.fault("find_class", e))?;
        self.global(&class)
    }

    fn class_of(&mut self, object: &GlobalRef) -> Result<GlobalRef> {
        let class = self
            .env
            .get_object_class(object.as_obj())
            .map_err(|e| self.fault("get_object_class", e))?;
        self.global(&class)
    }

    fn declared_fields(&mut self, class: &GlobalRef) -> Result<Vec<GlobalRef>> {
        let array = self
            .env
            .call_method(
                class.as_obj(),
                "getDeclaredFields",
                "()[Ljava/lang/reflect/Field;",
                &[],
            )
            .and_then(|v| v.l())
            .map_err(|e| self.fault("Class.getDeclaredFields", e))?;
        let array = JObjectArray::from(array);
        let len = self
            .env
            .get_array_length(&array)
            .map_err(|e| self.fault("get_array_length", e))?;

        let mut fields = Vec::with_capacity(len.max(0) as usize);
        for i in 0..len {
            let field = self
                .env
                .get_object_array_element(&array, i)
                .map_err(|e| self.fault("get_object_array_element", e))?;
            fields.push(self.global(&field)?);
            // Large classes would otherwise exhaust the local reference table.
            let _ = self.env.delete_local_ref(field);
        }
        Ok(fields)
    }

    fn field_name(&mut self, field: &GlobalRef) -> Result<String> {
        self.call_string(field, "getName")
    }

    fn set_accessible(&mut self, field: &GlobalRef) -> Result<()> {
        self.env
            .call_method(field.as_obj(), "setAccessible", "(Z)V", &[JValue::Bool(1)])
            .map_err(|e| self.fault("Field.setAccessible", e))?;
        Ok(())
    }

    fn get_field(&mut self, field: &GlobalRef, target: &GlobalRef) -> Result<Option<GlobalRef>> {
        self.call_object(
            field,
            "get",
            "(Ljava/lang/Object;)Ljava/lang/Object;",
            &[JValue::Object(target.as_obj())],
        )
    }

    fn set_field(
        &mut self,
        field: &GlobalRef,
        target: &GlobalRef,
        value: &GlobalRef,
    ) -> Result<()> {
        self.env
            .call_method(
                field.as_obj(),
                "set",
                "(Ljava/lang/Object;Ljava/lang/Object;)V",
                &[JValue::Object(target.as_obj()), JValue::Object(value.as_obj())],
            )
            .map_err(|e| self.fault("Field.set", e))?;
        Ok(())
    }

    fn package_name(&mut self, context: &GlobalRef) -> Result<String> {
        self.call_string(context, "getPackageName")
    }

    fn map_lookup(&mut self, map: &GlobalRef, key: &str) -> Result<Option<GlobalRef>> {
        let key = self
            .env
            .new_string(key)
            .map_err(|e| self.fault("new_string(key)", e))?;
        self.call_object(
            map,
            "get",
            "(Ljava/lang/Object;)Ljava/lang/Object;",
            &[JValue::Object(&key)],
        )
    }

    fn weak_referent(&mut self, weak: &GlobalRef) -> Result<Option<GlobalRef>> {
        self.call_object(weak, "get", "()Ljava/lang/Object;", &[])
    }
}

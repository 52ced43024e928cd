// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ContentResolver and MimeTypeMap access over JNI.

use std::io::{self, Read};

use jni::JNIEnv;
use jni::objects::{GlobalRef, JByteArray, JObject, JString, JValue};
use jni::sys::jint;
use tracing::{debug, warn};

use fileopen_core::error::{FileOpenError, Result};
use fileopen_core::types::PickerUri;

use super::{jni_env, jni_err};
use crate::traits::{ContentResolver, MimeTypeRegistry};

/// Cursor column holding a document's user-facing name.
const DISPLAY_NAME_COLUMN: &str = "_display_name";

/// `android.content.ContentResolver` reached through a `Context`.
pub struct AndroidContentResolver {
    context: GlobalRef,
    chunk_size: usize,
}

impl AndroidContentResolver {
    pub fn new(context: GlobalRef, chunk_size: usize) -> Self {
        Self {
            context,
            chunk_size: chunk_size.max(1),
        }
    }
}

/// `ContentResolver.query(Uri, String[], String, String[], String)`
const QUERY_SIG: &str = concat!(
    "(Landroid/net/Uri;[Ljava/lang/String;Ljava/lang/String;",
    "[Ljava/lang/String;Ljava/lang/String;)Landroid/database/Cursor;"
);

/// `context.getContentResolver()`
fn content_resolver<'local>(
    env: &mut JNIEnv<'local>,
    context: &JObject<'_>,
) -> Result<JObject<'local>> {
    env.call_method(
        context,
        "getContentResolver",
        "()Landroid/content/ContentResolver;",
        &[],
    )
    .map_err(|e| jni_err(env, "getContentResolver", e))?
    .l()
    .map_err(|e| jni_err(env, "getContentResolver->l", e))
}

/// `Uri.parse(uri)`
fn parse_uri<'local>(env: &mut JNIEnv<'local>, uri: &PickerUri) -> Result<JObject<'local>> {
    let j_uri: JString = env
        .new_string(uri.as_str())
        .map_err(|e| jni_err(env, "new_string(uri)", e))?;
    env.call_static_method(
        "android/net/Uri",
        "parse",
        "(Ljava/lang/String;)Landroid/net/Uri;",
        &[JValue::Object(&j_uri)],
    )
    .map_err(|e| jni_err(env, "Uri.parse", e))?
    .l()
    .map_err(|e| jni_err(env, "Uri.parse->l", e))
}

/// Copy a possibly-null `java.lang.String` out of the VM.
pub(crate) fn optional_string(env: &mut JNIEnv<'_>, value: JObject<'_>) -> Result<Option<String>> {
    if value.is_null() {
        return Ok(None);
    }
    let value = JString::from(value);
    let text = env
        .get_string(&value)
        .map_err(|e| jni_err(env, "get_string", e))?;
    Ok(Some(text.into()))
}

/// Read `_display_name` from the first row of `cursor`.
fn display_name_column(env: &mut JNIEnv<'_>, cursor: &JObject<'_>) -> Result<Option<String>> {
    let j_column: JString = env
        .new_string(DISPLAY_NAME_COLUMN)
        .map_err(|e| jni_err(env, "new_string(_display_name)", e))?;
    let index = env
        .call_method(
            cursor,
            "getColumnIndex",
            "(Ljava/lang/String;)I",
            &[JValue::Object(&j_column)],
        )
        .map_err(|e| jni_err(env, "Cursor.getColumnIndex", e))?
        .i()
        .map_err(|e| jni_err(env, "Cursor.getColumnIndex->i", e))?;
    if index < 0 {
        return Ok(None);
    }

    let has_row = env
        .call_method(cursor, "moveToFirst", "()Z", &[])
        .map_err(|e| jni_err(env, "Cursor.moveToFirst", e))?
        .z()
        .map_err(|e| jni_err(env, "Cursor.moveToFirst->z", e))?;
    if !has_row {
        return Ok(None);
    }

    let value = env
        .call_method(
            cursor,
            "getString",
            "(I)Ljava/lang/String;",
            &[JValue::Int(index)],
        )
        .map_err(|e| jni_err(env, "Cursor.getString", e))?
        .l()
        .map_err(|e| jni_err(env, "Cursor.getString->l", e))?;
    optional_string(env, value)
}

impl ContentResolver for AndroidContentResolver {
    type Stream = JavaInputStream;

    fn query_display_name(&self, uri: &PickerUri) -> Result<Option<String>> {
        let mut env = jni_env()?;
        let resolver = content_resolver(&mut env, self.context.as_obj())?;
        let j_uri = parse_uri(&mut env, uri)?;

        let null = JObject::null();
        let cursor = env
            .call_method(
                &resolver,
                "query",
                QUERY_SIG,
                &[
                    JValue::Object(&j_uri),
                    JValue::Object(&null),
                    JValue::Object(&null),
                    JValue::Object(&null),
                    JValue::Object(&null),
                ],
            )
            .map_err(|e| jni_err(&mut env, "ContentResolver.query", e))?
            .l()
            .map_err(|e| jni_err(&mut env, "ContentResolver.query->l", e))?;
        if cursor.is_null() {
            return Ok(None);
        }

        let name = display_name_column(&mut env, &cursor);

        // The cursor is closed whether or not the read succeeded.
        if let Err(e) = env.call_method(&cursor, "close", "()V", &[]) {
            let err = jni_err(&mut env, "Cursor.close", e);
            warn!(%uri, error = %err, "failed to close display-name cursor");
        }
        name
    }

    fn mime_type(&self, uri: &PickerUri) -> Option<String> {
        let lookup = || -> Result<Option<String>> {
            let mut env = jni_env()?;
            let resolver = content_resolver(&mut env, self.context.as_obj())?;
            let j_uri = parse_uri(&mut env, uri)?;
            let mime = env
                .call_method(
                    &resolver,
                    "getType",
                    "(Landroid/net/Uri;)Ljava/lang/String;",
                    &[JValue::Object(&j_uri)],
                )
                .map_err(|e| jni_err(&mut env, "ContentResolver.getType", e))?
                .l()
                .map_err(|e| jni_err(&mut env, "ContentResolver.getType->l", e))?;
            optional_string(&mut env, mime)
        };
        lookup().unwrap_or_else(|e| {
            debug!(%uri, error = %e, "content type lookup failed");
            None
        })
    }

    fn open_input_stream(&self, uri: &PickerUri) -> Result<Option<JavaInputStream>> {
        let mut env = jni_env()?;
        let resolver = content_resolver(&mut env, self.context.as_obj())?;
        let j_uri = parse_uri(&mut env, uri)?;

        // Allocated before the stream is opened so no failure can strand it.
        let chunk = jint::try_from(self.chunk_size).unwrap_or(jint::MAX);
        let buffer = env
            .new_byte_array(chunk)
            .map_err(|e| jni_err(&mut env, "new_byte_array", e))?;
        let buffer = env
            .new_global_ref(&buffer)
            .map_err(|e| jni_err(&mut env, "new_global_ref(buffer)", e))?;

        let stream = env
            .call_method(
                &resolver,
                "openInputStream",
                "(Landroid/net/Uri;)Ljava/io/InputStream;",
                &[JValue::Object(&j_uri)],
            )
            .map_err(|e| jni_err(&mut env, "openInputStream", e))?
            .l()
            .map_err(|e| jni_err(&mut env, "openInputStream->l", e))?;
        if stream.is_null() {
            return Ok(None);
        }

        let global = match env.new_global_ref(&stream) {
            Ok(global) => global,
            Err(e) => {
                let err = jni_err(&mut env, "new_global_ref(stream)", e);
                let _ = env.call_method(&stream, "close", "()V", &[]);
                let _ = env.exception_clear();
                return Err(err);
            }
        };

        debug!(%uri, chunk, "opened content input stream");
        Ok(Some(JavaInputStream {
            stream: global,
            buffer,
            chunk,
        }))
    }
}

/// A `java.io.InputStream` read through a reusable `byte[]`.
///
/// The Java stream is closed when this value is dropped.
pub struct JavaInputStream {
    stream: GlobalRef,
    buffer: GlobalRef,
    chunk: jint,
}

impl Read for JavaInputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut env = jni_env().map_err(io::Error::other)?;
        let want = jint::try_from(buf.len()).unwrap_or(jint::MAX).min(self.chunk);
        // SAFETY: `buffer` was created by `new_byte_array` and is kept alive by
        // its global reference; the wrapper does not delete it on drop.
        let array = unsafe { JByteArray::from_raw(self.buffer.as_obj().as_raw()) };

        let read = env
            .call_method(
                self.stream.as_obj(),
                "read",
                "([BII)I",
                &[JValue::Object(&array), JValue::Int(0), JValue::Int(want)],
            )
            .and_then(|v| v.i())
            .map_err(|e| io::Error::other(jni_err(&mut env, "InputStream.read", e)))?;
        // -1 marks end of stream.
        if read <= 0 {
            return Ok(0);
        }

        let read = read as usize;
        let mut scratch = vec![0i8; read];
        env.get_byte_array_region(&array, 0, &mut scratch)
            .map_err(|e| io::Error::other(jni_err(&mut env, "get_byte_array_region", e)))?;
        for (dst, src) in buf.iter_mut().zip(&scratch) {
            *dst = *src as u8;
        }
        Ok(read)
    }
}

impl Drop for JavaInputStream {
    fn drop(&mut self) {
        let mut env = match jni_env() {
            Ok(env) => env,
            Err(e) => {
                warn!(error = %e, "no JNI env to close input stream");
                return;
            }
        };
        if let Err(e) = env.call_method(self.stream.as_obj(), "close", "()V", &[]) {
            let err = jni_err(&mut env, "InputStream.close", e);
            warn!(error = %err, "failed to close input stream");
        }
    }
}

/// `android.webkit.MimeTypeMap.getSingleton()`
#[derive(Debug, Clone, Copy, Default)]
pub struct AndroidMimeTypeMap;

impl AndroidMimeTypeMap {
    fn lookup(mime: &str) -> Result<Option<String>> {
        let mut env = jni_env()?;
        let map = env
            .call_static_method(
                "android/webkit/MimeTypeMap",
                "getSingleton",
                "()Landroid/webkit/MimeTypeMap;",
                &[],
            )
            .map_err(|e| jni_err(&mut env, "MimeTypeMap.getSingleton", e))?
            .l()
            .map_err(|e| jni_err(&mut env, "MimeTypeMap.getSingleton->l", e))?;
        if map.is_null() {
            return Err(FileOpenError::Bridge("MimeTypeMap singleton is null".into()));
        }

        let j_mime: JString = env
            .new_string(mime)
            .map_err(|e| jni_err(&mut env, "new_string(mime)", e))?;
        let ext = env
            .call_method(
                &map,
                "getExtensionFromMimeType",
                "(Ljava/lang/String;)Ljava/lang/String;",
                &[JValue::Object(&j_mime)],
            )
            .map_err(|e| jni_err(&mut env, "getExtensionFromMimeType", e))?
            .l()
            .map_err(|e| jni_err(&mut env, "getExtensionFromMimeType->l", e))?;
        optional_string(&mut env, ext)
    }
}

impl MimeTypeRegistry for AndroidMimeTypeMap {
    fn extension_from_mime_type(&self, mime: &str) -> Option<String> {
        Self::lookup(mime).unwrap_or_else(|e| {
            debug!(%mime, error = %e, "MimeTypeMap lookup failed");
            None
        })
    }
}

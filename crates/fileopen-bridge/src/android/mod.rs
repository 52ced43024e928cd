// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Android host via JNI.
//
// Requires the Android NDK and targets `aarch64-linux-android` or
// `armv7-linux-androideabi`.
//
// ## Architecture notes
//
// An Activity cannot be subclassed from Rust, so the transient picker
// surface is a thin managed class, `dev.fileopen.FileOpenActivity`, whose
// lifecycle callbacks forward into the `extern "system"` functions at the
// bottom of this file:
//
//   onCreate(state)          -> nativeOnCreate(this)   (only when state == null)
//   onActivityResult(r, c, d) -> nativeOnActivityResult(this, r, c, d)
//
// `nativeOnCreate` registers the pending session before the picker intent
// is dispatched; `nativeOnActivityResult` resolves, publishes, and finishes
// the Activity. Native code starts the flow with [`open`], which only needs
// the `Context` published through `ndk-context`.
//
// `dev.fileopen.FileOpenBridge.attachClassLoader(loader, ctx)` is the managed
// entry point for the class-loader patch. The caller is responsible for any
// OS-version gating.

#![cfg(target_os = "android")]

mod resolver;
mod runtime;

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, OnceLock, PoisonError};

use jni::objects::{GlobalRef, JClass, JObject, JString, JValue};
use jni::sys::{jboolean, jint, JNI_FALSE, JNI_TRUE};
use jni::{JNIEnv, JavaVM};
use tracing::{debug, error, info, warn};

use fileopen_core::config::BridgeConfig;
use fileopen_core::error::{FileOpenError, Result};
use fileopen_core::types::PickerOutcome;

use crate::patcher::try_exclusive;
use crate::publisher::Publisher;
use crate::session::PickerSession;
use crate::traits::PickerSurface;
use crate::FileOpenBridge;

pub use resolver::{AndroidContentResolver, AndroidMimeTypeMap, JavaInputStream};
pub use runtime::JniRuntime;

/// Intent extra carrying the MIME filter from [`open`] to the surface.
pub const EXTRA_FILTER: &str = "dev.fileopen.extra.FILTER";

const ACTION_GET_CONTENT: &str = "android.intent.action.GET_CONTENT";
const CATEGORY_OPENABLE: &str = "android.intent.category.OPENABLE";
const FLAG_ACTIVITY_NEW_TASK: jint = 0x1000_0000;
const RESULT_OK: jint = -1;

static VM: OnceLock<JavaVM> = OnceLock::new();
static BRIDGE: OnceLock<FileOpenBridge> = OnceLock::new();
static PENDING: Mutex<Option<PendingSession>> = Mutex::new(None);
static PATCHING: Mutex<()> = Mutex::new(());

/// The session waiting on `onActivityResult`.
struct PendingSession {
    session: PickerSession<AndroidSurface>,
}

// ---------------------------------------------------------------------------
// JNI bootstrap helpers
// ---------------------------------------------------------------------------

/// Install the process-wide bridge. Returns `false` if one already exists.
pub fn init(config: BridgeConfig) -> bool {
    BRIDGE.set(FileOpenBridge::new(config)).is_ok()
}

/// The process-wide bridge, created with defaults on first use.
pub fn bridge() -> &'static FileOpenBridge {
    BRIDGE.get_or_init(FileOpenBridge::default)
}

/// Read handle on the published selection.
pub fn publisher() -> Publisher {
    bridge().publisher()
}

fn remember_vm(env: &JNIEnv<'_>) {
    if VM.get().is_none() {
        if let Ok(vm) = env.get_java_vm() {
            let _ = VM.set(vm);
        }
    }
}

fn java_vm() -> Result<&'static JavaVM> {
    if let Some(vm) = VM.get() {
        return Ok(vm);
    }
    let ctx = panic::catch_unwind(ndk_context::android_context)
        .map_err(|_| FileOpenError::PlatformUnavailable)?;
    if ctx.vm().is_null() {
        return Err(FileOpenError::Bridge("Android context has no JavaVM".into()));
    }
    // SAFETY: `ctx.vm()` is the `JavaVM*` installed by the NDK glue and stays
    // valid for the lifetime of the process.
    let vm = unsafe { JavaVM::from_raw(ctx.vm().cast()) }
        .map_err(|e| FileOpenError::Bridge(format!("failed to obtain JavaVM: {e}")))?;
    Ok(VM.get_or_init(|| vm))
}

/// A [`JNIEnv`] for the current thread, attaching it if needed.
pub(crate) fn jni_env() -> Result<JNIEnv<'static>> {
    java_vm()?
        .attach_current_thread_permanently()
        .map_err(|e| FileOpenError::Bridge(format!("failed to attach JNI thread: {e}")))
}

/// The `Context` published by the NDK glue.
fn host_context() -> Result<JObject<'static>> {
    let ctx = panic::catch_unwind(ndk_context::android_context)
        .map_err(|_| FileOpenError::PlatformUnavailable)?;
    let ptr = ctx.context();
    if ptr.is_null() {
        return Err(FileOpenError::Bridge("Android context is null".into()));
    }
    // SAFETY: the NDK guarantees this pointer is a valid global jobject for
    // the hosting Context.
    Ok(unsafe { JObject::from_raw(ptr.cast()) })
}

/// Map a `jni::errors::Error` into `FileOpenError::Bridge`, clearing any
/// Java exception the failed call left pending.
pub(crate) fn jni_err(env: &mut JNIEnv<'_>, context: &str, e: jni::errors::Error) -> FileOpenError {
    if env.exception_check().unwrap_or(false) {
        let _ = env.exception_describe();
        let _ = env.exception_clear();
    }
    FileOpenError::Bridge(format!("JNI {context}: {e}"))
}

// ---------------------------------------------------------------------------
// Picker surface
// ---------------------------------------------------------------------------

/// `FileOpenActivity` as a [`PickerSurface`].
pub struct AndroidSurface {
    activity: GlobalRef,
    request_code: jint,
    registered: Option<jint>,
}

impl AndroidSurface {
    pub fn new(activity: GlobalRef, request_code: jint) -> Self {
        Self {
            activity,
            request_code,
            registered: None,
        }
    }

    /// Point the surface at the Activity instance now in the foreground.
    ///
    /// A configuration change recreates the Activity while the picker is
    /// up; the result arrives at the new instance.
    pub fn rebind(&mut self, activity: GlobalRef) {
        self.activity = activity;
    }

    /// Whether `request_code` answers this surface's picker.
    pub fn accepts(&self, request_code: jint) -> bool {
        self.registered == Some(request_code)
    }
}

impl PickerSurface for AndroidSurface {
    fn register_result_callback(&mut self) -> Result<()> {
        self.registered = Some(self.request_code);
        debug!(request_code = self.request_code, "Android: result callback registered");
        Ok(())
    }

    fn launch_picker(&mut self, filter: &str) -> Result<()> {
        let Some(request_code) = self.registered else {
            return Err(FileOpenError::CallbackNotRegistered);
        };
        let mut env = jni_env()?;

        info!(%filter, "Android: launching ACTION_GET_CONTENT");

        let j_action: JString = env
            .new_string(ACTION_GET_CONTENT)
            .map_err(|e| jni_err(&mut env, "new_string(ACTION_GET_CONTENT)", e))?;
        let intent = env
            .new_object(
                "android/content/Intent",
                "(Ljava/lang/String;)V",
                &[JValue::Object(&j_action)],
            )
            .map_err(|e| jni_err(&mut env, "new Intent(GET_CONTENT)", e))?;

        let j_category: JString = env
            .new_string(CATEGORY_OPENABLE)
            .map_err(|e| jni_err(&mut env, "new_string(CATEGORY_OPENABLE)", e))?;
        env.call_method(
            &intent,
            "addCategory",
            "(Ljava/lang/String;)Landroid/content/Intent;",
            &[JValue::Object(&j_category)],
        )
        .map_err(|e| jni_err(&mut env, "addCategory(OPENABLE)", e))?;

        let j_filter: JString = env
            .new_string(filter)
            .map_err(|e| jni_err(&mut env, "new_string(filter)", e))?;
        env.call_method(
            &intent,
            "setType",
            "(Ljava/lang/String;)Landroid/content/Intent;",
            &[JValue::Object(&j_filter)],
        )
        .map_err(|e| jni_err(&mut env, "setType", e))?;

        env.call_method(
            self.activity.as_obj(),
            "startActivityForResult",
            "(Landroid/content/Intent;I)V",
            &[JValue::Object(&intent), JValue::Int(request_code)],
        )
        .map_err(|e| jni_err(&mut env, "startActivityForResult(GET_CONTENT)", e))?;

        info!(request_code, "Android: picker intent dispatched");
        Ok(())
    }

    fn finish(&mut self) {
        let mut env = match jni_env() {
            Ok(env) => env,
            Err(e) => {
                warn!(error = %e, "Android: cannot finish picker surface");
                return;
            }
        };
        if let Err(e) = env.call_method(self.activity.as_obj(), "finish", "()V", &[]) {
            let err = jni_err(&mut env, "Activity.finish", e);
            warn!(error = %err, "Android: picker surface did not finish");
        }
    }
}

// ---------------------------------------------------------------------------
// Entry points for native callers
// ---------------------------------------------------------------------------

/// Start `FileOpenActivity` from the NDK-published `Context`.
///
/// Returns once the Activity is requested; the selection is published
/// asynchronously and read through [`publisher`].
pub fn open(filter: Option<&str>) -> Result<()> {
    let mut env = jni_env()?;
    let context = host_context()?;
    open_from(&mut env, &context, filter)
}

/// Start `FileOpenActivity` from an explicit `Context`.
pub fn open_from(env: &mut JNIEnv<'_>, context: &JObject<'_>, filter: Option<&str>) -> Result<()> {
    let bridge = bridge();
    let filter = bridge.config().effective_filter(filter);
    let class_name = bridge.config().surface_activity_class.as_str();

    let intent = env
        .new_object("android/content/Intent", "()V", &[])
        .map_err(|e| jni_err(env, "new Intent()", e))?;

    let j_class: JString = env
        .new_string(class_name)
        .map_err(|e| jni_err(env, "new_string(class)", e))?;
    env.call_method(
        &intent,
        "setClassName",
        "(Landroid/content/Context;Ljava/lang/String;)Landroid/content/Intent;",
        &[JValue::Object(context), JValue::Object(&j_class)],
    )
    .map_err(|e| jni_err(env, "setClassName", e))?;

    let j_key: JString = env
        .new_string(EXTRA_FILTER)
        .map_err(|e| jni_err(env, "new_string(EXTRA_FILTER)", e))?;
    let j_filter: JString = env
        .new_string(filter)
        .map_err(|e| jni_err(env, "new_string(filter)", e))?;
    env.call_method(
        &intent,
        "putExtra",
        "(Ljava/lang/String;Ljava/lang/String;)Landroid/content/Intent;",
        &[JValue::Object(&j_key), JValue::Object(&j_filter)],
    )
    .map_err(|e| jni_err(env, "putExtra(filter)", e))?;

    // Outside an Activity the launch needs its own task.
    let is_activity = env
        .is_instance_of(context, "android/app/Activity")
        .map_err(|e| jni_err(env, "is_instance_of(Activity)", e))?;
    if !is_activity {
        env.call_method(
            &intent,
            "addFlags",
            "(I)Landroid/content/Intent;",
            &[JValue::Int(FLAG_ACTIVITY_NEW_TASK)],
        )
        .map_err(|e| jni_err(env, "addFlags(NEW_TASK)", e))?;
    }

    env.call_method(
        context,
        "startActivity",
        "(Landroid/content/Intent;)V",
        &[JValue::Object(&intent)],
    )
    .map_err(|e| jni_err(env, "startActivity(surface)", e))?;

    info!(%filter, activity = class_name, "Android: picker surface requested");
    Ok(())
}

/// Redirect the application's `LoadedApk` class loader to `class_loader`.
///
/// Not reentrant: a call made while another is in progress returns `false`.
pub fn attach_class_loader(
    env: &mut JNIEnv<'_>,
    class_loader: &JObject<'_>,
    context: &JObject<'_>,
) -> bool {
    let Some(_guard) = try_exclusive(&PATCHING) else {
        warn!("class loader patch already in progress");
        return false;
    };
    if class_loader.is_null() || context.is_null() {
        warn!("class loader patch called with a null argument");
        return false;
    }

    let loader = match env.new_global_ref(class_loader) {
        Ok(loader) => loader,
        Err(e) => {
            warn!(error = %jni_err(env, "new_global_ref(loader)", e), "class loader patch failed");
            return false;
        }
    };
    let ctx = match env.new_global_ref(context) {
        Ok(ctx) => ctx,
        Err(e) => {
            warn!(error = %jni_err(env, "new_global_ref(context)", e), "class loader patch failed");
            return false;
        }
    };

    let mut runtime = JniRuntime::new(env);
    bridge().patcher().attach(&mut runtime, &loader, &ctx)
}

// ---------------------------------------------------------------------------
// Surface lifecycle
// ---------------------------------------------------------------------------

fn pending() -> std::sync::MutexGuard<'static, Option<PendingSession>> {
    PENDING.lock().unwrap_or_else(PoisonError::into_inner)
}

/// `getIntent().getStringExtra(EXTRA_FILTER)`
fn requested_filter(env: &mut JNIEnv<'_>, activity: &JObject<'_>) -> Result<Option<String>> {
    let intent = env
        .call_method(activity, "getIntent", "()Landroid/content/Intent;", &[])
        .map_err(|e| jni_err(env, "getIntent", e))?
        .l()
        .map_err(|e| jni_err(env, "getIntent->l", e))?;
    if intent.is_null() {
        return Ok(None);
    }
    let j_key: JString = env
        .new_string(EXTRA_FILTER)
        .map_err(|e| jni_err(env, "new_string(EXTRA_FILTER)", e))?;
    let value = env
        .call_method(
            &intent,
            "getStringExtra",
            "(Ljava/lang/String;)Ljava/lang/String;",
            &[JValue::Object(&j_key)],
        )
        .map_err(|e| jni_err(env, "getStringExtra", e))?
        .l()
        .map_err(|e| jni_err(env, "getStringExtra->l", e))?;
    resolver::optional_string(env, value)
}

fn on_create(env: &mut JNIEnv<'_>, activity: &JObject<'_>) -> Result<()> {
    let bridge = bridge();
    let filter = requested_filter(env, activity)?;
    let activity = env
        .new_global_ref(activity)
        .map_err(|e| jni_err(env, "new_global_ref(activity)", e))?;

    let mut slot = pending();
    if let Some(stale) = slot.take() {
        warn!(session = %stale.session.id(), "Android: dropping stale picker session");
    }

    let surface = AndroidSurface::new(activity, bridge.config().request_code);
    let session = bridge.begin(surface, filter.as_deref())?;

    // Registered and parked before the picker can answer.
    let parked = slot.insert(PendingSession { session });
    if let Err(e) = parked.session.start() {
        *slot = None;
        return Err(e);
    }
    Ok(())
}

/// `data.getData().toString()`, or `Cancelled` for anything but a URI.
fn picked_outcome(
    env: &mut JNIEnv<'_>,
    result_code: jint,
    data: &JObject<'_>,
) -> Result<PickerOutcome> {
    if result_code != RESULT_OK || data.is_null() {
        return Ok(PickerOutcome::Cancelled);
    }
    let uri = env
        .call_method(data, "getData", "()Landroid/net/Uri;", &[])
        .map_err(|e| jni_err(env, "Intent.getData", e))?
        .l()
        .map_err(|e| jni_err(env, "Intent.getData->l", e))?;
    if uri.is_null() {
        return Ok(PickerOutcome::Cancelled);
    }
    let text = env
        .call_method(&uri, "toString", "()Ljava/lang/String;", &[])
        .map_err(|e| jni_err(env, "Uri.toString", e))?
        .l()
        .map_err(|e| jni_err(env, "Uri.toString->l", e))?;
    Ok(PickerOutcome::from_nullable(resolver::optional_string(env, text)?))
}

fn on_activity_result(
    env: &mut JNIEnv<'_>,
    activity: &JObject<'_>,
    request_code: jint,
    result_code: jint,
    data: &JObject<'_>,
) {
    let mut slot = pending();
    let Some(parked) = slot.as_mut() else {
        warn!(request_code, "Android: activity result with no pending session");
        return;
    };
    if !parked.session.surface().accepts(request_code) {
        debug!(request_code, "Android: ignoring foreign activity result");
        return;
    }

    let bridge = bridge();
    let activity = match env.new_global_ref(activity) {
        Ok(activity) => activity,
        Err(e) => {
            let e = jni_err(env, "new_global_ref(activity)", e);
            error!(error = %e, "Android: picker result dropped");
            return;
        }
    };
    parked.session.surface_mut().rebind(activity.clone());
    let resolver = bridge.resolver(
        AndroidContentResolver::new(activity, bridge.config().read_chunk_size),
        AndroidMimeTypeMap,
    );

    let outcome = picked_outcome(env, result_code, data).unwrap_or_else(|e| {
        warn!(error = %e, "Android: unreadable picker result; treating as cancelled");
        PickerOutcome::Cancelled
    });
    let id = parked.session.id();
    match bridge.complete(&mut parked.session, outcome, &resolver) {
        Ok(report) => info!(session = %id, ?report, "Android: picker session complete"),
        Err(e) => error!(session = %id, error = %e, "Android: picker result rejected"),
    }
    *slot = None;
}

// ---------------------------------------------------------------------------
// JNI exports
// ---------------------------------------------------------------------------

/// `FileOpenActivity.nativeOnCreate()`
#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub extern "system" fn Java_dev_fileopen_FileOpenActivity_nativeOnCreate<'local>(
    mut env: JNIEnv<'local>,
    activity: JObject<'local>,
) {
    remember_vm(&env);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| on_create(&mut env, &activity)));
    let failure = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(e)) => e.to_string(),
        Err(_) => "panic in nativeOnCreate".to_owned(),
    };
    error!(error = %failure, "Android: picker surface could not start");
    if env.call_method(&activity, "finish", "()V", &[]).is_err() {
        let _ = env.exception_clear();
    }
}

/// `FileOpenActivity.nativeOnActivityResult(int, int, Intent)`
#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub extern "system" fn Java_dev_fileopen_FileOpenActivity_nativeOnActivityResult<'local>(
    mut env: JNIEnv<'local>,
    activity: JObject<'local>,
    request_code: jint,
    result_code: jint,
    data: JObject<'local>,
) {
    remember_vm(&env);
    let handled = panic::catch_unwind(AssertUnwindSafe(|| {
        on_activity_result(&mut env, &activity, request_code, result_code, &data);
    }));
    if handled.is_err() {
        error!("Android: panic while handling picker result");
    }
}

/// `static FileOpenActivity.nativePing()`, used by the glue to confirm the
/// library is loaded.
#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub extern "system" fn Java_dev_fileopen_FileOpenActivity_nativePing<'local>(
    env: JNIEnv<'local>,
    _class: JClass<'local>,
) {
    remember_vm(&env);
    debug!("Android: native library linked");
}

/// `static boolean FileOpenBridge.attachClassLoader(ClassLoader, Context)`
#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub extern "system" fn Java_dev_fileopen_FileOpenBridge_attachClassLoader<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    class_loader: JObject<'local>,
    context: JObject<'local>,
) -> jboolean {
    remember_vm(&env);
    let attached = panic::catch_unwind(AssertUnwindSafe(|| {
        attach_class_loader(&mut env, &class_loader, &context)
    }))
    .unwrap_or(false);
    if env.exception_check().unwrap_or(false) {
        let _ = env.exception_clear();
    }
    if attached { JNI_TRUE } else { JNI_FALSE }
}

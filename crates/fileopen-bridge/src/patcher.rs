// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ClassLoaderPatcher — installs a caller-supplied class loader as the one
// the host runtime uses for the current package, so classes loaded from the
// application archive by a native launcher resolve through reflection.
//
// The walk is:
//
//   context --[activity_class.mMainThread]--> main-thread record
//           --[record class.mPackages]------> package name -> WeakReference
//           --[WeakReference.get()]---------> package record
//           --[record class.mClassLoader]---> overwritten with the new loader
//
// Slot names are private to the host and drift between releases, so they
// come from `PatcherConfig`. Every read happens before the single write, so
// a failure at any step leaves host state untouched.

use std::sync::{Mutex, MutexGuard, TryLockError};

use tracing::{debug, info, warn};

use fileopen_core::config::PatcherConfig;
use fileopen_core::error::{FileOpenError, Result};

use crate::traits::HostRuntime;

/// Rewrites the host's per-package class-loader binding.
///
/// Not reentrant: the host records it mutates are process-wide.
#[derive(Debug, Clone, Default)]
pub struct ClassLoaderPatcher {
    config: PatcherConfig,
}

impl ClassLoaderPatcher {
    pub fn new(config: PatcherConfig) -> Self {
        Self { config }
    }

    /// Install `class_loader` for the package `context` belongs to.
    ///
    /// Returns whether the loader was installed. Failures are logged and
    /// never propagated.
    pub fn attach<R: HostRuntime>(
        &self,
        runtime: &mut R,
        class_loader: &R::Handle,
        context: &R::Handle,
    ) -> bool {
        match self.try_attach(runtime, class_loader, context) {
            Ok(package) => {
                info!(%package, "class loader attached to package record");
                true
            }
            Err(e) => {
                warn!(error = %e, "class loader attach failed; host state unchanged");
                false
            }
        }
    }

    /// As [`attach`](Self::attach), returning the patched package name or
    /// the first failure.
    pub fn try_attach<R: HostRuntime>(
        &self,
        runtime: &mut R,
        class_loader: &R::Handle,
        context: &R::Handle,
    ) -> Result<String> {
        let cfg = &self.config;

        let activity_class = runtime.find_class(&cfg.activity_class)?;
        let main_thread_field =
            require_field(runtime, &activity_class, &cfg.activity_class, &cfg.main_thread_field)?;
        let main_thread =
            read_non_null(runtime, &main_thread_field, context, &cfg.main_thread_field)?;

        let thread_class = runtime.class_of(&main_thread)?;
        let packages_field =
            require_field(runtime, &thread_class, "main-thread record", &cfg.packages_field)?;
        let packages = read_non_null(runtime, &packages_field, &main_thread, &cfg.packages_field)?;

        let package = runtime.package_name(context)?;
        debug!(%package, "looking up package record");
        let weak = runtime
            .map_lookup(&packages, &package)?
            .ok_or_else(|| FileOpenError::PackageNotFound(package.clone()))?;
        let record = runtime
            .weak_referent(&weak)?
            .ok_or_else(|| FileOpenError::ReferentReclaimed(package.clone()))?;

        let record_class = runtime.class_of(&record)?;
        let loader_field =
            require_field(runtime, &record_class, "package record", &cfg.class_loader_field)?;
        runtime.set_field(&loader_field, &record, class_loader)?;

        Ok(package)
    }
}

/// First field declared directly on `class` named `name`.
///
/// Every field inspected along the way is made accessible, whatever its
/// visibility. Superclasses are not searched; pass the declaring class.
pub fn find_declared_field<R: HostRuntime>(
    runtime: &mut R,
    class: &R::Handle,
    name: &str,
) -> Result<Option<R::Handle>> {
    for field in runtime.declared_fields(class)? {
        runtime.set_accessible(&field)?;
        if runtime.field_name(&field)? == name {
            return Ok(Some(field));
        }
    }
    Ok(None)
}

fn require_field<R: HostRuntime>(
    runtime: &mut R,
    class: &R::Handle,
    class_label: &str,
    name: &str,
) -> Result<R::Handle> {
    find_declared_field(runtime, class, name)?.ok_or_else(|| FileOpenError::FieldNotFound {
        class: class_label.to_owned(),
        field: name.to_owned(),
    })
}

fn read_non_null<R: HostRuntime>(
    runtime: &mut R,
    field: &R::Handle,
    target: &R::Handle,
    name: &str,
) -> Result<R::Handle> {
    runtime
        .get_field(field, target)?
        .ok_or_else(|| FileOpenError::NullSlot {
            field: name.to_owned(),
        })
}

/// Take `lock` without waiting. `None` only while another holder is live;
/// a lock poisoned by an earlier panic is recovered.
pub(crate) fn try_exclusive<T>(lock: &Mutex<T>) -> Option<MutexGuard<'_, T>> {
    match lock.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => {
            debug!("recovering lock poisoned by an earlier panic");
            Some(poisoned.into_inner())
        }
        Err(TryLockError::WouldBlock) => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct H(usize);

    #[derive(Debug)]
    enum Node {
        Class { fields: Vec<usize> },
        Field { name: String, accessible: bool, writable: bool },
        Object { class: usize, slots: HashMap<String, Option<usize>>, package: Option<String> },
        Map(HashMap<String, usize>),
        Weak(Option<usize>),
    }

    /// Arena-backed stand-in for the host's reflection API.
    #[derive(Debug, Default)]
    struct FakeRuntime {
        nodes: Vec<Node>,
        classes: HashMap<String, usize>,
        writes: usize,
    }

    impl FakeRuntime {
        fn add(&mut self, node: Node) -> usize {
            self.nodes.push(node);
            self.nodes.len() - 1
        }

        fn class(&mut self, name: &str, fields: &[&str]) -> usize {
            let fields = fields
                .iter()
                .map(|f| {
                    self.add(Node::Field {
                        name: (*f).into(),
                        accessible: false,
                        writable: true,
                    })
                })
                .collect();
            let id = self.add(Node::Class { fields });
            self.classes.insert(name.into(), id);
            id
        }

        fn object(&mut self, class: usize, slots: &[(&str, Option<usize>)]) -> usize {
            let slots = slots.iter().map(|(k, v)| ((*k).to_owned(), *v)).collect();
            self.add(Node::Object { class, slots, package: None })
        }

        fn slot(&self, object: usize, name: &str) -> Option<usize> {
            match &self.nodes[object] {
                Node::Object { slots, .. } => slots.get(name).copied().flatten(),
                other => panic!("not an object: {other:?}"),
            }
        }

        fn field_of(&self, class: usize, name: &str) -> usize {
            match &self.nodes[class] {
                Node::Class { fields } => *fields
                    .iter()
                    .find(|f| matches!(&self.nodes[**f], Node::Field { name: n, .. } if n == name))
                    .expect("field exists"),
                other => panic!("not a class: {other:?}"),
            }
        }

        fn fail(msg: &str) -> FileOpenError {
            FileOpenError::Bridge(msg.into())
        }
    }

    impl HostRuntime for FakeRuntime {
        type Handle = H;

        fn find_class(&mut self, name: &str) -> Result<H> {
            self.classes
                .get(name)
                .map(|id| H(*id))
                .ok_or_else(|| Self::fail("ClassNotFoundException"))
        }

        fn class_of(&mut self, object: &H) -> Result<H> {
            match &self.nodes[object.0] {
                Node::Object { class, .. } => Ok(H(*class)),
                _ => Err(Self::fail("not an object")),
            }
        }

        fn declared_fields(&mut self, class: &H) -> Result<Vec<H>> {
            match &self.nodes[class.0] {
                Node::Class { fields } => Ok(fields.iter().map(|f| H(*f)).collect()),
                _ => Err(Self::fail("not a class")),
            }
        }

        fn field_name(&mut self, field: &H) -> Result<String> {
            match &self.nodes[field.0] {
                Node::Field { name, .. } => Ok(name.clone()),
                _ => Err(Self::fail("not a field")),
            }
        }

        fn set_accessible(&mut self, field: &H) -> Result<()> {
            match &mut self.nodes[field.0] {
                Node::Field { accessible, .. } => {
                    *accessible = true;
                    Ok(())
                }
                _ => Err(Self::fail("not a field")),
            }
        }

        fn get_field(&mut self, field: &H, target: &H) -> Result<Option<H>> {
            let Node::Field { name, accessible, .. } = &self.nodes[field.0] else {
                return Err(Self::fail("not a field"));
            };
            if !accessible {
                return Err(Self::fail("IllegalAccessException"));
            }
            match &self.nodes[target.0] {
                Node::Object { slots, .. } => slots
                    .get(name)
                    .map(|v| v.map(H))
                    .ok_or_else(|| Self::fail("IllegalArgumentException")),
                _ => Err(Self::fail("not an object")),
            }
        }

        fn set_field(&mut self, field: &H, target: &H, value: &H) -> Result<()> {
            let Node::Field { name, accessible, writable } = &self.nodes[field.0] else {
                return Err(Self::fail("not a field"));
            };
            if !accessible || !writable {
                return Err(Self::fail("IllegalAccessException"));
            }
            let name = name.clone();
            match &mut self.nodes[target.0] {
                Node::Object { slots, .. } if slots.contains_key(&name) => {
                    slots.insert(name, Some(value.0));
                    self.writes += 1;
                    Ok(())
                }
                _ => Err(Self::fail("IllegalArgumentException")),
            }
        }

        fn package_name(&mut self, context: &H) -> Result<String> {
            match &self.nodes[context.0] {
                Node::Object { package: Some(p), .. } => Ok(p.clone()),
                _ => Err(Self::fail("not a context")),
            }
        }

        fn map_lookup(&mut self, map: &H, key: &str) -> Result<Option<H>> {
            match &self.nodes[map.0] {
                Node::Map(entries) => Ok(entries.get(key).map(|v| H(*v))),
                _ => Err(Self::fail("not a map")),
            }
        }

        fn weak_referent(&mut self, weak: &H) -> Result<Option<H>> {
            match &self.nodes[weak.0] {
                Node::Weak(referent) => Ok(referent.map(H)),
                _ => Err(Self::fail("not a weak reference")),
            }
        }
    }

    const PACKAGE: &str = "dev.fileopen.demo";

    /// Host shaped like the real thing: Activity -> ActivityThread ->
    /// ArrayMap<String, WeakReference<LoadedApk>> -> LoadedApk.
    struct World {
        rt: FakeRuntime,
        context: usize,
        thread: usize,
        packages: usize,
        weak: usize,
        record: usize,
        old_loader: usize,
        new_loader: usize,
    }

    fn world() -> World {
        let mut rt = FakeRuntime::default();
        let loader_class = rt.class("java/lang/ClassLoader", &[]);
        let old_loader = rt.object(loader_class, &[]);
        let new_loader = rt.object(loader_class, &[]);

        let record_class = rt.class("android/app/LoadedApk", &["mPackageName", "mClassLoader"]);
        let record = rt.object(
            record_class,
            &[("mPackageName", None), ("mClassLoader", Some(old_loader))],
        );
        let weak = rt.add(Node::Weak(Some(record)));
        let packages = rt.add(Node::Map(HashMap::from([(PACKAGE.to_owned(), weak)])));

        let thread_class = rt.class("android/app/ActivityThread", &["mLooper", "mPackages"]);
        let thread = rt.object(thread_class, &[("mLooper", None), ("mPackages", Some(packages))]);

        let activity_class =
            rt.class("android/app/Activity", &["mTitle", "mMainThread", "mWindow"]);
        let context = rt.object(
            activity_class,
            &[("mTitle", None), ("mMainThread", Some(thread)), ("mWindow", None)],
        );
        if let Node::Object { package, .. } = &mut rt.nodes[context] {
            *package = Some(PACKAGE.into());
        }

        World { rt, context, thread, packages, weak, record, old_loader, new_loader }
    }

    impl World {
        fn attach(&mut self, patcher: &ClassLoaderPatcher) -> Result<String> {
            patcher.try_attach(&mut self.rt, &H(self.new_loader), &H(self.context))
        }

        fn installed_loader(&self) -> Option<usize> {
            self.rt.slot(self.record, "mClassLoader")
        }
    }

    #[test]
    fn installs_loader_on_package_record() {
        let mut w = world();
        let patcher = ClassLoaderPatcher::default();
        assert!(patcher.attach(&mut w.rt, &H(w.new_loader), &H(w.context)));
        assert_eq!(w.installed_loader(), Some(w.new_loader));
        assert_eq!(w.rt.writes, 1);
    }

    #[test]
    fn reports_package_name() {
        let mut w = world();
        assert_eq!(w.attach(&ClassLoaderPatcher::default()).expect("attach"), PACKAGE);
    }

    #[test]
    fn missing_main_thread_slot_fails_closed() {
        let mut w = world();
        let activity = w.rt.classes["android/app/Activity"];
        if let Node::Class { fields } = &mut w.rt.nodes[activity] {
            fields.remove(1);
        }

        let err = w.attach(&ClassLoaderPatcher::default()).expect_err("no mMainThread");
        assert!(matches!(
            err,
            FileOpenError::FieldNotFound { ref field, .. } if field == "mMainThread"
        ));
        assert_eq!(w.installed_loader(), Some(w.old_loader));
        assert_eq!(w.rt.writes, 0);
    }

    #[test]
    fn null_main_thread_fails_closed() {
        let mut w = world();
        if let Node::Object { slots, .. } = &mut w.rt.nodes[w.context] {
            slots.insert("mMainThread".into(), None);
        }
        let err = w.attach(&ClassLoaderPatcher::default()).expect_err("null slot");
        assert!(matches!(err, FileOpenError::NullSlot { .. }));
        assert_eq!(w.installed_loader(), Some(w.old_loader));
    }

    #[test]
    fn unknown_package_fails_closed() {
        let mut w = world();
        w.rt.nodes[w.packages] = Node::Map(HashMap::new());
        let err = w.attach(&ClassLoaderPatcher::default()).expect_err("no entry");
        assert!(matches!(err, FileOpenError::PackageNotFound(ref p) if p == PACKAGE));
        assert_eq!(w.installed_loader(), Some(w.old_loader));
    }

    #[test]
    fn reclaimed_record_fails_closed() {
        let mut w = world();
        w.rt.nodes[w.weak] = Node::Weak(None);
        let patcher = ClassLoaderPatcher::default();
        assert!(!patcher.attach(&mut w.rt, &H(w.new_loader), &H(w.context)));
        assert!(matches!(w.attach(&patcher), Err(FileOpenError::ReferentReclaimed(_))));
        assert_eq!(w.installed_loader(), Some(w.old_loader));
    }

    #[test]
    fn refused_overwrite_leaves_state_unchanged() {
        let mut w = world();
        let record_class = w.rt.classes["android/app/LoadedApk"];
        let field = w.rt.field_of(record_class, "mClassLoader");
        if let Node::Field { writable, .. } = &mut w.rt.nodes[field] {
            *writable = false;
        }

        let patcher = ClassLoaderPatcher::default();
        assert!(!patcher.attach(&mut w.rt, &H(w.new_loader), &H(w.context)));
        assert_eq!(w.installed_loader(), Some(w.old_loader));
    }

    #[test]
    fn superclass_fields_are_not_searched() {
        let mut w = world();
        // Record is now an instance of a subclass that declares nothing itself.
        let sub = w.rt.class("android/app/LoadedApkSub", &[]);
        if let Node::Object { class, .. } = &mut w.rt.nodes[w.record] {
            *class = sub;
        }
        let err = w.attach(&ClassLoaderPatcher::default()).expect_err("declared only");
        assert!(matches!(
            err,
            FileOpenError::FieldNotFound { ref field, .. } if field == "mClassLoader"
        ));
        assert_eq!(w.installed_loader(), Some(w.old_loader));
    }

    #[test]
    fn fields_before_the_match_are_made_accessible() {
        let mut w = world();
        let activity = w.rt.classes["android/app/Activity"];
        let found = find_declared_field(&mut w.rt, &H(activity), "mMainThread")
            .expect("lookup")
            .expect("found");
        assert_eq!(w.rt.field_name(&found).expect("name"), "mMainThread");

        let accessible = |rt: &FakeRuntime, name: &str| {
            let id = rt.field_of(activity, name);
            matches!(rt.nodes[id], Node::Field { accessible: true, .. })
        };
        assert!(accessible(&w.rt, "mTitle"));
        assert!(accessible(&w.rt, "mMainThread"));
        // Iteration stops at the first match.
        assert!(!accessible(&w.rt, "mWindow"));
    }

    #[test]
    fn absent_field_is_none() {
        let mut w = world();
        let thread_class = w.rt.classes["android/app/ActivityThread"];
        let found = find_declared_field(&mut w.rt, &H(thread_class), "mNope").expect("lookup");
        assert!(found.is_none());
    }

    #[test]
    fn slot_names_follow_config() {
        let mut w = world();
        // A host release that renamed the package map.
        let thread_class = w.rt.classes["android/app/ActivityThread"];
        let field = w.rt.field_of(thread_class, "mPackages");
        if let Node::Field { name, .. } = &mut w.rt.nodes[field] {
            *name = "mLoadedPackages".into();
        }
        if let Node::Object { slots, .. } = &mut w.rt.nodes[w.thread] {
            let map = slots.remove("mPackages").flatten();
            slots.insert("mLoadedPackages".into(), map);
        }

        assert!(w.attach(&ClassLoaderPatcher::default()).is_err());

        let patcher = ClassLoaderPatcher::new(PatcherConfig {
            packages_field: "mLoadedPackages".into(),
            ..PatcherConfig::default()
        });
        assert!(w.attach(&patcher).is_ok());
        assert_eq!(w.installed_loader(), Some(w.new_loader));
    }

    #[test]
    fn exclusive_lock_refuses_while_held() {
        let lock = Mutex::new(());
        let held = try_exclusive(&lock).expect("free");
        assert!(try_exclusive(&lock).is_none());
        drop(held);
        assert!(try_exclusive(&lock).is_some());
    }

    #[test]
    fn exclusive_lock_survives_a_panicked_holder() {
        let lock = std::sync::Arc::new(Mutex::new(()));
        let poisoner = std::sync::Arc::clone(&lock);
        let joined = std::thread::spawn(move || {
            let _guard = poisoner.lock().expect("lock");
            panic!("patch panicked");
        })
        .join();
        assert!(joined.is_err());
        assert!(lock.is_poisoned());

        assert!(try_exclusive(&lock).is_some());
    }
}

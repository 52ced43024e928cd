// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory host fakes shared by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::rc::Rc;

use fileopen_core::error::{FileOpenError, Result};
use fileopen_core::types::PickerUri;

use crate::traits::{ContentResolver, PickerSurface};

/// What the provider's display-name column yields.
#[derive(Debug, Clone)]
pub enum NameColumn {
    Value(String),
    Null,
    Missing,
    QueryFails,
}

/// What opening the document yields.
#[derive(Debug, Clone)]
pub enum Body {
    Bytes(Vec<u8>),
    NoStream,
    OpenFails,
    /// Yields these bytes, then an I/O error.
    ReadFails(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct FakeDocument {
    name: NameColumn,
    mime: Option<String>,
    body: Body,
}

impl FakeDocument {
    pub fn new(name: NameColumn, body: Body) -> Self {
        Self {
            name,
            mime: None,
            body,
        }
    }

    pub fn mime(mut self, mime: &str) -> Self {
        self.mime = Some(mime.into());
        self
    }
}

/// Content resolver serving [`FakeDocument`]s and counting live streams.
#[derive(Debug, Default)]
pub struct FakeContentResolver {
    documents: HashMap<String, FakeDocument>,
    live: Rc<Cell<usize>>,
    opened: Rc<Cell<usize>>,
}

impl FakeContentResolver {
    pub fn with(mut self, uri: &str, document: FakeDocument) -> Self {
        self.documents.insert(uri.into(), document);
        self
    }

    /// Streams opened and not yet dropped.
    pub fn live_streams(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.live)
    }

    /// Streams opened so far.
    pub fn opened_streams(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.opened)
    }
}

impl ContentResolver for FakeContentResolver {
    type Stream = FakeStream;

    fn query_display_name(&self, uri: &PickerUri) -> Result<Option<String>> {
        match self.documents.get(uri.as_str()).map(|d| &d.name) {
            Some(NameColumn::Value(name)) => Ok(Some(name.clone())),
            Some(NameColumn::QueryFails) => Err(FileOpenError::Bridge("query refused".into())),
            _ => Ok(None),
        }
    }

    fn mime_type(&self, uri: &PickerUri) -> Option<String> {
        self.documents.get(uri.as_str()).and_then(|d| d.mime.clone())
    }

    fn open_input_stream(&self, uri: &PickerUri) -> Result<Option<FakeStream>> {
        let (data, fail_at_end) = match self.documents.get(uri.as_str()).map(|d| &d.body) {
            Some(Body::Bytes(data)) => (data.clone(), false),
            Some(Body::ReadFails(data)) => (data.clone(), true),
            Some(Body::NoStream) | None => return Ok(None),
            Some(Body::OpenFails) => {
                return Err(FileOpenError::Io(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "permission denied",
                )));
            }
        };
        self.live.set(self.live.get() + 1);
        self.opened.set(self.opened.get() + 1);
        Ok(Some(FakeStream {
            data: Cursor::new(data),
            fail_at_end,
            live: Rc::clone(&self.live),
        }))
    }
}

pub struct FakeStream {
    data: Cursor<Vec<u8>>,
    fail_at_end: bool,
    live: Rc<Cell<usize>>,
}

impl Read for FakeStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.data.read(buf)?;
        if n == 0 && self.fail_at_end {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "provider went away"));
        }
        Ok(n)
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
    }
}

/// Surface interactions, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    Registered,
    Launched(String),
    Finished,
}

/// Surface that records what the session asked of it.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub(crate) events: Rc<RefCell<Vec<SurfaceEvent>>>,
    pub(crate) registered: bool,
    pub refuse_registration: bool,
    pub refuse_launch: bool,
}

impl RecordingSurface {
    pub fn events(&self) -> Rc<RefCell<Vec<SurfaceEvent>>> {
        Rc::clone(&self.events)
    }
}

impl PickerSurface for RecordingSurface {
    fn register_result_callback(&mut self) -> Result<()> {
        if self.refuse_registration {
            return Err(FileOpenError::Bridge("host refused registration".into()));
        }
        self.registered = true;
        self.events.borrow_mut().push(SurfaceEvent::Registered);
        Ok(())
    }

    fn launch_picker(&mut self, filter: &str) -> Result<()> {
        if !self.registered {
            return Err(FileOpenError::CallbackNotRegistered);
        }
        if self.refuse_launch {
            return Err(FileOpenError::Bridge("no activity handles the picker".into()));
        }
        self.events.borrow_mut().push(SurfaceEvent::Launched(filter.into()));
        Ok(())
    }

    fn finish(&mut self) {
        self.events.borrow_mut().push(SurfaceEvent::Finished);
    }
}

// Copyright 2021 Datafuse Labs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Blocking pull iteration.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::debug;

use crate::error::ScanError;
use crate::scan::config::ScanConfig;
use crate::scan::converter::ResultConverter;
use crate::scan::cursor::Cursor;
use crate::scan::executor::ReadExecutor;

/// Closes a scan from any thread, including while a request is in flight.
#[derive(Debug, Clone, Default)]
pub struct CloseHandle(Arc<AtomicBool>);

impl CloseHandle {
    /// Returns `true` only for the call that actually closed the scan.
    pub fn close(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    pub fn is_closed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A scan driven by the caller's thread.
///
/// Every call to [`has_next`](Self::has_next) or `next()` may block on a read request.
/// No thread is created. The iterator is single-owner; use a [`CloseHandle`] to close it
/// from elsewhere.
///
/// The error that closed the scan is returned by every later `has_next()`. As an
/// [`Iterator`], it is yielded once and then the iterator ends.
pub struct TableScanIterator<C>
where C: ResultConverter
{
    config: Arc<ScanConfig>,
    executor: Arc<dyn ReadExecutor>,
    converter: C,
    cursor: Cursor,
    close_handle: CloseHandle,

    /// Converted item returned by the next `next()`.
    peeked: Option<C::Output>,

    error_yielded: bool,
}

impl<C> TableScanIterator<C>
where C: ResultConverter
{
    pub fn new(config: Arc<ScanConfig>, executor: Arc<dyn ReadExecutor>, converter: C) -> Self {
        Self {
            config,
            executor,
            converter,
            cursor: Cursor::new(),
            close_handle: CloseHandle::default(),
            peeked: None,
            error_yielded: false,
        }
    }

    pub fn close_handle(&self) -> CloseHandle {
        self.close_handle.clone()
    }

    /// Close the scan. Calling it more than once has no effect.
    pub fn close(&mut self) {
        self.close_handle.close();
        self.sync_close();
    }

    fn sync_close(&mut self) {
        if self.close_handle.is_closed() && self.cursor.close() {
            self.peeked = None;
            debug!("TableScanIterator: closed scan of {}", self.config.table());
        }
    }

    /// Total read cost of the requests made so far, in KB.
    pub fn read_kb(&self) -> u64 {
        self.cursor.read_kb()
    }

    pub fn write_kb(&self) -> u64 {
        self.cursor.write_kb()
    }

    pub fn has_next(&mut self) -> Result<bool, ScanError> {
        loop {
            self.sync_close();

            if let Some(e) = self.cursor.error() {
                return Err(e.clone());
            }
            if self.cursor.is_closed() {
                return Ok(false);
            }

            if self.peeked.is_some() {
                return Ok(true);
            }

            if let Some(record) = self.cursor.pop() {
                match self.converter.convert(&self.config, record) {
                    Ok(Some(item)) => {
                        self.peeked = Some(item);
                        return Ok(true);
                    }
                    Ok(None) => continue,
                    Err(e) => {
                        self.cursor.fail(e.clone());
                        return Err(e);
                    }
                }
            }

            let Some(request) = self.cursor.next_request(&self.config, self.converter.keys_only())
            else {
                return Ok(false);
            };

            match self.executor.execute_read(&request) {
                Ok(result) => self.cursor.apply(&self.config, result),
                Err(e) => {
                    let e = ScanError::from(e);
                    self.cursor.fail(e.clone());
                    return Err(e);
                }
            }
        }
    }
}

impl<C> Iterator for TableScanIterator<C>
where C: ResultConverter
{
    type Item = Result<C::Output, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.has_next() {
            Ok(true) => self.peeked.take().map(Ok),
            Ok(false) => None,
            Err(_) if self.error_yielded => None,
            Err(e) => {
                self.error_yielded = true;
                Some(Err(e))
            }
        }
    }
}

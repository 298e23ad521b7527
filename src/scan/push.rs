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

//! Non-blocking push iteration.
//!
//! [`AsyncTableIterator::next_local`] never waits. When the local batch is used up it
//! spawns the next read and returns [`Next::Pending`]. The completion of that read
//! refills the batch, or closes the iterator on failure, and then notifies the listener
//! so that the caller polls again.
//!
//! All mutable state sits behind one mutex that is only held for state transitions,
//! never across the read itself.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::task::Context;
use std::task::Poll;

use futures::task::AtomicWaker;
use futures::task::Spawn;
use futures::task::SpawnExt;
use futures::Stream;
use log::debug;
use log::warn;

use crate::error::ScanError;
use crate::scan::config::ScanConfig;
use crate::scan::converter::ResultConverter;
use crate::scan::cursor::Cursor;
use crate::scan::executor::AsyncReadExecutor;
use crate::scan::request::ReadRequest;
use crate::scan::request::ReadResult;

/// Called after every completed read.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// The outcome of [`AsyncTableIterator::next_local`].
#[derive(Debug)]
pub enum Next<T> {
    /// An item, or the error that closed the iterator.
    Ready(Result<T, ScanError>),

    /// A read is in flight. The listener is called when it completes.
    Pending,

    /// The scan is complete or was closed.
    Done,
}

struct PushState {
    cursor: Cursor,
    in_flight: bool,
}

/// State shared with the spawned read tasks.
struct Shared {
    state: Mutex<PushState>,
    listener: Mutex<Option<Listener>>,
    waker: AtomicWaker,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PushState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete(&self, config: &ScanConfig, result: Result<ReadResult, std::io::Error>) {
        {
            let mut st = self.lock();
            st.in_flight = false;

            if st.cursor.is_closed() {
                warn!(
                    "AsyncTableIterator: discard late response for closed scan of {}",
                    config.table()
                );
            } else {
                match result {
                    Ok(r) => st.cursor.apply(config, r),
                    Err(e) => st.cursor.fail(ScanError::from(e)),
                }
            }
        }

        self.notify();
    }

    fn notify(&self) {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        if let Some(f) = listener {
            f();
        }
        self.waker.wake();
    }
}

/// A scan that issues reads on a spawner and never blocks the caller.
///
/// It is also a [`Stream`]; as a stream the closing error is yielded once and then the
/// stream ends, while `next_local()` keeps returning it.
pub struct AsyncTableIterator<C, S>
where C: ResultConverter
{
    config: Arc<ScanConfig>,
    executor: Arc<dyn AsyncReadExecutor>,
    converter: C,
    spawner: S,
    shared: Arc<Shared>,
    error_yielded: bool,
}

impl<C, S> AsyncTableIterator<C, S>
where
    C: ResultConverter,
    S: Spawn,
{
    pub fn new(
        config: Arc<ScanConfig>,
        executor: Arc<dyn AsyncReadExecutor>,
        converter: C,
        spawner: S,
    ) -> Self {
        Self {
            config,
            executor,
            converter,
            spawner,
            shared: Arc::new(Shared {
                state: Mutex::new(PushState {
                    cursor: Cursor::new(),
                    in_flight: false,
                }),
                listener: Mutex::new(None),
                waker: AtomicWaker::new(),
            }),
            error_yielded: false,
        }
    }

    pub fn with_listener(self, listener: impl Fn() + Send + Sync + 'static) -> Self {
        self.set_listener(listener);
        self
    }

    /// Register the function called after every completed read.
    pub fn set_listener(&self, listener: impl Fn() + Send + Sync + 'static) {
        let mut l = self
            .shared
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *l = Some(Arc::new(listener));
    }

    /// Return the next locally available item, or start fetching more.
    pub fn next_local(&self) -> Next<C::Output> {
        loop {
            let request = {
                let mut st = self.shared.lock();

                if let Some(e) = st.cursor.error() {
                    return Next::Ready(Err(e.clone()));
                }
                if st.cursor.is_closed() {
                    return Next::Done;
                }

                let popped = st.cursor.pop();
                if let Some(record) = popped {
                    drop(st);

                    match self.converter.convert(&self.config, record) {
                        Ok(Some(item)) => return Next::Ready(Ok(item)),
                        Ok(None) => continue,
                        Err(e) => {
                            self.shared.lock().cursor.fail(e.clone());
                            return Next::Ready(Err(e));
                        }
                    }
                }

                if st.in_flight {
                    return Next::Pending;
                }

                let Some(request) = st
                    .cursor
                    .next_request(&self.config, self.converter.keys_only())
                else {
                    return Next::Done;
                };

                st.in_flight = true;
                request
            };

            if self.start(request) {
                return Next::Pending;
            }
        }
    }

    /// Spawn the read. Returns `false` if it could not be spawned; the iterator is then
    /// closed with the error.
    fn start(&self, request: ReadRequest) -> bool {
        debug!(
            "AsyncTableIterator: read partition {} of {}",
            request.partition,
            self.config.table()
        );

        let shared = self.shared.clone();
        let executor = self.executor.clone();
        let config = self.config.clone();

        let task = async move {
            let result = executor.execute_read(request).await;
            shared.complete(&config, result);
        };

        if let Err(e) = self.spawner.spawn(task) {
            let mut st = self.shared.lock();
            st.in_flight = false;
            st.cursor.fail(ScanError::Spawn(e.to_string()));
            return false;
        }
        true
    }

    /// Close the iterator. A response that arrives later is discarded.
    pub fn close(&self) {
        let closed = self.shared.lock().cursor.close();
        if closed {
            debug!("AsyncTableIterator: closed scan of {}", self.config.table());
        }
    }

    pub fn read_kb(&self) -> u64 {
        self.shared.lock().cursor.read_kb()
    }
}

impl<C, S> Stream for AsyncTableIterator<C, S>
where
    C: ResultConverter + Unpin,
    S: Spawn + Unpin,
{
    type Item = Result<C::Output, ScanError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        // Register before looking at the state, so a completion in between is not missed.
        this.shared.waker.register(cx.waker());

        match this.next_local() {
            Next::Ready(Ok(item)) => Poll::Ready(Some(Ok(item))),
            Next::Ready(Err(_)) if this.error_yielded => Poll::Ready(None),
            Next::Ready(Err(e)) => {
                this.error_yielded = true;
                Poll::Ready(Some(Err(e)))
            }
            Next::Pending => Poll::Pending,
            Next::Done => Poll::Ready(None),
        }
    }
}

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

//! The network client interface consumed by scans.
//!
//! Failures are reported as [`io::Error`] and handed to the caller as
//! [`ScanError::RemoteRead`](crate::ScanError::RemoteRead) without retrying.

use std::io;
use std::sync::Arc;

use crate::scan::request::ReadRequest;
use crate::scan::request::ReadResult;

/// Executes a read request and blocks until it completes.
pub trait ReadExecutor: Send + Sync {
    fn execute_read(&self, request: &ReadRequest) -> Result<ReadResult, io::Error>;
}

impl<T> ReadExecutor for &T
where T: ReadExecutor + ?Sized
{
    fn execute_read(&self, request: &ReadRequest) -> Result<ReadResult, io::Error> {
        (**self).execute_read(request)
    }
}

impl<T> ReadExecutor for Arc<T>
where T: ReadExecutor + ?Sized
{
    fn execute_read(&self, request: &ReadRequest) -> Result<ReadResult, io::Error> {
        (**self).execute_read(request)
    }
}

/// Executes a read request asynchronously.
#[async_trait::async_trait]
pub trait AsyncReadExecutor: Send + Sync {
    async fn execute_read(&self, request: ReadRequest) -> Result<ReadResult, io::Error>;
}

#[async_trait::async_trait]
impl<T> AsyncReadExecutor for Arc<T>
where T: AsyncReadExecutor + ?Sized
{
    async fn execute_read(&self, request: ReadRequest) -> Result<ReadResult, io::Error> {
        (**self).execute_read(request).await
    }
}

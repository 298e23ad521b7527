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

//! Logical primary keys and their physical store keys.

pub mod builder;
pub mod primary_key;
pub mod store_key;

pub use self::builder::build_key;
pub use self::builder::build_key_with_generator;
pub use self::builder::BuiltKey;
pub use self::builder::KeyGenerator;
pub use self::primary_key::PrimaryKey;
pub use self::store_key::StoreKey;

/*
    telescope-align, track reconstruction and alignment for pixel telescope test-beam data
    Copyright (c) 2024 the telescope-align contributors

    Permission is hereby granted, free of charge, to any person obtaining a copy
    of this software and associated documentation files (the "Software"), to deal
    in the Software without restriction, including without limitation the rights
    to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
    copies of the Software, and to permit persons to whom the Software is
    furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
    OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
    SOFTWARE.
*/

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use parquet::{
    basic::{Compression, ZstdLevel},
    file::properties::WriterProperties,
    format::KeyValue,
};
use shadow_rs::shadow;
use whoami::{platform, realname, username};

shadow!(build);

/// Writer properties stamped onto every output table: compression plus
/// provenance metadata so a file found on disk can be traced to its run.
pub(crate) fn pq_writer(metadata: Option<HashMap<String, String>>) -> Option<WriterProperties> {
    let bldr = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::try_new(10).unwrap()));

    let created_on = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let mut file_metadata = vec![
        KeyValue::new("Generated by".to_string(), prj_name_ver()),
        KeyValue::new(
            format!("{} License", build::PROJECT_NAME),
            "MIT".to_string(),
        ),
        KeyValue::new(
            "Created by".to_string(),
            format!("{} ({}) on {}", realname(), username(), platform()),
        ),
        KeyValue::new("Created on".to_string(), format!("{created_on}")),
    ];

    if let Some(custom_md) = metadata {
        for (k, v) in custom_md {
            file_metadata.push(KeyValue::new(k, v));
        }
    }

    Some(bldr.set_key_value_metadata(Some(file_metadata)).build())
}

pub(crate) fn prj_name_ver() -> String {
    format!("{} v{}", build::PROJECT_NAME, build::PKG_VERSION)
}

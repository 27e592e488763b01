//! Reading and writing encoded OTLP export requests.
//!
//! Requests are written as JSON, indented JSON or postcard, optionally gzip
//! or zstd compressed. Compressed input is recognized by its magic bytes.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use otlp_parse::{
    ExportProfilesServiceRequest, InstrumentationScope, KeyValue, ParseError, Profile, Resource,
    WriteError,
};
use std::borrow::Cow;
use std::io::{self, Read, Write};
use thiserror::Error;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("write error: {0}")]
    Write(#[from] WriteError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("postcard serialization error: {0}")]
    Postcard(#[from] postcard::Error),
}

pub type Result<T> = std::result::Result<T, OutputError>;

/// Serialization of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Json,
    JsonPretty,
    Postcard,
}

/// Compression applied on top of the encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Zstd,
}

/// Wrap a translated profile in an export request.
///
/// The scope names this crate. A resource is attached only when
/// `resource_attributes` is non-empty.
pub fn wrap_profile(
    profile: Profile,
    resource_attributes: Vec<KeyValue>,
) -> ExportProfilesServiceRequest {
    let resource = (!resource_attributes.is_empty()).then(|| Resource {
        attributes: resource_attributes,
        dropped_attributes_count: 0,
    });
    let scope = InstrumentationScope {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    ExportProfilesServiceRequest::single(resource, Some(scope), profile)
}

/// Encode and compress `request` into `writer`.
pub fn write_request<W: Write>(
    writer: W,
    request: &ExportProfilesServiceRequest,
    encoding: Encoding,
    compression: Compression,
) -> Result<()> {
    match compression {
        Compression::None => encode(writer, request, encoding),
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(writer, flate2::Compression::default());
            encode(&mut encoder, request, encoding)?;
            encoder.finish()?;
            Ok(())
        }
        Compression::Zstd => {
            let mut encoder = zstd::Encoder::new(writer, 0)?;
            encode(&mut encoder, request, encoding)?;
            encoder.finish()?;
            Ok(())
        }
    }
}

fn encode<W: Write>(
    mut writer: W,
    request: &ExportProfilesServiceRequest,
    encoding: Encoding,
) -> Result<()> {
    match encoding {
        Encoding::Json => request.write(&mut writer)?,
        Encoding::JsonPretty => request.write_pretty(&mut writer)?,
        Encoding::Postcard => {
            postcard::to_io(request, &mut writer)?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Read a JSON request, possibly gzip or zstd compressed, and validate it.
pub fn read_request<R: Read>(mut reader: R) -> Result<ExportProfilesServiceRequest> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    let data = decompressed(&data)?;
    Ok(ExportProfilesServiceRequest::parse(data.as_ref())?)
}

/// Undo gzip or zstd compression, detected by magic bytes. Other input is
/// returned as is.
pub(crate) fn decompressed(data: &[u8]) -> io::Result<Cow<'_, [u8]>> {
    if data.starts_with(&GZIP_MAGIC) {
        let mut decoded = Vec::new();
        GzDecoder::new(data).read_to_end(&mut decoded)?;
        return Ok(Cow::Owned(decoded));
    }
    if data.starts_with(&ZSTD_MAGIC) {
        return Ok(Cow::Owned(zstd::decode_all(data)?));
    }
    Ok(Cow::Borrowed(data))
}

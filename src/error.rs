//! Error types for model generation
//!
//! Every fatal failure of the pipeline is reported through [`Error`]. Each
//! variant carries a stable error code so callers (and users reading CLI
//! output) can categorise failures without matching on message text.
//!
//! # Error Codes
//!
//! Error codes follow the pattern: `E<category><number>`
//!
//! Categories:
//! - **E1xxx**: I/O and archive errors
//! - **E2xxx**: XML serialisation and package structure errors
//! - **E3xxx**: Geometry errors
//! - **E4xxx**: Configuration errors
//!
//! Colours that cannot be reproduced within the error threshold are *not*
//! errors. They are counted in [`Diagnostics`](crate::pipeline::Diagnostics).

use std::io;
use thiserror::Error;

/// Result type for lumina3mf operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while generating, writing or reading a model
#[derive(Error, Debug)]
pub enum Error {
    /// IO error while writing or reading a file
    ///
    /// **Error Code**: E1001
    #[error("[E1001] I/O error: {0}")]
    Io(#[from] io::Error),

    /// ZIP container error
    ///
    /// **Error Code**: E1002
    ///
    /// **Common Causes**:
    /// - Output stream closed while the archive was being finalised
    /// - Reading a file that is not a ZIP archive
    #[error("[E1002] ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Missing required part in a 3MF package
    ///
    /// **Error Code**: E1003
    #[error("[E1003] Missing required file: {0}")]
    MissingFile(String),

    /// XML parsing error while reading a package back
    ///
    /// **Error Code**: E2001
    #[error("[E2001] XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// XML attribute error
    ///
    /// **Error Code**: E2002
    #[error("[E2002] XML attribute error: {0}")]
    XmlAttr(String),

    /// Package content does not match the expected 3MF structure
    ///
    /// **Error Code**: E2004
    #[error("[E2004] Invalid 3MF format: {0}")]
    InvalidFormat(String),

    /// XML writing error
    ///
    /// **Error Code**: E2005
    #[error("[E2005] XML writing error: {0}")]
    XmlWrite(String),

    /// A generated mesh cannot be serialised safely
    ///
    /// **Error Code**: E3001
    ///
    /// **Common Causes**:
    /// - Non-manifold or open mesh (an edge not shared by exactly two triangles)
    /// - Inconsistent triangle winding
    /// - Degenerate triangles or out-of-range vertex indices
    /// - A non-empty mesh with zero or negative volume
    ///
    /// No output is written when this error is raised.
    #[error("[E3001] Geometry integrity error: {0}")]
    GeometryIntegrity(String),

    /// Parse error for numeric values
    ///
    /// **Error Code**: E3002
    ///
    /// **Common Causes**:
    /// - Malformed hex colour in a filament profile
    /// - Non-numeric vertex coordinates in a package being read
    #[error("[E3002] Parse error: {0}")]
    ParseError(String),

    /// Invalid request configuration
    ///
    /// **Error Code**: E4001
    ///
    /// **Common Causes**:
    /// - Non-positive transmission distance
    /// - Missing or duplicate filament profile for a channel
    /// - Zero or negative target width, layer height or spacer thickness
    /// - Maximum height too small to hold the mandatory White base
    ///
    /// Raised before any geometry work begins.
    #[error("[E4001] Configuration error: {0}")]
    Configuration(String),
}

impl From<std::num::ParseFloatError> for Error {
    fn from(err: std::num::ParseFloatError) -> Self {
        Error::ParseError(format!("Failed to parse floating-point number: {}", err))
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Self {
        Error::ParseError(format!("Failed to parse integer: {}", err))
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::XmlAttr(format!("Attribute parsing failed: {}", err))
    }
}

impl Error {
    /// Create a Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    /// Create a GeometryIntegrity error naming the offending part
    ///
    /// # Arguments
    /// * `part` - Name of the part whose mesh failed validation
    /// * `message` - Description of the defect
    pub fn geometry(part: &str, message: &str) -> Self {
        Error::GeometryIntegrity(format!("Part '{}': {}", part, message))
    }

    /// Create an XmlWrite error
    pub fn xml_write(message: String) -> Self {
        Error::XmlWrite(message)
    }

    /// Create an InvalidXml-style format error for a missing attribute
    pub fn missing_attribute(element: &str, attribute: &str) -> Self {
        Error::InvalidFormat(format!(
            "Element '<{}>' is missing required attribute '{}'",
            element, attribute
        ))
    }
}

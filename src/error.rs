use thiserror::Error;

#[derive(Debug, Error)]
pub enum JvfError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML stream error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("XML document error: {0}")]
    Document(#[from] roxmltree::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid UTF-8 in XML stream: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Missing element <{element}> in {context}")]
    MissingElement {
        element: &'static str,
        context: String,
    },

    #[error("Missing attribute '{attribute}' on <{element}>")]
    MissingAttribute {
        attribute: &'static str,
        element: &'static str,
    },

    #[error("No enumeration label for {field}='{code}'")]
    UnknownEnumValue { field: String, code: String },

    #[error("Document ends inside <{0}>")]
    UnexpectedEof(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("A parse is already in progress")]
    Busy,
}

pub type Result<T> = std::result::Result<T, JvfError>;
